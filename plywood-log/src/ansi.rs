//! ANSI color handling.
//!
//! Only the handful of things the log formatters and the application diagnostics need: painting
//! text in one of a few colors and stripping escape sequences again before the text lands in a
//! file.

use std::borrow::Cow;

const ESC: char = '\x1b';
const RESET: &str = "\x1b[0m";

/// The colors the formatters use.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Cyan,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
            Color::Cyan => "\x1b[36m",
        }
    }

    /// Wraps the text in this color.
    ///
    /// Colors already embedded in the text are kept. Each reset inside the text switches back to
    /// this color, so the rest of the text is still painted.
    pub fn paint(self, text: &str) -> String {
        let code = self.code();
        let resumed = format!("{}{}", RESET, code);
        format!("{}{}{}", code, text.replace(RESET, &resumed), RESET)
    }
}

pub fn red(text: &str) -> String {
    Color::Red.paint(text)
}

pub fn green(text: &str) -> String {
    Color::Green.paint(text)
}

pub fn yellow(text: &str) -> String {
    Color::Yellow.paint(text)
}

pub fn cyan(text: &str) -> String {
    Color::Cyan.paint(text)
}

/// Removes ANSI escape sequences from the text.
///
/// Handles CSI sequences (colors, cursor movement), OSC sequences (terminated by BEL or ST) and
/// the two-character escapes. Text without any escape character is returned borrowed.
pub fn strip(text: &str) -> Cow<'_, str> {
    if !text.contains(ESC) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ESC {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameters and intermediates, up to and including the final byte.
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == ESC {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            Some(_) => {
                chars.next();
            }
            None => (),
        }
    }
    Cow::Owned(out)
}
