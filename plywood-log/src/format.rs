//! Line formats of the console and the log file.

use std::fmt::Display;

use log::Level;

use crate::ansi::{strip, Color};

/// Timestamp format of the log file lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The name a level is presented with, both on the console and in the file.
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Formats a console line.
///
/// The line is `<LEVEL>: <message>`, colored by the level. Info lines are printed bare, without
/// the prefix and without color.
pub fn console_line(level: Level, message: &str) -> String {
    let color = match level {
        Level::Info => return message.to_owned(),
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Debug | Level::Trace => Color::Cyan,
    };
    color.paint(&format!("{}: {}", level_name(level), message))
}

/// Formats a log file line, with all ANSI sequences removed.
pub fn file_line<T: Display>(timestamp: T, level: Level, message: &str) -> String {
    format!(
        "{} {{\"level\"=\"{}\"}} {}",
        timestamp,
        level_name(level),
        strip(message)
    )
}
