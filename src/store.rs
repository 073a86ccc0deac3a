//! The loaded configuration values.
//!
//! A [`ConfigStore`] is a two-level map, sections of options, every value a string. Section and
//! option names are case-insensitive (they are kept lowercased). Typed accessors parse the string
//! on each access.
//!
//! The store reads and writes INI text. Whatever [`Display`] writes, [`ConfigStore::from_ini`]
//! reads back unchanged, except for whitespace around values, which INI doesn't keep.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{self, Write};
use std::str::FromStr;

use ini::ini::ParseError;
use ini::{Ini, ParseOption};

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parses a boolean the way INI files usually spell them.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Failure to get a value out of a [`ConfigStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// There's no section of that name.
    MissingSection(String),
    /// The section exists, but doesn't have the option.
    MissingOption { section: String, option: String },
    /// The value is there but doesn't parse as the requested type.
    InvalidValue {
        section: String,
        option: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    /// Is the value missing (as opposed to present but malformed)?
    pub fn is_missing(&self) -> bool {
        !matches!(self, ConfigError::InvalidValue { .. })
    }
}

impl Display for ConfigError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            ConfigError::MissingSection(section) => write!(fmt, "No section {:?}", section),
            ConfigError::MissingOption { section, option } => {
                write!(fmt, "No option {:?} in section {:?}", option, section)
            }
            ConfigError::InvalidValue {
                section,
                option,
                value,
                expected,
            } => write!(
                fmt,
                "Value {:?} of {}.{} is not a valid {}",
                value, section, option, expected
            ),
        }
    }
}

impl Error for ConfigError {}

/// Failure to read INI text.
#[derive(Debug)]
pub enum IniError {
    /// The text isn't valid INI.
    Syntax(ParseError),
    /// An option comes before the first section header.
    OptionOutsideSection(String),
}

impl Display for IniError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            IniError::Syntax(_) => write!(fmt, "Malformed INI"),
            IniError::OptionOutsideSection(option) => {
                write!(fmt, "Option {:?} is outside of any section", option)
            }
        }
    }
}

impl Error for IniError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IniError::Syntax(e) => Some(e),
            IniError::OptionOutsideSection(_) => None,
        }
    }
}

fn or_fallback<T>(result: Result<T, ConfigError>, fallback: T) -> Result<T, ConfigError> {
    match result {
        Err(ref e) if e.is_missing() => Ok(fallback),
        other => other,
    }
}

/// Sections of string options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigStore {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses INI text.
    ///
    /// `;` and `#` start a comment, also in the middle of a line, and a backslash escapes the next
    /// character (`\n`, `\t`, `\r` and `\0` are the control characters). Quotes are kept as
    /// they are. Options have to be inside a section.
    pub fn from_ini(text: &str) -> Result<Self, IniError> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: true,
        };
        let ini = Ini::load_from_str_opt(text, options).map_err(IniError::Syntax)?;
        let mut store = Self::new();
        for (section, options) in ini.iter() {
            match section {
                Some(section) => {
                    store.add_section(section);
                    for (option, value) in options {
                        store.set(section, option, value.as_str());
                    }
                }
                None => {
                    if let Some(option) = options.keys().min() {
                        return Err(IniError::OptionOutsideSection(option.clone()));
                    }
                }
            }
        }
        Ok(store)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Adds an empty section, if it's not there yet.
    ///
    /// Returns if the section was added.
    pub fn add_section(&mut self, section: &str) -> bool {
        let name = normalize(section);
        if self.sections.contains_key(&name) {
            false
        } else {
            self.sections.insert(name, BTreeMap::new());
            true
        }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(&normalize(section))
    }

    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.section(section)
            .map(|options| options.contains_key(&normalize(option)))
            .unwrap_or(false)
    }

    /// Names of all the sections, in sorted order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// All options of a section.
    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&normalize(section))
    }

    /// Sets a value, creating the section if needed.
    pub fn set<V: Into<String>>(&mut self, section: &str, option: &str, value: V) {
        self.sections
            .entry(normalize(section))
            .or_default()
            .insert(normalize(option), value.into());
    }

    pub fn remove_section(&mut self, section: &str) -> bool {
        self.sections.remove(&normalize(section)).is_some()
    }

    /// Merges another store in, option by option. The other store's values win.
    pub fn merge(&mut self, other: &ConfigStore) {
        for (section, options) in &other.sections {
            let target = self.sections.entry(section.clone()).or_default();
            for (option, value) in options {
                target.insert(option.clone(), value.clone());
            }
        }
    }

    /// Finds the section holding the option.
    ///
    /// The `preferred` section is checked first, then the others in sorted order.
    pub fn find_section(&self, preferred: &str, option: &str) -> Option<&str> {
        let option = normalize(option);
        if let Some((name, options)) = self.sections.get_key_value(&normalize(preferred)) {
            if options.contains_key(&option) {
                return Some(name);
            }
        }
        self.sections
            .iter()
            .find(|(_, options)| options.contains_key(&option))
            .map(|(name, _)| name.as_str())
    }

    /// Gets the raw string value.
    pub fn get(&self, section: &str, option: &str) -> Result<&str, ConfigError> {
        let options = self
            .section(section)
            .ok_or_else(|| ConfigError::MissingSection(normalize(section)))?;
        options
            .get(&normalize(option))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingOption {
                section: normalize(section),
                option: normalize(option),
            })
    }

    /// Gets the raw string value or the fallback if there's none.
    pub fn get_or<'a>(&'a self, section: &str, option: &str, fallback: &'a str) -> &'a str {
        self.get(section, option).unwrap_or(fallback)
    }

    /// Gets a value parsed by its [`FromStr`] implementation.
    ///
    /// The `expected` is a human description of the type used in the error message.
    pub fn get_parsed<T: FromStr>(
        &self,
        section: &str,
        option: &str,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        let value = self.get(section, option)?;
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                section: normalize(section),
                option: normalize(option),
                value: value.to_owned(),
                expected,
            })
    }

    pub fn get_int(&self, section: &str, option: &str) -> Result<i64, ConfigError> {
        self.get_parsed(section, option, "integer")
    }

    /// Like [`get_int`][ConfigStore::get_int], but a missing value results in the fallback.
    ///
    /// A present but malformed value is still an error.
    pub fn get_int_or(&self, section: &str, option: &str, fallback: i64) -> Result<i64, ConfigError> {
        or_fallback(self.get_int(section, option), fallback)
    }

    pub fn get_float(&self, section: &str, option: &str) -> Result<f64, ConfigError> {
        self.get_parsed(section, option, "number")
    }

    pub fn get_float_or(
        &self,
        section: &str,
        option: &str,
        fallback: f64,
    ) -> Result<f64, ConfigError> {
        or_fallback(self.get_float(section, option), fallback)
    }

    /// Gets a boolean.
    ///
    /// Accepts `1`, `yes`, `true`, `on` and `0`, `no`, `false`, `off`, in any case.
    pub fn get_bool(&self, section: &str, option: &str) -> Result<bool, ConfigError> {
        let value = self.get(section, option)?;
        parse_bool(value).ok_or_else(|| ConfigError::InvalidValue {
            section: normalize(section),
            option: normalize(option),
            value: value.to_owned(),
            expected: "boolean",
        })
    }

    pub fn get_bool_or(
        &self,
        section: &str,
        option: &str,
        fallback: bool,
    ) -> Result<bool, ConfigError> {
        or_fallback(self.get_bool(section, option), fallback)
    }

    /// Writes the store in the INI format.
    ///
    /// This is the same as the [`Display`] implementation.
    pub fn write_ini<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

const SECTION_SPECIAL: &[char] = &[']'];
const OPTION_SPECIAL: &[char] = &[';', '#', '[', '=', ':'];
const VALUE_SPECIAL: &[char] = &[';', '#'];

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            c if c.is_control() => escaped.push_str(&format!("\\x{:04x}", c as u32)),
            c if special.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Formats the store as INI.
///
/// Each section is a `[section]` header followed by `option = value` lines and an empty line.
/// Characters the reader would take as comments or escapes are escaped with a backslash.
impl Display for ConfigStore {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for (section, options) in &self.sections {
            writeln!(fmt, "[{}]", escape(section, SECTION_SPECIAL))?;
            for (option, value) in options {
                writeln!(
                    fmt,
                    "{} = {}",
                    escape(option, OPTION_SPECIAL),
                    escape(value, VALUE_SPECIAL)
                )?;
            }
            writeln!(fmt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigStore {
        let mut store = ConfigStore::new();
        store.set("Server", "Port", "8080");
        store.set("server", "ratio", "0.5");
        store.set("server", "verbose", "yes");
        store.set("server", "name", "plywood");
        store.set("client", "retries", "three");
        store
    }

    #[test]
    fn names_are_case_insensitive() {
        let store = sample();
        assert!(store.has_section("SERVER"));
        assert!(store.has_option("server", "PORT"));
        assert_eq!("8080", store.get("sErVeR", "port").unwrap());
        assert_eq!(vec!["client", "server"], store.sections().collect::<Vec<_>>());
    }

    #[test]
    fn typed_access() {
        let store = sample();
        assert_eq!(8080, store.get_int("server", "port").unwrap());
        assert!((store.get_float("server", "ratio").unwrap() - 0.5).abs() < f64::EPSILON);
        assert!(store.get_bool("server", "verbose").unwrap());
        assert_eq!(
            ConfigError::InvalidValue {
                section: "client".to_owned(),
                option: "retries".to_owned(),
                value: "three".to_owned(),
                expected: "integer",
            },
            store.get_int("client", "retries").unwrap_err()
        );
        assert!(store.get_bool("server", "name").is_err());
    }

    #[test]
    fn missing_values() {
        let store = sample();
        assert_eq!(
            ConfigError::MissingSection("nope".to_owned()),
            store.get("nope", "port").unwrap_err()
        );
        assert_eq!(
            ConfigError::MissingOption {
                section: "server".to_owned(),
                option: "host".to_owned(),
            },
            store.get("server", "host").unwrap_err()
        );
        assert_eq!("localhost", store.get_or("server", "host", "localhost"));
        assert_eq!(3, store.get_int_or("server", "workers", 3).unwrap());
        assert!(!store.get_bool_or("nope", "verbose", false).unwrap());
        // Fallbacks only apply to missing values
        assert!(store.get_int_or("client", "retries", 3).is_err());
    }

    #[test]
    fn bool_spellings() {
        for value in &["1", "yes", "True", "ON", "true"] {
            assert_eq!(Some(true), parse_bool(value), "{}", value);
        }
        for value in &["0", "No", "false", "off", "False"] {
            assert_eq!(Some(false), parse_bool(value), "{}", value);
        }
        assert_eq!(None, parse_bool("maybe"));
    }

    #[test]
    fn merge_is_field_wise() {
        let mut store = sample();
        let mut other = ConfigStore::new();
        other.set("server", "port", "9090");
        other.set("extra", "key", "value");
        store.merge(&other);
        assert_eq!("9090", store.get("server", "port").unwrap());
        assert_eq!("plywood", store.get("server", "name").unwrap());
        assert_eq!("value", store.get("extra", "key").unwrap());
    }

    #[test]
    fn find_section_prefers() {
        let mut store = ConfigStore::new();
        store.set("a", "count", "1");
        store.set("LoggingConfig", "count", "2");
        store.set("b", "size", "3");
        assert_eq!(Some("loggingconfig"), store.find_section("LoggingConfig", "count"));
        assert_eq!(Some("a"), store.find_section("other", "count"));
        assert_eq!(Some("b"), store.find_section("LoggingConfig", "size"));
        assert_eq!(None, store.find_section("LoggingConfig", "logfile"));
    }

    #[test]
    fn ini_input() {
        let store = ConfigStore::from_ini(
            "; leading comment\n[Section]\nKey = Value # trailing\n\n[empty]\n[other]\nquoted = \"x\"\n",
        )
        .unwrap();
        assert_eq!("Value", store.get("section", "key").unwrap());
        assert!(store.has_section("empty"));
        assert_eq!("\"x\"", store.get("other", "quoted").unwrap());
        assert_eq!(vec!["empty", "other", "section"], store.sections().collect::<Vec<_>>());
    }

    #[test]
    fn ini_input_errors() {
        assert!(matches!(
            ConfigStore::from_ini("orphan = 1\n[server]\nport = 1\n"),
            Err(IniError::OptionOutsideSection(option)) if option == "orphan"
        ));
        assert!(matches!(
            ConfigStore::from_ini("[unclosed\n"),
            Err(IniError::Syntax(_))
        ));
    }

    #[test]
    fn escaped_output_reads_back() {
        let mut store = ConfigStore::new();
        store.set("s", "url", "http://host/page#anchor");
        store.set("s", "pattern", "a;b");
        store.set("s", "quoted", "\"x\"");
        store.set("s", "winpath", "C:\\temp\\log");
        store.set("s", "lines", "[inner]\nkey = 1\r\n\ttab\u{7}");
        store.set("s", "odd;key=1", "v");
        store.set("odd]section", "key", "v");
        let written = store.to_string();
        assert!(written.contains("url = http://host/page\\#anchor\n"));
        assert!(written.contains("winpath = C:\\\\temp\\\\log\n"));
        assert!(written.contains("[odd\\]section]\n"));
        assert_eq!(store, ConfigStore::from_ini(&written).unwrap());
    }

    #[test]
    fn ini_output() {
        let mut store = ConfigStore::new();
        store.set("LoggingConfig", "count", "3");
        store.set("LoggingConfig", "logfile", "/tmp/log/logging.log");
        store.set("other", "key", "");
        assert_eq!(
            "[loggingconfig]\ncount = 3\nlogfile = /tmp/log/logging.log\n\n[other]\nkey = \n\n",
            store.to_string()
        );
        assert_eq!("", ConfigStore::new().to_string());
    }
}
