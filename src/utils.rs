//! Various utilities.
//!
//! Conversions between Rust values and the strings the INI files hold.

use std::any;
use std::path::{Path, MAIN_SEPARATOR};

use serde::ser::Serializer;
use toml::Value;

/// Turns a value into the string it is stored as in a configuration file.
///
/// Strings are taken verbatim (without quotes), other scalars use their usual textual form. Floats
/// always carry the decimal point (`1.0`, not `1`), so they read back as floats. Tables are
/// rendered as TOML, without the final newline.
///
/// # Examples
///
/// ```rust
/// use plywood::utils::config_string;
/// use toml::Value;
///
/// assert_eq!("hello", config_string(&Value::from("hello")));
/// assert_eq!("42", config_string(&Value::from(42)));
/// assert_eq!("true", config_string(&Value::from(true)));
/// ```
pub fn config_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(items) => {
            let items = items.iter().map(config_string).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        table @ Value::Table(_) => table.to_string().trim_end().to_owned(),
    }
}

/// The path with forward slashes as separators, on every platform.
///
/// Backslashes are taken as escapes when reading the INI files back, so paths go into them in this
/// form.
pub fn posix_path(path: &Path) -> String {
    let path = path.to_string_lossy();
    if MAIN_SEPARATOR == '\\' {
        path.replace('\\', "/")
    } else {
        path.into_owned()
    }
}

/// Serializes a path with forward slashes.
///
/// Meant to be used with `#[serde(serialize_with = ...)]`.
///
/// # Examples
///
/// ```rust
/// use std::path::PathBuf;
///
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// # #[allow(dead_code)]
/// struct Cfg {
///     #[serde(serialize_with = "plywood::utils::serialize_posix_path")]
///     logfile: PathBuf,
/// }
/// ```
pub fn serialize_posix_path<P, S>(path: &P, s: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    s.serialize_str(&posix_path(path.as_ref()))
}

/// The name of a type without the module path.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = any::type_name::<T>();
    // Generic arguments may contain paths too, cut them off first.
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
