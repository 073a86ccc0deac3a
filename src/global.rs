//! Process-wide runtime configuration.
//!
//! Sometimes a value is needed deep inside some code that has no access to the
//! [`Environment`][crate::Environment]. The application can publish a table of such values here
//! once it knows them and anything can read them later.
//!
//! Publishing replaces the whole table atomically, readers always see either the old or the new
//! one.
//!
//! ```rust
//! use plywood::global;
//! use toml::Value;
//!
//! global::make_config(vec![
//!     ("greeting", Value::from("Hello")),
//!     ("retries", Value::from(3)),
//! ]);
//! assert_eq!(Some(Value::from(3)), global::conf("retries"));
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use toml::value::{Table, Value};

static CONFIG: Lazy<ArcSwap<Table>> = Lazy::new(Default::default);

/// Publishes a new table, replacing the previous one.
pub fn make_config<I, K>(entries: I)
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let table = entries
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect::<Table>();
    CONFIG.store(Arc::new(table));
}

/// The currently published table.
pub fn config() -> Arc<Table> {
    CONFIG.load_full()
}

/// Looks a single value up.
///
/// The key may be dotted to reach into nested tables, like `server.port`.
pub fn conf(key: &str) -> Option<Value> {
    let config = config();
    let mut parts = key.split('.');
    let mut current = config.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The table is shared by the whole process, so everything is checked in one test.
    #[test]
    fn publish_and_read() {
        let mut server = Table::new();
        server.insert("port".to_owned(), Value::from(8080));
        make_config(vec![
            ("name", Value::from("plywood")),
            ("server", Value::Table(server)),
        ]);

        assert_eq!(2, config().len());
        assert_eq!(Some(Value::from("plywood")), conf("name"));
        assert_eq!(Some(Value::from(8080)), conf("server.port"));
        assert_eq!(None, conf("server.host"));
        assert_eq!(None, conf("name.inner"));
        assert_eq!(None, conf("missing"));

        let old = config();
        make_config(vec![("name", Value::from("other"))]);
        assert_eq!(Some(Value::from("other")), conf("name"));
        assert_eq!(None, conf("server"));
        // Readers holding the old table still see it whole
        assert_eq!(2, old.len());
    }
}
