//! Configuration files with regenerated defaults.
//!
//! Each configuration file comes as a pair. Next to the file the user edits lives a sibling
//! *default file* (`app.conf` has `app.default.conf`), holding the defaults the application
//! knows. The default file is rewritten on every [`load`][ConfigurationFile::load], so it always
//! documents the current defaults, and then both files are read, the user file overriding the
//! defaults option by option.
//!
//! The files are in the INI format:
//!
//! ```ini
//! [loggingconfig]
//! count = 3
//! logfile = /home/me/.cache/app/log/logging.log
//! ```
//!
//! Some details of the INI reader:
//!
//! * Section and option names are case insensitive. Dots in them have no special meaning.
//! * `;` and `#` start a comment, even in the middle of a line.
//! * A backslash is an escape character (paths therefore use forward slashes, see
//!   [`serialize_posix_path`][crate::utils::serialize_posix_path]).
//! * Quotes are part of the value.
//! * An option outside of any section is an error.
//!
//! The default file is written with the matching escapes, so every default reads back as it was
//! set.

use std::collections::BTreeMap;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use err_context::prelude::*;
use log::trace;
use serde::Serialize;
use toml::Value;

use crate::error::AnyError;
use crate::store::{ConfigError, ConfigStore};
use crate::utils;

/// An error returned when the defaults don't serialize into a table of fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotATable(pub String);

impl Display for NotATable {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Defaults of type {} are not a structure", self.0)
    }
}

impl Error for NotATable {}

/// Where the defaults of a configuration file come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DefaultSource {
    /// A whole store, used as the defaults verbatim.
    Store(ConfigStore),

    /// Values of a single section, merged into the current defaults.
    Section {
        name: String,
        values: BTreeMap<String, String>,
    },
}

impl DefaultSource {
    /// A section with explicitly listed values.
    ///
    /// ```rust
    /// use plywood::DefaultSource;
    ///
    /// let defaults = DefaultSource::section("server", vec![("port", "8080"), ("host", "::")]);
    /// # let _defaults = defaults;
    /// ```
    pub fn section<N, I, K, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        DefaultSource::Section {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// A section built from the fields of a structure.
    ///
    /// The section is named after the type (without its module path). Fields starting with an
    /// underscore are skipped, the values are converted by
    /// [`config_string`][crate::utils::config_string].
    ///
    /// ```rust
    /// use plywood::DefaultSource;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Server {
    ///     port: u16,
    ///     verbose: bool,
    ///     _scratch: u32,
    /// }
    ///
    /// # fn main() -> Result<(), plywood::AnyError> {
    /// let defaults = DefaultSource::from_struct(&Server {
    ///     port: 8080,
    ///     verbose: false,
    ///     _scratch: 0,
    /// })?;
    /// assert_eq!(
    ///     DefaultSource::section("Server", vec![("port", "8080"), ("verbose", "false")]),
    ///     defaults
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_struct<T: Serialize>(defaults: &T) -> Result<Self, AnyError> {
        let name = utils::short_type_name::<T>();
        let table = match Value::try_from(defaults)
            .with_context(|_| format!("Failed to serialize defaults of {}", name))?
        {
            Value::Table(table) => table,
            _ => return Err(NotATable(name.to_owned()).into()),
        };
        let values = table
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key.clone(), utils::config_string(value)));
        Ok(DefaultSource::section(name, values))
    }
}

impl From<ConfigStore> for DefaultSource {
    fn from(store: ConfigStore) -> Self {
        DefaultSource::Store(store)
    }
}

/// The path of the default file belonging to a configuration file.
///
/// That is `<parent>/<stem>.default<suffix>`.
///
/// ```rust
/// use std::path::Path;
///
/// use plywood::cfg_loader::default_filepath;
///
/// assert_eq!(
///     Path::new("/etc/app/logging.default.conf"),
///     default_filepath(Path::new("/etc/app/logging.conf"))
/// );
/// ```
pub fn default_filepath(filepath: &Path) -> PathBuf {
    let mut name = filepath
        .file_stem()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".default");
    if let Some(extension) = filepath.extension() {
        name.push(".");
        name.push(extension);
    }
    filepath.with_file_name(name)
}

fn read_layers(paths: &[&Path]) -> Result<ConfigStore, AnyError> {
    let mut store = ConfigStore::new();
    for path in paths {
        let text = match fs::read_to_string(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("Configuration layer {} doesn't exist", path.display());
                continue;
            }
            text => text
                .with_context(|_| format!("Failed to read configuration file {}", path.display()))?,
        };
        trace!("Reading configuration layer {}", path.display());
        let layer = ConfigStore::from_ini(&text)
            .with_context(|_| format!("Failed to parse configuration file {}", path.display()))?;
        store.merge(&layer);
    }
    Ok(store)
}

/// One configuration file together with its defaults.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigurationFile {
    filepath: PathBuf,
    defaults: ConfigStore,
    store: ConfigStore,
}

impl ConfigurationFile {
    /// Creates the file descriptor, without touching the disk.
    pub fn new<P: Into<PathBuf>>(filepath: P) -> Self {
        Self {
            filepath: filepath.into(),
            defaults: ConfigStore::new(),
            store: ConfigStore::new(),
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn set_filepath<P: Into<PathBuf>>(&mut self, filepath: P) {
        self.filepath = filepath.into();
    }

    pub fn default_filepath(&self) -> PathBuf {
        default_filepath(&self.filepath)
    }

    /// The defaults written into the default file.
    pub fn defaults(&self) -> &ConfigStore {
        &self.defaults
    }

    /// The values of the last [`load`][ConfigurationFile::load].
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn into_store(self) -> ConfigStore {
        self.store
    }

    /// Changes the defaults.
    ///
    /// A [`DefaultSource::Store`] replaces them altogether, a [`DefaultSource::Section`] is merged
    /// in value by value.
    pub fn set_default(&mut self, source: DefaultSource) {
        match source {
            DefaultSource::Store(store) => self.defaults = store,
            DefaultSource::Section { name, values } => {
                self.defaults.add_section(&name);
                for (option, value) in values {
                    self.defaults.set(&name, &option, value);
                }
            }
        }
    }

    pub fn set_default_from_store(&mut self, store: &ConfigStore) {
        self.set_default(DefaultSource::Store(store.clone()));
    }

    pub fn set_default_from_struct<T: Serialize>(&mut self, defaults: &T) -> Result<(), AnyError> {
        self.set_default(DefaultSource::from_struct(defaults)?);
        Ok(())
    }

    /// Writes the default file and reads the configuration.
    ///
    /// If `default` is given, it is applied by [`set_default`][ConfigurationFile::set_default]
    /// first. Then the default file is written (its directory created if needed) and both the
    /// default and the user file are read, the later overriding the former. The user file doesn't
    /// have to exist.
    ///
    /// Each load starts anew, so loading again gives the same result as long as the files don't
    /// change.
    pub fn load(&mut self, default: Option<DefaultSource>) -> Result<&ConfigStore, AnyError> {
        if let Some(default) = default {
            self.set_default(default);
        }
        let default_filepath = self.default_filepath();
        self.write_defaults(&default_filepath)?;
        self.store = read_layers(&[default_filepath.as_path(), self.filepath.as_path()])?;
        Ok(&self.store)
    }

    fn write_defaults(&self, path: &Path) -> Result<(), AnyError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|_| {
                format!("Failed to create configuration directory {}", parent.display())
            })?;
        }
        trace!("Writing configuration defaults to {}", path.display());
        fs::write(path, self.defaults.to_string())
            .with_context(|_| format!("Failed to write default file {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, section: &str, option: &str) -> Result<&str, ConfigError> {
        self.store.get(section, option)
    }

    pub fn get_int(&self, section: &str, option: &str) -> Result<i64, ConfigError> {
        self.store.get_int(section, option)
    }

    pub fn get_float(&self, section: &str, option: &str) -> Result<f64, ConfigError> {
        self.store.get_float(section, option)
    }

    pub fn get_bool(&self, section: &str, option: &str) -> Result<bool, ConfigError> {
        self.store.get_bool(section, option)
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    fn tmp() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn default_paths() {
        assert_eq!(
            Path::new("a/b/app.default.conf"),
            default_filepath(Path::new("a/b/app.conf"))
        );
        assert_eq!(
            Path::new("app.default"),
            default_filepath(Path::new("app"))
        );
        assert_eq!(
            Path::new("x/app.tar.default.gz"),
            default_filepath(Path::new("x/app.tar.gz"))
        );
    }

    #[test]
    fn sections_merge_field_wise() {
        let mut file = ConfigurationFile::new("app.conf");
        file.set_default(DefaultSource::section("s", vec![("a", "1"), ("b", "2")]));
        file.set_default(DefaultSource::section("s", vec![("b", "3")]));
        assert_eq!("1", file.defaults().get("s", "a").unwrap());
        assert_eq!("3", file.defaults().get("s", "b").unwrap());
    }

    #[test]
    fn store_replaces() {
        let mut other = ConfigStore::new();
        other.set("other", "key", "value");
        let mut file = ConfigurationFile::new("app.conf");
        file.set_default(DefaultSource::section("s", vec![("a", "1")]));
        file.set_default_from_store(&other);
        assert_eq!(&other, file.defaults());
        // A deep copy, changes to the source don't propagate
        other.set("other", "key", "changed");
        assert_eq!("value", file.defaults().get("other", "key").unwrap());
    }

    #[derive(Serialize)]
    struct Server {
        port: u16,
        ratio: f64,
        verbose: bool,
        name: String,
        _secret: String,
    }

    #[test]
    fn struct_defaults() {
        let source = DefaultSource::from_struct(&Server {
            port: 8080,
            ratio: 1.0,
            verbose: true,
            name: "plywood".to_owned(),
            _secret: "hidden".to_owned(),
        })
        .unwrap();
        match source {
            DefaultSource::Section { name, values } => {
                assert_eq!("Server", name);
                assert_eq!(4, values.len());
                assert_eq!("8080", values["port"]);
                assert_eq!("1.0", values["ratio"]);
                assert_eq!("true", values["verbose"]);
                assert_eq!("plywood", values["name"]);
            }
            other => panic!("Unexpected source {:?}", other),
        }
    }

    #[test]
    fn non_struct_defaults() {
        let err = DefaultSource::from_struct(&42).unwrap_err();
        assert!(err.downcast_ref::<NotATable>().is_some());
    }

    #[test]
    fn load_writes_defaults_and_merges() {
        let dir = tmp();
        let path = dir.path().join("nested").join("app.conf");
        let mut file = ConfigurationFile::new(&path);
        let store = file
            .load(Some(DefaultSource::section(
                "server",
                vec![("port", "8080"), ("host", "localhost")],
            )))
            .unwrap()
            .clone();
        assert_eq!(8080, store.get_int("server", "port").unwrap());

        let written = fs::read_to_string(dir.path().join("nested/app.default.conf")).unwrap();
        assert_eq!("[server]\nhost = localhost\nport = 8080\n\n", written);

        fs::write(&path, "[server]\nport = 9090\n\n[extra]\nkey = value\n").unwrap();
        let store = file.load(None).unwrap();
        assert_eq!(9090, store.get_int("server", "port").unwrap());
        assert_eq!("localhost", store.get("server", "host").unwrap());
        assert_eq!("value", store.get("extra", "key").unwrap());
        assert_eq!(9090, file.get_int("server", "port").unwrap());
    }

    /// User values never leak into the defaults.
    #[test]
    fn load_is_idempotent() {
        let dir = tmp();
        let path = dir.path().join("app.conf");
        fs::write(&path, "[server]\nport = 9090\n").unwrap();
        let mut file = ConfigurationFile::new(&path);
        let defaults = DefaultSource::section("server", vec![("port", "8080")]);
        let first = file.load(Some(defaults.clone())).unwrap().clone();
        let second = file.load(Some(defaults)).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!("8080", file.defaults().get("server", "port").unwrap());
        let written = fs::read_to_string(file.default_filepath()).unwrap();
        assert!(written.contains("port = 8080"));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let dir = tmp();
        let path = dir.path().join("app.conf");
        fs::write(&path, "[Server]\nPort = 9090\n").unwrap();
        let mut file = ConfigurationFile::new(&path);
        file.load(Some(DefaultSource::section("server", vec![("port", "8080")])))
            .unwrap();
        assert_eq!(9090, file.get_int("SERVER", "port").unwrap());
    }

    #[test]
    fn nothing_at_all() {
        let dir = tmp();
        let mut file = ConfigurationFile::new(dir.path().join("empty.conf"));
        assert!(file.load(None).unwrap().is_empty());
        assert_eq!(
            "",
            fs::read_to_string(dir.path().join("empty.default.conf")).unwrap()
        );
    }

    #[test]
    fn option_outside_section_fails() {
        let dir = tmp();
        let path = dir.path().join("app.conf");
        fs::write(&path, "orphan = 1\n[server]\nport = 1\n").unwrap();
        let mut file = ConfigurationFile::new(&path);
        assert!(file.load(None).is_err());
    }

    #[test]
    fn typed_errors() {
        let dir = tmp();
        let path = dir.path().join("app.conf");
        fs::write(&path, "[server]\nport = many\nverbose = off\n").unwrap();
        let mut file = ConfigurationFile::new(&path);
        file.load(None).unwrap();
        assert!(!file.get_bool("server", "verbose").unwrap());
        assert!(matches!(
            file.get_int("server", "port"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            file.get_float("client", "ratio"),
            Err(ConfigError::MissingSection(_))
        ));
    }

    /// What the writer produces reads back the same.
    #[test]
    fn written_ini_reads_back() {
        let dir = tmp();
        let mut store = ConfigStore::new();
        store.set("LoggingConfig", "logfile", "/var/log/app/logging.log");
        store.set("LoggingConfig", "count", "3");
        store.set("other", "ratio", "0.5");
        let mut file = ConfigurationFile::new(dir.path().join("app.conf"));
        let loaded = file.load(Some(store.clone().into())).unwrap();
        assert_eq!(&store, loaded);
    }

    #[derive(Serialize)]
    struct Nested {
        inner: Server,
    }

    /// Comment and escape characters in defaults survive the default file.
    #[test]
    fn special_defaults_read_back() {
        let dir = tmp();
        let mut file = ConfigurationFile::new(dir.path().join("app.conf"));
        let values = vec![
            ("url", "http://host/page#anchor"),
            ("pattern", "a;b"),
            ("quoted", "\"x\""),
            ("winpath", "C:\\temp\\log"),
            ("lines", "first\nsecond"),
        ];
        let store = file
            .load(Some(DefaultSource::section("s", values.clone())))
            .unwrap()
            .clone();
        for (option, value) in values {
            assert_eq!(value, store.get("s", option).unwrap());
        }

        let nested = Nested {
            inner: Server {
                port: 1,
                ratio: 0.5,
                verbose: false,
                name: "a # b".to_owned(),
                _secret: String::new(),
            },
        };
        let expected = DefaultSource::from_struct(&nested).unwrap();
        let store = file.load(Some(expected.clone())).unwrap();
        match expected {
            DefaultSource::Section { name, values } => {
                assert!(values["inner"].contains('\n'));
                assert_eq!(values["inner"], store.get(&name, "inner").unwrap());
            }
            other => panic!("Unexpected source {:?}", other),
        }
    }

    #[test]
    fn dotted_sections() {
        let dir = tmp();
        let path = dir.path().join("app.conf");
        fs::write(&path, "[server.main]\nport = 1\n").unwrap();
        let mut file = ConfigurationFile::new(&path);
        let store = file
            .load(Some(DefaultSource::section("server.backup", vec![("port", "2")])))
            .unwrap();
        assert_eq!(1, store.get_int("server.main", "port").unwrap());
        assert_eq!(2, store.get_int("server.backup", "port").unwrap());
        assert!(!store.has_section("server"));
    }
}
