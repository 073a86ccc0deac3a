//! What the application body gets to work with.

use std::collections::BTreeMap;
use std::ops::Deref;

use crate::empty::Empty;
use crate::store::ConfigStore;

/// The parsed command line options and the loaded configurations.
///
/// Each configuration is available under the stem of its file name, so `logging.conf` ends up as
/// `environment.config("logging")`. The options are reachable directly through [`Deref`].
///
/// ```rust
/// use plywood::{ConfigStore, Environment};
/// use structopt::StructOpt;
///
/// #[derive(Debug, StructOpt)]
/// struct Opts {
///     #[structopt(long)]
///     name: String,
/// }
///
/// let mut env = Environment::new(Opts::from_iter(vec!["app", "--name", "World"]));
/// env.attach("app", ConfigStore::new());
/// assert_eq!("World", env.name);
/// assert!(env.config("app").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Environment<O = Empty> {
    opts: O,
    configs: BTreeMap<String, ConfigStore>,
}

impl<O> Environment<O> {
    /// An environment with the options and no configuration yet.
    pub fn new(opts: O) -> Self {
        Self {
            opts,
            configs: BTreeMap::new(),
        }
    }

    pub fn opts(&self) -> &O {
        &self.opts
    }

    /// Puts a loaded configuration in under the given name.
    ///
    /// Returns the configuration previously known under the name, if any.
    pub fn attach<N: Into<String>>(&mut self, name: N, store: ConfigStore) -> Option<ConfigStore> {
        self.configs.insert(name.into(), store)
    }

    pub fn config(&self, name: &str) -> Option<&ConfigStore> {
        self.configs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    /// All the configurations, sorted by their names.
    pub fn configs(&self) -> impl Iterator<Item = (&str, &ConfigStore)> {
        self.configs.iter().map(|(name, store)| (name.as_str(), store))
    }
}

impl<O> Deref for Environment<O> {
    type Target = O;
    fn deref(&self) -> &O {
        &self.opts
    }
}
