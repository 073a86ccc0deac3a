//! Where the application keeps its files.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// The user's home directory couldn't be determined.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NoHomeDir;

impl Display for NoHomeDir {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Couldn't find the home directory to place the user files in")
    }
}

impl Error for NoHomeDir {}

/// Name, version and user directories of an application.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AppPaths {
    name: String,
    version: String,
    user_config: PathBuf,
    user_log: PathBuf,
}

impl AppPaths {
    /// The platform's usual per-user directories.
    ///
    /// Configuration goes into the config directory (eg. `~/.config/<name>`), logs into the `log`
    /// subdirectory of the cache directory (eg. `~/.cache/<name>/log`).
    pub fn new(name: &str, author: &str, version: &str) -> Result<Self, NoHomeDir> {
        let dirs = ProjectDirs::from("", author, name).ok_or(NoHomeDir)?;
        Ok(Self::with_dirs(
            name,
            version,
            dirs.config_dir(),
            dirs.cache_dir().join("log"),
        ))
    }

    /// Explicitly placed directories.
    pub fn with_dirs<N, V, C, L>(name: N, version: V, user_config: C, user_log: L) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        C: Into<PathBuf>,
        L: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            version: version.into(),
            user_config: user_config.into(),
            user_log: user_log.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.name
    }

    pub fn app_version(&self) -> &str {
        &self.version
    }

    pub fn user_config(&self) -> &Path {
        &self.user_config
    }

    pub fn user_log(&self) -> &Path {
        &self.user_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit() {
        let paths = AppPaths::with_dirs("greeter", "1.2.3", "/etc/greeter", "/var/log/greeter");
        assert_eq!("greeter", paths.app_name());
        assert_eq!("1.2.3", paths.app_version());
        assert_eq!(Path::new("/etc/greeter"), paths.user_config());
        assert_eq!(Path::new("/var/log/greeter"), paths.user_log());
    }

    #[test]
    fn platform_dirs() {
        // No home directory in some build sandboxes
        if let Ok(paths) = AppPaths::new("greeter", "plywood", "1.2.3") {
            assert!(paths.user_log().ends_with("log"));
            assert!(paths.user_config().to_string_lossy().contains("greeter"));
            assert_ne!(paths.user_config(), paths.user_log());
        }
    }
}
