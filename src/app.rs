//! The application lifecycle.
//!
//! An [`Application`] runs the same sequence of steps every time:
//!
//! 1. Parses the command line options.
//! 2. Loads the registered configuration files, in the order they were added.
//! 3. Configures logging to the console and into a rotating file, using the `logging`
//!    configuration if one was registered.
//! 4. Logs the startup diagnostics.
//! 5. Runs the body of the application.
//! 6. Logs how long it all took and exits.
//!
//! If any step fails, the rest is skipped and the process exits with 1.

use std::ffi::OsString;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::Instant;

use chrono::Local;
use log::{debug, info, warn, LevelFilter};
use plywood_log::{LogDestination, Logging};
use serde::Serialize;
use structopt::StructOpt;

use crate::cfg_loader::{ConfigurationFile, DefaultSource};
use crate::diagnostics::{self, HostProbe, SystemProbe};
use crate::empty::Empty;
use crate::environment::Environment;
use crate::error::{self, AnyError};
use crate::paths::AppPaths;
use crate::store::{ConfigError, ConfigStore};
use crate::time;
use crate::utils;

/// Name of the configuration the logging settings are read from.
pub const LOGGING: &str = "logging";

/// How the application terminates.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Exit {
    /// Exit with the status code.
    Code(i32),
    /// Print the message to stderr and exit with 1. An empty message is a success.
    Message(String),
}

impl Exit {
    pub const SUCCESS: Exit = Exit::Code(0);

    /// The process exit status.
    pub fn code(&self) -> i32 {
        match self {
            Exit::Code(code) => *code,
            Exit::Message(msg) if msg.is_empty() => 0,
            Exit::Message(_) => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() == 0
    }

    /// Ends the process.
    pub fn terminate(self) -> ! {
        if let Exit::Message(msg) = &self {
            if !msg.is_empty() {
                eprintln!("{}", msg);
            }
        }
        process::exit(self.code())
    }
}

impl From<()> for Exit {
    fn from(_: ()) -> Self {
        Exit::SUCCESS
    }
}

impl From<i32> for Exit {
    fn from(code: i32) -> Self {
        Exit::Code(code)
    }
}

/// A missing code is a success, `None` becomes `0`.
impl From<Option<i32>> for Exit {
    fn from(code: Option<i32>) -> Self {
        Exit::Code(code.unwrap_or(0))
    }
}

impl From<String> for Exit {
    fn from(msg: String) -> Self {
        Exit::Message(msg)
    }
}

impl From<&str> for Exit {
    fn from(msg: &str) -> Self {
        Exit::Message(msg.to_owned())
    }
}

/// The default logging settings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LoggingConfig {
    #[serde(serialize_with = "utils::serialize_posix_path")]
    pub logfile: PathBuf,
    /// How many rolled over log files to keep.
    pub count: u32,
    /// Size in bytes at which the log file rolls over.
    pub size: u64,
}

impl LoggingConfig {
    /// The section the settings live in.
    pub const SECTION: &'static str = "LoggingConfig";

    /// `logging.log` in the given directory, 3 backups of 5 MiB.
    pub fn new(log_dir: &Path) -> Self {
        Self {
            logfile: log_dir.join("logging.log"),
            count: 3,
            size: 5_242_880,
        }
    }

    /// The settings as defaults of a configuration file.
    pub fn to_defaults(&self) -> Result<DefaultSource, AnyError> {
        DefaultSource::from_struct(self)
    }
}

/// Parses a level name.
///
/// Besides the names of the [`log`] crate, `WARNING`, `CRITICAL` (error) and `NOTSET` (everything)
/// are understood. Case doesn't matter.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_uppercase().as_str() {
        "WARNING" => Some(LevelFilter::Warn),
        "CRITICAL" | "FATAL" => Some(LevelFilter::Error),
        "NOTSET" => Some(LevelFilter::Trace),
        other => LevelFilter::from_str(other).ok(),
    }
}

/// The logging setup resolved from a configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggingSettings {
    pub logfile: PathBuf,
    pub count: u32,
    pub size: u64,
    pub level: LevelFilter,
}

fn lookup<'a, T, F>(store: &'a ConfigStore, option: &str, parse: F) -> Result<Option<T>, ConfigError>
where
    F: FnOnce(&'a str, &str) -> Result<T, ConfigError>,
{
    store
        .find_section(LoggingConfig::SECTION, option)
        .map(|section| parse(section, option))
        .transpose()
}

impl LoggingSettings {
    /// Reads the settings out of a configuration.
    ///
    /// Each option is looked for in the `LoggingConfig` section first, then in any other section.
    /// Whatever isn't there is taken from the defaults, the level from `level`.
    pub fn resolve(
        store: &ConfigStore,
        defaults: &LoggingConfig,
        level: LevelFilter,
    ) -> Result<Self, ConfigError> {
        let logfile = lookup(store, "logfile", |s, o| store.get(s, o))?
            .map(PathBuf::from)
            .unwrap_or_else(|| defaults.logfile.clone());
        let count = lookup(store, "count", |s, o| {
            store.get_parsed(s, o, "number of backups")
        })?
        .unwrap_or(defaults.count);
        let size = lookup(store, "size", |s, o| store.get_parsed(s, o, "size in bytes"))?
            .unwrap_or(defaults.size);
        let level = lookup(store, "log_level", |s, o| {
            let value = store.get(s, o)?;
            parse_level(value).ok_or_else(|| ConfigError::InvalidValue {
                section: s.to_owned(),
                option: o.to_owned(),
                value: value.to_owned(),
                expected: "log level",
            })
        })?
        .unwrap_or(level);
        Ok(Self {
            logfile,
            count,
            size,
            level,
        })
    }

    /// The console and the rotating file.
    pub fn logging(&self) -> Logging {
        Logging::new(self.level)
            .destination(LogDestination::StdOut)
            .destination(LogDestination::File {
                filename: self.logfile.clone(),
                count: self.count,
                size: self.size,
            })
    }
}

/// A configuration file the application loads on start.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigurationDescriptor {
    /// The path, relative to the user configuration directory.
    pub path: PathBuf,
    pub defaults: Option<DefaultSource>,
}

impl ConfigurationDescriptor {
    /// The name the configuration is available under, the stem of the file name.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The application lifecycle.
///
/// The `O` are the command line options, parsed by [`structopt`].
///
/// ```rust,no_run
/// use plywood::prelude::*;
/// use structopt::StructOpt;
///
/// #[derive(Debug, StructOpt)]
/// struct Opts {
///     #[structopt(long, default_value = "World")]
///     name: String,
/// }
///
/// fn main() -> Result<(), AnyError> {
///     let paths = AppPaths::new("greeter", "plywood", env!("CARGO_PKG_VERSION"))?;
///     let mut app = Application::<Opts>::new(paths);
///     let logging = app.default_logging_config().to_defaults()?;
///     app.add_configuration_file("logging.conf", Some(logging));
///     app.run(|env| {
///         log::info!("Hello {}", env.name);
///         Ok(())
///     })
/// }
/// ```
pub struct Application<O = Empty> {
    paths: AppPaths,
    log_level: LevelFilter,
    default_logging_config: Option<LoggingConfig>,
    configuration_files: Vec<ConfigurationDescriptor>,
    probe: Box<dyn SystemProbe>,
    _opts: PhantomData<fn() -> O>,
}

impl<O> Application<O> {
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            log_level: LevelFilter::Debug,
            default_logging_config: None,
            configuration_files: Vec::new(),
            probe: Box::new(HostProbe),
            _opts: PhantomData,
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// The level logged on unless the `logging` configuration says otherwise.
    ///
    /// Defaults to [`LevelFilter::Debug`].
    pub fn log_level(self, log_level: LevelFilter) -> Self {
        Self { log_level, ..self }
    }

    /// Replaces the source of the startup diagnostics.
    pub fn with_probe<P: SystemProbe + 'static>(self, probe: P) -> Self {
        Self {
            probe: Box::new(probe),
            ..self
        }
    }

    /// The default logging settings, placed in the user log directory unless set explicitly.
    pub fn default_logging_config(&mut self) -> &LoggingConfig {
        let log_dir = self.paths.user_log();
        self.default_logging_config
            .get_or_insert_with(|| LoggingConfig::new(log_dir))
    }

    pub fn set_default_logging_config(&mut self, config: LoggingConfig) {
        self.default_logging_config = Some(config);
    }

    /// Registers a configuration file to be loaded on start.
    ///
    /// The path is relative to the user configuration directory. The same path may be registered
    /// multiple times, the later one wins in the [`Environment`].
    pub fn add_configuration_file<P: Into<PathBuf>>(
        &mut self,
        path: P,
        defaults: Option<DefaultSource>,
    ) -> &mut Self {
        self.configuration_files.push(ConfigurationDescriptor {
            path: path.into(),
            defaults,
        });
        self
    }

    /// Unregisters the first configuration file of that path.
    pub fn remove_configuration_file<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        let path = path.as_ref();
        if let Some(pos) = self
            .configuration_files
            .iter()
            .position(|descriptor| descriptor.path == path)
        {
            self.configuration_files.remove(pos);
        }
        self
    }

    pub fn empty_configuration_files(&mut self) -> &mut Self {
        self.configuration_files.clear();
        self
    }

    pub fn configuration_files(&self) -> &[ConfigurationDescriptor] {
        &self.configuration_files
    }

    fn load_configuration(&self, descriptor: &ConfigurationDescriptor) -> Result<ConfigStore, AnyError> {
        let filepath = self.paths.user_config().join(&descriptor.path);
        debug!("Load configuration {} ...", utils::posix_path(&filepath));
        let mut file = ConfigurationFile::new(filepath);
        file.load(descriptor.defaults.clone())?;
        Ok(file.into_store())
    }

    fn configure_logging(&mut self, environment: &Environment<O>) -> Result<(), AnyError> {
        let defaults = self.default_logging_config().clone();
        let empty = ConfigStore::new();
        let store = environment.config(LOGGING).unwrap_or(&empty);
        let settings = LoggingSettings::resolve(store, &defaults, self.log_level)?;
        settings.logging().install()
    }

    fn emit_diagnostics(&self) {
        let info = self.probe.system_info(&self.paths);
        diagnostics::log_system_info(&info);
        if info.platform == "Linux" {
            match self.probe.os_release() {
                Some(release) => diagnostics::log_distro(&release, Local::now().date_naive()),
                None => debug!("No os-release information available"),
            }
        }
        diagnostics::log_warnings(&info);
    }

    fn quit(&self, started: Instant, exit: Exit) -> Exit {
        let duration = time::human_readable_duration(started.elapsed());
        info!("{} has finished in {}", self.paths.app_name(), duration);
        exit
    }

    fn launch<B, R>(mut self, started: Instant, opts: O, body: B) -> Result<Exit, AnyError>
    where
        B: FnOnce(&Environment<O>) -> Result<R, AnyError>,
        R: Into<Exit>,
    {
        let mut environment = Environment::new(opts);
        for descriptor in &self.configuration_files {
            let store = self.load_configuration(descriptor)?;
            let name = descriptor.name();
            if environment.attach(name.as_str(), store).is_some() {
                warn!("Configuration {} loaded more than once, using the last one", name);
            }
        }
        self.configure_logging(&environment)?;
        info!("Start {} ...", self.paths.app_name());
        self.emit_diagnostics();
        let exit = body(&environment)?.into();
        Ok(self.quit(started, exit))
    }
}

impl<O: StructOpt> Application<O> {
    /// Runs the whole lifecycle and exits the process.
    ///
    /// The command line is taken from the process arguments. Invalid arguments end the process
    /// with a usage message. Any error is logged and the process exits with 1. Otherwise the exit
    /// status is what the body returned (`()` being a success).
    pub fn run<B, R>(self, body: B) -> !
    where
        B: FnOnce(&Environment<O>) -> Result<R, AnyError>,
        R: Into<Exit>,
    {
        let started = Instant::now();
        plywood_log::init();
        debug!("Parse arguments ...");
        let opts = O::from_args();
        match error::log_errors(module_path!(), || self.launch(started, opts, body)) {
            Ok(exit) => exit.terminate(),
            Err(_) => process::exit(1),
        }
    }

    /// Runs the whole lifecycle with the given command line, returning instead of exiting.
    ///
    /// The first argument is the program name. Invalid arguments (and `--help`) are returned as
    /// errors.
    pub fn execute_from<I, B, R>(self, args: I, body: B) -> Result<Exit, AnyError>
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
        B: FnOnce(&Environment<O>) -> Result<R, AnyError>,
        R: Into<Exit>,
    {
        let started = Instant::now();
        plywood_log::init();
        debug!("Parse arguments ...");
        let opts = O::from_iter_safe(args)?;
        self.launch(started, opts, body)
    }
}
