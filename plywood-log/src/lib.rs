#![doc(test(attr(deny(warnings))))]
#![forbid(unsafe_code)]

//! Logging outputs for plywood applications.
//!
//! An application logs through the [`log`] facade. This crate builds the actual outputs and swaps
//! them in and out of the process at runtime:
//!
//! * The console (stdout or stderr), one `<LEVEL>: <message>` line per record, colored by the
//!   level. Info lines are printed bare.
//! * A rotating file, one `<timestamp> {"level"="<LEVEL>"} <message>` line per record, with all
//!   ANSI colors stripped.
//!
//! The outputs are described by a [`Logging`] and installed with [`Logging::install`]. Installing
//! always *replaces* whatever was installed before, it never adds to it.
//!
//! Before anything is installed, [`init`] puts a warning-level stderr output in place, so errors
//! from early startup are not lost.
//!
//! # Examples
//!
//! ```rust
//! use log::{info, LevelFilter};
//! use plywood_log::{LogDestination, Logging};
//!
//! # fn main() -> Result<(), plywood_log::AnyError> {
//! # let dir = tempfile::tempdir()?;
//! # let logfile = dir.path().join("logging.log");
//! plywood_log::init();
//! Logging::new(LevelFilter::Info)
//!     .destination(LogDestination::StdOut)
//!     .destination(LogDestination::File {
//!         filename: logfile,
//!         count: 3,
//!         size: 5_242_880,
//!     })
//!     .install()?;
//! info!("Hello");
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Once;

use chrono::Local;
use fern::Dispatch;
use itertools::Itertools;
use log::{debug, trace, LevelFilter, Log};

pub mod ansi;
pub mod format;
mod rotate;

pub use crate::rotate::RotatingFile;

/// A boxed error of any kind.
pub type AnyError = Box<dyn Error + Send + Sync>;

/// Where the log records go.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LogDestination {
    /// A size-rotated file.
    File {
        filename: PathBuf,
        /// How many rolled-over backups to keep.
        count: u32,
        /// Size in bytes at which the file rolls over.
        size: u64,
    },
    StdOut,
    StdErr,
}

fn console(logger: Dispatch) -> Dispatch {
    logger.format(|out, message, record| {
        out.finish(format_args!(
            "{}",
            format::console_line(record.level(), &message.to_string())
        ))
    })
}

impl LogDestination {
    fn create(&self) -> Result<Dispatch, AnyError> {
        trace!("Creating logger for {:?}", self);
        let logger = Dispatch::new();
        match self {
            LogDestination::File {
                filename,
                count,
                size,
            } => {
                let file = RotatingFile::open(filename.clone(), *size, *count)?;
                let logger = logger.format(|out, message, record| {
                    out.finish(format_args!(
                        "{}",
                        format::file_line(
                            Local::now().format(format::TIMESTAMP_FORMAT),
                            record.level(),
                            &message.to_string(),
                        )
                    ))
                });
                Ok(logger.chain(Box::new(file) as Box<dyn Log>))
            }
            LogDestination::StdOut => Ok(console(logger).chain(io::stdout())),
            LogDestination::StdErr => Ok(console(logger).chain(io::stderr())),
        }
    }
}

/// Description of the complete logging setup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Logging {
    level: LevelFilter,
    destinations: Vec<LogDestination>,
}

impl Logging {
    /// Creates a setup with no outputs, letting through records of the given level and more
    /// severe.
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            destinations: Vec::new(),
        }
    }

    /// Adds another output.
    pub fn destination(self, destination: LogDestination) -> Self {
        let mut destinations = self.destinations;
        destinations.push(destination);
        Self {
            destinations,
            ..self
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn destinations(&self) -> &[LogDestination] {
        &self.destinations
    }

    /// Builds the logger, without installing it.
    ///
    /// Fails if any of the outputs can't be opened (eg. the log file is not writable).
    pub fn create(&self) -> Result<(LevelFilter, Box<dyn Log>), AnyError> {
        debug!("Creating {} loggers", self.destinations.len());
        let result = self
            .destinations
            .iter()
            .map(LogDestination::create)
            .fold_ok(Dispatch::new(), Dispatch::chain)?
            .level(self.level)
            .into_log();
        Ok(result)
    }

    /// Builds the logger and replaces the currently installed one with it.
    pub fn install(&self) -> Result<(), AnyError> {
        install(self.create()?);
        Ok(())
    }
}

/// Replaces the process logger.
pub fn install((max_log_level, top_logger): (LevelFilter, Box<dyn Log>)) {
    debug!("Installing loggers");
    log_reroute::reroute_boxed(top_logger);
    log::set_max_level(max_log_level);
}

static INIT: Once = Once::new();

/// Prepares the process for logging.
///
/// Puts the rerouting logger in place, makes panics go to the log and installs a stderr output
/// for warnings and errors. Only the first call does anything.
pub fn init() {
    INIT.call_once(|| {
        let _ = log_reroute::init();
        log_panics::init();
        let fallback = Logging::new(LevelFilter::Warn).destination(LogDestination::StdErr);
        match fallback.create() {
            Ok(logger) => install(logger),
            Err(e) => eprintln!("Failed to set up the early logging: {}", e),
        }
    });
}
