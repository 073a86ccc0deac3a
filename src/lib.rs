#![doc(test(attr(deny(warnings))))]
#![forbid(unsafe_code)]

//! A small toolkit for command line applications.
//!
//! Most command line tools end up doing the same boring things before they get to do anything
//! useful. They parse their options, find their configuration files, set up logging and maybe
//! tell the user something about the machine they run on. This crate does these things in one
//! fixed sequence, so the application only supplies its options type, its configuration files
//! and the body with the actual work.
//!
//! # What happens
//!
//! The [`Application`] drives the lifecycle:
//!
//! * The command line is parsed into the application's [`StructOpt`] options type ([`Empty`] if
//!   it has none).
//! * Every registered configuration file is loaded. Its defaults are written into a sibling
//!   *default file* first (`app.conf` gets `app.default.conf`), then both files are read, values
//!   of the user's file overriding the defaults. The result is available to the body through the
//!   [`Environment`], under the stem of the file name.
//! * Logging goes to the console (colored, `INFO` lines without the level prefix) and into a
//!   rotating log file (plain, timestamped). The `logging` configuration, if registered, tells
//!   where the file is, how large it may grow, how many old files to keep and the level.
//! * A few debug lines about the host are logged, with warnings if memory or disk space is
//!   scarce.
//! * The body runs. Whatever it returns decides the exit status.
//! * The time it all took is logged.
//!
//! # Examples
//!
//! ```rust,no_run
//! use log::info;
//! use plywood::prelude::*;
//! use structopt::StructOpt;
//!
//! #[derive(Debug, StructOpt)]
//! struct Opts {
//!     /// Whom to greet.
//!     #[structopt(long, default_value = "World")]
//!     name: String,
//! }
//!
//! fn main() -> Result<(), AnyError> {
//!     let paths = AppPaths::new("greeter", "plywood", env!("CARGO_PKG_VERSION"))?;
//!     let mut app = Application::<Opts>::new(paths);
//!     let logging = app.default_logging_config().to_defaults()?;
//!     app.add_configuration_file("logging.conf", Some(logging))
//!         .add_configuration_file(
//!             "greeter.conf",
//!             Some(DefaultSource::section("greeting", vec![("word", "Hello")])),
//!         );
//!     app.run(|env| {
//!         let word = env
//!             .config("greeter")
//!             .map(|cfg| cfg.get_or("greeting", "word", "Hello"))
//!             .unwrap_or("Hello");
//!         info!("{} {}", word, env.name);
//!         Ok(())
//!     })
//! }
//! ```
//!
//! [`StructOpt`]: https://crates.io/crates/structopt

pub mod app;
pub mod cfg_loader;
pub mod diagnostics;
mod empty;
pub mod environment;
pub mod error;
pub mod global;
pub mod paths;
pub mod store;
pub mod time;
pub mod utils;

pub use plywood_log::{ansi, LogDestination, Logging};

pub use crate::app::{Application, ConfigurationDescriptor, Exit, LoggingConfig};
pub use crate::cfg_loader::{ConfigurationFile, DefaultSource};
pub use crate::empty::Empty;
pub use crate::environment::Environment;
pub use crate::error::AnyError;
pub use crate::paths::AppPaths;
pub use crate::store::{ConfigError, ConfigStore, IniError};

pub mod prelude {
    pub use super::{
        AnyError, AppPaths, Application, ConfigStore, DefaultSource, Empty, Environment, Exit,
    };
}
