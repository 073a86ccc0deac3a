//! Error handling utilities.

use std::error::Error;

use err_context::prelude::*;
use log::{log, Level};

/// A wrapper type for any error.
///
/// This is just a type alias for boxed standard error. Any errors go and this is guaranteed to be
/// fully compatible.
pub type AnyError = Box<dyn Error + Send + Sync>;

/// How to format errors in logs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum ErrorLogFormat {
    /// Each cause goes into its own log message.
    MultiLine,

    /// The error is formatted on a single line, the causes separated by `: `.
    SingleLine,
}

/// Formats the error with all its causes on one line.
pub fn describe(e: &AnyError) -> String {
    e.display(": ").to_string()
}

/// Logs one error with all its causes on the given level.
pub fn log_error(level: Level, target: &str, e: &AnyError, format: ErrorLogFormat) {
    match format {
        ErrorLogFormat::MultiLine => {
            for cause in e.chain() {
                log!(target: target, level, "{}", cause);
            }
        }
        ErrorLogFormat::SingleLine => {
            log!(target: target, level, "{}", describe(e));
        }
    }
}

/// Runs a fallible function and logs the error it returns, if any.
///
/// The error is logged on the error level, one message per cause, and passed on.
///
/// # Examples
///
/// ```rust
/// use err_context::prelude::*;
/// use plywood::error::{self, AnyError};
/// # fn read_greeting() -> Result<String, std::io::Error> { Ok(String::new()) }
///
/// let result: Result<String, AnyError> = error::log_errors(module_path!(), || {
///     let greeting = read_greeting().context("Failed to read the greeting")?;
///     Ok(greeting)
/// });
/// # let _result = result;
/// ```
pub fn log_errors<R, F>(target: &str, f: F) -> Result<R, AnyError>
where
    F: FnOnce() -> Result<R, AnyError>,
{
    let result = f();
    if let Err(ref e) = result {
        log_error(Level::Error, target, e, ErrorLogFormat::MultiLine);
    }
    result
}

#[cfg(test)]
mod tests {
    use std::fmt::{Display, Formatter, Result as FmtResult};
    use std::io;

    use super::*;

    #[derive(Copy, Clone, Debug)]
    struct Broken;

    impl Display for Broken {
        fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
            write!(fmt, "Something is broken")
        }
    }

    impl Error for Broken {}

    #[test]
    fn describe_joins_causes() {
        let err: AnyError = Broken.context("Failed to load configuration").into();
        assert_eq!(
            "Failed to load configuration: Something is broken",
            describe(&err)
        );
    }

    #[test]
    fn log_errors_passes_result_through() {
        let ok = log_errors(module_path!(), || Ok(42));
        assert_eq!(42, ok.unwrap());

        let err = log_errors::<(), _>(module_path!(), || {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire").into())
        });
        assert_eq!("disk on fire", err.unwrap_err().to_string());
    }

    #[test]
    fn log_error_formats() {
        let err: AnyError = Broken.context("Another level").into();
        log_error(Level::Debug, module_path!(), &err, ErrorLogFormat::MultiLine);
        log_error(Level::Debug, module_path!(), &err, ErrorLogFormat::SingleLine);
    }
}
