use structopt::StructOpt;

/// Command line options of an application that has none of its own.
///
/// Plugs the options type parameter of [`Application`][crate::Application] and
/// [`Environment`][crate::Environment]. Only the automatic `--help` and `--version` are
/// recognized.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, StructOpt)]
pub struct Empty {}
