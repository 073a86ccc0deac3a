//! A greeter with a configurable greeting.
//!
//! Run it a few times and have a look at the files it creates in the user configuration
//! directory. Edit `greeter.conf` (the `greeter.default.conf` next to it shows what can be set)
//! to change the greeting or `logging.conf` to change the log level.

use log::{info, warn};
use plywood::prelude::*;
use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opts {
    /// Whom to greet.
    #[structopt(short, long, default_value = "World")]
    name: String,

    /// How many times to greet.
    #[structopt(short, long, default_value = "1")]
    times: u32,
}

#[derive(Serialize)]
struct Greeting {
    word: String,
    exclaim: bool,
}

fn main() -> Result<(), AnyError> {
    let paths = AppPaths::new("greeter", "plywood", env!("CARGO_PKG_VERSION"))?;
    let mut app = Application::<Opts>::new(paths);
    let logging = app.default_logging_config().to_defaults()?;
    let greeting = DefaultSource::from_struct(&Greeting {
        word: "Hello".to_owned(),
        exclaim: true,
    })?;
    app.add_configuration_file("logging.conf", Some(logging))
        .add_configuration_file("greeter.conf", Some(greeting));

    app.run(|env| {
        let cfg = env.config("greeter").ok_or("The greeter configuration is missing")?;
        let word = cfg.get("greeting", "word")?;
        let mark = if cfg.get_bool_or("greeting", "exclaim", false)? {
            "!"
        } else {
            "."
        };
        if env.times == 0 {
            warn!("Asked to greet nobody");
            return Ok(Exit::Message("Nothing to do".to_owned()));
        }
        for _ in 0..env.times {
            info!("{} {}{}", word, env.name, mark);
        }
        Ok(Exit::SUCCESS)
    })
}
