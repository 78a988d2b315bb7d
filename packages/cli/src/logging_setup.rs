//! Wires `ntag-logging`'s terminal formatter to stdout and maps the CLI's
//! repeated `-v` flag onto a [`Loglevel`].

use ntag_logging::{BaseLogger, DefaultFormatter, Loglevel, SharedLogger};
use termcolor::{ColorChoice, StandardStream};

pub fn level_for_verbosity(count: u8) -> Loglevel {
    match count {
        0 => Loglevel::Warn,
        1 => Loglevel::Info,
        2 => Loglevel::Verbose,
        3 => Loglevel::Debug,
        _ => Loglevel::Silly,
    }
}

pub fn terminal_logger(level: Loglevel) -> SharedLogger {
    let base = BaseLogger {
        level,
        writer: Box::new(StandardStream::stdout(ColorChoice::Auto)),
        formatter: Box::new(DefaultFormatter::new()),
    };
    SharedLogger::new(base)
}
