//! Structured, colorized logging for the provisioning toolkit: a small
//! `Logger`/`ImmutableLogger` abstraction, a default terminal formatter, and
//! a `SessionLogger` for the core's APDU traffic.

mod definitions;
mod formatters;
mod loggers;
mod util;

pub use definitions::{
    Direction, FormattedString, ImmutableLogger, LogFormatter, LogInfo, LogPayload, Logger,
    Loglevel, ToLogPayload, WithColor,
};
pub use formatters::DefaultFormatter;
pub use loggers::{BaseLogger, SessionLogger, SharedLogger};
pub use util::str_width;
