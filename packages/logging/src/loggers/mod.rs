mod base;
mod session;

pub use base::{BaseLogger, SharedLogger};
pub use session::SessionLogger;
