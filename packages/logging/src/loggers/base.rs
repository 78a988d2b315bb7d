use crate::{ImmutableLogger, LogFormatter, LogInfo, Logger, Loglevel};
use std::sync::Mutex;
use termcolor::WriteColor;

pub struct BaseLogger {
    pub level: Loglevel,
    pub writer: Box<dyn WriteColor + Send>,
    pub formatter: Box<dyn LogFormatter + Send>,
}

impl Logger for BaseLogger {
    fn log(&mut self, log: LogInfo, level: Loglevel) {
        if level > self.level {
            return;
        }
        let formatted = self.formatter.format_log(&log, level);
        for str in formatted {
            if let Some(color) = str.color {
                let _ = self.writer.set_color(&color);
            }
            let _ = self.writer.write_all(str.string.as_bytes());
        }
    }

    fn log_level(&self) -> Loglevel {
        self.level
    }

    fn set_log_level(&mut self, level: Loglevel) {
        self.level = level;
    }
}

/// Wraps a [`BaseLogger`] in a mutex so it can be shared as an
/// [`ImmutableLogger`] across call sites that only hold a shared reference —
/// the `SessionLogger`, most notably, which logs from deep inside `&mut`
/// command calls without owning the terminal writer itself.
pub struct SharedLogger(Mutex<BaseLogger>);

impl SharedLogger {
    pub fn new(inner: BaseLogger) -> Self {
        Self(Mutex::new(inner))
    }
}

impl ImmutableLogger for SharedLogger {
    fn log(&self, log: LogInfo, level: Loglevel) {
        if let Ok(mut inner) = self.0.lock() {
            inner.log(log, level);
        }
    }

    fn log_level(&self) -> Loglevel {
        self.0.lock().map(|inner| inner.log_level()).unwrap_or(Loglevel::Error)
    }

    fn set_log_level(&self, level: Loglevel) {
        if let Ok(mut inner) = self.0.lock() {
            inner.set_log_level(level);
        }
    }
}

