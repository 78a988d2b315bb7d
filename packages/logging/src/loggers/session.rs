//! Logs the one kind of traffic this toolkit's core ever produces: APDU
//! frames exchanged with a tag. A small wrapper around a shared
//! `ImmutableLogger`, collapsed to the single subsystem this toolkit has.

use crate::{Direction, ImmutableLogger, LogInfo, LogPayload, Loglevel};
use std::sync::Arc;

const SESSION_LOGLEVEL: Loglevel = Loglevel::Debug;

pub struct SessionLogger {
    inner: Arc<dyn ImmutableLogger>,
}

impl SessionLogger {
    pub fn new(inner: Arc<dyn ImmutableLogger>) -> Self {
        Self { inner }
    }

    /// Logs one raw APDU frame, before or after wrapping/decryption.
    pub fn frame(&self, data: &[u8], direction: Direction) {
        if self.inner.log_level() < SESSION_LOGLEVEL {
            return;
        }

        let message = format!("0x{}", hex::encode(data));
        let log = LogInfo::builder()
            .label("SESSION")
            .direction(direction)
            .secondary_tag(format!("{} bytes", data.len()).into())
            .payload(LogPayload::Text(message.into()))
            .build();
        self.inner.log(log, SESSION_LOGLEVEL);
    }

    /// Logs a named protocol event (e.g. "AuthenticateEV2First", "ChangeKey")
    /// with its resulting status word.
    pub fn operation(&self, operation: &'static str, sw1: u8, sw2: u8, direction: Direction) {
        if self.inner.log_level() < SESSION_LOGLEVEL {
            return;
        }

        let tag = format!("{sw1:02X}{sw2:02X}").into();
        let log = LogInfo::builder()
            .label("SESSION")
            .direction(direction)
            .primary_tags(vec![operation.into()])
            .secondary_tag(tag)
            .payload(LogPayload::empty())
            .build();
        self.inner.log(log, SESSION_LOGLEVEL);
    }

    /// Logs a frame the core refused to interpret (malformed response,
    /// CMAC mismatch) — always at `Warn`, regardless of `SESSION_LOGLEVEL`.
    pub fn rejected(&self, reason: &str, data: &[u8]) {
        if self.inner.log_level() < Loglevel::Warn {
            return;
        }

        let message = format!("{reason}: 0x{}", hex::encode(data));
        let log = LogInfo::builder()
            .label("SESSION")
            .direction(Direction::Inbound)
            .primary_tags(vec!["REJECTED".into()])
            .secondary_tag(format!("{} bytes", data.len()).into())
            .payload(LogPayload::Text(message.into()))
            .build();
        self.inner.log(log, Loglevel::Warn);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    struct RecordingLogger {
        level: Loglevel,
        entries: Mutex<Vec<(&'static str, Loglevel)>>,
    }

    impl ImmutableLogger for RecordingLogger {
        fn log(&self, log: LogInfo, level: Loglevel) {
            self.entries.lock().unwrap().push((log.label, level));
        }
        fn log_level(&self) -> Loglevel {
            self.level
        }
        fn set_log_level(&self, _level: Loglevel) {}
    }

    #[test]
    fn below_threshold_messages_are_suppressed() {
        let inner = Arc::new(RecordingLogger {
            level: Loglevel::Error,
            entries: Mutex::new(Vec::new()),
        });
        let logger = SessionLogger::new(inner.clone());
        logger.frame(&[0x00], Direction::Outbound);
        assert!(inner.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn rejected_logs_even_at_a_quiet_level_above_warn() {
        let inner = Arc::new(RecordingLogger {
            level: Loglevel::Warn,
            entries: Mutex::new(Vec::new()),
        });
        let logger = SessionLogger::new(inner.clone());
        logger.rejected("bad CMAC", &[0xAA, 0xBB]);
        assert_eq!(inner.entries.lock().unwrap().len(), 1);
    }
}
