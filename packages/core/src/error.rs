use std::fmt;

/// Raw two-byte status word returned by a PICC, as `(SW1, SW2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u8, pub u8);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord(0x91, 0x00);
    pub const ADDITIONAL_FRAME: StatusWord = StatusWord(0x91, 0xAF);
    pub const ISO_SUCCESS: StatusWord = StatusWord(0x90, 0x00);
    pub const PERMISSION_DENIED: StatusWord = StatusWord(0x91, 0x9D);
    pub const AUTHENTICATION_ERROR: StatusWord = StatusWord(0x91, 0xAE);
    pub const BOUNDARY_ERROR: StatusWord = StatusWord(0x91, 0xBE);
    pub const COMMAND_ABORTED: StatusWord = StatusWord(0x91, 0x9E);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS || *self == Self::ISO_SUCCESS
    }

    pub fn is_additional_frame(&self) -> bool {
        *self == Self::ADDITIONAL_FRAME
    }

    /// Whether this status word is in the fixed non-invalidating set
    /// `{9100, 91AF, 919D, 91AE, 91BE, 919E}`: a wrapped command that fails
    /// with one of these, but still carries a verified response MAC, leaves
    /// the session valid.
    pub fn is_non_invalidating(&self) -> bool {
        matches!(
            *self,
            Self::SUCCESS
                | Self::ADDITIONAL_FRAME
                | Self::PERMISSION_DENIED
                | Self::AUTHENTICATION_ERROR
                | Self::BOUNDARY_ERROR
                | Self::COMMAND_ABORTED
        )
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.0, self.1)
    }
}

/// Hex dump of an offending frame, only ever populated in debug builds.
///
/// Never carries key material: callers must only pass already-framed,
/// on-the-wire command/response bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameDump(Option<String>);

impl FrameDump {
    pub fn capture(frame: &[u8]) -> Self {
        if cfg!(debug_assertions) {
            Self(Some(hex::encode_upper(frame)))
        } else {
            Self(None)
        }
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl fmt::Display for FrameDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(hex) => write!(f, " (frame: {hex})"),
            None => Ok(()),
        }
    }
}

/// Error taxonomy per the command-wrapper and authentication-engine contracts.
///
/// Transport and integrity errors always poison the session they occurred on;
/// permission errors leave the session valid; configuration errors are raised
/// before any wire traffic and never advance `CmdCtr`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("protocol error during {operation}: unexpected status word {status}{frame}")]
    Protocol {
        operation: &'static str,
        status: StatusWord,
        frame: FrameDump,
    },

    #[error("protocol error during {operation}: {reason}{frame}")]
    Malformed {
        operation: &'static str,
        reason: &'static str,
        frame: FrameDump,
    },

    #[error("authentication failed for key {key_no}: {reason}")]
    Authentication { key_no: u8, reason: &'static str },

    #[error("permission denied for {operation}: status word {status}")]
    PermissionDenied {
        operation: &'static str,
        status: StatusWord,
    },

    #[error("integrity error during {operation}: {reason}")]
    Integrity {
        operation: &'static str,
        reason: &'static str,
    },

    #[error("configuration error: {0}")]
    Configuration(&'static str),

    #[error("key-ledger failure during {operation}: {source}")]
    Ledger {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("session is no longer valid; re-authenticate before issuing further commands")]
    SessionInvalid,

    #[error("a wrapped command is already in flight on this session")]
    CommandInFlight,
}

impl Error {
    /// Whether this error, if raised while a [`crate::session::Session`] is active,
    /// must poison that session per the taxonomy in the command-wrapper contract.
    pub fn is_fatal_to_session(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Malformed { .. } | Error::Integrity { .. } => true,
            Error::Protocol { status, .. } => !status.is_non_invalidating(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
