use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open key ledger at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read key ledger: {0}")]
    Read(#[from] csv::Error),

    #[error("failed to write key ledger: {0}")]
    Write(#[source] csv::Error),

    #[error("malformed key hex in ledger row for UID {uid}: {source}")]
    BadKeyHex {
        uid: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("key field for UID {uid} is {len} bytes, expected 16")]
    WrongKeyLength { uid: String, len: usize },

    #[error("unrecognized key status {0:?}")]
    UnknownStatus(String),
}
