use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("reader response was shorter than the two trailing status-word bytes")]
    ShortResponse,

    #[error("no reader named {0:?} was found")]
    ReaderNotFound(String),

    #[error("no readers are connected")]
    NoReaders,
}
