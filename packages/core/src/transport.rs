//! The transport contract consumed by the authentication engine and the
//! command wrapper: a single-method `send` boundary. The core never assumes
//! idempotence of a write, and framing quirks live entirely on the
//! transport side of that boundary.

/// Sends one fully-framed command and returns the response data plus the
/// trailing two status-word bytes.
///
/// Implementors own everything below this boundary: physical connection
/// handling, reader-vendor escape framing, retries on transient glitches.
/// The core never assumes `send` is idempotent — a caller that does not
/// receive a response must treat the session as dead rather than retry.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(&mut self, frame: &[u8]) -> Result<(Vec<u8>, u8, u8), Self::Error>;

    /// Whether this transport needs outgoing frames wrapped in a reader-vendor
    /// escape command. This only changes byte framing, never protocol
    /// semantics, and is decided once at construction time by the transport.
    fn needs_escape(&self) -> bool {
        false
    }
}
