//! The authenticated session: transaction id, session keys and the command
//! counter. A dedicated newtype wraps the counter itself, alongside a
//! transaction-scoped pair of session keys, the way a secure-channel
//! session typically holds its own state — except this counter must never
//! wrap: overflowing it is protocol-fatal.

use crate::crypto::KEY_SIZE;
use crate::error::{Error, Result};

/// The `CmdCtr` field: a 16-bit counter that increments exactly once per
/// successfully verified wrapped command and can never wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommandCounter(u16);

impl CommandCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Advances the counter by one. Returns an error instead of wrapping if
    /// the counter is already at its maximum value — this is a protocol-fatal
    /// condition per the session-invalidation invariant.
    fn bump(&mut self) -> Result<()> {
        self.0 = self
            .0
            .checked_add(1)
            .ok_or(Error::Integrity {
                operation: "CmdCtr bump",
                reason: "command counter would overflow",
            })?;
        Ok(())
    }
}

impl Default for CommandCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// An authenticated EV2-First session. Immutable after construction except
/// for `CmdCtr`, which only ever moves forward through [`Session::bump`].
///
/// Owned exclusively by the one logical flow driving the tag; there is no
/// sharing across concurrent flows (see the concurrency model).
pub struct Session {
    ti: [u8; 4],
    cmd_ctr: CommandCounter,
    ses_enc: [u8; KEY_SIZE],
    ses_mac: [u8; KEY_SIZE],
    authenticated_key_no: u8,
    valid: bool,
    in_flight: bool,
}

impl Session {
    pub(crate) fn new(
        ti: [u8; 4],
        ses_enc: [u8; KEY_SIZE],
        ses_mac: [u8; KEY_SIZE],
        authenticated_key_no: u8,
    ) -> Self {
        Self {
            ti,
            cmd_ctr: CommandCounter::new(),
            ses_enc,
            ses_mac,
            authenticated_key_no,
            valid: true,
            in_flight: false,
        }
    }

    pub fn ti(&self) -> &[u8; 4] {
        &self.ti
    }

    pub fn cmd_ctr(&self) -> u16 {
        self.cmd_ctr.value()
    }

    pub fn ses_enc_key(&self) -> &[u8; KEY_SIZE] {
        &self.ses_enc
    }

    pub fn ses_mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.ses_mac
    }

    pub fn authenticated_key_no(&self) -> u8 {
        self.authenticated_key_no
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Marks the beginning of a wrapped command round-trip. Fails if the
    /// session is invalid, or if a previous command's response has not yet
    /// been fully verified — issuing overlapping commands is a programming
    /// error and must be caught here rather than silently corrupting `CmdCtr`.
    pub fn begin_command(&mut self) -> Result<()> {
        if !self.valid {
            return Err(Error::SessionInvalid);
        }
        if self.in_flight {
            return Err(Error::CommandInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Completes a round-trip successfully: advances `CmdCtr` and clears the
    /// in-flight guard. Overflowing the counter invalidates the session.
    pub fn end_command_ok(&mut self) -> Result<()> {
        self.in_flight = false;
        if let Err(e) = self.cmd_ctr.bump() {
            self.invalidate();
            return Err(e);
        }
        Ok(())
    }

    /// Completes a round-trip that failed in a way that does not poison the
    /// session (e.g. a permission-denied status word with a verified MAC):
    /// clears the in-flight guard without advancing `CmdCtr`.
    pub fn end_command_non_fatal(&mut self) {
        self.in_flight = false;
    }

    /// Zeroises the session keys and marks the session permanently invalid.
    /// Called on failed CMAC verification, an unexpected status word, a
    /// transport failure, or an explicit re-authentication.
    pub fn invalidate(&mut self) {
        self.ses_enc = [0u8; KEY_SIZE];
        self.ses_mac = [0u8; KEY_SIZE];
        self.valid = false;
        self.in_flight = false;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ti", &hex::encode(self.ti))
            .field("cmd_ctr", &self.cmd_ctr.value())
            .field("authenticated_key_no", &self.authenticated_key_no)
            .field("valid", &self.valid)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}
