//! ChangeKey: installs a new 16-byte AES key in one of the tag's five key
//! slots. Changing the key the current session authenticated with always
//! invalidates that session — the tag stops accepting the old session's
//! MACs the instant the key is overwritten.

use crate::crc32::jamcrc_le_bytes;
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_CHANGE_KEY: u8 = 0xC4;

fn xor16(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Changes `key_no` to `new_key` with the given `key_version`.
///
/// `old_key` must be `None` when `key_no` is the key the session
/// authenticated with (the tag derives the diversification from the
/// session itself in that case); it must be `Some` for every other key,
/// carrying that key's current value so the tag can verify the change.
pub fn change_key<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    key_no: u8,
    new_key: &[u8; 16],
    key_version: u8,
    old_key: Option<&[u8; 16]>,
) -> Result<()> {
    let is_authenticated_key = key_no == session.authenticated_key_no();

    let body = match old_key {
        None => {
            let mut body = Vec::with_capacity(16 + 1 + 4);
            body.extend_from_slice(new_key);
            body.push(key_version);
            body.extend_from_slice(&jamcrc_le_bytes(new_key));
            body
        }
        Some(old_key) => {
            let diff = xor16(new_key, old_key);
            let mut body = Vec::with_capacity(16 + 1 + 4 + 4);
            body.extend_from_slice(&diff);
            body.push(key_version);
            body.extend_from_slice(&jamcrc_le_bytes(new_key));
            body.extend_from_slice(&jamcrc_le_bytes(&diff));
            body
        }
    };

    let header = [key_no];
    let descriptor = CommandDescriptor {
        ins: INS_CHANGE_KEY,
        operation: "ChangeKey",
        comm_mode: CommMode::Full,
        header: &header,
        body: &body,
    };
    let result = exec_wrapped(transport, session, &descriptor);

    if is_authenticated_key && result.is_ok() {
        session.invalidate();
    }
    result.map(|_| ())
}
