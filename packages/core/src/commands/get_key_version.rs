//! GetKeyVersion: reads back the 1-byte version tag currently associated
//! with an application key, so a caller can detect whether a ChangeKey has
//! already been applied without re-deriving the key itself.

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_GET_KEY_VERSION: u8 = 0x64;

pub fn get_key_version<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    key_no: u8,
) -> Result<u8> {
    let header = [key_no];
    let descriptor = CommandDescriptor {
        ins: INS_GET_KEY_VERSION,
        operation: "GetKeyVersion",
        comm_mode: CommMode::Mac,
        header: &header,
        body: &[],
    };
    let resp = exec_wrapped(transport, session, &descriptor)?;
    resp.first().copied().ok_or(Error::Malformed {
        operation: "GetKeyVersion",
        reason: "response was empty",
        frame: crate::error::FrameDump::none(),
    })
}
