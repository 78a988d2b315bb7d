//! ReadData: reads `length` bytes starting at `offset` from a standard data
//! file, under whatever CommMode the file was configured with.

use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_READ_DATA: u8 = 0xAD;

fn le24(value: u32) -> [u8; 3] {
    [(value & 0xFF) as u8, ((value >> 8) & 0xFF) as u8, ((value >> 16) & 0xFF) as u8]
}

/// Reads `length` bytes from `file_no` starting at `offset`. Pass
/// `length = 0` to mean "read the whole file", per the tag's own convention.
pub fn read_data<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    file_no: u8,
    offset: u32,
    length: u32,
    comm_mode: CommMode,
) -> Result<Vec<u8>> {
    let mut header = [0u8; 7];
    header[0] = file_no;
    header[1..4].copy_from_slice(&le24(offset));
    header[4..7].copy_from_slice(&le24(length));

    let descriptor = CommandDescriptor {
        ins: INS_READ_DATA,
        operation: "ReadData",
        comm_mode,
        header: &header,
        body: &[],
    };
    exec_wrapped(transport, session, &descriptor)
}
