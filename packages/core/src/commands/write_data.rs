//! WriteData: writes `data` starting at `offset` into a standard data file,
//! under whatever CommMode the file was configured with.

use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_WRITE_DATA: u8 = 0x8D;

fn le24(value: u32) -> [u8; 3] {
    [(value & 0xFF) as u8, ((value >> 8) & 0xFF) as u8, ((value >> 16) & 0xFF) as u8]
}

pub fn write_data<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    file_no: u8,
    offset: u32,
    data: &[u8],
    comm_mode: CommMode,
) -> Result<()> {
    let mut header = [0u8; 7];
    header[0] = file_no;
    header[1..4].copy_from_slice(&le24(offset));
    header[4..7].copy_from_slice(&le24(data.len() as u32));

    let descriptor = CommandDescriptor {
        ins: INS_WRITE_DATA,
        operation: "WriteData",
        comm_mode,
        header: &header,
        body: data,
    };
    exec_wrapped(transport, session, &descriptor)?;
    Ok(())
}
