//! GetFileCounters: reads a standard data file's 3-byte little-endian write
//! counter, used to drive the SDM read counter shown in the mirrored URL.

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_GET_FILE_COUNTERS: u8 = 0xF6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCounters {
    pub value: u32,
}

pub fn get_file_counters<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    file_no: u8,
) -> Result<FileCounters> {
    let header = [file_no];
    let descriptor = CommandDescriptor {
        ins: INS_GET_FILE_COUNTERS,
        operation: "GetFileCounters",
        comm_mode: CommMode::Mac,
        header: &header,
        body: &[],
    };
    let resp = exec_wrapped(transport, session, &descriptor)?;
    if resp.len() != 3 {
        return Err(Error::Malformed {
            operation: "GetFileCounters",
            reason: "counter response was not 3 bytes",
            frame: crate::error::FrameDump::capture(&resp),
        });
    }
    let value = resp[0] as u32 | (resp[1] as u32) << 8 | (resp[2] as u32) << 16;
    Ok(FileCounters { value })
}
