//! GetFileSettings: reads back a file's comm-mode, access rights, and (if
//! configured) its SDM block.

use crate::access_rights::FileSettings;
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_GET_FILE_SETTINGS: u8 = 0xF5;

/// Reads the settings of `file_no` over an authenticated session.
pub fn get_file_settings<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    file_no: u8,
) -> Result<FileSettings> {
    let header = [file_no];
    let descriptor = CommandDescriptor {
        ins: INS_GET_FILE_SETTINGS,
        operation: "GetFileSettings",
        comm_mode: CommMode::Plain,
        header: &header,
        body: &[],
    };
    let resp = exec_wrapped(transport, session, &descriptor)?;
    FileSettings::decode(file_no, &resp)
}
