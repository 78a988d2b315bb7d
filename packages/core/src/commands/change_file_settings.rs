//! ChangeFileSettings: (re)configures a file's comm-mode, access rights, and
//! SDM block. This is how a freshly provisioned NDEF file is turned into a
//! tap-generates-a-fresh-URL file.

use crate::access_rights::FileSettings;
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;
use crate::wrapper::{exec_wrapped, CommMode, CommandDescriptor};

const INS_CHANGE_FILE_SETTINGS: u8 = 0x5F;

/// Writes `settings` to the tag under the given `comm_mode` (MAC, or FULL
/// when the file's current Change access demands confidentiality too).
pub fn change_file_settings<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    settings: &FileSettings,
    comm_mode: CommMode,
) -> Result<()> {
    let header = [settings.file_no];
    let body = settings.encode_change_body();
    let descriptor = CommandDescriptor {
        ins: INS_CHANGE_FILE_SETTINGS,
        operation: "ChangeFileSettings",
        comm_mode,
        header: &header,
        body: &body,
    };
    exec_wrapped(transport, session, &descriptor)?;
    Ok(())
}
