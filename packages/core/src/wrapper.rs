//! The Command-Mode wrapper: turns a logical command (INS, header, body,
//! required [`CommMode`]) into the exact on-wire frame, and validates the
//! response's status word and truncated CMAC.
//!
//! Each wire command is modelled as a tagged variant dispatched by a single
//! function, rather than a hierarchy of APDU subclasses with an ad-hoc
//! `execute` method each. The response MAC follows the usual
//! MAC-over-`counter‖context‖payload` shape of an authenticated command
//! envelope.

use crate::crypto::{
    aes_cbc_decrypt, aes_cbc_encrypt, aes_cmac, aes_ecb_encrypt, pad_encryption_input,
    strip_padding, truncate_cmac, KEY_SIZE,
};
use crate::error::{Error, FrameDump, Result, StatusWord};
use crate::session::Session;
use crate::transport::Transport;

/// Per-command confidentiality/integrity selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMode {
    Plain,
    Mac,
    Full,
}

/// A logical command awaiting framing: INS, fixed command header bytes
/// (file numbers, offsets, key numbers — never encrypted even under FULL),
/// and a variable command body (encrypted under FULL).
pub struct CommandDescriptor<'a> {
    pub ins: u8,
    pub operation: &'static str,
    pub comm_mode: CommMode,
    pub header: &'a [u8],
    pub body: &'a [u8],
}

/// The outcome of one wire round-trip, before the caller decides whether a
/// `Continue` is expected (multi-frame responses such as GetVersion) or is
/// itself an error.
pub enum Outcome {
    Success(Vec<u8>),
    Continue(Vec<u8>),
}

fn build_frame(ins: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + data.len() + 1);
    out.push(0x90);
    out.push(ins);
    out.push(0x00);
    out.push(0x00);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
    out.push(0x00);
    out
}

fn command_mac_input(ins: u8, cmd_ctr: u16, ti: &[u8; 4], header: &[u8], body: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + 2 + 4 + header.len() + body.len());
    input.push(ins);
    input.extend_from_slice(&cmd_ctr.to_le_bytes());
    input.extend_from_slice(ti);
    input.extend_from_slice(header);
    input.extend_from_slice(body);
    input
}

fn response_mac_input(cmd_ctr: u16, ti: &[u8; 4], resp_data: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + 2 + 4 + resp_data.len());
    input.push(0x00);
    input.extend_from_slice(&cmd_ctr.to_le_bytes());
    input.extend_from_slice(ti);
    input.extend_from_slice(resp_data);
    input
}

fn full_mode_iv(ses_enc: &[u8; KEY_SIZE], prefix: [u8; 2], cmd_ctr: u16, ti: &[u8; 4]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0..2].copy_from_slice(&prefix);
    block[2..4].copy_from_slice(&cmd_ctr.to_le_bytes());
    block[4..8].copy_from_slice(ti);
    aes_ecb_encrypt(ses_enc, &block)
}

/// Executes one command frame with no session context at all: used only for
/// the ISO SELECT of the PICC application and for calling GetFileSettings or
/// GetVersion before any authentication has taken place. No `CmdCtr`
/// bookkeeping applies outside a session.
pub fn exec_unauthenticated<T: Transport>(
    transport: &mut T,
    descriptor: &CommandDescriptor,
) -> Result<(Outcome, StatusWord)> {
    debug_assert_eq!(descriptor.comm_mode, CommMode::Plain);
    let mut data = Vec::with_capacity(descriptor.header.len() + descriptor.body.len());
    data.extend_from_slice(descriptor.header);
    data.extend_from_slice(descriptor.body);
    let frame = build_frame(descriptor.ins, &data);

    let (resp, sw1, sw2) = transport.send(&frame).map_err(|e| Error::Transport {
        operation: descriptor.operation,
        source: Box::new(e),
    })?;
    let status = StatusWord(sw1, sw2);
    if status.is_success() {
        Ok((Outcome::Success(resp), status))
    } else if status.is_additional_frame() {
        Ok((Outcome::Continue(resp), status))
    } else {
        Err(Error::Protocol {
            operation: descriptor.operation,
            status,
            frame: FrameDump::capture(&frame),
        })
    }
}

/// Executes one wrapped command round-trip against an authenticated
/// session: builds the CommMode-appropriate wire frame, sends it, verifies
/// the response's status word and (for MAC/FULL) its truncated CMAC,
/// decrypts FULL-mode response bodies, and advances `CmdCtr` exactly once on
/// a fully verified round-trip. Permission-denied responses with a verified
/// MAC leave the session valid; any other failure poisons it.
pub fn exec_wrapped<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    descriptor: &CommandDescriptor,
) -> Result<Vec<u8>> {
    session.begin_command()?;

    let result = exec_wrapped_inner(transport, session, descriptor);

    match &result {
        Ok(_) => session.end_command_ok()?,
        Err(e) if e.is_fatal_to_session() => session.invalidate(),
        Err(_) => session.end_command_non_fatal(),
    }

    result
}

fn exec_wrapped_inner<T: Transport>(
    transport: &mut T,
    session: &Session,
    descriptor: &CommandDescriptor,
) -> Result<Vec<u8>> {
    let ti = *session.ti();
    let cmd_ctr = session.cmd_ctr();
    let ses_mac = *session.ses_mac_key();
    let ses_enc = *session.ses_enc_key();

    let (wire_body, mac_covers): (Vec<u8>, Vec<u8>) = match descriptor.comm_mode {
        CommMode::Plain => (descriptor.body.to_vec(), Vec::new()),
        CommMode::Mac => (descriptor.body.to_vec(), descriptor.body.to_vec()),
        CommMode::Full => {
            let padded = pad_encryption_input(descriptor.body);
            let iv = full_mode_iv(&ses_enc, [0xA5, 0x5A], cmd_ctr, &ti);
            let encrypted = aes_cbc_encrypt(&ses_enc, &iv, &padded);
            (encrypted.clone(), encrypted)
        }
    };

    let mut data = Vec::with_capacity(descriptor.header.len() + wire_body.len() + 8);
    data.extend_from_slice(descriptor.header);
    data.extend_from_slice(&wire_body);

    if !matches!(descriptor.comm_mode, CommMode::Plain) {
        let mac_input = command_mac_input(descriptor.ins, cmd_ctr, &ti, descriptor.header, &mac_covers);
        let mac = truncate_cmac(&aes_cmac(&ses_mac, &mac_input));
        data.extend_from_slice(&mac);
    }

    let frame = build_frame(descriptor.ins, &data);
    let (resp, sw1, sw2) = transport.send(&frame).map_err(|e| Error::Transport {
        operation: descriptor.operation,
        source: Box::new(e),
    })?;
    let status = StatusWord(sw1, sw2);

    if status == StatusWord::PERMISSION_DENIED || status == StatusWord::AUTHENTICATION_ERROR {
        return Err(Error::PermissionDenied {
            operation: descriptor.operation,
            status,
        });
    }
    if !status.is_success() {
        return Err(Error::Protocol {
            operation: descriptor.operation,
            status,
            frame: FrameDump::capture(&frame),
        });
    }

    match descriptor.comm_mode {
        CommMode::Plain => Ok(resp),
        CommMode::Mac => {
            if resp.len() < 8 {
                return Err(Error::Malformed {
                    operation: descriptor.operation,
                    reason: "MAC response shorter than the trailing MAC itself",
                    frame: FrameDump::capture(&resp),
                });
            }
            let (resp_data, mac_bytes) = resp.split_at(resp.len() - 8);
            verify_response_mac(&ses_mac, cmd_ctr, &ti, resp_data, mac_bytes, descriptor.operation)?;
            Ok(resp_data.to_vec())
        }
        CommMode::Full => {
            if resp.is_empty() {
                return Ok(Vec::new());
            }
            if resp.len() < 8 {
                return Err(Error::Malformed {
                    operation: descriptor.operation,
                    reason: "FULL response shorter than the trailing MAC itself",
                    frame: FrameDump::capture(&resp),
                });
            }
            let (enc_resp_data, mac_bytes) = resp.split_at(resp.len() - 8);
            verify_response_mac(&ses_mac, cmd_ctr, &ti, enc_resp_data, mac_bytes, descriptor.operation)?;

            if enc_resp_data.is_empty() {
                return Ok(Vec::new());
            }
            let iv = full_mode_iv(&ses_enc, [0x5A, 0xA5], cmd_ctr, &ti);
            let decrypted = aes_cbc_decrypt(&ses_enc, &iv, enc_resp_data);
            Ok(strip_padding(&decrypted).to_vec())
        }
    }
}

fn verify_response_mac(
    ses_mac: &[u8; KEY_SIZE],
    cmd_ctr: u16,
    ti: &[u8; 4],
    resp_data: &[u8],
    mac_bytes: &[u8],
    operation: &'static str,
) -> Result<()> {
    let mac_input = response_mac_input(cmd_ctr, ti, resp_data);
    let expected = truncate_cmac(&aes_cmac(ses_mac, &mac_input));
    if expected != mac_bytes {
        return Err(Error::Integrity {
            operation,
            reason: "response CMAC did not verify",
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::aes_cmac as cmac_of;

    struct FixedResponseTransport {
        data: Vec<u8>,
        sw1: u8,
        sw2: u8,
        pub last_frame: Vec<u8>,
    }

    impl Transport for FixedResponseTransport {
        type Error = std::convert::Infallible;
        fn send(&mut self, frame: &[u8]) -> std::result::Result<(Vec<u8>, u8, u8), Self::Error> {
            self.last_frame = frame.to_vec();
            Ok((self.data.clone(), self.sw1, self.sw2))
        }
    }

    fn make_session() -> Session {
        Session::new([0x50, 0x84, 0xA1, 0xA3], [0u8; 16], [0x42u8; 16], 0)
    }

    #[test]
    fn get_key_version_mac_matches_an12343_vector() {
        // AN12343 Table 39: the *outgoing* command's truncated CMAC for
        // GetKeyVersion(0) at TI=5084A1A3, CmdCtr=0 under this SesMAC.
        let ses_mac: [u8; 16] = hex::decode("AAB799EBB2B22AC79D7F3EB0E1CFD49E")
            .unwrap()
            .try_into()
            .unwrap();
        let ti = [0x50, 0x84, 0xA1, 0xA3];
        let mut session = Session::new(ti, [0u8; 16], ses_mac, 0);

        // Build a self-consistent response: key version byte plus a response
        // MAC computed with the same (tested) primitives the wrapper uses,
        // so the round trip verifies while the outgoing frame is pinned
        // against the external AN12343 vector below.
        let resp_data = vec![0x01u8];
        let resp_mac = truncate_cmac(&cmac_of(&ses_mac, &response_mac_input(0, &ti, &resp_data)));
        let mut resp = resp_data.clone();
        resp.extend_from_slice(&resp_mac);

        let mut transport = FixedResponseTransport {
            data: resp,
            sw1: 0x91,
            sw2: 0x00,
            last_frame: Vec::new(),
        };

        let descriptor = CommandDescriptor {
            ins: 0x64,
            operation: "GetKeyVersion",
            comm_mode: CommMode::Mac,
            header: &[0x00],
            body: &[],
        };

        let result = exec_wrapped(&mut transport, &mut session, &descriptor).unwrap();
        assert_eq!(result, resp_data);

        // Wire data = header(1) ‖ body(0) ‖ MAC(8) = 9 bytes following Lc.
        let mac_in_frame = &transport.last_frame[6..14];
        assert_eq!(mac_in_frame, &[0x7F, 0x0A, 0x6E, 0xAB, 0xC1, 0x74, 0xB6, 0xDF]);
        assert_eq!(session.cmd_ctr(), 1);
    }

    #[test]
    fn bad_response_mac_invalidates_session() {
        let mut session = make_session();
        let mut transport = FixedResponseTransport {
            data: vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0], // wrong MAC
            sw1: 0x91,
            sw2: 0x00,
            last_frame: Vec::new(),
        };
        let descriptor = CommandDescriptor {
            ins: 0x64,
            operation: "GetKeyVersion",
            comm_mode: CommMode::Mac,
            header: &[0x00],
            body: &[],
        };
        let result = exec_wrapped(&mut transport, &mut session, &descriptor);
        assert!(result.is_err());
        assert!(!session.is_valid());
    }

    #[test]
    fn counter_mismatch_in_response_mac_is_detected() {
        let ses_mac = [0x42u8; 16];
        let ti = [0x01, 0x02, 0x03, 0x04];
        let mut session = Session::new(ti, [0u8; 16], ses_mac, 0);

        // Compute a response MAC as if CmdCtr were 1 (one ahead of reality).
        let resp_data = vec![0xAAu8];
        let mac_input = response_mac_input(1, &ti, &resp_data);
        let bad_mac = truncate_cmac(&cmac_of(&ses_mac, &mac_input));
        let mut resp = resp_data;
        resp.extend_from_slice(&bad_mac);

        let mut transport = FixedResponseTransport {
            data: resp,
            sw1: 0x91,
            sw2: 0x00,
            last_frame: Vec::new(),
        };
        let descriptor = CommandDescriptor {
            ins: 0xF6,
            operation: "GetFileCounters",
            comm_mode: CommMode::Mac,
            header: &[0x02],
            body: &[],
        };
        let result = exec_wrapped(&mut transport, &mut session, &descriptor);
        assert!(result.is_err());
        assert!(!session.is_valid());
    }

    #[test]
    fn permission_denied_leaves_session_valid_without_advancing_counter() {
        let mut session = make_session();
        let mut transport = FixedResponseTransport {
            data: vec![],
            sw1: 0x91,
            sw2: 0x9D,
            last_frame: Vec::new(),
        };
        let descriptor = CommandDescriptor {
            ins: 0x64,
            operation: "GetKeyVersion",
            comm_mode: CommMode::Mac,
            header: &[0x00],
            body: &[],
        };
        let result = exec_wrapped(&mut transport, &mut session, &descriptor);
        assert!(matches!(result, Err(Error::PermissionDenied { .. })));
        assert!(session.is_valid());
        assert_eq!(session.cmd_ctr(), 0);
    }

    #[test]
    fn boundary_error_and_command_aborted_leave_session_valid() {
        let descriptor = CommandDescriptor {
            ins: 0x64,
            operation: "GetKeyVersion",
            comm_mode: CommMode::Mac,
            header: &[0x00],
            body: &[],
        };

        for (sw1, sw2) in [(0x91, 0xBE), (0x91, 0x9E)] {
            let mut session = make_session();
            let mut transport = FixedResponseTransport {
                data: vec![],
                sw1,
                sw2,
                last_frame: Vec::new(),
            };
            let result = exec_wrapped(&mut transport, &mut session, &descriptor);
            assert!(matches!(result, Err(Error::Protocol { .. })));
            assert!(session.is_valid());
            assert_eq!(session.cmd_ctr(), 0);
        }
    }
}
