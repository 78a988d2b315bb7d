//! The EV2-First mutual-authentication engine.
//!
//! A two-phase handshake in the style of SCP03-like session establishment:
//! a challenge is decrypted, a response challenge is built and encrypted,
//! and session keys are derived from both sides' randomness. The linear
//! protocol is modelled as an explicit enum state machine rather than
//! virtual dispatch.

use crate::crypto::{aes_cbc_decrypt, aes_cbc_encrypt, aes_cmac, aes_ecb_decrypt, rotate_left_1};
use crate::error::{Error, Result};
use crate::rng::RandomSource;
use crate::session::Session;
use crate::transport::Transport;

const INS_AUTHENTICATE_EV2_FIRST: u8 = 0x71;
const INS_AUTHENTICATE_EV2_SECOND: u8 = 0xAF;

/// States of the EV2-First handshake, named exactly as in the component design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Phase1Sent,
    Phase2Sent,
    Authenticated,
    Failed,
}

fn frame(ins: u8, data: &[u8]) -> Vec<u8> {
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

fn send<T: Transport>(
    transport: &mut T,
    operation: &'static str,
    frame: &[u8],
) -> Result<(Vec<u8>, crate::error::StatusWord)> {
    let (data, sw1, sw2) = transport.send(frame).map_err(|e| Error::Transport {
        operation,
        source: Box::new(e),
    })?;
    Ok((data, crate::error::StatusWord(sw1, sw2)))
}

/// Builds the two session-key-derivation vectors `SV1` (encryption key) and
/// `SV2` (MAC key) from `RndA`/`RndB`, following the exact byte layout pinned
/// down by the component design (the part most often mis-copied).
fn derive_session_vectors(rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> ([u8; 32], [u8; 32]) {
    fn xor6(a: &[u8], b: &[u8]) -> [u8; 6] {
        let mut out = [0u8; 6];
        for i in 0..6 {
            out[i] = a[i] ^ b[i];
        }
        out
    }

    fn build(prefix: [u8; 6], rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> [u8; 32] {
        let mut sv = [0u8; 32];
        sv[0..6].copy_from_slice(&prefix);
        sv[6..8].copy_from_slice(&rnd_a[0..2]);
        sv[8..14].copy_from_slice(&xor6(&rnd_a[2..8], &rnd_b[0..6]));
        sv[14..24].copy_from_slice(&rnd_b[6..16]);
        sv[24..32].copy_from_slice(&rnd_a[8..16]);
        sv
    }

    let sv1 = build([0xA5, 0x5A, 0x00, 0x01, 0x00, 0x80], rnd_a, rnd_b);
    let sv2 = build([0x5A, 0xA5, 0x00, 0x01, 0x00, 0x80], rnd_a, rnd_b);
    (sv1, sv2)
}

/// Drives the EV2-First handshake to completion against `transport`, using
/// `master_key` for key number `key_no`, and returns the resulting
/// [`Session`] on success.
pub fn authenticate_ev2_first<T: Transport, R: RandomSource>(
    transport: &mut T,
    master_key: &[u8; 16],
    key_no: u8,
    rng: &mut R,
) -> Result<Session> {
    let mut state = AuthState::Idle;

    // Phase 1: request a challenge.
    state = AuthState::Phase1Sent;
    let phase1_frame = frame(INS_AUTHENTICATE_EV2_FIRST, &[key_no, 0x00]);
    let (data, status) = send(transport, "AuthenticateEV2First", &phase1_frame)?;

    if !status.is_additional_frame() {
        state = AuthState::Failed;
        debug_assert_eq!(state, AuthState::Failed);
        return Err(Error::Authentication {
            key_no,
            reason: "phase 1 did not return 91AF",
        });
    }
    if data.len() != 16 {
        return Err(Error::Authentication {
            key_no,
            reason: "phase 1 response was not 16 bytes",
        });
    }
    let enc_rnd_b: [u8; 16] = data.try_into().unwrap();
    let rnd_b = aes_ecb_decrypt(master_key, &enc_rnd_b);

    // Phase 2: respond with RndA and the rotated/encrypted RndB.
    state = AuthState::Phase2Sent;
    let mut rnd_a = [0u8; 16];
    rng.fill(&mut rnd_a);

    let rot_rnd_b = rotate_left_1(&rnd_b);
    let mut payload = [0u8; 32];
    payload[..16].copy_from_slice(&rnd_a);
    payload[16..].copy_from_slice(&rot_rnd_b);

    let ciphertext = aes_cbc_encrypt(master_key, &[0u8; 16], &payload);
    let phase2_frame = frame(INS_AUTHENTICATE_EV2_SECOND, &ciphertext);
    let (data, status) = send(transport, "AuthenticateEV2Second", &phase2_frame)?;

    if !status.is_success() {
        state = AuthState::Failed;
        debug_assert_eq!(state, AuthState::Failed);
        return Err(Error::Authentication {
            key_no,
            reason: "phase 2 did not return 9100",
        });
    }
    if data.len() != 32 {
        return Err(Error::Authentication {
            key_no,
            reason: "phase 2 response was not 32 bytes",
        });
    }

    let plaintext = aes_cbc_decrypt(master_key, &[0u8; 16], &data);
    let ti: [u8; 4] = plaintext[0..4].try_into().unwrap();
    let rot_rnd_a_from_picc: [u8; 16] = plaintext[4..20].try_into().unwrap();

    let rot_rnd_a_expected = rotate_left_1(&rnd_a);
    if rot_rnd_a_from_picc != rot_rnd_a_expected {
        return Err(Error::Authentication {
            key_no,
            reason: "PICC response RndA' mismatch",
        });
    }

    let (sv1, sv2) = derive_session_vectors(&rnd_a, &rnd_b);
    let ses_enc = aes_cmac(master_key, &sv1);
    let ses_mac = aes_cmac(master_key, &sv2);

    state = AuthState::Authenticated;
    debug_assert_eq!(state, AuthState::Authenticated);

    Ok(Session::new(ti, ses_enc, ses_mac, key_no))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rng::FixedRandom;

    struct ScriptedTransport {
        responses: std::collections::VecDeque<(Vec<u8>, u8, u8)>,
    }

    impl Transport for ScriptedTransport {
        type Error = std::convert::Infallible;

        fn send(&mut self, _frame: &[u8]) -> std::result::Result<(Vec<u8>, u8, u8), Self::Error> {
            Ok(self.responses.pop_front().expect("no more scripted responses"))
        }
    }

    #[test]
    fn ev2_first_derives_session_with_deterministic_transcript() {
        // All-zero master key, fixed RndA, and a fabricated RndB so the test
        // is self-consistent end to end (exercises the handshake's control
        // flow and key derivation, not a hardware-pinned vector).
        let master_key = [0u8; 16];
        let rnd_b: [u8; 16] = (0u8..16).collect::<Vec<_>>().try_into().unwrap();
        let rnd_a_bytes = hex::decode("a7430b59775c83eee4083e8f7f1ca889").unwrap();
        let rnd_a: [u8; 16] = rnd_a_bytes[..16].try_into().unwrap();

        let enc_rnd_b = crate::crypto::aes_ecb_encrypt(&master_key, &rnd_b);

        let rot_rnd_b = rotate_left_1(&rnd_b);
        let rot_rnd_a = rotate_left_1(&rnd_a);
        let mut plaintext = [0u8; 32];
        plaintext[0..4].copy_from_slice(&[0x50, 0x84, 0xA1, 0xA3]);
        plaintext[4..20].copy_from_slice(&rot_rnd_a);
        // PDcap2/PCDcap2 left as zero for this synthetic transcript.
        let enc_phase2_response = aes_cbc_encrypt(&master_key, &[0u8; 16], &plaintext);

        let mut transport = ScriptedTransport {
            responses: [
                (enc_rnd_b.to_vec(), 0x91, 0xAF),
                (enc_phase2_response, 0x91, 0x00),
            ]
            .into(),
        };

        let mut rng = FixedRandom::new(rnd_a.to_vec());
        let session = authenticate_ev2_first(&mut transport, &master_key, 0, &mut rng).unwrap();

        assert_eq!(session.ti(), &[0x50, 0x84, 0xA1, 0xA3]);
        assert_eq!(session.cmd_ctr(), 0);
        assert!(session.is_valid());
        let _ = rot_rnd_b;
    }

    #[test]
    fn ev2_first_rejects_mismatched_rnd_a_response() {
        let master_key = [0u8; 16];
        let rnd_b = [0x11u8; 16];
        let enc_rnd_b = crate::crypto::aes_ecb_encrypt(&master_key, &rnd_b);

        // Tampered plaintext: rot(RndA) field does not match what we sent.
        let mut plaintext = [0u8; 32];
        plaintext[0..4].copy_from_slice(&[1, 2, 3, 4]);
        plaintext[4..20].copy_from_slice(&[0xFFu8; 16]);
        let enc_phase2_response = aes_cbc_encrypt(&master_key, &[0u8; 16], &plaintext);

        let mut transport = ScriptedTransport {
            responses: [
                (enc_rnd_b.to_vec(), 0x91, 0xAF),
                (enc_phase2_response, 0x91, 0x00),
            ]
            .into(),
        };
        let mut rng = FixedRandom::new(vec![0x22u8; 16]);
        let result = authenticate_ev2_first(&mut transport, &master_key, 0, &mut rng);
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }

    #[test]
    fn ev2_first_fails_on_unexpected_phase1_status() {
        let mut transport = ScriptedTransport {
            responses: [(vec![0u8; 16], 0x91, 0xAE)].into(),
        };
        let mut rng = FixedRandom::new(vec![0u8; 16]);
        let result = authenticate_ev2_first(&mut transport, &[0u8; 16], 0, &mut rng);
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }
}
