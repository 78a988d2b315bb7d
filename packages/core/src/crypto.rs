//! AES-128 primitives used by the EV2-First handshake and the command wrapper.
//!
//! ECB/CBC wrappers built directly on the `aes`/`cbc` crates, plus a
//! hand-rolled AES-CMAC following NIST SP 800-38B, adapted to this tag
//! family's own padding and truncation conventions.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Encrypts a single 16-byte block with AES-128 in ECB mode.
///
/// Only ever used on the single encrypted-`RndB` block returned by phase 1
/// of EV2-First; never used for multi-block data.
pub fn aes_ecb_encrypt(key: &[u8; KEY_SIZE], block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let cipher = aes::Aes128::new(GenericArray::from_slice(key));
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// Decrypts a single 16-byte block with AES-128 in ECB mode.
pub fn aes_ecb_decrypt(key: &[u8; KEY_SIZE], block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let cipher = aes::Aes128::new(GenericArray::from_slice(key));
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut buf);
    buf.into()
}

/// AES-128-CBC encryption with an explicit IV. `data` must already be a
/// multiple of 16 bytes; the EV2-First payloads are always exactly 32 bytes
/// and FULL-mode command bodies are padded by the caller before this is invoked.
pub fn aes_cbc_encrypt(key: &[u8; KEY_SIZE], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    cipher.encrypt_padded_vec_mut::<NoPadding>(data)
}

/// AES-128-CBC decryption with an explicit IV. `data` must be a multiple of 16 bytes.
pub fn aes_cbc_decrypt(key: &[u8; KEY_SIZE], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    cipher
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .expect("ciphertext length is always a multiple of the block size")
}

/// Pads `data` by appending `0x80` then zeroes up to the next 16-byte boundary.
/// If `data` is already block-aligned, a full extra padding block is appended
/// (this is the "encryption input" padding rule; CMAC inputs use [`aes_cmac`]'s
/// own internal padding instead).
pub fn pad_encryption_input(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.push(0x80);
    while padded.len() % BLOCK_SIZE != 0 {
        padded.push(0x00);
    }
    padded
}

/// Strips trailing `0x80 00 .. 00` padding added by [`pad_encryption_input`].
pub fn strip_padding(data: &[u8]) -> &[u8] {
    match data.iter().rposition(|&b| b == 0x80) {
        Some(pos) if data[pos + 1..].iter().all(|&b| b == 0x00) => &data[..pos],
        _ => data,
    }
}

/// Rotates a 16-byte block one byte to the left: `block[1..] ‖ block[0]`.
pub fn rotate_left_1(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    out[..BLOCK_SIZE - 1].copy_from_slice(&block[1..]);
    out[BLOCK_SIZE - 1] = block[0];
    out
}

/// Takes the odd-indexed bytes `{1,3,5,7,9,11,13,15}` of a 16-byte CMAC, per
/// this tag family's truncation convention (not a prefix truncation).
pub fn truncate_cmac(full: &[u8; BLOCK_SIZE]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, out_byte) in out.iter_mut().enumerate() {
        *out_byte = full[2 * i + 1];
    }
    out
}

fn xor_blocks(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        out[i] = a[i] ^ b[i];
    }
    out
}

// Left-shift-by-one-bit over a 16-byte block, used only for CMAC subkey
// generation (NIST SP 800-38B); distinct from the protocol's byte rotation.
fn left_shift_1_bit(input: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE - 1 {
        out[i] = (input[i] << 1) | if input[i + 1] & 0x80 != 0 { 1 } else { 0 };
    }
    out[BLOCK_SIZE - 1] = input[BLOCK_SIZE - 1] << 1;
    out
}

const RB: [u8; BLOCK_SIZE] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x87];

fn cmac_subkeys(key: &[u8; KEY_SIZE]) -> ([u8; BLOCK_SIZE], [u8; BLOCK_SIZE]) {
    let l = aes_ecb_encrypt(key, &[0u8; BLOCK_SIZE]);
    let k1 = if l[0] & 0x80 == 0 {
        left_shift_1_bit(&l)
    } else {
        xor_blocks(&left_shift_1_bit(&l), &RB)
    };
    let k2 = if k1[0] & 0x80 == 0 {
        left_shift_1_bit(&k1)
    } else {
        xor_blocks(&left_shift_1_bit(&k1), &RB)
    };
    (k1, k2)
}

/// Pads a CMAC input per NIST SP 800-38B: unaligned messages get `0x80 00..00`
/// appended to the next block boundary; block-aligned, non-empty messages are
/// used as-is (subkey `K1` is used instead of `K2` at the final step).
fn pad_cmac_last_block(message: &[u8]) -> ([u8; BLOCK_SIZE], bool) {
    let mut block = [0u8; BLOCK_SIZE];
    if message.is_empty() {
        block[0] = 0x80;
        return (block, false);
    }
    let remainder = message.len() % BLOCK_SIZE;
    if remainder == 0 {
        block.copy_from_slice(&message[message.len() - BLOCK_SIZE..]);
        (block, true)
    } else {
        let last = &message[message.len() - remainder..];
        block[..remainder].copy_from_slice(last);
        block[remainder] = 0x80;
        (block, false)
    }
}

/// AES-128-CMAC over an arbitrary-length message, following NIST SP 800-38B.
/// Inputs may be empty or unaligned; the caller never pre-pads.
pub fn aes_cmac(key: &[u8; KEY_SIZE], message: &[u8]) -> [u8; BLOCK_SIZE] {
    let (k1, k2) = cmac_subkeys(key);
    let block_size = BLOCK_SIZE;
    let num_blocks = if message.is_empty() {
        1
    } else {
        message.len().div_ceil(block_size)
    };

    let mut x = [0u8; BLOCK_SIZE];
    for i in 0..num_blocks.saturating_sub(1) {
        let block: [u8; BLOCK_SIZE] = message[i * block_size..(i + 1) * block_size]
            .try_into()
            .unwrap();
        x = aes_ecb_encrypt(key, &xor_blocks(&x, &block));
    }

    let (last_block, is_complete) = pad_cmac_last_block(message);
    let subkey = if is_complete { k1 } else { k2 };
    let y = xor_blocks(&xor_blocks(&x, &last_block), &subkey);
    aes_ecb_encrypt(key, &y)
}

#[cfg(test)]
mod test {
    use super::*;

    fn hex16(s: &str) -> [u8; 16] {
        let bytes = hex::decode(s).unwrap();
        bytes.try_into().unwrap()
    }

    #[test]
    fn ecb_known_answer_test() {
        // NIST SP 800-38A AES-128 ECB example.
        let key = hex16("2b7e151628aed2a6abf7158809cf4f3c");
        let plaintext = hex16("6bc1bee22e409f96e93d7e117393172a");
        let expected = hex16("3ad77bb40d7a3660a89ecaf32466ef97");
        assert_eq!(aes_ecb_encrypt(&key, &plaintext), expected);
        assert_eq!(aes_ecb_decrypt(&key, &expected), plaintext);
    }

    #[test]
    fn cmac_known_answer_tests() {
        // NIST AES-CMAC examples.
        let key = hex16("2b7e151628aed2a6abf7158809cf4f3c");

        assert_eq!(
            aes_cmac(&key, &[]),
            hex16("bb1d6929e95937287fa37d129b756746")
        );

        let m16 = hex16("6bc1bee22e409f96e93d7e117393172a");
        assert_eq!(
            aes_cmac(&key, &m16),
            hex16("070a16b46b4d4144f79bdd9dd04a287c")
        );

        let m40 = hex::decode(
            "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411",
        )
        .unwrap();
        assert_eq!(
            aes_cmac(&key, &m40),
            hex16("dfa66747de9ae63030ca32611497c827")
        );

        let m64 = hex::decode(
            "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710",
        )
        .unwrap();
        assert_eq!(
            aes_cmac(&key, &m64),
            hex16("51f0bebf7e3b9d92fc49741779363cfe")
        );
    }

    #[test]
    fn rotation_roundtrip_is_identity() {
        let block = hex16("a7430b59775c83eee4083e8f7f1ca889");
        let mut rotated = block;
        for _ in 0..16 {
            rotated = rotate_left_1(&rotated);
        }
        assert_eq!(rotated, block);
    }

    #[test]
    fn truncate_cmac_selects_odd_indices() {
        let full: [u8; 16] = (0u8..16).collect::<Vec<_>>().try_into().unwrap();
        assert_eq!(truncate_cmac(&full), [1, 3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn strip_padding_roundtrips_unaligned_input() {
        let data = b"hello world";
        let padded = pad_encryption_input(data);
        assert_eq!(padded.len() % BLOCK_SIZE, 0);
        assert_eq!(strip_padding(&padded), data);
    }

    #[test]
    fn strip_padding_roundtrips_aligned_input() {
        let data = [0xAAu8; 16];
        let padded = pad_encryption_input(&data);
        assert_eq!(padded.len(), 32);
        assert_eq!(strip_padding(&padded), data);
    }
}
