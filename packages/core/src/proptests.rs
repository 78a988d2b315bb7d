//! Property tests over the wire-level codecs, grounded on the pack's
//! `proptest!`-macro style (a single `proptest! { |(x in strategy, ...)| {
//! prop_assert_eq!(...) } }` block per invariant, arbitrary inputs drawn with
//! `proptest::collection::vec`/`any`). Complements the known-answer unit
//! tests in `crypto.rs`/`crc32.rs`, which only pin fixed vectors.

use proptest::collection::vec;
use proptest::prelude::*;

use crate::access_rights::{AccessCondition, AccessRights};
use crate::crc32::{jamcrc, jamcrc_le_bytes};
use crate::crypto::{
    aes_cbc_decrypt, aes_cbc_encrypt, pad_encryption_input, rotate_left_1, strip_padding,
    BLOCK_SIZE,
};
use crate::session::Session;

fn access_condition_strategy() -> impl Strategy<Value = AccessCondition> {
    prop_oneof![
        (0u8..=4).prop_map(AccessCondition::Key),
        Just(AccessCondition::Free),
        Just(AccessCondition::Never),
    ]
}

proptest! {
    #[test]
    fn rotate_left_1_sixteen_times_is_identity(block in vec(any::<u8>(), BLOCK_SIZE)) {
        let block: [u8; BLOCK_SIZE] = block.try_into().unwrap();
        let mut rotated = block;
        for _ in 0..16 {
            rotated = rotate_left_1(&rotated);
        }
        prop_assert_eq!(rotated, block);
    }

    #[test]
    fn rotate_left_1_is_a_single_step_of_the_identity_cycle(block in vec(any::<u8>(), BLOCK_SIZE)) {
        let block: [u8; BLOCK_SIZE] = block.try_into().unwrap();
        let rotated = rotate_left_1(&block);
        prop_assert_eq!(&rotated[..BLOCK_SIZE - 1], &block[1..]);
        prop_assert_eq!(rotated[BLOCK_SIZE - 1], block[0]);
    }

    #[test]
    fn encryption_padding_roundtrips_over_arbitrary_input(data in vec(any::<u8>(), 0..=200)) {
        let padded = pad_encryption_input(&data);
        prop_assert_eq!(padded.len() % BLOCK_SIZE, 0);
        prop_assert!(!padded.is_empty());
        prop_assert_eq!(strip_padding(&padded), data.as_slice());
    }

    #[test]
    fn cbc_roundtrips_over_arbitrary_block_aligned_plaintext(
        key in vec(any::<u8>(), BLOCK_SIZE),
        iv in vec(any::<u8>(), BLOCK_SIZE),
        num_blocks in 0usize..=8,
        filler in any::<u8>(),
    ) {
        let key: [u8; BLOCK_SIZE] = key.try_into().unwrap();
        let iv: [u8; BLOCK_SIZE] = iv.try_into().unwrap();
        let plaintext = vec![filler; num_blocks * BLOCK_SIZE];

        let ciphertext = aes_cbc_encrypt(&key, &iv, &plaintext);
        prop_assert_eq!(ciphertext.len(), plaintext.len());

        let decrypted = aes_cbc_decrypt(&key, &iv, &ciphertext);
        prop_assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn cbc_ciphertext_changes_with_the_iv(
        key in vec(any::<u8>(), BLOCK_SIZE),
        iv_a in vec(any::<u8>(), BLOCK_SIZE),
        iv_b in vec(any::<u8>(), BLOCK_SIZE),
        filler in any::<u8>(),
    ) {
        prop_assume!(iv_a != iv_b);
        let key: [u8; BLOCK_SIZE] = key.try_into().unwrap();
        let iv_a: [u8; BLOCK_SIZE] = iv_a.try_into().unwrap();
        let iv_b: [u8; BLOCK_SIZE] = iv_b.try_into().unwrap();
        let plaintext = vec![filler; BLOCK_SIZE * 2];

        let ciphertext_a = aes_cbc_encrypt(&key, &iv_a, &plaintext);
        let ciphertext_b = aes_cbc_encrypt(&key, &iv_b, &plaintext);
        prop_assert_ne!(ciphertext_a, ciphertext_b);
    }

    #[test]
    fn jamcrc_le_bytes_always_matches_scalar_to_le_bytes(data in vec(any::<u8>(), 0..=300)) {
        prop_assert_eq!(jamcrc_le_bytes(&data), jamcrc(&data).to_le_bytes());
    }

    #[test]
    fn jamcrc_is_deterministic(data in vec(any::<u8>(), 0..=300)) {
        prop_assert_eq!(jamcrc(&data), jamcrc(&data));
    }

    #[test]
    fn access_rights_encode_decode_roundtrips(
        read in access_condition_strategy(),
        write in access_condition_strategy(),
        read_write in access_condition_strategy(),
        change in access_condition_strategy(),
    ) {
        let rights = AccessRights { read, write, read_write, change };
        let decoded = AccessRights::decode(rights.encode()).unwrap();
        prop_assert_eq!(decoded, rights);
    }

    #[test]
    fn command_counter_advances_by_exactly_one_per_successful_command(rounds in 0u16..=200) {
        let mut session = Session::new([0u8; 4], [0u8; BLOCK_SIZE], [0u8; BLOCK_SIZE], 0);
        let mut previous = session.cmd_ctr();
        for _ in 0..rounds {
            session.begin_command().unwrap();
            session.end_command_ok().unwrap();
            prop_assert_eq!(session.cmd_ctr(), previous + 1);
            previous = session.cmd_ctr();
        }
        prop_assert!(session.is_valid());
    }

    #[test]
    fn non_fatal_command_completion_never_advances_the_counter(rounds in 0u16..=200) {
        let mut session = Session::new([0u8; 4], [0u8; BLOCK_SIZE], [0u8; BLOCK_SIZE], 0);
        for _ in 0..rounds {
            session.begin_command().unwrap();
            session.end_command_non_fatal();
        }
        prop_assert_eq!(session.cmd_ctr(), 0);
        prop_assert!(!session.is_in_flight());
    }
}
