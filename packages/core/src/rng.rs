//! Injectable randomness for `RndA` generation: an explicit capability
//! rather than ambient global state, so that authentication transcripts can
//! be replayed deterministically in tests.

/// A source of cryptographically strong random bytes.
pub trait RandomSource {
    fn fill(&mut self, buf: &mut [u8]);
}

/// The production [`RandomSource`], backed by the OS CSPRNG via `getrandom`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        getrandom::getrandom(buf).expect("OS CSPRNG must be available");
    }
}

/// A fixed-output [`RandomSource`] for deterministic test replays against
/// recorded transcripts.
#[derive(Debug, Clone)]
pub struct FixedRandom {
    bytes: Vec<u8>,
}

impl FixedRandom {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl RandomSource for FixedRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        assert!(
            buf.len() <= self.bytes.len(),
            "FixedRandom ran out of recorded bytes"
        );
        buf.copy_from_slice(&self.bytes[..buf.len()]);
    }
}
