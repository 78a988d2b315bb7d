//! The key-ledger adapter: a small interface for looking up and persisting
//! a tag's five AES keys by UID. The core never decides how keys are
//! stored — it only calls through this trait.
//!
//! Shaped the same way as the [`Transport`](crate::transport::Transport)
//! boundary: one trait, an associated `Error` type, no assumption about
//! what lives on the other side.

/// The five key slots of an NTAG424 DNA tag.
///
/// - `k0`: PICC master key — authenticates configuration-level operations.
/// - `k1`: application master key.
/// - `k2`: SDM MAC key — derives the per-read CMAC embedded in the URL.
/// - `k3`: application read key.
/// - `k4`: spare, unused by this toolkit's provisioning flow.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySet {
    pub k0: [u8; 16],
    pub k1: [u8; 16],
    pub k2: [u8; 16],
    pub k3: [u8; 16],
    pub k4: [u8; 16],
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet").finish_non_exhaustive()
    }
}

impl KeySet {
    pub fn all_zero() -> Self {
        Self {
            k0: [0u8; 16],
            k1: [0u8; 16],
            k2: [0u8; 16],
            k3: [0u8; 16],
            k4: [0u8; 16],
        }
    }

    pub fn key(&self, key_no: u8) -> Option<&[u8; 16]> {
        match key_no {
            0 => Some(&self.k0),
            1 => Some(&self.k1),
            2 => Some(&self.k2),
            3 => Some(&self.k3),
            4 => Some(&self.k4),
            _ => None,
        }
    }
}

/// Lifecycle status of a ledger entry, recorded alongside its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Factory,
    Provisioned,
    RestoredToFactory,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Provisioned => "provisioned",
            Self::RestoredToFactory => "restored_to_factory",
        }
    }
}

/// Lookup/store of per-UID keys. Semantics of persistence are entirely up
/// to the implementor; the core only ever calls these two methods.
pub trait KeyLedger {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_keys(&self, uid: &[u8; 7]) -> Result<KeySet, Self::Error>;

    fn store_keys(&mut self, uid: &[u8; 7], keys: &KeySet, status: KeyStatus) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;

    #[derive(Default)]
    pub struct InMemoryLedger {
        pub entries: HashMap<[u8; 7], (KeySet, KeyStatus)>,
    }

    impl KeyLedger for InMemoryLedger {
        type Error = Infallible;

        fn get_keys(&self, uid: &[u8; 7]) -> Result<KeySet, Self::Error> {
            Ok(self
                .entries
                .get(uid)
                .map(|(keys, _)| keys.clone())
                .unwrap_or_else(KeySet::all_zero))
        }

        fn store_keys(&mut self, uid: &[u8; 7], keys: &KeySet, status: KeyStatus) -> Result<(), Self::Error> {
            self.entries.insert(*uid, (keys.clone(), status));
            Ok(())
        }
    }
}
