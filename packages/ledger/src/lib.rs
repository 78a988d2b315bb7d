//! A flat-file [`KeyLedger`](ntag_core::keyledger::KeyLedger) implementation:
//! one CSV row per UID, keys stored as hex. A small, explicit adapter at the
//! crate boundary rather than a database dependency — a provisioning run
//! touches dozens of tags at most, not millions of rows.

mod error;

use ntag_core::keyledger::{KeyLedger, KeySet, KeyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerRow {
    uid_hex: String,
    picc_master_key_hex: String,
    app_master_key_hex: String,
    sdm_mac_key_hex: String,
    app_read_key_hex: String,
    spare_key_hex: String,
    status: String,
    notes: String,
}

fn key_to_hex(key: &[u8; 16]) -> String {
    hex::encode(key)
}

fn hex_to_key(uid_hex: &str, field: &str) -> Result<[u8; 16], LedgerError> {
    let bytes = hex::decode(field).map_err(|source| LedgerError::BadKeyHex {
        uid: uid_hex.to_string(),
        source,
    })?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| LedgerError::WrongKeyLength {
        uid: uid_hex.to_string(),
        len,
    })
}

fn status_to_str(status: KeyStatus) -> &'static str {
    status.as_str()
}

fn str_to_status(s: &str) -> Result<KeyStatus, LedgerError> {
    match s {
        "factory" => Ok(KeyStatus::Factory),
        "provisioned" => Ok(KeyStatus::Provisioned),
        "restored_to_factory" => Ok(KeyStatus::RestoredToFactory),
        other => Err(LedgerError::UnknownStatus(other.to_string())),
    }
}

impl LedgerRow {
    fn from_keys(uid: &[u8; 7], keys: &KeySet, status: KeyStatus) -> Self {
        Self {
            uid_hex: hex::encode(uid),
            picc_master_key_hex: key_to_hex(&keys.k0),
            app_master_key_hex: key_to_hex(&keys.k1),
            sdm_mac_key_hex: key_to_hex(&keys.k2),
            app_read_key_hex: key_to_hex(&keys.k3),
            spare_key_hex: key_to_hex(&keys.k4),
            status: status_to_str(status).to_string(),
            notes: String::new(),
        }
    }

    fn into_keys(self) -> Result<(KeySet, KeyStatus), LedgerError> {
        let keys = KeySet {
            k0: hex_to_key(&self.uid_hex, &self.picc_master_key_hex)?,
            k1: hex_to_key(&self.uid_hex, &self.app_master_key_hex)?,
            k2: hex_to_key(&self.uid_hex, &self.sdm_mac_key_hex)?,
            k3: hex_to_key(&self.uid_hex, &self.app_read_key_hex)?,
            k4: hex_to_key(&self.uid_hex, &self.spare_key_hex)?,
        };
        let status = str_to_status(&self.status)?;
        Ok((keys, status))
    }
}

/// A CSV-file-backed [`KeyLedger`]. The whole file is read into memory on
/// construction and rewritten in full on every [`store_keys`](KeyLedger::store_keys)
/// call — simple and safe for the tag counts this toolkit provisions in a
/// single run.
pub struct CsvKeyLedger {
    path: PathBuf,
    rows: HashMap<[u8; 7], (KeySet, KeyStatus)>,
}

impl CsvKeyLedger {
    /// Opens `path`, creating an empty ledger if it doesn't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                rows: HashMap::new(),
            });
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|source| LedgerError::Open {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
        })?;

        let mut rows = HashMap::new();
        for record in reader.deserialize() {
            let row: LedgerRow = record?;
            let uid_bytes = hex::decode(&row.uid_hex).map_err(|source| LedgerError::BadKeyHex {
                uid: row.uid_hex.clone(),
                source,
            })?;
            let len = uid_bytes.len();
            let uid: [u8; 7] = uid_bytes.try_into().map_err(|_| LedgerError::WrongKeyLength {
                uid: row.uid_hex.clone(),
                len,
            })?;
            let (keys, status) = row.into_keys()?;
            rows.insert(uid, (keys, status));
        }

        Ok(Self { path, rows })
    }

    fn flush(&self) -> Result<(), LedgerError> {
        let mut writer = csv::Writer::from_path(&self.path).map_err(|source| LedgerError::Open {
            path: self.path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
        })?;

        let mut uids: Vec<_> = self.rows.keys().copied().collect();
        uids.sort_unstable();
        for uid in uids {
            let (keys, status) = &self.rows[&uid];
            writer
                .serialize(LedgerRow::from_keys(&uid, keys, *status))
                .map_err(LedgerError::Write)?;
        }
        writer.flush().map_err(|source| LedgerError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

impl KeyLedger for CsvKeyLedger {
    type Error = LedgerError;

    fn get_keys(&self, uid: &[u8; 7]) -> Result<KeySet, Self::Error> {
        Ok(self
            .rows
            .get(uid)
            .map(|(keys, _)| keys.clone())
            .unwrap_or_else(KeySet::all_zero))
    }

    fn store_keys(&mut self, uid: &[u8; 7], keys: &KeySet, status: KeyStatus) -> Result<(), Self::Error> {
        self.rows.insert(*uid, (keys.clone(), status));
        self.flush()
    }
}
