//! Access-rights nibble codec and the `FileSettings`/`SDMBlock` data model.

use crate::error::{Error, Result};

/// One of the five key slots, or one of the two sentinel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCondition {
    Key(u8),
    Free,
    Never,
}

impl AccessCondition {
    pub const FREE_NIBBLE: u8 = 0xE;
    pub const NEVER_NIBBLE: u8 = 0xF;

    pub fn from_nibble(nibble: u8) -> Result<Self> {
        match nibble {
            0x0..=0x4 => Ok(Self::Key(nibble)),
            Self::FREE_NIBBLE => Ok(Self::Free),
            Self::NEVER_NIBBLE => Ok(Self::Never),
            _ => Err(Error::Configuration("access-rights nibble out of range")),
        }
    }

    pub fn to_nibble(self) -> u8 {
        match self {
            Self::Key(n) => n,
            Self::Free => Self::FREE_NIBBLE,
            Self::Never => Self::NEVER_NIBBLE,
        }
    }
}

/// The four access conditions governing a file: Read, Write, ReadWrite, Change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    pub read: AccessCondition,
    pub write: AccessCondition,
    pub read_write: AccessCondition,
    pub change: AccessCondition,
}

impl AccessRights {
    /// Serialises to exactly two bytes: `((Read<<4)|Write, (ReadWrite<<4)|Change)`.
    pub fn encode(&self) -> [u8; 2] {
        [
            (self.read.to_nibble() << 4) | self.write.to_nibble(),
            (self.read_write.to_nibble() << 4) | self.change.to_nibble(),
        ]
    }

    pub fn decode(bytes: [u8; 2]) -> Result<Self> {
        Ok(Self {
            read: AccessCondition::from_nibble(bytes[0] >> 4)?,
            write: AccessCondition::from_nibble(bytes[0] & 0x0F)?,
            read_write: AccessCondition::from_nibble(bytes[1] >> 4)?,
            change: AccessCondition::from_nibble(bytes[1] & 0x0F)?,
        })
    }
}

/// The per-command confidentiality/integrity selector a file was configured
/// with, as stored in its options byte (bits 0-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCommMode {
    Plain,
    Mac,
    Full,
}

impl FileCommMode {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits & 0b11 {
            0b00 => Ok(Self::Plain),
            0b01 => Ok(Self::Mac),
            0b11 => Ok(Self::Full),
            _ => Err(Error::Configuration("reserved file comm-mode bits")),
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::Plain => 0b00,
            Self::Mac => 0b01,
            Self::Full => 0b11,
        }
    }
}

/// SDM option bits within a file's options byte (bit 6 in the settings blob's
/// leading byte once SDM is configured).
pub mod sdm_option_bits {
    pub const UID_MIRROR: u8 = 0b0000_0001;
    pub const READ_COUNTER: u8 = 0b0000_0010;
    pub const READ_COUNTER_LIMIT: u8 = 0b0000_0100;
    pub const ENC_PICC_DATA: u8 = 0b0001_0000;
    pub const SDM_ENABLED: u8 = 0b0100_0000;
}

/// The SDM configuration block appended to a file's settings when Secure
/// Dynamic Messaging is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdmBlock {
    pub options: u8,
    pub access_rights: [u8; 2],
    pub uid_offset: Option<u32>,
    pub read_ctr_offset: Option<u32>,
    pub picc_data_offset: Option<u32>,
    pub mac_input_offset: Option<u32>,
    pub mac_offset: Option<u32>,
    pub enc_offset: Option<u32>,
    pub enc_length: Option<u32>,
    pub read_ctr_limit: Option<u32>,
}

fn push_offset_24le(buf: &mut Vec<u8>, offset: u32) {
    buf.push((offset & 0xFF) as u8);
    buf.push(((offset >> 8) & 0xFF) as u8);
    buf.push(((offset >> 16) & 0xFF) as u8);
}

fn pull_offset_24le(buf: &[u8], cursor: &mut usize) -> Result<u32> {
    if buf.len() < *cursor + 3 {
        return Err(Error::Configuration("SDM block truncated while reading an offset"));
    }
    let value = buf[*cursor] as u32 | (buf[*cursor + 1] as u32) << 8 | (buf[*cursor + 2] as u32) << 16;
    *cursor += 3;
    Ok(value)
}

impl SdmBlock {
    /// Serialises in the exact field order mandated by the tag's
    /// file-settings format: options, SDM access-rights, then each present
    /// offset as 24-bit little-endian, in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 2 + 8 * 3);
        out.push(self.options);
        out.extend_from_slice(&self.access_rights);
        for offset in [
            self.uid_offset,
            self.read_ctr_offset,
            self.picc_data_offset,
            self.mac_input_offset,
            self.mac_offset,
            self.enc_offset,
            self.enc_length,
            self.read_ctr_limit,
        ]
        .into_iter()
        .flatten()
        {
            push_offset_24le(&mut out, offset);
        }
        out
    }
}

/// A file's type as reported by GetFileSettings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Standard,
    Backup,
    Value,
    LinearRecord,
    CyclicRecord,
}

impl FileType {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Standard),
            0x01 => Ok(Self::Backup),
            0x02 => Ok(Self::Value),
            0x03 => Ok(Self::LinearRecord),
            0x04 => Ok(Self::CyclicRecord),
            _ => Err(Error::Configuration("unknown file type byte")),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Standard => 0x00,
            Self::Backup => 0x01,
            Self::Value => 0x02,
            Self::LinearRecord => 0x03,
            Self::CyclicRecord => 0x04,
        }
    }
}

/// Settings for one file on the tag, as read via GetFileSettings or
/// constructed for ChangeFileSettings. `file_size` only applies to Standard
/// and Backup data files, which is all this toolkit ever provisions (the
/// NDEF file is a Standard data file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSettings {
    pub file_no: u8,
    pub file_type: FileType,
    pub comm_mode: FileCommMode,
    pub access_rights: AccessRights,
    pub file_size: Option<u32>,
    pub sdm: Option<SdmBlock>,
}

impl FileSettings {
    /// Body for ChangeFileSettings: options(1) ‖ AR(2) ‖ [SDM block].
    pub fn encode_change_body(&self) -> Vec<u8> {
        let mut options = self.comm_mode.to_bits();
        if let Some(sdm) = &self.sdm {
            options |= sdm.options & sdm_option_bits::SDM_ENABLED;
        }
        let mut out = Vec::new();
        out.push(options);
        out.extend_from_slice(&self.access_rights.encode());
        if let Some(sdm) = &self.sdm {
            out.extend_from_slice(&sdm.encode());
        }
        out
    }

    /// Parses a GetFileSettings response: `type(1)‖options(1)‖AR(2)‖[file
    /// size(3) for Standard/Backup]‖[SDM block when the options' SDM bit is set]`.
    pub fn decode(file_no: u8, resp: &[u8]) -> Result<Self> {
        if resp.len() < 4 {
            return Err(Error::Configuration("GetFileSettings response too short"));
        }
        let file_type = FileType::from_byte(resp[0])?;
        let options = resp[1];
        let comm_mode = FileCommMode::from_bits(options)?;
        let access_rights = AccessRights::decode([resp[2], resp[3]])?;

        let mut cursor = 4;
        let file_size = match file_type {
            FileType::Standard | FileType::Backup => {
                if resp.len() < cursor + 3 {
                    return Err(Error::Configuration("GetFileSettings response missing file size"));
                }
                let size = u32::from_le_bytes([resp[cursor], resp[cursor + 1], resp[cursor + 2], 0]);
                cursor += 3;
                Some(size)
            }
            _ => None,
        };

        let sdm = if options & sdm_option_bits::SDM_ENABLED != 0 {
            if resp.len() < cursor + 3 {
                return Err(Error::Configuration("GetFileSettings response missing SDM block"));
            }
            let sdm_options = resp[cursor];
            let sdm_ar = [resp[cursor + 1], resp[cursor + 2]];
            cursor += 3;

            let enc_picc = sdm_options & sdm_option_bits::ENC_PICC_DATA != 0;
            let has_ctr_limit = sdm_options & sdm_option_bits::READ_COUNTER_LIMIT != 0;
            let has_uid = sdm_options & sdm_option_bits::UID_MIRROR != 0 && !enc_picc;
            let has_ctr = sdm_options & sdm_option_bits::READ_COUNTER != 0 && !enc_picc;

            let mut block = SdmBlock {
                options: sdm_options,
                access_rights: sdm_ar,
                ..Default::default()
            };
            if has_uid {
                block.uid_offset = Some(pull_offset_24le(resp, &mut cursor)?);
            }
            if has_ctr {
                block.read_ctr_offset = Some(pull_offset_24le(resp, &mut cursor)?);
            }
            if enc_picc {
                block.picc_data_offset = Some(pull_offset_24le(resp, &mut cursor)?);
            }
            block.mac_input_offset = Some(pull_offset_24le(resp, &mut cursor)?);
            block.mac_offset = Some(pull_offset_24le(resp, &mut cursor)?);
            if enc_picc {
                block.enc_offset = Some(pull_offset_24le(resp, &mut cursor)?);
                block.enc_length = Some(pull_offset_24le(resp, &mut cursor)?);
            }
            if has_ctr_limit {
                block.read_ctr_limit = Some(pull_offset_24le(resp, &mut cursor)?);
            }
            Some(block)
        } else {
            None
        };

        Ok(Self {
            file_no,
            file_type,
            comm_mode,
            access_rights,
            file_size,
            sdm,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_settings_decode_parses_a_standard_file_with_sdm_enabled() {
        let file_options = FileCommMode::Plain.to_bits() | sdm_option_bits::SDM_ENABLED;
        let sdm_options = sdm_option_bits::SDM_ENABLED
            | sdm_option_bits::UID_MIRROR
            | sdm_option_bits::READ_COUNTER;

        let mut resp = vec![0x00u8, file_options, 0xE0, 0xEE, 0x00, 0x01, 0x00];
        resp.push(sdm_options);
        resp.extend_from_slice(&[0xE0, 0xEE]); // SDM AR
        resp.extend_from_slice(&[47, 0, 0]); // uid offset
        resp.extend_from_slice(&[66, 0, 0]); // read ctr offset
        resp.extend_from_slice(&[88, 0, 0]); // mac input offset
        resp.extend_from_slice(&[88, 0, 0]); // mac offset

        let settings = FileSettings::decode(0x02, &resp).unwrap();
        assert_eq!(settings.file_type, FileType::Standard);
        assert_eq!(settings.comm_mode, FileCommMode::Plain);
        assert_eq!(settings.file_size, Some(0x10000));
        let sdm = settings.sdm.unwrap();
        assert_eq!(sdm.uid_offset, Some(47));
        assert_eq!(sdm.read_ctr_offset, Some(66));
        assert_eq!(sdm.mac_offset, Some(88));
    }

    #[test]
    fn access_rights_roundtrip_for_every_nibble_combination() {
        for r in 0..=0xFu8 {
            if r == 0x5 || r == 0x6 || r == 0x7 || r == 0x8 || r == 0x9 || r == 0xA || r == 0xB || r == 0xC || r == 0xD {
                continue; // only Key0..Key4, FREE, NEVER are valid conditions
            }
            for w in [0u8, 1, 2, 3, 4, 0xE, 0xF] {
                let rights = AccessRights {
                    read: AccessCondition::from_nibble(r).unwrap(),
                    write: AccessCondition::from_nibble(w).unwrap(),
                    read_write: AccessCondition::from_nibble(r).unwrap(),
                    change: AccessCondition::from_nibble(w).unwrap(),
                };
                let encoded = rights.encode();
                assert_eq!(encoded.len(), 2);
                let decoded = AccessRights::decode(encoded).unwrap();
                assert_eq!(decoded, rights);
            }
        }
    }

    #[test]
    fn invalid_nibble_is_rejected() {
        assert!(AccessCondition::from_nibble(0x5).is_err());
        assert!(AccessCondition::from_nibble(0xD).is_err());
    }

    #[test]
    fn sdm_block_serialises_in_declared_order() {
        let block = SdmBlock {
            options: sdm_option_bits::SDM_ENABLED | sdm_option_bits::UID_MIRROR,
            access_rights: [0xE0, 0xEE],
            uid_offset: Some(47),
            read_ctr_offset: Some(66),
            ..Default::default()
        };
        let encoded = block.encode();
        // options(1) + AR(2) + UID offset(3) + ReadCtr offset(3)
        assert_eq!(encoded.len(), 1 + 2 + 3 + 3);
        assert_eq!(encoded[3..6], [47, 0, 0]);
        assert_eq!(encoded[6..9], [66, 0, 0]);
    }
}
