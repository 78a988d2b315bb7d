//! The SDM URL planner: turns a URL template with UID/counter/CMAC
//! placeholders into an assembled NDEF payload plus the offsets and option
//! bits that `ChangeFileSettings` needs to configure Secure Dynamic
//! Messaging against that exact payload.

use crate::access_rights::{sdm_option_bits, SdmBlock};
use crate::error::{Error, Result};

pub const UID_PLACEHOLDER_LEN: usize = 14;
pub const COUNTER_PLACEHOLDER_LEN: usize = 6;
pub const CMAC_PLACEHOLDER_LEN: usize = 16;

/// A base URL carrying literal placeholder substrings to be overwritten by
/// the tag on every tap.
#[derive(Debug, Clone)]
pub struct SdmUrlTemplate {
    pub base_url: String,
    pub uid_placeholder: String,
    pub counter_placeholder: String,
    pub cmac_placeholder: String,
    pub enc_picc_placeholder: Option<String>,
    /// Whether the tag should mirror a per-read CMAC into `cmac_placeholder`
    /// on every tap. The placeholder text may still appear in `base_url`
    /// with this cleared — it is then left untouched by the tag, exactly
    /// like any other literal URL text. Defaults to `true`: a full SDM/SUN
    /// URL normally embeds UID, counter, and CMAC together.
    pub mirror_mac: bool,
}

impl SdmUrlTemplate {
    pub fn new(
        base_url: impl Into<String>,
        uid_placeholder: impl Into<String>,
        counter_placeholder: impl Into<String>,
        cmac_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            uid_placeholder: uid_placeholder.into(),
            counter_placeholder: counter_placeholder.into(),
            cmac_placeholder: cmac_placeholder.into(),
            enc_picc_placeholder: None,
            mirror_mac: true,
        }
    }

    /// Disables CMAC mirroring: the SDM block is configured for UID and
    /// counter mirroring only, and `MACInputOffset`/`MACOffset` are omitted
    /// entirely (the minimal 12-byte SDM block layout).
    pub fn without_mac_mirroring(mut self) -> Self {
        self.mirror_mac = false;
        self
    }
}

/// A fully assembled NDEF URI record body plus the SDM offsets/options
/// computed against it, ready to be embedded in a `ChangeFileSettings` body.
#[derive(Debug, Clone)]
pub struct SdmPlan {
    pub ndef_payload: Vec<u8>,
    pub sdm_block: SdmBlock,
}

/// Known NFC Forum URI abbreviation codes, longest prefix first so matching
/// prefers the most specific abbreviation.
const URI_ABBREVIATIONS: &[(u8, &str)] = &[
    (0x02, "https://www."),
    (0x01, "http://www."),
    (0x04, "https://"),
    (0x03, "http://"),
    (0x00, ""),
];

fn split_uri_abbreviation(url: &str) -> (u8, &str) {
    for &(code, prefix) in URI_ABBREVIATIONS {
        if !prefix.is_empty() && url.starts_with(prefix) {
            return (code, &url[prefix.len()..]);
        }
    }
    (0x00, url)
}

/// Locates each placeholder's unique byte span within `haystack`.
///
/// Placeholders are located longest-first and each match is masked out of
/// the working buffer before shorter placeholders are searched, so a long
/// placeholder built from the same filler character as a shorter one (e.g.
/// both written as runs of `'0'`) does not make the shorter one ambiguous.
/// What remains an error is a genuine ambiguity: a placeholder with no
/// match, more than one match outside already-claimed spans, or a span that
/// overlaps a sibling's.
struct PlaceholderLocator {
    mask: Vec<u8>,
}

impl PlaceholderLocator {
    fn new(haystack: &str) -> Self {
        Self {
            mask: haystack.as_bytes().to_vec(),
        }
    }

    fn locate(&mut self, needle: &str) -> Result<(usize, usize)> {
        if needle.is_empty() {
            return Err(Error::Configuration("SDM placeholder must not be empty"));
        }
        let needle_bytes = needle.as_bytes();
        let mut found: Option<usize> = None;
        let mut pos = 0;
        while pos + needle_bytes.len() <= self.mask.len() {
            if &self.mask[pos..pos + needle_bytes.len()] == needle_bytes {
                if found.is_some() {
                    return Err(Error::Configuration("SDM placeholder matches more than once"));
                }
                found = Some(pos);
                pos += needle_bytes.len();
            } else {
                pos += 1;
            }
        }
        let start = found.ok_or(Error::Configuration("SDM placeholder not found in URL template"))?;
        let end = start + needle_bytes.len();
        for b in &mut self.mask[start..end] {
            *b = 0xFF;
        }
        Ok((start, end))
    }
}

/// Serialises one record's fixed overhead: 2-byte big-endian NLEN, a
/// short-form NDEF record header (flags, type length, payload length, type
/// `'U'`), and the URI abbreviation code byte — before the URL body itself.
fn assemble_ndef_payload(abbrev: u8, remainder: &str) -> Vec<u8> {
    let uri_body_len = 1 + remainder.len();
    let record_header = [0xD1u8, 0x01, uri_body_len as u8, b'U'];
    let mut message = Vec::with_capacity(record_header.len() + uri_body_len);
    message.extend_from_slice(&record_header);
    message.push(abbrev);
    message.extend_from_slice(remainder.as_bytes());

    let mut payload = Vec::with_capacity(2 + message.len());
    payload.extend_from_slice(&(message.len() as u16).to_be_bytes());
    payload.extend_from_slice(&message);
    payload
}

/// Computes the SDM plan for `template`: the assembled NDEF payload and the
/// `SdmBlock` (offsets + option bits) that reproduces it on every tap.
pub fn plan(template: &SdmUrlTemplate) -> Result<SdmPlan> {
    let (abbrev, remainder) = split_uri_abbreviation(&template.base_url);

    let mut placeholders = vec![
        ("uid", template.uid_placeholder.as_str()),
        ("counter", template.counter_placeholder.as_str()),
    ];
    if template.mirror_mac {
        placeholders.push(("cmac", template.cmac_placeholder.as_str()));
    }
    if let Some(enc) = &template.enc_picc_placeholder {
        placeholders.push(("enc_picc", enc.as_str()));
    }
    // Longest-first so a short placeholder's literal text cannot be mistaken
    // for a stray match inside a longer sibling built from the same filler.
    placeholders.sort_by_key(|(_, text)| std::cmp::Reverse(text.len()));

    let mut locator = PlaceholderLocator::new(remainder);
    let mut located = std::collections::HashMap::new();
    for (name, text) in &placeholders {
        located.insert(*name, locator.locate(text)?);
    }

    let uid_pos = located["uid"].0;
    let ctr_pos = located["counter"].0;
    let cmac_pos = located.get("cmac").copied();

    let ndef_payload = assemble_ndef_payload(abbrev, remainder);
    // Fixed overhead preceding the URI body: 2-byte NLEN + 4-byte record
    // header + 1-byte abbreviation code.
    let body_base = 2 + 4 + 1;

    let mut options = sdm_option_bits::SDM_ENABLED;
    let mut block = SdmBlock {
        options,
        access_rights: [0xE0, 0xEE],
        ..Default::default()
    };

    if let Some((enc_start, enc_end)) = located.get("enc_picc").copied() {
        options |= sdm_option_bits::ENC_PICC_DATA;
        block.picc_data_offset = Some((body_base + enc_start) as u32);
        block.enc_length = Some((enc_end - enc_start) as u32);
    } else {
        options |= sdm_option_bits::UID_MIRROR | sdm_option_bits::READ_COUNTER;
        block.uid_offset = Some((body_base + uid_pos) as u32);
        block.read_ctr_offset = Some((body_base + ctr_pos) as u32);
    }
    if let Some((cmac_start, _)) = cmac_pos {
        block.mac_input_offset = Some((body_base + cmac_start) as u32);
        block.mac_offset = Some((body_base + cmac_start) as u32);
    }
    block.options = options;

    Ok(SdmPlan {
        ndef_payload,
        sdm_block: block,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets_point_at_the_first_placeholder_byte() {
        let template = SdmUrlTemplate::new(
            "https://example.com/tap?uid=00000000000000&ctr=000000&cmac=0000000000000000",
            "00000000000000",
            "000000",
            "0000000000000000",
        );
        let plan = plan(&template).unwrap();

        let uid_offset = plan.sdm_block.uid_offset.unwrap() as usize;
        let ctr_offset = plan.sdm_block.read_ctr_offset.unwrap() as usize;
        let mac_offset = plan.sdm_block.mac_offset.unwrap() as usize;

        assert_eq!(plan.ndef_payload[uid_offset], b'0');
        assert_eq!(
            &plan.ndef_payload[uid_offset..uid_offset + UID_PLACEHOLDER_LEN],
            "00000000000000".as_bytes()
        );
        assert_eq!(
            &plan.ndef_payload[ctr_offset..ctr_offset + COUNTER_PLACEHOLDER_LEN],
            "000000".as_bytes()
        );
        assert_eq!(
            &plan.ndef_payload[mac_offset..mac_offset + CMAC_PLACEHOLDER_LEN],
            "0000000000000000".as_bytes()
        );
    }

    #[test]
    fn option_bits_select_uid_and_counter_mirroring() {
        let template = SdmUrlTemplate::new(
            "https://example.com/tap?uid=00000000000000&ctr=000000&cmac=0000000000000000",
            "00000000000000",
            "000000",
            "0000000000000000",
        );
        let plan = plan(&template).unwrap();
        let expected = sdm_option_bits::SDM_ENABLED
            | sdm_option_bits::UID_MIRROR
            | sdm_option_bits::READ_COUNTER;
        assert_eq!(plan.sdm_block.options, expected);
    }

    #[test]
    fn mac_mirroring_disabled_omits_mac_offsets_and_yields_the_minimal_block() {
        let template = SdmUrlTemplate::new(
            "https://example.com/tap?uid=00000000000000&ctr=000000&cmac=0000000000000000",
            "00000000000000",
            "000000",
            "0000000000000000",
        )
        .without_mac_mirroring();
        let plan = plan(&template).unwrap();

        assert_eq!(
            plan.sdm_block.options,
            sdm_option_bits::SDM_ENABLED | sdm_option_bits::UID_MIRROR | sdm_option_bits::READ_COUNTER
        );
        assert!(plan.sdm_block.mac_input_offset.is_none());
        assert!(plan.sdm_block.mac_offset.is_none());

        // SDMOptions(1) + SDMAccessRights(2) + UIDOffset(3) + ReadCtrOffset(3) = 9 bytes;
        // together with the file's own FileOption(1)+AccessRights(2) this is the
        // original's documented 12-byte minimal SDM `ChangeFileSettings` body.
        assert_eq!(plan.sdm_block.encode().len(), 9);
    }

    #[test]
    fn duplicate_placeholder_is_rejected() {
        let template = SdmUrlTemplate::new(
            "https://example.com/00000000000000/00000000000000?ctr=000000&cmac=0000000000000000",
            "00000000000000",
            "000000",
            "0000000000000000",
        );
        assert!(matches!(plan(&template), Err(Error::Configuration(_))));
    }

    #[test]
    fn overlapping_placeholders_are_rejected() {
        let template = SdmUrlTemplate::new(
            "https://example.com/tap?x=000000000000000000&cmac=0000000000000000",
            "00000000000000",
            "0000000000000000",
            "0000000000000000",
        );
        // uid ("0"*14) matches as a substring of the longer ctr run, so the
        // two spans overlap and must be rejected.
        assert!(matches!(plan(&template), Err(Error::Configuration(_))));
    }
}
