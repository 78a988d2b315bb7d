//! SelectPiccApplication: the ISO 7816-4 SELECT that both chooses the
//! NTAG424 DNA PICC-level application and resets any authenticated session
//! already open on the tag. Uses the plain ISO frame (`CLA=0x00`), not the
//! tag-native `CLA=0x90` wrapper every other command uses.

use crate::error::{Error, FrameDump, Result, StatusWord};
use crate::transport::Transport;

const AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

/// Selects the NDEF/PICC application by its AID.
pub fn select_application<T: Transport>(transport: &mut T) -> Result<()> {
    let mut frame = Vec::with_capacity(5 + AID.len() + 1);
    frame.push(0x00); // CLA: ISO/IEC 7816-4
    frame.push(0xA4); // INS: SELECT
    frame.push(0x04); // P1: select by DF name (AID)
    frame.push(0x00); // P2: first or only occurrence
    frame.push(AID.len() as u8);
    frame.extend_from_slice(&AID);
    frame.push(0x00);

    let (_, sw1, sw2) = transport.send(&frame).map_err(|e| Error::Transport {
        operation: "SelectPiccApplication",
        source: Box::new(e),
    })?;
    let status = StatusWord(sw1, sw2);
    if status != StatusWord::ISO_SUCCESS {
        return Err(Error::Protocol {
            operation: "SelectPiccApplication",
            status,
            frame: FrameDump::capture(&frame),
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    struct FixedTransport {
        sw1: u8,
        sw2: u8,
    }

    impl Transport for FixedTransport {
        type Error = std::convert::Infallible;
        fn send(&mut self, _frame: &[u8]) -> std::result::Result<(Vec<u8>, u8, u8), Self::Error> {
            Ok((Vec::new(), self.sw1, self.sw2))
        }
    }

    #[test]
    fn accepts_iso_success() {
        let mut transport = FixedTransport { sw1: 0x90, sw2: 0x00 };
        assert!(select_application(&mut transport).is_ok());
    }

    #[test]
    fn rejects_anything_else() {
        let mut transport = FixedTransport { sw1: 0x6A, sw2: 0x82 };
        assert!(matches!(
            select_application(&mut transport),
            Err(Error::Protocol { .. })
        ));
    }
}
