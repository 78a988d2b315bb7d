//! A [`ntag_core::Transport`] backed by a real PC/SC reader.
//!
//! Owns the connection handle, translates one wire operation at a time, and
//! surfaces connection failures as ordinary errors rather than panics. Built
//! directly on PC/SC's synchronous `transmit` call — a reader transaction
//! has no background data to drain between commands, so there is no need
//! for a read loop.

use crate::error::TransportError;
use pcsc::{Card, Context, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

/// The ACR122-style "Direct Transmit" pseudo-APDU some readers require to
/// pass a command straight to the contactless chip instead of letting the
/// reader's own T=CL layer reframe it.
const ESCAPE_CLA: u8 = 0xFF;
const ESCAPE_INS: u8 = 0x00;

/// A connected PC/SC reader transaction.
pub struct PcscTransport {
    card: Card,
    needs_escape: bool,
}

impl PcscTransport {
    /// Connects to the first reader reporting a card present, or to
    /// `reader_name` if given. `needs_escape` is a one-time construction
    /// flag: some reader vendors require outgoing frames wrapped in a
    /// direct-transmit escape command, others accept the frame as-is.
    pub fn connect(reader_name: Option<&str>, needs_escape: bool) -> Result<Self, TransportError> {
        let ctx = Context::establish(Scope::User)?;

        let mut readers_buf = [0u8; 2048];
        let readers = ctx.list_readers(&mut readers_buf)?;

        let chosen = match reader_name {
            Some(name) => readers
                .into_iter()
                .find(|r| r.to_string_lossy() == name)
                .ok_or_else(|| TransportError::ReaderNotFound(name.to_string()))?,
            None => readers.into_iter().next().ok_or(TransportError::NoReaders)?,
        };

        let card = ctx.connect(chosen, ShareMode::Shared, Protocols::ANY)?;
        Ok(Self { card, needs_escape })
    }

    fn wrap_escape(&self, frame: &[u8]) -> Vec<u8> {
        if !self.needs_escape {
            return frame.to_vec();
        }
        let mut out = Vec::with_capacity(5 + frame.len());
        out.push(ESCAPE_CLA);
        out.push(ESCAPE_INS);
        out.push(0x00);
        out.push(0x00);
        out.push(frame.len() as u8);
        out.extend_from_slice(frame);
        out
    }
}

impl ntag_core::Transport for PcscTransport {
    type Error = TransportError;

    fn send(&mut self, frame: &[u8]) -> Result<(Vec<u8>, u8, u8), Self::Error> {
        let wrapped = self.wrap_escape(frame);
        let mut rapdu_buf = [0u8; MAX_BUFFER_SIZE];
        let rapdu = self.card.transmit(&wrapped, &mut rapdu_buf)?;

        if rapdu.len() < 2 {
            return Err(TransportError::ShortResponse);
        }
        let (data, sw) = rapdu.split_at(rapdu.len() - 2);
        Ok((data.to_vec(), sw[0], sw[1]))
    }

    fn needs_escape(&self) -> bool {
        self.needs_escape
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeTransport {
        needs_escape: bool,
    }

    impl FakeTransport {
        fn wrap(&self, frame: &[u8]) -> Vec<u8> {
            if !self.needs_escape {
                return frame.to_vec();
            }
            let mut out = Vec::with_capacity(5 + frame.len());
            out.push(ESCAPE_CLA);
            out.push(ESCAPE_INS);
            out.push(0x00);
            out.push(0x00);
            out.push(frame.len() as u8);
            out.extend_from_slice(frame);
            out
        }
    }

    #[test]
    fn escape_and_no_escape_framing_differ_only_in_the_vendor_envelope() {
        let frame = [0x90, 0x60, 0x00, 0x00, 0x00, 0x00];

        let plain = FakeTransport { needs_escape: false };
        let escaped = FakeTransport { needs_escape: true };

        let plain_wire = plain.wrap(&frame);
        let escaped_wire = escaped.wrap(&frame);

        assert_eq!(plain_wire, frame);
        assert_eq!(&escaped_wire[..2], &[ESCAPE_CLA, ESCAPE_INS]);
        assert_eq!(&escaped_wire[5..], &frame[..]);
        assert_eq!(escaped_wire.len(), plain_wire.len() + 5);
    }
}
