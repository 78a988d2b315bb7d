//! An in-memory [`ntag_core::Transport`] for tests and hardware-free
//! development: a scripted or closure-driven stand-in for a real reader.

use ntag_core::Transport;
use std::collections::VecDeque;
use std::convert::Infallible;

/// A transport that replays a fixed queue of `(data, sw1, sw2)` responses,
/// one per call to [`SimulatorTransport::send`], recording every outgoing
/// frame for later inspection.
///
/// Mirrors the scripted-transport test doubles used throughout `ntag-core`'s
/// own `#[cfg(test)]` modules, exposed here so other crates (the CLI, the
/// ledger) can exercise the same pattern without hardware.
pub struct SimulatorTransport {
    responses: VecDeque<(Vec<u8>, u8, u8)>,
    sent: Vec<Vec<u8>>,
    needs_escape: bool,
}

impl SimulatorTransport {
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            sent: Vec::new(),
            needs_escape: false,
        }
    }

    pub fn with_escape(mut self, needs_escape: bool) -> Self {
        self.needs_escape = needs_escape;
        self
    }

    /// Queues a response to be returned by the next [`Transport::send`] call.
    pub fn push_response(&mut self, data: impl Into<Vec<u8>>, sw1: u8, sw2: u8) {
        self.responses.push_back((data.into(), sw1, sw2));
    }

    /// The frames sent so far, in order.
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

impl Default for SimulatorTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatorTransport {
    type Error = Infallible;

    fn send(&mut self, frame: &[u8]) -> Result<(Vec<u8>, u8, u8), Self::Error> {
        self.sent.push(frame.to_vec());
        Ok(self
            .responses
            .pop_front()
            .unwrap_or_else(|| (Vec::new(), 0x91, 0x00)))
    }

    fn needs_escape(&self) -> bool {
        self.needs_escape
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replays_queued_responses_in_order_and_records_outgoing_frames() {
        let mut sim = SimulatorTransport::new();
        sim.push_response(vec![0xAA], 0x91, 0x00);
        sim.push_response(vec![], 0x90, 0x00);

        let (data, sw1, sw2) = sim.send(&[0x01, 0x02]).unwrap();
        assert_eq!((data, sw1, sw2), (vec![0xAA], 0x91, 0x00));

        let (data, sw1, sw2) = sim.send(&[0x03]).unwrap();
        assert_eq!((data, sw1, sw2), (vec![], 0x90, 0x00));

        assert_eq!(sim.sent_frames(), &[vec![0x01, 0x02], vec![0x03]]);
    }

    #[test]
    fn unscripted_calls_default_to_an_empty_continue_response() {
        let mut sim = SimulatorTransport::new();
        let (data, sw1, sw2) = sim.send(&[0xFF]).unwrap();
        assert!(data.is_empty());
        assert_eq!((sw1, sw2), (0x91, 0x00));
    }
}
