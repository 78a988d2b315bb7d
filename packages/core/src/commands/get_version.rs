//! GetVersion: the only multi-frame PLAIN command before authentication.
//! The tag answers in three `91AF`-chained frames of 7, 7, and 14 bytes
//! (hardware info, software info, and UID/batch/production-date info).

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::wrapper::{exec_unauthenticated, CommandDescriptor, CommMode, Outcome};

const INS_GET_VERSION: u8 = 0x60;
const INS_ADDITIONAL_FRAME: u8 = 0xAF;

/// One half (hardware or software) of the version response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentVersion {
    pub vendor_id: u8,
    pub component_type: u8,
    pub subtype: u8,
    pub major_version: u8,
    pub minor_version: u8,
    pub storage_size: u8,
    pub protocol_type: u8,
}

impl ComponentVersion {
    fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() != 7 {
            return Err(Error::Malformed {
                operation: "GetVersion",
                reason: "hardware/software info frame was not 7 bytes",
                frame: crate::error::FrameDump::capture(frame),
            });
        }
        Ok(Self {
            vendor_id: frame[0],
            component_type: frame[1],
            subtype: frame[2],
            major_version: frame[3],
            minor_version: frame[4],
            storage_size: frame[5],
            protocol_type: frame[6],
        })
    }
}

/// The full, three-frame GetVersion response. The third frame is 14 bytes:
/// UID(7) ‖ BatchNo(5) ‖ FabWeek(1) ‖ FabYear(1) — there is no separate
/// fabrication-key byte in this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub hardware: ComponentVersion,
    pub software: ComponentVersion,
    pub uid: [u8; 7],
    pub batch_no: [u8; 5],
    pub fab_week: u8,
    pub fab_year: u8,
}

fn request_frame(ins: u8) -> CommandDescriptor<'static> {
    CommandDescriptor {
        ins,
        operation: "GetVersion",
        comm_mode: CommMode::Plain,
        header: &[],
        body: &[],
    }
}

/// Runs the three-frame GetVersion exchange against an unauthenticated
/// (freshly selected) tag.
pub fn get_version<T: Transport>(transport: &mut T) -> Result<VersionInfo> {
    let (outcome, _) = exec_unauthenticated(transport, &request_frame(INS_GET_VERSION))?;
    let frame1 = expect_continue(outcome)?;

    let (outcome, _) = exec_unauthenticated(transport, &request_frame(INS_ADDITIONAL_FRAME))?;
    let frame2 = expect_continue(outcome)?;

    let (outcome, _) = exec_unauthenticated(transport, &request_frame(INS_ADDITIONAL_FRAME))?;
    let frame3 = expect_success(outcome)?;

    let hardware = ComponentVersion::parse(&frame1)?;
    let software = ComponentVersion::parse(&frame2)?;

    if frame3.len() != 14 {
        return Err(Error::Malformed {
            operation: "GetVersion",
            reason: "UID/batch/production-date frame was not 14 bytes",
            frame: crate::error::FrameDump::capture(&frame3),
        });
    }

    Ok(VersionInfo {
        hardware,
        software,
        uid: frame3[0..7].try_into().unwrap(),
        batch_no: frame3[7..12].try_into().unwrap(),
        fab_week: frame3[12],
        fab_year: frame3[13],
    })
}

fn expect_continue(outcome: Outcome) -> Result<Vec<u8>> {
    match outcome {
        Outcome::Continue(data) => Ok(data),
        Outcome::Success(_) => Err(Error::Malformed {
            operation: "GetVersion",
            reason: "expected an additional-frame continuation, got a final response",
            frame: crate::error::FrameDump::none(),
        }),
    }
}

fn expect_success(outcome: Outcome) -> Result<Vec<u8>> {
    match outcome {
        Outcome::Success(data) => Ok(data),
        Outcome::Continue(_) => Err(Error::Malformed {
            operation: "GetVersion",
            reason: "expected the final frame, got another continuation",
            frame: crate::error::FrameDump::none(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        responses: VecDeque<(Vec<u8>, u8, u8)>,
    }

    impl Transport for ScriptedTransport {
        type Error = std::convert::Infallible;
        fn send(&mut self, _frame: &[u8]) -> std::result::Result<(Vec<u8>, u8, u8), Self::Error> {
            Ok(self.responses.pop_front().unwrap())
        }
    }

    #[test]
    fn parses_the_three_chained_frames() {
        let mut transport = ScriptedTransport {
            responses: [
                (vec![0x04, 0x01, 0x01, 0x02, 0x00, 0x13, 0x05], 0x91, 0xAF),
                (vec![0x04, 0x01, 0x01, 0x05, 0x00, 0x13, 0x05], 0x91, 0xAF),
                (
                    vec![
                        0x04, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
                        0x02, 0x19,
                    ],
                    0x91,
                    0x00,
                ),
            ]
            .into(),
        };

        let version = get_version(&mut transport).unwrap();
        assert_eq!(version.hardware.vendor_id, 0x04);
        assert_eq!(version.software.major_version, 0x05);
        assert_eq!(version.uid, [0x04, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(version.batch_no, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        assert_eq!(version.fab_week, 0x02);
        assert_eq!(version.fab_year, 0x19);
    }
}
