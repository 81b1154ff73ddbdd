//! Enhanced acknowledgment building and parsing.

use crate::time::Duration;
use crate::{
    Address, BufferTooSmall, Frame, FrameHeaderRepr, FrameType, FrameVersion, HeaderElementId,
    HeaderInformationElementRepr, TimeCorrection,
};

/// The timing information carried by an accepted enhanced ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AckTiming {
    /// The time correction reported by the receiver, `None` when the ACK
    /// carries no Time Correction IE.
    pub drift: Option<Duration>,
    /// The receiver got the frame but did not accept it.
    pub nack: bool,
    /// The source address of the ACK, when present.
    pub src_address: Option<Address>,
}

/// Build an enhanced ACK carrying a Time Correction IE.
///
/// With a destination, the ACK carries the destination PAN ID and address;
/// without one, it carries no addressing fields at all.
pub fn build_enhanced_ack(
    dst_address: Option<Address>,
    pan_id: u16,
    sequence_number: u8,
    drift: Duration,
    nack: bool,
    buffer: &mut [u8],
) -> Result<usize, BufferTooSmall> {
    let header = FrameHeaderRepr {
        frame_type: FrameType::Ack,
        sequence_number: Some(sequence_number),
        ack_request: false,
        frame_pending: false,
        information_elements_present: true,
        pan_id,
        dst_address,
        src_address: None,
    };

    let mut len = header.emit(buffer)?;
    len += HeaderInformationElementRepr::TimeCorrection {
        correction: drift,
        nack,
    }
    .emit(&mut buffer[len..])?;

    Ok(len)
}

/// Parse an enhanced ACK received in answer to the frame with
/// `expected_sequence_number`.
///
/// Returns `None` when the frame is not an enhanced ACK, when the sequence
/// number differs, or when the destination PAN ID or address does not
/// match (an absent destination always matches).
pub fn parse_enhanced_ack(
    buffer: &[u8],
    expected_sequence_number: u8,
    our_address: Address,
    pan_id: u16,
) -> Option<AckTiming> {
    let frame = Frame::new(buffer).ok()?;
    let fc = frame.frame_control();

    if fc.frame_type() != FrameType::Ack || fc.frame_version() < FrameVersion::Ieee802154_2020 {
        return None;
    }

    if frame.sequence_number()? != expected_sequence_number {
        return None;
    }

    let addressing = frame.addressing()?;

    if let Some(dst_pan_id) = addressing.dst_pan_id() {
        if dst_pan_id != pan_id && dst_pan_id != 0xffff {
            return None;
        }
    }

    let dst = addressing.dst_address();
    if !dst.is_empty() && dst != our_address {
        return None;
    }

    let src_address = Some(addressing.src_address()).filter(|a| !a.is_empty());

    let mut timing = AckTiming {
        drift: None,
        nack: false,
        src_address,
    };

    if let Some(ie) = frame.information_elements() {
        for header in ie.header_information_elements() {
            if header.element_id() == HeaderElementId::TimeCorrection {
                let tc = TimeCorrection::new(header.content()).ok()?;
                timing.drift = Some(tc.time_correction());
                timing.nack = tc.nack();
            }
        }
    }

    Some(timing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OURS: Address = Address::Extended([0x00, 0x02, 0x00, 0x02, 0x00, 0x02, 0x00, 0x02]);

    #[test]
    fn build_matches_reference() {
        let mut buffer = [0u8; 32];
        let len =
            build_enhanced_ack(Some(OURS), 0xabcd, 0x37, Duration::from_us(-31), true, &mut buffer)
                .unwrap();
        assert_eq!(
            &buffer[..len],
            &hex::decode("022e37cdab0200020002000200020fe18f").unwrap()[..]
        );
    }

    #[test]
    fn round_trip() {
        let mut buffer = [0u8; 32];
        let len =
            build_enhanced_ack(Some(OURS), 0xabcd, 9, Duration::from_us(120), false, &mut buffer)
                .unwrap();

        let timing = parse_enhanced_ack(&buffer[..len], 9, OURS, 0xabcd).unwrap();
        assert_eq!(timing.drift, Some(Duration::from_us(120)));
        assert!(!timing.nack);
        assert_eq!(timing.src_address, None);
    }

    #[test]
    fn without_destination() {
        let mut buffer = [0u8; 32];
        let len = build_enhanced_ack(None, 0xabcd, 3, Duration::from_us(-5), false, &mut buffer)
            .unwrap();
        assert_eq!(len, 3 + 4);

        let timing = parse_enhanced_ack(&buffer[..len], 3, OURS, 0xabcd).unwrap();
        assert_eq!(timing.drift, Some(Duration::from_us(-5)));
    }

    #[test]
    fn rejects_mismatches() {
        let mut buffer = [0u8; 32];
        let len =
            build_enhanced_ack(Some(OURS), 0xabcd, 9, Duration::from_us(0), false, &mut buffer)
                .unwrap();
        let ack = &buffer[..len];

        assert!(parse_enhanced_ack(ack, 10, OURS, 0xabcd).is_none());
        assert!(parse_enhanced_ack(ack, 9, Address::Extended([9; 8]), 0xabcd).is_none());
        assert!(parse_enhanced_ack(ack, 9, OURS, 0x1234).is_none());
        assert!(parse_enhanced_ack(&ack[..len - 1], 9, OURS, 0xabcd).is_none());
    }

    #[test]
    fn buffer_too_small() {
        let mut buffer = [0u8; 14];
        assert_eq!(
            build_enhanced_ack(Some(OURS), 0xabcd, 1, Duration::ZERO, false, &mut buffer),
            Err(BufferTooSmall)
        );
    }
}
