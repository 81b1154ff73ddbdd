//! MAC header writer.

use crate::{
    Address, AddressingMode, AddressingRepr, BufferTooSmall, FrameControl, FrameType,
    FrameVersion,
};

/// A high-level representation of a MAC header (frame control, sequence
/// number and addressing fields) for 2015-version frames.
///
/// The PAN ID is carried once: as the destination PAN ID when there is a
/// destination address, as the source PAN ID otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeaderRepr {
    /// The frame type.
    pub frame_type: FrameType,
    /// The sequence number, `None` to suppress it.
    pub sequence_number: Option<u8>,
    /// Request an acknowledgment.
    pub ack_request: bool,
    /// More frames are pending for the destination.
    pub frame_pending: bool,
    /// Information elements follow the header.
    pub information_elements_present: bool,
    /// The PAN ID.
    pub pan_id: u16,
    /// The destination address, `None` when absent.
    pub dst_address: Option<Address>,
    /// The source address, `None` when absent.
    pub src_address: Option<Address>,
}

impl FrameHeaderRepr {
    fn pan_id_compression(&self) -> bool {
        use AddressingMode::*;

        let dst = self.dst_address.map_or(Absent, AddressingMode::from);
        let src = self.src_address.map_or(Absent, AddressingMode::from);

        !matches!(
            (dst, src),
            (Absent, _) | (_, Absent) | (Extended, Extended)
        )
    }

    fn addressing(&self) -> AddressingRepr {
        let dst_pan_id = self.dst_address.map(|_| self.pan_id);
        let src_pan_id = match self.dst_address {
            None => self.src_address.map(|_| self.pan_id),
            Some(_) => None,
        };

        AddressingRepr {
            dst_pan_id,
            dst_address: self.dst_address,
            src_pan_id,
            src_address: self.src_address,
        }
    }

    /// The number of octets needed to emit the header.
    pub fn buffer_len(&self) -> usize {
        2 + self.sequence_number.map_or(0, |_| 1) + self.addressing().buffer_len()
    }

    /// Emit the header at the start of `buffer`, returning its length.
    pub fn emit(&self, buffer: &mut [u8]) -> Result<usize, BufferTooSmall> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(BufferTooSmall);
        }

        buffer[..len].fill(0);

        let mut fc = FrameControl::new_unchecked(&mut buffer[..2]);
        fc.set_frame_type(self.frame_type);
        fc.set_frame_version(FrameVersion::Ieee802154_2020);
        fc.set_ack_request(self.ack_request);
        fc.set_frame_pending(self.frame_pending);
        fc.set_pan_id_compression(self.pan_id_compression());
        fc.set_sequence_number_suppression(self.sequence_number.is_none());
        fc.set_information_elements_present(self.information_elements_present);
        fc.set_dst_addressing_mode(self.dst_address.map_or(AddressingMode::Absent, Into::into));
        fc.set_src_addressing_mode(self.src_address.map_or(AddressingMode::Absent, Into::into));

        let mut offset = 2;
        if let Some(seq) = self.sequence_number {
            buffer[offset] = seq;
            offset += 1;
        }

        self.addressing().emit(&mut buffer[offset..]);

        Ok(len)
    }
}
