//! Data frame building.

use crate::{Address, BufferTooSmall, FrameHeaderRepr, FrameType};

/// A data frame to build.
///
/// A keep-alive is a unicast data frame with an empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrameRepr<'a> {
    /// The sequence number, `None` to suppress it.
    pub sequence_number: Option<u8>,
    /// Request an acknowledgment.
    pub ack_request: bool,
    /// More frames are pending for the destination.
    pub frame_pending: bool,
    /// The PAN ID.
    pub pan_id: u16,
    /// The destination address.
    pub dst_address: Address,
    /// Our own address.
    pub src_address: Address,
    /// The MAC payload.
    pub payload: &'a [u8],
}

impl DataFrameRepr<'_> {
    fn header(&self) -> FrameHeaderRepr {
        FrameHeaderRepr {
            frame_type: FrameType::Data,
            sequence_number: self.sequence_number,
            ack_request: self.ack_request,
            frame_pending: self.frame_pending,
            information_elements_present: false,
            pan_id: self.pan_id,
            dst_address: Some(self.dst_address).filter(|a| !a.is_empty()),
            src_address: Some(self.src_address).filter(|a| !a.is_empty()),
        }
    }

    /// The number of octets needed to emit the frame.
    pub fn buffer_len(&self) -> usize {
        self.header().buffer_len() + self.payload.len()
    }

    /// Emit the frame at the start of `buffer`, returning its length.
    pub fn emit(&self, buffer: &mut [u8]) -> Result<usize, BufferTooSmall> {
        if buffer.len() < self.buffer_len() {
            return Err(BufferTooSmall);
        }

        let offset = self.header().emit(buffer)?;
        buffer[offset..][..self.payload.len()].copy_from_slice(self.payload);

        Ok(offset + self.payload.len())
    }
}
