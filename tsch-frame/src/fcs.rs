//! Frame Check Sequence.

use crate::{BufferTooSmall, Error, Result};

/// The FCS field contains a 16-bit ITU-T CRC, using the x^16 + x^12 + x^5 + 1
/// polynomial, with initial and final values of 0x0000.
const CRC_16_IEEE802154: crc::Algorithm<u16> = crc::Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x0000,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x2189,
    residue: 0x0000,
};

/// Length of the FCS field.
pub const FCS_LEN: usize = 2;

/// Compute the FCS of `data`.
pub fn fcs(data: &[u8]) -> u16 {
    crc::Crc::<u16>::new(&CRC_16_IEEE802154).checksum(data)
}

/// Append the FCS of the `len` first octets of `buffer`, returning the new
/// length.
pub fn append_fcs(buffer: &mut [u8], len: usize) -> core::result::Result<usize, BufferTooSmall> {
    if buffer.len() < len + FCS_LEN {
        return Err(BufferTooSmall);
    }

    let crc = fcs(&buffer[..len]);
    buffer[len..][..FCS_LEN].copy_from_slice(&crc.to_le_bytes());
    Ok(len + FCS_LEN)
}

/// A frame followed by its Frame Check Sequence.
#[derive(Debug)]
pub struct FrameWithFcs<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> FrameWithFcs<T> {
    /// Create a new [`FrameWithFcs`], checking the FCS.
    ///
    /// # Errors
    ///
    /// Returns an error when the buffer is too short or the FCS mismatches.
    pub fn new(buffer: T) -> Result<Self> {
        let frame = Self::new_unchecked(buffer);

        if frame.buffer.as_ref().len() < FCS_LEN || !frame.check_fcs() {
            return Err(Error);
        }

        Ok(frame)
    }

    /// Create a new [`FrameWithFcs`] without checking the FCS.
    pub fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Returns `true` when the FCS matches the content.
    pub fn check_fcs(&self) -> bool {
        fcs(self.content()) == self.fcs()
    }

    /// The frame without its FCS.
    pub fn content(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        &buffer[..buffer.len() - FCS_LEN]
    }

    /// The FCS field.
    pub fn fcs(&self) -> u16 {
        let buffer = self.buffer.as_ref();
        let len = buffer.len();
        u16::from_le_bytes([buffer[len - 2], buffer[len - 1]])
    }
}
