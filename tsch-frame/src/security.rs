//! Auxiliary Security Header reader.
//!
//! Frames are never secured or authenticated here. The reader only tells
//! where the header ends and how long the trailing MIC is, so that
//! information elements of a secured frame can still be located.

use super::{Error, Result};

/// A reader for the IEEE 802.15.4 Auxiliary Security Header.
#[derive(Debug)]
pub struct AuxiliarySecurityHeader<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> AuxiliarySecurityHeader<T> {
    /// Create a new reader, checking that the whole header is present.
    pub fn new(buffer: T) -> Result<Self> {
        let header = Self { buffer };

        if header.buffer.as_ref().is_empty() || header.buffer.as_ref().len() < header.len() {
            return Err(Error);
        }

        Ok(header)
    }

    /// Return the Security Control field.
    pub fn security_control(&self) -> SecurityControl {
        SecurityControl(self.buffer.as_ref()[0])
    }

    /// The frame counter, unless suppressed.
    pub fn frame_counter(&self) -> Option<u32> {
        if self.security_control().frame_counter_suppression() {
            return None;
        }
        let b = &self.buffer.as_ref()[1..5];
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// The length of the header in octets.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let sc = self.security_control();
        let counter = if sc.frame_counter_suppression() { 0 } else { 4 };
        let key_identifier = match sc.key_identifier_mode() {
            0 => 0,
            1 => 1,
            2 => 5,
            _ => 9,
        };
        1 + counter + key_identifier
    }
}

/// The Security Control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityControl(pub u8);

impl SecurityControl {
    /// Security level (0 to 7).
    pub fn security_level(&self) -> u8 {
        self.0 & 0b111
    }

    /// Key identifier mode (0 to 3).
    pub fn key_identifier_mode(&self) -> u8 {
        (self.0 >> 3) & 0b11
    }

    /// Returns `true` when the frame counter is suppressed.
    pub fn frame_counter_suppression(&self) -> bool {
        (self.0 >> 5) & 0b1 == 1
    }

    /// Returns `true` when the ASN is used in the nonce.
    pub fn asn_in_nonce(&self) -> bool {
        (self.0 >> 6) & 0b1 == 1
    }

    /// The MIC length implied by the security level.
    pub fn mic_len(&self) -> usize {
        match self.security_level() & 0b11 {
            1 => 4,
            2 => 8,
            3 => 16,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_counter_implicit_key() {
        let header = AuxiliarySecurityHeader::new(&[0b0010_0101][..]).unwrap();
        assert_eq!(header.len(), 1);
        assert_eq!(header.frame_counter(), None);
        assert_eq!(header.security_control().mic_len(), 4);
    }

    #[test]
    fn counter_and_key_index() {
        let header =
            AuxiliarySecurityHeader::new(&[0b0000_1110, 0x01, 0x00, 0x00, 0x00, 0x07][..]).unwrap();
        assert_eq!(header.len(), 6);
        assert_eq!(header.frame_counter(), Some(1));
        assert_eq!(header.security_control().mic_len(), 8);
    }

    #[test]
    fn truncated() {
        assert!(AuxiliarySecurityHeader::new(&[0b0000_0001, 0x01][..]).is_err());
        assert!(AuxiliarySecurityHeader::new(&[][..]).is_err());
    }
}
