use super::NestedInformationElementsIterator;
use crate::{BufferTooSmall, Error, Result};

/// A reader/writer for an IEEE 802.15.4 Payload Information Element.
///
/// ```notrust
/// +--------+----------+--------+---------------------------+
/// | Length | Group ID | Type=1 | Content (0-2047 octets)...|
/// +--------+----------+--------+---------------------------+
///  0..11     11..15     15
/// ```
#[derive(Debug, Eq, PartialEq)]
pub struct PayloadInformationElement<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> PayloadInformationElement<T> {
    /// Create a new [`PayloadInformationElement`] reader/writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer does not hold the header and the
    /// announced content.
    pub fn new(data: T) -> Result<Self> {
        let ie = Self::new_unchecked(data);

        if ie.data.as_ref().len() < 2 || ie.data.as_ref().len() < 2 + ie.length() {
            return Err(Error);
        }

        Ok(ie)
    }

    /// Create a new [`PayloadInformationElement`] without length checking.
    pub fn new_unchecked(data: T) -> Self {
        Self { data }
    }

    fn raw(&self) -> u16 {
        let b = &self.data.as_ref()[0..2];
        u16::from_le_bytes([b[0], b[1]])
    }

    /// Return the length field value (the length of the content).
    pub fn length(&self) -> usize {
        (self.raw() & 0x07ff) as usize
    }

    /// Return the [`PayloadGroupId`].
    pub fn group_id(&self) -> PayloadGroupId {
        PayloadGroupId::from(((self.raw() >> 11) & 0x0f) as u8)
    }

    /// Return the content of this Payload Information Element.
    pub fn content(&self) -> &[u8] {
        &self.data.as_ref()[2..][..self.length()]
    }

    /// Returns an [`Iterator`] over the nested IEs, empty unless this is an
    /// [`MLME`] element.
    ///
    /// [`MLME`]: PayloadGroupId::Mlme
    pub fn nested_information_elements(&self) -> NestedInformationElementsIterator {
        if self.group_id() == PayloadGroupId::Mlme {
            NestedInformationElementsIterator::new(self.content())
        } else {
            NestedInformationElementsIterator::new(&[])
        }
    }
}

impl<'f> PayloadInformationElement<&'f [u8]> {
    /// Consume the reader, returning the content with the buffer lifetime.
    pub fn into_content(self) -> &'f [u8] {
        &self.data[2..][..self.length()]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> PayloadInformationElement<T> {
    /// Write the length and group ID fields.
    pub fn set_header(&mut self, len: u16, id: PayloadGroupId) {
        let value = (len & 0x07ff) | (((id as u16) & 0x0f) << 11) | 0x8000;
        self.data.as_mut()[0..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Return the content of this Payload Information Element.
    pub fn content_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut()[2..]
    }
}

/// Payload Information Element group ID.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadGroupId {
    /// Encapsulated Service Data Unit Information Elements
    Esdu = 0x00,
    /// MAC sublayer Management Entity Information Elements
    Mlme = 0x01,
    /// Vendor specific Nested Information Elements
    VendorSpecific = 0x02,
    /// Payload Termination
    PayloadTermination = 0x0f,
    /// Unknown
    Unknown,
}

impl From<u8> for PayloadGroupId {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Esdu,
            0x01 => Self::Mlme,
            0x02 => Self::VendorSpecific,
            0x0f => Self::PayloadTermination,
            _ => Self::Unknown,
        }
    }
}

/// An [`Iterator`] over [`PayloadInformationElement`].
///
/// The iterator stops after a payload termination element.
#[derive(Debug, Clone)]
pub struct PayloadInformationElementsIterator<'f> {
    data: &'f [u8],
    offset: usize,
    terminated: bool,
}

impl<'f> PayloadInformationElementsIterator<'f> {
    /// Create an iterator over the payload IEs at the start of `data`.
    pub fn new(data: &'f [u8]) -> Self {
        Self {
            data,
            offset: 0,
            terminated: data.is_empty(),
        }
    }

    /// Return the offset of the next element.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'f> Iterator for PayloadInformationElementsIterator<'f> {
    type Item = PayloadInformationElement<&'f [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }

        let Ok(ie) = PayloadInformationElement::new(&self.data[self.offset..]) else {
            self.terminated = true;
            return None;
        };
        let len = ie.length() + 2;
        let ie = PayloadInformationElement::new_unchecked(&self.data[self.offset..][..len]);

        self.terminated = ie.group_id() == PayloadGroupId::PayloadTermination;
        self.offset += len;

        if self.offset >= self.data.len() {
            self.terminated = true;
        }

        Some(ie)
    }
}

/// Emit the header of an MLME payload IE whose nested content is
/// `content_len` octets long.
pub fn emit_mlme_header(buffer: &mut [u8], content_len: usize) -> core::result::Result<usize, BufferTooSmall> {
    if buffer.len() < 2 || content_len > 0x07ff {
        return Err(BufferTooSmall);
    }
    PayloadInformationElement::new_unchecked(&mut buffer[..2])
        .set_header(content_len as u16, PayloadGroupId::Mlme);
    Ok(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mlme_header() {
        let data = [0x11, 0x88];
        let ie = PayloadInformationElement::new_unchecked(&data[..]);
        assert_eq!(ie.length(), 0x11);
        assert_eq!(ie.group_id(), PayloadGroupId::Mlme);

        let mut buffer = [0u8; 2];
        emit_mlme_header(&mut buffer, 0x11).unwrap();
        assert_eq!(buffer, data);
    }

    #[test]
    fn payload_termination_stops_iteration() {
        let data = [0x00, 0xf8, 0xaa, 0xbb];
        let mut iter = PayloadInformationElementsIterator::new(&data);
        let ie = iter.next().unwrap();
        assert_eq!(ie.group_id(), PayloadGroupId::PayloadTermination);
        assert!(iter.next().is_none());
        assert_eq!(iter.offset(), 2);
    }

    #[test]
    fn truncated() {
        assert!(PayloadInformationElement::new(&[0x11, 0x88, 0x00][..]).is_err());
    }
}
