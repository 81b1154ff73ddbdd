//! Information Elements readers and writers.

mod headers;
pub use headers::*;

mod payloads;
pub use payloads::*;

mod nested;
pub use nested::*;

use super::{Error, Result};

/// IEEE 802.15.4 Information Elements reader.
///
/// Payload IEs are only present when the header IEs end with a
/// [`HeaderTermination1`](HeaderElementId::HeaderTermination1).
#[derive(Debug)]
pub struct InformationElements<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> InformationElements<T> {
    /// Create a new [`InformationElements`] reader from a given buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if an element announces more content than the
    /// buffer holds.
    pub fn new(data: T) -> Result<Self> {
        let ie = Self::new_unchecked(data);

        if !ie.check_len() {
            return Err(Error);
        }

        Ok(ie)
    }

    fn check_len(&self) -> bool {
        let data = self.data.as_ref();
        let mut offset = 0;
        let mut payload_follows = false;

        while offset < data.len() {
            let Ok(ie) = HeaderInformationElement::new(&data[offset..]) else {
                return false;
            };
            offset += ie.len() + 2;
            match ie.element_id() {
                HeaderElementId::HeaderTermination1 => {
                    payload_follows = true;
                    break;
                }
                HeaderElementId::HeaderTermination2 => break,
                _ => (),
            }
        }

        if !payload_follows {
            return true;
        }

        while offset < data.len() {
            let Ok(ie) = PayloadInformationElement::new(&data[offset..]) else {
                return false;
            };
            offset += ie.length() + 2;
            if ie.group_id() == PayloadGroupId::PayloadTermination {
                break;
            }
        }

        true
    }

    /// Create a new [`InformationElements`] reader from a given buffer without
    /// length checking.
    pub fn new_unchecked(data: T) -> Self {
        Self { data }
    }

    fn header_len(&self) -> (usize, bool) {
        let mut iter = self.header_information_elements();
        let mut payload_follows = false;
        for ie in iter.by_ref() {
            payload_follows = ie.element_id() == HeaderElementId::HeaderTermination1;
        }
        (iter.offset(), payload_follows)
    }

    /// Returns the length of the information elements, up to and including
    /// the last termination element.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let (header_len, payload_follows) = self.header_len();
        if !payload_follows {
            return header_len;
        }

        let mut iter = self.payload_information_elements();
        while iter.next().is_some() {}
        header_len + iter.offset()
    }

    /// Returns an [`Iterator`] over [`HeaderInformationElement`].
    pub fn header_information_elements(&self) -> HeaderInformationElementsIterator {
        HeaderInformationElementsIterator::new(self.data.as_ref())
    }

    /// Returns an [`Iterator`] over [`PayloadInformationElement`].
    pub fn payload_information_elements(&self) -> PayloadInformationElementsIterator {
        let (start, payload_follows) = self.header_len();

        if !payload_follows {
            return PayloadInformationElementsIterator::new(&[]);
        }

        PayloadInformationElementsIterator::new(&self.data.as_ref()[start..])
    }

    /// Returns an [`Iterator`] over the nested IEs of every MLME payload IE.
    pub fn nested_information_elements(
        &self,
    ) -> impl Iterator<Item = NestedInformationElement<&[u8]>> + '_ {
        InformationElements::new_unchecked(self.data.as_ref()).into_nested_information_elements()
    }
}

impl<'f> InformationElements<&'f [u8]> {
    /// Consume the reader, returning the nested IEs of every MLME payload IE
    /// with the lifetime of the underlying buffer.
    pub fn into_nested_information_elements(
        self,
    ) -> impl Iterator<Item = NestedInformationElement<&'f [u8]>> {
        let (start, payload_follows) = self.header_len();
        let payload: &'f [u8] = if payload_follows {
            &self.data[start..]
        } else {
            &[]
        };

        PayloadInformationElementsIterator::new(payload)
            .filter(|ie| ie.group_id() == PayloadGroupId::Mlme)
            .flat_map(|ie| NestedInformationElementsIterator::new(ie.into_content()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_termination_1_then_payload() {
        let data = [
            0x00, 0x3f, 0x08, 0x88, 0x06, 0x1a, 0x0e, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let ie = InformationElements::new(&data[..]).unwrap();
        assert_eq!(ie.header_information_elements().count(), 1);
        assert_eq!(ie.payload_information_elements().count(), 1);
        assert_eq!(ie.len(), 12);

        let nested: std::vec::Vec<_> = ie.nested_information_elements().collect();
        assert_eq!(nested.len(), 1);
        assert_eq!(
            nested[0].sub_id(),
            NestedSubId::Short(NestedSubIdShort::TschSynchronization)
        );
    }

    #[test]
    fn header_termination_2_has_no_payload_ies() {
        let data = [0x80, 0x3f, 0x08, 0x88];
        let ie = InformationElements::new(&data[..]).unwrap();
        assert_eq!(ie.payload_information_elements().count(), 0);
        assert_eq!(ie.len(), 2);
    }

    #[test]
    fn truncated_payload_ie() {
        let data = [0x00, 0x3f, 0x08, 0x88, 0x06, 0x1a];
        assert!(InformationElements::new(&data[..]).is_err());
    }
}
