//! Generic IEEE 802.15.4 frame reader.

use crate::{
    AddressingFields, AuxiliarySecurityHeader, Error, FrameControl, InformationElements, Result,
};

/// A reader for an IEEE 802.15.4 frame, without FCS.
///
/// The reader locates every field from the frame control: sequence number,
/// addressing fields, auxiliary security header, information elements and
/// payload. For secured frames, the MIC at the end of the frame is excluded
/// from the IEs and the payload.
pub struct Frame<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Frame<T> {
    /// Create a new [`Frame`] reader.
    ///
    /// # Errors
    ///
    /// Returns an error when one of the fields announced by the frame control
    /// does not fit in the buffer.
    pub fn new(buffer: T) -> Result<Self> {
        let frame = Self::new_unchecked(buffer);

        if !frame.check_len() {
            return Err(Error);
        }

        Ok(frame)
    }

    /// Returns `false` if the buffer is too short for the announced fields.
    pub fn check_len(&self) -> bool {
        let buffer = self.buffer.as_ref();
        if buffer.len() < 2 {
            return false;
        }

        let fc = self.frame_control();
        let mut offset = 2;

        if !fc.sequence_number_suppression() {
            offset += 1;
        }

        let Some(addressing) = buffer
            .get(offset..)
            .and_then(|b| AddressingFields::new(b, &fc).ok())
        else {
            return false;
        };
        offset += addressing.len();

        if fc.security_enabled() {
            let Some(header) = buffer
                .get(offset..)
                .and_then(|b| AuxiliarySecurityHeader::new(b).ok())
            else {
                return false;
            };
            offset += header.len();

            if buffer.len() < offset + header.security_control().mic_len() {
                return false;
            }
        }

        if fc.information_elements_present() {
            let end = buffer.len() - self.mic_len();
            if InformationElements::new(&buffer[offset..end]).is_err() {
                return false;
            }
        }

        true
    }

    /// Create a new [`Frame`] reader without checking the buffer length.
    pub fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Returns a [`FrameControl`] reader.
    pub fn frame_control(&self) -> FrameControl<&'_ [u8]> {
        FrameControl::new_unchecked(&self.buffer.as_ref()[..2])
    }

    /// Returns the sequence number if not suppressed.
    pub fn sequence_number(&self) -> Option<u8> {
        if self.frame_control().sequence_number_suppression() {
            None
        } else {
            Some(self.buffer.as_ref()[2])
        }
    }

    fn addressing_offset(&self) -> usize {
        if self.frame_control().sequence_number_suppression() {
            2
        } else {
            3
        }
    }

    /// Returns an [`AddressingFields`] reader.
    pub fn addressing(&self) -> Option<AddressingFields<&'_ [u8]>> {
        AddressingFields::new(
            &self.buffer.as_ref()[self.addressing_offset()..],
            &self.frame_control(),
        )
        .ok()
    }

    fn security_offset(&self) -> usize {
        self.addressing_offset() + self.addressing().map_or(0, |a| a.len())
    }

    /// Returns an [`AuxiliarySecurityHeader`] reader for secured frames.
    pub fn auxiliary_security_header(&self) -> Option<AuxiliarySecurityHeader<&'_ [u8]>> {
        if !self.frame_control().security_enabled() {
            return None;
        }

        AuxiliarySecurityHeader::new(&self.buffer.as_ref()[self.security_offset()..]).ok()
    }

    /// The length of the MIC trailing a secured frame, 0 otherwise.
    pub fn mic_len(&self) -> usize {
        self.auxiliary_security_header()
            .map_or(0, |h| h.security_control().mic_len())
    }

    /// The length of the MAC header, up to the information elements.
    pub fn header_len(&self) -> usize {
        self.security_offset() + self.auxiliary_security_header().map_or(0, |h| h.len())
    }

    fn body(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        &buffer[self.header_len()..buffer.len() - self.mic_len()]
    }

    /// Returns an [`InformationElements`] reader when IEs are present.
    pub fn information_elements(&self) -> Option<InformationElements<&'_ [u8]>> {
        if !self.frame_control().information_elements_present() {
            return None;
        }

        InformationElements::new(self.body()).ok()
    }

    /// Returns the frame payload, following the information elements.
    pub fn payload(&self) -> Option<&[u8]> {
        let ie_len = self.information_elements().map_or(0, |ie| ie.len());
        let payload = &self.body()[ie_len..];

        if payload.is_empty() {
            None
        } else {
            Some(payload)
        }
    }

    /// Returns the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for Frame<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.frame_control())?;
        if let Some(seq) = self.sequence_number() {
            writeln!(f, "Sequence number: {seq}")?;
        }
        if let Some(addressing) = self.addressing() {
            write!(f, "{addressing}")?;
        }
        if let Some(ie) = self.information_elements() {
            writeln!(f, "Information Elements")?;
            for header in ie.header_information_elements() {
                writeln!(f, "  {header}")?;
            }
            for payload in ie.payload_information_elements() {
                writeln!(f, "  {:?}", payload.group_id())?;
                for nested in payload.nested_information_elements() {
                    writeln!(f, "    {nested}")?;
                }
            }
        }
        if let Some(payload) = self.payload() {
            writeln!(f, "Payload: {:0x?}", payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, FrameType, HeaderElementId, PayloadGroupId};

    #[test]
    fn enhanced_beacon() {
        let data = hex::decode(
            "40ebcdabffff0100010001000100003f1188061a0e0000000000011c0001c800011b00",
        )
        .unwrap();
        let frame = Frame::new(&data[..]).unwrap();
        assert_eq!(frame.frame_control().frame_type(), FrameType::Beacon);
        assert_eq!(frame.sequence_number(), None);

        let addressing = frame.addressing().unwrap();
        assert_eq!(addressing.dst_pan_id(), Some(0xabcd));
        assert_eq!(addressing.dst_address(), Address::BROADCAST);
        assert_eq!(
            addressing.src_address(),
            Address::Extended([0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01])
        );

        let ie = frame.information_elements().unwrap();
        let headers: std::vec::Vec<_> = ie.header_information_elements().collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].element_id(), HeaderElementId::HeaderTermination1);

        let payloads: std::vec::Vec<_> = ie.payload_information_elements().collect();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].group_id(), PayloadGroupId::Mlme);
        assert_eq!(ie.nested_information_elements().count(), 4);

        assert!(frame.payload().is_none());
    }

    #[test]
    fn data_frame() {
        let data = hex::decode("41d801cdabffffc7d9b514004b12002b000000").unwrap();
        let frame = Frame::new(&data[..]).unwrap();
        assert_eq!(frame.frame_control().frame_type(), FrameType::Data);
        assert_eq!(frame.sequence_number(), Some(1));
        assert!(frame.information_elements().is_none());

        let addressing = frame.addressing().unwrap();
        assert_eq!(addressing.dst_address(), Address::BROADCAST);
        assert_eq!(
            addressing.src_address(),
            Address::Extended([0x00, 0x12, 0x4b, 0x00, 0x14, 0xb5, 0xd9, 0xc7])
        );
        assert_eq!(frame.payload(), Some(&[0x2b, 0x00, 0x00, 0x00][..]));
    }

    #[test]
    fn enhanced_ack() {
        let data = hex::decode("022e37cdab0200020002000200020fe18f").unwrap();
        let frame = Frame::new(&data[..]).unwrap();
        assert_eq!(frame.frame_control().frame_type(), FrameType::Ack);
        assert_eq!(frame.sequence_number(), Some(0x37));
        assert_eq!(frame.header_len(), 13);

        let ie = frame.information_elements().unwrap();
        let header = ie.header_information_elements().next().unwrap();
        assert_eq!(header.element_id(), HeaderElementId::TimeCorrection);
    }

    #[test]
    fn truncated_addressing() {
        let data = hex::decode("41d801cdabffffc7d9b5").unwrap();
        assert!(Frame::new(&data[..]).is_err());
    }

    #[test]
    fn secured_frame_excludes_mic() {
        // Data frame, security enabled, suppressed counter, MIC-32.
        let data = [
            0x49, 0xd8, 0x01, 0xcd, 0xab, 0xff, 0xff, 0xc7, 0xd9, 0xb5, 0x14, 0x00, 0x4b, 0x12,
            0x00, 0x25, 0xaa, 0xbb, 0x01, 0x02, 0x03, 0x04,
        ];
        let frame = Frame::new(&data[..]).unwrap();
        assert_eq!(frame.mic_len(), 4);
        assert_eq!(frame.header_len(), 16);
        assert_eq!(frame.payload(), Some(&[0xaa, 0xbb][..]));
    }
}
