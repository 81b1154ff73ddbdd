//! Header Information Element readers and writers.

use crate::time::Duration;
use crate::{BufferTooSmall, Error, Result};

/// A reader/writer for an IEEE 802.15.4 Header Information Element.
///
/// ```notrust
/// +--------+------------+--------+--------------------------+
/// | Length | Element ID | Type=0 | Content (0-127 octets)...|
/// +--------+------------+--------+--------------------------+
///  0..7      7..15        15
/// ```
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct HeaderInformationElement<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> HeaderInformationElement<T> {
    /// Create a new [`HeaderInformationElement`] reader/writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer does not hold the header and the
    /// announced content.
    pub fn new(data: T) -> Result<Self> {
        let ie = Self::new_unchecked(data);

        if !ie.check_len() {
            return Err(Error);
        }

        Ok(ie)
    }

    fn check_len(&self) -> bool {
        self.data.as_ref().len() >= 2 && self.data.as_ref().len() >= 2 + self.len()
    }

    /// Create a new [`HeaderInformationElement`] without length checking.
    pub fn new_unchecked(data: T) -> Self {
        Self { data }
    }

    /// Returns `true` when the length field is 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the length field value.
    pub fn len(&self) -> usize {
        let b = &self.data.as_ref()[0..2];
        (u16::from_le_bytes([b[0], b[1]]) & 0x7f) as usize
    }

    /// Return the [`HeaderElementId`].
    pub fn element_id(&self) -> HeaderElementId {
        let b = &self.data.as_ref()[0..2];
        let id = (u16::from_le_bytes([b[0], b[1]]) >> 7) & 0xff;
        HeaderElementId::from(id as u8)
    }

    /// Return the content of this Header Information Element.
    pub fn content(&self) -> &[u8] {
        &self.data.as_ref()[2..][..self.len()]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeaderInformationElement<T> {
    /// Write the length and element ID fields.
    pub fn set_header(&mut self, len: u16, id: HeaderElementId) {
        let value = (len & 0x7f) | (((id as u16) & 0xff) << 7);
        self.data.as_mut()[0..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Return the content of this Header Information Element.
    pub fn content_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut()[2..]
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for HeaderInformationElement<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let id = self.element_id();
        match id {
            HeaderElementId::HeaderTermination1 | HeaderElementId::HeaderTermination2 => {
                write!(f, "{:?}", id)
            }
            HeaderElementId::TimeCorrection => match TimeCorrection::new(self.content()) {
                Ok(tc) => write!(f, "{} {}", id, tc),
                Err(_) => write!(f, "{:?}({:0x?})", id, self.content()),
            },
            id => write!(f, "{:?}({:0x?})", id, self.content()),
        }
    }
}

/// Header Information Element ID.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderElementId {
    /// Vendor specific header.
    VendorSpecificHeader = 0x00,
    /// Csl header.
    Csl = 0x1a,
    /// Rit header.
    Rit = 0x1b,
    /// Rendezvous Time header.
    RendezvousTime = 0x1d,
    /// Time Correction header.
    TimeCorrection = 0x1e,
    /// Global Time header.
    GlobalTime = 0x29,
    /// Header Termination 1.
    HeaderTermination1 = 0x7e,
    /// Header Termination 2.
    HeaderTermination2 = 0x7f,
    /// Unknown header.
    Unknown,
}

impl From<u8> for HeaderElementId {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::VendorSpecificHeader,
            0x1a => Self::Csl,
            0x1b => Self::Rit,
            0x1d => Self::RendezvousTime,
            0x1e => Self::TimeCorrection,
            0x29 => Self::GlobalTime,
            0x7e => Self::HeaderTermination1,
            0x7f => Self::HeaderTermination2,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for HeaderElementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TimeCorrection => write!(f, "Time Correction"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// An [`Iterator`] over [`HeaderInformationElement`].
///
/// The iterator stops after a header termination element.
#[derive(Debug, Clone)]
pub struct HeaderInformationElementsIterator<'f> {
    data: &'f [u8],
    offset: usize,
    terminated: bool,
}

impl<'f> HeaderInformationElementsIterator<'f> {
    /// Create an iterator over the header IEs at the start of `data`.
    pub fn new(data: &'f [u8]) -> Self {
        Self {
            data,
            offset: 0,
            terminated: data.is_empty(),
        }
    }

    /// Returns the offset of the next Header Information Element.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'f> Iterator for HeaderInformationElementsIterator<'f> {
    type Item = HeaderInformationElement<&'f [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }

        let Ok(ie) = HeaderInformationElement::new(&self.data[self.offset..]) else {
            self.terminated = true;
            return None;
        };
        let len = ie.len() + 2;
        let ie = HeaderInformationElement::new_unchecked(&self.data[self.offset..][..len]);

        self.terminated = matches!(
            ie.element_id(),
            HeaderElementId::HeaderTermination1 | HeaderElementId::HeaderTermination2
        );
        self.offset += len;

        if self.offset >= self.data.len() {
            self.terminated = true;
        }

        Some(ie)
    }
}

/// A reader/writer for the Time Correction Header IE.
///
/// ```notrust
/// +-----------------------------+------+
/// | Time sync info (12 bit, 2C) | Nack |
/// +-----------------------------+------+
///  0..12                          15
/// ```
pub struct TimeCorrection<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> TimeCorrection<T> {
    /// Create a new [`TimeCorrection`] reader/writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too short.
    pub fn new(buffer: T) -> Result<Self> {
        let ie = Self::new_unchecked(buffer);

        if ie.buffer.as_ref().len() < Self::len() {
            return Err(Error);
        }

        Ok(ie)
    }

    /// Create a new [`TimeCorrection`] without length checking.
    pub fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// The length of the Time Correction content.
    pub const fn len() -> usize {
        2
    }

    fn raw(&self) -> u16 {
        let b = &self.buffer.as_ref()[0..2];
        u16::from_le_bytes([b[0], b[1]])
    }

    /// Return the time correction value, sign extended from 12 bits.
    pub fn time_correction(&self) -> Duration {
        let time = ((self.raw() & 0x0fff) << 4) as i16;
        Duration::from_us((time >> 4) as i64)
    }

    /// Returns `true` when the frame is not acknowledged.
    pub fn nack(&self) -> bool {
        self.raw() & 0x8000 != 0
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> TimeCorrection<T> {
    /// Set the time correction value, saturated to the 12 bit range
    /// `-2048..=2047` us.
    pub fn set_time_correction(&mut self, time_correction: Duration) {
        let time = (time_correction.as_us().clamp(-2048, 2047) as i16 as u16) & 0x0fff;
        let value = (self.raw() & 0x8000) | time;
        self.buffer.as_mut()[0..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Set the NACK field.
    pub fn set_nack(&mut self, nack: bool) {
        let value = (self.raw() & 0x7fff) | ((nack as u16) << 15);
        self.buffer.as_mut()[0..2].copy_from_slice(&value.to_le_bytes());
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for TimeCorrection<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}, nack: {}", self.time_correction(), self.nack() as usize)
    }
}

/// A high-level representation of a Header Information Element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderInformationElementRepr {
    /// Time correction and ACK status, carried by enhanced ACKs.
    TimeCorrection {
        /// The measured drift.
        correction: Duration,
        /// The frame was received but not accepted.
        nack: bool,
    },
    /// Header Termination 1: payload IEs follow.
    HeaderTermination1,
    /// Header Termination 2: the frame payload follows.
    HeaderTermination2,
}

impl HeaderInformationElementRepr {
    /// The number of octets needed to emit the element.
    pub fn buffer_len(&self) -> usize {
        2 + match self {
            Self::TimeCorrection { .. } => TimeCorrection::<&[u8]>::len(),
            Self::HeaderTermination1 | Self::HeaderTermination2 => 0,
        }
    }

    /// Emit the element at the start of `buffer`, returning its length.
    pub fn emit(&self, buffer: &mut [u8]) -> core::result::Result<usize, BufferTooSmall> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(BufferTooSmall);
        }

        let mut ie = HeaderInformationElement::new_unchecked(&mut buffer[..len]);
        match self {
            Self::TimeCorrection { correction, nack } => {
                ie.set_header(2, HeaderElementId::TimeCorrection);
                let mut tc = TimeCorrection::new_unchecked(ie.content_mut());
                tc.set_time_correction(*correction);
                tc.set_nack(*nack);
            }
            Self::HeaderTermination1 => ie.set_header(0, HeaderElementId::HeaderTermination1),
            Self::HeaderTermination2 => ie.set_header(0, HeaderElementId::HeaderTermination2),
        }

        Ok(len)
    }
}
