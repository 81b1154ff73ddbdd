//! Addressing fields readers and writers.

use super::FrameControl;
use super::FrameVersion;
use super::{Error, Result};

/// An IEEE 802.15.4 address.
///
/// Addresses are kept in big-endian (display) order; they are reversed on
/// the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Address {
    Absent,
    Short([u8; 2]),
    Extended([u8; 8]),
}

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address::Short([0xff; 2]);

    /// Query whether the address is a unicast address.
    pub fn is_unicast(&self) -> bool {
        !self.is_broadcast() && !self.is_empty()
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Build an address from its big-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the slice is not 0, 2 or 8 bytes long.
    pub fn from_bytes(a: &[u8]) -> Result<Self> {
        match a.len() {
            0 => Ok(Address::Absent),
            2 => Ok(Address::Short([a[0], a[1]])),
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(a);
                Ok(Address::Extended(b))
            }
            _ => Err(Error),
        }
    }

    /// Return the big-endian bytes of the address.
    pub const fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Absent => &[],
            Address::Short(value) => value,
            Address::Extended(value) => value,
        }
    }

    /// Return the length of the address in octets.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` for [`Address::Absent`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Address::Absent)
    }

    fn read(mode: AddressingMode, raw: &[u8]) -> Option<Self> {
        let mut bytes = [0u8; 8];
        let len = mode.size();
        bytes[..len].copy_from_slice(&raw[..len]);
        bytes[..len].reverse();
        match mode {
            AddressingMode::Absent => Some(Address::Absent),
            AddressingMode::Short => Some(Address::Short([bytes[0], bytes[1]])),
            AddressingMode::Extended => Some(Address::Extended(bytes)),
            AddressingMode::Unknown => None,
        }
    }

    fn write(&self, buffer: &mut [u8]) {
        let len = self.len();
        buffer[..len].copy_from_slice(self.as_bytes());
        buffer[..len].reverse();
    }
}

impl From<Address> for AddressingMode {
    fn from(value: Address) -> Self {
        match value {
            Address::Absent => AddressingMode::Absent,
            Address::Short(_) => AddressingMode::Short,
            Address::Extended(_) => AddressingMode::Extended,
        }
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Address::Absent => write!(f, "absent"),
            Address::Short(value) => write!(f, "{:02x}:{:02x}", value[0], value[1]),
            Address::Extended(value) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7]
            ),
        }
    }
}

/// IEEE 802.15.4 addressing mode.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum AddressingMode {
    Absent = 0b00,
    Short = 0b10,
    Extended = 0b11,
    Unknown,
}

impl AddressingMode {
    /// Return the size of the address in octets.
    pub fn size(&self) -> usize {
        match self {
            Self::Absent | Self::Unknown => 0,
            Self::Short => 2,
            Self::Extended => 8,
        }
    }
}

impl From<u8> for AddressingMode {
    fn from(value: u8) -> Self {
        match value {
            0b00 => Self::Absent,
            0b10 => Self::Short,
            0b11 => Self::Extended,
            _ => Self::Unknown,
        }
    }
}

/// Which addressing fields are present, derived from the frame control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    dst_pan_id: bool,
    dst: AddressingMode,
    src_pan_id: bool,
    src: AddressingMode,
}

impl Layout {
    fn from_frame_control<T: AsRef<[u8]>>(fc: &FrameControl<T>) -> Option<Self> {
        use AddressingMode::*;

        let dst = fc.dst_addressing_mode();
        let src = fc.src_addressing_mode();
        if dst == Unknown || src == Unknown {
            return None;
        }
        let compression = fc.pan_id_compression();

        let (dst_pan_id, src_pan_id) = match fc.frame_version() {
            FrameVersion::Ieee802154_2003 | FrameVersion::Ieee802154_2006 => match (dst, src) {
                (Absent, Absent) => (false, false),
                (Absent, _) => (false, true),
                (_, Absent) => (true, false),
                _ => (true, !compression),
            },
            FrameVersion::Ieee802154_2020 => match (dst, src, compression) {
                (Absent, Absent, c) => (c, false),
                (_, Absent, c) => (!c, false),
                (Absent, _, _) => (false, true),
                (Extended, Extended, c) => (!c, false),
                (_, _, c) => (true, !c),
            },
            FrameVersion::Unknown => return None,
        };

        Some(Self {
            dst_pan_id,
            dst,
            src_pan_id,
            src,
        })
    }

    fn len(&self) -> usize {
        2 * self.dst_pan_id as usize
            + self.dst.size()
            + 2 * self.src_pan_id as usize
            + self.src.size()
    }
}

/// A reader for the IEEE 802.15.4 Addressing Fields.
///
/// The layout depends on the frame control, which is captured when the
/// reader is created.
pub struct AddressingFields<T: AsRef<[u8]>> {
    buffer: T,
    layout: Layout,
}

impl<T: AsRef<[u8]>> AddressingFields<T> {
    /// Create a new [`AddressingFields`] reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame control describes an invalid addressing
    /// combination or if the buffer is too short.
    pub fn new<F: AsRef<[u8]>>(buffer: T, fc: &FrameControl<F>) -> Result<Self> {
        let layout = Layout::from_frame_control(fc).ok_or(Error)?;

        if buffer.as_ref().len() < layout.len() {
            return Err(Error);
        }

        Ok(Self { buffer, layout })
    }

    /// Return the length of the Addressing Fields in octets.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Return the destination PAN ID if not elided.
    pub fn dst_pan_id(&self) -> Option<u16> {
        self.layout.dst_pan_id.then(|| {
            let b = &self.buffer.as_ref()[..2];
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    /// Return the destination [`Address`].
    pub fn dst_address(&self) -> Address {
        let offset = 2 * self.layout.dst_pan_id as usize;
        Address::read(self.layout.dst, &self.buffer.as_ref()[offset..]).unwrap_or(Address::Absent)
    }

    /// Return the source PAN ID if not elided.
    pub fn src_pan_id(&self) -> Option<u16> {
        self.layout.src_pan_id.then(|| {
            let offset = 2 * self.layout.dst_pan_id as usize + self.layout.dst.size();
            let b = &self.buffer.as_ref()[offset..][..2];
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    /// Return the source [`Address`].
    pub fn src_address(&self) -> Address {
        let offset = 2 * self.layout.dst_pan_id as usize
            + self.layout.dst.size()
            + 2 * self.layout.src_pan_id as usize;
        Address::read(self.layout.src, &self.buffer.as_ref()[offset..]).unwrap_or(Address::Absent)
    }

    /// The PAN ID the frame belongs to: the destination PAN ID, or the source
    /// PAN ID when the destination one is elided.
    pub fn pan_id(&self) -> Option<u16> {
        self.dst_pan_id().or_else(|| self.src_pan_id())
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for AddressingFields<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Addressing Fields")?;
        if let Some(id) = self.dst_pan_id() {
            writeln!(f, "  dst pan id: {:0x}", id)?;
        }
        writeln!(f, "  dst address: {}", self.dst_address())?;
        if let Some(id) = self.src_pan_id() {
            writeln!(f, "  src pan id: {:0x}", id)?;
        }
        writeln!(f, "  src address: {}", self.src_address())
    }
}

/// The addressing fields to emit into a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddressingRepr {
    /// Destination PAN ID, `None` when elided.
    pub dst_pan_id: Option<u16>,
    /// Destination address.
    pub dst_address: Option<Address>,
    /// Source PAN ID, `None` when elided.
    pub src_pan_id: Option<u16>,
    /// Source address.
    pub src_address: Option<Address>,
}

impl AddressingRepr {
    /// The number of octets needed to emit the fields.
    pub fn buffer_len(&self) -> usize {
        self.dst_pan_id.map_or(0, |_| 2)
            + self.dst_address.map_or(0, |a| a.len())
            + self.src_pan_id.map_or(0, |_| 2)
            + self.src_address.map_or(0, |a| a.len())
    }

    /// Emit the fields, in wire order, into `buffer`.
    pub fn emit(&self, buffer: &mut [u8]) {
        let mut offset = 0;

        if let Some(id) = self.dst_pan_id {
            buffer[offset..][..2].copy_from_slice(&id.to_le_bytes());
            offset += 2;
        }

        if let Some(addr) = self.dst_address {
            addr.write(&mut buffer[offset..]);
            offset += addr.len();
        }

        if let Some(id) = self.src_pan_id {
            buffer[offset..][..2].copy_from_slice(&id.to_le_bytes());
            offset += 2;
        }

        if let Some(addr) = self.src_address {
            addr.write(&mut buffer[offset..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_broadcast() {
        assert!(Address::BROADCAST.is_broadcast());
        assert!(!Address::Short([0xff, 0xfe]).is_broadcast());

        assert!(!Address::BROADCAST.is_unicast());
        assert!(!Address::Absent.is_unicast());
        assert!(Address::Short([0xff, 0xfe]).is_unicast());
    }

    #[test]
    fn from_bytes() {
        assert_eq!(
            Address::from_bytes(&[0xff, 0xfe]).unwrap(),
            Address::Short([0xff, 0xfe])
        );
        assert_eq!(
            Address::from_bytes(&[0x01; 8]).unwrap(),
            Address::Extended([0x01; 8])
        );
        assert_eq!(Address::from_bytes(&[]).unwrap(), Address::Absent);
        assert!(Address::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn enhanced_beacon_addressing() {
        let frame = [
            0x40, 0xeb, 0xcd, 0xab, 0xff, 0xff, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00,
        ];
        let fc = FrameControl::new(&frame[..2]).unwrap();
        let addressing = AddressingFields::new(&frame[2..], &fc).unwrap();

        assert_eq!(addressing.len(), 12);
        assert_eq!(addressing.dst_pan_id(), Some(0xabcd));
        assert_eq!(addressing.dst_address(), Address::BROADCAST);
        assert_eq!(addressing.src_pan_id(), None);
        assert_eq!(
            addressing.src_address(),
            Address::Extended([0x00, 0x04, 0x00, 0x03, 0x00, 0x02, 0x00, 0x01])
        );
    }

    #[test]
    fn emit_reverses_addresses() {
        let repr = AddressingRepr {
            dst_pan_id: Some(0xabcd),
            dst_address: Some(Address::Short([0x12, 0x34])),
            src_pan_id: None,
            src_address: Some(Address::Extended([1, 2, 3, 4, 5, 6, 7, 8])),
        };
        let mut buffer = [0u8; 12];
        assert_eq!(repr.buffer_len(), 12);
        repr.emit(&mut buffer);
        assert_eq!(buffer, [0xcd, 0xab, 0x34, 0x12, 8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn truncated_fields() {
        let frame = [0x40, 0xeb, 0xcd, 0xab, 0xff, 0xff, 0x01];
        let fc = FrameControl::new(&frame[..2]).unwrap();
        assert!(AddressingFields::new(&frame[2..], &fc).is_err());
    }
}
