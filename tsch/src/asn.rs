//! The Absolute Slot Number.

const MAX_VALUE: u64 = 0xff_ffff_ffff;

/// The absolute slot number represents the total number of timeslots that has
/// elapsed since the start of the network or an arbitrary start time
/// determined by the PAN coordinator. It is stored as a 5-byte unsigned
/// integer, and arithmetic wraps around at 2^40.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct AbsoluteSlotNumber {
    /// least significant 4 bytes of the absolute slot number
    ls4b: u32,
    /// most significant byte of the absolute slot number
    ms1b: u8,
}

impl AbsoluteSlotNumber {
    /// The first slot.
    pub const ZERO: Self = Self { ls4b: 0, ms1b: 0 };

    /// Create an ASN from its two parts.
    pub const fn from_parts(ms1b: u8, ls4b: u32) -> Self {
        Self { ls4b, ms1b }
    }

    /// Create an ASN from a 40-bit value; upper bits are dropped.
    pub const fn from_u64(value: u64) -> Self {
        Self {
            ls4b: (value & 0xffff_ffff) as u32,
            ms1b: ((value >> 32) & 0xff) as u8,
        }
    }

    /// Returns the ASN as a 40-bit value.
    pub const fn as_u64(&self) -> u64 {
        ((self.ms1b as u64) << 32) | self.ls4b as u64
    }

    /// The least significant 4 bytes.
    pub const fn ls4b(&self) -> u32 {
        self.ls4b
    }

    /// The most significant byte.
    pub const fn ms1b(&self) -> u8 {
        self.ms1b
    }

    /// Increments the ASN by one slot
    pub fn increment(&mut self) {
        *self = *self + 1u32;
    }

    /// Decrements the ASN by one slot
    pub fn decrement(&mut self) {
        *self = *self - 1u32;
    }

    /// Signed difference `self - other`, computed on the low 4 bytes.
    ///
    /// Only meaningful for ASNs less than 2^31 slots apart.
    pub fn diff(&self, other: &Self) -> i32 {
        self.ls4b.wrapping_sub(other.ls4b) as i32
    }
}

impl Ord for AbsoluteSlotNumber {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.as_u64().cmp(&other.as_u64())
    }
}

impl PartialOrd for AbsoluteSlotNumber {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<u64> for AbsoluteSlotNumber {
    fn eq(&self, other: &u64) -> bool {
        self.as_u64() == *other
    }
}

impl core::ops::Add<u32> for AbsoluteSlotNumber {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Self::from_u64(self.as_u64().wrapping_add(rhs as u64))
    }
}

impl core::ops::Add<u16> for AbsoluteSlotNumber {
    type Output = Self;

    fn add(self, rhs: u16) -> Self::Output {
        self + rhs as u32
    }
}

impl core::ops::AddAssign<u16> for AbsoluteSlotNumber {
    fn add_assign(&mut self, rhs: u16) {
        *self = *self + rhs;
    }
}

impl core::ops::Sub<u32> for AbsoluteSlotNumber {
    type Output = Self;

    fn sub(self, rhs: u32) -> Self::Output {
        Self::from_u64(self.as_u64().wrapping_sub(rhs as u64) & MAX_VALUE)
    }
}

impl core::ops::Sub<AbsoluteSlotNumber> for AbsoluteSlotNumber {
    type Output = u64;

    /// Number of slots from `rhs` to `self`, modulo 2^40.
    fn sub(self, rhs: AbsoluteSlotNumber) -> Self::Output {
        self.as_u64().wrapping_sub(rhs.as_u64()) & MAX_VALUE
    }
}

impl core::ops::Rem<u16> for AbsoluteSlotNumber {
    type Output = u16;

    /// # Panics
    ///
    /// Panics when `rhs` is 0.
    fn rem(self, rhs: u16) -> u16 {
        (self.as_u64() % rhs as u64) as u16
    }
}

impl core::ops::Div<u16> for AbsoluteSlotNumber {
    type Output = u64;

    /// # Panics
    ///
    /// Panics when `rhs` is 0.
    fn div(self, rhs: u16) -> u64 {
        self.as_u64() / rhs as u64
    }
}

impl TryFrom<i64> for AbsoluteSlotNumber {
    type Error = ();

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if !(0..=MAX_VALUE as i64).contains(&value) {
            return Err(());
        }
        Ok(Self::from_u64(value as u64))
    }
}

impl TryFrom<u64> for AbsoluteSlotNumber {
    type Error = ();

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > MAX_VALUE {
            return Err(());
        }
        Ok(Self::from_u64(value))
    }
}

impl From<u32> for AbsoluteSlotNumber {
    fn from(value: u32) -> Self {
        Self {
            ls4b: value,
            ms1b: 0,
        }
    }
}

impl core::fmt::Debug for AbsoluteSlotNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "asn-{:x}.{:x}", self.ms1b, self.ls4b)
    }
}

impl core::fmt::Display for AbsoluteSlotNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AbsoluteSlotNumber {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "asn-{:x}.{:x}", self.ms1b, self.ls4b)
    }
}
