//! Channel hopping sequences.

use heapless::Vec;

use crate::asn::AbsoluteSlotNumber;

/// 16 channels, 16 hops.
pub const SEQUENCE_16_16: [u8; 16] = [16, 17, 23, 18, 26, 15, 25, 22, 19, 11, 12, 13, 24, 14, 20, 21];
/// 4 channels, 16 hops.
pub const SEQUENCE_4_16: [u8; 16] = [20, 26, 25, 26, 15, 15, 25, 20, 26, 15, 26, 25, 20, 15, 20, 25];
/// 4 channels, 4 hops.
pub const SEQUENCE_4_4: [u8; 4] = [15, 25, 26, 20];
/// 2 channels, 2 hops.
pub const SEQUENCE_2_2: [u8; 2] = [20, 25];
/// 1 channel, 1 hop.
pub const SEQUENCE_1_1: [u8; 1] = [20];

/// The sequence used once associated, unless the EB advertises another one.
pub const DEFAULT_HOPPING_SEQUENCE: &[u8] = &SEQUENCE_4_4;
/// The channels scanned while looking for a network.
pub const JOIN_HOPPING_SEQUENCE: &[u8] = DEFAULT_HOPPING_SEQUENCE;

/// The hopping sequence does not fit in the local buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceTooLong;

/// A channel hopping sequence of at most `MAX_HOPS` channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoppingSequence<const MAX_HOPS: usize> {
    sequence: Vec<u8, MAX_HOPS>,
}

impl<const MAX_HOPS: usize> Default for HoppingSequence<MAX_HOPS> {
    fn default() -> Self {
        // Truncated when the buffer is shorter than the default sequence.
        let mut sequence = Vec::new();
        let _ = sequence.extend_from_slice(&DEFAULT_HOPPING_SEQUENCE[..MAX_HOPS.min(DEFAULT_HOPPING_SEQUENCE.len())]);
        Self { sequence }
    }
}

impl<const MAX_HOPS: usize> HoppingSequence<MAX_HOPS> {
    /// Return the default hopping sequences (16 channels, 16 hops):
    /// ```txt
    /// 16, 17, 23, 18, 26, 15, 25, 22, 19, 11, 12, 13, 24, 14, 20, 21
    /// ```
    pub fn sequence_16_16() -> Result<Self, SequenceTooLong> {
        Self::new(&SEQUENCE_16_16)
    }

    /// Return the default hopping sequences (16 channels, 4 hops):
    /// ```txt
    /// 20, 26, 25, 26, 15, 15, 25, 20, 26, 15, 26, 25, 20, 15, 20, 25
    /// ```
    pub fn sequence_4_16() -> Result<Self, SequenceTooLong> {
        Self::new(&SEQUENCE_4_16)
    }

    /// Return the default hopping sequences (4 channels, 4 hops):
    /// ```txt
    /// 15, 25, 26, 20
    /// ```
    pub fn sequence_4_4() -> Result<Self, SequenceTooLong> {
        Self::new(&SEQUENCE_4_4)
    }

    /// Return the default hopping sequences (2 channels, 2 hops):
    /// ```txt
    /// 20, 25
    /// ```
    pub fn sequence_2_2() -> Result<Self, SequenceTooLong> {
        Self::new(&SEQUENCE_2_2)
    }

    /// Return the default hopping sequences (1 channel, 1 hop):
    /// ```txt
    /// 20
    /// ```
    pub fn sequence_1_1() -> Result<Self, SequenceTooLong> {
        Self::new(&SEQUENCE_1_1)
    }

    /// Create a new hopping sequence from a slice of channels.
    pub fn new(channels: &[u8]) -> Result<Self, SequenceTooLong> {
        let mut sequence = Vec::new();
        sequence
            .extend_from_slice(channels)
            .map_err(|_| SequenceTooLong)?;
        Ok(Self { sequence })
    }

    /// Replace the sequence, leaving it untouched when `channels` does not fit.
    pub fn update(&mut self, channels: &[u8]) -> Result<(), SequenceTooLong> {
        *self = Self::new(channels)?;
        Ok(())
    }

    /// The channels of the sequence.
    pub fn as_slice(&self) -> &[u8] {
        &self.sequence
    }

    /// The number of hops.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` for an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Return the channel used at `asn` by a link with `channel_offset`, or
    /// `None` for an empty sequence.
    pub fn channel_for(&self, asn: AbsoluteSlotNumber, channel_offset: u16) -> Option<u8> {
        if self.sequence.is_empty() {
            return None;
        }

        let len = self.sequence.len() as u64;
        let index = (asn.as_u64() % len + channel_offset as u64 % len) % len;
        Some(self.sequence[index as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let seq = HoppingSequence::<16>::sequence_16_16().unwrap();
        assert_eq!(seq.len(), 16);
        assert_eq!(seq.as_slice()[0], 16);

        assert_eq!(HoppingSequence::<16>::sequence_4_16().unwrap().len(), 16);
        assert_eq!(
            HoppingSequence::<16>::sequence_4_4().unwrap().as_slice(),
            &[15, 25, 26, 20]
        );
        assert_eq!(HoppingSequence::<16>::sequence_2_2().unwrap().len(), 2);
        assert_eq!(HoppingSequence::<16>::sequence_1_1().unwrap().as_slice(), &[20]);

        assert_eq!(HoppingSequence::<4>::sequence_16_16(), Err(SequenceTooLong));
        assert_eq!(HoppingSequence::<16>::default().as_slice(), DEFAULT_HOPPING_SEQUENCE);
    }

    #[test]
    fn channel_for_asn_and_offset() {
        let seq = HoppingSequence::<16>::sequence_4_4().unwrap();
        assert_eq!(seq.channel_for(AbsoluteSlotNumber::from(0u32), 0), Some(15));
        assert_eq!(seq.channel_for(AbsoluteSlotNumber::from(1u32), 0), Some(25));
        assert_eq!(seq.channel_for(AbsoluteSlotNumber::from(1u32), 2), Some(20));
        assert_eq!(seq.channel_for(AbsoluteSlotNumber::from(1001u32), 0), Some(25));

        let empty = HoppingSequence::<16>::new(&[]).unwrap();
        assert_eq!(empty.channel_for(AbsoluteSlotNumber::from(3u32), 0), None);
    }

    #[test]
    fn update_keeps_sequence_when_too_long() {
        let mut seq = HoppingSequence::<4>::sequence_2_2().unwrap();
        assert_eq!(seq.update(&SEQUENCE_16_16), Err(SequenceTooLong));
        assert_eq!(seq.as_slice(), &[20, 25]);
        assert_eq!(seq.update(&[11, 12, 13]), Ok(()));
        assert_eq!(seq.as_slice(), &[11, 12, 13]);
    }
}
