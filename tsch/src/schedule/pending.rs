use super::{Link, ScheduleError};
use crate::asn::AbsoluteSlotNumber;

/// Number of one-off transmissions the pending schedule can hold.
pub const PENDING_SLOTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingEntry {
    asn: AbsoluteSlotNumber,
    link: Link,
}

/// What the pending schedule has to say about the next slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingLookup {
    /// An entry is due strictly before the regular winner.
    Override { link: Link, time_offset: u16 },
    /// The earliest entry collides with the regular winner and was dropped.
    Conflict,
    /// A stale entry was cleared; no override for this lookup.
    Stale,
    /// Nothing pending, or the regular winner comes first.
    Nothing,
}

/// One-off transmissions at a given ASN, injected ahead of the regular
/// schedule.
#[derive(Debug, Default)]
pub struct PendingSchedule {
    entries: [Option<PendingEntry>; PENDING_SLOTS],
}

impl PendingSchedule {
    /// Create an empty pending schedule.
    pub const fn new() -> Self {
        Self {
            entries: [None; PENDING_SLOTS],
        }
    }

    /// Schedule `link` at `asn`.
    pub fn insert(&mut self, asn: AbsoluteSlotNumber, link: Link) -> Result<(), ScheduleError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.is_none())
            .ok_or(ScheduleError::AllocationFailed)?;
        *slot = Some(PendingEntry { asn, link });
        Ok(())
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries = [None; PENDING_SLOTS];
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compare the pending entries against the regular winner due in
    /// `regular` slots after `now`.
    pub(crate) fn lookup(&mut self, now: AbsoluteSlotNumber, regular: Option<u16>) -> PendingLookup {
        let mut earliest: Option<(usize, PendingEntry)> = None;

        // Entries are scanned in slot order; the first stale one found is
        // cleared and ends the lookup.
        for (index, slot) in self.entries.iter_mut().enumerate() {
            let Some(entry) = *slot else {
                continue;
            };

            if earliest.map_or(true, |(_, e)| entry.asn < e.asn) {
                earliest = Some((index, entry));
            }

            if entry.asn <= now {
                *slot = None;
                return PendingLookup::Stale;
            }
        }

        let Some((index, earliest)) = earliest else {
            return PendingLookup::Nothing;
        };

        let Ok(time_offset) = u16::try_from(earliest.asn - now) else {
            return PendingLookup::Nothing;
        };

        match regular {
            Some(regular) if time_offset > regular => PendingLookup::Nothing,
            Some(regular) if time_offset == regular => {
                self.entries[index] = None;
                PendingLookup::Conflict
            }
            _ => PendingLookup::Override {
                link: earliest.link,
                time_offset,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tsch_frame::{Address, TschLinkOption};

    use super::*;
    use crate::schedule::LinkType;

    fn link(handle: u16) -> Link {
        Link {
            handle,
            slotframe_handle: 0,
            timeslot: 0,
            channel_offset: 0,
            options: TschLinkOption::Tx,
            link_type: LinkType::Normal,
            address: Address::BROADCAST,
        }
    }

    #[test]
    fn capacity() {
        let mut pending = PendingSchedule::new();
        for i in 0..PENDING_SLOTS {
            pending
                .insert(AbsoluteSlotNumber::from(i as u32 + 10), link(i as u16))
                .unwrap();
        }
        assert_eq!(pending.len(), PENDING_SLOTS);
        assert_eq!(
            pending.insert(AbsoluteSlotNumber::from(99u32), link(99)),
            Err(ScheduleError::AllocationFailed)
        );

        pending.clear();
        assert!(pending.is_empty());
    }

    #[test]
    fn earliest_entry_overrides_until_stale() {
        let mut pending = PendingSchedule::new();
        let now = AbsoluteSlotNumber::from(50u32);
        pending.insert(now + 9u32, link(1)).unwrap();
        pending.insert(now + 3u32, link(2)).unwrap();

        let expected = PendingLookup::Override {
            link: link(2),
            time_offset: 3,
        };
        assert_eq!(pending.lookup(now, None), expected);
        assert_eq!(pending.lookup(now, None), expected);
        assert_eq!(pending.len(), 2);

        // The regular winner comes first: the entry stays.
        assert_eq!(pending.lookup(now, Some(2)), PendingLookup::Nothing);
        assert_eq!(pending.len(), 2);

        // Once its slot has passed, the entry is dropped.
        assert_eq!(pending.lookup(now + 3u32, None), PendingLookup::Stale);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.lookup(now + 3u32, Some(6)), PendingLookup::Conflict);
        assert!(pending.is_empty());
    }

    #[test]
    fn one_stale_entry_per_lookup() {
        let mut pending = PendingSchedule::new();
        let now = AbsoluteSlotNumber::from(50u32);
        pending.insert(now - 2u32, link(1)).unwrap();
        pending.insert(now - 1u32, link(2)).unwrap();
        pending.insert(now + 2u32, link(3)).unwrap();

        assert_eq!(pending.lookup(now, None), PendingLookup::Stale);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.lookup(now, None), PendingLookup::Stale);
        assert_eq!(pending.len(), 1);
        assert!(matches!(
            pending.lookup(now, None),
            PendingLookup::Override { time_offset: 2, .. }
        ));
    }
}
