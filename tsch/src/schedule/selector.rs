use tsch_frame::TschLinkOption;

use super::{Link, LockOwner, PacketCount, Schedule};
use crate::asn::AbsoluteSlotNumber;
use crate::schedule::pending::PendingLookup;

/// Which of two overlapping links the comparator keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// The link seen first.
    First,
    /// The link seen second.
    Second,
}

/// Breaks the tie between two overlapping links of the same slotframe that
/// both have, or both lack, the Tx option.
pub type LinkComparator = fn(first: &Link, second: &Link, packets: &dyn PacketCount) -> Preference;

/// Keep the link whose neighbor has the most packets queued.
///
/// The first link wins when it is not a Tx link, when both links target the
/// same neighbor, and on equal packet counts.
pub fn default_comparator(first: &Link, second: &Link, packets: &dyn PacketCount) -> Preference {
    if !first.options.contains(TschLinkOption::Tx) {
        return Preference::First;
    }

    if first.address == second.address {
        return Preference::First;
    }

    if packets.packet_count(&first.address) >= packets.packet_count(&second.address) {
        Preference::First
    } else {
        Preference::Second
    }
}

/// The outcome of [`Schedule::next_active_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// The link to execute.
    pub link: Link,
    /// Number of timeslots until the link, in `1..=size`.
    pub time_offset: u16,
    /// An Rx link at the same offset, to run when `link` has nothing to send.
    pub backup: Option<Link>,
}

impl<const SLOTFRAMES: usize, const LINKS: usize> Schedule<SLOTFRAMES, LINKS> {
    /// Return the next link to execute after `asn`.
    ///
    /// The earliest link over all slotframes wins. Links at the same offset
    /// are arbitrated as follows:
    /// 1. a Tx link beats a non-Tx link;
    /// 2. otherwise the link of the lower slotframe handle wins;
    /// 3. within a slotframe, the link comparator decides.
    ///
    /// The backup is decided by the first tie at the winning offset. The
    /// current best becomes the backup when it has the Rx option and was not
    /// explicitly re-picked; otherwise the other link does, when it has the
    /// Rx option and was not picked. A best kept by the Tx rule or the
    /// slotframe handle rule is therefore its own backup.
    /// A pending entry due strictly sooner than the winner overrides it.
    ///
    /// Returns `None` when the schedule is empty or locked by the
    /// background task.
    pub fn next_active_link(
        &mut self,
        asn: AbsoluteSlotNumber,
        packets: &dyn PacketCount,
    ) -> Option<Selection> {
        if self.lock.is_locked_by_other(LockOwner::SlotOperation) {
            return None;
        }

        let mut best: Option<(Link, u16)> = None;
        let mut backup: Option<Link> = None;

        for sf in self.slotframes.iter() {
            let timeslot = asn % sf.size;

            for link in sf.links.iter() {
                let time_to_timeslot = if link.timeslot > timeslot {
                    link.timeslot - timeslot
                } else {
                    (sf.size as u32 + link.timeslot as u32 - timeslot as u32) as u16
                };

                let Some((current, time_to_current)) = best else {
                    best = Some((*link, time_to_timeslot));
                    continue;
                };

                if time_to_timeslot < time_to_current {
                    best = Some((*link, time_to_timeslot));
                    backup = None;
                } else if time_to_timeslot == time_to_current {
                    let new_best = self.arbitrate(&current, link, packets);

                    if backup.is_none() {
                        if new_best != Some(*link) && link.is_rx() {
                            backup = Some(*link);
                        }
                        if new_best != Some(current) && current.is_rx() {
                            backup = Some(current);
                        }
                    }

                    if let Some(new_best) = new_best {
                        best = Some((new_best, time_to_current));
                    }
                }
            }
        }

        let mut selection = best.map(|(link, time_offset)| Selection {
            link,
            time_offset,
            backup,
        });

        match self.pending.lookup(asn, selection.map(|s| s.time_offset)) {
            PendingLookup::Override { link, time_offset } => {
                trace!("pending link {} overrides the schedule", link.handle);
                selection = Some(Selection {
                    link,
                    time_offset,
                    backup: None,
                });
            }
            PendingLookup::Conflict => {
                warn!("pending link overlaps the schedule, dropped");
            }
            PendingLookup::Stale | PendingLookup::Nothing => {}
        }

        selection
    }

    /// The link picked over the tie, or `None` when `current` stays by
    /// default.
    fn arbitrate(&self, current: &Link, candidate: &Link, packets: &dyn PacketCount) -> Option<Link> {
        if current.is_tx() == candidate.is_tx() {
            if current.slotframe_handle != candidate.slotframe_handle {
                (candidate.slotframe_handle < current.slotframe_handle).then_some(*candidate)
            } else {
                match (self.comparator)(current, candidate, packets) {
                    Preference::First => Some(*current),
                    Preference::Second => Some(*candidate),
                }
            }
        } else {
            candidate.is_tx().then_some(*candidate)
        }
    }
}
