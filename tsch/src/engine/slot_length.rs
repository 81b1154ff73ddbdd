//! Timeslot length adaptation.
//!
//! The coordinator announces, in its beacons, the ASN from which a new
//! timeslot length applies. Nodes copy the announcement from their time
//! source and switch at the same slot. A node whose current length does
//! not match the one its time source advertises has lost track of a
//! switch and leaves the network.

use rand_core::RngCore;
use tsch_frame::time::Duration;
use tsch_frame::{SlotLengthRepr, TimeslotTimings};

use super::{AssociationState, Tsch};
use crate::asn::AbsoluteSlotNumber;
use crate::radio::Radio;
use crate::upper::UpperLayer;

/// The timeslot length to use from a given ASN on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SlotLengthChange {
    pub(super) triggering_asn: AbsoluteSlotNumber,
    pub(super) next: Duration,
}

impl Default for SlotLengthChange {
    fn default() -> Self {
        Self {
            triggering_asn: AbsoluteSlotNumber::ZERO,
            next: TimeslotTimings::default().timeslot_length,
        }
    }
}

impl From<&SlotLengthRepr> for SlotLengthChange {
    fn from(repr: &SlotLengthRepr) -> Self {
        Self {
            triggering_asn: AbsoluteSlotNumber::from_u64(repr.triggering_asn),
            next: Duration::from_us(repr.next as i64),
        }
    }
}

/// Errors returned by [`Tsch::set_next_timeslot_length`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotLengthError {
    /// Timeslot length adaptation is off.
    Disabled,
    /// Only a running coordinator decides on the timeslot length.
    NotCoordinator,
    /// The triggering ASN is not in the future.
    TriggerPassed,
    /// The length is not a positive number of us that fits 16 bits.
    InvalidLength,
}

impl core::fmt::Display for SlotLengthError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disabled => write!(f, "slot length adaptation disabled"),
            Self::NotCoordinator => write!(f, "not the coordinator"),
            Self::TriggerPassed => write!(f, "triggering ASN already passed"),
            Self::InvalidLength => write!(f, "invalid timeslot length"),
        }
    }
}

fn length_us(length: Duration) -> Option<u16> {
    u16::try_from(length.as_us()).ok().filter(|us| *us > 0)
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Turn timeslot length adaptation on or off.
    pub fn set_slot_length_adaptation(&mut self, enable: bool) {
        self.pib.slot_length_adaptation = enable;
    }

    /// Switch the network to a timeslot of `length` from `triggering_asn`
    /// on. The change is announced in our beacons, sent at the rapid EB
    /// period until the switch.
    pub fn set_next_timeslot_length(
        &mut self,
        triggering_asn: AbsoluteSlotNumber,
        length: Duration,
    ) -> Result<(), SlotLengthError> {
        if !self.pib.slot_length_adaptation {
            return Err(SlotLengthError::Disabled);
        }
        if self.state != AssociationState::Coordinator {
            return Err(SlotLengthError::NotCoordinator);
        }
        if triggering_asn <= self.asn {
            return Err(SlotLengthError::TriggerPassed);
        }
        if length_us(length).is_none() {
            return Err(SlotLengthError::InvalidLength);
        }

        self.follow_slot_length(SlotLengthChange {
            triggering_asn,
            next: length,
        });
        Ok(())
    }

    /// The ASN at which the next timeslot length applies, and that length.
    pub fn next_timeslot_length(&self) -> (AbsoluteSlotNumber, Duration) {
        (self.slot_length.triggering_asn, self.slot_length.next)
    }

    /// The announcement to put in our beacons, when adaptation is on.
    pub(super) fn slot_length_repr(&self) -> Option<SlotLengthRepr> {
        if !self.pib.slot_length_adaptation {
            return None;
        }

        let current = length_us(self.timings.timeslot_length).unwrap_or(u16::MAX);
        Some(SlotLengthRepr {
            triggering_asn: self.slot_length.triggering_asn.as_u64(),
            current,
            next: length_us(self.slot_length.next).unwrap_or(current),
        })
    }

    /// Returns `true` while a switch to another length is announced and
    /// not yet reached.
    pub(super) fn slot_length_changing(&self) -> bool {
        self.pib.slot_length_adaptation
            && self.slot_length.next != self.timings.timeslot_length
            && self.asn < self.slot_length.triggering_asn
    }

    /// Check the announcement of a beacon from our time source.
    ///
    /// Leaves the network when the beacon announces none, or when its
    /// current length differs from ours.
    pub(super) fn slot_length_input(&mut self, advertised: Option<SlotLengthRepr>) {
        let current = self.timings.timeslot_length;
        match advertised {
            Some(repr) if Duration::from_us(repr.current as i64) == current => {
                self.follow_slot_length(SlotLengthChange::from(&repr));
            }
            Some(repr) => {
                warn!(
                    "eb: timeslot length {} us, ours is {}, leaving the network",
                    repr.current, current
                );
                self.disassociate();
            }
            None => {
                warn!("eb: no timeslot length announced, leaving the network");
                self.disassociate();
            }
        }
    }

    /// Adopt `change`, bringing the next beacon forward when a switch
    /// starts.
    fn follow_slot_length(&mut self, change: SlotLengthChange) {
        let was_changing = self.slot_length_changing();
        if self.slot_length != change {
            info!(
                "slot length: {} from asn {}",
                change.next, change.triggering_asn
            );
        }
        self.slot_length = change;

        if !was_changing && self.slot_length_changing() {
            self.next_eb = Some(self.slot_start);
        }
    }

    /// Move `time_offset` slots ahead, switching the timeslot length at
    /// the triggering ASN.
    pub(super) fn advance_slots(&mut self, time_offset: u16) {
        let from = self.asn;
        let current = self.timings.timeslot_length;
        let change = self.slot_length;
        self.asn += time_offset;

        if !self.pib.slot_length_adaptation
            || change.next == current
            || self.asn < change.triggering_asn
        {
            self.slot_start += current * time_offset as usize;
            return;
        }

        let before = if change.triggering_asn > from {
            (change.triggering_asn - from) as usize
        } else {
            0
        };
        let after = time_offset as usize - before;
        self.slot_start += current * before + change.next * after;
        self.timings.timeslot_length = change.next;

        info!(
            "slot length: switched to {} at asn {}",
            change.next, change.triggering_asn
        );
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use tsch_frame::parse_beacon;

    use super::*;
    use crate::config::SLOT_LENGTH_RAPID_EB_PERIOD;
    use crate::engine::slot::SlotAction;
    use crate::engine::tests::*;
    use crate::engine::AssociationError;
    use crate::upper::tests::TestUpperLayerEvent;

    const SLOT: Duration = Duration::from_us(10_000);
    const LONGER: Duration = Duration::from_us(15_000);

    fn announcement(triggering_asn: u64, current: u16, next: u16) -> Option<SlotLengthRepr> {
        Some(SlotLengthRepr {
            triggering_asn,
            current,
            next,
        })
    }

    fn adaptive() -> TestTsch {
        let mut tsch = tsch();
        tsch.set_slot_length_adaptation(true);
        tsch.try_associate(
            &beacon_with(PARENT, 1000, 2, announcement(1010, 10_000, 15_000)),
            at(100),
        )
        .unwrap();
        tsch
    }

    fn eb_frame(tsch: &TestTsch) -> Vec<u8> {
        let link = tsch.schedule().get_slotframe(0).unwrap().links()[0];
        let packet = tsch.queues().packet_for_link(&link).unwrap();
        assert!(packet.sync_ie_offset.is_some());
        packet.data.to_vec()
    }

    #[test]
    fn association_adopts_the_announcement() {
        let adapted = adaptive();
        assert_eq!(adapted.timings().timeslot_length, SLOT);
        assert_eq!(
            adapted.next_timeslot_length(),
            (AbsoluteSlotNumber::from(1010u32), LONGER)
        );

        let mut node = tsch();
        node.set_slot_length_adaptation(true);
        assert_eq!(
            node.try_associate(&beacon(PARENT, 1000, 2), at(100)),
            Err(AssociationError::SlotLengthMissing)
        );
        assert!(!node.is_associated());
    }

    #[test]
    fn switches_at_the_triggering_asn() {
        let mut tsch = adaptive();
        let start = tsch.slot_start();

        // Minimal schedule: active slots at 1001 and 1008, then 1015.
        let plan = tsch.next_slot().unwrap();
        assert_eq!(plan.asn, AbsoluteSlotNumber::from(1001u32));
        assert_eq!(plan.start, start + SLOT);

        let plan = tsch.next_slot().unwrap();
        assert_eq!(plan.asn, AbsoluteSlotNumber::from(1008u32));
        assert_eq!(tsch.timings().timeslot_length, SLOT);

        let plan = tsch.next_slot().unwrap();
        assert_eq!(plan.asn, AbsoluteSlotNumber::from(1015u32));
        assert_eq!(plan.start, start + SLOT * 10 + LONGER * 5);
        assert_eq!(tsch.timings().timeslot_length, LONGER);
    }

    #[test]
    fn stays_put_when_disabled() {
        let mut tsch = associated();
        tsch.slot_length = SlotLengthChange {
            triggering_asn: AbsoluteSlotNumber::from(1002u32),
            next: LONGER,
        };
        let start = tsch.slot_start();
        tsch.next_slot().unwrap();
        let plan = tsch.next_slot().unwrap();
        assert_eq!(plan.start, start + SLOT * 8);
        assert_eq!(tsch.timings().timeslot_length, SLOT);
    }

    #[test]
    fn mismatching_length_leaves() {
        let mut tsch = adaptive();
        tsch.upper_mut().events.clear();

        tsch.eb_input(
            &beacon_with(PARENT, 1000, 2, announcement(1010, 15_000, 15_000)),
            AbsoluteSlotNumber::from(1000u32),
        );
        assert!(!tsch.is_associated());
        assert!(tsch.upper().events.contains(&TestUpperLayerEvent::Left));
        assert_eq!(tsch.next_timeslot_length().1, SLOT);
    }

    #[test]
    fn missing_announcement_leaves() {
        let mut tsch = adaptive();
        tsch.eb_input(&beacon(PARENT, 1000, 2), AbsoluteSlotNumber::from(1000u32));
        assert!(!tsch.is_associated());
    }

    #[test]
    fn announcements_from_others_are_ignored() {
        let mut tsch = adaptive();
        tsch.eb_input(
            &beacon_with(OTHER, 1000, 1, announcement(2000, 12_000, 12_000)),
            AbsoluteSlotNumber::from(1000u32),
        );
        assert!(tsch.is_associated());
        assert_eq!(
            tsch.next_timeslot_length(),
            (AbsoluteSlotNumber::from(1010u32), LONGER)
        );
    }

    #[test]
    fn time_source_moves_the_trigger() {
        let mut tsch = adaptive();
        tsch.eb_input(
            &beacon_with(PARENT, 1000, 2, announcement(1020, 10_000, 12_000)),
            AbsoluteSlotNumber::from(1000u32),
        );
        assert!(tsch.is_associated());
        assert_eq!(
            tsch.next_timeslot_length(),
            (AbsoluteSlotNumber::from(1020u32), Duration::from_us(12_000))
        );
    }

    #[test]
    fn beacons_carry_the_announcement() {
        let mut tsch = adaptive();
        assert!(tsch.slot_length_changing());
        tsch.step(at(200));
        tsch.step(at(300));
        assert_eq!(tsch.queues().eb_count(), 1);

        let frame = eb_frame(&tsch);
        let parsed = parse_beacon(&frame, false).unwrap();
        assert_eq!(parsed.slot_length, announcement(1010, 10_000, 15_000));

        // Beacons follow the rapid period until the switch.
        assert_eq!(
            tsch.next_eb,
            Some(at(300) + SLOT_LENGTH_RAPID_EB_PERIOD)
        );
    }

    #[test]
    fn queued_beacon_is_restamped() {
        let mut tsch = tsch();
        tsch.set_slot_length_adaptation(true);
        tsch.set_coordinator(true);
        tsch.step(at(0));
        assert_eq!(tsch.queues().eb_count(), 1);

        tsch.set_next_timeslot_length(AbsoluteSlotNumber::from(100u32), LONGER)
            .unwrap();

        let plan = tsch.next_slot().unwrap();
        let SlotAction::Transmit { frame, .. } = plan.action else {
            panic!("expected a transmission");
        };
        let parsed = parse_beacon(&frame, false).unwrap();
        assert_eq!(parsed.slot_length, announcement(100, 10_000, 15_000));
    }

    #[test]
    fn coordinator_only() {
        let mut tsch = tsch();
        let asn = AbsoluteSlotNumber::from(100u32);
        assert_eq!(
            tsch.set_next_timeslot_length(asn, LONGER),
            Err(SlotLengthError::Disabled)
        );

        tsch.set_slot_length_adaptation(true);
        assert_eq!(
            tsch.set_next_timeslot_length(asn, LONGER),
            Err(SlotLengthError::NotCoordinator)
        );

        tsch.set_coordinator(true);
        tsch.step(at(0));
        assert_eq!(
            tsch.set_next_timeslot_length(AbsoluteSlotNumber::ZERO, LONGER),
            Err(SlotLengthError::TriggerPassed)
        );
        assert_eq!(
            tsch.set_next_timeslot_length(asn, Duration::from_us(70_000)),
            Err(SlotLengthError::InvalidLength)
        );
        assert_eq!(tsch.set_next_timeslot_length(asn, LONGER), Ok(()));
        assert!(tsch.slot_length_changing());
    }

    #[test]
    fn leaving_forgets_the_change() {
        let mut tsch = adaptive();
        while tsch.asn() < AbsoluteSlotNumber::from(1010u32) {
            tsch.next_slot().unwrap();
        }
        assert_eq!(tsch.timings().timeslot_length, LONGER);

        tsch.disassociate();
        assert_eq!(tsch.timings().timeslot_length, SLOT);
        assert_eq!(
            tsch.next_timeslot_length(),
            (AbsoluteSlotNumber::ZERO, SLOT)
        );
    }
}
