//! Scanning, joining a network and starting one.

use rand_core::RngCore;
use tsch_frame::time::{Duration, Instant};
use tsch_frame::{
    parse_beacon, Address, BeaconRejection, TimeslotTimings, TschSlotframeAndLink,
    NO_JOIN_PRIORITY,
};

use super::slot_length::SlotLengthChange;
use super::{AssociationState, Listeners, Scan, Tsch};
use crate::asn::AbsoluteSlotNumber;
use crate::config::{
    CHANNEL_SCAN_DURATION, CHECK_PAN_ID, INIT_SCHEDULE_FROM_EB, MAX_JOIN_PRIORITY,
    SCAN_TIMESTAMP_TOLERANCE, SECURITY_SUPPORTED,
};
use crate::hopping::{HoppingSequence, JOIN_HOPPING_SEQUENCE};
use crate::queue::QueueError;
use crate::radio::Radio;
use crate::schedule::{LinkConfig, LinkType, ScheduleError};
use crate::upper::UpperLayer;

/// The reason a beacon did not lead to an association.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssociationError {
    /// The frame is not a usable enhanced beacon.
    Rejected(BeaconRejection),
    /// The beacon is secured, and security is not supported.
    SecurityUnsupported,
    /// The beacon could not be authenticated.
    Unauthenticated,
    /// The beacon belongs to another PAN.
    PanIdMismatch,
    /// The beacon advertises no join priority.
    NoJoinPriority,
    /// Joining would put us at or above the maximum join priority.
    JoinPriorityTooHigh,
    /// The advertised hopping sequence does not fit.
    HoppingSequenceTooLong,
    /// Timeslot length adaptation is on and the beacon announces no length.
    SlotLengthMissing,
    /// The advertised schedule could not be installed.
    Schedule(ScheduleError),
    /// The sender could not be added as neighbor.
    Queue(QueueError),
}

impl core::fmt::Display for AssociationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Rejected(rejection) => write!(f, "{rejection}"),
            Self::SecurityUnsupported => write!(f, "secured beacon, security not supported"),
            Self::Unauthenticated => write!(f, "beacon not authenticated"),
            Self::PanIdMismatch => write!(f, "PAN ID mismatch"),
            Self::NoJoinPriority => write!(f, "no join priority"),
            Self::JoinPriorityTooHigh => write!(f, "join priority too high"),
            Self::HoppingSequenceTooLong => write!(f, "hopping sequence too long"),
            Self::SlotLengthMissing => write!(f, "no timeslot length announced"),
            Self::Schedule(err) => write!(f, "schedule: {err}"),
            Self::Queue(err) => write!(f, "neighbor: {err}"),
        }
    }
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Listen for beacons, hopping to a random channel of the join sequence
    /// every `CHANNEL_SCAN_DURATION`.
    pub(super) fn scan(&mut self, now: Instant) {
        let hop = match self.scan.channel {
            None => true,
            Some(_) => now - self.scan.since > CHANNEL_SCAN_DURATION,
        };

        if hop {
            let index = self.rng.next_u32() as usize % JOIN_HOPPING_SEQUENCE.len();
            let channel = JOIN_HOPPING_SEQUENCE[index];
            self.radio.set_channel(channel);
            self.radio.on();
            self.scan = Scan {
                channel: Some(channel),
                since: now,
            };
            trace!("scan: listening on channel {}", channel);
        }

        if !self.radio.pending_packet() {
            return;
        }

        let mut buffer = [0u8; 127];
        let len = self.radio.read(&mut buffer).min(buffer.len());
        let timestamp = self.radio.last_packet_timestamp();

        if (timestamp - now).abs() >= SCAN_TIMESTAMP_TOLERANCE {
            warn!("scan: frame timestamp {} too far from {}", timestamp, now);
            return;
        }

        match self.try_associate(&buffer[..len], timestamp) {
            Ok(()) => {
                self.radio.off();
                self.scan.channel = None;
            }
            Err(err) => {
                debug!("scan: {}", err);
            }
        }
    }

    /// Join the network advertised by `frame`, an enhanced beacon received
    /// at `timestamp`.
    ///
    /// On success, the ASN, timings, timeslot length announcement and
    /// hopping sequence of the beacon are adopted, its sender becomes our time source, and, depending on
    /// `INIT_SCHEDULE_FROM_EB`, its schedule replaces ours.
    pub fn try_associate(&mut self, frame: &[u8], timestamp: Instant) -> Result<(), AssociationError> {
        let beacon = match parse_beacon(frame, false) {
            Ok(beacon) => beacon,
            Err(BeaconRejection::MicDeferred) if SECURITY_SUPPORTED => {
                return Err(AssociationError::Unauthenticated)
            }
            Err(BeaconRejection::MicDeferred) => return Err(AssociationError::SecurityUnsupported),
            Err(rejection) => return Err(AssociationError::Rejected(rejection)),
        };

        if CHECK_PAN_ID && beacon.pan_id != Some(self.pib.coordinator_pan_id) {
            return Err(AssociationError::PanIdMismatch);
        }

        if beacon.join_priority == NO_JOIN_PRIORITY {
            return Err(AssociationError::NoJoinPriority);
        }

        let hopping = if beacon.hopping_sequence_id == 0 || beacon.hopping_sequence.is_empty() {
            HoppingSequence::default()
        } else {
            HoppingSequence::new(beacon.hopping_sequence)
                .map_err(|_| AssociationError::HoppingSequenceTooLong)?
        };

        let slot_length = if self.pib.slot_length_adaptation {
            Some(beacon.slot_length.ok_or(AssociationError::SlotLengthMissing)?)
        } else {
            None
        };

        self.asn = AbsoluteSlotNumber::from_u64(beacon.asn);
        self.timings = beacon.timings.unwrap_or_default();
        self.hopping = hopping;
        if let Some(repr) = slot_length {
            self.timings.timeslot_length = Duration::from_us(repr.current as i64);
            self.slot_length = SlotLengthChange::from(&repr);
        }

        if INIT_SCHEDULE_FROM_EB {
            if let Err(err) = self.install_schedule(beacon.slotframes.as_ref()) {
                self.reset();
                return Err(AssociationError::Schedule(err));
            }
        }

        let join_priority = beacon.join_priority.saturating_add(1);
        if join_priority >= MAX_JOIN_PRIORITY {
            warn!("associate: join priority {} too high", join_priority);
            self.reset();
            return Err(AssociationError::JoinPriorityTooHigh);
        }

        let src = beacon.src_address;
        if let Err(err) = self.queues.add_neighbor(src) {
            self.reset();
            return Err(AssociationError::Queue(err));
        }
        self.update_time_source(Some(src));

        self.pib.join_priority = join_priority;
        self.pib.pan_id = beacon.pan_id.unwrap_or(self.pib.coordinator_pan_id);
        self.pib.pan_secured = beacon.secured;
        self.slot_start = timestamp - self.timings.tx_offset;
        self.state = AssociationState::Node;

        self.stats.reset_session();
        self.stats.association_count += 1;
        self.schedule_keepalive(false);
        self.upper.on_joined();

        info!(
            "associated with {}, asn {}, jp {}, pan {:x}",
            src, self.asn, join_priority, self.pib.pan_id
        );

        Ok(())
    }

    /// Replace the schedule with the one advertised in a beacon, or with
    /// the minimal schedule when the beacon advertises none.
    fn install_schedule(
        &mut self,
        slotframes: Option<&TschSlotframeAndLink<&[u8]>>,
    ) -> Result<(), ScheduleError> {
        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };

        match slotframes {
            Some(ie) if ie.number_of_slotframes() > 0 => {
                self.schedule.remove_all_slotframes(&mut listeners)?;

                for descriptor in ie.slotframe_descriptors() {
                    let handle = descriptor.handle() as u16;
                    self.schedule.add_slotframe(handle, descriptor.size())?;

                    for link in descriptor.links() {
                        let config = LinkConfig {
                            options: link.link_options(),
                            link_type: LinkType::Advertising,
                            address: Address::BROADCAST,
                            timeslot: link.timeslot(),
                            channel_offset: link.channel_offset(),
                        };
                        self.schedule
                            .add_link(handle, config, true, &mut listeners)?;
                    }
                }
            }
            _ => self.schedule.create_minimal(&mut listeners)?,
        }

        self.schedule_from_eb = true;
        Ok(())
    }

    /// Start a network of our own.
    pub(super) fn start_coordinator(&mut self, now: Instant) {
        self.pib.pan_id = self.pib.coordinator_pan_id;
        self.pib.join_priority = 0;
        self.hopping = HoppingSequence::default();
        self.timings = TimeslotTimings::default();

        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };
        if let Err(err) = self.schedule.create_minimal(&mut listeners) {
            error!("coordinator: could not create the minimal schedule: {}", err);
            return;
        }
        self.schedule_from_eb = false;

        self.state = AssociationState::Coordinator;
        self.slot_start = now;
        self.next_eb = Some(now);
        self.stats.reset_session();
        self.stats.association_count += 1;

        info!(
            "starting as coordinator, pan {:x}, asn {}",
            self.pib.pan_id, self.asn
        );
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use tsch_frame::time::Duration;
    use tsch_frame::{build_beacon, BeaconRepr, LinkInformationRepr, SlotframeRepr, TschLinkOption};

    use super::*;
    use crate::config::{BROADCAST_PAN_ID, SCHEDULE_DEFAULT_LENGTH};
    use crate::engine::tests::*;
    use crate::radio::tests::TestRadioEvent;
    use crate::upper::tests::TestUpperLayerEvent;

    #[test]
    fn join_from_beacon() {
        let mut tsch = tsch();
        tsch.try_associate(&beacon(PARENT, 1000, 2), at(100)).unwrap();

        assert_eq!(tsch.state(), AssociationState::Node);
        assert_eq!(tsch.asn(), AbsoluteSlotNumber::from(1000u32));
        assert_eq!(tsch.pib().join_priority(), 3);
        assert_eq!(tsch.pib().pan_id(), 0xabcd);
        assert_eq!(tsch.time_source(), Some(PARENT));
        assert_eq!(tsch.slot_start(), at(100) - TimeslotTimings::default().tx_offset);
        assert_eq!(tsch.stats().association_count, 1);
        assert!(tsch.upper().events.contains(&TestUpperLayerEvent::Joined));
        assert!(tsch
            .upper()
            .events
            .contains(&TestUpperLayerEvent::NewTimeSource(None, Some(PARENT))));
    }

    #[test]
    fn rejections() {
        let mut tsch = tsch();

        assert_eq!(
            tsch.try_associate(&beacon(PARENT, 1000, NO_JOIN_PRIORITY), at(0)),
            Err(AssociationError::NoJoinPriority)
        );

        assert_eq!(
            tsch.try_associate(&beacon(PARENT, 1000, MAX_JOIN_PRIORITY - 1), at(0)),
            Err(AssociationError::JoinPriorityTooHigh)
        );
        assert_eq!(tsch.state(), AssociationState::Scanning);
        assert_eq!(tsch.asn(), AbsoluteSlotNumber::ZERO);
        assert_eq!(tsch.time_source(), None);

        let data = hex::decode("41d801cdabffffc7d9b514004b12002b000000").unwrap();
        assert!(matches!(
            tsch.try_associate(&data, at(0)),
            Err(AssociationError::Rejected(BeaconRejection::NotABeacon(_)))
        ));

        let mut secured = beacon(PARENT, 1000, 2);
        secured[0] |= 0x08;
        secured.insert(14, 0x25);
        secured.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            tsch.try_associate(&secured, at(0)),
            Err(AssociationError::SecurityUnsupported)
        );
    }

    fn custom_beacon(sequence: &[u8], slotframes: &[SlotframeRepr<'_>]) -> Vec<u8> {
        let mut timings = TimeslotTimings::default();
        timings.timeslot_length = Duration::from_us(15000);
        let repr = BeaconRepr {
            pan_id: 0x1234,
            src_address: PARENT,
            asn: 42,
            join_priority: 0,
            timeslot_id: 1,
            timings,
            hopping_sequence_id: 1,
            hopping_sequence: sequence,
            slotframes: Some(slotframes),
            slot_length: None,
        };
        let mut buffer = [0u8; 127];
        let (len, _) = build_beacon(&repr, &mut buffer).unwrap();
        buffer[..len].to_vec()
    }

    #[test]
    fn adopts_advertised_parameters() {
        let links = [
            LinkInformationRepr {
                timeslot: 0,
                channel_offset: 0,
                options: TschLinkOption::Tx | TschLinkOption::Rx | TschLinkOption::Shared,
            },
            LinkInformationRepr {
                timeslot: 5,
                channel_offset: 1,
                options: TschLinkOption::Rx,
            },
        ];
        let slotframes = [SlotframeRepr {
            handle: 2,
            size: 11,
            links: &links,
        }];

        let mut tsch = tsch();
        tsch.try_associate(&custom_beacon(&[11, 12, 13], &slotframes), at(0))
            .unwrap();

        assert_eq!(tsch.pib().pan_id(), 0x1234);
        assert_eq!(tsch.pib().join_priority(), 1);
        assert_eq!(tsch.hopping_sequence().as_slice(), &[11, 12, 13]);
        assert_eq!(tsch.timings().timeslot_length, Duration::from_us(15000));

        assert!(tsch.schedule().get_slotframe(0).is_none());
        let sf = tsch.schedule().get_slotframe(2).unwrap();
        assert_eq!(sf.size(), 11);
        assert_eq!(sf.links().len(), 2);
        assert!(sf.links().iter().all(|l| l.link_type == LinkType::Advertising));
        assert!(sf.links().iter().all(|l| l.address == Address::BROADCAST));
        assert_eq!(sf.link_by_timeslot(5, 1).unwrap().options, TschLinkOption::Rx);

        // Leaving restores the minimal schedule.
        tsch.disassociate();
        assert!(tsch.schedule().get_slotframe(2).is_none());
        assert_eq!(
            tsch.schedule().get_slotframe(0).unwrap().size(),
            SCHEDULE_DEFAULT_LENGTH
        );
        assert_eq!(tsch.hopping_sequence().as_slice(), HoppingSequence::<16>::default().as_slice());
    }

    #[test]
    fn without_advertised_slotframes() {
        let mut tsch = tsch();
        tsch.add_slotframe(3, 5).unwrap();
        tsch.try_associate(&custom_beacon(&[20], &[]), at(0)).unwrap();

        assert!(tsch.schedule().get_slotframe(3).is_none());
        assert_eq!(
            tsch.schedule().get_slotframe(0).unwrap().size(),
            SCHEDULE_DEFAULT_LENGTH
        );
    }

    #[test]
    fn hopping_sequence_too_long() {
        let mut tsch = tsch();
        let sequence = [11u8; 17];
        assert_eq!(
            tsch.try_associate(&custom_beacon(&sequence, &[]), at(0)),
            Err(AssociationError::HoppingSequenceTooLong)
        );
        assert_eq!(tsch.pib().pan_id(), BROADCAST_PAN_ID);
    }

    #[test]
    fn scan_hops_and_joins() {
        let mut tsch = tsch();

        tsch.step(at(0));
        assert_eq!(tsch.radio().channels().len(), 1);
        assert!(tsch.radio().events.contains(&TestRadioEvent::On));

        // Same channel within the dwell time.
        tsch.step(at(500));
        assert_eq!(tsch.radio().channels().len(), 1);

        tsch.step(at(1001));
        assert_eq!(tsch.radio().channels().len(), 2);
        for channel in tsch.radio().channels() {
            assert!(JOIN_HOPPING_SEQUENCE.contains(&channel));
        }

        tsch.radio_mut()
            .incoming
            .push_back((beacon(PARENT, 1000, 2), at(1100)));
        tsch.step(at(1110));

        assert!(tsch.is_associated());
        assert_eq!(tsch.radio().events.last(), Some(&TestRadioEvent::Off));
    }

    #[test]
    fn scan_rejects_stale_timestamps() {
        let mut tsch = tsch();
        tsch.radio_mut()
            .incoming
            .push_back((beacon(PARENT, 1000, 2), at(0)));
        tsch.step(at(5000));
        assert!(!tsch.is_associated());
    }
}
