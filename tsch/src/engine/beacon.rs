//! Enhanced beacons: periodic transmission and reception while associated.

use heapless::Vec;
use rand_core::RngCore;
use tsch_frame::time::{Duration, Instant};
use tsch_frame::{
    build_beacon, parse_beacon, Address, BeaconRepr, LinkInformationRepr, SlotframeRepr,
    TimeslotTimings,
};

use super::{AssociationState, Tsch};
use crate::asn::AbsoluteSlotNumber;
use crate::config::{
    AUTOSELECT_TIME_SOURCE, EB_PERIOD, MAX_FRAME_LEN, MAX_JOIN_PRIORITY,
    SLOT_LENGTH_RAPID_EB_PERIOD,
};
use crate::hopping::DEFAULT_HOPPING_SEQUENCE;
use crate::queue::PacketKind;
use crate::radio::Radio;
use crate::schedule::LinkType;
use crate::upper::UpperLayer;

/// Links of slotframe 0 advertised in our beacons, at most.
const EB_MAX_LINKS: usize = 8;

/// Beacons received from a neighbor, for the time source autoselection.
#[derive(Debug, Clone, Copy)]
pub(super) struct EbStat {
    address: Address,
    rx_count: u32,
    join_priority: u8,
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// A random duration in `[0, bound)`, zero for an empty range.
    fn random_below(&mut self, bound: Duration) -> Duration {
        let bound = bound.as_us();
        if bound <= 0 {
            return Duration::ZERO;
        }
        Duration::from_us(self.rng.next_u32() as i64 % bound)
    }

    /// Queue a beacon every EB period.
    ///
    /// The first beacon of a coordinator goes out right away; a node waits
    /// a random delay below `EB_PERIOD`. Afterwards, beacons are spaced by
    /// a random delay in `[0.75 p, p)`, or by `SLOT_LENGTH_RAPID_EB_PERIOD`
    /// while a timeslot length switch is pending. A beacon is only queued
    /// when the previous one left the queue.
    pub(super) fn process_eb(&mut self, now: Instant) {
        if !self.state.is_associated() {
            return;
        }

        let Some(deadline) = self.next_eb else {
            let delay = match self.state {
                AssociationState::Coordinator => Duration::ZERO,
                _ => self.random_below(EB_PERIOD),
            };
            self.next_eb = Some(now + delay);
            return;
        };

        if now < deadline {
            return;
        }

        let period = self.pib.eb_period;
        if period > Duration::ZERO && self.queues.eb_count() == 0 {
            self.send_eb();
        }

        let delay = if period > Duration::ZERO && self.slot_length_changing() {
            SLOT_LENGTH_RAPID_EB_PERIOD
        } else if period > Duration::ZERO {
            let quarter = period / 4;
            period - quarter + self.random_below(quarter)
        } else {
            EB_PERIOD
        };
        self.next_eb = Some(now + delay);
    }

    /// Build a beacon and queue it for a single transmission.
    ///
    /// The beacon advertises the non-normal links of slotframe 0. Timings
    /// and hopping sequence are only spelled out when they differ from the
    /// defaults.
    fn send_eb(&mut self) {
        let mut links: Vec<LinkInformationRepr, EB_MAX_LINKS> = Vec::new();
        let mut size = None;

        if let Some(sf) = self.schedule.get_slotframe(0) {
            size = Some(sf.size());
            for link in sf.links().iter().filter(|l| l.link_type != LinkType::Normal) {
                let info = LinkInformationRepr {
                    timeslot: link.timeslot,
                    channel_offset: link.channel_offset,
                    options: link.options,
                };
                if links.push(info).is_err() {
                    break;
                }
            }
        }

        let slotframes: Vec<SlotframeRepr<'_>, 1> = size
            .map(|size| SlotframeRepr {
                handle: 0,
                size,
                links: &links,
            })
            .into_iter()
            .collect();

        let default_timings = self.timings == TimeslotTimings::default();
        let default_hopping = self.hopping.as_slice() == DEFAULT_HOPPING_SEQUENCE;
        let hopping_sequence: &[u8] = if default_hopping {
            &[]
        } else {
            self.hopping.as_slice()
        };

        let repr = BeaconRepr {
            pan_id: self.pib.pan_id,
            src_address: self.address,
            asn: self.asn.as_u64(),
            join_priority: self.pib.join_priority,
            timeslot_id: if default_timings { 0 } else { 1 },
            timings: self.timings,
            hopping_sequence_id: if default_hopping { 0 } else { 1 },
            hopping_sequence,
            slotframes: Some(&slotframes[..]),
            slot_length: self.slot_length_repr(),
        };

        let mut buffer = [0u8; MAX_FRAME_LEN];
        let (len, sync_ie_offset) = match build_beacon(&repr, &mut buffer) {
            Ok(built) => built,
            Err(err) => {
                error!("eb: could not build the beacon: {}", err);
                return;
            }
        };

        if self
            .enqueue(
                PacketKind::EnhancedBeacon,
                Address::BROADCAST,
                &buffer[..len],
                None,
                1,
                Some(sync_ie_offset),
                None,
            )
            .is_ok()
        {
            debug!("eb: queued, {} octets", len);
        }
    }

    /// Check a beacon received while associated in the slot at `rx_asn`.
    ///
    /// A beacon from another neighbor is remembered as alternate time
    /// source. A beacon from the time source must agree with our ASN and
    /// advertise an acceptable join priority, and, with timeslot length
    /// adaptation, our current timeslot length; otherwise we leave the
    /// network.
    pub(super) fn eb_input(&mut self, frame: &[u8], rx_asn: AbsoluteSlotNumber) {
        let beacon = match parse_beacon(frame, self.pib.pan_secured) {
            Ok(beacon) => beacon,
            Err(rejection) => {
                debug!("eb: dropped, {}", rejection);
                return;
            }
        };

        let src = beacon.src_address;
        let time_source = self.queues.time_source();

        if time_source != Some(src) {
            self.last_alternate = Some((src, beacon.join_priority));
        }

        if AUTOSELECT_TIME_SOURCE && !self.pib.is_coordinator {
            self.autoselect_time_source(src, beacon.join_priority);
        }

        if time_source != Some(src) {
            return;
        }

        let drift = rx_asn.diff(&AbsoluteSlotNumber::from_u64(beacon.asn));
        if drift != 0 {
            warn!("eb: ASN drifted by {}, leaving the network", drift);
            self.disassociate();
            return;
        }

        if beacon.join_priority >= MAX_JOIN_PRIORITY {
            warn!("eb: join priority {} too high, leaving the network", beacon.join_priority);
            self.disassociate();
            return;
        }

        if AUTOSELECT_TIME_SOURCE {
            let join_priority = beacon.join_priority + 1;
            if self.pib.join_priority != join_priority {
                info!("eb: join priority {} -> {}", self.pib.join_priority, join_priority);
                self.pib.join_priority = join_priority;
            }
        }

        if beacon.hopping_sequence_id != 0
            && !beacon.hopping_sequence.is_empty()
            && beacon.hopping_sequence != self.hopping.as_slice()
        {
            match self.hopping.update(beacon.hopping_sequence) {
                Ok(()) => {
                    warn!("eb: hopping sequence updated");
                }
                Err(_) => {
                    warn!(
                        "eb: hopping sequence too long ({})",
                        beacon.hopping_sequence.len()
                    );
                }
            }
        }

        if self.pib.slot_length_adaptation {
            self.slot_length_input(beacon.slot_length);
        }
    }

    /// Count the beacon and switch to the best eligible neighbor: among
    /// those heard more than half as often as the most heard one, the one
    /// with the lowest join priority.
    fn autoselect_time_source(&mut self, src: Address, join_priority: u8) {
        let index = match self.eb_stats.iter().position(|s| s.address == src) {
            Some(index) => Some(index),
            None => {
                let stat = EbStat {
                    address: src,
                    rx_count: 0,
                    join_priority,
                };
                match self.eb_stats.push(stat) {
                    Ok(()) => Some(self.eb_stats.len() - 1),
                    Err(_) => None,
                }
            }
        };

        if let Some(index) = index {
            let stat = &mut self.eb_stats[index];
            stat.rx_count += 1;
            stat.join_priority = join_priority;
            self.best_eb_count = self.best_eb_count.max(stat.rx_count);
        }

        let threshold = self.best_eb_count / 2;
        let best = self
            .eb_stats
            .iter()
            .filter(|s| s.rx_count > threshold)
            .min_by_key(|s| s.join_priority)
            .map(|s| (s.address, s.join_priority));

        if let Some((address, join_priority)) = best {
            self.update_time_source(Some(address));
            self.pib.join_priority = join_priority.saturating_add(1);
        }
    }
}
