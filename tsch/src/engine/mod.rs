//! The TSCH engine.
//!
//! [`Tsch`] owns the schedule, the neighbor queues and the association
//! state. It is driven from two sides:
//! - the background side calls [`Tsch::step`] whenever the instant it
//!   returned has passed, or when a slot hook queued something;
//! - the slot-timing driver calls [`Tsch::next_slot`] to learn what to do
//!   in the next active slot, then reports the outcome with
//!   [`Tsch::on_tx_done`] and [`Tsch::on_rx`].
//!
//! The slot hooks never process frames themselves: they push into bounded
//! rings that the next [`Tsch::step`] drains.

mod association;
mod beacon;
mod keepalive;
mod slot;
mod slot_length;

pub use association::AssociationError;
pub use slot::{SlotAction, SlotPlan};
pub use slot_length::SlotLengthError;

use heapless::{Deque, Vec};
use rand_core::RngCore;
use tsch_frame::time::{Duration, Instant};
use tsch_frame::{Address, DataFrameRepr, Frame, FrameType, FrameVersion, TimeslotTimings};

use crate::asn::AbsoluteSlotNumber;
use crate::config::{
    ASSOCIATION_POLL_PERIOD, BROADCAST_PAN_ID, DUPLICATE_HISTORY, DUPLICATE_MAX_AGE,
    DUPLICATE_SENDERS, EB_PERIOD, HOPPING_SEQUENCE_MAX_LEN, MAX_DEQUEUED_PACKETS,
    MAX_EB_PERIOD, MAX_FRAME_LEN, MAX_FRAME_RETRIES, MAX_INCOMING_PACKETS,
    MAX_KEEPALIVE_TIMEOUT, MAX_LINKS, MAX_NEIGHBORS, MAX_SLOTFRAMES, QUEUE_PER_NEIGHBOR,
    SECURITY_SUPPORTED,
};
use crate::duplicate::DuplicateWindow;
use crate::hopping::HoppingSequence;
use crate::pib::TschPib;
use crate::queue::{NeighborQueues, Packet, PacketId, PacketKind, QueueError, SlotSelection};
use crate::radio::Radio;
use crate::schedule::{
    Link, LinkConfig, LinkHandle, LinkListener, PendingSchedule, Schedule, ScheduleError,
};
use crate::stats::{Stats, TxStatus};
use crate::upper::UpperLayer;

use beacon::EbStat;
use keepalive::KeepAlive;
use slot_length::SlotLengthChange;

/// The schedule type used by the engine.
pub type TschSchedule = Schedule<MAX_SLOTFRAMES, MAX_LINKS>;
/// The queue type used by the engine.
pub type TschQueues = NeighborQueues<MAX_NEIGHBORS, QUEUE_PER_NEIGHBOR>;

/// Where the node stands with respect to a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssociationState {
    /// Looking for an enhanced beacon.
    Scanning,
    /// Running its own network.
    Coordinator,
    /// Joined through a time source.
    Node,
}

impl AssociationState {
    /// Returns `true` for both associated states.
    pub fn is_associated(&self) -> bool {
        !matches!(self, Self::Scanning)
    }
}

/// Errors returned by [`Tsch::send_packet`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// The node is not part of a network.
    NotAssociated,
    /// The payload does not fit in a frame.
    FrameTooLong,
    /// The packet could not be queued.
    Queue(QueueError),
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAssociated => write!(f, "not associated"),
            Self::FrameTooLong => write!(f, "frame too long"),
            Self::Queue(err) => write!(f, "{err}"),
        }
    }
}

/// A packet that left its queue, waiting to be reported.
#[derive(Debug)]
struct Dequeued {
    packet: Packet,
    status: TxStatus,
}

/// A received frame, waiting to be processed.
#[derive(Debug)]
struct Incoming {
    data: Vec<u8, MAX_FRAME_LEN>,
    asn: AbsoluteSlotNumber,
    timestamp: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Scan {
    channel: Option<u8>,
    since: Instant,
}

/// Forwards schedule changes to the queues and to the upper layer.
struct Listeners<'a, U> {
    queues: &'a mut TschQueues,
    upper: &'a mut U,
}

impl<U: UpperLayer> LinkListener for Listeners<'_, U> {
    fn link_added(&mut self, link: &Link) {
        self.queues.link_added(link);
        if link.is_tx() {
            self.upper.on_link_added(&link.address);
        }
    }

    fn link_removed(&mut self, link: &Link) {
        self.queues.link_removed(link);
        if link.is_tx() {
            self.upper.on_link_removed(&link.address);
        }
    }
}

/// The TSCH MAC engine.
pub struct Tsch<R: Radio, U: UpperLayer, G: RngCore> {
    radio: R,
    upper: U,
    rng: G,
    address: Address,
    pib: TschPib,

    state: AssociationState,
    asn: AbsoluteSlotNumber,
    /// Start of the slot at `asn`.
    slot_start: Instant,
    timings: TimeslotTimings,
    slot_length: SlotLengthChange,
    hopping: HoppingSequence<HOPPING_SEQUENCE_MAX_LEN>,

    schedule: TschSchedule,
    /// The schedule was replaced by the one of the joined network.
    schedule_from_eb: bool,
    queues: TschQueues,
    duplicates: DuplicateWindow<DUPLICATE_SENDERS, DUPLICATE_HISTORY>,
    sequence_number: u8,

    keepalive: KeepAlive,
    next_eb: Option<Instant>,
    scan: Scan,
    /// The last EB sender that is not our time source, with its join priority.
    last_alternate: Option<(Address, u8)>,
    eb_stats: Vec<EbStat, MAX_NEIGHBORS>,
    best_eb_count: u32,

    dequeued: Deque<Dequeued, MAX_DEQUEUED_PACKETS>,
    incoming: Deque<Incoming, MAX_INCOMING_PACKETS>,
    stats: Stats,
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Create a new engine with the minimal schedule, not associated.
    pub fn new(radio: R, upper: U, rng: G) -> Self {
        let address = Address::Extended(radio.ieee802154_address());
        let mut tsch = Self {
            radio,
            upper,
            rng,
            address,
            pib: TschPib::default(),
            state: AssociationState::Scanning,
            asn: AbsoluteSlotNumber::ZERO,
            slot_start: Instant::from_us(0),
            timings: TimeslotTimings::default(),
            slot_length: SlotLengthChange::default(),
            hopping: HoppingSequence::default(),
            schedule: Schedule::new(),
            schedule_from_eb: false,
            queues: NeighborQueues::new(),
            duplicates: DuplicateWindow::new(DUPLICATE_MAX_AGE),
            sequence_number: 0,
            keepalive: KeepAlive::new(),
            next_eb: None,
            scan: Scan {
                channel: None,
                since: Instant::from_us(0),
            },
            last_alternate: None,
            eb_stats: Vec::new(),
            best_eb_count: 0,
            dequeued: Deque::new(),
            incoming: Deque::new(),
            stats: Stats::default(),
        };

        let mut listeners = Listeners {
            queues: &mut tsch.queues,
            upper: &mut tsch.upper,
        };
        if let Err(err) = tsch.schedule.create_minimal(&mut listeners) {
            error!("tsch: could not create the minimal schedule: {}", err);
        }

        tsch
    }

    /// Run the background processing.
    ///
    /// Reports sent packets, delivers received frames, runs the keep-alive
    /// and beacon timers, and scans or starts a network when not
    /// associated. Returns the instant at which `step` must run again.
    pub fn step(&mut self, now: Instant) -> Instant {
        self.process_dequeued();
        self.process_incoming();
        self.process_keepalive(now);

        if !self.state.is_associated() {
            if self.pib.is_coordinator {
                self.start_coordinator(now);
            } else {
                self.scan(now);
            }
        }

        self.process_eb(now);

        if !self.dequeued.is_empty() || !self.incoming.is_empty() {
            return now;
        }

        let idle = if self.state.is_associated() {
            now + MAX_EB_PERIOD
        } else {
            now + ASSOCIATION_POLL_PERIOD
        };

        [self.keepalive.deadline, self.next_eb]
            .into_iter()
            .flatten()
            .fold(idle, |next, deadline| next.min(deadline))
    }

    /// Leave the network, if associated, and go back to scanning.
    pub fn disassociate(&mut self) {
        if !self.state.is_associated() {
            return;
        }

        info!(
            "leaving the network, stats: tx {} rx {} sync {}",
            self.stats.tx_count, self.stats.rx_count, self.stats.sync_count
        );

        self.state = AssociationState::Scanning;
        self.stats.leaving_count += 1;
        self.upper.on_left();
        self.reset();
    }

    /// Bring every piece of network state back to its initial value.
    fn reset(&mut self) {
        self.pib.pan_id = BROADCAST_PAN_ID;
        self.pib.join_priority = tsch_frame::NO_JOIN_PRIORITY;
        self.pib.pan_secured = false;
        self.pib.eb_period = EB_PERIOD;

        self.dequeued.clear();
        self.incoming.clear();
        self.queues.flush();
        self.update_time_source(None);
        self.queues.free_unused();

        self.asn = AbsoluteSlotNumber::ZERO;
        self.schedule.set_current_link(None);
        self.schedule.pending_mut().clear();
        self.timings = TimeslotTimings::default();
        self.slot_length = SlotLengthChange::default();
        self.hopping = HoppingSequence::default();

        self.last_alternate = None;
        self.eb_stats.clear();
        self.best_eb_count = 0;
        self.keepalive = KeepAlive::new();
        self.next_eb = None;
        self.duplicates.clear();

        if self.schedule_from_eb {
            let mut listeners = Listeners {
                queues: &mut self.queues,
                upper: &mut self.upper,
            };
            if let Err(err) = self.schedule.create_minimal(&mut listeners) {
                error!("tsch: could not restore the minimal schedule: {}", err);
            }
            self.schedule_from_eb = false;
        }
    }

    /// Make `address` the time source, or clear it.
    ///
    /// A coordinator has no time source.
    fn update_time_source(&mut self, address: Option<Address>) {
        if address.is_some() && self.pib.is_coordinator {
            return;
        }

        let old = self.queues.time_source();
        match self.queues.set_time_source(address) {
            Ok(true) => self.upper.on_new_time_source(old, address),
            Ok(false) => (),
            Err(err) => {
                warn!("tsch: could not update the time source: {}", err);
            }
        }
    }

    /// Queue a data frame for `dst`.
    ///
    /// Unicast frames request an acknowledgment and carry a sequence
    /// number; any other destination is sent as broadcast without one.
    pub fn send_packet(&mut self, dst: Address, payload: &[u8]) -> Result<PacketId, SendError> {
        if !self.state.is_associated() {
            return Err(SendError::NotAssociated);
        }

        let unicast = dst.is_unicast();
        let dst = if unicast { dst } else { Address::BROADCAST };
        let sequence_number = unicast.then(|| self.next_sequence_number());

        let repr = DataFrameRepr {
            sequence_number,
            ack_request: unicast,
            frame_pending: false,
            pan_id: self.pib.pan_id,
            dst_address: dst,
            src_address: self.address,
            payload,
        };

        let mut buffer = [0u8; MAX_FRAME_LEN];
        let len = repr
            .emit(&mut buffer)
            .map_err(|_| SendError::FrameTooLong)?;

        let slot = self.upper.select_outgoing_slot(&dst, payload);

        self.enqueue(
            PacketKind::Data,
            dst,
            &buffer[..len],
            sequence_number,
            MAX_FRAME_RETRIES + 1,
            None,
            slot,
        )
        .map_err(SendError::Queue)
    }

    /// Queue a frame, counting it as enqueued or lost.
    #[allow(clippy::too_many_arguments)]
    fn enqueue(
        &mut self,
        kind: PacketKind,
        dst: Address,
        data: &[u8],
        sequence_number: Option<u8>,
        max_transmissions: u8,
        sync_ie_offset: Option<usize>,
        slot: Option<SlotSelection>,
    ) -> Result<PacketId, QueueError> {
        match self.queues.push(
            kind,
            dst,
            data,
            sequence_number,
            max_transmissions,
            sync_ie_offset,
            slot,
        ) {
            Ok(id) => {
                self.stats.counters_mut(kind).enqueued += 1;
                trace!("tsch: queued packet {} to {}", id, dst);
                Ok(id)
            }
            Err(err) => {
                self.stats.counters_mut(kind).queue_loss += 1;
                warn!("tsch: could not queue packet to {}: {}", dst, err);
                Err(err)
            }
        }
    }

    /// The next MAC sequence number, never 0.
    fn next_sequence_number(&mut self) -> u8 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        if self.sequence_number == 0 {
            self.sequence_number = 1;
        }
        self.sequence_number
    }

    /// Report the packets that left their queue.
    fn process_dequeued(&mut self) {
        if self.dequeued.is_empty() {
            return;
        }

        while let Some(Dequeued { packet, status }) = self.dequeued.pop_front() {
            self.stats.record_sent(packet.kind, status);

            match packet.kind {
                PacketKind::KeepAlive => self.keepalive_sent(packet.dst, status),
                PacketKind::Data => self.upper.sent(packet.id, status, packet.transmissions),
                PacketKind::EnhancedBeacon => (),
            }
        }

        self.queues.free_unused();
    }

    /// Hand the received frames to the upper layer or to the beacon input.
    fn process_incoming(&mut self) {
        while let Some(incoming) = self.incoming.pop_front() {
            let Ok(frame) = Frame::new(&incoming.data[..]) else {
                debug!("tsch: dropping malformed frame");
                continue;
            };
            let fc = frame.frame_control();

            match fc.frame_type() {
                FrameType::Data => self.packet_input(&frame, incoming.timestamp),
                FrameType::Beacon
                    if fc.frame_version() >= FrameVersion::Ieee802154_2020
                        && self.state.is_associated() =>
                {
                    self.eb_input(&incoming.data, incoming.asn)
                }
                _ => (),
            }
        }
    }

    /// Deliver a data frame, unless it is a duplicate.
    fn packet_input(&mut self, frame: &Frame<&[u8]>, received_at: Instant) {
        let Some(src) = frame.addressing().map(|a| a.src_address()) else {
            return;
        };

        if let Some(sequence_number) = frame.sequence_number() {
            if self.duplicates.is_duplicate(&src, sequence_number, received_at) {
                debug!("tsch: duplicate {} from {}", sequence_number, src);
                return;
            }
            self.duplicates.register(&src, sequence_number, received_at);
        }

        match frame.payload() {
            Some(payload) if !payload.is_empty() => self.upper.received(src, payload),
            _ => (),
        }
    }
}

/// Settings.
impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Act as coordinator, or stop doing so.
    ///
    /// Changing the role leaves the current network.
    pub fn set_coordinator(&mut self, enable: bool) {
        if self.pib.is_coordinator != enable {
            self.disassociate();
        }
        self.pib.is_coordinator = enable;
        self.pib.eb_period = EB_PERIOD;
    }

    /// Set the PAN ID a coordinator starts its network with.
    pub fn set_coordinator_pan_id(&mut self, pan_id: u16) {
        self.pib.coordinator_pan_id = pan_id;
    }

    /// Require secured frames in the PAN. Ignored without security support.
    pub fn set_pan_secured(&mut self, enable: bool) {
        self.pib.pan_secured = SECURITY_SUPPORTED && enable;
    }

    /// Override our join priority.
    pub fn set_join_priority(&mut self, join_priority: u8) {
        self.pib.join_priority = join_priority;
    }

    /// Set the keep-alive timeout, at most `MAX_KEEPALIVE_TIMEOUT`; 0 stops
    /// the keep-alives.
    pub fn set_ka_timeout(&mut self, timeout: Duration) {
        self.pib.keepalive_timeout = timeout.min(MAX_KEEPALIVE_TIMEOUT);
        self.schedule_keepalive(false);
    }

    /// Set the EB period, at most `MAX_EB_PERIOD`; 0 stops the beacons.
    pub fn set_eb_period(&mut self, period: Duration) {
        self.pib.eb_period = period.min(MAX_EB_PERIOD);
    }
}

/// Schedule management.
impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Add a slotframe with `handle` and `size` timeslots.
    pub fn add_slotframe(&mut self, handle: u16, size: u16) -> Result<(), ScheduleError> {
        self.schedule.add_slotframe(handle, size).map(|_| ())
    }

    /// Remove a slotframe and its links.
    pub fn remove_slotframe(&mut self, handle: u16) -> Result<(), ScheduleError> {
        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };
        self.schedule.remove_slotframe(handle, &mut listeners)
    }

    /// Add a link to a slotframe.
    pub fn add_link(
        &mut self,
        slotframe: u16,
        config: LinkConfig,
        replace: bool,
    ) -> Result<Link, ScheduleError> {
        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };
        self.schedule
            .add_link(slotframe, config, replace, &mut listeners)
    }

    /// Remove a link from a slotframe.
    pub fn remove_link(&mut self, slotframe: u16, handle: LinkHandle) -> Result<Link, ScheduleError> {
        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };
        self.schedule.remove_link(slotframe, handle, &mut listeners)
    }

    /// Remove the link at `timeslot` and `channel_offset` of a slotframe.
    pub fn remove_link_by_timeslot(
        &mut self,
        slotframe: u16,
        timeslot: u16,
        channel_offset: u16,
    ) -> Result<Option<Link>, ScheduleError> {
        let mut listeners = Listeners {
            queues: &mut self.queues,
            upper: &mut self.upper,
        };
        self.schedule
            .remove_link_by_timeslot(slotframe, timeslot, channel_offset, &mut listeners)
    }

    /// The one-off transmissions injected ahead of the schedule.
    pub fn pending_schedule(&mut self) -> &mut PendingSchedule {
        self.schedule.pending_mut()
    }
}

/// Accessors.
impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// The association state.
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Returns `true` when part of a network.
    pub fn is_associated(&self) -> bool {
        self.state.is_associated()
    }

    /// The ASN of the current slot.
    pub fn asn(&self) -> AbsoluteSlotNumber {
        self.asn
    }

    /// The start of the current slot.
    pub fn slot_start(&self) -> Instant {
        self.slot_start
    }

    /// The runtime settings.
    pub fn pib(&self) -> &TschPib {
        &self.pib
    }

    /// The statistics.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The schedule.
    pub fn schedule(&self) -> &TschSchedule {
        &self.schedule
    }

    /// The neighbor queues.
    pub fn queues(&self) -> &TschQueues {
        &self.queues
    }

    /// The hopping sequence in use.
    pub fn hopping_sequence(&self) -> &HoppingSequence<HOPPING_SEQUENCE_MAX_LEN> {
        &self.hopping
    }

    /// The timeslot timings in use.
    pub fn timings(&self) -> &TimeslotTimings {
        &self.timings
    }

    /// The current time source.
    pub fn time_source(&self) -> Option<Address> {
        self.queues.time_source()
    }

    /// Our own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The radio.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// The upper layer.
    pub fn upper(&self) -> &U {
        &self.upper
    }

    /// The upper layer.
    pub fn upper_mut(&mut self) -> &mut U {
        &mut self.upper
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::rngs::mock::StepRng;
    use tsch_frame::{
        build_beacon, BeaconRepr, LinkInformationRepr, SlotLengthRepr, SlotframeRepr,
        TschLinkOption,
    };

    use super::*;
    use crate::radio::tests::TestRadio;
    use crate::upper::tests::{TestUpperLayer, TestUpperLayerEvent};

    pub type TestTsch = Tsch<TestRadio, TestUpperLayer, StepRng>;

    pub const OURS: [u8; 8] = [0x00, 0x02, 0x00, 0x02, 0x00, 0x02, 0x00, 0x02];
    pub const PARENT: Address = Address::Extended([0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01]);
    pub const OTHER: Address = Address::Extended([0x00, 0x03, 0x00, 0x03, 0x00, 0x03, 0x00, 0x03]);

    pub fn tsch() -> TestTsch {
        Tsch::new(TestRadio::new(OURS), TestUpperLayer::default(), StepRng::new(0, 1))
    }

    pub fn at(ms: i64) -> Instant {
        Instant::from_us(ms * 1000)
    }

    /// An EB from `src` with the minimal schedule.
    pub fn beacon(src: Address, asn: u64, join_priority: u8) -> std::vec::Vec<u8> {
        beacon_with(src, asn, join_priority, None)
    }

    /// An EB from `src` with the minimal schedule, announcing `slot_length`.
    pub fn beacon_with(
        src: Address,
        asn: u64,
        join_priority: u8,
        slot_length: Option<SlotLengthRepr>,
    ) -> std::vec::Vec<u8> {
        let links = [LinkInformationRepr {
            timeslot: 0,
            channel_offset: 0,
            options: TschLinkOption::Tx
                | TschLinkOption::Rx
                | TschLinkOption::Shared
                | TschLinkOption::TimeKeeping,
        }];
        let slotframes = [SlotframeRepr {
            handle: 0,
            size: 7,
            links: &links,
        }];
        let repr = BeaconRepr {
            pan_id: 0xabcd,
            src_address: src,
            asn,
            join_priority,
            timeslot_id: 0,
            timings: TimeslotTimings::default(),
            hopping_sequence_id: 0,
            hopping_sequence: &[],
            slotframes: Some(&slotframes),
            slot_length,
        };
        let mut buffer = [0u8; 127];
        let (len, _) = build_beacon(&repr, &mut buffer).unwrap();
        buffer[..len].to_vec()
    }

    /// An engine associated with [`PARENT`] at ASN 1000, jp 2.
    pub fn associated() -> TestTsch {
        let mut tsch = tsch();
        tsch.try_associate(&beacon(PARENT, 1000, 2), at(100)).unwrap();
        tsch
    }

    #[test]
    fn starts_unassociated_with_minimal_schedule() {
        let tsch = tsch();
        assert_eq!(tsch.state(), AssociationState::Scanning);
        assert_eq!(tsch.pib().pan_id(), BROADCAST_PAN_ID);
        assert_eq!(tsch.address(), Address::Extended(OURS));

        let sf = tsch.schedule().get_slotframe(0).unwrap();
        assert_eq!(sf.links().len(), 1);
    }

    #[test]
    fn send_requires_association() {
        let mut tsch = tsch();
        assert_eq!(
            tsch.send_packet(PARENT, b"hello"),
            Err(SendError::NotAssociated)
        );
    }

    #[test]
    fn unicast_and_broadcast_frames() {
        let mut tsch = associated();

        let id = tsch.send_packet(PARENT, b"hello").unwrap();
        let neighbor = tsch.queues().neighbor(&PARENT).unwrap();
        assert_eq!(neighbor.packet_count(), 1);
        assert_eq!(tsch.stats().data.enqueued, 1);

        let link = tsch.schedule().get_slotframe(0).unwrap().links()[0];
        let packet = tsch.queues().packet_for_link(&link).unwrap();
        assert_eq!(packet.id, id);
        assert_eq!(packet.sequence_number, Some(1));
        assert_eq!(packet.max_transmissions, MAX_FRAME_RETRIES + 1);

        let frame = Frame::new(&packet.data[..]).unwrap();
        assert!(frame.frame_control().ack_request());
        assert_eq!(frame.payload(), Some(&b"hello"[..]));

        tsch.send_packet(Address::Absent, b"all").unwrap();
        let broadcast = tsch.queues().neighbor(&Address::BROADCAST).unwrap();
        assert_eq!(broadcast.packet_count(), 1);
    }

    #[test]
    fn sequence_numbers_skip_zero() {
        let mut tsch = tsch();
        tsch.sequence_number = 254;
        assert_eq!(tsch.next_sequence_number(), 255);
        assert_eq!(tsch.next_sequence_number(), 1);
    }

    #[test]
    fn setters() {
        let mut tsch = tsch();
        tsch.set_eb_period(Duration::from_secs(100));
        assert_eq!(tsch.pib().eb_period(), MAX_EB_PERIOD);

        tsch.set_ka_timeout(Duration::from_secs(3600));
        assert_eq!(tsch.pib().keepalive_timeout(), MAX_KEEPALIVE_TIMEOUT);

        tsch.set_pan_secured(true);
        assert_eq!(tsch.pib().pan_secured(), SECURITY_SUPPORTED);

        tsch.set_join_priority(4);
        assert_eq!(tsch.pib().join_priority(), 4);
    }

    #[test]
    fn coordinator_starts_its_network() {
        let mut tsch = tsch();
        tsch.set_coordinator(true);
        tsch.step(at(0));

        assert_eq!(tsch.state(), AssociationState::Coordinator);
        assert_eq!(tsch.pib().pan_id(), 0xabcd);
        assert_eq!(tsch.pib().join_priority(), 0);
        assert_eq!(tsch.time_source(), None);
        assert_eq!(tsch.queues().eb_count(), 1);
        assert_eq!(tsch.stats().eb.enqueued, 1);
    }

    #[test]
    fn role_change_leaves_the_network() {
        let mut tsch = associated();
        tsch.set_coordinator(true);

        assert_eq!(tsch.state(), AssociationState::Scanning);
        assert_eq!(tsch.stats().leaving_count, 1);
        assert_eq!(tsch.pib().eb_period(), EB_PERIOD);
        assert_eq!(tsch.upper().count(|e| *e == TestUpperLayerEvent::Left), 1);
    }

    #[test]
    fn disassociation_resets() {
        let mut tsch = associated();
        tsch.send_packet(PARENT, b"hello").unwrap();
        tsch.disassociate();

        assert_eq!(tsch.state(), AssociationState::Scanning);
        assert_eq!(tsch.asn(), AbsoluteSlotNumber::ZERO);
        assert_eq!(tsch.pib().join_priority(), tsch_frame::NO_JOIN_PRIORITY);
        assert_eq!(tsch.pib().pan_id(), BROADCAST_PAN_ID);
        assert_eq!(tsch.time_source(), None);
        assert_eq!(tsch.queues().total_count(), 0);
        assert_eq!(tsch.schedule().current_link(), None);
        assert_eq!(tsch.stats().leaving_count, 1);

        let sf = tsch.schedule().get_slotframe(0).unwrap();
        assert_eq!(sf.size(), crate::config::SCHEDULE_DEFAULT_LENGTH);

        // Leaving twice is a no-op.
        tsch.disassociate();
        assert_eq!(tsch.stats().leaving_count, 1);
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut tsch = associated();
        let repr = DataFrameRepr {
            sequence_number: Some(7),
            ack_request: true,
            frame_pending: false,
            pan_id: 0xabcd,
            dst_address: Address::Extended(OURS),
            src_address: OTHER,
            payload: b"data",
        };
        let mut buffer = [0u8; 64];
        let len = repr.emit(&mut buffer).unwrap();

        tsch.on_rx(&buffer[..len], at(200));
        tsch.on_rx(&buffer[..len], at(210));
        tsch.step(at(220));

        let received = tsch
            .upper()
            .count(|e| matches!(e, TestUpperLayerEvent::Received(src, _) if *src == OTHER));
        assert_eq!(received, 1);
    }

    #[test]
    fn tx_link_notifications() {
        let mut tsch = tsch();
        tsch.add_slotframe(1, 11).unwrap();
        let link = tsch
            .add_link(
                1,
                LinkConfig {
                    options: TschLinkOption::Tx,
                    link_type: crate::schedule::LinkType::Normal,
                    address: OTHER,
                    timeslot: 3,
                    channel_offset: 1,
                },
                false,
            )
            .unwrap();

        assert_eq!(tsch.queues().neighbor(&OTHER).unwrap().tx_links(), 1);
        assert!(tsch
            .upper()
            .events
            .contains(&TestUpperLayerEvent::LinkAdded(OTHER)));

        tsch.remove_link(1, link.handle).unwrap();
        assert_eq!(tsch.queues().neighbor(&OTHER).unwrap().tx_links(), 0);
        assert!(tsch
            .upper()
            .events
            .contains(&TestUpperLayerEvent::LinkRemoved(OTHER)));
    }
}
