//! Hooks for the slot-timing driver.
//!
//! The driver asks [`Tsch::next_slot`] what to do in the next active slot,
//! performs the transmission or reception at the planned instant, and
//! reports the outcome with [`Tsch::on_tx_done`] or [`Tsch::on_rx`].

use heapless::Vec;
use rand_core::RngCore;
use tsch_frame::time::Instant;
use tsch_frame::{
    build_enhanced_ack, parse_enhanced_ack, patch_beacon_asn, patch_beacon_slot_length, Frame,
};

use super::{Dequeued, Incoming, Tsch};
use crate::asn::AbsoluteSlotNumber;
use crate::config::MAX_FRAME_LEN;
use crate::queue::PacketId;
use crate::radio::Radio;
use crate::schedule::{Link, LockOwner};
use crate::stats::TxStatus;
use crate::upper::UpperLayer;

/// Size of the buffer holding an enhanced ACK.
pub const EACK_MAX_LEN: usize = 32;

/// What to do in a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAction {
    /// Send `frame` at `tx_offset`, then wait for an ACK if expected.
    Transmit {
        /// The queued packet, to report with [`Tsch::on_tx_done`].
        packet: PacketId,
        /// The frame, without FCS.
        frame: Vec<u8, MAX_FRAME_LEN>,
        /// The frame requests an enhanced ACK.
        ack_expected: bool,
        /// The sequence number the ACK must carry.
        sequence_number: Option<u8>,
    },
    /// Listen from `rx_offset` for `rx_wait`.
    Receive,
    /// Nothing to do; keep the radio off.
    Sleep,
}

/// The plan for the next active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    /// The ASN of the slot.
    pub asn: AbsoluteSlotNumber,
    /// The start of the slot.
    pub start: Instant,
    /// The link executed in the slot.
    pub link: Link,
    /// The radio channel.
    pub channel: u8,
    /// What to do.
    pub action: SlotAction,
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Move to the next active slot and return what to do in it.
    ///
    /// Returns `None` when not associated, when the schedule is empty, or
    /// when the background side holds the schedule lock; the driver then
    /// retries at the next slot boundary.
    pub fn next_slot(&mut self) -> Option<SlotPlan> {
        if !self.state.is_associated() {
            return None;
        }

        if !self.schedule.lock().try_lock(LockOwner::SlotOperation) {
            return None;
        }
        let selection = self.schedule.next_active_link(self.asn, &self.queues);
        self.schedule.lock().unlock(LockOwner::SlotOperation);

        let selection = selection?;

        self.advance_slots(selection.time_offset);

        let packet = self
            .queues
            .packet_for_link(&selection.link)
            .map(|packet| packet.id);

        let (link, action) = match (packet, selection.backup) {
            (Some(id), _) => (selection.link, self.transmission(id)),
            (None, Some(backup)) => (backup, SlotAction::Receive),
            (None, None) if selection.link.is_rx() => (selection.link, SlotAction::Receive),
            (None, None) => (selection.link, SlotAction::Sleep),
        };

        let channel = self.hopping.channel_for(self.asn, link.channel_offset)?;
        self.schedule.set_current_link(Some(link.handle));

        Some(SlotPlan {
            asn: self.asn,
            start: self.slot_start,
            link,
            channel,
            action,
        })
    }

    /// Prepare the transmission of a queued packet, stamping beacons with
    /// the ASN of the slot and the timeslot length announcement.
    fn transmission(&mut self, id: PacketId) -> SlotAction {
        let asn = self.asn.as_u64();
        let join_priority = self.pib.join_priority;
        let slot_length = self.slot_length_repr();

        let Some(packet) = self.queues.packet_mut(id) else {
            return SlotAction::Sleep;
        };

        if let Some(offset) = packet.sync_ie_offset {
            if let Err(err) = patch_beacon_asn(&mut packet.data, offset, asn, join_priority) {
                error!("slot: could not stamp beacon {}: {}", id, err);
            }
            if let Some(slot_length) = slot_length {
                if let Err(err) = patch_beacon_slot_length(&mut packet.data, offset, &slot_length) {
                    error!("slot: could not stamp slot length of beacon {}: {}", id, err);
                }
            }
        }

        SlotAction::Transmit {
            packet: id,
            frame: packet.data.clone(),
            ack_expected: packet.sequence_number.is_some() && packet.dst.is_unicast(),
            sequence_number: packet.sequence_number,
        }
    }

    /// Report a transmission of packet `id`, with the ACK received, if any.
    ///
    /// A unicast frame counts as acknowledged only with a matching enhanced
    /// ACK. The time correction of an ACK from the time source adjusts our
    /// slot boundaries. The packet leaves its queue once acknowledged or
    /// out of attempts, and is reported on the next [`Tsch::step`].
    pub fn on_tx_done(&mut self, id: PacketId, status: TxStatus, ack: Option<&[u8]>) {
        self.schedule.set_current_link(None);
        self.stats.tx_count += 1;

        let time_source = self.queues.time_source();
        let address = self.address;
        let pan_id = self.pib.pan_id;

        let Some(packet) = self.queues.packet_mut(id) else {
            warn!("slot: unknown packet {}", id);
            return;
        };
        packet.transmissions = packet.transmissions.saturating_add(1);

        let mut status = status;
        let mut correction = None;

        if let (TxStatus::Ok, Some(sequence_number)) = (status, packet.sequence_number) {
            if packet.dst.is_unicast() {
                match ack.and_then(|ack| parse_enhanced_ack(ack, sequence_number, address, pan_id)) {
                    Some(timing) => {
                        if Some(packet.dst) == time_source {
                            correction = timing.drift;
                        }
                        if timing.nack {
                            status = TxStatus::NoAck;
                        }
                    }
                    None => status = TxStatus::NoAck,
                }
            }
        }

        let done = status == TxStatus::Ok || packet.transmissions >= packet.max_transmissions;
        trace!(
            "slot: packet {} attempt {}, {:?}",
            id,
            packet.transmissions,
            status
        );

        if let Some(correction) = correction {
            self.slot_start += correction;
            self.stats.record_sync(correction);
            self.schedule_keepalive(false);
        }

        if !done {
            return;
        }

        if self.dequeued.is_full() {
            error!("slot: dequeued ring full, packet {} kept", id);
            return;
        }

        if let Some(packet) = self.queues.remove(id) {
            // Cannot fail: the ring has room.
            let _ = self.dequeued.push_back(Dequeued { packet, status });
        }
    }

    /// Report a frame received at `timestamp` in the current slot.
    ///
    /// Frames unicast to another node are dropped. A frame from the time
    /// source realigns our slot boundaries. Returns the enhanced ACK to
    /// send back when the frame requests one.
    pub fn on_rx(&mut self, frame: &[u8], timestamp: Instant) -> Option<Vec<u8, EACK_MAX_LEN>> {
        self.schedule.set_current_link(None);

        if !self.state.is_associated() {
            return None;
        }

        self.stats.rx_count += 1;

        let parsed = Frame::new(frame).ok()?;
        let addressing = parsed.addressing()?;
        let src = addressing.src_address();
        let dst = addressing.dst_address();

        if dst.is_unicast() && dst != self.address {
            trace!("slot: frame for {}, dropped", dst);
            return None;
        }

        let expected = self.slot_start + self.timings.tx_offset;
        let drift = timestamp - expected;

        if src.is_unicast() && Some(src) == self.queues.time_source() {
            self.slot_start += drift;
            self.stats.record_sync(drift);
            self.schedule_keepalive(false);
        }

        let ack = match parsed.sequence_number() {
            Some(sequence_number) if parsed.frame_control().ack_request() && dst == self.address => {
                let mut buffer = [0u8; EACK_MAX_LEN];
                let dst = Some(src).filter(|a| a.is_unicast());
                match build_enhanced_ack(dst, self.pib.pan_id, sequence_number, -drift, false, &mut buffer) {
                    Ok(len) => Vec::from_slice(&buffer[..len]).ok(),
                    Err(err) => {
                        error!("slot: could not build the ACK: {}", err);
                        None
                    }
                }
            }
            _ => None,
        };

        match Vec::from_slice(frame) {
            Ok(data) => {
                let incoming = Incoming {
                    data,
                    asn: self.asn,
                    timestamp,
                };
                if self.incoming.push_back(incoming).is_err() {
                    warn!("slot: incoming ring full, frame from {} dropped", src);
                }
            }
            Err(_) => {
                warn!("slot: frame from {} too long", src);
            }
        }

        ack
    }
}
