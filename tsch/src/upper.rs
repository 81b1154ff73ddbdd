use tsch_frame::Address;

use crate::queue::{PacketId, SlotSelection};
use crate::stats::TxStatus;

/// This trait provides the interactions with the upper layer: the
/// scheduling policy and the network layer. Every method but
/// [`UpperLayer::received`] has a default implementation doing nothing.
pub trait UpperLayer {
    /// A Tx link towards `neighbor` was added to the schedule.
    fn on_link_added(&mut self, neighbor: &Address) {
        let _ = neighbor;
    }

    /// A Tx link towards `neighbor` was removed from the schedule.
    fn on_link_removed(&mut self, neighbor: &Address) {
        let _ = neighbor;
    }

    /// Choose the link a packet to `dst` must go out on. Without a
    /// selection, the packet uses the links scheduled for its destination.
    fn select_outgoing_slot(&mut self, dst: &Address, payload: &[u8]) -> Option<SlotSelection> {
        let _ = (dst, payload);
        None
    }

    /// The time source changed.
    fn on_new_time_source(&mut self, old: Option<Address>, new: Option<Address>) {
        let _ = (old, new);
    }

    /// The node joined a network.
    fn on_joined(&mut self) {}

    /// The node left the network.
    fn on_left(&mut self) {}

    /// A data frame passed the duplicate check.
    fn received(&mut self, src: Address, payload: &[u8]);

    /// A packet queued with [`crate::Tsch::send_packet`] left the queue.
    fn sent(&mut self, id: PacketId, status: TxStatus, transmissions: u8) {
        let _ = (id, status, transmissions);
    }
}
