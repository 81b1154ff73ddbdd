//! Per-neighbor packet queues.
//!
//! Every neighbor owns a bounded FIFO of outgoing packets. Two pseudo
//! neighbors always exist: one for enhanced beacons and one for broadcast
//! frames. The queues also keep, for every neighbor, the number of Tx links
//! pointing at it, maintained through [`LinkListener`].

use heapless::{Deque, Vec};
use tsch_frame::Address;

use crate::config::MAX_FRAME_LEN;
use crate::schedule::{Link, LinkListener, LinkType, PacketCount};

/// Identifier of a queued packet.
pub type PacketId = u16;

/// What a queued packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketKind {
    /// An enhanced beacon.
    EnhancedBeacon,
    /// An empty keep-alive frame to the time source.
    KeepAlive,
    /// A data frame from the upper layer.
    Data,
}

/// An explicit (slotframe, timeslot, channel offset) a packet must go out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotSelection {
    /// Slotframe handle.
    pub slotframe: u16,
    /// Timeslot.
    pub timeslot: u16,
    /// Channel offset.
    pub channel_offset: u16,
}

impl SlotSelection {
    fn matches(&self, link: &Link) -> bool {
        self.slotframe == link.slotframe_handle
            && self.timeslot == link.timeslot
            && self.channel_offset == link.channel_offset
    }
}

/// An outgoing frame, without FCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Queue-wide identifier.
    pub id: PacketId,
    /// What the frame carries.
    pub kind: PacketKind,
    /// The destination; broadcast for EBs and broadcast frames.
    pub dst: Address,
    /// The frame.
    pub data: Vec<u8, MAX_FRAME_LEN>,
    /// The sequence number, when the frame has one.
    pub sequence_number: Option<u8>,
    /// Number of attempts allowed.
    pub max_transmissions: u8,
    /// Number of attempts so far.
    pub transmissions: u8,
    /// Offset of the ASN field in an EB, patched right before transmission.
    pub sync_ie_offset: Option<usize>,
    /// The link the packet is bound to, if any.
    pub slot: Option<SlotSelection>,
}

/// Errors returned by the queues.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// No room left for another neighbor.
    NeighborTableFull,
    /// The queue of the neighbor is full.
    QueueFull,
    /// The frame does not fit in a packet buffer.
    FrameTooLong,
}

impl core::fmt::Display for QueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NeighborTableFull => write!(f, "neighbor table full"),
            Self::QueueFull => write!(f, "queue full"),
            Self::FrameTooLong => write!(f, "frame too long"),
        }
    }
}

/// A neighbor and its queue.
#[derive(Debug)]
pub struct Neighbor<const QUEUE: usize> {
    address: Address,
    is_time_source: bool,
    tx_links: u16,
    dedicated_tx_links: u16,
    queue: Deque<Packet, QUEUE>,
}

impl<const QUEUE: usize> Neighbor<QUEUE> {
    fn new(address: Address) -> Self {
        Self {
            address,
            is_time_source: false,
            tx_links: 0,
            dedicated_tx_links: 0,
            queue: Deque::new(),
        }
    }

    /// The address of the neighbor.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns `true` for the time source.
    pub fn is_time_source(&self) -> bool {
        self.is_time_source
    }

    /// Number of Tx links to this neighbor.
    pub fn tx_links(&self) -> u16 {
        self.tx_links
    }

    /// Number of non-shared Tx links to this neighbor.
    pub fn dedicated_tx_links(&self) -> u16 {
        self.dedicated_tx_links
    }

    /// Number of queued packets.
    pub fn packet_count(&self) -> usize {
        self.queue.len()
    }

    /// The packet to send next, unless it is bound to a specific link.
    fn head(&self) -> Option<&Packet> {
        self.queue.front().filter(|p| p.slot.is_none())
    }
}

/// The packet queues of at most `NEIGHBORS` unicast neighbors, each holding
/// at most `QUEUE` packets.
#[derive(Debug)]
pub struct NeighborQueues<const NEIGHBORS: usize, const QUEUE: usize> {
    eb: Neighbor<QUEUE>,
    broadcast: Neighbor<QUEUE>,
    neighbors: Vec<Neighbor<QUEUE>, NEIGHBORS>,
    next_id: PacketId,
}

impl<const NEIGHBORS: usize, const QUEUE: usize> Default for NeighborQueues<NEIGHBORS, QUEUE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const NEIGHBORS: usize, const QUEUE: usize> NeighborQueues<NEIGHBORS, QUEUE> {
    /// Create the queues with only the EB and broadcast pseudo neighbors.
    pub fn new() -> Self {
        Self {
            eb: Neighbor::new(Address::BROADCAST),
            broadcast: Neighbor::new(Address::BROADCAST),
            neighbors: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a unicast neighbor, returning the existing one if already known.
    pub fn add_neighbor(&mut self, address: Address) -> Result<&mut Neighbor<QUEUE>, QueueError> {
        if address.is_broadcast() {
            return Ok(&mut self.broadcast);
        }

        match self.neighbors.iter().position(|n| n.address == address) {
            Some(index) => Ok(&mut self.neighbors[index]),
            None => {
                self.neighbors
                    .push(Neighbor::new(address))
                    .map_err(|_| QueueError::NeighborTableFull)?;
                debug!("queue: new neighbor {}", address);
                let last = self.neighbors.len() - 1;
                Ok(&mut self.neighbors[last])
            }
        }
    }

    /// Look for a unicast neighbor, or the broadcast pseudo neighbor.
    pub fn neighbor(&self, address: &Address) -> Option<&Neighbor<QUEUE>> {
        if address.is_broadcast() {
            return Some(&self.broadcast);
        }
        self.neighbors.iter().find(|n| n.address == *address)
    }

    fn neighbor_mut(&mut self, address: &Address) -> Option<&mut Neighbor<QUEUE>> {
        if address.is_broadcast() {
            return Some(&mut self.broadcast);
        }
        self.neighbors.iter_mut().find(|n| n.address == *address)
    }

    /// The known unicast neighbors.
    pub fn neighbors(&self) -> impl Iterator<Item = &Neighbor<QUEUE>> {
        self.neighbors.iter()
    }

    /// The current time source.
    pub fn time_source(&self) -> Option<Address> {
        self.neighbors
            .iter()
            .find(|n| n.is_time_source)
            .map(|n| n.address)
    }

    /// Make `address` the time source, or clear it with `None`.
    ///
    /// Returns `true` when the time source changed.
    pub fn set_time_source(&mut self, address: Option<Address>) -> Result<bool, QueueError> {
        let old = self.time_source();
        if old == address {
            return Ok(false);
        }

        if let Some(address) = address {
            self.add_neighbor(address)?.is_time_source = true;
        }

        if let Some(old) = old {
            if let Some(n) = self.neighbor_mut(&old) {
                n.is_time_source = false;
            }
        }

        match address {
            Some(address) => {
                info!("queue: time source is now {}", address);
            }
            None => {
                info!("queue: time source cleared");
            }
        }

        Ok(true)
    }

    /// Queue `data` for `dst`.
    ///
    /// Enhanced beacons go to the EB queue and any broadcast frame to the
    /// broadcast queue; unicast neighbors are added when unknown.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        kind: PacketKind,
        dst: Address,
        data: &[u8],
        sequence_number: Option<u8>,
        max_transmissions: u8,
        sync_ie_offset: Option<usize>,
        slot: Option<SlotSelection>,
    ) -> Result<PacketId, QueueError> {
        let data = Vec::from_slice(data).map_err(|_| QueueError::FrameTooLong)?;
        let id = self.next_id;

        let neighbor = if kind == PacketKind::EnhancedBeacon {
            &mut self.eb
        } else {
            self.add_neighbor(dst)?
        };

        neighbor
            .queue
            .push_back(Packet {
                id,
                kind,
                dst,
                data,
                sequence_number,
                max_transmissions,
                transmissions: 0,
                sync_ie_offset,
                slot,
            })
            .map_err(|_| QueueError::QueueFull)?;

        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Number of packets in the EB queue.
    pub fn eb_count(&self) -> usize {
        self.eb.queue.len()
    }

    /// Number of queued packets, pseudo neighbors included.
    pub fn total_count(&self) -> usize {
        self.eb.queue.len()
            + self.broadcast.queue.len()
            + self.neighbors.iter().map(|n| n.queue.len()).sum::<usize>()
    }

    fn all(&self) -> impl Iterator<Item = &Neighbor<QUEUE>> {
        [&self.eb, &self.broadcast]
            .into_iter()
            .chain(self.neighbors.iter())
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut Neighbor<QUEUE>> {
        [&mut self.eb, &mut self.broadcast]
            .into_iter()
            .chain(self.neighbors.iter_mut())
    }

    /// Pick the packet to transmit on `link`.
    ///
    /// A packet bound to this very link comes first. Then, on advertising
    /// links, the next EB. Then, on broadcast links that are not
    /// advertising-only, the next broadcast frame, or a frame to a unicast
    /// neighbor that has no Tx link of its own. On any other link, the next
    /// frame to the link's neighbor.
    pub fn packet_for_link(&self, link: &Link) -> Option<&Packet> {
        if !link.is_tx() {
            return None;
        }

        let bound = self
            .all()
            .flat_map(|n| n.queue.iter())
            .find(|p| p.slot.is_some_and(|s| s.matches(link)));
        if bound.is_some() {
            return bound;
        }

        if matches!(link.link_type, LinkType::Advertising | LinkType::AdvertisingOnly) {
            if let Some(packet) = self.eb.head() {
                return Some(packet);
            }
        }

        if link.link_type == LinkType::AdvertisingOnly {
            return None;
        }

        if link.address.is_broadcast() {
            self.broadcast.head().or_else(|| {
                self.neighbors
                    .iter()
                    .filter(|n| n.tx_links == 0)
                    .find_map(|n| n.head())
            })
        } else {
            self.neighbor(&link.address)?.head()
        }
    }

    /// Look for a queued packet.
    pub fn packet_mut(&mut self, id: PacketId) -> Option<&mut Packet> {
        self.all_mut()
            .flat_map(|n| n.queue.iter_mut())
            .find(|p| p.id == id)
    }

    /// Remove a queued packet.
    pub fn remove(&mut self, id: PacketId) -> Option<Packet> {
        for neighbor in self.all_mut() {
            let Some(index) = neighbor.queue.iter().position(|p| p.id == id) else {
                continue;
            };

            // Rotate the packet to the front, keeping the order of the others.
            for _ in 0..index {
                if let Some(p) = neighbor.queue.pop_front() {
                    let _ = neighbor.queue.push_back(p);
                }
            }
            let packet = neighbor.queue.pop_front();
            for _ in 0..neighbor.queue.len() - index {
                if let Some(p) = neighbor.queue.pop_front() {
                    let _ = neighbor.queue.push_back(p);
                }
            }
            return packet;
        }

        None
    }

    /// Drop every queued packet.
    pub fn flush(&mut self) {
        for neighbor in self.all_mut() {
            neighbor.queue.clear();
        }
    }

    /// Forget the unicast neighbors that are not the time source, have no
    /// Tx link and nothing queued.
    pub fn free_unused(&mut self) {
        self.neighbors
            .retain(|n| n.is_time_source || n.tx_links > 0 || !n.queue.is_empty());
    }
}

impl<const NEIGHBORS: usize, const QUEUE: usize> LinkListener for NeighborQueues<NEIGHBORS, QUEUE> {
    fn link_added(&mut self, link: &Link) {
        if !link.is_tx() {
            return;
        }

        match self.add_neighbor(link.address) {
            Ok(neighbor) => {
                neighbor.tx_links += 1;
                if !link.is_shared() {
                    neighbor.dedicated_tx_links += 1;
                }
            }
            Err(err) => {
                warn!("queue: no neighbor for link {}: {}", link.handle, err);
            }
        }
    }

    fn link_removed(&mut self, link: &Link) {
        if !link.is_tx() {
            return;
        }

        if let Some(neighbor) = self.neighbor_mut(&link.address) {
            neighbor.tx_links = neighbor.tx_links.saturating_sub(1);
            if !link.is_shared() {
                neighbor.dedicated_tx_links = neighbor.dedicated_tx_links.saturating_sub(1);
            }
        }
    }
}

impl<const NEIGHBORS: usize, const QUEUE: usize> PacketCount for NeighborQueues<NEIGHBORS, QUEUE> {
    fn packet_count(&self, address: &Address) -> usize {
        self.neighbor(address).map_or(0, |n| n.packet_count())
    }
}

#[cfg(test)]
mod tests {
    use tsch_frame::TschLinkOption;

    use super::*;

    type Queues = NeighborQueues<4, 2>;

    const A: Address = Address::Extended([0xa; 8]);
    const B: Address = Address::Extended([0xb; 8]);

    fn link(options: TschLinkOption, link_type: LinkType, address: Address) -> Link {
        Link {
            handle: 0,
            slotframe_handle: 0,
            timeslot: 1,
            channel_offset: 0,
            options,
            link_type,
            address,
        }
    }

    fn data(queues: &mut Queues, dst: Address, byte: u8) -> Result<PacketId, QueueError> {
        queues.push(PacketKind::Data, dst, &[byte], Some(byte), 8, None, None)
    }

    #[test]
    fn push_and_remove() {
        let mut queues = Queues::new();
        let first = data(&mut queues, A, 1).unwrap();
        let second = data(&mut queues, A, 2).unwrap();
        assert_eq!(data(&mut queues, A, 3), Err(QueueError::QueueFull));
        assert_eq!(queues.packet_count(&A), 2);
        assert_eq!(queues.packet_count(&B), 0);

        assert_eq!(queues.remove(second).unwrap().data, [2]);
        assert_eq!(queues.remove(second), None);
        assert_eq!(queues.packet_mut(first).unwrap().data, [1]);
        assert_eq!(queues.total_count(), 1);

        assert_eq!(
            queues.push(PacketKind::Data, A, &[0; 200], None, 1, None, None),
            Err(QueueError::FrameTooLong)
        );
    }

    #[test]
    fn remove_keeps_order() {
        let mut queues = NeighborQueues::<4, 4>::new();
        let ids: [PacketId; 4] = core::array::from_fn(|i| {
            queues
                .push(PacketKind::Data, A, &[i as u8], None, 1, None, None)
                .unwrap()
        });

        queues.remove(ids[1]).unwrap();
        let l = link(TschLinkOption::Tx, LinkType::Normal, A);
        assert_eq!(queues.packet_for_link(&l).unwrap().id, ids[0]);
        queues.remove(ids[0]).unwrap();
        assert_eq!(queues.packet_for_link(&l).unwrap().id, ids[2]);
        queues.remove(ids[2]).unwrap();
        assert_eq!(queues.packet_for_link(&l).unwrap().id, ids[3]);
    }

    #[test]
    fn neighbor_table_full() {
        let mut queues = Queues::new();
        for i in 0..4 {
            data(&mut queues, Address::Short([0, i]), i).unwrap();
        }
        assert_eq!(
            data(&mut queues, Address::Short([0, 9]), 9),
            Err(QueueError::NeighborTableFull)
        );
        // Broadcast frames do not take a neighbor entry.
        data(&mut queues, Address::BROADCAST, 9).unwrap();
    }

    #[test]
    fn time_source() {
        let mut queues = Queues::new();
        assert_eq!(queues.time_source(), None);
        assert_eq!(queues.set_time_source(Some(A)), Ok(true));
        assert_eq!(queues.set_time_source(Some(A)), Ok(false));
        assert_eq!(queues.set_time_source(Some(B)), Ok(true));
        assert_eq!(queues.time_source(), Some(B));
        assert!(!queues.neighbor(&A).unwrap().is_time_source());

        queues.free_unused();
        assert!(queues.neighbor(&A).is_none());
        assert!(queues.neighbor(&B).is_some());

        assert_eq!(queues.set_time_source(None), Ok(true));
        queues.free_unused();
        assert_eq!(queues.neighbors().count(), 0);
    }

    #[test]
    fn link_counters() {
        let mut queues = Queues::new();
        let dedicated = link(TschLinkOption::Tx, LinkType::Normal, A);
        let shared = link(TschLinkOption::Tx | TschLinkOption::Shared, LinkType::Normal, A);
        let rx = link(TschLinkOption::Rx, LinkType::Normal, B);

        queues.link_added(&dedicated);
        queues.link_added(&shared);
        queues.link_added(&rx);

        let a = queues.neighbor(&A).unwrap();
        assert_eq!(a.tx_links(), 2);
        assert_eq!(a.dedicated_tx_links(), 1);
        assert!(queues.neighbor(&B).is_none());

        queues.free_unused();
        assert!(queues.neighbor(&A).is_some());

        queues.link_removed(&dedicated);
        queues.link_removed(&shared);
        assert_eq!(queues.neighbor(&A).unwrap().tx_links(), 0);
        queues.free_unused();
        assert!(queues.neighbor(&A).is_none());
    }

    #[test]
    fn packet_selection() {
        let mut queues = Queues::new();
        let eb = queues
            .push(PacketKind::EnhancedBeacon, Address::BROADCAST, &[0xeb], None, 1, Some(20), None)
            .unwrap();
        let bcast = data(&mut queues, Address::BROADCAST, 0xbc).unwrap();
        let to_a = data(&mut queues, A, 0xa).unwrap();
        let to_b = data(&mut queues, B, 0xb).unwrap();

        // B has a dedicated link; A only shared broadcast cells.
        queues.link_added(&link(TschLinkOption::Tx, LinkType::Normal, B));

        let advertising = link(
            TschLinkOption::Tx | TschLinkOption::Shared,
            LinkType::Advertising,
            Address::BROADCAST,
        );
        let advertising_only = link(TschLinkOption::Tx, LinkType::AdvertisingOnly, Address::BROADCAST);
        let shared = link(
            TschLinkOption::Tx | TschLinkOption::Shared,
            LinkType::Normal,
            Address::BROADCAST,
        );
        let to_b_link = link(TschLinkOption::Tx, LinkType::Normal, B);
        let rx_only = link(TschLinkOption::Rx, LinkType::Normal, B);

        assert_eq!(queues.packet_for_link(&advertising).unwrap().id, eb);
        assert_eq!(queues.packet_for_link(&advertising_only).unwrap().id, eb);
        assert_eq!(queues.packet_for_link(&shared).unwrap().id, bcast);
        assert_eq!(queues.packet_for_link(&to_b_link).unwrap().id, to_b);
        assert!(queues.packet_for_link(&rx_only).is_none());

        queues.remove(eb);
        assert!(queues.packet_for_link(&advertising_only).is_none());
        assert_eq!(queues.packet_for_link(&advertising).unwrap().id, bcast);

        queues.remove(bcast);
        assert_eq!(queues.packet_for_link(&shared).unwrap().id, to_a);
    }

    #[test]
    fn bound_packets() {
        let mut queues = Queues::new();
        let target = link(TschLinkOption::Tx, LinkType::Normal, B);
        let elsewhere = link(TschLinkOption::Tx, LinkType::Normal, A);
        let slot = SlotSelection {
            slotframe: 0,
            timeslot: 1,
            channel_offset: 0,
        };

        let bound = queues
            .push(PacketKind::Data, A, &[1], Some(1), 8, None, Some(slot))
            .unwrap();

        // Only the selected cell carries it, whatever its neighbor.
        assert_eq!(queues.packet_for_link(&target).unwrap().id, bound);

        let mut other = elsewhere;
        other.timeslot = 2;
        assert!(queues.packet_for_link(&other).is_none());
    }

    #[test]
    fn flush() {
        let mut queues = Queues::new();
        data(&mut queues, A, 1).unwrap();
        data(&mut queues, Address::BROADCAST, 2).unwrap();
        queues.flush();
        assert_eq!(queues.total_count(), 0);
        queues.free_unused();
        assert_eq!(queues.neighbors().count(), 0);
    }
}
