//! Session statistics.

use tsch_frame::time::Duration;

use crate::queue::PacketKind;

/// Outcome of a transmission, as reported by the slot operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// Sent and, when requested, acknowledged.
    Ok,
    /// Sent, but no acknowledgment came back.
    NoAck,
    /// The channel was busy.
    Collision,
    /// The radio failed to send the frame.
    Error,
}

/// Counters of one kind of outgoing packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketCounters {
    /// Packets queued.
    pub enqueued: u32,
    /// Packets dropped because the queue was full.
    pub queue_loss: u32,
    /// Packets sent successfully.
    pub ok: u32,
    /// Packets that were never acknowledged.
    pub no_ack: u32,
    /// Packets that failed otherwise.
    pub error: u32,
}

impl PacketCounters {
    fn record(&mut self, status: TxStatus) {
        match status {
            TxStatus::Ok => self.ok += 1,
            TxStatus::NoAck => self.no_ack += 1,
            TxStatus::Collision | TxStatus::Error => self.error += 1,
        }
    }
}

/// Statistics of the engine.
///
/// The association and leaving counts survive disassociation; the session
/// counters are reset on every association.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Number of successful associations.
    pub association_count: u32,
    /// Number of disassociations.
    pub leaving_count: u32,
    /// Frames transmitted in this session.
    pub tx_count: u32,
    /// Frames received in this session.
    pub rx_count: u32,
    /// Synchronizations on the time source in this session.
    pub sync_count: u32,
    /// Smallest drift correction seen in this session.
    pub min_drift: Duration,
    /// Largest drift correction seen in this session.
    pub max_drift: Duration,
    /// Enhanced beacons.
    pub eb: PacketCounters,
    /// Keep-alives.
    pub keepalive: PacketCounters,
    /// Data frames.
    pub data: PacketCounters,
}

impl Stats {
    /// Counters for the packets of `kind`.
    pub fn counters(&self, kind: PacketKind) -> &PacketCounters {
        match kind {
            PacketKind::EnhancedBeacon => &self.eb,
            PacketKind::KeepAlive => &self.keepalive,
            PacketKind::Data => &self.data,
        }
    }

    pub(crate) fn counters_mut(&mut self, kind: PacketKind) -> &mut PacketCounters {
        match kind {
            PacketKind::EnhancedBeacon => &mut self.eb,
            PacketKind::KeepAlive => &mut self.keepalive,
            PacketKind::Data => &mut self.data,
        }
    }

    pub(crate) fn record_sent(&mut self, kind: PacketKind, status: TxStatus) {
        self.counters_mut(kind).record(status);
    }

    pub(crate) fn record_sync(&mut self, drift: Duration) {
        self.sync_count += 1;
        self.min_drift = self.min_drift.min(drift);
        self.max_drift = self.max_drift.max(drift);
    }

    pub(crate) fn reset_session(&mut self) {
        self.tx_count = 0;
        self.rx_count = 0;
        self.sync_count = 0;
        self.min_drift = Duration::ZERO;
        self.max_drift = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_kind_counters() {
        let mut stats = Stats::default();
        stats.record_sent(PacketKind::KeepAlive, TxStatus::NoAck);
        stats.record_sent(PacketKind::KeepAlive, TxStatus::Ok);
        stats.record_sent(PacketKind::Data, TxStatus::Collision);
        stats.counters_mut(PacketKind::EnhancedBeacon).queue_loss += 1;

        assert_eq!(stats.keepalive.no_ack, 1);
        assert_eq!(stats.keepalive.ok, 1);
        assert_eq!(stats.data.error, 1);
        assert_eq!(stats.counters(PacketKind::EnhancedBeacon).queue_loss, 1);
    }

    #[test]
    fn drift_bounds() {
        let mut stats = Stats::default();
        stats.record_sync(Duration::from_us(-30));
        stats.record_sync(Duration::from_us(12));
        assert_eq!(stats.sync_count, 2);
        assert_eq!(stats.min_drift, Duration::from_us(-30));
        assert_eq!(stats.max_drift, Duration::from_us(12));

        stats.association_count = 3;
        stats.reset_session();
        assert_eq!(stats.sync_count, 0);
        assert_eq!(stats.max_drift, Duration::ZERO);
        assert_eq!(stats.association_count, 3);
    }
}
