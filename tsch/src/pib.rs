use tsch_frame::time::Duration;

use crate::config::{
    BROADCAST_PAN_ID, EB_PERIOD, KEEPALIVE_TIMEOUT, PAN_ID, SLOT_LENGTH_ADAPTATION,
};

/// Runtime attributes of the TSCH MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TschPib {
    /// The PAN the node belongs to; broadcast while not associated.
    pub(crate) pan_id: u16,
    /// The PAN ID a coordinator starts its network with.
    pub(crate) coordinator_pan_id: u16,
    /// The node starts its own network instead of scanning.
    pub(crate) is_coordinator: bool,
    /// The joined PAN requires secured frames.
    pub(crate) pan_secured: bool,
    /// Our join priority; 0 for the coordinator, 0xff when not associated.
    pub(crate) join_priority: u8,
    /// Period of the enhanced beacons; 0 disables them.
    pub(crate) eb_period: Duration,
    /// Keep-alive timeout; 0 disables keep-alives.
    pub(crate) keepalive_timeout: Duration,
    /// Beacons announce and nodes follow timeslot length changes.
    pub(crate) slot_length_adaptation: bool,
}

impl Default for TschPib {
    fn default() -> Self {
        Self {
            pan_id: BROADCAST_PAN_ID,
            coordinator_pan_id: PAN_ID,
            is_coordinator: false,
            pan_secured: false,
            join_priority: tsch_frame::NO_JOIN_PRIORITY,
            eb_period: EB_PERIOD,
            keepalive_timeout: KEEPALIVE_TIMEOUT,
            slot_length_adaptation: SLOT_LENGTH_ADAPTATION,
        }
    }
}

impl TschPib {
    /// The current PAN ID.
    pub fn pan_id(&self) -> u16 {
        self.pan_id
    }

    /// Returns `true` when the node acts as coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.is_coordinator
    }

    /// Returns `true` when the joined PAN is secured.
    pub fn pan_secured(&self) -> bool {
        self.pan_secured
    }

    /// Our join priority.
    pub fn join_priority(&self) -> u8 {
        self.join_priority
    }

    /// The current EB period.
    pub fn eb_period(&self) -> Duration {
        self.eb_period
    }

    /// The current keep-alive timeout.
    pub fn keepalive_timeout(&self) -> Duration {
        self.keepalive_timeout
    }

    /// Returns `true` when timeslot length adaptation is on.
    pub fn slot_length_adaptation(&self) -> bool {
        self.slot_length_adaptation
    }
}
