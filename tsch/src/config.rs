//! Compile-time configuration.
//!
//! Every constant can be overridden at build time with a `TSCH_<NAME>`
//! environment variable, e.g. `TSCH_MAX_JOIN_PRIORITY=16`.
#![allow(dead_code)]
pub use customizable::*;

/// The broadcast PAN ID.
pub const BROADCAST_PAN_ID: u16 = 0xffff;

/// Maximum clock skew tolerated between a scanned frame's timestamp and now.
pub const SCAN_TIMESTAMP_TOLERANCE: tsch_frame::time::Duration =
    tsch_frame::time::Duration::from_secs(2);

/// Maximum length of a frame, without FCS.
pub const MAX_FRAME_LEN: usize = 125;

#[cfg(test)]
mod customizable {
    use tsch_frame::time::Duration;

    pub const MAX_SLOTFRAMES: usize = 4;
    pub const MAX_LINKS: usize = 32;
    pub const MAX_NEIGHBORS: usize = 16;
    pub const QUEUE_PER_NEIGHBOR: usize = 8;
    pub const MAX_INCOMING_PACKETS: usize = 4;
    pub const MAX_DEQUEUED_PACKETS: usize = 16;
    pub const MAX_JOIN_PRIORITY: u8 = 32;
    pub const SCHEDULE_DEFAULT_LENGTH: u16 = 7;
    pub const HOPPING_SEQUENCE_MAX_LEN: usize = 16;
    /// Keep-alive period, drawn in [0.9 t, t).
    pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(12);
    pub const MAX_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const EB_PERIOD: Duration = Duration::from_secs(16);
    pub const MAX_EB_PERIOD: Duration = Duration::from_secs(16);
    /// Dwell time on a channel while scanning.
    pub const CHANNEL_SCAN_DURATION: Duration = Duration::from_secs(1);
    pub const ASSOCIATION_POLL_PERIOD: Duration = Duration::from_ms(10);
    pub const MAX_FRAME_RETRIES: u8 = 7;
    /// `None` disables the age check of the duplicate window.
    pub const DUPLICATE_MAX_AGE: Option<Duration> = Some(Duration::from_secs(20));
    pub const DUPLICATE_SENDERS: usize = 64;
    pub const DUPLICATE_HISTORY: usize = 16;
    pub const PAN_ID: u16 = 0xabcd;
    /// Only join networks with our PAN ID.
    pub const CHECK_PAN_ID: bool = false;
    /// Replace the local schedule with the one advertised in the EB.
    pub const INIT_SCHEDULE_FROM_EB: bool = true;
    pub const AUTOSELECT_TIME_SOURCE: bool = false;
    pub const SECURITY_SUPPORTED: bool = false;
    /// Follow the timeslot length changes announced in beacons.
    pub const SLOT_LENGTH_ADAPTATION: bool = false;
    /// EB period while a timeslot length change is pending.
    pub const SLOT_LENGTH_RAPID_EB_PERIOD: Duration = Duration::from_secs(1);
}

#[cfg(not(test))]
mod customizable {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}
