//! An IEEE 802.15.4e Time-Slotted Channel Hopping (TSCH) MAC engine.
//!
//! The engine keeps the TSCH schedule and per-neighbor transmit queues,
//! joins a network from enhanced beacons or runs one as coordinator, sends
//! beacons and keep-alives, and tracks the time source.
//!
//! Radio access and slot timing are left to the integrator: see
//! [`engine`] for the split between the background side and the slot
//! driver.
#![no_std]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
pub(crate) mod utils;

pub use tsch_frame as frame;

pub mod asn;
pub mod config;
pub mod duplicate;
pub mod engine;
pub mod hopping;
pub mod pib;
pub mod queue;
pub mod radio;
pub mod schedule;
pub mod stats;
pub mod upper;

pub use engine::{
    AssociationError, AssociationState, SendError, SlotAction, SlotLengthError, SlotPlan, Tsch,
    TschQueues, TschSchedule,
};
