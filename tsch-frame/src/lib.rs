//! Zero-copy read and write structures for the IEEE 802.15.4e TSCH frames.
//!
//! Each reader contains the following functions:
//! - [`new`]: Create a new reader, checking the buffer length.
//! - [`new_unchecked`]: Create a new reader without checking the buffer length.
//!
//! The most important reader is the [`Frame`] reader, which is used to read a
//! full IEEE 802.15.4 frame (without FCS). The reader provides the following
//! functions:
//! - [`frame_control`]: returns a [`FrameControl`] reader.
//! - [`sequence_number`]: returns the sequence number if not suppressed.
//! - [`addressing`]: returns an [`AddressingFields`] reader.
//! - [`auxiliary_security_header`]: returns an [`AuxiliarySecurityHeader`]
//!   reader.
//! - [`information_elements`]: returns an [`InformationElements`] reader.
//! - [`payload`]: returns the payload of the frame.
//!
//! ## Reading a frame
//! ```
//! # use tsch_frame::{
//! #   Frame,
//! #   FrameType,
//! #   NestedSubId,
//! #   NestedSubIdShort,
//! #   TschTimeslot,
//! # };
//! # let frame: [u8; 35] = [
//! #     0x40, 0xeb, 0xcd, 0xab, 0xff, 0xff, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00,
//! #     0x00, 0x3f, 0x11, 0x88, 0x06, 0x1a, 0x0e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x1c,
//! #     0x00, 0x01, 0xc8, 0x00, 0x01, 0x1b, 0x00,
//! # ];
//! let frame = Frame::new(&frame[..]).unwrap();
//! assert_eq!(frame.frame_control().frame_type(), FrameType::Beacon);
//!
//! let Some(ie) = frame.information_elements() else { return; };
//!
//! for nested in ie.nested_information_elements() {
//!     if let NestedSubId::Short(NestedSubIdShort::TschTimeslot) = nested.sub_id() {
//!         let time_slot = TschTimeslot::new(nested.content()).unwrap();
//!         assert_eq!(time_slot.id(), 0);
//!     }
//! }
//! ```
//!
//! ## Writing a frame
//!
//! The TSCH frames are written with dedicated builders:
//! - [`build_beacon`] and [`patch_beacon_asn`] for enhanced beacons,
//! - [`build_enhanced_ack`] for enhanced acknowledgments,
//! - [`DataFrameRepr`] for data frames and keep-alives.
//!
//! Their parsing counterparts are [`parse_beacon`] and [`parse_enhanced_ack`].
//!
//! ## Information Elements
//!
//! Header IEs: [`TimeCorrection`], [`HeaderTermination1`] and
//! [`HeaderTermination2`]. Payload IEs: the MLME group, whose nested IEs
//! are read with [`nested_information_elements`]. Nested IEs:
//! [`TschSynchronization`], [`TschSlotframeAndLink`], [`TschTimeslot`] and
//! [`ChannelHopping`].
//!
//! [`new`]: Frame::new
//! [`new_unchecked`]: Frame::new_unchecked
//! [`frame_control`]: Frame::frame_control
//! [`sequence_number`]: Frame::sequence_number
//! [`addressing`]: Frame::addressing
//! [`auxiliary_security_header`]: Frame::auxiliary_security_header
//! [`information_elements`]: Frame::information_elements
//! [`payload`]: Frame::payload
//! [`HeaderTermination1`]: HeaderElementId::HeaderTermination1
//! [`HeaderTermination2`]: HeaderElementId::HeaderTermination2
//! [`nested_information_elements`]: InformationElements::nested_information_elements
#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

pub mod time;

mod frame_control;
pub use frame_control::*;

mod addressing;
pub use addressing::*;

mod security;
pub use security::*;

mod ie;
pub use ie::*;

mod frame;
pub use frame::Frame;

mod header;
pub use header::FrameHeaderRepr;

mod beacon;
pub use beacon::*;

mod eack;
pub use eack::*;

mod data;
pub use data::DataFrameRepr;

mod fcs;
pub use fcs::*;

/// An error that can occur when reading an IEEE 802.15.4 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error;

/// A type alias for `Result<T, frame::Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// The buffer is too small to write a frame or an element into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferTooSmall;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "malformed frame")
    }
}

impl core::fmt::Display for BufferTooSmall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "buffer too small")
    }
}
