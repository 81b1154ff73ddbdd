//! The radio as seen by the background part of the engine.
//!
//! The timing-critical transmissions and receptions of a slot are performed
//! by the slot-timing driver; the engine only uses the radio to scan for
//! beacons while not associated.

use tsch_frame::time::Instant;

/// A IEEE 802.15.4 radio.
pub trait Radio {
    /// Turn the receiver on.
    fn on(&mut self);

    /// Put the radio in a low-power sleep mode.
    fn off(&mut self);

    /// Tune the radio to `channel`.
    fn set_channel(&mut self, channel: u8);

    /// Returns `true` when a received frame waits to be read.
    fn pending_packet(&self) -> bool;

    /// Copy the pending frame, without FCS, into `buffer` and return its
    /// length.
    fn read(&mut self, buffer: &mut [u8]) -> usize;

    /// The time at which the start of the last frame was received.
    fn last_packet_timestamp(&self) -> Instant;

    /// Returns the IEEE802.15.4 8-octet MAC address of the radio device.
    fn ieee802154_address(&self) -> [u8; 8];
}

#[cfg(test)]
pub mod tests {
    use std::collections::VecDeque;
    use std::vec::Vec;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TestRadioEvent {
        On,
        Off,
        SetChannel(u8),
        Read(Vec<u8>),
    }

    /// A radio recording every call, with frames to hand out.
    pub struct TestRadio {
        pub ieee802154_address: [u8; 8],
        pub incoming: VecDeque<(Vec<u8>, Instant)>,
        pub events: Vec<TestRadioEvent>,
        last_timestamp: Instant,
    }

    impl TestRadio {
        pub fn new(ieee802154_address: [u8; 8]) -> Self {
            Self {
                ieee802154_address,
                incoming: VecDeque::new(),
                events: Vec::new(),
                last_timestamp: Instant::from_us(0),
            }
        }

        pub fn channels(&self) -> Vec<u8> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    TestRadioEvent::SetChannel(c) => Some(*c),
                    _ => None,
                })
                .collect()
        }
    }

    impl Radio for TestRadio {
        fn on(&mut self) {
            self.events.push(TestRadioEvent::On);
        }

        fn off(&mut self) {
            self.events.push(TestRadioEvent::Off);
        }

        fn set_channel(&mut self, channel: u8) {
            self.events.push(TestRadioEvent::SetChannel(channel));
        }

        fn pending_packet(&self) -> bool {
            !self.incoming.is_empty()
        }

        fn read(&mut self, buffer: &mut [u8]) -> usize {
            let Some((frame, timestamp)) = self.incoming.pop_front() else {
                return 0;
            };
            let len = frame.len().min(buffer.len());
            buffer[..len].copy_from_slice(&frame[..len]);
            self.last_timestamp = timestamp;
            self.events.push(TestRadioEvent::Read(frame));
            len
        }

        fn last_packet_timestamp(&self) -> Instant {
            self.last_timestamp
        }

        fn ieee802154_address(&self) -> [u8; 8] {
            self.ieee802154_address
        }
    }
}
