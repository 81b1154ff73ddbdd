//! Duplicate frame detection.
//!
//! For every sender, the window keeps the last `HISTORY` sequence numbers
//! received, most recent first, together with their receipt time.

use heapless::Vec;
use tsch_frame::time::{Duration, Instant};
use tsch_frame::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Received {
    sequence_number: u8,
    timestamp: Instant,
}

#[derive(Debug)]
struct Sender<const HISTORY: usize> {
    address: Address,
    history: Vec<Received, HISTORY>,
}

impl<const HISTORY: usize> Sender<HISTORY> {
    fn last_seen(&self) -> Option<Instant> {
        self.history.first().map(|r| r.timestamp)
    }
}

/// A per-sender window of recently received sequence numbers.
#[derive(Debug)]
pub struct DuplicateWindow<const SENDERS: usize, const HISTORY: usize> {
    senders: Vec<Sender<HISTORY>, SENDERS>,
    max_age: Option<Duration>,
}

impl<const SENDERS: usize, const HISTORY: usize> DuplicateWindow<SENDERS, HISTORY> {
    /// Create an empty window.
    ///
    /// A repeated sequence number is a duplicate only when it was received
    /// at most `max_age` ago; with `None`, it always is.
    pub const fn new(max_age: Option<Duration>) -> Self {
        Self {
            senders: Vec::new(),
            max_age,
        }
    }

    fn is_valid(sender: &Address) -> bool {
        sender.is_unicast()
    }

    /// Returns `true` when `sequence_number` from `sender` was already seen.
    ///
    /// Frames from an invalid sender are always reported as duplicates.
    pub fn is_duplicate(&self, sender: &Address, sequence_number: u8, now: Instant) -> bool {
        if !Self::is_valid(sender) {
            return true;
        }

        let Some(entry) = self.senders.iter().find(|s| s.address == *sender) else {
            return false;
        };

        match entry
            .history
            .iter()
            .find(|r| r.sequence_number == sequence_number)
        {
            Some(received) => match self.max_age {
                Some(max_age) => now - received.timestamp <= max_age,
                None => true,
            },
            None => false,
        }
    }

    /// Record `sequence_number` from `sender` as the most recent one.
    ///
    /// A number already in the history moves to the front; otherwise the
    /// oldest number is evicted when the history is full. Invalid senders
    /// are ignored.
    pub fn register(&mut self, sender: &Address, sequence_number: u8, now: Instant) {
        if !Self::is_valid(sender) {
            return;
        }

        let index = match self.senders.iter().position(|s| s.address == *sender) {
            Some(index) => index,
            None => {
                if self.senders.is_full() {
                    self.evict_stalest();
                }

                let sender = Sender {
                    address: *sender,
                    history: Vec::new(),
                };
                if self.senders.push(sender).is_err() {
                    return;
                }
                self.senders.len() - 1
            }
        };

        let history = &mut self.senders[index].history;

        match history
            .iter()
            .position(|r| r.sequence_number == sequence_number)
        {
            Some(position) => {
                history.remove(position);
            }
            None if history.is_full() => {
                history.pop();
            }
            None => {}
        }

        let _ = history.insert(
            0,
            Received {
                sequence_number,
                timestamp: now,
            },
        );
    }

    fn evict_stalest(&mut self) {
        if let Some(index) = self
            .senders
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_seen())
            .map(|(i, _)| i)
        {
            self.senders.swap_remove(index);
        }
    }

    /// Forget every sender.
    pub fn clear(&mut self) {
        self.senders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = Address::Extended([0xa; 8]);
    const B: Address = Address::Short([0, 0xb]);

    fn at(secs: i64) -> Instant {
        Instant::from_us(Duration::from_secs(secs).as_us())
    }

    #[test]
    fn aging() {
        let mut window = DuplicateWindow::<4, 16>::new(Some(Duration::from_secs(20)));
        window.register(&A, 7, at(0));

        assert!(window.is_duplicate(&A, 7, at(5)));
        assert!(window.is_duplicate(&A, 7, at(20)));
        assert!(!window.is_duplicate(&A, 7, at(21)));
        assert!(!window.is_duplicate(&A, 8, at(5)));
        assert!(!window.is_duplicate(&B, 7, at(5)));
    }

    #[test]
    fn without_age_check() {
        let mut window = DuplicateWindow::<4, 16>::new(None);
        window.register(&A, 7, at(0));
        assert!(window.is_duplicate(&A, 7, at(1_000_000)));
    }

    #[test]
    fn invalid_senders() {
        let mut window = DuplicateWindow::<4, 16>::new(None);
        assert!(window.is_duplicate(&Address::Absent, 1, at(0)));
        assert!(window.is_duplicate(&Address::BROADCAST, 1, at(0)));

        window.register(&Address::Absent, 1, at(0));
        window.register(&Address::BROADCAST, 1, at(0));
        assert!(window.senders.is_empty());
    }

    #[test]
    fn history_is_most_recent_first() {
        let mut window = DuplicateWindow::<4, 4>::new(None);
        for seq in 0..4 {
            window.register(&A, seq, at(seq as i64));
        }

        // Re-registering moves the number to the front instead of duplicating it.
        window.register(&A, 1, at(10));
        let seqs: Vec<u8, 4> = window.senders[0]
            .history
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(seqs, [1, 3, 2, 0]);

        // A new number evicts the oldest.
        window.register(&A, 9, at(11));
        assert!(!window.is_duplicate(&A, 0, at(12)));
        assert!(window.is_duplicate(&A, 2, at(12)));
        assert!(window.is_duplicate(&A, 9, at(12)));
    }

    #[test]
    fn stalest_sender_is_evicted() {
        let mut window = DuplicateWindow::<2, 4>::new(None);
        window.register(&A, 1, at(0));
        window.register(&B, 1, at(5));
        window.register(&Address::Short([0, 0xc]), 1, at(6));

        assert!(!window.is_duplicate(&A, 1, at(7)));
        assert!(window.is_duplicate(&B, 1, at(7)));

        window.clear();
        assert!(!window.is_duplicate(&B, 1, at(7)));
    }
}
