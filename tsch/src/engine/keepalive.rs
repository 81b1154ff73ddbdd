//! Keep-alives to the time source and resynchronization.

use rand_core::RngCore;
use tsch_frame::time::{Duration, Instant};
use tsch_frame::{Address, DataFrameRepr};

use super::{AssociationState, Tsch};
use crate::config::{MAX_FRAME_LEN, MAX_FRAME_RETRIES};
use crate::queue::PacketKind;
use crate::radio::Radio;
use crate::stats::TxStatus;
use crate::upper::UpperLayer;

/// What the keep-alive timer must do on the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(super) enum KeepAliveStatus {
    /// Leave the timer as it is.
    Unchanged,
    /// Arm the timer with the keep-alive period, or stop it for a 0 timeout.
    ScheduleOrStop,
    /// Send a keep-alive right away.
    SendImmediately,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct KeepAlive {
    pub(super) status: KeepAliveStatus,
    pub(super) deadline: Option<Instant>,
}

impl KeepAlive {
    pub(super) const fn new() -> Self {
        Self {
            status: KeepAliveStatus::Unchanged,
            deadline: None,
        }
    }
}

impl<R: Radio, U: UpperLayer, G: RngCore> Tsch<R, U, G> {
    /// Request a keep-alive, right away or after a full period.
    pub(super) fn schedule_keepalive(&mut self, immediate: bool) {
        if immediate {
            self.keepalive.status = KeepAliveStatus::SendImmediately;
        } else if self.keepalive.status != KeepAliveStatus::SendImmediately {
            self.keepalive.status = KeepAliveStatus::ScheduleOrStop;
        }
    }

    /// Apply the requested keep-alive status and fire an expired timer.
    ///
    /// Only a node that joined through a time source sends keep-alives.
    pub(super) fn process_keepalive(&mut self, now: Instant) {
        let status = core::mem::replace(&mut self.keepalive.status, KeepAliveStatus::Unchanged);

        if self.state != AssociationState::Node {
            self.keepalive.deadline = None;
            return;
        }

        match status {
            KeepAliveStatus::Unchanged => (),
            KeepAliveStatus::ScheduleOrStop => {
                self.keepalive.deadline = self.keepalive_delay().map(|delay| now + delay);
            }
            KeepAliveStatus::SendImmediately => {
                self.keepalive.deadline = Some(now);
            }
        }

        match self.keepalive.deadline {
            Some(deadline) if deadline <= now => {
                self.keepalive.deadline = None;
                self.send_keepalive();
            }
            _ => (),
        }
    }

    /// A delay drawn in `[0.9 t, t)` for a timeout of `t` ms, `None` for 0.
    fn keepalive_delay(&mut self) -> Option<Duration> {
        let timeout = self.pib.keepalive_timeout.as_us() / 1000;

        let delay = match timeout {
            t if t <= 0 => return None,
            t if t < 10 => t - 1,
            t => t - t / 10 + (self.rng.next_u32() as i64) % (t / 10),
        };

        Some(Duration::from_ms(delay))
    }

    /// Queue an empty unicast frame to the time source.
    fn send_keepalive(&mut self) {
        let Some(time_source) = self.queues.time_source() else {
            error!("keepalive: no time source, not sent");
            return;
        };

        let sequence_number = self.next_sequence_number();
        let repr = DataFrameRepr {
            sequence_number: Some(sequence_number),
            ack_request: true,
            frame_pending: false,
            pan_id: self.pib.pan_id,
            dst_address: time_source,
            src_address: self.address,
            payload: &[],
        };

        let mut buffer = [0u8; MAX_FRAME_LEN];
        let queued = match repr.emit(&mut buffer) {
            Ok(len) => self
                .enqueue(
                    PacketKind::KeepAlive,
                    time_source,
                    &buffer[..len],
                    Some(sequence_number),
                    MAX_FRAME_RETRIES + 1,
                    None,
                    None,
                )
                .is_ok(),
            Err(_) => false,
        };

        if queued {
            debug!("keepalive: sending to {}, seq {}", time_source, sequence_number);
        } else {
            self.schedule_keepalive(false);
        }
    }

    /// A keep-alive left the queue.
    pub(super) fn keepalive_sent(&mut self, dst: Address, status: TxStatus) {
        debug!("keepalive: to {}, status {:?}", dst, status);

        let schedule_next = match status {
            TxStatus::NoAck => !self.resynchronize(dst),
            _ => true,
        };

        if schedule_next {
            self.schedule_keepalive(false);
        }
    }

    /// Switch to the last alternate time source after `original` stopped
    /// answering.
    ///
    /// Without an alternate, the node leaves the network unless it
    /// synchronized at least once in this session. Returns `true` when the
    /// time source changed.
    fn resynchronize(&mut self, original: Address) -> bool {
        if let Some(current) = self.queues.time_source() {
            if current != original {
                info!("keepalive: time source already changed to {}", current);
                return false;
            }
        }

        let Some((alternate, join_priority)) = self.last_alternate else {
            warn!("keepalive: no alternate time source, {} lost", original);
            if self.stats.sync_count == 0 {
                self.disassociate();
            }
            return false;
        };

        info!(
            "keepalive: time source {} lost, switching to {}",
            original, alternate
        );
        self.update_time_source(Some(alternate));
        self.pib.join_priority = join_priority.saturating_add(1);
        self.schedule_keepalive(true);
        true
    }
}
