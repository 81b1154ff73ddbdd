//! The TSCH schedule: slotframes and their links.
//!
//! Slotframes are kept in insertion order, each owning its links. Links are
//! identified by a [`LinkHandle`] that is unique over the lifetime of the
//! schedule. Every mutation takes the [`ScheduleLock`]; when the slot
//! operation holds it, the mutation fails with [`ScheduleError::Locked`].

mod lock;
pub use lock::{LockOwner, ScheduleLock};

mod pending;
pub use pending::{PendingSchedule, PENDING_SLOTS};

mod selector;
pub use selector::{default_comparator, LinkComparator, Preference, Selection};

use heapless::Vec;
use tsch_frame::{Address, TschLinkOption};

use crate::config::{HOPPING_SEQUENCE_MAX_LEN, SCHEDULE_DEFAULT_LENGTH};

/// Errors returned by the schedule.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// A slotframe with this handle already exists.
    DuplicateHandle,
    /// A slotframe cannot have zero timeslots.
    ZeroSize,
    /// The timeslot is outside of the slotframe.
    InvalidTimeslot,
    /// The channel offset is outside of the hopping sequence.
    InvalidChannelOffset,
    /// Another link already uses this timeslot and channel offset.
    TimeslotOccupied,
    /// No room left for the slotframe, link or pending entry.
    AllocationFailed,
    /// No slotframe with this handle.
    UnknownSlotframe,
    /// No link with this handle in the slotframe.
    UnknownLink,
    /// The schedule is locked by the slot operation.
    Locked,
}

impl core::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateHandle => write!(f, "duplicate slotframe handle"),
            Self::ZeroSize => write!(f, "zero-sized slotframe"),
            Self::InvalidTimeslot => write!(f, "invalid timeslot"),
            Self::InvalidChannelOffset => write!(f, "invalid channel offset"),
            Self::TimeslotOccupied => write!(f, "timeslot already in use"),
            Self::AllocationFailed => write!(f, "allocation failed"),
            Self::UnknownSlotframe => write!(f, "unknown slotframe"),
            Self::UnknownLink => write!(f, "unknown link"),
            Self::Locked => write!(f, "schedule locked"),
        }
    }
}

/// Link identifier, unique within a schedule.
pub type LinkHandle = u16;

/// Type of link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkType {
    /// Carries data frames only.
    Normal,
    /// Carries data frames and enhanced beacons.
    Advertising,
    /// Carries enhanced beacons only.
    AdvertisingOnly,
}

/// A TSCH link is a pairwise assignment of a directed communication between
/// devices for a given slotframe, in a given timeslot on a given channel offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Link {
    /// Link Identifier
    pub handle: LinkHandle,
    /// The slotframe owning the link
    pub slotframe_handle: u16,
    /// Associated timeslot in the slotframe
    pub timeslot: u16,
    /// Associated Channel offset for the given timeslot for the link
    pub channel_offset: u16,
    /// Link communication option
    pub options: TschLinkOption,
    /// Type of link (normal or advertising)
    pub link_type: LinkType,
    /// Neighbor assigned to the link, broadcast if not a dedicated link
    pub address: Address,
}

impl Link {
    /// The link can be used to transmit.
    pub fn is_tx(&self) -> bool {
        self.options.contains(TschLinkOption::Tx)
    }

    /// The link can be used to receive.
    pub fn is_rx(&self) -> bool {
        self.options.contains(TschLinkOption::Rx)
    }

    /// The link is shared between several transmitters.
    pub fn is_shared(&self) -> bool {
        self.options.contains(TschLinkOption::Shared)
    }
}

/// The parameters of a link to add with [`Schedule::add_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Link options.
    pub options: TschLinkOption,
    /// Link type.
    pub link_type: LinkType,
    /// Target neighbor, broadcast if not a dedicated link.
    pub address: Address,
    /// Timeslot within the slotframe.
    pub timeslot: u16,
    /// Channel offset.
    pub channel_offset: u16,
}

/// Receives the links added to and removed from the schedule.
///
/// The neighbor queues use it to maintain their Tx link counters.
pub trait LinkListener {
    /// A link was added.
    fn link_added(&mut self, link: &Link);
    /// A link was removed.
    fn link_removed(&mut self, link: &Link);
}

impl LinkListener for () {
    fn link_added(&mut self, _: &Link) {}
    fn link_removed(&mut self, _: &Link) {}
}

/// Number of packets queued for a neighbor, consulted by the link comparator.
pub trait PacketCount {
    /// The number of packets queued for `address`.
    fn packet_count(&self, address: &Address) -> usize;
}

/// A TSCH slotframe collection of timeslots repeating in time, analogous to a
/// superframe in that it defines periods of communication opportunities.
#[derive(Debug)]
pub struct Slotframe<const LINKS: usize> {
    handle: u16,
    size: u16,
    links: Vec<Link, LINKS>,
}

impl<const LINKS: usize> Slotframe<LINKS> {
    /// Slotframe Identifier
    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// The number of timeslots in the slotframe.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// The links of the slotframe, in insertion order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Look for the link at `timeslot` and `channel_offset`.
    pub fn link_by_timeslot(&self, timeslot: u16, channel_offset: u16) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.timeslot == timeslot && l.channel_offset == channel_offset)
    }
}

/// The schedule of a TSCH node: at most `SLOTFRAMES` slotframes of at most
/// `LINKS` links each.
pub struct Schedule<const SLOTFRAMES: usize, const LINKS: usize> {
    slotframes: Vec<Slotframe<LINKS>, SLOTFRAMES>,
    next_link_handle: LinkHandle,
    current_link: Option<LinkHandle>,
    lock: ScheduleLock,
    pending: PendingSchedule,
    comparator: LinkComparator,
}

impl<const SLOTFRAMES: usize, const LINKS: usize> Default for Schedule<SLOTFRAMES, LINKS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SLOTFRAMES: usize, const LINKS: usize> Schedule<SLOTFRAMES, LINKS> {
    /// Create an empty schedule using the [`default_comparator`].
    pub fn new() -> Self {
        Self {
            slotframes: Vec::new(),
            next_link_handle: 0,
            current_link: None,
            lock: ScheduleLock::new(),
            pending: PendingSchedule::new(),
            comparator: default_comparator,
        }
    }

    /// The lock guarding the schedule.
    pub fn lock(&self) -> &ScheduleLock {
        &self.lock
    }

    /// Replace the comparator used to break ties between overlapping links
    /// of the same slotframe.
    pub fn set_comparator(&mut self, comparator: LinkComparator) {
        self.comparator = comparator;
    }

    /// The one-off transmissions injected ahead of the regular schedule.
    pub fn pending_mut(&mut self) -> &mut PendingSchedule {
        &mut self.pending
    }

    /// The link currently executed by the slot operation.
    pub fn current_link(&self) -> Option<LinkHandle> {
        self.current_link
    }

    /// Record the link executed by the slot operation.
    pub fn set_current_link(&mut self, link: Option<LinkHandle>) {
        self.current_link = link;
    }

    fn with_lock<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, ScheduleError>,
    ) -> Result<R, ScheduleError> {
        if !self.lock.try_lock(LockOwner::Background) {
            error!("schedule: could not take the lock");
            return Err(ScheduleError::Locked);
        }

        let result = f(self);
        self.lock.unlock(LockOwner::Background);
        result
    }

    fn readable(&self) -> bool {
        !self.lock.is_locked_by_other(LockOwner::Background)
    }

    /// Add a slotframe with `handle` and `size` timeslots.
    pub fn add_slotframe(
        &mut self,
        handle: u16,
        size: u16,
    ) -> Result<&Slotframe<LINKS>, ScheduleError> {
        if size == 0 {
            return Err(ScheduleError::ZeroSize);
        }

        self.with_lock(|schedule| {
            if schedule.slotframes.iter().any(|sf| sf.handle == handle) {
                return Err(ScheduleError::DuplicateHandle);
            }

            schedule
                .slotframes
                .push(Slotframe {
                    handle,
                    size,
                    links: Vec::new(),
                })
                .map_err(|_| ScheduleError::AllocationFailed)?;

            info!("add_slotframe {} {}", handle, size);
            Ok(())
        })?;

        self.slotframes
            .last()
            .ok_or(ScheduleError::AllocationFailed)
    }

    /// Remove the slotframe with `handle` and all of its links.
    pub fn remove_slotframe(
        &mut self,
        handle: u16,
        listener: &mut impl LinkListener,
    ) -> Result<(), ScheduleError> {
        self.with_lock(|schedule| {
            let index = schedule
                .slotframes
                .iter()
                .position(|sf| sf.handle == handle)
                .ok_or(ScheduleError::UnknownSlotframe)?;

            let slotframe = schedule.slotframes.remove(index);
            for link in slotframe.links.iter() {
                schedule.forget_link(link, listener);
            }

            info!("remove_slotframe {}", handle);
            Ok(())
        })
    }

    /// Remove every slotframe.
    pub fn remove_all_slotframes(
        &mut self,
        listener: &mut impl LinkListener,
    ) -> Result<(), ScheduleError> {
        self.with_lock(|schedule| {
            while let Some(slotframe) = schedule.slotframes.pop() {
                for link in slotframe.links.iter() {
                    schedule.forget_link(link, listener);
                }
            }
            Ok(())
        })
    }

    /// Look for the slotframe with `handle`.
    pub fn get_slotframe(&self, handle: u16) -> Option<&Slotframe<LINKS>> {
        if !self.readable() {
            return None;
        }

        self.slotframes.iter().find(|sf| sf.handle == handle)
    }

    /// The slotframes of the schedule.
    pub fn slotframes(&self) -> impl Iterator<Item = &Slotframe<LINKS>> {
        self.slotframes.iter()
    }

    /// Returns `true` when the schedule has no slotframe.
    pub fn is_empty(&self) -> bool {
        self.slotframes.is_empty()
    }

    /// The first handle from `next_link_handle` on that no link uses.
    fn free_link_handle(&self) -> LinkHandle {
        let mut handle = self.next_link_handle;
        while self
            .slotframes
            .iter()
            .flat_map(|sf| sf.links.iter())
            .any(|l| l.handle == handle)
        {
            handle = handle.wrapping_add(1);
        }
        handle
    }

    /// Add a link to the slotframe with handle `slotframe`.
    ///
    /// With `replace`, the link currently at the same timeslot and channel
    /// offset is removed first; otherwise its presence is an error.
    pub fn add_link(
        &mut self,
        slotframe: u16,
        config: LinkConfig,
        replace: bool,
        listener: &mut impl LinkListener,
    ) -> Result<Link, ScheduleError> {
        self.with_lock(|schedule| {
            let size = schedule
                .slotframes
                .iter()
                .find(|sf| sf.handle == slotframe)
                .ok_or(ScheduleError::UnknownSlotframe)?
                .size;

            if config.timeslot >= size {
                error!("add_link invalid timeslot: {}", config.timeslot);
                return Err(ScheduleError::InvalidTimeslot);
            }

            if config.channel_offset as usize >= HOPPING_SEQUENCE_MAX_LEN {
                error!("add_link invalid channel offset: {}", config.channel_offset);
                return Err(ScheduleError::InvalidChannelOffset);
            }

            if replace {
                schedule.remove_link_by_timeslot(
                    slotframe,
                    config.timeslot,
                    config.channel_offset,
                    listener,
                )?;
            }

            let link = Link {
                handle: schedule.free_link_handle(),
                slotframe_handle: slotframe,
                timeslot: config.timeslot,
                channel_offset: config.channel_offset,
                options: config.options,
                link_type: config.link_type,
                address: config.address,
            };

            let sf = schedule
                .slotframes
                .iter_mut()
                .find(|sf| sf.handle == slotframe)
                .ok_or(ScheduleError::UnknownSlotframe)?;

            if sf
                .link_by_timeslot(config.timeslot, config.channel_offset)
                .is_some()
            {
                return Err(ScheduleError::TimeslotOccupied);
            }

            if sf.links.push(link).is_err() {
                error!("add_link: slotframe {} is full", slotframe);
                return Err(ScheduleError::AllocationFailed);
            }

            schedule.next_link_handle = link.handle.wrapping_add(1);

            debug!(
                "add_link sf={} opt={:?} type={:?} ts={} ch={} addr={}",
                slotframe,
                link.options,
                link.link_type,
                link.timeslot,
                link.channel_offset,
                link.address
            );

            listener.link_added(&link);
            Ok(link)
        })
    }

    /// Remove the link with `handle` from the slotframe with handle `slotframe`.
    pub fn remove_link(
        &mut self,
        slotframe: u16,
        handle: LinkHandle,
        listener: &mut impl LinkListener,
    ) -> Result<Link, ScheduleError> {
        self.with_lock(|schedule| {
            let sf = schedule
                .slotframes
                .iter_mut()
                .find(|sf| sf.handle == slotframe)
                .ok_or(ScheduleError::UnknownSlotframe)?;

            let index = sf
                .links
                .iter()
                .position(|l| l.handle == handle)
                .ok_or(ScheduleError::UnknownLink)?;

            let link = sf.links.remove(index);
            schedule.forget_link(&link, listener);

            debug!(
                "remove_link sf={} ts={} ch={} addr={}",
                slotframe, link.timeslot, link.channel_offset, link.address
            );

            Ok(link)
        })
    }

    /// Remove the link at `timeslot` and `channel_offset`, if any.
    pub fn remove_link_by_timeslot(
        &mut self,
        slotframe: u16,
        timeslot: u16,
        channel_offset: u16,
        listener: &mut impl LinkListener,
    ) -> Result<Option<Link>, ScheduleError> {
        self.with_lock(|schedule| {
            let handle = schedule
                .slotframes
                .iter()
                .find(|sf| sf.handle == slotframe)
                .ok_or(ScheduleError::UnknownSlotframe)?
                .link_by_timeslot(timeslot, channel_offset)
                .map(|l| l.handle);

            match handle {
                Some(handle) => schedule
                    .remove_link(slotframe, handle, listener)
                    .map(Some),
                None => Ok(None),
            }
        })
    }

    /// Look for the link at `timeslot` and `channel_offset` of a slotframe.
    pub fn get_link_by_timeslot(
        &self,
        slotframe: u16,
        timeslot: u16,
        channel_offset: u16,
    ) -> Option<&Link> {
        self.get_slotframe(slotframe)?
            .link_by_timeslot(timeslot, channel_offset)
    }

    /// Look for the link with `handle` in any slotframe.
    pub fn get_link(&self, handle: LinkHandle) -> Option<&Link> {
        if !self.readable() {
            return None;
        }

        self.slotframes
            .iter()
            .flat_map(|sf| sf.links.iter())
            .find(|l| l.handle == handle)
    }

    /// Replace the schedule with the 6TiSCH minimal schedule: slotframe 0 of
    /// `SCHEDULE_DEFAULT_LENGTH` timeslots with a single shared advertising
    /// link at timeslot 0, channel offset 0.
    pub fn create_minimal(&mut self, listener: &mut impl LinkListener) -> Result<(), ScheduleError> {
        self.remove_all_slotframes(listener)?;
        self.add_slotframe(0, SCHEDULE_DEFAULT_LENGTH)?;
        self.add_link(
            0,
            LinkConfig {
                options: TschLinkOption::Tx
                    | TschLinkOption::Rx
                    | TschLinkOption::Shared
                    | TschLinkOption::TimeKeeping,
                link_type: LinkType::Advertising,
                address: Address::BROADCAST,
                timeslot: 0,
                channel_offset: 0,
            },
            true,
            listener,
        )?;
        Ok(())
    }

    fn forget_link(&mut self, link: &Link, listener: &mut impl LinkListener) {
        if self.current_link == Some(link.handle) {
            self.current_link = None;
        }
        listener.link_removed(link);
    }
}

impl<const SLOTFRAMES: usize, const LINKS: usize> core::fmt::Debug
    for Schedule<SLOTFRAMES, LINKS>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "TSCH schedule:")?;

        for sf in self.slotframes.iter() {
            writeln!(f, "  Slotframe {}, size {}", sf.handle, sf.size)?;
            for link in sf.links.iter() {
                writeln!(
                    f,
                    "    Link {}: options {:?}, type {:?}, ts {}, ch {}, address {}",
                    link.handle,
                    link.options,
                    link.link_type,
                    link.timeslot,
                    link.channel_offset,
                    link.address
                )?;
            }
        }

        Ok(())
    }
}
