use core::cell::Cell;

use critical_section::Mutex;

/// The context holding the schedule lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockOwner {
    /// The background task mutating the schedule.
    Background,
    /// The slot operation reading the schedule from the timing context.
    SlotOperation,
}

#[derive(Debug, Clone, Copy)]
struct LockState {
    owner: Option<LockOwner>,
    depth: u8,
}

/// A busy flag guarding the schedule.
///
/// The lock never blocks: [`ScheduleLock::try_lock`] fails when another
/// owner holds it, and the caller skips its work for that instant. The
/// current owner may take the lock again; it is released once every
/// [`ScheduleLock::try_lock`] has been matched by a [`ScheduleLock::unlock`].
pub struct ScheduleLock {
    state: Mutex<Cell<LockState>>,
}

impl Default for ScheduleLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleLock {
    /// Create an unlocked lock.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(LockState {
                owner: None,
                depth: 0,
            })),
        }
    }

    /// Try to take the lock for `owner`.
    pub fn try_lock(&self, owner: LockOwner) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();

            match state.owner {
                None => {
                    state.owner = Some(owner);
                    state.depth = 1;
                }
                Some(current) if current == owner => match state.depth.checked_add(1) {
                    Some(depth) => state.depth = depth,
                    None => return false,
                },
                Some(_) => return false,
            }

            cell.set(state);
            true
        })
    }

    /// Release one level of the lock held by `owner`.
    ///
    /// Releasing a lock held by another owner does nothing.
    pub fn unlock(&self, owner: LockOwner) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();

            if state.owner != Some(owner) {
                return;
            }

            state.depth = state.depth.saturating_sub(1);
            if state.depth == 0 {
                state.owner = None;
            }

            cell.set(state);
        })
    }

    /// Returns `true` when the lock is held.
    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    /// Returns `true` when the lock is held by an owner other than `owner`.
    pub fn is_locked_by_other(&self, owner: LockOwner) -> bool {
        matches!(self.owner(), Some(current) if current != owner)
    }

    /// The current owner of the lock.
    pub fn owner(&self) -> Option<LockOwner> {
        critical_section::with(|cs| self.state.borrow(cs).get().owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_for_the_same_owner() {
        let lock = ScheduleLock::new();
        assert!(!lock.is_locked());

        assert!(lock.try_lock(LockOwner::Background));
        assert!(lock.try_lock(LockOwner::Background));
        assert!(!lock.try_lock(LockOwner::SlotOperation));
        assert!(lock.is_locked_by_other(LockOwner::SlotOperation));
        assert!(!lock.is_locked_by_other(LockOwner::Background));

        lock.unlock(LockOwner::Background);
        assert!(lock.is_locked());
        lock.unlock(LockOwner::Background);
        assert!(!lock.is_locked());

        assert!(lock.try_lock(LockOwner::SlotOperation));
        assert_eq!(lock.owner(), Some(LockOwner::SlotOperation));
    }

    #[test]
    fn unlock_by_other_owner_is_ignored() {
        let lock = ScheduleLock::new();
        assert!(lock.try_lock(LockOwner::SlotOperation));
        lock.unlock(LockOwner::Background);
        assert_eq!(lock.owner(), Some(LockOwner::SlotOperation));
    }
}
