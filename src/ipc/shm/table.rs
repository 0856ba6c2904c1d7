/*!
 * Shared Slot Table
 * Fixed-capacity pid table shared by the supervisor and its children
 *
 * Every read or write of a slot happens while the in-segment semaphore is
 * held. Scans are first-fit from index 0, so slot reuse is deterministic.
 */

use super::segment::ShmSegment;
use super::semaphore::{Semaphore, SemaphoreGuard};
use super::types::{Slot, TableLayout};
use crate::core::errors::{ResourceError, ResourceResult};
use crate::core::limits::{EMPTY_SLOT, MAX_SLOTS, PENDING_SLOT};
use crate::core::types::{Pid, SlotIndex};
use std::mem::size_of;
use std::ptr::{addr_of_mut, NonNull};
use tracing::{debug, info, warn};

/// Handle to the shared pid table
///
/// The creating handle owns the segment: destroying or dropping it destroys
/// the guard and removes the segment name. Handles obtained with
/// [`SlotTable::open`] only unmap.
pub struct SlotTable<const N: usize = MAX_SLOTS> {
    segment: ShmSegment,
    guard: Semaphore,
    layout: NonNull<TableLayout<N>>,
    owner: bool,
    torn_down: bool,
}

// SAFETY: the mapping stays valid for the lifetime of the handle and every
// access to the slots is serialised by the process-shared semaphore.
unsafe impl<const N: usize> Send for SlotTable<N> {}
unsafe impl<const N: usize> Sync for SlotTable<N> {}

impl<const N: usize> SlotTable<N> {
    /// Create the table in a fresh (or reinitialised) named segment
    pub fn create(name: &str) -> ResourceResult<Self> {
        if N == 0 {
            return Err(ResourceError::InvalidCapacity);
        }

        let segment = ShmSegment::create(name, size_of::<TableLayout<N>>())?;
        let layout = segment.base().cast::<TableLayout<N>>();

        // SAFETY: the mapping is at least size_of::<TableLayout<N>>() bytes
        // and page aligned; no other handle has initialised the guard yet.
        let guard = unsafe {
            let slots = addr_of_mut!((*layout.as_ptr()).slots).cast::<Pid>();
            for index in 0..N {
                slots.add(index).write_volatile(EMPTY_SLOT);
            }
            let raw = NonNull::new_unchecked(addr_of_mut!((*layout.as_ptr()).guard));
            Semaphore::init(raw, 1)
        };

        let guard = match guard {
            Ok(guard) => guard,
            Err(e) => {
                if let Err(unlink) = segment.unlink() {
                    warn!(error = %unlink, "Failed to remove segment after guard failure");
                }
                return Err(e);
            }
        };

        info!(segment = name, capacity = N, "Slot table created");

        Ok(Self {
            segment,
            guard,
            layout,
            owner: true,
            torn_down: false,
        })
    }

    /// Attach to a table created by another process
    pub fn open(name: &str) -> ResourceResult<Self> {
        if N == 0 {
            return Err(ResourceError::InvalidCapacity);
        }

        let segment = ShmSegment::open(name, size_of::<TableLayout<N>>())?;
        let layout = segment.base().cast::<TableLayout<N>>();

        // SAFETY: the creator initialised the guard before anyone could
        // learn the segment existed with the right size.
        let guard = unsafe {
            Semaphore::attach(NonNull::new_unchecked(addr_of_mut!(
                (*layout.as_ptr()).guard
            )))
        };

        debug!(segment = name, capacity = N, "Attached to slot table");

        Ok(Self {
            segment,
            guard,
            layout,
            owner: false,
            torn_down: false,
        })
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Store `pid` in the first empty slot
    ///
    /// Returns `None` when the table is full.
    pub fn reserve_slot(&self, pid: Pid) -> ResourceResult<Option<SlotIndex>> {
        if pid <= 0 {
            return Err(ResourceError::InvalidPid(pid));
        }
        let index = self.claim(pid)?;
        debug!(pid, slot = ?index, "Reserve slot");
        Ok(index)
    }

    /// Mark the first empty slot as pending, before a pid exists
    pub fn reserve_pending(&self) -> ResourceResult<Option<SlotIndex>> {
        let index = self.claim(PENDING_SLOT)?;
        debug!(slot = ?index, "Reserve pending slot");
        Ok(index)
    }

    /// Replace a pending placeholder with the real pid
    pub fn commit(&self, index: SlotIndex, pid: Pid) -> ResourceResult<()> {
        if pid <= 0 {
            return Err(ResourceError::InvalidPid(pid));
        }
        self.replace_pending(index, pid)?;
        debug!(pid, slot = index, "Committed pending slot");
        Ok(())
    }

    /// Give back a pending placeholder whose process was never created
    pub fn abandon(&self, index: SlotIndex) -> ResourceResult<()> {
        self.replace_pending(index, EMPTY_SLOT)?;
        debug!(slot = index, "Abandoned pending slot");
        Ok(())
    }

    /// Clear the first slot holding `pid`
    ///
    /// Unknown pids are a no-op and return `None`.
    pub fn release_slot(&self, pid: Pid) -> ResourceResult<Option<SlotIndex>> {
        if pid <= 0 {
            return Ok(None);
        }

        let lock = self.guard.acquire()?;
        let found = (0..N).find(|&index| self.read(&lock, index) == pid);
        if let Some(index) = found {
            self.write(&lock, index, EMPTY_SLOT);
        }
        drop(lock);

        match found {
            Some(index) => debug!(pid, slot = index, "Released slot"),
            None => debug!(pid, "Release ignored, pid not tracked"),
        }
        Ok(found)
    }

    /// Clear slot `index` only if it still holds `pid`
    ///
    /// Returns whether the slot was cleared.
    pub fn release_at(&self, index: SlotIndex, pid: Pid) -> ResourceResult<bool> {
        if index >= N {
            return Err(ResourceError::InvalidSlot { index });
        }
        if pid <= 0 {
            return Ok(false);
        }

        let lock = self.guard.acquire()?;
        let matches = self.read(&lock, index) == pid;
        if matches {
            self.write(&lock, index, EMPTY_SLOT);
        }
        drop(lock);

        debug!(pid, slot = index, released = matches, "Release at slot");
        Ok(matches)
    }

    /// Index of the slot holding `pid`
    pub fn position(&self, pid: Pid) -> ResourceResult<Option<SlotIndex>> {
        if pid <= 0 {
            return Ok(None);
        }
        let lock = self.guard.acquire()?;
        Ok((0..N).find(|&index| self.read(&lock, index) == pid))
    }

    /// Consistent copy of every slot
    pub fn snapshot(&self) -> ResourceResult<Vec<Slot>> {
        let lock = self.guard.acquire()?;
        Ok((0..N)
            .map(|index| Slot::from_raw(self.read(&lock, index)))
            .collect())
    }

    /// Occupied slots as `(index, pid)` pairs
    pub fn occupied(&self) -> ResourceResult<Vec<(SlotIndex, Pid)>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.pid().map(|pid| (index, pid)))
            .collect())
    }

    pub fn free_slots(&self) -> ResourceResult<usize> {
        Ok(self.snapshot()?.iter().filter(|slot| slot.is_empty()).count())
    }

    /// Destroy the guard, unmap, and remove the segment name
    ///
    /// Registered children are left running.
    pub fn destroy(mut self) -> ResourceResult<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> ResourceResult<()> {
        if !self.owner || self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        // SAFETY: the owner is going away; later users would have to
        // re-create the table.
        let destroyed = unsafe { self.guard.destroy() };
        let unlinked = self.segment.unlink();

        info!(segment = %self.segment.name(), "Slot table destroyed");
        destroyed.and(unlinked)
    }

    fn claim(&self, value: Pid) -> ResourceResult<Option<SlotIndex>> {
        let lock = self.guard.acquire()?;
        let free = (0..N).find(|&index| self.read(&lock, index) == EMPTY_SLOT);
        if let Some(index) = free {
            self.write(&lock, index, value);
        }
        Ok(free)
    }

    fn replace_pending(&self, index: SlotIndex, value: Pid) -> ResourceResult<()> {
        if index >= N {
            return Err(ResourceError::InvalidSlot { index });
        }
        let lock = self.guard.acquire()?;
        if self.read(&lock, index) != PENDING_SLOT {
            return Err(ResourceError::InvalidSlot { index });
        }
        self.write(&lock, index, value);
        Ok(())
    }

    fn slot_ptr(&self, index: SlotIndex) -> *mut Pid {
        debug_assert!(index < N);
        // SAFETY: index < N keeps the pointer inside the mapped slots array
        unsafe {
            addr_of_mut!((*self.layout.as_ptr()).slots)
                .cast::<Pid>()
                .add(index)
        }
    }

    fn read(&self, _lock: &SemaphoreGuard<'_>, index: SlotIndex) -> Pid {
        // SAFETY: in bounds, and the held guard excludes concurrent writers
        unsafe { self.slot_ptr(index).read_volatile() }
    }

    fn write(&self, _lock: &SemaphoreGuard<'_>, index: SlotIndex, value: Pid) {
        // SAFETY: in bounds, and the held guard excludes other accessors
        unsafe { self.slot_ptr(index).write_volatile(value) }
    }
}

impl<const N: usize> Drop for SlotTable<N> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(segment = %self.segment.name(), error = %e, "Slot table teardown failed");
        }
    }
}

impl<const N: usize> std::fmt::Debug for SlotTable<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("name", &self.segment.name())
            .field("capacity", &N)
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn unique_name() -> String {
        format!("/slots-{}", &Uuid::new_v4().simple().to_string()[..12])
    }

    #[test]
    fn test_create_starts_empty() {
        let table = SlotTable::<4>::create(&unique_name()).unwrap();
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.snapshot().unwrap(), vec![Slot::Empty; 4]);
        assert_eq!(table.free_slots().unwrap(), 4);
        table.destroy().unwrap();
    }

    #[test]
    fn test_reserve_first_fit_until_full() {
        let table = SlotTable::<3>::create(&unique_name()).unwrap();

        assert_eq!(table.reserve_slot(100).unwrap(), Some(0));
        assert_eq!(table.reserve_slot(200).unwrap(), Some(1));
        assert_eq!(table.reserve_slot(300).unwrap(), Some(2));
        assert_eq!(table.reserve_slot(400).unwrap(), None);

        assert_eq!(
            table.occupied().unwrap(),
            vec![(0, 100), (1, 200), (2, 300)]
        );
    }

    #[test]
    fn test_release_reuses_lowest_index() {
        let table = SlotTable::<3>::create(&unique_name()).unwrap();
        table.reserve_slot(100).unwrap();
        table.reserve_slot(200).unwrap();
        table.reserve_slot(300).unwrap();

        assert_eq!(table.release_slot(200).unwrap(), Some(1));
        assert_eq!(table.reserve_slot(500).unwrap(), Some(1));
        assert_eq!(table.position(500).unwrap(), Some(1));
    }

    #[test]
    fn test_release_unknown_pid_is_noop() {
        let table = SlotTable::<2>::create(&unique_name()).unwrap();
        table.reserve_slot(100).unwrap();
        let before = table.snapshot().unwrap();

        assert_eq!(table.release_slot(999).unwrap(), None);
        assert_eq!(table.release_slot(0).unwrap(), None);
        assert_eq!(table.release_slot(-1).unwrap(), None);
        assert_eq!(table.snapshot().unwrap(), before);
    }

    #[test]
    fn test_rejects_non_positive_pid() {
        let table = SlotTable::<2>::create(&unique_name()).unwrap();
        assert_eq!(table.reserve_slot(0), Err(ResourceError::InvalidPid(0)));
        assert_eq!(table.reserve_slot(-1), Err(ResourceError::InvalidPid(-1)));
        assert_eq!(table.free_slots().unwrap(), 2);
    }

    #[test]
    fn test_pending_commit_and_abandon() {
        let table = SlotTable::<2>::create(&unique_name()).unwrap();

        let first = table.reserve_pending().unwrap().unwrap();
        let second = table.reserve_pending().unwrap().unwrap();
        assert_eq!((first, second), (0, 1));
        assert_eq!(table.reserve_pending().unwrap(), None);
        assert_eq!(table.reserve_slot(10).unwrap(), None);

        // Pending slots are invisible to release-by-pid
        assert_eq!(table.release_slot(PENDING_SLOT).unwrap(), None);

        table.commit(first, 4321).unwrap();
        table.abandon(second).unwrap();
        assert_eq!(
            table.snapshot().unwrap(),
            vec![Slot::Occupied(4321), Slot::Empty]
        );

        // Only pending slots can be committed or abandoned
        assert_eq!(
            table.commit(first, 99),
            Err(ResourceError::InvalidSlot { index: 0 })
        );
        assert_eq!(
            table.abandon(1),
            Err(ResourceError::InvalidSlot { index: 1 })
        );
        assert_eq!(
            table.abandon(7),
            Err(ResourceError::InvalidSlot { index: 7 })
        );
    }

    #[test]
    fn test_release_at_only_clears_matching_slot() {
        let table = SlotTable::<3>::create(&unique_name()).unwrap();
        // A reused pid can appear twice; only the named slot is cleared
        table.reserve_slot(300).unwrap();
        table.reserve_slot(300).unwrap();
        table.reserve_slot(400).unwrap();

        assert!(table.release_at(1, 300).unwrap());
        assert_eq!(
            table.snapshot().unwrap(),
            vec![Slot::Occupied(300), Slot::Empty, Slot::Occupied(400)]
        );

        // Slot 2 holds a different pid now
        assert!(!table.release_at(2, 300).unwrap());
        assert!(!table.release_at(1, 300).unwrap());
        assert!(!table.release_at(0, 0).unwrap());
        assert_eq!(table.position(400).unwrap(), Some(2));
        assert_eq!(
            table.release_at(3, 300),
            Err(ResourceError::InvalidSlot { index: 3 })
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = SlotTable::<0>::create(&unique_name());
        assert!(matches!(result, Err(ResourceError::InvalidCapacity)));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let result = SlotTable::<4>::create("no-leading-slash");
        assert!(matches!(result, Err(ResourceError::InvalidName(_))));
    }

    #[test]
    fn test_open_sees_creator_writes() {
        let name = unique_name();
        let table = SlotTable::<4>::create(&name).unwrap();
        table.reserve_slot(77).unwrap();

        let attached = SlotTable::<4>::open(&name).unwrap();
        assert_eq!(attached.position(77).unwrap(), Some(0));
        assert_eq!(attached.reserve_slot(78).unwrap(), Some(1));
        drop(attached);

        // Dropping an attached handle leaves the segment in place
        assert_eq!(table.position(78).unwrap(), Some(1));
    }

    #[test]
    fn test_destroy_removes_segment() {
        let name = unique_name();
        let table = SlotTable::<4>::create(&name).unwrap();
        table.reserve_slot(1234).unwrap();
        table.destroy().unwrap();

        assert!(matches!(
            SlotTable::<4>::open(&name),
            Err(ResourceError::SegmentUnavailable { .. })
        ));

        let fresh = SlotTable::<4>::create(&name).unwrap();
        assert_eq!(fresh.snapshot().unwrap(), vec![Slot::Empty; 4]);
    }

    #[test]
    fn test_drop_removes_segment() {
        let name = unique_name();
        {
            let table = SlotTable::<2>::create(&name).unwrap();
            table.reserve_slot(5).unwrap();
        }
        assert!(SlotTable::<2>::open(&name).is_err());
    }
}
