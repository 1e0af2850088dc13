//! Sorted per-entity value columns with deferred structural mutation.
//!
//! A [`Component`] stores `(entity id, value)` slots **strictly sorted
//! ascending by id with no duplicates**. The sorted/unique invariant holds
//! across [`Component::update`] boundaries only; between updates, pending
//! insertions and removals accumulate in deferred queues.
//!
//! ## Shared column, disjoint mutation
//!
//! Values live in [`UnsafeCell`]s inside a column behind an [`Arc`], so
//! scheduled tasks can mutate **disjoint positional ranges** through a
//! shared slice while the submitting thread keeps reading ids. The flow
//! scheduler guarantees disjointness: tasks from a single submission cover
//! disjoint ranges, and later submissions over overlapping ranges carry the
//! earlier task as a predecessor (recorded in the per-column interval map
//! of waiting flags). The column's *structure* (length, allocation, order)
//! is only ever changed by `update`, which requires quiescence.
//!
//! ## Lookup cache
//!
//! Point lookups go through a small direct-mapped cache of
//! [`CACHE_SIZE`](crate::engine::types::CACHE_SIZE) entries, hashed from
//! the entity id. Misses fall back to binary search and fill the slot with
//! the result (present or not), so repeated misses are also cheap. The
//! cache is reset to sentinels by `update`. The sentinel uses the reserved
//! id `0`, so lookups of id `0` always resolve to `None`.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::engine::error::CreateCollisionError;
use crate::engine::interval::IntervalMap;
use crate::engine::types::{cache_slot, EntityId, TaskId, CACHE_SIZE};

/// One column entry: the owning entity's id and the value cell.
pub(crate) type Slot<T> = (EntityId, UnsafeCell<T>);

/// Backing storage of a component, shared with in-flight tasks.
pub(crate) struct Column<T> {
    slots: UnsafeCell<Vec<Slot<T>>>,
}

// SAFETY: tasks only mutate values through the per-slot `UnsafeCell`s, on
// positional ranges the scheduler keeps disjoint; the vector structure is
// only modified during quiescence.
unsafe impl<T: Send> Sync for Column<T> {}

impl<T> Column<T> {
    fn new() -> Self {
        Self {
            slots: UnsafeCell::new(Vec::new()),
        }
    }

    /// Shared view of the slots.
    ///
    /// Sound while no structural update is in flight; value cells may be
    /// concurrently written by tasks on other ranges.
    #[inline]
    pub(crate) fn slots(&self) -> &[Slot<T>] {
        // SAFETY: structure is stable outside `update`, which requires
        // quiescence.
        unsafe { &*self.slots.get() }
    }

    /// Exclusive view of the slot vector. Requires quiescence.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn slots_mut(&self) -> &mut Vec<Slot<T>> {
        // SAFETY: callers hold `&mut Component` and quiescence, so no task
        // and no other reference observes the column.
        unsafe { &mut *self.slots.get() }
    }
}

#[derive(Clone, Copy)]
struct CacheEntry {
    id: EntityId,
    position: Option<u32>,
}

impl CacheEntry {
    const EMPTY: Self = Self {
        id: 0,
        position: None,
    };
}

/// Sorted `(entity id, value)` column with deferred create/destroy queues.
pub struct Component<T> {
    pub(crate) column: Arc<Column<T>>,
    /// Task ids that last touched each positional range of the column.
    pub(crate) waiting: IntervalMap<usize, TaskId>,
    create_queue: Vec<(EntityId, T)>,
    destroy_queue: Vec<EntityId>,
    cache: [Cell<CacheEntry>; CACHE_SIZE],
}

impl<T> Default for Component<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Component<T> {
    /// Creates an empty component.
    pub fn new() -> Self {
        Self {
            column: Arc::new(Column::new()),
            waiting: IntervalMap::new(),
            create_queue: Vec::new(),
            destroy_queue: Vec::new(),
            cache: std::array::from_fn(|_| Cell::new(CacheEntry::EMPTY)),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.column.slots().len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.column.slots().is_empty()
    }

    /// Queues `value` for insertion under `id` at the next update.
    pub fn create(&mut self, id: EntityId, value: T) {
        self.create_queue.push((id, value));
    }

    /// Queues the entry under `id` for removal at the next update.
    ///
    /// Destroying an absent id is a no-op.
    pub fn destroy(&mut self, id: EntityId) {
        self.destroy_queue.push(id);
    }

    /// Looks up the value stored under `id`.
    ///
    /// Consults the direct-mapped cache first; a miss binary-searches the
    /// column and fills the cache with the outcome. Must not be called for
    /// a position currently covered by an in-flight task.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.lookup(id)
            // SAFETY: no in-flight task touches this position (caller
            // contract), and `&self` prevents structural mutation.
            .map(|position| unsafe { &*self.column.slots()[position].1.get() })
    }

    /// Mutable lookup of the value stored under `id`.
    ///
    /// Same caching and contract as [`Component::get`].
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.lookup(id)
            // SAFETY: as in `get`, plus `&mut self` makes this the only
            // live reference handed out by the component.
            .map(|position| unsafe { &mut *self.column.slots()[position].1.get() })
    }

    fn lookup(&self, id: EntityId) -> Option<usize> {
        let slot = &self.cache[cache_slot(id)];
        let entry = slot.get();
        if entry.id == id {
            return entry.position.map(|p| p as usize);
        }
        let position = self
            .column
            .slots()
            .binary_search_by_key(&id, |s| s.0)
            .ok();
        slot.set(CacheEntry {
            id,
            position: position.map(|p| p as u32),
        });
        position
    }

    /// Returns `true` if an entry is stored under `id`.
    pub fn contains(&self, id: EntityId) -> bool {
        self.column
            .slots()
            .binary_search_by_key(&id, |s| s.0)
            .is_ok()
    }

    /// Iterates `(id, value)` pairs in ascending id order.
    ///
    /// Must only be used while no task is in flight on this component.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (EntityId, &'a T)> + 'a {
        self.column
            .slots()
            .iter()
            // SAFETY: quiescence on this component (caller contract).
            .map(|slot| (slot.0, unsafe { &*slot.1.get() }))
    }

    /// Clears the waiting-flag interval map.
    pub(crate) fn clear_waiting(&mut self) {
        self.waiting.clear();
    }
}

impl<T: Send> Component<T> {
    /// Folds the deferred queues into the column.
    ///
    /// Destroys drain first (so a destroy + create of the same id within
    /// one window recreates the entity), then queued creations are
    /// appended and the column is re-sorted. A queued creation whose id is
    /// already present is dropped (the pre-existing entry wins) and the
    /// first such collision is reported after all mutations have been
    /// applied. The lookup cache is reset to sentinels.
    ///
    /// Precondition: no task is in flight on this component. The column may
    /// be reallocated and reordered, which would invalidate the positional
    /// ranges held by in-flight tasks.
    pub fn update(&mut self) -> Result<(), CreateCollisionError> {
        let slots = self.column.slots_mut();

        self.destroy_queue.sort_unstable_by(|a, b| b.cmp(a));
        self.destroy_queue.dedup();
        // Descending order keeps every later (smaller) target inside the
        // still-sorted prefix, so the binary search stays valid across
        // swap-removes.
        for &id in &self.destroy_queue {
            if let Ok(position) = slots.binary_search_by_key(&id, |s| s.0) {
                slots.swap_remove(position);
            }
        }
        self.destroy_queue.clear();

        slots.extend(
            self.create_queue
                .drain(..)
                .map(|(id, value)| (id, UnsafeCell::new(value))),
        );
        // Stable sort: pre-existing entries precede colliding appends.
        slots.par_sort_by_key(|slot| slot.0);

        let mut first_collision = None;
        slots.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                first_collision.get_or_insert(later.0);
                true
            } else {
                false
            }
        });

        for slot in &self.cache {
            slot.set(CacheEntry::EMPTY);
        }

        match first_collision {
            Some(id) => Err(CreateCollisionError { id }),
            None => Ok(()),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for slot in self.column.slots() {
            // SAFETY: dumps are only meaningful while quiescent.
            let value = unsafe { &*slot.1.get() };
            write!(f, "({} {})", slot.0, value)?;
        }
        write!(f, "]")
    }
}
