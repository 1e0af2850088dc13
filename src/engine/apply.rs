//! Data-parallel apply over the join of one to three component columns.
//!
//! An apply partitions the target columns into **positional blocks**,
//! derives the minimal predecessor set for each block from the columns'
//! waiting-flag interval maps, submits one task per block to the flow pool,
//! and records the new task ids back into the maps over the ranges each
//! task will mutate. Workers then execute the user function over the
//! assigned sub-ranges as dependencies allow.
//!
//! ## Block partitioning
//!
//! A single-column apply cuts the column into contiguous blocks of
//! [`BLOCK_SIZE`] entries. Multi-column applies cut in **entity-id space**
//! instead: breakpoints are the mean of ids sampled at proportional
//! positions in each column, and each column is then binary-searched for
//! the first entry at or past the breakpoint. Cutting every column at the
//! same id guarantees matching ids always land in the same piece, without a
//! merge pre-scan.
//!
//! ## Dependency derivation
//!
//! Blocks of one apply are disjoint per column, so they never depend on
//! each other. Blocks of later applies that overlap a range some earlier
//! task touches pick that task up as a predecessor through the interval
//! map; stale done predecessors are harmless because eligibility
//! short-circuits on done.
//!
//! ## Payload variants
//!
//! Every arity has a `_with` variant carrying a shared payload handed to
//! the user function by reference. The payload is read-only by contract;
//! the runtime does not synchronize writes through it.

use std::sync::Arc;

use crate::engine::component::{Component, Slot};
use crate::engine::manager::{ComponentKey, Manager, Registered};
use crate::engine::pool::FlowPool;
use crate::engine::types::{EntityId, TaskId, BLOCK_SIZE};
use crate::profiling::profiler;

type Visit1<T> = Arc<dyn Fn(&mut T) + Send + Sync>;
type Visit2<T, U> = Arc<dyn Fn(&mut T, &mut U) + Send + Sync>;
type Visit3<T, U, V> = Arc<dyn Fn(&mut T, &mut U, &mut V) + Send + Sync>;

/// A positional range of one column claimed by a freshly submitted task.
type SetRecord = (usize, usize, TaskId);

impl Manager {
    /// Schedules `f` over every value of one component.
    pub fn apply<T, F>(&mut self, key: ComponentKey<T>, f: F)
    where
        T: Send + 'static,
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply");
        self.apply1_impl(key, Arc::new(f));
    }

    /// Schedules `f` with a shared read-only payload over one component.
    pub fn apply_with<T, P, F>(&mut self, key: ComponentKey<T>, payload: P, f: F)
    where
        T: Send + 'static,
        P: Send + Sync + 'static,
        F: Fn(&mut T, &P) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply");
        let payload = Arc::new(payload);
        self.apply1_impl(key, Arc::new(move |value: &mut T| f(value, &payload)));
    }

    /// Schedules `f` over the id-join of two components.
    ///
    /// `f` runs only for entities present in both; cursors advance past
    /// unmatched ids.
    pub fn apply2<T, U, F>(&mut self, a: ComponentKey<T>, b: ComponentKey<U>, f: F)
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(&mut T, &mut U) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply2");
        self.apply2_impl(a, b, Arc::new(f));
    }

    /// Schedules `f` with a shared read-only payload over a two-way join.
    pub fn apply2_with<T, U, P, F>(
        &mut self,
        a: ComponentKey<T>,
        b: ComponentKey<U>,
        payload: P,
        f: F,
    ) where
        T: Send + 'static,
        U: Send + 'static,
        P: Send + Sync + 'static,
        F: Fn(&mut T, &mut U, &P) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply2");
        let payload = Arc::new(payload);
        self.apply2_impl(
            a,
            b,
            Arc::new(move |x: &mut T, y: &mut U| f(x, y, &payload)),
        );
    }

    /// Schedules `f` over the id-join of three components.
    pub fn apply3<T, U, V, F>(
        &mut self,
        a: ComponentKey<T>,
        b: ComponentKey<U>,
        c: ComponentKey<V>,
        f: F,
    ) where
        T: Send + 'static,
        U: Send + 'static,
        V: Send + 'static,
        F: Fn(&mut T, &mut U, &mut V) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply3");
        self.apply3_impl(a, b, c, Arc::new(f));
    }

    /// Schedules `f` with a shared read-only payload over a three-way join.
    pub fn apply3_with<T, U, V, P, F>(
        &mut self,
        a: ComponentKey<T>,
        b: ComponentKey<U>,
        c: ComponentKey<V>,
        payload: P,
        f: F,
    ) where
        T: Send + 'static,
        U: Send + 'static,
        V: Send + 'static,
        P: Send + Sync + 'static,
        F: Fn(&mut T, &mut U, &mut V, &P) + Send + Sync + 'static,
    {
        let _g = profiler::span("Manager::apply3");
        let payload = Arc::new(payload);
        self.apply3_impl(
            a,
            b,
            c,
            Arc::new(move |x: &mut T, y: &mut U, z: &mut V| f(x, y, z, &payload)),
        );
    }

    fn apply1_impl<T: Send + 'static>(&mut self, key: ComponentKey<T>, visit: Visit1<T>) {
        let records = submit_blocks(&self.pool, slot_ref::<T>(&self.registry, key.index), visit);
        record_claims(slot_mut::<T>(&mut self.registry, key.index), records);
    }

    fn apply2_impl<T, U>(&mut self, key_a: ComponentKey<T>, key_b: ComponentKey<U>, visit: Visit2<T, U>)
    where
        T: Send + 'static,
        U: Send + 'static,
    {
        assert!(key_a.index != key_b.index, "apply requires distinct components");
        let (records_a, records_b) = submit_join2(
            &self.pool,
            slot_ref::<T>(&self.registry, key_a.index),
            slot_ref::<U>(&self.registry, key_b.index),
            visit,
        );
        record_claims(slot_mut::<T>(&mut self.registry, key_a.index), records_a);
        record_claims(slot_mut::<U>(&mut self.registry, key_b.index), records_b);
    }

    fn apply3_impl<T, U, V>(
        &mut self,
        key_a: ComponentKey<T>,
        key_b: ComponentKey<U>,
        key_c: ComponentKey<V>,
        visit: Visit3<T, U, V>,
    ) where
        T: Send + 'static,
        U: Send + 'static,
        V: Send + 'static,
    {
        assert!(
            key_a.index != key_b.index && key_a.index != key_c.index && key_b.index != key_c.index,
            "apply requires distinct components"
        );
        let (records_a, records_b, records_c) = submit_join3(
            &self.pool,
            slot_ref::<T>(&self.registry, key_a.index),
            slot_ref::<U>(&self.registry, key_b.index),
            slot_ref::<V>(&self.registry, key_c.index),
            visit,
        );
        record_claims(slot_mut::<T>(&mut self.registry, key_a.index), records_a);
        record_claims(slot_mut::<U>(&mut self.registry, key_b.index), records_b);
        record_claims(slot_mut::<V>(&mut self.registry, key_c.index), records_c);
    }
}

fn slot_ref<T: Send + 'static>(registry: &[Registered], index: usize) -> &Component<T> {
    registry[index]
        .slot
        .as_any()
        .downcast_ref()
        .expect("component key used with a different value type")
}

fn slot_mut<T: Send + 'static>(registry: &mut [Registered], index: usize) -> &mut Component<T> {
    registry[index]
        .slot
        .as_any_mut()
        .downcast_mut()
        .expect("component key used with a different value type")
}

/// Records freshly claimed ranges into a column's waiting flags.
///
/// Ranges claimed by one apply are disjoint, so recording order within the
/// batch does not matter.
fn record_claims<T>(component: &mut Component<T>, records: Vec<SetRecord>) {
    for (lo, hi, tid) in records {
        component.waiting.set(lo, hi, tid);
    }
}

/// Single-column apply: contiguous blocks of `BLOCK_SIZE` entries.
fn submit_blocks<T: Send + 'static>(
    pool: &FlowPool,
    component: &Component<T>,
    visit: Visit1<T>,
) -> Vec<SetRecord> {
    let len = component.column.slots().len();
    let mut records = Vec::with_capacity(len.div_ceil(BLOCK_SIZE));
    let mut lo = 0;
    while lo < len {
        let hi = (lo + BLOCK_SIZE).min(len);
        let preds: Vec<TaskId> = component.waiting.overlapping(lo, hi).copied().collect();
        let column = Arc::clone(&component.column);
        let visit = Arc::clone(&visit);
        let tid = pool.push_task(
            move || {
                for slot in &column.slots()[lo..hi] {
                    // SAFETY: the scheduler never lets two in-flight tasks
                    // cover the same positions without ordering them.
                    (*visit)(unsafe { &mut *slot.1.get() });
                }
            },
            &preds,
        );
        records.push((lo, hi, tid));
        lo = hi;
    }
    records
}

/// Two-column apply: pieces cut at id-space midpoints.
fn submit_join2<T, U>(
    pool: &FlowPool,
    a: &Component<T>,
    b: &Component<U>,
    visit: Visit2<T, U>,
) -> (Vec<SetRecord>, Vec<SetRecord>)
where
    T: Send + 'static,
    U: Send + 'static,
{
    let a_slots = a.column.slots();
    let b_slots = b.column.slots();
    let pieces = (a_slots.len() + b_slots.len()).div_ceil(2 * BLOCK_SIZE).max(1);
    let step_a = a_slots.len() / pieces;
    let step_b = b_slots.len() / pieces;

    let mut bounds_a = Vec::with_capacity(pieces + 1);
    let mut bounds_b = Vec::with_capacity(pieces + 1);
    bounds_a.push(0);
    bounds_b.push(0);
    for i in 1..pieces {
        let cut = mean_id(&[
            sample_id(a_slots, i * step_a),
            sample_id(b_slots, i * step_b),
        ]);
        bounds_a.push(lower_bound(a_slots, cut));
        bounds_b.push(lower_bound(b_slots, cut));
    }
    bounds_a.push(a_slots.len());
    bounds_b.push(b_slots.len());

    let mut records_a = Vec::new();
    let mut records_b = Vec::new();
    for p in 0..pieces {
        let (a_lo, a_hi) = (bounds_a[p], bounds_a[p + 1]);
        let (b_lo, b_hi) = (bounds_b[p], bounds_b[p + 1]);
        if a_lo == a_hi && b_lo == b_hi {
            continue;
        }
        let mut preds: Vec<TaskId> = a.waiting.overlapping(a_lo, a_hi).copied().collect();
        preds.extend(b.waiting.overlapping(b_lo, b_hi).copied());
        preds.sort_unstable();
        preds.dedup();

        let column_a = Arc::clone(&a.column);
        let column_b = Arc::clone(&b.column);
        let visit = Arc::clone(&visit);
        let tid = pool.push_task(
            move || {
                join2(
                    &column_a.slots()[a_lo..a_hi],
                    &column_b.slots()[b_lo..b_hi],
                    &*visit,
                );
            },
            &preds,
        );
        if a_lo < a_hi {
            records_a.push((a_lo, a_hi, tid));
        }
        if b_lo < b_hi {
            records_b.push((b_lo, b_hi, tid));
        }
    }
    (records_a, records_b)
}

/// Three-column apply: pieces cut at three-way id means.
fn submit_join3<T, U, V>(
    pool: &FlowPool,
    a: &Component<T>,
    b: &Component<U>,
    c: &Component<V>,
    visit: Visit3<T, U, V>,
) -> (Vec<SetRecord>, Vec<SetRecord>, Vec<SetRecord>)
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
{
    let a_slots = a.column.slots();
    let b_slots = b.column.slots();
    let c_slots = c.column.slots();
    let pieces = (a_slots.len() + b_slots.len() + c_slots.len())
        .div_ceil(3 * BLOCK_SIZE)
        .max(1);
    let step_a = a_slots.len() / pieces;
    let step_b = b_slots.len() / pieces;
    let step_c = c_slots.len() / pieces;

    let mut bounds_a = Vec::with_capacity(pieces + 1);
    let mut bounds_b = Vec::with_capacity(pieces + 1);
    let mut bounds_c = Vec::with_capacity(pieces + 1);
    bounds_a.push(0);
    bounds_b.push(0);
    bounds_c.push(0);
    for i in 1..pieces {
        let cut = mean_id(&[
            sample_id(a_slots, i * step_a),
            sample_id(b_slots, i * step_b),
            sample_id(c_slots, i * step_c),
        ]);
        bounds_a.push(lower_bound(a_slots, cut));
        bounds_b.push(lower_bound(b_slots, cut));
        bounds_c.push(lower_bound(c_slots, cut));
    }
    bounds_a.push(a_slots.len());
    bounds_b.push(b_slots.len());
    bounds_c.push(c_slots.len());

    let mut records_a = Vec::new();
    let mut records_b = Vec::new();
    let mut records_c = Vec::new();
    for p in 0..pieces {
        let (a_lo, a_hi) = (bounds_a[p], bounds_a[p + 1]);
        let (b_lo, b_hi) = (bounds_b[p], bounds_b[p + 1]);
        let (c_lo, c_hi) = (bounds_c[p], bounds_c[p + 1]);
        if a_lo == a_hi && b_lo == b_hi && c_lo == c_hi {
            continue;
        }
        let mut preds: Vec<TaskId> = a.waiting.overlapping(a_lo, a_hi).copied().collect();
        preds.extend(b.waiting.overlapping(b_lo, b_hi).copied());
        preds.extend(c.waiting.overlapping(c_lo, c_hi).copied());
        preds.sort_unstable();
        preds.dedup();

        let column_a = Arc::clone(&a.column);
        let column_b = Arc::clone(&b.column);
        let column_c = Arc::clone(&c.column);
        let visit = Arc::clone(&visit);
        let tid = pool.push_task(
            move || {
                join3(
                    &column_a.slots()[a_lo..a_hi],
                    &column_b.slots()[b_lo..b_hi],
                    &column_c.slots()[c_lo..c_hi],
                    &*visit,
                );
            },
            &preds,
        );
        if a_lo < a_hi {
            records_a.push((a_lo, a_hi, tid));
        }
        if b_lo < b_hi {
            records_b.push((b_lo, b_hi, tid));
        }
        if c_lo < c_hi {
            records_c.push((c_lo, c_hi, tid));
        }
    }
    (records_a, records_b, records_c)
}

/// Id at `index`, saturating into the slice; `None` for an empty column.
fn sample_id<T>(slots: &[Slot<T>], index: usize) -> Option<EntityId> {
    if slots.is_empty() {
        None
    } else {
        Some(slots[index.min(slots.len() - 1)].0)
    }
}

/// Mean of the present id samples; empty columns contribute nothing.
fn mean_id(samples: &[Option<EntityId>]) -> EntityId {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for sample in samples.iter().flatten() {
        sum += u64::from(*sample);
        count += 1;
    }
    if count == 0 {
        0
    } else {
        (sum / count) as EntityId
    }
}

/// First position whose id is not below `cut`.
fn lower_bound<T>(slots: &[Slot<T>], cut: EntityId) -> usize {
    slots.partition_point(|slot| slot.0 < cut)
}

/// Two-cursor intersection join over sorted sub-ranges.
fn join2<T, U>(a: &[Slot<T>], b: &[Slot<U>], visit: &dyn Fn(&mut T, &mut U)) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (id_a, id_b) = (a[i].0, b[j].0);
        if id_a == id_b {
            // SAFETY: this task is the sole in-flight owner of both ranges.
            visit(unsafe { &mut *a[i].1.get() }, unsafe { &mut *b[j].1.get() });
            i += 1;
            j += 1;
        } else if id_a < id_b {
            i += 1;
        } else {
            j += 1;
        }
    }
}

/// Three-cursor intersection join; advances whichever cursor holds the
/// minimum id.
fn join3<T, U, V>(
    a: &[Slot<T>],
    b: &[Slot<U>],
    c: &[Slot<V>],
    visit: &dyn Fn(&mut T, &mut U, &mut V),
) {
    let (mut i, mut j, mut k) = (0, 0, 0);
    while i < a.len() && j < b.len() && k < c.len() {
        let (id_a, id_b, id_c) = (a[i].0, b[j].0, c[k].0);
        if id_a == id_b && id_b == id_c {
            // SAFETY: this task is the sole in-flight owner of all three
            // ranges.
            visit(
                unsafe { &mut *a[i].1.get() },
                unsafe { &mut *b[j].1.get() },
                unsafe { &mut *c[k].1.get() },
            );
            i += 1;
            j += 1;
            k += 1;
        } else {
            let min = id_a.min(id_b).min(id_c);
            if id_a == min {
                i += 1;
            } else if id_b == min {
                j += 1;
            } else {
                k += 1;
            }
        }
    }
}
