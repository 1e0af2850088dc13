//! # flowecs
//!
//! Parallel Entity-Component-System runtime built around a
//! **dependency-aware task scheduler** and a **data-parallel apply engine**.
//!
//! ## Design Goals
//! - Sorted, dense component columns for cache efficiency
//! - Automatic derivation of the minimal predecessor set for each task
//! - True parallel execution with one coarse scheduler lock
//! - Deferred structural mutation applied at explicit quiescence points
//!
//! ## Model
//! Entities are opaque integer ids shared across components. A component
//! stores `(id, value)` pairs sorted by id. [`Manager::apply`] and its
//! two- and three-component variants partition the target columns into
//! positional blocks, queue one task per block on the flow pool, and use a
//! per-column interval map to make any task that overlaps an earlier task's
//! range wait for it. [`Manager::wait`] drains the pool and resets
//! scheduler state; [`Manager::update`] folds deferred creates and
//! destroys into the columns while quiescent.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;
pub mod profiling;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::component::Component;

pub use engine::error::{CreateCollisionError, NotQuiescentError, UpdateError};

pub use engine::interval::IntervalMap;

pub use engine::manager::{ComponentKey, Manager};

pub use engine::pool::{FlowPool, TaskStatus};

pub use engine::types::{EntityId, TaskId, BLOCK_SIZE, CACHE_SIZE};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use flowecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Component, ComponentKey, EntityId, FlowPool, Manager, TaskId};
}
