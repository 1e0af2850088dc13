//! Error types for structural maintenance of the runtime.
//!
//! The hot path of this runtime does not raise errors: scheduling, joins,
//! and lookups are infallible by construction. Failures can only surface at
//! the **structural boundary**: the quiescent phase in which deferred
//! creates and destroys are folded into component columns. This module
//! declares the small, focused error types for that boundary.
//!
//! ## Goals
//! * **Specificity:** each type models a single failure mode (running a
//!   structural update while tasks are still in flight, or two queued
//!   creations colliding on one entity id).
//! * **Ergonomics:** all errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into the
//!   aggregate [`UpdateError`].
//! * **Actionability:** structured fields (outstanding task count,
//!   offending entity id) make log lines useful without a reproduction.
//!
//! ## Typical flow
//! Component-level maintenance returns [`CreateCollisionError`]; the
//! manager's [`update`](crate::engine::manager::Manager::update) bubbles it
//! into [`UpdateError`] with `?`, after first refusing to run at all while
//! the pool is busy.

use std::fmt;

use crate::engine::types::EntityId;

/// Returned when a structural update is attempted while scheduled tasks are
/// still outstanding.
///
/// Columns may be relocated and re-sorted during an update, which would
/// invalidate the positional ranges held by in-flight tasks. The caller
/// must drain the pool first.
///
/// ### Fields
/// * `outstanding` — number of tasks not yet done when the update was
///   refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotQuiescentError {
    /// Tasks still waiting or in progress on the pool.
    pub outstanding: usize,
}

impl fmt::Display for NotQuiescentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "structural update refused: {} task(s) still outstanding",
            self.outstanding
        )
    }
}

impl std::error::Error for NotQuiescentError {}

/// Returned when a queued creation targets an entity id that is already
/// present in the column.
///
/// The column keeps the pre-existing entry and drops the colliding one, so
/// the sorted/unique invariant always holds after the update; this error
/// reports that data was discarded.
///
/// ### Fields
/// * `id` — the first colliding entity id encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateCollisionError {
    /// First entity id whose queued creation was dropped.
    pub id: EntityId,
}

impl fmt::Display for CreateCollisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {} already present; queued creation dropped", self.id)
    }
}

impl std::error::Error for CreateCollisionError {}

/// Aggregate error for [`Manager::update`](crate::engine::manager::Manager::update).
///
/// `From<T>` conversions are implemented for the low-level errors so the
/// manager can write `?` and still return a single expressive type.
///
/// Note that a `Collision` is reported *after* all queued mutations have
/// been applied; the columns are left sorted and duplicate-free, minus the
/// dropped creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// The pool still had outstanding tasks; nothing was modified.
    NotQuiescent(NotQuiescentError),

    /// A queued creation collided with an existing entity id.
    Collision(CreateCollisionError),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::NotQuiescent(e) => write!(f, "{e}"),
            UpdateError::Collision(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for UpdateError {}

impl From<NotQuiescentError> for UpdateError {
    fn from(e: NotQuiescentError) -> Self {
        UpdateError::NotQuiescent(e)
    }
}

impl From<CreateCollisionError> for UpdateError {
    fn from(e: CreateCollisionError) -> Self {
        UpdateError::Collision(e)
    }
}
