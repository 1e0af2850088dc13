//! Core identifiers and compile-time layout constants.
//!
//! This module defines the **fundamental types and tuning constants** shared
//! across the runtime: entity identities, task identities, and the two
//! compile-time knobs that shape parallel execution (work-block length and
//! lookup-cache geometry).
//!
//! ## Entity identity
//!
//! Entities are plain `u32` values shared across components. The value `0`
//! is reserved and means "no entity"; the allocator in
//! [`crate::engine::manager::Manager`] never hands it out.
//!
//! ## Task identity
//!
//! Tasks scheduled on the flow pool carry dense `u32` ids assigned in
//! submission order. Ids are only unique between quiescence points: a
//! successful wait resets the counter, which bounds growth well below the
//! 32-bit limit for any realistic workload.
//!
//! ## Tuning constants
//!
//! - [`BLOCK_SIZE`] — the number of column entries one scheduled task
//!   covers. Larger blocks amortize scheduling cost; smaller blocks expose
//!   more parallelism.
//! - [`CACHE_SIZE`] — entries in each component's direct-mapped lookup
//!   cache. Must be a power of two so the hash can be masked.
//!
//! Both are validated with static assertions below.

/// Opaque identifier shared by all components of one entity.
///
/// `0` is reserved and means "no entity".
pub type EntityId = u32;

/// Dense identifier of one scheduled unit on the flow pool.
///
/// Assigned in submission order, valid until the next quiescence reset.
pub type TaskId = u32;

/// Number of column entries covered by a single scheduled task.
pub const BLOCK_SIZE: usize = 256;

/// Entries in each component's direct-mapped lookup cache (power of two).
pub const CACHE_SIZE: usize = 16;

/// Multiplier used to hash entity ids into cache slots.
pub const CACHE_HASH: u32 = 0xf9b2_5d65;

/// Mask selecting a cache slot from a hashed entity id.
pub const CACHE_MASK: u32 = (CACHE_SIZE as u32) - 1;

const _: [(); 1] = [(); CACHE_SIZE.is_power_of_two() as usize];
const _: [(); 1] = [(); (BLOCK_SIZE > 0) as usize];

/// Returns the cache slot for an entity id.
#[inline]
pub const fn cache_slot(id: EntityId) -> usize {
    ((id.wrapping_mul(CACHE_HASH) >> 8) & CACHE_MASK) as usize
}
