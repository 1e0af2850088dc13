//! Runtime manager: entity ids, component registry, and lifecycle.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::engine::component::Component;
use crate::engine::error::{CreateCollisionError, NotQuiescentError, UpdateError};
use crate::engine::pool::FlowPool;
use crate::engine::types::EntityId;
use crate::profiling::profiler;

/// Typed handle to a component enlisted with a [`Manager`].
///
/// Keys are cheap to copy and only meaningful for the manager that issued
/// them.
pub struct ComponentKey<T> {
    pub(crate) index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentKey<T> {}

impl<T> fmt::Debug for ComponentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentKey").field(&self.index).finish()
    }
}

/// Object-safe surface the registry needs from every component.
pub(crate) trait ComponentSlot: Any {
    fn update(&mut self) -> Result<(), CreateCollisionError>;
    fn queue_destroy(&mut self, id: EntityId);
    fn clear_waiting(&mut self);
    fn contains(&self, id: EntityId) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + 'static> ComponentSlot for Component<T> {
    fn update(&mut self) -> Result<(), CreateCollisionError> {
        Component::update(self)
    }

    fn queue_destroy(&mut self, id: EntityId) {
        self.destroy(id);
    }

    fn clear_waiting(&mut self) {
        Component::clear_waiting(self);
    }

    fn contains(&self, id: EntityId) -> bool {
        Component::contains(self, id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct Registered {
    pub(crate) name: String,
    pub(crate) slot: Box<dyn ComponentSlot>,
}

/// Owner of the flow pool, the component registry, and the entity-id
/// allocator.
///
/// Components are enlisted by value type and addressed through typed
/// [`ComponentKey`]s. Entity ids come from a monotonic counter starting at
/// 1 (`0` is reserved) with a recycled-id freelist that takes precedence.
pub struct Manager {
    pub(crate) pool: FlowPool,
    pub(crate) registry: Vec<Registered>,
    unused_ids: Vec<EntityId>,
    next_id: EntityId,
}

impl Manager {
    /// Creates a manager whose pool has one worker per hardware thread.
    pub fn new() -> Self {
        Self::with_pool(FlowPool::new())
    }

    /// Creates a manager with `n_threads` pool workers (0 clamps to 1).
    pub fn with_threads(n_threads: usize) -> Self {
        Self::with_pool(FlowPool::with_threads(n_threads))
    }

    fn with_pool(pool: FlowPool) -> Self {
        Self {
            pool,
            registry: Vec::new(),
            unused_ids: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocates an entity id: the most recently returned id if any,
    /// otherwise a fresh one.
    pub fn get_id(&mut self) -> EntityId {
        if let Some(id) = self.unused_ids.pop() {
            id
        } else {
            let id = self.next_id;
            self.next_id += 1;
            id
        }
    }

    /// Returns an id to the freelist for reuse.
    ///
    /// No liveness check is performed; returning an id still present in a
    /// component leads to id collisions on the next allocation.
    pub fn return_id(&mut self, id: EntityId) {
        self.unused_ids.push(id);
    }

    /// Registers an empty component for `T` under a debug name and returns
    /// its key.
    pub fn enlist<T: Send + 'static>(&mut self, name: &str) -> ComponentKey<T> {
        let index = self.registry.len();
        self.registry.push(Registered {
            name: name.to_string(),
            slot: Box::new(Component::<T>::new()),
        });
        ComponentKey {
            index,
            marker: PhantomData,
        }
    }

    /// Shared access to an enlisted component.
    pub fn component<T: Send + 'static>(&self, key: ComponentKey<T>) -> &Component<T> {
        self.registry[key.index]
            .slot
            .as_any()
            .downcast_ref()
            .expect("component key used with a different value type")
    }

    /// Exclusive access to an enlisted component.
    pub fn component_mut<T: Send + 'static>(&mut self, key: ComponentKey<T>) -> &mut Component<T> {
        self.registry[key.index]
            .slot
            .as_any_mut()
            .downcast_mut()
            .expect("component key used with a different value type")
    }

    /// Folds every component's deferred queues into its column, in
    /// registration order.
    ///
    /// Refuses to run while tasks are outstanding: columns may be
    /// reallocated and reordered here, and the positional waiting flags
    /// recorded for in-flight tasks would no longer mean anything. Call
    /// [`Manager::wait`] first. A creation collision is reported after all
    /// mutations have been applied.
    pub fn update(&mut self) -> Result<(), UpdateError> {
        let _g = profiler::span("Manager::update");

        let outstanding = self.pool.outstanding();
        if outstanding > 0 {
            return Err(NotQuiescentError { outstanding }.into());
        }

        let mut first_collision: Option<CreateCollisionError> = None;
        for registered in &mut self.registry {
            if let Err(collision) = registered.slot.update() {
                first_collision.get_or_insert(collision);
            }
        }
        match first_collision {
            Some(collision) => Err(collision.into()),
            None => Ok(()),
        }
    }

    /// Queues a destroy for `id` on every registered component.
    pub fn destroy(&mut self, id: EntityId) {
        for registered in &mut self.registry {
            registered.slot.queue_destroy(id);
        }
    }

    /// Blocks until every scheduled task is done, then clears all waiting
    /// flags so the recycled task ids cannot be mistaken for live ones.
    pub fn wait(&mut self) {
        let _g = profiler::span("Manager::wait");

        self.pool.wait_for_tasks();
        for registered in &mut self.registry {
            registered.slot.clear_waiting();
        }
    }

    /// The underlying flow pool (primarily for state dumps).
    pub fn pool(&self) -> &FlowPool {
        &self.pool
    }

    /// Debug summary naming every component that stores `id`.
    pub fn dump_entity(&self, id: EntityId) -> String {
        let mut line = format!("{id}:");
        let mut any = false;
        for registered in &self.registry {
            if registered.slot.contains(id) {
                line.push(' ');
                line.push_str(&registered.name);
                any = true;
            }
        }
        if !any {
            line.push_str(" (none)");
        }
        line
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
