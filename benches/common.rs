#![allow(dead_code)]

use flowecs::{ComponentKey, Manager};

pub const ENTITIES_SMALL: u32 = 10_000;
pub const ENTITIES_MED: u32 = 100_000;

pub fn world_with_one(count: u32) -> (Manager, ComponentKey<f64>) {
    let mut world = Manager::new();
    let key = world.enlist::<f64>("values");
    for _ in 0..count {
        let id = world.get_id();
        world.component_mut(key).create(id, id as f64);
    }
    world.update().unwrap();
    (world, key)
}

pub fn world_with_pair(count: u32) -> (Manager, ComponentKey<f64>, ComponentKey<f64>) {
    let mut world = Manager::new();
    let a = world.enlist::<f64>("a");
    let b = world.enlist::<f64>("b");
    for i in 0..count {
        let id = world.get_id();
        world.component_mut(a).create(id, i as f64);
        // Two-thirds overlap keeps the join from degenerating.
        if i % 3 != 0 {
            world.component_mut(b).create(id, i as f64);
        }
    }
    world.update().unwrap();
    (world, a, b)
}

pub fn world_with_trio(
    count: u32,
) -> (
    Manager,
    ComponentKey<f64>,
    ComponentKey<f64>,
    ComponentKey<f64>,
) {
    let mut world = Manager::new();
    let a = world.enlist::<f64>("a");
    let b = world.enlist::<f64>("b");
    let c = world.enlist::<f64>("c");
    for i in 0..count {
        let id = world.get_id();
        world.component_mut(a).create(id, i as f64);
        if i % 3 != 0 {
            world.component_mut(b).create(id, i as f64);
        }
        if i % 5 != 0 {
            world.component_mut(c).create(id, i as f64);
        }
    }
    world.update().unwrap();
    (world, a, b, c)
}
