use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use flowecs::FlowPool;

#[test]
fn single_task_runs() {
    let pool = FlowPool::with_threads(2);
    let value = Arc::new(AtomicI32::new(0));

    let v = Arc::clone(&value);
    pool.push_task(
        move || {
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );
    pool.wait_for_tasks();

    assert_eq!(value.load(Ordering::SeqCst), 1);
}

#[test]
fn predecessor_orders_two_tasks() {
    let pool = FlowPool::with_threads(4);
    let value = Arc::new(AtomicI32::new(1));

    let v = Arc::clone(&value);
    let t1 = pool.push_task(
        move || {
            thread::sleep(Duration::from_millis(200));
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );

    let v = Arc::clone(&value);
    pool.push_task(
        move || {
            let a = v.load(Ordering::SeqCst);
            v.store(a * a, Ordering::SeqCst);
        },
        &[t1],
    );

    pool.wait_for_tasks();
    assert_eq!(value.load(Ordering::SeqCst), 4);
}

#[test]
fn independent_tasks_run_concurrently() {
    let pool = FlowPool::with_threads(2);
    let a = Arc::new(AtomicI32::new(1));
    let b = Arc::new(AtomicI32::new(2));

    let start = Instant::now();

    let v = Arc::clone(&a);
    let t1 = pool.push_task(
        move || {
            thread::sleep(Duration::from_millis(200));
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );

    let v = Arc::clone(&b);
    pool.push_task(
        move || {
            v.fetch_sub(1, Ordering::SeqCst);
        },
        &[],
    );

    let v = Arc::clone(&a);
    let t3 = pool.push_task(
        move || {
            let x = v.load(Ordering::SeqCst);
            v.store(x * x, Ordering::SeqCst);
        },
        &[t1],
    );

    let v = Arc::clone(&a);
    pool.push_task(
        move || {
            v.fetch_sub(1, Ordering::SeqCst);
        },
        &[t3],
    );

    pool.wait_for_tasks();
    let elapsed = start.elapsed();

    assert_eq!(a.load(Ordering::SeqCst), 3);
    assert_eq!(b.load(Ordering::SeqCst), 1);
    // The sleeper dominates the wall time; everything else overlaps it.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(400), "tasks did not overlap: {elapsed:?}");
}

#[test]
fn chain_executes_in_submission_order() {
    let pool = FlowPool::with_threads(4);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut previous = None;
    for step in 0..8u32 {
        let order = Arc::clone(&order);
        let preds: Vec<_> = previous.into_iter().collect();
        previous = Some(pool.push_task(move || order.lock().unwrap().push(step), &preds));
    }

    pool.wait_for_tasks();
    assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
}

#[test]
fn diamond_joins_both_branches() {
    let pool = FlowPool::with_threads(4);
    let value = Arc::new(AtomicI32::new(0));

    let v = Arc::clone(&value);
    let root = pool.push_task(
        move || {
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );

    let v = Arc::clone(&value);
    let left = pool.push_task(
        move || {
            thread::sleep(Duration::from_millis(50));
            v.fetch_add(10, Ordering::SeqCst);
        },
        &[root],
    );

    let v = Arc::clone(&value);
    let right = pool.push_task(
        move || {
            v.fetch_add(100, Ordering::SeqCst);
        },
        &[root],
    );

    let v = Arc::clone(&value);
    let seen_at_join = Arc::new(AtomicI32::new(0));
    let seen = Arc::clone(&seen_at_join);
    pool.push_task(
        move || {
            seen.store(v.load(Ordering::SeqCst), Ordering::SeqCst);
            v.fetch_add(1000, Ordering::SeqCst);
        },
        &[left, right],
    );

    pool.wait_for_tasks();
    // Both branches were visible when the join task ran.
    assert_eq!(seen_at_join.load(Ordering::SeqCst), 111);
    assert_eq!(value.load(Ordering::SeqCst), 1111);
}

#[test]
fn stale_done_predecessors_are_harmless() {
    let pool = FlowPool::with_threads(2);
    let value = Arc::new(AtomicI32::new(0));

    let v = Arc::clone(&value);
    let t0 = pool.push_task(
        move || {
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );
    // Give the first task every chance to already be done.
    thread::sleep(Duration::from_millis(50));

    let v = Arc::clone(&value);
    pool.push_task(
        move || {
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[t0],
    );

    pool.wait_for_tasks();
    assert_eq!(value.load(Ordering::SeqCst), 2);
}

#[test]
fn wait_resets_task_ids() {
    let pool = FlowPool::with_threads(2);

    let first = pool.push_task(|| {}, &[]);
    let second = pool.push_task(|| {}, &[first]);
    assert_eq!((first, second), (0, 1));

    pool.wait_for_tasks();
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.total_tasks(), 0);

    // Ids restart from zero after the reset.
    let reused = pool.push_task(|| {}, &[]);
    assert_eq!(reused, 0);
    pool.wait_for_tasks();
}

#[test]
fn wait_with_no_tasks_returns_immediately() {
    let pool = FlowPool::with_threads(2);
    pool.wait_for_tasks();
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn zero_threads_clamps_to_one_worker() {
    let pool = FlowPool::with_threads(0);
    assert_eq!(pool.threads(), 1);

    let value = Arc::new(AtomicI32::new(0));
    let v = Arc::clone(&value);
    pool.push_task(
        move || {
            v.fetch_add(1, Ordering::SeqCst);
        },
        &[],
    );
    pool.wait_for_tasks();
    assert_eq!(value.load(Ordering::SeqCst), 1);
}

#[test]
fn single_worker_drains_blocked_submissions() {
    // One worker must still make progress through a dependency chain that
    // is submitted all at once.
    let pool = FlowPool::with_threads(1);
    let value = Arc::new(AtomicI32::new(0));

    let mut previous: Vec<_> = Vec::new();
    for _ in 0..32 {
        let v = Arc::clone(&value);
        let id = pool.push_task(
            move || {
                v.fetch_add(1, Ordering::SeqCst);
            },
            &previous,
        );
        previous = vec![id];
    }

    pool.wait_for_tasks();
    assert_eq!(value.load(Ordering::SeqCst), 32);
}

#[test]
fn state_dump_lists_predecessors_of_blocked_tasks() {
    let pool = FlowPool::with_threads(2);

    let gate = pool.push_task(|| thread::sleep(Duration::from_millis(200)), &[]);
    pool.push_task(|| {}, &[gate]);

    // The gate is still sleeping, so its successor must be waiting on it.
    let dump = pool.to_string();
    assert!(dump.contains("task 1: waiting <- [0]"), "unexpected dump:\n{dump}");

    pool.wait_for_tasks();
}

#[test]
fn state_dump_after_wait_shows_quiescence() {
    let pool = FlowPool::with_threads(2);
    for _ in 0..4 {
        pool.push_task(|| {}, &[]);
    }
    pool.wait_for_tasks();
    assert_eq!(pool.to_string(), "flow pool: 0 outstanding of 0 submitted\n");
}

#[test]
fn many_tasks_with_random_dependencies_all_complete() {
    let pool = FlowPool::with_threads(4);
    let counter = Arc::new(AtomicI32::new(0));

    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let mut submitted = Vec::new();
    for _ in 0..500 {
        let mut preds = Vec::new();
        if !submitted.is_empty() {
            for _ in 0..(next() % 3) {
                preds.push(submitted[(next() as usize) % submitted.len()]);
            }
        }
        let c = Arc::clone(&counter);
        submitted.push(pool.push_task(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            &preds,
        ));
    }

    pool.wait_for_tasks();
    assert_eq!(counter.load(Ordering::SeqCst), 500);
    assert_eq!(pool.outstanding(), 0);
}
