//! Dependency-aware worker pool.
//!
//! [`FlowPool`] replaces the usual FIFO work queue with an **eligibility
//! scan over a task DAG**: every queued task carries the ids of tasks that
//! must finish before it may start. Workers repeatedly pick the first
//! waiting task whose predecessors are all done, run it with no lock held,
//! and mark it done.
//!
//! ## Scheduling model
//!
//! * Task ids are dense integers assigned in submission order.
//! * A task's status moves along a linear chain:
//!   `Waiting → InProgress → Done`. There are no back-edges, no failure
//!   state, and no cancellation.
//! * A task's body runs strictly after every predecessor's body has
//!   returned; the ordering is established by the mutex-protected `Done`
//!   transition and the eligibility check.
//! * Tasks with no transitive predecessor relation may run concurrently;
//!   callers are responsible for data disjointness.
//!
//! ## Quiescence
//!
//! [`FlowPool::wait_for_tasks`] blocks until no task is outstanding, then
//! clears all task records and resets the id counter. This is the **sole
//! point** at which task ids are invalidated; submitting after a wait
//! starts again from id 0.
//!
//! ## Design notes
//!
//! One coarse mutex guards all task records. The eligibility scan is
//! O(tasks · predecessors) per pick, accepted in exchange for dense ids
//! that are cheap to store in predecessor lists and interval maps, and a
//! trivial quiescence condition. The pool favors few large tasks over many
//! tiny ones; a submission or a completion wakes sleeping workers, so an
//! ineligible worker sleeps instead of spinning.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::engine::types::TaskId;
use crate::profiling::profiler;

/// Execution state of one scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued; may be blocked on predecessors.
    Waiting,
    /// Owned by exactly one worker.
    InProgress,
    /// Body has returned; successors may start.
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Waiting => f.write_str("waiting"),
            TaskStatus::InProgress => f.write_str("in-progress"),
            TaskStatus::Done => f.write_str("done"),
        }
    }
}

type TaskBody = Box<dyn FnOnce() + Send + 'static>;

struct TaskQueue {
    bodies: Vec<Option<TaskBody>>,
    statuses: Vec<TaskStatus>,
    predecessors: Vec<Vec<TaskId>>,
    /// Tasks not yet done.
    outstanding: usize,
    /// Tasks submitted since the last reset; doubles as the next id.
    total: TaskId,
    /// Bumped on every submission and completion so sleeping workers can
    /// tell a stale wakeup from a fresh one.
    wakeups: u64,
    running: bool,
}

struct Shared {
    queue: Mutex<TaskQueue>,
    task_available: Condvar,
    tasks_done: Condvar,
}

/// Worker pool whose queued tasks carry explicit dependency edges.
pub struct FlowPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl FlowPool {
    /// Creates a pool with one worker per available hardware thread.
    pub fn new() -> Self {
        let n = thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_threads(n)
    }

    /// Creates a pool with `n_threads` workers.
    ///
    /// `0` is clamped to one worker; a pool with no workers could never
    /// drain a submitted task.
    pub fn with_threads(n_threads: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TaskQueue {
                bodies: Vec::new(),
                statuses: Vec::new(),
                predecessors: Vec::new(),
                outstanding: 0,
                total: 0,
                wakeups: 0,
                running: true,
            }),
            task_available: Condvar::new(),
            tasks_done: Condvar::new(),
        });

        let workers = (0..n_threads.max(1))
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("flow-worker-{index}"))
                    .spawn(move || {
                        profiler::thread_name(format!("flow-worker-{index}"));
                        worker_loop(&shared)
                    })
                    .expect("failed to spawn flow pool worker")
            })
            .collect();

        Self { shared, workers }
    }

    /// Queues `body` behind the given predecessor tasks and returns its id.
    ///
    /// The body becomes eligible once every listed predecessor is done; an
    /// already-done predecessor is harmless. Predecessor ids must come from
    /// earlier submissions in the same quiescence window, which also makes
    /// dependency cycles impossible by construction.
    pub fn push_task<F>(&self, body: F, predecessors: &[TaskId]) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock().unwrap();
        let id = queue.total;
        debug_assert!(
            predecessors.iter().all(|&p| p < id),
            "predecessors must be previously submitted task ids"
        );
        queue.bodies.push(Some(Box::new(body)));
        queue.statuses.push(TaskStatus::Waiting);
        queue.predecessors.push(predecessors.to_vec());
        queue.outstanding += 1;
        queue.total += 1;
        queue.wakeups += 1;
        drop(queue);
        self.shared.task_available.notify_one();
        id
    }

    /// Blocks until every task is done, then resets the scheduler.
    ///
    /// Clears task bodies, statuses, and predecessor lists and restarts the
    /// id counter at 0. This is the only point at which task ids are
    /// invalidated.
    pub fn wait_for_tasks(&self) {
        let queue = self.shared.queue.lock().unwrap();
        let mut queue = self
            .shared
            .tasks_done
            .wait_while(queue, |q| q.outstanding > 0)
            .unwrap();
        queue.bodies.clear();
        queue.statuses.clear();
        queue.predecessors.clear();
        queue.total = 0;
    }

    /// Number of tasks not yet done.
    pub fn outstanding(&self) -> usize {
        self.shared.queue.lock().unwrap().outstanding
    }

    /// Tasks submitted since the last reset.
    pub fn total_tasks(&self) -> usize {
        self.shared.queue.lock().unwrap().total as usize
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

impl Default for FlowPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FlowPool {
    fn drop(&mut self) {
        self.wait_for_tasks();
        self.shared.queue.lock().unwrap().running = false;
        self.shared.task_available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl fmt::Display for FlowPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock().unwrap();
        writeln!(
            f,
            "flow pool: {} outstanding of {} submitted",
            queue.outstanding, queue.total
        )?;
        for id in 0..queue.statuses.len() {
            write!(f, "  task {}: {}", id, queue.statuses[id])?;
            if !queue.predecessors[id].is_empty() {
                write!(f, " <- {:?}", queue.predecessors[id])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Index of the first waiting task whose predecessors are all done.
fn find_eligible(queue: &TaskQueue) -> Option<usize> {
    (0..queue.statuses.len()).find(|&index| {
        queue.statuses[index] == TaskStatus::Waiting
            && queue.predecessors[index]
                .iter()
                .all(|&p| queue.statuses[p as usize] == TaskStatus::Done)
    })
}

fn worker_loop(shared: &Shared) {
    let mut queue = shared.queue.lock().unwrap();
    loop {
        match find_eligible(&queue) {
            Some(index) => {
                let body = queue.bodies[index]
                    .take()
                    .expect("waiting task has a body");
                queue.statuses[index] = TaskStatus::InProgress;
                drop(queue);

                body();

                queue = shared.queue.lock().unwrap();
                queue.statuses[index] = TaskStatus::Done;
                queue.outstanding -= 1;
                queue.wakeups += 1;
                // A completion can unblock several tasks at once.
                shared.task_available.notify_all();
                shared.tasks_done.notify_all();
            }
            None => {
                if !queue.running {
                    return;
                }
                let seen = queue.wakeups;
                queue = shared
                    .task_available
                    .wait_while(queue, |q| q.running && q.wakeups == seen)
                    .unwrap();
            }
        }
    }
}
