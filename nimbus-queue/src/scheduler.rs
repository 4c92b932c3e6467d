//! Scheduler holding parked tasks ordered by when they may run

use chrono::{DateTime, Utc};
use nimbus_core::Task;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{QueueError, QueueResult};

/// Holds tasks waiting for a worker
pub trait Scheduler: Send + Sync {
    /// Park a task until it is due
    fn push(&self, task: Arc<dyn Task>) -> QueueResult<()>;

    /// Take the next due task, or fail with [`QueueError::NoTaskReady`]
    fn request(&self) -> QueueResult<Arc<dyn Task>>;

    /// Reject all further pushes and requests; idempotent
    fn shutdown(&self) -> QueueResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time until the earliest parked task is due, if any task is parked
    fn time_until_ready(&self) -> Option<Duration> {
        None
    }
}

struct Entry {
    ready_at: DateTime<Utc>,
    seq: u64,
    task: Arc<dyn Task>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap yields the earliest entry
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.ready_at, other.seq).cmp(&(self.ready_at, self.seq))
    }
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Entry>,
    seq: u64,
    shut_down: bool,
}

/// Binary-heap scheduler keyed by resume time
///
/// A task whose resume time lies in the future is keyed by that time; any
/// other task is keyed by the time it was pushed, so due tasks come out in
/// arrival order.
#[derive(Default)]
pub struct ResumeTimeScheduler {
    state: Mutex<State>,
    capacity: Option<usize>,
}

impl ResumeTimeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity: Some(capacity),
        }
    }
}

impl Scheduler for ResumeTimeScheduler {
    fn push(&self, task: Arc<dyn Task>) -> QueueResult<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(QueueError::ShutDown);
        }
        if let Some(capacity) = self.capacity {
            if state.heap.len() >= capacity {
                return Err(QueueError::CapacityExceeded(capacity));
            }
        }

        let now = Utc::now();
        let ready_at = task.core().resume_time().filter(|t| *t > now).unwrap_or(now);
        state.seq += 1;
        let seq = state.seq;
        state.heap.push(Entry { ready_at, seq, task });
        Ok(())
    }

    fn request(&self) -> QueueResult<Arc<dyn Task>> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(QueueError::ShutDown);
        }
        match state.heap.peek() {
            Some(entry) if entry.ready_at <= Utc::now() => {}
            _ => return Err(QueueError::NoTaskReady),
        }
        state.heap.pop().map(|entry| entry.task).ok_or(QueueError::NoTaskReady)
    }

    fn shutdown(&self) -> QueueResult<()> {
        self.state.lock().shut_down = true;
        Ok(())
    }

    fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    fn time_until_ready(&self) -> Option<Duration> {
        let state = self.state.lock();
        let entry = state.heap.peek()?;
        Some((entry.ready_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}
