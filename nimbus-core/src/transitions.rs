//! Status transition table
//!
//! The queue never changes a task's status directly. It asks the table for
//! the [`Transition`] between the current and the requested status and runs
//! the bookkeeping attached to it. Pairs missing from the table are
//! programming errors and must be rejected before anything is persisted.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::status::TaskStatus;

/// Bookkeeping attached to an allowed status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// "" -> queued: first submission, creates the record
    Submit,
    /// queued -> processing
    Start,
    /// suspending -> processing
    Resume,
    /// processing -> processing: persist progress between phases
    Checkpoint,
    /// processing -> suspending: park and hand back to the scheduler
    Suspend,
    /// processing -> completed
    Complete,
    /// processing -> error
    Fail,
    /// processing -> canceled
    Cancel,
}

impl Transition {
    /// Whether this transition leaves "processing" for a terminal status,
    /// the only place a task's cleanup hook runs.
    pub fn finishes_processing(&self) -> bool {
        matches!(
            self,
            Transition::Complete | Transition::Fail | Transition::Cancel
        )
    }
}

type Table = HashMap<Option<TaskStatus>, HashMap<TaskStatus, Transition>>;

/// Two-level lookup from (current status, target status) to a [`Transition`]
pub struct TransitionTable;

impl TransitionTable {
    fn table() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut table: Table = HashMap::new();
            table
                .entry(None)
                .or_default()
                .insert(TaskStatus::Queued, Transition::Submit);
            table
                .entry(Some(TaskStatus::Queued))
                .or_default()
                .insert(TaskStatus::Processing, Transition::Start);
            table
                .entry(Some(TaskStatus::Suspending))
                .or_default()
                .insert(TaskStatus::Processing, Transition::Resume);

            let processing = table.entry(Some(TaskStatus::Processing)).or_default();
            processing.insert(TaskStatus::Processing, Transition::Checkpoint);
            processing.insert(TaskStatus::Suspending, Transition::Suspend);
            processing.insert(TaskStatus::Completed, Transition::Complete);
            processing.insert(TaskStatus::Error, Transition::Fail);
            processing.insert(TaskStatus::Canceled, Transition::Cancel);
            table
        })
    }

    /// Look up the transition between two statuses, `None` if it is not allowed
    pub fn lookup(from: Option<TaskStatus>, to: TaskStatus) -> Option<Transition> {
        Self::table().get(&from).and_then(|targets| targets.get(&to)).copied()
    }

    /// Statuses reachable from `from`
    pub fn allowed_next_states(from: Option<TaskStatus>) -> Vec<TaskStatus> {
        let mut next: Vec<TaskStatus> = Self::table()
            .get(&from)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default();
        next.sort_by_key(|status| status.as_str());
        next
    }
}
