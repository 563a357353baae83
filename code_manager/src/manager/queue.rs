//manager/queue.rs
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};

/// Which suite a unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuiteRef {
    Ag(i64),
    Student(i64),
}

impl SuiteRef {
    /// Human-readable kind, as used in rerun error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SuiteRef::Ag(_) => "ag test",
            SuiteRef::Student(_) => "student test",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SuiteRef::Ag(id) | SuiteRef::Student(id) => *id,
        }
    }
}

/// One piece of work a worker picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradingUnit {
    /// Claim a queued submission and run its non-deferred suites.
    GradeSubmission { submission_id: i64 },
    /// Run one deferred suite of a submission waiting for it.
    DeferredSuite { submission_id: i64, suite: SuiteRef },
    /// Rerun one suite (or some of its cases) for one submission.
    Rerun {
        task_id: i64,
        submission_id: i64,
        suite: SuiteRef,
        /// Empty means every case.
        case_ids: Vec<i64>,
    },
}

impl GradingUnit {
    pub fn submission_id(&self) -> i64 {
        match self {
            GradingUnit::GradeSubmission { submission_id }
            | GradingUnit::DeferredSuite { submission_id, .. }
            | GradingUnit::Rerun { submission_id, .. } => *submission_id,
        }
    }
}

/// FIFO of grading units shared by every worker.
///
/// `pending` counts units that are queued or still being worked on, so the
/// queue knows when the whole pipeline has gone quiet.
#[derive(Debug, Default)]
pub struct WorkQueue {
    units: Mutex<VecDeque<GradingUnit>>,
    available: Notify,
    pending: AtomicUsize,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, unit: GradingUnit) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.units.lock().await.push_back(unit);
        self.available.notify_one();
    }

    pub async fn extend(&self, units: impl IntoIterator<Item = GradingUnit>) {
        for unit in units {
            self.push(unit).await;
        }
    }

    /// Waits for the next unit. The caller must call [`WorkQueue::done`]
    /// once it has finished with it (or pushed it back).
    pub async fn pop(&self) -> GradingUnit {
        loop {
            let notified = self.available.notified();
            if let Some(unit) = self.try_pop().await {
                return unit;
            }
            notified.await;
        }
    }

    pub async fn try_pop(&self) -> Option<GradingUnit> {
        let mut units = self.units.lock().await;
        let unit = units.pop_front();
        // Another waiter may be able to take the next one.
        if unit.is_some() && !units.is_empty() {
            self.available.notify_one();
        }
        unit
    }

    /// Marks a popped unit as finished.
    pub fn done(&self) {
        // Never underflows as long as callers pair `pop` with `done`.
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub async fn len(&self) -> usize {
        self.units.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Units queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}
