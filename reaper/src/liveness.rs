use tracing::debug;

use crate::classifier::TreeClassifier;
use crate::filter::ProcessFilter;

/// Lifecycle of the supervised workload as seen through the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadState {
    /// No monitored process has been observed yet.
    AwaitingStart,
    /// At least one monitored process is alive.
    Running,
    /// Monitored processes existed and none remain. Terminal.
    Exited,
}

/// Derives [`WorkloadState`] from successive classifier queries.
///
/// The only memory kept across polls is whether the workload has been seen;
/// membership itself is re-queried every time.
#[derive(Debug)]
pub struct LivenessPoller<'f> {
    filter: &'f ProcessFilter,
    state: WorkloadState,
}

impl<'f> LivenessPoller<'f> {
    pub fn new(filter: &'f ProcessFilter) -> Self {
        Self {
            filter,
            state: WorkloadState::AwaitingStart,
        }
    }

    pub fn state(&self) -> WorkloadState {
        self.state
    }

    pub fn classify<C: TreeClassifier + ?Sized>(&mut self, classifier: &C) -> WorkloadState {
        if self.state == WorkloadState::Exited {
            return self.state;
        }

        let alive = classifier.is_alive(self.filter);
        let next = match (self.state, alive) {
            (WorkloadState::AwaitingStart, false) => WorkloadState::AwaitingStart,
            (_, true) => WorkloadState::Running,
            (_, false) => WorkloadState::Exited,
        };

        if next != self.state {
            debug!(from = ?self.state, to = ?next, "workload state changed");
            self.state = next;
        }
        next
    }
}
