//! Thread-safe recorders for assertions in tests.

use crate::core::{StageName, StageState};
use crate::events::StageChange;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Records stage names in the order actions reached it.
///
/// Clones share the same underlying list, so a clone can be moved into each
/// stage action.
#[derive(Debug, Clone, Default)]
pub struct VisitRecorder {
    visits: Arc<RwLock<Vec<StageName>>>,
}

impl VisitRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a visit.
    pub fn record(&self, stage: impl Into<StageName>) {
        self.visits.write().push(stage.into());
    }

    /// Number of recorded visits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.visits.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visits.read().is_empty()
    }

    /// The visit at `index`, if any.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<StageName> {
        self.visits.read().get(index).cloned()
    }

    /// Every visit so far, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StageName> {
        self.visits.read().clone()
    }

    /// Position of the first visit to `stage`.
    #[must_use]
    pub fn position(&self, stage: &str) -> Option<usize> {
        self.visits.read().iter().position(|s| s == stage)
    }
}

/// Records every change reported to an executor's change callback.
#[derive(Debug, Clone, Default)]
pub struct ChangeRecorder {
    changes: Arc<RwLock<Vec<StageChange>>>,
}

impl ChangeRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback suitable for [`crate::pipeline::Executor::on_change`].
    #[must_use]
    pub fn callback(
        &self,
    ) -> impl Fn(&StageName, StageState, Option<&anyhow::Error>) + Send + Sync + 'static {
        let changes = Arc::clone(&self.changes);
        move |stage: &StageName, state: StageState, error: Option<&anyhow::Error>| {
            changes.write().push(StageChange::capture(stage, state, error));
        }
    }

    /// Every change so far, in the order reported.
    #[must_use]
    pub fn changes(&self) -> Vec<StageChange> {
        self.changes.read().clone()
    }

    /// States `stage` went through, in order.
    #[must_use]
    pub fn states_of(&self, stage: &str) -> Vec<StageState> {
        self.changes
            .read()
            .iter()
            .filter(|c| c.stage == stage)
            .map(|c| c.state)
            .collect()
    }

    /// The last state reported for `stage`.
    #[must_use]
    pub fn last_state_of(&self, stage: &str) -> Option<StageState> {
        self.states_of(stage).last().copied()
    }

    /// How many times each state was reported, ignoring the reserved stages.
    #[must_use]
    pub fn counts(&self) -> HashMap<StageState, usize> {
        let mut counts = HashMap::new();
        for change in self.changes.read().iter() {
            if change.stage.is_reserved() {
                continue;
            }
            *counts.entry(change.state).or_insert(0) += 1;
        }
        counts
    }

    /// Report count for `state`, ignoring the reserved stages.
    #[must_use]
    pub fn count(&self, state: StageState) -> usize {
        self.counts().get(&state).copied().unwrap_or(0)
    }

    /// Changes that carried an error.
    #[must_use]
    pub fn failures(&self) -> Vec<StageChange> {
        self.changes
            .read()
            .iter()
            .filter(|c| c.error.is_some())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_recorder_shared_between_clones() {
        let recorder = VisitRecorder::new();
        let clone = recorder.clone();

        clone.record("a");
        recorder.record("b");

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.at(0), Some(StageName::from("a")));
        assert_eq!(recorder.position("b"), Some(1));
        assert!(recorder.at(5).is_none());
    }

    #[test]
    fn test_change_recorder_counts() {
        let recorder = ChangeRecorder::new();
        let callback = recorder.callback();
        let err = anyhow::anyhow!("boom");

        callback(&StageName::from("a"), StageState::Runnable, None);
        callback(&StageName::from("a"), StageState::Running, None);
        callback(&StageName::from("a"), StageState::Done, Some(&err));
        callback(&StageName::end(), StageState::Skipped, None);

        assert_eq!(recorder.count(StageState::Runnable), 1);
        assert_eq!(recorder.count(StageState::Skipped), 0);
        assert_eq!(
            recorder.states_of("a"),
            vec![StageState::Runnable, StageState::Running, StageState::Done]
        );
        assert_eq!(recorder.last_state_of("end"), Some(StageState::Skipped));
        assert_eq!(recorder.failures().len(), 1);
    }
}
