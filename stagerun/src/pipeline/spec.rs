//! Stage records.

use crate::core::{StageName, StageState};
use crate::errors::StagerunError;
use crate::stages::StageAction;
use std::sync::Arc;

/// A declared stage together with its run-time state.
#[derive(Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: StageName,
    /// The work the stage performs.
    pub action: Arc<dyn StageAction>,
    /// Stages that must finish successfully first, in declaration order.
    pub dependencies: Vec<StageName>,
    /// Current lifecycle state.
    pub state: StageState,
    /// Error returned by the action, if it failed.
    pub last_error: Option<Arc<anyhow::Error>>,
}

impl StageSpec {
    /// Creates a new runnable stage. Repeated dependencies are collapsed,
    /// keeping the first occurrence.
    #[must_use]
    pub fn new(
        name: impl Into<StageName>,
        action: Arc<dyn StageAction>,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> Self {
        let mut deps: Vec<StageName> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        Self {
            name: name.into(),
            action,
            dependencies: deps,
            state: StageState::Runnable,
            last_error: None,
        }
    }

    /// Validates the stage in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage depends on itself or has no dependencies.
    pub fn validate(&self) -> Result<(), StagerunError> {
        if self.dependencies.is_empty() {
            return Err(StagerunError::MissingDependencies {
                stage: self.name.clone(),
            });
        }
        if self.dependencies.contains(&self.name) {
            return Err(StagerunError::SelfDependency {
                stage: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Returns true if the action finished with an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == StageState::Done && self.last_error.is_some()
    }

    /// Returns true if dependents of this stage can never run.
    #[must_use]
    pub fn blocks_dependents(&self) -> bool {
        self.state == StageState::Skipped || self.is_failed()
    }

    /// Moves the stage to `next`.
    pub(crate) fn transition(&mut self, next: StageState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition for '{}': {} -> {}",
            self.name,
            self.state,
            next
        );
        self.state = next;
    }
}

impl std::fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("state", &self.state)
            .field("last_error", &self.last_error.as_ref().map(ToString::to_string))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpAction;

    fn noop() -> Arc<dyn StageAction> {
        Arc::new(NoOpAction)
    }

    #[test]
    fn test_stage_spec_creation() {
        let spec = StageSpec::new("test", noop(), ["dep1", "dep2", "dep1"]);

        assert_eq!(spec.name, "test");
        assert_eq!(spec.dependencies, vec![StageName::from("dep1"), StageName::from("dep2")]);
        assert_eq!(spec.state, StageState::Runnable);
        assert!(spec.last_error.is_none());
    }

    #[test]
    fn test_stage_spec_self_dependency() {
        let spec = StageSpec::new("test", noop(), ["test"]);
        assert_eq!(
            spec.validate(),
            Err(StagerunError::SelfDependency {
                stage: StageName::from("test")
            })
        );
    }

    #[test]
    fn test_stage_spec_requires_dependencies() {
        let spec = StageSpec::new("test", noop(), Vec::<StageName>::new());
        assert_eq!(spec.validate().unwrap_err().code(), "GRAPH-NO_DEPS");
    }

    #[test]
    fn test_failed_stage_blocks_dependents() {
        let mut spec = StageSpec::new("test", noop(), [StageName::START]);
        assert!(!spec.blocks_dependents());

        spec.transition(StageState::Running);
        spec.transition(StageState::Done);
        assert!(!spec.blocks_dependents());

        spec.last_error = Some(Arc::new(anyhow::anyhow!("boom")));
        assert!(spec.is_failed());
        assert!(spec.blocks_dependents());
    }

    #[test]
    fn test_skipped_stage_blocks_dependents() {
        let mut spec = StageSpec::new("test", noop(), [StageName::START]);
        spec.transition(StageState::Skipped);
        assert!(spec.blocks_dependents());
        assert!(!spec.is_failed());
    }
}
