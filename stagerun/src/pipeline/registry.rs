//! Stage registry with declaration-time validation.

use super::StageSpec;
use crate::core::{StageFailure, StageName, StageState};
use crate::errors::StagerunError;
use crate::stages::NoOpAction;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How a runnable stage relates to its dependencies at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Some dependency has not finished yet.
    Waiting,
    /// Every dependency finished successfully.
    Ready,
    /// Some dependency failed or was skipped.
    Blocked,
}

/// The declared stages of one run.
///
/// Stages are kept in declaration order. Because a stage may only depend on
/// stages declared before it, declaration order is also a topological order.
/// The terminal `end` stage is held apart and always iterates last.
#[derive(Debug, Default)]
pub struct Registry {
    /// Regular stages in declaration order.
    stages: Vec<StageSpec>,
    /// Position of each regular stage in `stages`.
    index: HashMap<StageName, usize>,
    /// The terminal stage, if declared.
    terminal: Option<StageSpec>,
    /// Dependencies that finished successfully (plus `start` once running).
    satisfied: HashSet<StageName>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is reserved or already taken, if the
    /// stage depends on itself or on nothing, or if a dependency is neither
    /// `start` nor an already declared stage.
    pub fn declare(&mut self, spec: StageSpec) -> Result<(), StagerunError> {
        if spec.name.is_reserved() {
            return Err(StagerunError::ReservedName { stage: spec.name });
        }
        if self.index.contains_key(&spec.name) {
            return Err(StagerunError::DuplicateStage { stage: spec.name });
        }
        spec.validate()?;
        self.check_dependencies(&spec)?;

        self.index.insert(spec.name.clone(), self.stages.len());
        self.stages.push(spec);
        Ok(())
    }

    /// Declares the terminal stage, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if `dependencies` is empty or names an unknown stage.
    pub fn set_terminal(
        &mut self,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> Result<&StageSpec, StagerunError> {
        let spec = StageSpec::new(StageName::end(), Arc::new(NoOpAction), dependencies);
        spec.validate()?;
        self.check_dependencies(&spec)?;

        Ok(&*self.terminal.insert(spec))
    }

    fn check_dependencies(&self, spec: &StageSpec) -> Result<(), StagerunError> {
        for dep in &spec.dependencies {
            if !dep.is_start() && !self.index.contains_key(dep) {
                return Err(StagerunError::UnknownDependency {
                    stage: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns true if a terminal stage is declared.
    #[must_use]
    pub const fn has_end(&self) -> bool {
        self.terminal.is_some()
    }

    /// Number of stages, counting the terminal stage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len() + usize::from(self.terminal.is_some())
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all stages in declaration order, terminal stage last.
    pub fn iter(&self) -> impl Iterator<Item = &StageSpec> {
        self.stages.iter().chain(self.terminal.iter())
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageSpec> {
        if name == StageName::END {
            return self.terminal.as_ref();
        }
        self.index.get(name).map(|&i| &self.stages[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut StageSpec> {
        if name == StageName::END {
            return self.terminal.as_mut();
        }
        self.index.get(name).map(|&i| &mut self.stages[i])
    }

    /// Positional access used by the scan; position `stages.len()` is the
    /// terminal stage.
    pub(crate) fn slot(&self, position: usize) -> Option<&StageSpec> {
        if position < self.stages.len() {
            self.stages.get(position)
        } else if position == self.stages.len() {
            self.terminal.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn slot_mut(&mut self, position: usize) -> Option<&mut StageSpec> {
        if position < self.stages.len() {
            self.stages.get_mut(position)
        } else if position == self.stages.len() {
            self.terminal.as_mut()
        } else {
            None
        }
    }

    /// Evaluates the dependencies of `spec`.
    ///
    /// A single failed or skipped dependency blocks the stage, even if its
    /// other dependencies are still running.
    pub(crate) fn readiness(&self, spec: &StageSpec) -> Readiness {
        let blocked = spec
            .dependencies
            .iter()
            .filter_map(|dep| self.get(dep.as_str()))
            .any(StageSpec::blocks_dependents);
        if blocked {
            return Readiness::Blocked;
        }

        if spec.dependencies.iter().all(|dep| self.satisfied.contains(dep)) {
            Readiness::Ready
        } else {
            Readiness::Waiting
        }
    }

    /// Records `name` as a satisfied dependency.
    pub(crate) fn mark_satisfied(&mut self, name: StageName) {
        self.satisfied.insert(name);
    }

    /// Returns true if `name` has been recorded as satisfied.
    #[must_use]
    pub fn is_satisfied(&self, name: &str) -> bool {
        self.satisfied.contains(name)
    }

    /// Returns true once every stage is `Done` or `Skipped`.
    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.iter().all(|spec| spec.state.is_terminal())
    }

    /// Counts stages currently in `state`.
    #[must_use]
    pub fn count_in(&self, state: StageState) -> usize {
        self.iter().filter(|spec| spec.state == state).count()
    }

    /// Snapshot of every stage's state, in iteration order.
    #[must_use]
    pub fn states(&self) -> Vec<(StageName, StageState)> {
        self.iter().map(|spec| (spec.name.clone(), spec.state)).collect()
    }

    /// Every recorded stage failure, in iteration order.
    #[must_use]
    pub fn errors(&self) -> Vec<StageFailure> {
        self.iter()
            .filter_map(|spec| {
                spec.last_error
                    .as_ref()
                    .map(|err| StageFailure::new(spec.name.clone(), Arc::clone(err)))
            })
            .collect()
    }
}
