use crate::document::model::{Phase, SlideDocument, Step};
use crate::state::store::StateStore;
use crate::state::task::TaskStatus;
use serde::{Deserialize, Serialize};

/// Declarative predicate deciding whether a block is part of the resolved output.
///
/// JSON shape is externally tagged: `{"taskCompleted": "t1"}`, `"stepComplete"`,
/// `{"all": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    /// Task of the same step is completed.
    TaskCompleted(String),
    /// Task of the same step is not completed yet.
    TaskPending(String),
    /// Hint of the same step with this level has been revealed.
    HintRevealed(u32),
    /// Step is in this phase.
    Phase(Phase),
    /// Document feature flag is `true`.
    FeatureFlag(String),
    /// Every required task of the step is completed.
    StepComplete,
    All(Vec<Visibility>),
    Any(Vec<Visibility>),
    Not(Box<Visibility>),
}

/// Read-only view of runtime state a predicate is evaluated against.
#[derive(Clone, Copy)]
pub struct VisibilityScope<'a> {
    pub document: &'a SlideDocument,
    pub store: &'a StateStore,
    pub step_index: usize,
}

impl<'a> VisibilityScope<'a> {
    /// Scope for the store's active step.
    pub fn active(document: &'a SlideDocument, store: &'a StateStore) -> Self {
        Self {
            document,
            store,
            step_index: store.active_step_index(),
        }
    }

    fn step(&self) -> Option<&'a Step> {
        self.document.step(self.step_index)
    }
}

impl Visibility {
    /// Evaluate against `scope`. References to unknown tasks or levels read as `false`.
    pub fn evaluate(&self, scope: &VisibilityScope<'_>) -> bool {
        match self {
            Visibility::TaskCompleted(task) => {
                scope.store.task_status_in(scope.step_index, task) == Some(TaskStatus::Completed)
            }
            Visibility::TaskPending(task) => matches!(
                scope.store.task_status_in(scope.step_index, task),
                Some(TaskStatus::Pending | TaskStatus::InProgress)
            ),
            Visibility::HintRevealed(level) => {
                scope.store.is_hint_revealed(scope.step_index, *level)
            }
            Visibility::Phase(phase) => scope.step().is_some_and(|s| s.phase == *phase),
            Visibility::FeatureFlag(name) => scope.document.flag(name),
            Visibility::StepComplete => scope.store.are_required_tasks_complete(scope.step_index),
            Visibility::All(items) => items.iter().all(|v| v.evaluate(scope)),
            Visibility::Any(items) => items.iter().any(|v| v.evaluate(scope)),
            Visibility::Not(inner) => !inner.evaluate(scope),
        }
    }

    /// Describe every reference in this predicate that `step`/`document` cannot satisfy.
    pub fn dangling_refs(&self, step: &Step, document: &SlideDocument) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_dangling(step, document, &mut out);
        out
    }

    fn collect_dangling(&self, step: &Step, document: &SlideDocument, out: &mut Vec<String>) {
        match self {
            Visibility::TaskCompleted(task) | Visibility::TaskPending(task) => {
                if step.task(task).is_none() {
                    out.push(format!("task '{task}'"));
                }
            }
            Visibility::HintRevealed(level) => {
                if step.hint(*level).is_none() {
                    out.push(format!("hint level {level}"));
                }
            }
            Visibility::FeatureFlag(name) => {
                if !document.feature_flags.contains_key(name) {
                    out.push(format!("feature flag '{name}'"));
                }
            }
            Visibility::Phase(_) | Visibility::StepComplete => {}
            Visibility::All(items) | Visibility::Any(items) => {
                for v in items {
                    v.collect_dangling(step, document, out);
                }
            }
            Visibility::Not(inner) => inner.collect_dangling(step, document, out),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/visibility.rs"]
mod tests;
