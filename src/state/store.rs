//! Runtime state of a mounted slide document.
//!
//! The store is the single owner of mutable runtime state. Every mutation is a [`StoreAction`]
//! applied by [`StateStore::dispatch`] as one self-contained transition: either all of its
//! [`StoreChange`]s happen or none do. Listeners are notified after the transition is applied.

use crate::document::model::{Hint, SlideDocument, Step};
use crate::events::event::SlideEvent;
use crate::foundation::error::NavigationError;
use crate::state::task::{ActionMatch, TaskStatus, match_action};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Which forward jumps `go_to_step` accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// Forward navigation requires the required tasks of every step being left to be completed,
    /// and the target must be the next step or one visited before.
    #[default]
    Gated,
    /// Any in-range step is reachable.
    Free,
}

/// Mutation request understood by [`StateStore::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Match an interaction event against the active step's tasks.
    ApplyEvent(SlideEvent),
    /// Mark a task of the active step as started.
    MarkInProgress(String),
    /// Complete a task of the active step.
    CompleteTask(String),
    /// Reveal the lowest unrevealed hint of the active step.
    RevealNextHint,
    /// Move to another step, subject to the navigation policy.
    GoToStep(usize),
    /// Forget task and hint progress of one step.
    ResetStep(usize),
    /// Return to the freshly mounted state.
    ResetAll,
}

/// One observable transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum StoreChange {
    TaskStatus {
        step: usize,
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    HintRevealed {
        step: usize,
        level: u32,
    },
    StepChanged {
        from: usize,
        to: usize,
    },
    StepReset {
        step: usize,
    },
    /// Whole store returned to its mount state.
    Reset,
    Restored,
}

/// Per-step runtime state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StepState {
    pub(crate) task_status: BTreeMap<String, TaskStatus>,
    pub(crate) revealed_hint_levels: BTreeSet<u32>,
    pub(crate) visited: bool,
}

impl StepState {
    fn fresh(step: &Step) -> Self {
        Self {
            task_status: step
                .tasks
                .iter()
                .map(|t| (t.id.clone(), TaskStatus::Pending))
                .collect(),
            revealed_hint_levels: BTreeSet::new(),
            visited: false,
        }
    }
}

/// Identifier returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&StoreChange)>;

/// Completion counts for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub required_total: usize,
    pub required_completed: usize,
    pub optional_total: usize,
    pub optional_completed: usize,
    pub hints_revealed: usize,
    pub hints_total: usize,
}

/// Active step, per-task status and per-hint reveal progress for one document.
pub struct StateStore {
    document: Rc<SlideDocument>,
    policy: NavigationPolicy,
    track_in_progress: bool,
    active: usize,
    pub(crate) steps: Vec<StepState>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("document", &self.document.id)
            .field("policy", &self.policy)
            .field("active", &self.active)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Fresh state: step 0 active and visited, every task pending, no hints revealed.
    pub fn new(document: Rc<SlideDocument>, policy: NavigationPolicy) -> Self {
        let mut steps: Vec<StepState> = document.steps.iter().map(StepState::fresh).collect();
        if let Some(first) = steps.first_mut() {
            first.visited = true;
        }
        Self {
            document,
            policy,
            track_in_progress: true,
            active: 0,
            steps,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Enable or disable the informational `in_progress` status on partial matches.
    pub fn set_track_in_progress(&mut self, on: bool) {
        self.track_in_progress = on;
    }

    /// Document this state belongs to.
    pub fn document(&self) -> &Rc<SlideDocument> {
        &self.document
    }

    /// Navigation policy in effect.
    pub fn policy(&self) -> NavigationPolicy {
        self.policy
    }

    // ----------------------------
    // Selectors
    // ----------------------------

    pub fn active_step_index(&self) -> usize {
        self.active
    }

    pub fn active_step(&self) -> Option<&Step> {
        self.document.step(self.active)
    }

    /// Status of a task of the active step.
    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.task_status_in(self.active, task_id)
    }

    /// Status of a task of any step.
    pub fn task_status_in(&self, step: usize, task_id: &str) -> Option<TaskStatus> {
        self.steps.get(step)?.task_status.get(task_id).copied()
    }

    /// `true` iff every task of `step` with `required = true` is completed.
    pub fn are_required_tasks_complete(&self, step: usize) -> bool {
        self.missing_required(step).is_empty()
    }

    /// Ids of the required tasks of `step` that are not completed, in authored order.
    pub fn missing_required(&self, step: usize) -> Vec<String> {
        let (Some(def), Some(state)) = (self.document.step(step), self.steps.get(step)) else {
            return Vec::new();
        };
        def.required_tasks()
            .filter(|t| state.task_status.get(&t.id) != Some(&TaskStatus::Completed))
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn is_hint_revealed(&self, step: usize, level: u32) -> bool {
        self.steps
            .get(step)
            .is_some_and(|s| s.revealed_hint_levels.contains(&level))
    }

    /// Revealed hints of `step`, ascending by level.
    pub fn revealed_hints(&self, step: usize) -> Vec<&Hint> {
        let (Some(def), Some(state)) = (self.document.step(step), self.steps.get(step)) else {
            return Vec::new();
        };
        def.hints_by_level()
            .into_iter()
            .filter(|h| state.revealed_hint_levels.contains(&h.level))
            .collect()
    }

    /// Hint `reveal_next_hint` would reveal on `step`.
    pub fn next_hint(&self, step: usize) -> Option<&Hint> {
        let def = self.document.step(step)?;
        let state = self.steps.get(step)?;
        def.hints_by_level()
            .into_iter()
            .find(|h| !state.revealed_hint_levels.contains(&h.level))
    }

    pub fn is_step_visited(&self, step: usize) -> bool {
        self.steps.get(step).is_some_and(|s| s.visited)
    }

    pub fn step_progress(&self, step: usize) -> StepProgress {
        let (Some(def), Some(state)) = (self.document.step(step), self.steps.get(step)) else {
            return StepProgress::default();
        };
        let mut p = StepProgress {
            hints_total: def.hints.len(),
            hints_revealed: state.revealed_hint_levels.len(),
            ..StepProgress::default()
        };
        for task in &def.tasks {
            let done = state.task_status.get(&task.id) == Some(&TaskStatus::Completed);
            if task.required {
                p.required_total += 1;
                p.required_completed += usize::from(done);
            } else {
                p.optional_total += 1;
                p.optional_completed += usize::from(done);
            }
        }
        p
    }

    /// `true` once the final step is active and its required tasks are completed.
    pub fn is_document_complete(&self) -> bool {
        let last = self.document.steps.len().saturating_sub(1);
        self.active == last && self.are_required_tasks_complete(last)
    }

    // ----------------------------
    // Observers
    // ----------------------------

    /// Register a listener called with every change, after the transition is applied.
    ///
    /// Listeners run while the store is mutably borrowed and must not call back into it.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&StoreChange) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    // ----------------------------
    // Mutations
    // ----------------------------

    pub fn apply_event(&mut self, event: &SlideEvent) -> Vec<StoreChange> {
        self.dispatch(StoreAction::ApplyEvent(event.clone()))
            .unwrap_or_default()
    }

    pub fn mark_task_in_progress(&mut self, task_id: &str) -> Vec<StoreChange> {
        self.dispatch(StoreAction::MarkInProgress(task_id.to_owned()))
            .unwrap_or_default()
    }

    /// Complete a task of the active step. Completing a completed task is a no-op.
    pub fn complete_task(&mut self, task_id: &str) -> Vec<StoreChange> {
        self.dispatch(StoreAction::CompleteTask(task_id.to_owned()))
            .unwrap_or_default()
    }

    /// Reveal the lowest-level unrevealed hint of the active step. Returns its level.
    pub fn reveal_next_hint(&mut self) -> Option<u32> {
        let changes = self.dispatch(StoreAction::RevealNextHint).unwrap_or_default();
        changes.iter().find_map(|c| match c {
            StoreChange::HintRevealed { level, .. } => Some(*level),
            _ => None,
        })
    }

    pub fn go_to_step(&mut self, index: usize) -> Result<Vec<StoreChange>, NavigationError> {
        self.dispatch(StoreAction::GoToStep(index))
    }

    pub fn reset_step(&mut self, index: usize) -> Vec<StoreChange> {
        self.dispatch(StoreAction::ResetStep(index))
            .unwrap_or_default()
    }

    pub fn reset_all(&mut self) -> Vec<StoreChange> {
        self.dispatch(StoreAction::ResetAll).unwrap_or_default()
    }

    /// Apply one action as a single transition and notify listeners of what changed.
    #[tracing::instrument(level = "debug", skip(self), fields(doc = %self.document.id))]
    pub fn dispatch(&mut self, action: StoreAction) -> Result<Vec<StoreChange>, NavigationError> {
        let planned = match action {
            StoreAction::ApplyEvent(event) => Ok(self.reduce_event(&event)),
            StoreAction::MarkInProgress(task) => {
                Ok(self.reduce_task(&task, TaskStatus::InProgress))
            }
            StoreAction::CompleteTask(task) => Ok(self.reduce_task(&task, TaskStatus::Completed)),
            StoreAction::RevealNextHint => Ok(self.reduce_reveal()),
            StoreAction::GoToStep(index) => self.reduce_go_to(index),
            StoreAction::ResetStep(index) => Ok(self.reduce_reset_step(index)),
            StoreAction::ResetAll => Ok(self.reduce_reset_all()),
        };
        self.commit(planned)
    }

    fn commit(
        &mut self,
        planned: Result<Vec<StoreChange>, NavigationError>,
    ) -> Result<Vec<StoreChange>, NavigationError> {
        let changes = planned?;
        for change in &changes {
            self.apply_change(change);
        }
        for change in &changes {
            tracing::debug!(?change, "store change");
            for (_, listener) in &mut self.listeners {
                listener(change);
            }
        }
        Ok(changes)
    }

    // Reducers compute the change list without touching state; `apply_change` performs it.

    fn reduce_event(&self, event: &SlideEvent) -> Vec<StoreChange> {
        let (Some(def), Some(state)) = (self.document.step(self.active), self.steps.get(self.active))
        else {
            return Vec::new();
        };

        let mut changes = Vec::new();
        for task in &def.tasks {
            let current = state
                .task_status
                .get(&task.id)
                .copied()
                .unwrap_or_default();
            let wanted = match match_action(&task.action, event) {
                ActionMatch::Complete => TaskStatus::Completed,
                ActionMatch::Partial if self.track_in_progress => TaskStatus::InProgress,
                ActionMatch::Partial | ActionMatch::None => continue,
            };
            if let Some(to) = current.advance(wanted) {
                changes.push(StoreChange::TaskStatus {
                    step: self.active,
                    task: task.id.clone(),
                    from: current,
                    to,
                });
            }
        }
        if changes.is_empty() {
            tracing::trace!(kind = %event.kind, "event matched no task");
        }
        changes
    }

    fn reduce_task(&self, task_id: &str, wanted: TaskStatus) -> Vec<StoreChange> {
        let Some(current) = self.task_status(task_id) else {
            tracing::warn!(task = task_id, step = self.active, "unknown task id");
            return Vec::new();
        };
        if wanted == TaskStatus::InProgress && !self.track_in_progress {
            return Vec::new();
        }
        match current.advance(wanted) {
            Some(to) => vec![StoreChange::TaskStatus {
                step: self.active,
                task: task_id.to_owned(),
                from: current,
                to,
            }],
            None => Vec::new(),
        }
    }

    fn reduce_reveal(&self) -> Vec<StoreChange> {
        match self.next_hint(self.active) {
            Some(h) => vec![StoreChange::HintRevealed {
                step: self.active,
                level: h.level,
            }],
            None => Vec::new(),
        }
    }

    fn reduce_go_to(&self, index: usize) -> Result<Vec<StoreChange>, NavigationError> {
        let len = self.steps.len();
        if index >= len {
            return Err(NavigationError::OutOfRange { index, len });
        }
        if index == self.active {
            return Ok(Vec::new());
        }
        if index > self.active && self.policy == NavigationPolicy::Gated {
            for step in self.active..index {
                let missing = self.missing_required(step);
                if !missing.is_empty() {
                    return Err(NavigationError::Gated { step, missing });
                }
            }
            if index > self.active + 1 && !self.is_step_visited(index) {
                return Err(NavigationError::NotReachable {
                    index,
                    active: self.active,
                });
            }
        }
        Ok(vec![StoreChange::StepChanged {
            from: self.active,
            to: index,
        }])
    }

    fn reduce_reset_step(&self, index: usize) -> Vec<StoreChange> {
        let Some(state) = self.steps.get(index) else {
            return Vec::new();
        };
        let untouched = state.revealed_hint_levels.is_empty()
            && state
                .task_status
                .values()
                .all(|s| *s == TaskStatus::Pending);
        if untouched {
            return Vec::new();
        }
        vec![StoreChange::StepReset { step: index }]
    }

    fn reduce_reset_all(&self) -> Vec<StoreChange> {
        vec![StoreChange::Reset]
    }

    fn apply_change(&mut self, change: &StoreChange) {
        match change {
            StoreChange::TaskStatus { step, task, to, .. } => {
                if let Some(s) = self.steps.get_mut(*step) {
                    s.task_status.insert(task.clone(), *to);
                }
            }
            StoreChange::HintRevealed { step, level } => {
                if let Some(s) = self.steps.get_mut(*step) {
                    s.revealed_hint_levels.insert(*level);
                }
            }
            StoreChange::StepChanged { to, .. } => {
                self.active = *to;
                if let Some(s) = self.steps.get_mut(*to) {
                    s.visited = true;
                }
            }
            StoreChange::StepReset { step } => {
                if let (Some(def), Some(s)) =
                    (self.document.steps.get(*step), self.steps.get_mut(*step))
                {
                    let visited = s.visited;
                    *s = StepState::fresh(def);
                    s.visited = visited;
                }
            }
            StoreChange::Reset => {
                self.active = 0;
                self.steps = self.document.steps.iter().map(StepState::fresh).collect();
                if let Some(first) = self.steps.first_mut() {
                    first.visited = true;
                }
            }
            StoreChange::Restored => {}
        }
    }

    /// Replace every step state at once and notify listeners with [`StoreChange::Restored`].
    pub(crate) fn replace_state(&mut self, active: usize, steps: Vec<StepState>) {
        self.active = active;
        self.steps = steps;
        let _ = self.commit(Ok(vec![StoreChange::Restored]));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/store.rs"]
mod tests;
