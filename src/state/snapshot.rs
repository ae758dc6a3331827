use crate::foundation::error::{SlideError, SlideResult};
use crate::state::store::{StateStore, StepState};
use crate::state::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Serializable copy of a store's runtime state.
///
/// The runtime never persists state on its own; hosts take a snapshot and hand it back to
/// [`StateStore::restore`] on a store mounted with the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub document_id: String,
    pub document_version: String,
    pub active_step_index: usize,
    pub steps: Vec<StepSnapshot>,
}

/// Runtime state of one step inside a [`RuntimeSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    pub step_id: String,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskStatus>,
    #[serde(default)]
    pub revealed_hint_levels: Vec<u32>,
}

impl StateStore {
    /// Capture the current runtime state.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        let doc = self.document();
        RuntimeSnapshot {
            document_id: doc.id.clone(),
            document_version: doc.version.0.clone(),
            active_step_index: self.active_step_index(),
            steps: doc
                .steps
                .iter()
                .zip(&self.steps)
                .map(|(def, state)| StepSnapshot {
                    step_id: def.id.clone(),
                    visited: state.visited,
                    tasks: state.task_status.clone(),
                    revealed_hint_levels: state.revealed_hint_levels.iter().copied().collect(),
                })
                .collect(),
        }
    }

    /// Replace the runtime state with `snapshot`.
    ///
    /// The snapshot is checked against the mounted document first; on any mismatch the store is
    /// left unchanged. Tasks missing from a step snapshot restore as pending.
    pub fn restore(&mut self, snapshot: &RuntimeSnapshot) -> SlideResult<()> {
        let doc = std::rc::Rc::clone(self.document());
        if snapshot.document_id != doc.id {
            return Err(SlideError::snapshot(format!(
                "snapshot is for document '{}', mounted document is '{}'",
                snapshot.document_id, doc.id
            )));
        }
        if snapshot.steps.len() != doc.steps.len() {
            return Err(SlideError::snapshot(format!(
                "snapshot has {} steps, document has {}",
                snapshot.steps.len(),
                doc.steps.len()
            )));
        }
        if snapshot.active_step_index >= doc.steps.len() {
            return Err(SlideError::snapshot(format!(
                "active step index {} is out of range",
                snapshot.active_step_index
            )));
        }

        let mut steps = Vec::with_capacity(doc.steps.len());
        for (i, (def, snap)) in doc.steps.iter().zip(&snapshot.steps).enumerate() {
            if snap.step_id != def.id {
                return Err(SlideError::snapshot(format!(
                    "step {i}: snapshot step '{}' does not match document step '{}'",
                    snap.step_id, def.id
                )));
            }

            let mut task_status: BTreeMap<String, TaskStatus> = def
                .tasks
                .iter()
                .map(|t| (t.id.clone(), TaskStatus::Pending))
                .collect();
            for (task, status) in &snap.tasks {
                let Some(slot) = task_status.get_mut(task) else {
                    return Err(SlideError::snapshot(format!(
                        "step '{}': unknown task '{task}'",
                        def.id
                    )));
                };
                *slot = *status;
            }

            let revealed: BTreeSet<u32> = snap.revealed_hint_levels.iter().copied().collect();
            let levels: Vec<u32> = def.hints_by_level().iter().map(|h| h.level).collect();
            if let Some(unknown) = revealed.iter().find(|l| !levels.contains(l)) {
                return Err(SlideError::snapshot(format!(
                    "step '{}': unknown hint level {unknown}",
                    def.id
                )));
            }
            // Hints reveal in ascending order, so the revealed set must be a prefix of the levels.
            if !levels.iter().take(revealed.len()).all(|l| revealed.contains(l)) {
                return Err(SlideError::snapshot(format!(
                    "step '{}': revealed hints skip a lower level",
                    def.id
                )));
            }

            steps.push(StepState {
                task_status,
                revealed_hint_levels: revealed,
                visited: snap.visited || i == snapshot.active_step_index,
            });
        }

        tracing::debug!(
            doc = %doc.id,
            active = snapshot.active_step_index,
            "restoring runtime snapshot"
        );
        self.replace_state(snapshot.active_step_index, steps);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/snapshot.rs"]
mod tests;
