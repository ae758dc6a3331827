//! Scripted interaction replay.
//!
//! A script is a JSON array of [`ReplayOp`]s. Replaying the same script against a freshly
//! mounted session always produces the same state, which is what makes runtime snapshots
//! reproducible.

use crate::events::event::SlideEvent;
use crate::foundation::error::{SlideError, SlideResult};
use crate::session::slide_session::SlideSession;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One scripted interaction.
///
/// JSON shape is externally tagged: `{"emit": {"type": "click", "targetId": "btn"}}`,
/// `"revealHint"`, `{"goToStep": 1}`, `"nextStep"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplayOp {
    Emit(SlideEvent),
    RevealHint,
    GoToStep(usize),
    NextStep,
    PreviousStep,
    CompleteTask(String),
    MarkInProgress(String),
    ResetStep(usize),
    Reset,
}

/// Operation that did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedOp {
    /// Position in the script.
    pub index: usize,
    pub reason: String,
}

/// Summary of one [`SlideSession::replay`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub applied: usize,
    pub rejected: Vec<RejectedOp>,
    pub handler_failures: usize,
}

/// Parse a replay script from JSON text.
pub fn parse_script(s: &str) -> SlideResult<Vec<ReplayOp>> {
    serde_json::from_str(s).map_err(|e| SlideError::serde(format!("parse replay script: {e}")))
}

/// Read and parse a replay script file.
pub fn load_script(path: impl AsRef<Path>) -> SlideResult<Vec<ReplayOp>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        SlideError::validation(format!("read replay script '{}': {e}", path.display()))
    })?;
    parse_script(&text)
}

impl SlideSession {
    /// Apply `ops` in order. Rejected navigation does not stop the run.
    #[tracing::instrument(skip_all, fields(doc = %self.document().id, ops = ops.len()))]
    pub fn replay(&self, ops: &[ReplayOp]) -> ReplayReport {
        let mut report = ReplayReport::default();
        for (index, op) in ops.iter().enumerate() {
            let outcome = match op {
                ReplayOp::Emit(event) => {
                    report.handler_failures += self.emit(event.clone()).failures.len();
                    Ok(())
                }
                ReplayOp::RevealHint => {
                    self.reveal_next_hint();
                    Ok(())
                }
                ReplayOp::GoToStep(i) => self.go_to_step(*i),
                ReplayOp::NextStep => self.next_step(),
                ReplayOp::PreviousStep => self.previous_step(),
                ReplayOp::CompleteTask(id) => {
                    self.complete_task(id);
                    Ok(())
                }
                ReplayOp::MarkInProgress(id) => {
                    self.mark_task_in_progress(id);
                    Ok(())
                }
                ReplayOp::ResetStep(i) => {
                    self.reset_step(*i);
                    Ok(())
                }
                ReplayOp::Reset => {
                    self.reset();
                    Ok(())
                }
            };
            match outcome {
                Ok(()) => report.applied += 1,
                Err(e) => report.rejected.push(RejectedOp {
                    index,
                    reason: e.to_string(),
                }),
            }
        }
        tracing::debug!(
            applied = report.applied,
            rejected = report.rejected.len(),
            "replay finished"
        );
        report
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/replay.rs"]
mod tests;
