//! Slide document schema validation and authoring lint.
//!
//! [`validate_document`] rejects documents the runtime cannot mount unambiguously (duplicate ids,
//! no steps, hint level 0, ...). [`lint_document`] reports problems the runtime degrades around.

use crate::document::model::{ActionKind, SlideDocument, Step};
use crate::events::event::EventKind;
use crate::foundation::warning::AuthoringWarning;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SchemaPathElem {
    Field(&'static str),
    Key(String),
    Index(usize),
}

/// One structural problem, addressed by a JSON path such as `$.steps[1].tasks[0].id`.
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub(crate) path: Vec<SchemaPathElem>,
    /// Human-readable description.
    pub message: String,
}

impl SchemaError {
    fn at(path: &[SchemaPathElem], message: impl Into<String>) -> Self {
        Self {
            path: path.to_vec(),
            message: message.into(),
        }
    }

    /// The JSON path of the offending value.
    pub fn path(&self) -> String {
        format_path(&self.path)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.message);
        }
        write!(f, "{}: {}", format_path(&self.path), self.message)
    }
}

fn format_path(path: &[SchemaPathElem]) -> String {
    let mut s = String::from("$");
    for p in path {
        match p {
            SchemaPathElem::Field(name) => {
                s.push('.');
                s.push_str(name);
            }
            SchemaPathElem::Key(key) => {
                s.push_str("[\"");
                s.push_str(key);
                s.push_str("\"]");
            }
            SchemaPathElem::Index(i) => {
                s.push('[');
                s.push_str(&i.to_string());
                s.push(']');
            }
        }
    }
    s
}

/// Every structural problem found in one validation pass.
#[derive(Debug, Clone)]
pub struct SchemaErrors {
    pub errors: Vec<SchemaError>,
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

pub(crate) fn validate_document(doc: &SlideDocument) -> Result<(), SchemaErrors> {
    let mut errors = Vec::new();

    if doc.id.trim().is_empty() {
        errors.push(SchemaError::at(
            &[SchemaPathElem::Field("id")],
            "id must be non-empty",
        ));
    }
    if doc.version.0.trim().is_empty() {
        errors.push(SchemaError::at(
            &[SchemaPathElem::Field("version")],
            "version must be non-empty",
        ));
    }

    validate_layout(doc, &mut errors);

    if doc.steps.is_empty() {
        errors.push(SchemaError::at(
            &[SchemaPathElem::Field("steps")],
            "document must have at least one step",
        ));
    }

    let mut step_ids = HashSet::<&str>::new();
    for (i, step) in doc.steps.iter().enumerate() {
        let mut path = vec![SchemaPathElem::Field("steps"), SchemaPathElem::Index(i)];
        if step.id.trim().is_empty() {
            path.push(SchemaPathElem::Field("id"));
            errors.push(SchemaError::at(&path, "step id must be non-empty"));
            path.pop();
        } else if !step_ids.insert(step.id.as_str()) {
            path.push(SchemaPathElem::Field("id"));
            errors.push(SchemaError::at(
                &path,
                format!("duplicate step id '{}'", step.id),
            ));
            path.pop();
        }
        validate_step(step, &mut path, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors { errors })
    }
}

fn validate_layout(doc: &SlideDocument, errors: &mut Vec<SchemaError>) {
    let base = [SchemaPathElem::Field("layout")];
    if doc.layout.kind.trim().is_empty() {
        errors.push(SchemaError::at(
            &[base[0].clone(), SchemaPathElem::Field("type")],
            "layout type must be non-empty",
        ));
    }

    let mut seen = HashSet::<&str>::new();
    for (i, slot) in doc.layout.slots.iter().enumerate() {
        let path = [
            base[0].clone(),
            SchemaPathElem::Field("slots"),
            SchemaPathElem::Index(i),
        ];
        if slot.trim().is_empty() {
            errors.push(SchemaError::at(&path, "slot name must be non-empty"));
        } else if !seen.insert(slot.as_str()) {
            errors.push(SchemaError::at(
                &path,
                format!("duplicate slot name '{slot}'"),
            ));
        }
    }
}

fn validate_step(step: &Step, path: &mut Vec<SchemaPathElem>, errors: &mut Vec<SchemaError>) {
    let mut task_ids = HashSet::<&str>::new();
    for (i, task) in step.tasks.iter().enumerate() {
        path.extend([
            SchemaPathElem::Field("tasks"),
            SchemaPathElem::Index(i),
            SchemaPathElem::Field("id"),
        ]);
        if task.id.trim().is_empty() {
            errors.push(SchemaError::at(path, "task id must be non-empty"));
        } else if !task_ids.insert(task.id.as_str()) {
            errors.push(SchemaError::at(
                path,
                format!("duplicate task id '{}'", task.id),
            ));
        }
        path.truncate(path.len() - 3);
    }

    let mut levels = HashSet::<u32>::new();
    for (i, hint) in step.hints.iter().enumerate() {
        path.extend([
            SchemaPathElem::Field("hints"),
            SchemaPathElem::Index(i),
            SchemaPathElem::Field("level"),
        ]);
        if hint.level == 0 {
            errors.push(SchemaError::at(path, "hint level must be >= 1"));
        } else if !levels.insert(hint.level) {
            errors.push(SchemaError::at(
                path,
                format!("duplicate hint level {}", hint.level),
            ));
        }
        path.truncate(path.len() - 3);
    }

    let mut block_ids = HashSet::<&str>::new();
    for (slot, blocks) in &step.slots {
        for (i, block) in blocks.iter().enumerate() {
            path.extend([
                SchemaPathElem::Field("slots"),
                SchemaPathElem::Key(slot.clone()),
                SchemaPathElem::Index(i),
            ]);
            if block.id.trim().is_empty() {
                errors.push(SchemaError::at(path, "block id must be non-empty"));
            } else if !block_ids.insert(block.id.as_str()) {
                errors.push(SchemaError::at(
                    path,
                    format!("duplicate block id '{}'", block.id),
                ));
            }
            if block.block_type.trim().is_empty() {
                errors.push(SchemaError::at(path, "block type must be non-empty"));
            }
            path.truncate(path.len() - 3);
        }
    }
}

pub(crate) fn lint_document(doc: &SlideDocument) -> Vec<AuthoringWarning> {
    let mut warnings = Vec::new();

    for slot in doc.layout.gates.keys() {
        if !doc.layout.declares(slot) {
            warnings.push(AuthoringWarning::UnknownGateSlot { slot: slot.clone() });
        }
    }

    for step in &doc.steps {
        for task in &step.tasks {
            if let Some(reason) = action_defect(task) {
                warnings.push(AuthoringWarning::MalformedAction {
                    step: step.id.clone(),
                    task: task.id.clone(),
                    reason,
                });
            }
        }

        for (slot, block) in step.blocks() {
            if !doc.layout.declares(slot) {
                warnings.push(AuthoringWarning::UndeclaredSlot {
                    step: step.id.clone(),
                    slot: slot.to_owned(),
                    block: block.id.clone(),
                });
            }
            if let Some(pred) = &block.visible_when {
                for reference in pred.dangling_refs(step, doc) {
                    warnings.push(AuthoringWarning::UnknownVisibilityRef {
                        step: step.id.clone(),
                        block: block.id.clone(),
                        reference,
                    });
                }
            }
        }
    }

    warnings
}

fn action_defect(task: &crate::document::model::Task) -> Option<String> {
    let action = &task.action;
    match &action.kind {
        ActionKind::Unrecognized(s) => return Some(format!("unknown action type '{s}'")),
        ActionKind::Event(EventKind::Event) if action.event_id.is_none() => {
            return Some("'event' actions need an eventId".to_owned());
        }
        ActionKind::Event(_) => {}
    }
    if let Some(id) = &action.target_id {
        if id.trim().is_empty() {
            return Some("targetId must be non-empty when present".to_owned());
        }
    }
    action.validation.as_ref().and_then(|rule| rule.defect())
}

#[cfg(test)]
#[path = "../../tests/unit/document/validate.rs"]
mod tests;
