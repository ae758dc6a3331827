use crate::document::model::{ActionDescriptor, ActionKind, ValidationRule};
use crate::events::event::SlideEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Runtime status of a task. Only moves forward; `Completed` is terminal until an explicit reset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Return `next` if moving there is a forward edge of the status machine.
    pub fn advance(self, next: TaskStatus) -> Option<TaskStatus> {
        (next > self).then_some(next)
    }
}

/// How an event relates to one task's action descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMatch {
    /// Every check passed; the task completes.
    Complete,
    /// The event aimed at the task's target or event id but failed another check.
    Partial,
    /// Unrelated event.
    None,
}

/// Match `event` against `action`.
///
/// An event completes a task when its kind equals the action type and every check the descriptor
/// carries (target id, event id, expected value, validation rule) passes.
pub fn match_action(action: &ActionDescriptor, event: &SlideEvent) -> ActionMatch {
    let touches = touches(action, event);

    let ActionKind::Event(kind) = &action.kind else {
        return ActionMatch::None;
    };

    let kind_ok = *kind == event.kind;
    let target_ok = action
        .target_id
        .as_deref()
        .is_none_or(|t| event.target_id.as_deref() == Some(t));
    let event_id_ok = action
        .event_id
        .as_deref()
        .is_none_or(|e| event.event_id.as_deref() == Some(e));
    let value_ok = match &action.value {
        Some(expected) => event.value.as_ref().is_some_and(|v| values_equal(expected, v)),
        None => true,
    };
    let rule_ok = match &action.validation {
        Some(rule) => rule.check(event.value.as_ref()),
        None => true,
    };

    if kind_ok && target_ok && event_id_ok && value_ok && rule_ok {
        ActionMatch::Complete
    } else if touches {
        ActionMatch::Partial
    } else {
        ActionMatch::None
    }
}

// An event "touches" a task when it names the task's target or signal, whatever its kind.
fn touches(action: &ActionDescriptor, event: &SlideEvent) -> bool {
    let by_target = action
        .target_id
        .as_deref()
        .is_some_and(|t| event.target_id.as_deref() == Some(t));
    let by_event = action
        .event_id
        .as_deref()
        .is_some_and(|e| event.event_id.as_deref() == Some(e));
    by_target || by_event
}

impl ValidationRule {
    /// Check an event value against this rule. A missing value fails every rule.
    pub fn check(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            ValidationRule::Equals { value: expected } => values_equal(expected, value),
            ValidationRule::EqualsIgnoreCase { value: expected } => value
                .as_str()
                .is_some_and(|s| s.trim().to_lowercase() == expected.trim().to_lowercase()),
            ValidationRule::OneOf { values } => values.iter().any(|v| values_equal(v, value)),
            ValidationRule::Contains { text, ignore_case } => match value.as_str() {
                Some(s) if *ignore_case => s.to_lowercase().contains(&text.to_lowercase()),
                Some(s) => s.contains(text.as_str()),
                None => false,
            },
            ValidationRule::NonEmpty => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
                Value::Bool(_) | Value::Number(_) => true,
            },
            ValidationRule::MinLength { length } => match value {
                Value::String(s) => s.trim().chars().count() >= *length,
                Value::Array(a) => a.len() >= *length,
                _ => false,
            },
            ValidationRule::Range { min, max } => as_number(value).is_some_and(|n| {
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            }),
            ValidationRule::SameItems { values } => match value {
                Value::Array(items) => same_items(values, items),
                _ => false,
            },
        }
    }

    /// Describe why this rule can never pass, if it is self-contradictory.
    pub fn defect(&self) -> Option<String> {
        match self {
            ValidationRule::Range {
                min: Some(lo),
                max: Some(hi),
            } if lo > hi => Some(format!("range min {lo} is greater than max {hi}")),
            ValidationRule::Range { min, max }
                if min.is_some_and(|v| !v.is_finite()) || max.is_some_and(|v| !v.is_finite()) =>
            {
                Some("range bounds must be finite".to_owned())
            }
            ValidationRule::OneOf { values } if values.is_empty() => {
                Some("oneOf needs at least one value".to_owned())
            }
            _ => None,
        }
    }
}

/// JSON equality where numbers compare by value (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn same_items(expected: &[Value], actual: &[Value]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    let mut used = vec![false; actual.len()];
    expected.iter().all(|e| {
        let found = actual
            .iter()
            .enumerate()
            .find(|(i, a)| !used[*i] && values_equal(e, a))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/state/task.rs"]
mod tests;
