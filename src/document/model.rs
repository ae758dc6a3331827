use crate::events::event::EventKind;
use crate::layout::visibility::Visibility;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authored slide document consumed by the runtime. Read-only once mounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideDocument {
    /// Document identity.
    pub id: String,
    /// Document version, normalized to a string.
    pub version: DocumentVersion,
    /// Authoring metadata; not read by the runtime.
    #[serde(default)]
    pub concept: Concept,
    /// Layout descriptor shared by every step.
    pub layout: Layout,
    /// Boolean switches gating slots and visibility predicates.
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    /// Ordered steps.
    pub steps: Vec<Step>,
    /// Message shown once the final step is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_message: Option<String>,
}

impl SlideDocument {
    /// Step at `index`, if any.
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Index of the step with id `id`.
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Value of a feature flag; missing flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.feature_flags.get(name).copied().unwrap_or(false)
    }
}

/// Document version. Accepts a JSON string or number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct DocumentVersion(pub String);

impl<'de> Deserialize<'de> for DocumentVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(serde_json::Number),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => Ok(Self(s)),
            Repr::Num(n) => Ok(Self(n.to_string())),
        }
    }
}

impl std::fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Title/objective metadata. Extra authoring keys are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Layout descriptor: an opaque arrangement type plus the ordered slot names it declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Arrangement type (`vertical`, `horizontal`, `grid`, ...). Opaque to the runtime.
    #[serde(rename = "type")]
    pub kind: String,
    /// Declared slot names, in display order.
    pub slots: Vec<String>,
    /// Slot name -> feature flag that must be `true` for the slot to show.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gates: BTreeMap<String, String>,
}

impl Layout {
    /// Return `true` when `slot` is one of the declared slot names.
    pub fn declares(&self, slot: &str) -> bool {
        self.slots.iter().any(|s| s == slot)
    }

    /// Feature flag gating `slot`, if any.
    pub fn gate_for(&self, slot: &str) -> Option<&str> {
        self.gates.get(slot).map(String::as_str)
    }
}

/// Pedagogical phase of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Explain,
    Guided,
    Construct,
    Outcome,
}

/// One unit of guided progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub phase: Phase,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub hints: Vec<Hint>,
    /// Slot name -> blocks assigned to it, in render order.
    #[serde(default)]
    pub slots: BTreeMap<String, Vec<ContentBlock>>,
}

impl Step {
    /// Task with id `id`, if any.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Iterator over tasks with `required = true`.
    pub fn required_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.required)
    }

    /// Hints sorted by ascending level.
    pub fn hints_by_level(&self) -> Vec<&Hint> {
        let mut hints: Vec<&Hint> = self.hints.iter().collect();
        hints.sort_by_key(|h| h.level);
        hints
    }

    /// Hint with level `level`, if any.
    pub fn hint(&self, level: u32) -> Option<&Hint> {
        self.hints.iter().find(|h| h.level == level)
    }

    /// Every `(slot, block)` assignment of this step.
    pub fn blocks(&self) -> impl Iterator<Item = (&str, &ContentBlock)> {
        self.slots
            .iter()
            .flat_map(|(slot, blocks)| blocks.iter().map(move |b| (slot.as_str(), b)))
    }
}

fn default_required() -> bool {
    true
}

/// Required or optional learner action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_required")]
    pub required: bool,
    pub action: ActionDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
}

/// What event completes a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
}

/// Action type. Unknown strings are kept so the document still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Event(EventKind),
    Unrecognized(String),
}

impl Serialize for ActionKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ActionKind::Event(k) => serializer.serialize_str(k.as_str()),
            ActionKind::Unrecognized(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.parse::<EventKind>() {
            Ok(k) => ActionKind::Event(k),
            Err(_) => ActionKind::Unrecognized(s),
        })
    }
}

impl From<EventKind> for ActionKind {
    fn from(k: EventKind) -> Self {
        ActionKind::Event(k)
    }
}

/// Check applied to an event's value before it completes a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum ValidationRule {
    Equals {
        value: serde_json::Value,
    },
    EqualsIgnoreCase {
        value: String,
    },
    OneOf {
        values: Vec<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Contains {
        text: String,
        #[serde(default)]
        ignore_case: bool,
    },
    NonEmpty,
    MinLength {
        length: usize,
    },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Same elements regardless of order.
    SameItems {
        values: Vec<serde_json::Value>,
    },
}

/// Leveled guidance string, revealed in ascending level order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub level: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Typed unit of renderable content. `config` is opaque to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Visibility>,
}
