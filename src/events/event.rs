use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interaction category carried by every [`SlideEvent`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Pointer press on a target.
    Click,
    /// Choice among options.
    Select,
    /// Boolean switch flip.
    Toggle,
    /// Drag start / drag in progress.
    Drag,
    /// Drag completion onto a drop target.
    Drop,
    /// Free-text entry.
    Input,
    /// Reordering of a list.
    Reorder,
    /// Opening or focusing an item for closer inspection.
    Inspect,
    /// Side-by-side comparison of items.
    Compare,
    /// Bare passive signal identified only by its event id.
    Event,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 10] = [
        EventKind::Click,
        EventKind::Select,
        EventKind::Toggle,
        EventKind::Drag,
        EventKind::Drop,
        EventKind::Input,
        EventKind::Reorder,
        EventKind::Inspect,
        EventKind::Compare,
        EventKind::Event,
    ];

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Select => "select",
            EventKind::Toggle => "toggle",
            EventKind::Drag => "drag",
            EventKind::Drop => "drop",
            EventKind::Input => "input",
            EventKind::Reorder => "reorder",
            EventKind::Inspect => "inspect",
            EventKind::Compare => "compare",
            EventKind::Event => "event",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name an [`EventKind`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

/// Learner interaction emitted by a rendered block.
///
/// Events are transient: the runtime keeps no log, only the task/hint state they produce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideEvent {
    /// Interaction category.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Block that emitted the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<String>,
    /// Element the interaction was aimed at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Author-defined signal name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Interaction payload (selected option, typed text, new order, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl SlideEvent {
    /// Event of `kind` with no target, id or value.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            source_block_id: None,
            target_id: None,
            event_id: None,
            value: None,
        }
    }

    /// Shorthand for a click on `target`.
    pub fn click(target: impl Into<String>) -> Self {
        Self::new(EventKind::Click).with_target(target)
    }

    /// Shorthand for a passive signal named `event_id`.
    pub fn signal(event_id: impl Into<String>) -> Self {
        Self::new(EventKind::Event).with_event_id(event_id)
    }

    /// Set the emitting block.
    pub fn from_block(mut self, block_id: impl Into<String>) -> Self {
        self.source_block_id = Some(block_id.into());
        self
    }

    /// Set the target id.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_id = Some(target.into());
        self
    }

    /// Set the event id.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Set the payload value.
    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}
