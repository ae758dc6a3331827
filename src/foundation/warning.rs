use serde::Serialize;

/// Non-fatal authoring problem.
///
/// The runtime degrades around each of these (placeholder, dropped assignment, never-matching
/// task) and surfaces them to the host so the author can fix the document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuthoringWarning {
    /// No renderer is registered for the block's type tag.
    #[error("step '{step}': block '{block}' has unsupported type '{block_type}'")]
    #[serde(rename_all = "camelCase")]
    UnknownBlockType {
        /// Step id.
        step: String,
        /// Block id.
        block: String,
        /// Unregistered type tag.
        block_type: String,
    },

    /// Block assigned to a slot name the layout does not declare.
    #[error("step '{step}': block '{block}' is assigned to undeclared slot '{slot}'")]
    UndeclaredSlot {
        /// Step id.
        step: String,
        /// Undeclared slot name.
        slot: String,
        /// Block id.
        block: String,
    },

    /// Task action descriptor that cannot be matched as written.
    #[error("step '{step}': task '{task}' has a malformed action: {reason}")]
    MalformedAction {
        /// Step id.
        step: String,
        /// Task id.
        task: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Visibility predicate naming a task, hint level or flag that does not exist.
    #[error("step '{step}': block '{block}' visibility refers to unknown {reference}")]
    UnknownVisibilityRef {
        /// Step id.
        step: String,
        /// Block id.
        block: String,
        /// Description of the dangling reference.
        reference: String,
    },

    /// Layout gate for a slot the layout does not declare.
    #[error("layout gate refers to undeclared slot '{slot}'")]
    UnknownGateSlot {
        /// Gated slot name.
        slot: String,
    },
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/warning.rs"]
mod tests;
