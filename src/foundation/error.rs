/// Convenience result type used across stepdeck.
pub type SlideResult<T> = Result<T, SlideError>;

/// Top-level error taxonomy used by runtime APIs.
///
/// Authoring problems that the runtime can degrade around are reported as
/// [`crate::AuthoringWarning`]s instead; this type is reserved for failures the caller must see.
#[derive(thiserror::Error, Debug)]
pub enum SlideError {
    /// Invalid slide document data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Rejected step navigation.
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Snapshot does not fit the mounted document.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlideError {
    /// Build a [`SlideError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SlideError::Snapshot`] value.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Build a [`SlideError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Reason a `go_to_step` request was rejected. The store is left untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// Target index does not name a step of the document.
    #[error("step index {index} is out of range (document has {len} steps)")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Number of steps in the document.
        len: usize,
    },

    /// Forward navigation past a step whose required tasks are not all completed.
    #[error("step {step} has incomplete required tasks: {}", missing.join(", "))]
    Gated {
        /// Index of the blocking step.
        step: usize,
        /// Ids of the required tasks that are not completed yet.
        missing: Vec<String>,
    },

    /// Forward jump onto a step that is neither next to the active one nor visited before.
    #[error("step {index} is not adjacent to step {active} and has not been visited")]
    NotReachable {
        /// Requested index.
        index: usize,
        /// Active step at the time of the request.
        active: usize,
    },
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
