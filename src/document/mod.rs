//! Slide document boundary model.
//!
//! This is the JSON-facing representation produced by authoring tools. It is immutable once a
//! session mounts it; runtime state lives in [`crate::StateStore`].

mod load;
pub(crate) mod model;
pub(crate) mod validate;
