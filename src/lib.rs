//! Stepdeck is a runtime for interactive, step-based slides.
//!
//! A slide document is an ordered list of steps; each step carries tasks the learner must
//! perform, leveled hints, and content blocks assigned to named layout slots. The public API is
//! session-oriented:
//!
//! - Load and validate a [`SlideDocument`]
//! - Register block renderers in a [`BlockRegistry`]
//! - Mount a [`SlideSession`], feed it interaction events through its [`EventBus`], and render
//!   the active step
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod blocks;
pub(crate) mod document;
pub(crate) mod events;
pub(crate) mod layout;
pub(crate) mod session;
pub(crate) mod state;

pub use crate::foundation::error::{NavigationError, SlideError, SlideResult};
pub use crate::foundation::warning::AuthoringWarning;

pub use crate::blocks::registry::{
    BlockProps, BlockRegistry, BlockRenderer, FnRenderer, PassthroughRenderer, RenderBody,
    RenderedBlock, renderer_fn,
};
pub use crate::document::model::{
    ActionDescriptor, ActionKind, Concept, ContentBlock, DocumentVersion, Hint, Layout, Phase,
    SlideDocument, Step, Task, ValidationRule,
};
pub use crate::document::validate::{SchemaError, SchemaErrors};
pub use crate::events::bus::{
    BlockEmitter, Delivery, EventBus, HandlerFailure, HandlerResult, Subscription, SubscriptionId,
};
pub use crate::events::event::{EventKind, SlideEvent, UnknownEventKind};
pub use crate::layout::resolver::{ResolvedSlot, ResolvedSlots, SlotResolver};
pub use crate::layout::visibility::{Visibility, VisibilityScope};
pub use crate::session::replay::{
    RejectedOp, ReplayOp, ReplayReport, load_script, parse_script,
};
pub use crate::session::slide_session::{
    RenderedSlot, RenderedStep, SessionHooks, SessionOpts, SlideSession,
};
pub use crate::state::snapshot::{RuntimeSnapshot, StepSnapshot};
pub use crate::state::store::{
    ListenerId, NavigationPolicy, StateStore, StepProgress, StoreAction, StoreChange,
};
pub use crate::state::task::{ActionMatch, TaskStatus, match_action, values_equal};

/// Check a document without mounting it: schema errors first, then authoring warnings.
///
/// `known_types` are the block type tags the host will register; pass `None` to skip the
/// unsupported-type check.
pub fn check_document(
    doc: &SlideDocument,
    known_types: Option<&[&str]>,
) -> Result<Vec<AuthoringWarning>, SchemaErrors> {
    document::validate::validate_document(doc)?;
    let mut warnings = doc.lint();
    if let Some(types) = known_types {
        let registry = BlockRegistry::with_passthrough(types.iter().copied());
        warnings.extend(registry.lint(doc));
    }
    Ok(warnings)
}
