use crate::blocks::registry::{BlockRegistry, RenderedBlock};
use crate::document::model::{Hint, Phase, SlideDocument, Step};
use crate::events::bus::{BlockEmitter, Delivery, EventBus, HandlerFailure};
use crate::events::event::SlideEvent;
use crate::foundation::error::{NavigationError, SlideResult};
use crate::foundation::warning::AuthoringWarning;
use crate::layout::resolver::{ResolvedSlots, SlotResolver};
use crate::layout::visibility::VisibilityScope;
use crate::state::snapshot::RuntimeSnapshot;
use crate::state::store::{NavigationPolicy, StateStore, StepProgress, StoreChange};
use crate::state::task::TaskStatus;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Options controlling a [`SlideSession`].
#[derive(Debug, Clone)]
pub struct SessionOpts {
    /// Forward navigation rule.
    pub navigation: NavigationPolicy,
    /// Record the informational `in_progress` status on partial matches.
    pub track_in_progress: bool,
    /// Run the document and registry lints at mount and report their warnings.
    pub lint_on_mount: bool,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            navigation: NavigationPolicy::Gated,
            track_in_progress: true,
            lint_on_mount: true,
        }
    }
}

type StepHook = dyn Fn(usize);
type CompleteHook = dyn Fn();
type EventHook = dyn Fn(&SlideEvent);
type WarningHook = dyn Fn(&AuthoringWarning);
type GateHook = dyn Fn(&NavigationError);
type ChangeHook = dyn Fn(&StoreChange);
type FailureHook = dyn Fn(&HandlerFailure);

/// Host callbacks. All are optional; hooks may call back into the session.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_step_change: Option<Rc<StepHook>>,
    on_complete: Option<Rc<CompleteHook>>,
    on_event: Option<Rc<EventHook>>,
    on_warning: Option<Rc<WarningHook>>,
    on_gate_rejected: Option<Rc<GateHook>>,
    on_store_change: Option<Rc<ChangeHook>>,
    on_handler_failure: Option<Rc<FailureHook>>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new index whenever the active step changed.
    pub fn on_step_change(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_step_change = Some(Rc::new(f));
        self
    }

    /// Called once when the final step is active and its required tasks are completed.
    pub fn on_complete(mut self, f: impl Fn() + 'static) -> Self {
        self.on_complete = Some(Rc::new(f));
        self
    }

    /// Observability hook called after every bus emission. No behavioral effect.
    pub fn on_event(mut self, f: impl Fn(&SlideEvent) + 'static) -> Self {
        self.on_event = Some(Rc::new(f));
        self
    }

    /// Called once per distinct authoring warning.
    pub fn on_warning(mut self, f: impl Fn(&AuthoringWarning) + 'static) -> Self {
        self.on_warning = Some(Rc::new(f));
        self
    }

    /// Called when a navigation request is rejected.
    pub fn on_gate_rejected(mut self, f: impl Fn(&NavigationError) + 'static) -> Self {
        self.on_gate_rejected = Some(Rc::new(f));
        self
    }

    /// Called with every store transition, after it is applied.
    pub fn on_store_change(mut self, f: impl Fn(&StoreChange) + 'static) -> Self {
        self.on_store_change = Some(Rc::new(f));
        self
    }

    /// Called when a bus handler fails during delivery.
    pub fn on_handler_failure(mut self, f: impl Fn(&HandlerFailure) + 'static) -> Self {
        self.on_handler_failure = Some(Rc::new(f));
        self
    }
}

struct Shared {
    document: Rc<SlideDocument>,
    store: RefCell<StateStore>,
    hooks: SessionHooks,
    pending: Rc<RefCell<Vec<StoreChange>>>,
    notified_step: Cell<usize>,
    completed: Cell<bool>,
    warnings: RefCell<Vec<AuthoringWarning>>,
}

impl Shared {
    // Re-derive gating after a mutation and tell the host what changed.
    fn settle(&self) {
        let changes: Vec<StoreChange> = self.pending.borrow_mut().drain(..).collect();
        if let Some(hook) = &self.hooks.on_store_change {
            for change in &changes {
                hook(change);
            }
        }

        let active = self.store.borrow().active_step_index();
        if active != self.notified_step.get() {
            self.notified_step.set(active);
            tracing::info!(doc = %self.document.id, step = active, "active step changed");
            if let Some(hook) = &self.hooks.on_step_change {
                hook(active);
            }
        }

        // Read after the step hook: it may have moved the session again.
        let complete = self.store.borrow().is_document_complete();
        if complete && !self.completed.get() {
            self.completed.set(true);
            tracing::info!(doc = %self.document.id, "document complete");
            if let Some(hook) = &self.hooks.on_complete {
                hook();
            }
        } else if !complete {
            self.completed.set(false);
        }
    }

    fn warn(&self, warning: AuthoringWarning) {
        {
            let mut seen = self.warnings.borrow_mut();
            if seen.contains(&warning) {
                return;
            }
            seen.push(warning.clone());
        }
        tracing::warn!(doc = %self.document.id, "authoring warning: {warning}");
        if let Some(hook) = &self.hooks.on_warning {
            hook(&warning);
        }
    }
}

/// One declared slot of the active step, rendered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSlot {
    pub name: String,
    pub enabled: bool,
    pub blocks: Vec<RenderedBlock>,
}

/// Render output for the active step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedStep {
    pub step_index: usize,
    pub step_id: String,
    pub phase: Phase,
    pub title: String,
    pub instruction: String,
    pub layout_type: String,
    pub slots: Vec<RenderedSlot>,
    pub revealed_hints: Vec<Hint>,
    pub progress: StepProgress,
    pub can_advance: bool,
}

/// A mounted slide document: owns the document, the state store, the event bus and the block
/// registry, and keeps them wired together.
///
/// Every bus emission is forwarded to the store; afterwards gating is re-derived and the host is
/// told about step changes and completion. The active step never changes on its own: advancing
/// is always an explicit call, gated by the navigation policy.
pub struct SlideSession {
    shared: Rc<Shared>,
    bus: EventBus,
    registry: BlockRegistry,
    opts: SessionOpts,
}

impl std::fmt::Debug for SlideSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideSession")
            .field("document", &self.shared.document.id)
            .field("active_step", &self.active_step_index())
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl SlideSession {
    /// Validate `document` and mount it: step 0 active, all tasks pending, no hints revealed.
    #[tracing::instrument(skip_all, fields(doc = %document.id))]
    pub fn mount(
        document: SlideDocument,
        registry: BlockRegistry,
        opts: SessionOpts,
        hooks: SessionHooks,
    ) -> SlideResult<Self> {
        document.validate()?;
        let document = Rc::new(document);

        let pending = Rc::new(RefCell::new(Vec::new()));
        let mut store = StateStore::new(Rc::clone(&document), opts.navigation);
        store.set_track_in_progress(opts.track_in_progress);
        let sink = Rc::clone(&pending);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let shared = Rc::new(Shared {
            document: Rc::clone(&document),
            store: RefCell::new(store),
            hooks,
            pending,
            notified_step: Cell::new(0),
            completed: Cell::new(false),
            warnings: RefCell::new(Vec::new()),
        });

        let bus = EventBus::new();
        wire_bus(&bus, &shared);

        if opts.lint_on_mount {
            for w in document.lint().into_iter().chain(registry.lint(&document)) {
                shared.warn(w);
            }
        }

        tracing::debug!(steps = document.steps.len(), "slide session mounted");
        shared.settle();

        Ok(Self {
            shared,
            bus,
            registry,
            opts,
        })
    }

    pub fn document(&self) -> &SlideDocument {
        &self.shared.document
    }

    pub fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    /// Bus the session listens on. Renderers and hosts may subscribe their own handlers.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BlockRegistry {
        &mut self.registry
    }

    /// Emitter bound to `block_id` on this session's bus.
    pub fn emitter(&self, block_id: &str) -> BlockEmitter {
        BlockEmitter::new(self.bus.clone(), block_id)
    }

    /// Emit `event` on the session bus.
    pub fn emit(&self, event: SlideEvent) -> Delivery {
        self.bus.emit(&event)
    }

    // ----------------------------
    // Selectors
    // ----------------------------

    pub fn active_step_index(&self) -> usize {
        self.shared.store.borrow().active_step_index()
    }

    pub fn active_step(&self) -> &Step {
        &self.shared.document.steps[self.active_step_index()]
    }

    /// Status of a task of the active step.
    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.shared.store.borrow().task_status(task_id)
    }

    pub fn are_required_tasks_complete(&self, step: usize) -> bool {
        self.shared.store.borrow().are_required_tasks_complete(step)
    }

    pub fn step_progress(&self, step: usize) -> StepProgress {
        self.shared.store.borrow().step_progress(step)
    }

    /// Revealed hints of the active step, ascending by level.
    pub fn revealed_hints(&self) -> Vec<Hint> {
        let store = self.shared.store.borrow();
        store
            .revealed_hints(store.active_step_index())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.shared.store.borrow().is_document_complete()
    }

    /// Run `f` with read access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&StateStore) -> R) -> R {
        f(&self.shared.store.borrow())
    }

    /// Every distinct authoring warning reported so far.
    pub fn warnings(&self) -> Vec<AuthoringWarning> {
        self.shared.warnings.borrow().clone()
    }

    // ----------------------------
    // Navigation
    // ----------------------------

    /// Move to step `index`. On rejection nothing changes and the gate hook is called.
    pub fn go_to_step(&self, index: usize) -> Result<(), NavigationError> {
        let result = self.shared.store.borrow_mut().go_to_step(index);
        match result {
            Ok(_) => {
                self.shared.settle();
                Ok(())
            }
            Err(err) => {
                tracing::info!(doc = %self.shared.document.id, index, "navigation rejected: {err}");
                if let Some(hook) = &self.shared.hooks.on_gate_rejected {
                    hook(&err);
                }
                Err(err)
            }
        }
    }

    pub fn next_step(&self) -> Result<(), NavigationError> {
        self.go_to_step(self.active_step_index() + 1)
    }

    /// Move back one step. A no-op on the first step.
    pub fn previous_step(&self) -> Result<(), NavigationError> {
        match self.active_step_index() {
            0 => Ok(()),
            i => self.go_to_step(i - 1),
        }
    }

    // ----------------------------
    // Direct mutations
    // ----------------------------

    /// Reveal the next hint of the active step.
    pub fn reveal_next_hint(&self) -> Option<Hint> {
        let level = self.shared.store.borrow_mut().reveal_next_hint();
        self.shared.settle();
        level.and_then(|l| self.active_step().hint(l).cloned())
    }

    /// Complete a task of the active step. Returns `true` if its status changed.
    pub fn complete_task(&self, task_id: &str) -> bool {
        let changed = !self.shared.store.borrow_mut().complete_task(task_id).is_empty();
        self.shared.settle();
        changed
    }

    pub fn mark_task_in_progress(&self, task_id: &str) -> bool {
        let changed = !self
            .shared
            .store
            .borrow_mut()
            .mark_task_in_progress(task_id)
            .is_empty();
        self.shared.settle();
        changed
    }

    /// Forget task and hint progress of one step.
    pub fn reset_step(&self, index: usize) {
        self.shared.store.borrow_mut().reset_step(index);
        self.shared.settle();
    }

    /// Return to the mount state.
    pub fn reset(&self) {
        self.shared.store.borrow_mut().reset_all();
        self.shared.settle();
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.shared.store.borrow().snapshot()
    }

    /// Restore a snapshot taken from a session over the same document.
    pub fn restore(&self, snapshot: &RuntimeSnapshot) -> SlideResult<()> {
        let result = self.shared.store.borrow_mut().restore(snapshot);
        self.shared.settle();
        result
    }

    // ----------------------------
    // Resolution & rendering
    // ----------------------------

    /// Slots of the active step with their currently visible blocks.
    pub fn resolve_slots(&self) -> ResolvedSlots<'_> {
        let doc: &SlideDocument = &self.shared.document;
        let resolved = {
            let store = self.shared.store.borrow();
            let step = &doc.steps[store.active_step_index()];
            let scope = VisibilityScope::active(doc, &store);
            SlotResolver::resolve(step, &doc.layout, &scope)
        };
        for w in &resolved.warnings {
            self.shared.warn(w.clone());
        }
        resolved
    }

    /// Resolve the active step and render every visible block through the registry.
    pub fn render_step(&self) -> RenderedStep {
        let resolved = self.resolve_slots();
        let step_index = self.active_step_index();
        let step = self.active_step();

        let slots = resolved
            .slots
            .iter()
            .map(|slot| {
                let blocks = slot
                    .blocks
                    .iter()
                    .map(|block| {
                        let (rendered, warning) =
                            self.registry.render(&step.id, block, self.emitter(&block.id));
                        if let Some(w) = warning {
                            self.shared.warn(w);
                        }
                        rendered
                    })
                    .collect();
                RenderedSlot {
                    name: slot.name.to_owned(),
                    enabled: slot.enabled,
                    blocks,
                }
            })
            .collect();

        RenderedStep {
            step_index,
            step_id: step.id.clone(),
            phase: step.phase,
            title: step.title.clone(),
            instruction: step.instruction.clone(),
            layout_type: resolved.layout_type.to_owned(),
            slots,
            revealed_hints: self.revealed_hints(),
            progress: self.step_progress(step_index),
            can_advance: self.are_required_tasks_complete(step_index),
        }
    }
}

fn wire_bus(bus: &EventBus, shared: &Rc<Shared>) {
    let weak = Rc::downgrade(shared);
    bus.subscribe_all(move |event| {
        let Some(shared) = weak.upgrade() else {
            return Ok(());
        };
        let mut store = shared
            .store
            .try_borrow_mut()
            .map_err(|_| anyhow::anyhow!("state store is busy; event '{}' dropped", event.kind))?;
        store.apply_event(event);
        Ok(())
    });

    let weak = Rc::downgrade(shared);
    bus.set_settle_hook(move |event, _| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if let Some(hook) = &shared.hooks.on_event {
            hook(event);
        }
        shared.settle();
    });

    let weak = Rc::downgrade(shared);
    bus.set_failure_sink(move |failure| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if let Some(hook) = &shared.hooks.on_handler_failure {
            hook(failure);
        }
    });
}

#[cfg(test)]
#[path = "../../tests/unit/session/slide_session.rs"]
mod tests;
