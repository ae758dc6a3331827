//! Synchronous publish/subscribe channel between content blocks and the runtime.
//!
//! ## Rules
//! - **Synchronous, in-order**: `emit` runs every handler subscribed to the event's kind, in
//!   subscription order, before returning.
//! - **Snapshot per emission**: handlers subscribed while an event is being delivered are not
//!   invoked for that event; handlers unsubscribed mid-delivery are skipped if not yet reached.
//! - **No history**: a handler only sees events emitted after it subscribed.
//! - **Isolation**: a handler that returns `Err` or panics does not stop delivery to its
//!   siblings. Failures are returned in the [`Delivery`] report and passed to the failure sink.

use crate::events::event::{EventKind, SlideEvent};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// Result type returned by bus handlers.
pub type HandlerResult = anyhow::Result<()>;

type Handler = dyn FnMut(&SlideEvent) -> HandlerResult;
type FailureSink = dyn Fn(&HandlerFailure);
type SettleHook = dyn Fn(&SlideEvent, &Delivery);

/// Identifier of one subscription on one bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Topic {
    Kind(EventKind),
    All,
}

impl Topic {
    fn matches(self, kind: EventKind) -> bool {
        match self {
            Topic::Kind(k) => k == kind,
            Topic::All => true,
        }
    }
}

struct Entry {
    id: SubscriptionId,
    topic: Topic,
    live: Rc<Cell<bool>>,
    handler: Rc<RefCell<Handler>>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    entries: Vec<Entry>,
    failure_sink: Option<Rc<FailureSink>>,
    settle_hook: Option<Rc<SettleHook>>,
}

/// A handler that failed while an event was being delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Subscription whose handler failed.
    pub subscription: SubscriptionId,
    /// Kind of the event being delivered.
    pub kind: EventKind,
    /// Error or panic message.
    pub message: String,
    /// `true` when the handler panicked rather than returning `Err`.
    pub panicked: bool,
}

/// Outcome of one [`EventBus::emit`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Number of handlers invoked.
    pub delivered: usize,
    /// Handlers that failed, in invocation order.
    pub failures: Vec<HandlerFailure>,
}

impl Delivery {
    /// Return `true` when every invoked handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Single-threaded event bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&SlideEvent) -> HandlerResult + 'static,
    {
        self.add(Topic::Kind(kind), Rc::new(RefCell::new(handler)))
    }

    /// Subscribe `handler` to every event regardless of kind.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&SlideEvent) -> HandlerResult + 'static,
    {
        self.add(Topic::All, Rc::new(RefCell::new(handler)))
    }

    fn add(&self, topic: Topic, handler: Rc<RefCell<Handler>>) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            topic,
            live: Rc::new(Cell::new(true)),
            handler,
        });
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_entry(&self.inner, id)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Install the sink that receives every handler failure.
    pub fn set_failure_sink<F>(&self, sink: F)
    where
        F: Fn(&HandlerFailure) + 'static,
    {
        self.inner.borrow_mut().failure_sink = Some(Rc::new(sink));
    }

    /// Install the hook run once after all handlers of an emission returned.
    pub fn set_settle_hook<F>(&self, hook: F)
    where
        F: Fn(&SlideEvent, &Delivery) + 'static,
    {
        self.inner.borrow_mut().settle_hook = Some(Rc::new(hook));
    }

    /// Deliver `event` to every matching handler.
    pub fn emit(&self, event: &SlideEvent) -> Delivery {
        let (targets, sink, settle) = {
            let inner = self.inner.borrow();
            let targets: Vec<_> = inner
                .entries
                .iter()
                .filter(|e| e.topic.matches(event.kind))
                .map(|e| (e.id, Rc::clone(&e.live), Rc::clone(&e.handler)))
                .collect();
            (
                targets,
                inner.failure_sink.clone(),
                inner.settle_hook.clone(),
            )
        };

        tracing::trace!(kind = %event.kind, handlers = targets.len(), "emit");

        let mut delivery = Delivery::default();
        for (id, live, handler) in targets {
            if !live.get() {
                continue;
            }
            delivery.delivered += 1;

            let failure = match handler.try_borrow_mut() {
                Ok(mut h) => match panic::catch_unwind(AssertUnwindSafe(|| (&mut *h)(event))) {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some((format!("{e:#}"), false)),
                    Err(payload) => Some((panic_message(payload.as_ref()), true)),
                },
                Err(_) => Some(("handler re-entered during its own delivery".to_owned(), false)),
            };

            if let Some((message, panicked)) = failure {
                let failure = HandlerFailure {
                    subscription: id,
                    kind: event.kind,
                    message,
                    panicked,
                };
                tracing::warn!(
                    subscription = ?failure.subscription,
                    kind = %failure.kind,
                    panicked = failure.panicked,
                    "event handler failed: {}",
                    failure.message
                );
                if let Some(sink) = &sink {
                    sink(&failure);
                }
                delivery.failures.push(failure);
            }
        }

        if let Some(settle) = settle {
            settle(event, &delivery);
        }
        delivery
    }
}

/// Handle returned by [`EventBus::subscribe`]; dropping it keeps the subscription alive.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<RefCell<BusInner>>,
}

impl Subscription {
    /// Id of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving events. Returns `false` if the bus is gone or the subscription was removed.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => remove_entry(&inner, self.id),
            None => false,
        }
    }
}

fn remove_entry(inner: &Rc<RefCell<BusInner>>, id: SubscriptionId) -> bool {
    let mut inner = inner.borrow_mut();
    let Some(pos) = inner.entries.iter().position(|e| e.id == id) else {
        return false;
    };
    let entry = inner.entries.remove(pos);
    entry.live.set(false);
    true
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

/// Emitting handle bound to one content block.
///
/// Renderers keep a clone and report learner interactions through it; the block id is filled in
/// as `sourceBlockId` when the event does not carry one.
#[derive(Clone, Debug)]
pub struct BlockEmitter {
    bus: EventBus,
    block_id: String,
}

impl BlockEmitter {
    /// Bind `block_id` to `bus`.
    pub fn new(bus: EventBus, block_id: impl Into<String>) -> Self {
        Self {
            bus,
            block_id: block_id.into(),
        }
    }

    /// Block this emitter reports for.
    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    /// Emit `event` on behalf of the bound block.
    pub fn emit(&self, mut event: SlideEvent) -> Delivery {
        if event.source_block_id.is_none() {
            event.source_block_id = Some(self.block_id.clone());
        }
        self.bus.emit(&event)
    }

    /// Emit a bare event of `kind` aimed at `target`.
    pub fn emit_kind(&self, kind: EventKind, target: Option<&str>) -> Delivery {
        let mut event = SlideEvent::new(kind);
        event.target_id = target.map(str::to_owned);
        self.emit(event)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/events/bus.rs"]
mod tests;
