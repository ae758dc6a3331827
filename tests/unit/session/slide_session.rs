use super::*;
use crate::blocks::registry::{BlockRegistry, PassthroughRenderer, RenderBody, renderer_fn};
use crate::events::event::EventKind;
use crate::foundation::error::SlideError;
use serde_json::json;

fn lesson() -> SlideDocument {
    serde_json::from_value(json!({
        "id": "orchestrated",
        "version": "1",
        "layout": { "type": "horizontal", "slots": ["main", "aside"] },
        "steps": [
            {
                "id": "intro",
                "phase": "explain",
                "tasks": [
                    { "id": "t1", "action": { "type": "click", "targetId": "btn-a" } }
                ],
                "hints": [
                    { "level": 1, "content": "press the button" },
                    { "level": 3, "content": "the blue one" }
                ],
                "slots": {
                    "main": [
                        { "id": "b1", "type": "button" },
                        { "id": "b2", "type": "unregisteredType" },
                        { "id": "b3", "type": "text", "visibleWhen": { "taskCompleted": "t1" } }
                    ],
                    "GhostSlot": [{ "id": "g1", "type": "text" }]
                }
            },
            {
                "id": "finish",
                "phase": "outcome",
                "tasks": [
                    { "id": "t2", "action": { "type": "event", "eventId": "done" } }
                ]
            }
        ]
    }))
    .unwrap()
}

fn registry() -> BlockRegistry {
    let mut reg = BlockRegistry::new();
    reg.register("button", PassthroughRenderer);
    reg.register(
        "text",
        renderer_fn(|props| Ok(json!({ "id": props.id }))),
    );
    reg
}

#[derive(Default)]
struct Calls {
    steps: Vec<usize>,
    completed: usize,
    events: Vec<EventKind>,
    rejected: Vec<NavigationError>,
    warnings: Vec<AuthoringWarning>,
    changes: Vec<StoreChange>,
    failures: usize,
}

fn mount_recorded(opts: SessionOpts) -> (SlideSession, Rc<RefCell<Calls>>) {
    let calls = Rc::new(RefCell::new(Calls::default()));
    let c = |calls: &Rc<RefCell<Calls>>| Rc::clone(calls);

    let (a, b, d, e, f, g, h) = (
        c(&calls),
        c(&calls),
        c(&calls),
        c(&calls),
        c(&calls),
        c(&calls),
        c(&calls),
    );
    let hooks = SessionHooks::new()
        .on_step_change(move |i| a.borrow_mut().steps.push(i))
        .on_complete(move || b.borrow_mut().completed += 1)
        .on_event(move |ev| d.borrow_mut().events.push(ev.kind))
        .on_gate_rejected(move |err| e.borrow_mut().rejected.push(err.clone()))
        .on_warning(move |w| f.borrow_mut().warnings.push(w.clone()))
        .on_store_change(move |ch| g.borrow_mut().changes.push(ch.clone()))
        .on_handler_failure(move |_| h.borrow_mut().failures += 1);

    let session = SlideSession::mount(lesson(), registry(), opts, hooks).unwrap();
    (session, calls)
}

#[test]
fn mount_starts_at_step_zero_and_reports_lint() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    assert_eq!(session.active_step_index(), 0);
    assert_eq!(session.active_step().id, "intro");
    assert_eq!(session.task_status("t1"), Some(TaskStatus::Pending));
    assert!(!session.is_complete());

    let calls = calls.borrow();
    assert!(calls.steps.is_empty());
    assert_eq!(calls.completed, 0);
    assert_eq!(calls.warnings.len(), 2);
    assert!(calls.warnings.iter().any(|w| matches!(
        w,
        AuthoringWarning::UndeclaredSlot { block, .. } if block == "g1"
    )));
    assert!(calls.warnings.iter().any(|w| matches!(
        w,
        AuthoringWarning::UnknownBlockType { block, .. } if block == "b2"
    )));
}

#[test]
fn mount_rejects_invalid_documents() {
    let mut doc = lesson();
    doc.steps.clear();
    let err = SlideSession::mount(doc, registry(), SessionOpts::default(), SessionHooks::new())
        .unwrap_err();
    assert!(matches!(err, SlideError::Validation(_)));
}

#[test]
fn bus_events_drive_tasks_without_auto_advance() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    let delivery = session.emit(SlideEvent::click("btn-a"));
    assert!(delivery.is_clean());

    assert_eq!(session.task_status("t1"), Some(TaskStatus::Completed));
    assert!(session.are_required_tasks_complete(0));
    assert_eq!(session.active_step_index(), 0);

    let calls = calls.borrow();
    assert_eq!(calls.events, vec![EventKind::Click]);
    assert!(calls.steps.is_empty());
    assert_eq!(calls.changes.len(), 1);
}

#[test]
fn gated_navigation_reports_rejection() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    let err = session.next_step().unwrap_err();
    assert!(matches!(err, NavigationError::Gated { step: 0, .. }));
    assert_eq!(session.active_step_index(), 0);
    assert_eq!(calls.borrow().rejected, vec![err]);

    session.emit(SlideEvent::click("btn-a"));
    session.next_step().unwrap();
    assert_eq!(session.active_step_index(), 1);
    assert_eq!(calls.borrow().steps, vec![1]);

    session.previous_step().unwrap();
    session.previous_step().unwrap();
    assert_eq!(session.active_step_index(), 0);
    assert_eq!(calls.borrow().steps, vec![1, 0]);
}

#[test]
fn completion_fires_once() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    session.emit(SlideEvent::click("btn-a"));
    session.next_step().unwrap();
    session.emit(SlideEvent::signal("done"));
    session.emit(SlideEvent::signal("done"));

    assert!(session.is_complete());
    assert_eq!(calls.borrow().completed, 1);

    session.reset();
    assert!(!session.is_complete());
    assert_eq!(session.active_step_index(), 0);
    assert_eq!(calls.borrow().steps, vec![1, 0]);
}

#[test]
fn render_step_degrades_unknown_blocks_and_drops_ghost_slot() {
    let (session, _) = mount_recorded(SessionOpts::default());
    let step = session.render_step();

    assert_eq!(step.step_id, "intro");
    assert_eq!(step.layout_type, "horizontal");
    assert!(!step.can_advance);
    let names: Vec<&str> = step.slots.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["main", "aside"]);

    let main: Vec<&str> = step.slots[0]
        .blocks
        .iter()
        .map(|b| b.block_id.as_str())
        .collect();
    assert_eq!(main, vec!["b1", "b2"]);
    assert!(matches!(step.slots[0].blocks[0].body, RenderBody::Content { .. }));
    assert!(step.slots[0].blocks[1].is_placeholder());
    assert!(step.slots[1].blocks.is_empty());

    session.emit(SlideEvent::click("btn-a"));
    let step = session.render_step();
    let main: Vec<&str> = step.slots[0]
        .blocks
        .iter()
        .map(|b| b.block_id.as_str())
        .collect();
    assert_eq!(main, vec!["b1", "b2", "b3"]);
    assert!(step.can_advance);
}

#[test]
fn rendered_emitter_completes_tasks() {
    let (session, _) = mount_recorded(SessionOpts::default());
    let step = session.render_step();
    let button = &step.slots[0].blocks[0];
    button
        .emitter
        .as_ref()
        .unwrap()
        .emit_kind(EventKind::Click, Some("btn-a"));
    assert_eq!(session.task_status("t1"), Some(TaskStatus::Completed));
}

#[test]
fn warnings_are_reported_once() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    session.render_step();
    session.render_step();
    assert_eq!(calls.borrow().warnings.len(), 2);
    assert_eq!(session.warnings().len(), 2);
}

#[test]
fn lint_on_mount_can_be_disabled() {
    let opts = SessionOpts {
        lint_on_mount: false,
        ..SessionOpts::default()
    };
    let (session, calls) = mount_recorded(opts);
    assert!(calls.borrow().warnings.is_empty());
    session.resolve_slots();
    assert_eq!(calls.borrow().warnings.len(), 1);
}

#[test]
fn hints_reveal_in_order_through_session() {
    let (session, _) = mount_recorded(SessionOpts::default());
    assert_eq!(session.reveal_next_hint().map(|h| h.level), Some(1));
    assert_eq!(session.reveal_next_hint().map(|h| h.level), Some(3));
    assert!(session.reveal_next_hint().is_none());
    let levels: Vec<u32> = session.revealed_hints().iter().map(|h| h.level).collect();
    assert_eq!(levels, vec![1, 3]);
}

#[test]
fn failing_host_handler_does_not_break_the_store() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    session
        .bus()
        .subscribe(EventKind::Click, |_| anyhow::bail!("analytics offline"));

    let delivery = session.emit(SlideEvent::click("btn-a"));
    assert_eq!(delivery.failures.len(), 1);
    assert_eq!(calls.borrow().failures, 1);
    assert_eq!(session.task_status("t1"), Some(TaskStatus::Completed));
}

#[test]
fn hooks_may_call_back_into_the_session() {
    let doc = lesson();
    let slot: Rc<RefCell<Option<Rc<SlideSession>>>> = Rc::new(RefCell::new(None));
    let hook_slot = Rc::clone(&slot);
    let hooks = SessionHooks::new().on_event(move |_| {
        if let Some(s) = hook_slot.borrow().as_ref() {
            let _ = s.next_step();
        }
    });

    let session = Rc::new(
        SlideSession::mount(doc, registry(), SessionOpts::default(), hooks).unwrap(),
    );
    *slot.borrow_mut() = Some(Rc::clone(&session));

    session.emit(SlideEvent::click("btn-a"));
    assert_eq!(session.active_step_index(), 1);

    // Break the cycle so the session is dropped.
    slot.borrow_mut().take();
}

#[test]
fn step_hook_reaching_the_end_completes_once() {
    let doc: SlideDocument = serde_json::from_value(json!({
        "id": "chained",
        "version": "1",
        "layout": { "type": "vertical", "slots": ["main"] },
        "steps": [
            {
                "id": "s1",
                "phase": "guided",
                "tasks": [{ "id": "t1", "action": { "type": "click", "targetId": "btn-a" } }],
                "hints": [{ "level": 1, "content": "press it" }]
            },
            { "id": "s2", "phase": "explain" },
            { "id": "s3", "phase": "outcome" }
        ]
    }))
    .unwrap();

    let slot: Rc<RefCell<Option<Rc<SlideSession>>>> = Rc::new(RefCell::new(None));
    let completed = Rc::new(Cell::new(0usize));
    let steps = Rc::new(RefCell::new(Vec::new()));
    let (hook_slot, hook_completed, hook_steps) =
        (Rc::clone(&slot), Rc::clone(&completed), Rc::clone(&steps));
    let hooks = SessionHooks::new()
        .on_step_change(move |i| {
            hook_steps.borrow_mut().push(i);
            if i == 1 {
                if let Some(s) = hook_slot.borrow().as_ref() {
                    let _ = s.next_step();
                }
            }
        })
        .on_complete(move || hook_completed.set(hook_completed.get() + 1));

    let session = Rc::new(
        SlideSession::mount(doc, registry(), SessionOpts::default(), hooks).unwrap(),
    );
    *slot.borrow_mut() = Some(Rc::clone(&session));

    session.emit(SlideEvent::click("btn-a"));
    session.next_step().unwrap();
    assert_eq!(session.active_step_index(), 2);
    assert!(session.is_complete());
    assert_eq!(completed.get(), 1);

    // Unrelated operations afterwards must not fire completion again.
    session.reveal_next_hint();
    session.emit(SlideEvent::signal("noise"));
    assert_eq!(completed.get(), 1);
    assert_eq!(*steps.borrow(), vec![1, 2]);

    slot.borrow_mut().take();
}

#[test]
fn snapshot_round_trips_through_session() {
    let (session, calls) = mount_recorded(SessionOpts::default());
    session.reveal_next_hint();
    session.emit(SlideEvent::click("btn-a"));
    session.next_step().unwrap();
    let snap = session.snapshot();

    let (other, other_calls) = mount_recorded(SessionOpts::default());
    other.restore(&snap).unwrap();
    assert_eq!(other.snapshot(), snap);
    assert_eq!(other.active_step_index(), 1);
    assert_eq!(other_calls.borrow().steps, vec![1]);
    assert_eq!(calls.borrow().steps, vec![1]);
}

#[test]
fn free_navigation_allows_jumping_ahead() {
    let opts = SessionOpts {
        navigation: NavigationPolicy::Free,
        ..SessionOpts::default()
    };
    let (session, calls) = mount_recorded(opts);
    session.go_to_step(1).unwrap();
    assert!(calls.borrow().rejected.is_empty());
    assert!(session.go_to_step(5).is_err());
}
