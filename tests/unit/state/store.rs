use super::*;
use crate::events::event::EventKind;
use serde_json::json;
use std::cell::RefCell;

fn lesson() -> Rc<SlideDocument> {
    Rc::new(
        serde_json::from_value(json!({
            "id": "lesson",
            "version": "2",
            "layout": { "type": "vertical", "slots": ["main"] },
            "steps": [
                {
                    "id": "s1",
                    "phase": "guided",
                    "tasks": [
                        { "id": "t1", "required": true, "action": { "type": "click", "targetId": "btn-a" } },
                        { "id": "t2", "required": false, "action": { "type": "toggle", "targetId": "sw" } }
                    ],
                    "hints": [
                        { "level": 3, "content": "third" },
                        { "level": 1, "content": "first" }
                    ]
                },
                {
                    "id": "s2",
                    "phase": "construct",
                    "tasks": [
                        { "id": "t3", "action": { "type": "drop", "targetId": "zone" } }
                    ]
                },
                { "id": "s3", "phase": "outcome" }
            ]
        }))
        .unwrap(),
    )
}

fn store() -> StateStore {
    StateStore::new(lesson(), NavigationPolicy::Gated)
}

#[test]
fn mounts_at_step_zero_with_everything_pending() {
    let s = store();
    assert_eq!(s.active_step_index(), 0);
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Pending));
    assert_eq!(s.task_status("t2"), Some(TaskStatus::Pending));
    assert_eq!(s.task_status_in(1, "t3"), Some(TaskStatus::Pending));
    assert_eq!(s.task_status("t3"), None);
    assert!(s.revealed_hints(0).is_empty());
    assert!(s.is_step_visited(0));
    assert!(!s.is_step_visited(1));
}

#[test]
fn matching_click_completes_required_task() {
    let mut s = store();
    assert!(!s.are_required_tasks_complete(0));

    let changes = s.apply_event(&SlideEvent::click("btn-a"));
    assert_eq!(
        changes,
        vec![StoreChange::TaskStatus {
            step: 0,
            task: "t1".to_owned(),
            from: TaskStatus::Pending,
            to: TaskStatus::Completed,
        }]
    );
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Completed));
    assert!(s.are_required_tasks_complete(0));
}

#[test]
fn unmatched_events_are_ignored() {
    let mut s = store();
    assert!(s.apply_event(&SlideEvent::click("elsewhere")).is_empty());
    assert!(s.apply_event(&SlideEvent::signal("noise")).is_empty());
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Pending));
}

#[test]
fn partial_interaction_enters_in_progress_only_when_tracked() {
    let mut s = store();
    let touch = SlideEvent::new(EventKind::Drag).with_target("btn-a");
    s.apply_event(&touch);
    assert_eq!(s.task_status("t1"), Some(TaskStatus::InProgress));
    assert!(!s.are_required_tasks_complete(0));

    s.apply_event(&SlideEvent::click("btn-a"));
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Completed));

    // A later partial interaction never demotes a completed task.
    s.apply_event(&touch);
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Completed));

    let mut quiet = store();
    quiet.set_track_in_progress(false);
    quiet.apply_event(&touch);
    assert_eq!(quiet.task_status("t1"), Some(TaskStatus::Pending));
    assert!(quiet.mark_task_in_progress("t1").is_empty());
}

#[test]
fn complete_task_is_idempotent() {
    let mut s = store();
    assert_eq!(s.complete_task("t1").len(), 1);
    assert!(s.complete_task("t1").is_empty());
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Completed));

    assert!(s.mark_task_in_progress("t1").is_empty());
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Completed));

    assert!(s.complete_task("unknown").is_empty());
}

#[test]
fn hints_reveal_in_level_order() {
    let mut s = store();
    assert_eq!(s.next_hint(0).map(|h| h.level), Some(1));
    assert_eq!(s.reveal_next_hint(), Some(1));
    assert_eq!(s.reveal_next_hint(), Some(3));
    assert_eq!(s.reveal_next_hint(), None);

    let levels: Vec<u32> = s.revealed_hints(0).iter().map(|h| h.level).collect();
    assert_eq!(levels, vec![1, 3]);
    assert!(s.is_hint_revealed(0, 3));
}

#[test]
fn reveal_on_step_without_hints_is_a_noop() {
    let mut s = store();
    s.complete_task("t1");
    s.go_to_step(1).unwrap();
    assert_eq!(s.reveal_next_hint(), None);
}

#[test]
fn forward_navigation_is_gated_on_required_tasks() {
    let mut s = store();
    let err = s.go_to_step(1).unwrap_err();
    assert_eq!(
        err,
        NavigationError::Gated {
            step: 0,
            missing: vec!["t1".to_owned()]
        }
    );
    assert_eq!(s.active_step_index(), 0);

    s.complete_task("t1");
    assert_eq!(
        s.go_to_step(1).unwrap(),
        vec![StoreChange::StepChanged { from: 0, to: 1 }]
    );
    assert!(s.is_step_visited(1));
}

#[test]
fn skipping_ahead_checks_every_step_being_left() {
    let mut s = store();
    s.complete_task("t1");
    let err = s.go_to_step(2).unwrap_err();
    assert!(matches!(err, NavigationError::Gated { step: 1, .. }));
    assert_eq!(s.active_step_index(), 0);
}

#[test]
fn jumping_onto_an_unvisited_step_is_rejected_even_without_tasks_between() {
    let doc: SlideDocument = serde_json::from_value(json!({
        "id": "jump",
        "version": "1",
        "layout": { "type": "vertical", "slots": ["main"] },
        "steps": [
            {
                "id": "s1",
                "phase": "guided",
                "tasks": [{ "id": "t1", "action": { "type": "click", "targetId": "x" } }]
            },
            { "id": "s2", "phase": "explain" },
            { "id": "s3", "phase": "outcome" }
        ]
    }))
    .unwrap();
    let mut s = StateStore::new(Rc::new(doc), NavigationPolicy::Gated);
    s.apply_event(&SlideEvent::click("x"));

    assert_eq!(
        s.go_to_step(2).unwrap_err(),
        NavigationError::NotReachable {
            index: 2,
            active: 0
        }
    );
    assert_eq!(s.active_step_index(), 0);
    assert!(!s.is_step_visited(2));

    // Once visited, the step may be jumped to directly.
    s.go_to_step(1).unwrap();
    s.go_to_step(2).unwrap();
    s.go_to_step(0).unwrap();
    assert_eq!(
        s.go_to_step(2).unwrap(),
        vec![StoreChange::StepChanged { from: 0, to: 2 }]
    );
}

#[test]
fn backward_navigation_is_always_allowed() {
    let mut s = store();
    s.complete_task("t1");
    s.go_to_step(1).unwrap();
    s.go_to_step(0).unwrap();
    assert_eq!(s.active_step_index(), 0);
    assert!(s.go_to_step(0).unwrap().is_empty());
}

#[test]
fn out_of_range_is_rejected() {
    let mut s = store();
    assert_eq!(
        s.go_to_step(9).unwrap_err(),
        NavigationError::OutOfRange { index: 9, len: 3 }
    );
}

#[test]
fn free_policy_skips_gating() {
    let mut s = StateStore::new(lesson(), NavigationPolicy::Free);
    s.go_to_step(2).unwrap();
    assert_eq!(s.active_step_index(), 2);
    assert!(s.is_document_complete());
}

#[test]
fn document_completes_on_final_step_only() {
    let mut s = store();
    s.complete_task("t1");
    assert!(!s.is_document_complete());
    s.go_to_step(1).unwrap();
    s.complete_task("t3");
    assert!(!s.is_document_complete());
    s.go_to_step(2).unwrap();
    assert!(s.is_document_complete());
}

#[test]
fn step_progress_counts_required_and_optional() {
    let mut s = store();
    s.complete_task("t2");
    s.reveal_next_hint();
    assert_eq!(
        s.step_progress(0),
        StepProgress {
            required_total: 1,
            required_completed: 0,
            optional_total: 1,
            optional_completed: 1,
            hints_revealed: 1,
            hints_total: 2,
        }
    );
    assert_eq!(s.step_progress(42), StepProgress::default());
}

#[test]
fn reset_step_keeps_visit_history() {
    let mut s = store();
    s.complete_task("t1");
    s.reveal_next_hint();
    assert_eq!(s.reset_step(0), vec![StoreChange::StepReset { step: 0 }]);
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Pending));
    assert!(s.revealed_hints(0).is_empty());
    assert!(s.is_step_visited(0));

    assert!(s.reset_step(0).is_empty());
    assert!(s.reset_step(99).is_empty());
}

#[test]
fn reset_all_returns_to_mount_state() {
    let mut s = store();
    s.complete_task("t1");
    s.go_to_step(1).unwrap();
    s.complete_task("t3");
    s.reset_all();

    assert_eq!(s.active_step_index(), 0);
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Pending));
    assert_eq!(s.task_status_in(1, "t3"), Some(TaskStatus::Pending));
    assert!(!s.is_step_visited(1));
}

#[test]
fn listeners_see_every_change_in_order() {
    let mut s = store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = s.subscribe(move |c| sink.borrow_mut().push(c.clone()));

    s.complete_task("t1");
    s.reveal_next_hint();
    let _ = s.go_to_step(5);
    s.go_to_step(1).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            StoreChange::TaskStatus {
                step: 0,
                task: "t1".to_owned(),
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
            },
            StoreChange::HintRevealed { step: 0, level: 1 },
            StoreChange::StepChanged { from: 0, to: 1 },
        ]
    );

    assert!(s.unsubscribe(id));
    assert!(!s.unsubscribe(id));
    s.go_to_step(0).unwrap();
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn dispatch_accepts_raw_actions() {
    let mut s = store();
    let changes = s
        .dispatch(StoreAction::ApplyEvent(
            SlideEvent::new(EventKind::Toggle).with_target("sw"),
        ))
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(s.task_status("t2"), Some(TaskStatus::Completed));
    // Optional tasks do not satisfy the gate.
    assert!(s.dispatch(StoreAction::GoToStep(1)).is_err());
}
