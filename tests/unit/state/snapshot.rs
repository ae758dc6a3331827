use super::*;
use crate::document::model::SlideDocument;
use crate::state::store::{NavigationPolicy, StoreChange};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn lesson() -> Rc<SlideDocument> {
    Rc::new(
        serde_json::from_value(json!({
            "id": "snap",
            "version": 3,
            "layout": { "type": "grid", "slots": ["main"] },
            "steps": [
                {
                    "id": "s1",
                    "phase": "guided",
                    "tasks": [{ "id": "t1", "action": { "type": "click", "targetId": "a" } }],
                    "hints": [
                        { "level": 1, "content": "one" },
                        { "level": 2, "content": "two" }
                    ]
                },
                {
                    "id": "s2",
                    "phase": "outcome",
                    "tasks": [{ "id": "t2", "required": false, "action": { "type": "click" } }]
                }
            ]
        }))
        .unwrap(),
    )
}

fn progressed() -> StateStore {
    let mut s = StateStore::new(lesson(), NavigationPolicy::Gated);
    s.reveal_next_hint();
    s.complete_task("t1");
    s.go_to_step(1).unwrap();
    s
}

#[test]
fn snapshot_captures_state() {
    let snap = progressed().snapshot();
    assert_eq!(snap.document_id, "snap");
    assert_eq!(snap.document_version, "3");
    assert_eq!(snap.active_step_index, 1);
    assert_eq!(snap.steps[0].tasks["t1"], TaskStatus::Completed);
    assert_eq!(snap.steps[0].revealed_hint_levels, vec![1]);
    assert!(snap.steps[1].visited);
    assert_eq!(snap.steps[1].tasks["t2"], TaskStatus::Pending);
}

#[test]
fn restore_reproduces_snapshot_and_notifies() {
    let snap = progressed().snapshot();
    let json = serde_json::to_string(&snap).unwrap();
    let parsed: RuntimeSnapshot = serde_json::from_str(&json).unwrap();

    let mut fresh = StateStore::new(lesson(), NavigationPolicy::Gated);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    fresh.subscribe(move |c| sink.borrow_mut().push(c.clone()));

    fresh.restore(&parsed).unwrap();
    assert_eq!(fresh.snapshot(), snap);
    assert_eq!(*seen.borrow(), vec![StoreChange::Restored]);
}

#[test]
fn missing_tasks_restore_as_pending() {
    let mut snap = progressed().snapshot();
    snap.steps[0].tasks.clear();
    snap.active_step_index = 0;

    let mut s = StateStore::new(lesson(), NavigationPolicy::Gated);
    s.restore(&snap).unwrap();
    assert_eq!(s.task_status("t1"), Some(TaskStatus::Pending));
}

#[test]
fn mismatched_snapshots_leave_store_untouched() {
    let good = progressed().snapshot();
    let cases: Vec<(RuntimeSnapshot, &str)> = vec![
        (
            RuntimeSnapshot {
                document_id: "other".to_owned(),
                ..good.clone()
            },
            "is for document 'other'",
        ),
        (
            RuntimeSnapshot {
                steps: good.steps[..1].to_vec(),
                ..good.clone()
            },
            "snapshot has 1 steps",
        ),
        (
            RuntimeSnapshot {
                active_step_index: 2,
                ..good.clone()
            },
            "out of range",
        ),
        (
            {
                let mut s = good.clone();
                s.steps[1].step_id = "zz".to_owned();
                s
            },
            "does not match document step",
        ),
        (
            {
                let mut s = good.clone();
                s.steps[0]
                    .tasks
                    .insert("ghost".to_owned(), TaskStatus::Completed);
                s
            },
            "unknown task 'ghost'",
        ),
        (
            {
                let mut s = good.clone();
                s.steps[0].revealed_hint_levels = vec![7];
                s
            },
            "unknown hint level 7",
        ),
        (
            {
                let mut s = good.clone();
                s.steps[0].revealed_hint_levels = vec![2];
                s
            },
            "skip a lower level",
        ),
    ];

    for (snap, needle) in cases {
        let mut s = StateStore::new(lesson(), NavigationPolicy::Gated);
        let before = s.snapshot();
        let err = s.restore(&snap).unwrap_err();
        assert!(err.to_string().contains(needle), "{err} !~ {needle}");
        assert_eq!(s.snapshot(), before);
    }
}
