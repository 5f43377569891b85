//! EventBus integration tests
//!
//! Delivery order, event kinds per mutation, listener scopes, isolation of
//! failing listeners and (un)subscription from inside a callback.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use sharedoc::{
    DocumentConfig,
    events::{Diagnostic, DiagnosticLog, EventKind, ListenerError, ListenerId, NoOpReason, Scope},
    model::{NodeId, PlainValue},
    ops::{MapOp, Operation, OperationRecord, VersionVector},
};

use crate::helpers::*;

#[test]
fn test_events_follow_application_order() {
    let mut doc = doc();
    let events = record_events(&mut doc, Scope::Subtree(NodeId::root()));

    let list = doc.create_list().unwrap();
    doc.put("l", list.clone()).unwrap();
    doc.put("a", 1).unwrap();
    doc.put("a", 2).unwrap();
    doc.list_add(&list, "x").unwrap();
    doc.list_set(&list, 0, "y").unwrap();
    doc.list_remove(&list, 0).unwrap();
    doc.delete("a").unwrap();

    let events = events.borrow();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Added,
            EventKind::Added,
            EventKind::Changed,
            EventKind::Added,
            EventKind::Changed,
            EventKind::Removed,
            EventKind::Removed,
        ]
    );
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(events.iter().all(|e| e.is_local()));

    assert_eq!(events[2].old_value, Some(PlainValue::from(1)));
    assert_eq!(events[2].new_value, Some(PlainValue::from(2)));
    assert_eq!(events[4].index(), Some(0));
    assert_eq!(events[4].target_path().unwrap().as_str(), "l.0");
}

#[test]
fn test_text_event_kinds() {
    let mut doc = doc();
    let text = doc.create_text("hello").unwrap();
    doc.put("t", text.clone()).unwrap();
    let events = record_events(&mut doc, Scope::Children(text.clone()));

    doc.text_insert(&text, 5, " world").unwrap();
    doc.text_delete(&text, 0, 1).unwrap();
    doc.text_set_annotation(&text, 0, 4, "em", Some("1")).unwrap();
    // Empty edits change nothing and raise nothing.
    doc.text_insert(&text, 0, "").unwrap();
    doc.text_delete(&text, 3, 3).unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, EventKind::Added);
    assert_eq!(events[0].range, Some(5..11));
    assert_eq!(events[0].new_value, Some(PlainValue::from(" world")));
    assert_eq!(events[1].kind, EventKind::Removed);
    assert_eq!(events[1].old_value, Some(PlainValue::from("h")));
    assert_eq!(events[2].kind, EventKind::Changed);
    assert_eq!(events[2].new_value, Some(PlainValue::map([("em", "1")])));
}

#[test]
fn test_children_and_subtree_scopes() {
    let mut doc = doc();
    let outer = doc.create_map().unwrap();
    let inner = doc.create_map().unwrap();
    doc.map_put(&outer, "inner", inner.clone()).unwrap();
    doc.put("outer", outer.clone()).unwrap();

    let children = record_events(&mut doc, Scope::Children(outer.clone()));
    let subtree = record_events(&mut doc, Scope::Subtree(outer.clone()));

    doc.map_put(&outer, "direct", 1).unwrap();
    doc.map_put(&inner, "nested", 2).unwrap();
    doc.put("elsewhere", 3).unwrap();

    assert_eq!(children.borrow().len(), 1);
    assert_eq!(children.borrow()[0].key(), Some("direct"));
    assert_eq!(subtree.borrow().len(), 2);
    assert_eq!(
        subtree.borrow()[1].target_path().unwrap().as_str(),
        "outer.inner.nested"
    );
}

#[test]
fn test_failing_listener_does_not_stop_delivery() {
    let mut doc = doc();
    let log = DiagnosticLog::new();
    doc.set_diagnostic_sink(log.clone()).unwrap();

    let failing = doc
        .subscribe(Scope::Subtree(NodeId::root()), |_, _| {
            Err(ListenerError::new("cannot render"))
        })
        .unwrap();
    doc.subscribe(Scope::Subtree(NodeId::root()), |_, _| panic!("listener bug"))
        .unwrap();
    let after = record_events(&mut doc, Scope::Subtree(NodeId::root()));

    doc.put("a", 1).unwrap();
    doc.put("b", 2).unwrap();

    assert_eq!(after.borrow().len(), 2);
    assert_eq!(doc.get_value("b").unwrap(), Some(2.into()));

    let diagnostics = log.entries();
    assert_eq!(diagnostics.len(), 4);
    assert!(matches!(
        &diagnostics[0],
        Diagnostic::ListenerFailed { listener, event_seq: 1, message }
            if *listener == failing && message == "cannot render"
    ));
    assert!(matches!(
        &diagnostics[1],
        Diagnostic::ListenerFailed { message, .. } if message.contains("listener bug")
    ));
}

#[test]
fn test_subscribe_during_dispatch_starts_with_next_event() {
    let mut doc = doc();
    let late_calls = Rc::new(Cell::new(0));
    let registered = Rc::new(Cell::new(false));

    {
        let late_calls = Rc::clone(&late_calls);
        let registered = Rc::clone(&registered);
        doc.subscribe(Scope::Subtree(NodeId::root()), move |_, ctx| {
            if !registered.replace(true) {
                let late_calls = Rc::clone(&late_calls);
                ctx.subscribe(Scope::Subtree(NodeId::root()), move |_, _| {
                    late_calls.set(late_calls.get() + 1);
                    Ok(())
                });
            }
            Ok(())
        })
        .unwrap();
    }

    doc.put("a", 1).unwrap();
    assert_eq!(late_calls.get(), 0);
    doc.put("b", 2).unwrap();
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn test_unsubscribe_during_dispatch_skips_the_rest() {
    let mut doc = doc();
    let target: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
    let removed_calls = Rc::new(Cell::new(0));

    {
        let target = Rc::clone(&target);
        doc.subscribe(Scope::Subtree(NodeId::root()), move |_, ctx| {
            if let Some(id) = target.take() {
                ctx.unsubscribe(id);
            }
            Ok(())
        })
        .unwrap();
    }
    let id = {
        let removed_calls = Rc::clone(&removed_calls);
        doc.subscribe(Scope::Subtree(NodeId::root()), move |_, _| {
            removed_calls.set(removed_calls.get() + 1);
            Ok(())
        })
        .unwrap()
    };
    target.set(Some(id));

    doc.put("a", 1).unwrap();
    doc.put("b", 2).unwrap();
    assert_eq!(removed_calls.get(), 0);
    assert!(!doc.unsubscribe(id).unwrap());
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let mut doc = doc();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let id = doc
        .subscribe(Scope::Subtree(NodeId::root()), move |event, _| {
            sink.borrow_mut().push(event.seq);
            Ok(())
        })
        .unwrap();

    doc.put("a", 1).unwrap();
    assert!(doc.unsubscribe(id).unwrap());
    doc.put("b", 2).unwrap();
    assert_eq!(*calls.borrow(), vec![1]);
}

#[test]
fn test_event_log_is_bounded() {
    let mut doc = doc_with(ALICE, DocumentConfig::default().with_event_log_capacity(Some(3)));
    for i in 0..5 {
        doc.put(&format!("k{i}"), i).unwrap();
    }
    let seqs: Vec<u64> = doc.events().unwrap().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![3, 4, 5]);
}

#[test]
fn test_concurrent_noop_reporting_is_configurable() {
    let remove = |seq| OperationRecord {
        author: pid(BOB),
        replica: rid(BOB),
        seq,
        context: VersionVector::new(),
        timestamp: String::new(),
        op: Operation::map(NodeId::root(), MapOp::Remove { key: format!("gone{seq}") }),
    };

    let mut quiet = doc();
    let quiet_log = DiagnosticLog::new();
    quiet.set_diagnostic_sink(quiet_log.clone()).unwrap();
    assert!(quiet.apply_remote(remove(1)).unwrap().is_noop());
    assert!(quiet_log.is_empty());

    let mut loud = doc_with(ALICE, DocumentConfig::default().with_concurrent_noop_reports(true));
    let loud_log = DiagnosticLog::new();
    loud.set_diagnostic_sink(loud_log.clone()).unwrap();
    loud.apply_remote(remove(1)).unwrap();

    let entries = loud_log.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        &entries[0],
        Diagnostic::ConcurrentNoOp { seq: 1, reason: NoOpReason::Superseded, author, .. }
            if *author == pid(BOB)
    ));
}
