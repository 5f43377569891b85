//! DocumentHandle integration tests
//!
//! Lifecycle, local mutation, the outbound queue and remote application of
//! operation records.

use std::sync::Arc;

use sharedoc::{
    Applied, DocumentConfig, DocumentHandle, Error, FixedClock, TieBreak,
    document::DocumentError,
    events::{EventKind, Scope},
    model::{ModelError, NodeId, PlainValue, Value},
    ops::{MapOp, OpValue, Operation, OperationRecord, VersionVector},
    sync::OpStatus,
};

use crate::helpers::*;

fn remote_put(author: &str, seq: u64, context: VersionVector, key: &str, value: &str) -> OperationRecord {
    OperationRecord {
        author: pid(author),
        replica: rid(author),
        seq,
        context,
        timestamp: "2024-01-01T00:00:00.000Z".to_string(),
        op: Operation::map(
            NodeId::root(),
            MapOp::Put {
                key: key.to_string(),
                value: OpValue::Scalar(Value::from(value)),
            },
        ),
    }
}

// ===== SCENARIO =====

#[test]
fn test_nested_map_scenario() {
    let mut doc = doc();
    let events = record_events(&mut doc, Scope::Subtree(NodeId::root()));

    let map = doc.create_map().unwrap();
    doc.put("mapOne", map.clone()).unwrap();
    doc.map_put(&map, "string", "Hello World").unwrap();
    doc.map_put(&map, "number", 2345).unwrap();

    assert_eq!(doc.get_value("mapOne.string").unwrap(), Some(Value::from("Hello World")));
    assert_eq!(doc.get_value("mapOne.number").unwrap(), Some(Value::from(2345)));

    events.borrow_mut().clear();
    doc.delete("mapOne.string").unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Removed);
    assert_eq!(events[0].key(), Some("string"));
    assert_eq!(events[0].old_value, Some(PlainValue::from("Hello World")));
    assert_eq!(events[0].target_path().unwrap().as_str(), "mapOne.string");
}

// ===== LIFECYCLE =====

#[test]
fn test_closed_handle_rejects_everything() {
    let mut doc = doc();
    doc.put("a", 1).unwrap();
    doc.close().unwrap();

    assert!(doc.is_closed());
    let err = doc.put("b", 2).unwrap_err();
    assert!(matches!(err, Error::Document(DocumentError::HandleClosed { .. })));
    assert!(err.is_usage_error());
    assert!(err.is_closed());
    assert_eq!(err.module(), "document");

    assert!(doc.get("a").is_err());
    assert!(doc.take_outbound().is_err());
    assert!(doc.close().is_err());
}

#[test]
fn test_config_is_kept() {
    let config = DocumentConfig::default().with_event_log_capacity(Some(2));
    let doc = doc_with(ALICE, config.clone());
    assert_eq!(doc.config(), &config);
    assert_eq!(doc.participant(), &pid(ALICE));
    assert_eq!(doc.replica(), &rid(ALICE));
    assert_eq!(doc.id(), "doc");
}

#[test]
fn test_each_handle_gets_its_own_replica() {
    let config = DocumentConfig::default();
    let clock = Arc::new(FixedClock::default());
    let first = DocumentHandle::create("doc", pid(ALICE), config.clone(), clock.clone());
    let second = DocumentHandle::create("doc", pid(ALICE), config, clock);
    assert_ne!(first.replica(), second.replica());
}

// ===== PRIVATE MAP =====

#[test]
fn test_user_object_stays_private() {
    let (mut alice, mut bob, _, _) = replica_pair(TieBreak::ParticipantOrder);
    let shared = alice.to_plain_value().unwrap();
    let mine = alice.user_object().unwrap();
    assert_ne!(bob.user_object().unwrap(), mine);

    let drafts = alice.create_list().unwrap();
    alice.map_put(&mine, "drafts", drafts.clone()).unwrap();
    alice.list_add(&drafts, "unsent").unwrap();

    assert!(alice.take_outbound().unwrap().is_empty());
    assert_eq!(alice.to_plain_value().unwrap(), shared);
    assert_eq!(
        alice.node_plain(&mine).unwrap(),
        PlainValue::map([("drafts", PlainValue::list([PlainValue::from("unsent")]))])
    );
    assert_eq!(alice.path_of(&drafts).unwrap(), None);
    assert!(bob.node_plain(&mine).is_err());

    let err = alice.put("mine", mine).unwrap_err();
    assert!(matches!(err, Error::Model(ModelError::RootNotAttachable)));
}

// ===== OUTBOUND =====

#[test]
fn test_local_mutations_are_queued_in_order() {
    let mut doc = doc();
    doc.put("a", 1).unwrap();
    doc.put("b", 2).unwrap();
    doc.delete("a").unwrap();

    let records = doc.take_outbound().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(records.iter().all(|r| r.author == pid(ALICE)));
    assert_eq!(records[0].timestamp, "2024-01-01T00:00:00.000Z");
    assert_eq!(records[2].context.get(&rid(ALICE)), 2);
    assert_eq!(records[2].op.name(), "map.remove");

    assert!(doc.take_outbound().unwrap().is_empty());
    assert_eq!(doc.version().unwrap().get(&rid(ALICE)), 3);
}

#[test]
fn test_delivery_status() {
    let mut doc = doc();
    doc.put("a", 1).unwrap();
    assert_eq!(doc.operation_status(1).unwrap(), Some(OpStatus::Queued));
    assert!(!doc.acknowledge(1).unwrap());

    doc.take_outbound().unwrap();
    assert_eq!(doc.operation_status(1).unwrap(), Some(OpStatus::Pending));
    assert!(doc.acknowledge(1).unwrap());
    assert_eq!(doc.operation_status(1).unwrap(), Some(OpStatus::Acknowledged));
    assert!(!doc.acknowledge(1).unwrap());
    assert_eq!(doc.operation_status(9).unwrap(), None);
}

#[test]
fn test_detached_edits_travel_with_attach() {
    let mut doc = doc();
    let events = record_events(&mut doc, Scope::Subtree(NodeId::root()));
    let map = doc.create_map().unwrap();
    let detached = record_events(&mut doc, Scope::Children(map.clone()));

    doc.map_put(&map, "k", "v").unwrap();
    assert!(doc.take_outbound().unwrap().is_empty());
    assert!(events.borrow().is_empty());
    assert_eq!(detached.borrow().len(), 1);
    assert_eq!(detached.borrow()[0].path, None);

    doc.put("m", map.clone()).unwrap();
    let records = doc.take_outbound().unwrap();
    assert_eq!(records.len(), 1);
    let Operation::Map {
        op: MapOp::Put { value: OpValue::Node(snapshot), .. },
        ..
    } = &records[0].op
    else {
        panic!("expected a node snapshot, got {}", records[0].op);
    };
    assert_eq!(snapshot.id, map);
    assert_eq!(snapshot.ids(), vec![map.clone()]);
}

// ===== REMOTE APPLICATION =====

#[test]
fn test_replica_reproduces_document() {
    let mut alice = doc_as(ALICE);
    let mut bob = doc_as(BOB);

    let map = alice.create_map().unwrap();
    let list = alice.create_list().unwrap();
    let text = alice.create_text("hi").unwrap();
    alice.map_put(&map, "list", list.clone()).unwrap();
    alice.list_add(&list, 1).unwrap();
    alice.list_add(&list, text.clone()).unwrap();
    alice.put("m", map.clone()).unwrap();
    alice.text_insert(&text, 2, "!").unwrap();

    let applied = deliver(&mut bob, alice.take_outbound().unwrap());
    assert_eq!(applied.len(), 2);
    assert!(applied.iter().all(Applied::is_applied));
    assert_eq!(bob.to_plain_value().unwrap(), alice.to_plain_value().unwrap());

    // Node ids are shared, so Bob can address Alice's nodes.
    bob.list_add(&list, "from bob").unwrap();
    deliver(&mut alice, bob.take_outbound().unwrap());
    assert_eq!(alice.get_value("m.list.2").unwrap(), Some(Value::from("from bob")));
    assert_eq!(bob.text(&text).unwrap().as_str(), "hi!");
}

#[test]
fn test_remote_events_carry_origin() {
    let mut alice = doc_as(ALICE);
    let mut bob = doc_as(BOB);
    let events = record_events(&mut bob, Scope::Subtree(NodeId::root()));

    alice.put("a", 1).unwrap();
    deliver(&mut bob, alice.take_outbound().unwrap());

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(!events[0].is_local());
    assert_eq!(events[0].origin.author(), Some(&pid(ALICE)));
    assert_eq!(events[0].kind, EventKind::Added);
}

#[test]
fn test_duplicate_record_is_ignored() {
    let mut bob = doc_as(BOB);
    let record = remote_put(ALICE, 1, VersionVector::new(), "k", "v");

    assert!(bob.apply_remote(record.clone()).unwrap().is_applied());
    assert_eq!(bob.apply_remote(record).unwrap(), Applied::Duplicate);
    assert_eq!(bob.events().unwrap().count(), 1);
}

#[test]
fn test_out_of_order_record_is_rejected() {
    let mut bob = doc_as(BOB);
    let err = bob
        .apply_remote(remote_put(ALICE, 2, VersionVector::new(), "k", "v"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Document(DocumentError::OutOfOrder { expected: 1, got: 2, .. })
    ));
    assert!(err.is_remote_error());
    assert!(!err.is_usage_error());
    assert_eq!(bob.get("k").unwrap(), None);
}

#[test]
fn test_context_beyond_local_history_is_rejected() {
    let mut bob = doc_as(BOB);
    let mut context = VersionVector::new();
    context.observe(&rid(BOB), 3);
    let err = bob
        .apply_remote(remote_put(ALICE, 1, context, "k", "v"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Document(DocumentError::UnknownContext { claimed: 3, issued: 0, .. })
    ));
}

#[test]
fn test_stale_context_past_history_capacity() {
    let mut bob = doc_with(BOB, DocumentConfig::default().with_history_capacity(Some(2)));
    for i in 0..3 {
        bob.put(&format!("k{i}"), i).unwrap();
    }

    let err = bob
        .apply_remote(remote_put(ALICE, 1, VersionVector::new(), "x", "v"))
        .unwrap_err();
    assert!(matches!(err, Error::Document(DocumentError::StaleContext { seq: 1, .. })));

    let mut context = VersionVector::new();
    context.observe(&rid(BOB), 1);
    assert!(bob.apply_remote(remote_put(ALICE, 1, context, "x", "v")).unwrap().is_applied());
}

#[test]
fn test_record_for_unknown_node_leaves_no_trace() {
    let mut bob = doc_as(BOB);
    let record = OperationRecord {
        op: Operation::map(
            NodeId::new("carol@example.com:7"),
            MapOp::Remove { key: "k".to_string() },
        ),
        ..remote_put(ALICE, 1, VersionVector::new(), "k", "v")
    };

    let err = bob.apply_remote(record).unwrap_err();
    assert!(matches!(err, Error::Model(ModelError::NodeNotFound { .. })));
    assert_eq!(bob.version().unwrap().get(&rid(ALICE)), 0);

    // The author can still send its first record.
    let retry = remote_put(ALICE, 1, VersionVector::new(), "k", "v");
    assert!(bob.apply_remote(retry).unwrap().is_applied());
}

#[test]
fn test_remote_remove_of_missing_key_is_noop() {
    let mut bob = doc_as(BOB);
    let record = OperationRecord {
        op: Operation::map(NodeId::root(), MapOp::Remove { key: "k".to_string() }),
        ..remote_put(ALICE, 1, VersionVector::new(), "k", "v")
    };
    assert!(bob.apply_remote(record).unwrap().is_noop());
    assert_eq!(bob.events().unwrap().count(), 0);
    assert_eq!(bob.version().unwrap().get(&rid(ALICE)), 1);
}
