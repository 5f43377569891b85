//! HandleManager lifecycle

use std::sync::Arc;

use sharedoc::{
    DocumentConfig, Error, FixedClock, HandleManager, document::DocumentError, model::Value,
};

use crate::helpers::*;

fn manager() -> HandleManager {
    HandleManager::new(pid(ALICE), DocumentConfig::default())
        .with_clock(Arc::new(FixedClock::default()))
}

#[test]
fn test_open_or_create_returns_same_handle() {
    let mut manager = manager();
    manager.open_or_create("notes").put("title", "Shopping").unwrap();

    let handle = manager.open_or_create("notes");
    assert_eq!(handle.get_value("title").unwrap(), Some(Value::from("Shopping")));
    assert_eq!(handle.participant(), &pid(ALICE));
    assert_eq!(handle.id(), "notes");
}

#[test]
fn test_handles_use_manager_clock() {
    let mut manager = manager();
    let handle = manager.open_or_create("notes");
    handle.put("a", 1).unwrap();
    let records = handle.take_outbound().unwrap();
    assert_eq!(records[0].timestamp, "2024-01-01T00:00:00.000Z");
}

#[test]
fn test_get_unknown_and_closed() {
    let mut manager = manager();
    let err = manager.get("nope").unwrap_err();
    assert!(matches!(
        err,
        Error::Document(DocumentError::UnknownDocument { .. })
    ));
    assert!(err.is_not_found());

    manager.open_or_create("notes");
    manager.close("notes").unwrap();
    assert!(!manager.is_open("notes"));
    let err = manager.get_mut("notes").unwrap_err();
    assert!(matches!(err, Error::Document(DocumentError::HandleClosed { .. })));
    assert!(err.is_usage_error());

    assert!(manager.close("notes").is_err());
    assert!(manager.close("never").unwrap_err().is_not_found());
}

#[test]
fn test_reopening_closed_id_starts_fresh() {
    let mut manager = manager();
    manager.open_or_create("notes").put("a", 1).unwrap();
    manager.close("notes").unwrap();

    let handle = manager.open_or_create("notes");
    assert!(!handle.is_closed());
    assert_eq!(handle.get("a").unwrap(), None);
}

#[test]
fn test_close_all_and_open_ids() {
    let mut manager = manager();
    for id in ["b", "c", "a"] {
        manager.open_or_create(id);
    }
    manager.close("c").unwrap();
    assert_eq!(manager.open_ids(), vec!["a".to_string(), "b".to_string()]);

    manager.close_all();
    assert!(manager.open_ids().is_empty());
    assert!(manager.get("a").unwrap_err().is_closed());
}
