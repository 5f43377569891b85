//! Participant registry through the document handle

use sharedoc::{
    Applied, Error,
    events::{NoOpReason, Origin, ParticipantEventKind, Scope},
    model::NodeId,
    ops::{Operation, OperationRecord, ParticipantOp, VersionVector},
    participants::{ParticipantError, ParticipantId},
};

use crate::helpers::*;

const CAROL: &str = "carol@example.com";

#[test]
fn test_creator_is_first_member() {
    let doc = doc();
    assert_eq!(doc.participants().unwrap(), &[pid(ALICE)]);
    assert_eq!(doc.participants_version().unwrap(), 1);
    assert!(!doc.is_public().unwrap());
}

#[test]
fn test_add_is_idempotent() {
    let mut doc = doc();
    let events = record_participant_events(&mut doc);

    assert!(doc.add_participant(pid(BOB)).unwrap());
    assert!(!doc.add_participant(pid(BOB)).unwrap());

    assert_eq!(doc.participants().unwrap(), &[pid(ALICE), pid(BOB)]);
    assert_eq!(doc.participants_version().unwrap(), 2);
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].kind, ParticipantEventKind::Added);
    assert_eq!(events.borrow()[0].participant, pid(BOB));
    assert_eq!(doc.take_outbound().unwrap().len(), 1);
}

#[test]
fn test_addresses_are_case_insensitive() {
    let mut doc = doc();
    assert!(doc.add_participant(pid("Bob@Example.COM")).unwrap());
    assert!(!doc.add_participant(pid(BOB)).unwrap());
    assert_eq!(doc.participants().unwrap().len(), 2);
}

#[test]
fn test_invalid_addresses() {
    for address in ["alice", "alice@", "a@b@c", "al ice@example.com", "a:b@example.com"] {
        let err = ParticipantId::parse(address).unwrap_err();
        assert!(err.is_invalid_address(), "{address}");
    }
}

#[test]
fn test_remove_non_member_is_noop() {
    let mut doc = doc();
    let events = record_participant_events(&mut doc);
    assert!(!doc.remove_participant(&pid(BOB)).unwrap());
    assert!(events.borrow().is_empty());
    assert_eq!(doc.participants_version().unwrap(), 1);
    assert!(doc.take_outbound().unwrap().is_empty());
}

#[test]
fn test_last_participant_cannot_be_removed() {
    let mut doc = doc();
    let err = doc.remove_participant(&pid(ALICE)).unwrap_err();
    assert!(matches!(
        err,
        Error::Participant(ParticipantError::LastParticipant { .. })
    ));
    assert!(err.is_usage_error());
    assert_eq!(err.module(), "participants");

    doc.add_participant(pid(BOB)).unwrap();
    assert!(doc.remove_participant(&pid(ALICE)).unwrap());
    assert_eq!(doc.participants().unwrap(), &[pid(BOB)]);
}

#[test]
fn test_public_participant() {
    let mut doc = doc();
    let events = record_participant_events(&mut doc);

    assert!(doc.set_public(true).unwrap());
    assert!(doc.is_public().unwrap());
    assert!(doc.participants().unwrap().contains(&pid("@example.com")));

    assert!(!doc.set_public(true).unwrap());
    assert!(doc.set_public(false).unwrap());
    assert!(!doc.is_public().unwrap());
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn test_participant_events_are_separate_from_data_events() {
    let mut doc = doc();
    let data = record_events(&mut doc, Scope::Subtree(NodeId::root()));
    let members = record_participant_events(&mut doc);

    doc.put("a", 1).unwrap();
    doc.add_participant(pid(BOB)).unwrap();

    assert_eq!(data.borrow().len(), 1);
    assert_eq!(members.borrow().len(), 1);
    assert_eq!(doc.events().unwrap().count(), 1);
    assert_eq!(doc.participant_events().unwrap().count(), 1);
    // Both kinds share one sequence.
    assert_eq!(data.borrow()[0].seq, 1);
    assert_eq!(members.borrow()[0].seq, 2);
}

#[test]
fn test_remote_membership_change() {
    let mut alice = doc_as(ALICE);
    let mut bob = doc_as(BOB);
    let events = record_participant_events(&mut bob);

    alice.add_participant(pid(CAROL)).unwrap();
    deliver(&mut bob, alice.take_outbound().unwrap());

    assert!(bob.participants().unwrap().contains(&pid(CAROL)));
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].origin,
        Origin::Remote {
            author: pid(ALICE)
        }
    );
}

#[test]
fn test_remote_removal_of_last_member_is_absorbed() {
    let mut bob = doc_as(BOB);
    let record = OperationRecord {
        author: pid(ALICE),
        replica: rid(ALICE),
        seq: 1,
        context: VersionVector::new(),
        timestamp: String::new(),
        op: Operation::participants(ParticipantOp::Remove(pid(BOB))),
    };

    let applied = bob.apply_remote(record).unwrap();
    assert_eq!(
        applied,
        Applied::ConcurrentNoOp {
            reason: NoOpReason::LastParticipant
        }
    );
    assert_eq!(bob.participants().unwrap(), &[pid(BOB)]);
    assert_eq!(bob.version().unwrap().get(&rid(ALICE)), 1);
}
