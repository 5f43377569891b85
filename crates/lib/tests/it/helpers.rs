use std::{cell::RefCell, rc::Rc, sync::Arc};

use sharedoc::{
    Applied, DocumentConfig, DocumentHandle, FixedClock, TieBreak,
    events::{Event, ParticipantEvent, Scope},
    model::NodeId,
    ops::OperationRecord,
    participants::{ParticipantId, ReplicaId},
};

pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";

pub fn pid(address: &str) -> ParticipantId {
    ParticipantId::parse(address).expect("valid participant address")
}

/// The replica a test opens for `address`, named after its local part.
pub fn rid(address: &str) -> ReplicaId {
    let name = address.split('@').next().unwrap_or_default();
    ReplicaId::parse(name).expect("valid replica id")
}

/// Creates a document owned by `address` with a frozen clock.
pub fn doc_as(address: &str) -> DocumentHandle {
    doc_with(address, DocumentConfig::default())
}

pub fn doc_with(address: &str, config: DocumentConfig) -> DocumentHandle {
    doc_on(address, rid(address), config)
}

/// Opens the document for `address` on a given replica, like a second tab.
pub fn doc_on(address: &str, replica: ReplicaId, config: DocumentConfig) -> DocumentHandle {
    DocumentHandle::create_with_replica("doc", pid(address), replica, config, Arc::new(FixedClock::default()))
}

/// Creates a document owned by Alice.
pub fn doc() -> DocumentHandle {
    doc_as(ALICE)
}

/// Applies every record, panicking on rejection.
pub fn deliver(to: &mut DocumentHandle, records: Vec<OperationRecord>) -> Vec<Applied> {
    records
        .into_iter()
        .map(|record| to.apply_remote(record).expect("record applies"))
        .collect()
}

/// Exchanges outbound records between two replicas until both are quiet.
pub fn sync(a: &mut DocumentHandle, b: &mut DocumentHandle) {
    loop {
        let from_a = a.take_outbound().expect("open handle");
        let from_b = b.take_outbound().expect("open handle");
        if from_a.is_empty() && from_b.is_empty() {
            return;
        }
        deliver(b, from_a);
        deliver(a, from_b);
    }
}

/// Two replicas sharing a root list `items` and a root text `body`.
pub fn replica_pair(tie_break: TieBreak) -> (DocumentHandle, DocumentHandle, NodeId, NodeId) {
    let config = DocumentConfig::default().with_tie_break(tie_break);
    let mut alice = doc_with(ALICE, config.clone());
    let mut bob = doc_with(BOB, config);

    let items = alice.create_list().unwrap();
    alice.put("items", items.clone()).unwrap();
    let body = alice.create_text("").unwrap();
    alice.put("body", body.clone()).unwrap();
    sync(&mut alice, &mut bob);

    (alice, bob, items, body)
}

/// Collects data events delivered in `scope`.
pub fn record_events(doc: &mut DocumentHandle, scope: Scope) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    doc.subscribe(scope, move |event, _| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    })
    .unwrap();
    seen
}

/// Collects participant events.
pub fn record_participant_events(doc: &mut DocumentHandle) -> Rc<RefCell<Vec<ParticipantEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    doc.subscribe_participants(move |event, _| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    })
    .unwrap();
    seen
}
