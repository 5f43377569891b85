//! Two-replica exchanges
//!
//! Concurrent edits are issued on both sides before either side has seen the
//! other's records, then delivered and compared.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};
use sharedoc::{
    Applied, DocumentConfig, DocumentHandle, TieBreak,
    events::NoOpReason,
    model::{NodeId, PlainValue, Value},
    ops::OperationRecord,
    participants::ReplicaId,
    sync::OpStatus,
};

use crate::helpers::*;

fn values_of(doc: &DocumentHandle, list: &NodeId) -> Vec<Value> {
    doc.list(list).unwrap().iter().cloned().collect()
}

// ===== LISTS =====

#[test]
fn test_concurrent_inserts_at_same_index_keep_both() {
    let (mut alice, mut bob, items, _) = replica_pair(TieBreak::ParticipantOrder);

    alice.list_insert(&items, 0, "from alice").unwrap();
    bob.list_insert(&items, 0, "from bob").unwrap();
    sync(&mut alice, &mut bob);

    let expected = vec![Value::from("from alice"), Value::from("from bob")];
    assert_eq!(values_of(&alice, &items), expected);
    assert_eq!(values_of(&bob, &items), expected);
}

#[test]
fn test_arrival_order_keeps_both_inserts() {
    let (mut alice, mut bob, items, _) = replica_pair(TieBreak::ArrivalOrder);

    alice.list_insert(&items, 0, "a").unwrap();
    bob.list_insert(&items, 0, "b").unwrap();
    sync(&mut alice, &mut bob);

    // Each side orders its own element first; only membership is shared.
    for doc in [&alice, &bob] {
        let values = values_of(doc, &items);
        assert_eq!(values.len(), 2);
        assert!(values.contains(&Value::from("a")));
        assert!(values.contains(&Value::from("b")));
    }
}

#[test]
fn test_concurrent_removal_of_same_element() {
    let (mut alice, mut bob, items, _) = replica_pair(TieBreak::ParticipantOrder);
    for v in ["x", "y", "z"] {
        alice.list_add(&items, v).unwrap();
    }
    sync(&mut alice, &mut bob);

    alice.list_remove(&items, 1).unwrap();
    bob.list_remove(&items, 1).unwrap();

    let applied = deliver(&mut bob, alice.take_outbound().unwrap());
    assert_eq!(
        applied,
        vec![Applied::ConcurrentNoOp {
            reason: NoOpReason::Superseded
        }]
    );
    deliver(&mut alice, bob.take_outbound().unwrap());

    let expected = vec![Value::from("x"), Value::from("z")];
    assert_eq!(values_of(&alice, &items), expected);
    assert_eq!(values_of(&bob, &items), expected);
}

// ===== MAPS =====

#[test]
fn test_map_last_writer_wins_by_participant() {
    let (mut alice, mut bob, _, _) = replica_pair(TieBreak::ParticipantOrder);

    alice.put("title", "alice's").unwrap();
    bob.put("title", "bob's").unwrap();

    // bob@ sorts after alice@, so Bob's write wins on both sides.
    let at_bob = deliver(&mut bob, alice.take_outbound().unwrap());
    assert!(at_bob[0].is_noop());
    let at_alice = deliver(&mut alice, bob.take_outbound().unwrap());
    assert!(at_alice[0].is_applied());

    assert_eq!(alice.get_value("title").unwrap(), Some(Value::from("bob's")));
    assert_eq!(bob.get_value("title").unwrap(), Some(Value::from("bob's")));
}

#[test]
fn test_edit_inside_concurrently_removed_container() {
    let (mut alice, mut bob, _, _) = replica_pair(TieBreak::ParticipantOrder);
    let settings = alice.create_map().unwrap();
    alice.put("settings", settings.clone()).unwrap();
    alice.map_put(&settings, "theme", "dark").unwrap();
    sync(&mut alice, &mut bob);

    alice.delete("settings").unwrap();
    bob.map_put(&settings, "font", "mono").unwrap();

    let at_alice = deliver(&mut alice, bob.take_outbound().unwrap());
    assert_eq!(
        at_alice,
        vec![Applied::ConcurrentNoOp {
            reason: NoOpReason::TargetRemoved
        }]
    );
    deliver(&mut bob, alice.take_outbound().unwrap());

    assert_eq!(alice.get("settings").unwrap(), None);
    assert_eq!(bob.get("settings").unwrap(), None);
    assert!(bob.keys(&settings).is_err());
    assert_eq!(alice.to_plain_value().unwrap(), bob.to_plain_value().unwrap());

    // The removed node is gone for local edits as well.
    assert!(bob.map_put(&settings, "late", 1).is_err());
}

#[test]
fn test_concurrent_attach_of_new_subtrees() {
    let (mut alice, mut bob, items, _) = replica_pair(TieBreak::ParticipantOrder);

    let a = alice.create_map().unwrap();
    alice.map_put(&a, "by", "alice").unwrap();
    alice.list_add(&items, a).unwrap();
    let b = bob.create_text("bob's note").unwrap();
    bob.list_add(&items, b).unwrap();
    sync(&mut alice, &mut bob);

    let plain = alice.get_plain("items").unwrap().unwrap();
    assert_eq!(plain.as_list().unwrap().len(), 2);
    assert_eq!(plain, bob.get_plain("items").unwrap().unwrap());
}

// ===== REPLICAS =====

#[test]
fn test_two_tabs_of_one_participant_converge() {
    let config = DocumentConfig::default().with_tie_break(TieBreak::ParticipantOrder);
    let mut tab1 = doc_on(ALICE, ReplicaId::parse("tab-1").unwrap(), config.clone());
    let mut tab2 = doc_on(ALICE, ReplicaId::parse("tab-2").unwrap(), config);

    tab1.put("a", 1).unwrap();
    tab2.put("b", 2).unwrap();
    let at_tab2 = deliver(&mut tab2, tab1.take_outbound().unwrap());
    let at_tab1 = deliver(&mut tab1, tab2.take_outbound().unwrap());
    assert!(at_tab2.iter().all(Applied::is_applied));
    assert!(at_tab1.iter().all(Applied::is_applied));

    let m1 = tab1.create_map().unwrap();
    let m2 = tab2.create_map().unwrap();
    assert_ne!(m1, m2);
    tab1.put("one", m1.clone()).unwrap();
    tab1.map_put(&m1, "by", "tab 1").unwrap();
    tab2.put("two", m2.clone()).unwrap();
    tab2.map_put(&m2, "by", "tab 2").unwrap();
    sync(&mut tab1, &mut tab2);

    let plain = tab1.to_plain_value().unwrap();
    assert_eq!(plain, tab2.to_plain_value().unwrap());
    assert_eq!(tab1.keys(&tab1.root()).unwrap().len(), 4);
    assert_eq!(tab2.version().unwrap(), tab1.version().unwrap());

    // Every record is attributed to Alice, whichever tab issued it.
    tab2.put("c", 3).unwrap();
    let records = tab2.take_outbound().unwrap();
    assert_eq!(records[0].author, pid(ALICE));
    assert_eq!(records[0].replica.as_str(), "tab-2");
}

#[test]
fn test_replication_bookkeeping_is_released() {
    let (mut alice, mut bob, items, _) = replica_pair(TieBreak::ParticipantOrder);
    for v in 0..5 {
        alice.list_add(&items, v).unwrap();
    }
    let settings = alice.create_map().unwrap();
    alice.put("settings", settings.clone()).unwrap();
    alice.map_put(&settings, "theme", "dark").unwrap();
    alice.delete("settings").unwrap();
    sync(&mut alice, &mut bob);

    // Bob has sent nothing, so Alice cannot tell what it applied yet.
    let stats = alice.replication_stats().unwrap();
    assert_eq!(stats.history, 10);
    assert_eq!(stats.tombstones, 1);
    assert_eq!(bob.replication_stats().unwrap().tombstones, 0);

    bob.put("seen", 1).unwrap();
    sync(&mut alice, &mut bob);
    let stats = alice.replication_stats().unwrap();
    assert_eq!(stats.history, 0);
    assert_eq!(stats.tombstones, 0);

    assert_eq!(stats.tracked_records, 10);
    for seq in 1..=10 {
        assert!(alice.acknowledge(seq).unwrap());
    }
    assert_eq!(alice.replication_stats().unwrap().tracked_records, 0);
    assert_eq!(alice.operation_status(4).unwrap(), Some(OpStatus::Acknowledged));
}

// ===== TEXT =====

#[test]
fn test_concurrent_text_inserts_at_same_offset() {
    let (mut alice, mut bob, _, body) = replica_pair(TieBreak::ParticipantOrder);

    alice.text_insert(&body, 0, "hello").unwrap();
    bob.text_insert(&body, 0, "world").unwrap();
    sync(&mut alice, &mut bob);

    assert_eq!(alice.text(&body).unwrap().as_str(), "helloworld");
    assert_eq!(bob.text(&body).unwrap().as_str(), "helloworld");
}

#[test]
fn test_concurrent_overlapping_text_deletes() {
    let (mut alice, mut bob, _, body) = replica_pair(TieBreak::ParticipantOrder);
    alice.text_insert(&body, 0, "0123456789").unwrap();
    sync(&mut alice, &mut bob);

    assert_eq!(alice.text_delete(&body, 2, 6).unwrap(), "2345");
    assert_eq!(bob.text_delete(&body, 4, 8).unwrap(), "4567");
    sync(&mut alice, &mut bob);

    assert_eq!(alice.text(&body).unwrap().as_str(), "0189");
    assert_eq!(bob.text(&body).unwrap().as_str(), "0189");
}

#[test]
fn test_insert_inside_concurrent_delete() {
    let (mut alice, mut bob, _, body) = replica_pair(TieBreak::ParticipantOrder);
    alice.text_insert(&body, 0, "abcdef").unwrap();
    sync(&mut alice, &mut bob);

    alice.text_delete(&body, 1, 5).unwrap();
    bob.text_insert(&body, 3, "XY").unwrap();
    sync(&mut alice, &mut bob);

    // The delete is split around the insert, which survives.
    assert_eq!(alice.text(&body).unwrap().as_str(), "aXYf");
    assert_eq!(bob.text(&body).unwrap().as_str(), "aXYf");
}

#[test]
fn test_annotation_against_concurrent_insert() {
    let (mut alice, mut bob, _, body) = replica_pair(TieBreak::ParticipantOrder);
    alice.text_insert(&body, 0, "abcdef").unwrap();
    sync(&mut alice, &mut bob);

    alice.text_set_annotation(&body, 1, 5, "bold", Some("true")).unwrap();
    bob.text_insert(&body, 3, "XY").unwrap();
    sync(&mut alice, &mut bob);

    for doc in [&alice, &bob] {
        let text = doc.text(&body).unwrap();
        assert_eq!(text.as_str(), "abcXYdef");
        assert_eq!(text.annotation_at(2, "bold"), Some("true"));
        assert_eq!(text.annotation_at(3, "bold"), None);
        assert_eq!(text.annotation_at(6, "bold"), Some("true"));
    }
    assert_eq!(
        alice.text(&body).unwrap().annotations(),
        bob.text(&body).unwrap().annotations()
    );
}

// ===== RANDOMIZED =====

/// Two replicas with their in-flight records, delivered one at a time.
struct Session {
    alice: DocumentHandle,
    bob: DocumentHandle,
    items: NodeId,
    body: NodeId,
    to_bob: VecDeque<OperationRecord>,
    to_alice: VecDeque<OperationRecord>,
    next_value: usize,
    list_inserts: usize,
}

impl Session {
    fn new() -> Self {
        let (alice, bob, items, body) = replica_pair(TieBreak::ParticipantOrder);
        Self {
            alice,
            bob,
            items,
            body,
            to_bob: VecDeque::new(),
            to_alice: VecDeque::new(),
            next_value: 0,
            list_inserts: 0,
        }
    }

    fn edit(&mut self, rng: &mut StdRng, on_alice: bool, inserts_only: bool) {
        let (doc, queue) = if on_alice {
            (&mut self.alice, &mut self.to_bob)
        } else {
            (&mut self.bob, &mut self.to_alice)
        };
        self.next_value += 1;
        let value = format!("v{}", self.next_value);

        let list_len = doc.size(&self.items).unwrap();
        let text_len = doc.size(&self.body).unwrap();
        let choice = if inserts_only { rng.gen_range(0..2) * 2 } else { rng.gen_range(0..4) };
        match choice {
            0 => {
                doc.list_insert(&self.items, rng.gen_range(0..=list_len), value)
                    .unwrap();
                self.list_inserts += 1;
            }
            1 if list_len > 0 => {
                doc.list_remove(&self.items, rng.gen_range(0..list_len)).unwrap();
            }
            2 => doc
                .text_insert(&self.body, rng.gen_range(0..=text_len), &value)
                .unwrap(),
            3 if text_len > 0 => {
                let start = rng.gen_range(0..text_len);
                let end = rng.gen_range(start + 1..=text_len.min(start + 4));
                doc.text_delete(&self.body, start, end).unwrap();
            }
            _ => {}
        }
        queue.extend(doc.take_outbound().unwrap());
    }

    fn deliver_one(&mut self, to_alice: bool) {
        let (doc, queue) = if to_alice {
            (&mut self.alice, &mut self.to_alice)
        } else {
            (&mut self.bob, &mut self.to_bob)
        };
        if let Some(record) = queue.pop_front() {
            doc.apply_remote(record).unwrap();
        }
    }

    fn flush(&mut self) {
        while !self.to_alice.is_empty() || !self.to_bob.is_empty() {
            self.deliver_one(true);
            self.deliver_one(false);
        }
    }

    fn run(seed: u64, steps: usize, inserts_only: bool) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = Self::new();
        for _ in 0..steps {
            match rng.gen_range(0..4) {
                0 => session.edit(&mut rng, true, inserts_only),
                1 => session.edit(&mut rng, false, inserts_only),
                2 => session.deliver_one(false),
                _ => session.deliver_one(true),
            }
        }
        session.flush();
        session
    }
}

#[test]
fn test_random_interleavings_converge() {
    for seed in 0..20 {
        let session = Session::run(seed, 120, false);
        assert_eq!(
            session.alice.to_plain_value().unwrap(),
            session.bob.to_plain_value().unwrap(),
            "replicas diverged for seed {seed}"
        );
    }
}

#[test]
fn test_random_inserts_are_all_kept_once() {
    for seed in 100..110 {
        let session = Session::run(seed, 120, true);
        let alice = values_of(&session.alice, &session.items);
        assert_eq!(alice, values_of(&session.bob, &session.items), "seed {seed}");

        let mut seen: Vec<&Value> = alice.iter().collect();
        seen.sort_by_key(|v| v.as_str().map(str::to_string));
        seen.dedup();
        assert_eq!(seen.len(), alice.len(), "duplicate element for seed {seed}");
        assert!(session.list_inserts > 0, "seed {seed} issued no list inserts");
        assert_eq!(alice.len(), session.list_inserts, "list lost elements for seed {seed}");

        let text = session.alice.text(&session.body).unwrap().as_str().to_string();
        assert_eq!(text, session.bob.text(&session.body).unwrap().as_str(), "seed {seed}");
        let inserted: usize = session
            .alice
            .events()
            .unwrap()
            .filter(|e| e.node == session.body)
            .filter_map(|e| e.new_value.as_ref().and_then(PlainValue::as_str))
            .map(|s| s.chars().count())
            .sum();
        assert_eq!(text.chars().count(), inserted, "text lost characters for seed {seed}");
    }
}
