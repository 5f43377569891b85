//! Index and offset transformation of concurrent operations.
//!
//! [`transform`] re-expresses an operation so it can be applied *after*
//! another operation that was issued concurrently against the same state.
//! It is a pure function of the two operations and a tie-break [`Side`];
//! it knows nothing about containers, replicas or history.
//!
//! For any two concurrent operations `a` and `b` and opposite sides,
//! applying `a` then `transform(b, a, ..)` yields the same state as
//! applying `b` then `transform(a, b, ..)`.
//!
//! The result is a sequence:
//!
//! - empty when the operation no longer has an effect (the index it
//!   removed is already gone, or it lost a last-writer-wins race),
//! - one element in the common case,
//! - two elements when a text deletion or annotation is split by a
//!   concurrent insertion. Deletion pieces are ordered from the highest
//!   offset down so they can be applied one after the other.

use super::{ListOp, MapOp, Operation, ParticipantOp, TextOp};

/// How a pair of concurrent operations is ordered when they collide.
///
/// `After` means "treat this operation as the later of the two": it wins
/// last-writer-wins races and its insertion lands after the other one at
/// the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Before,
    After,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Before => Side::After,
            Side::After => Side::Before,
        }
    }

    pub fn is_after(self) -> bool {
        self == Side::After
    }
}

/// Transforms `op` so it applies after `against`.
pub fn transform(op: &Operation, against: &Operation, side: Side) -> Vec<Operation> {
    let unchanged = || vec![op.clone()];
    match (op, against) {
        (Operation::Map { target, op: a }, Operation::Map { target: t2, op: b }) if target == t2 => {
            transform_map(a, b, side)
                .into_iter()
                .map(|op| Operation::map(target.clone(), op))
                .collect()
        }
        (Operation::List { target, op: a }, Operation::List { target: t2, op: b }) if target == t2 => {
            transform_list(a, b, side)
                .into_iter()
                .map(|op| Operation::list(target.clone(), op))
                .collect()
        }
        (Operation::Text { target, op: a }, Operation::Text { target: t2, op: b }) if target == t2 => {
            transform_text(a, b, side)
                .into_iter()
                .map(|op| Operation::text(target.clone(), op))
                .collect()
        }
        (Operation::Participants { op: a }, Operation::Participants { op: b }) => {
            transform_participants(a, b, side)
                .into_iter()
                .map(Operation::participants)
                .collect()
        }
        _ => unchanged(),
    }
}

/// Transforms two concurrent sequences against each other.
///
/// `a` and `b` both start from the same state. Returns `(a', b')` such that
/// `b ++ a'` and `a ++ b'` reach the same state. `side` is `a`'s side.
pub fn transform_sequences(
    a: &[Operation],
    b: &[Operation],
    side: Side,
) -> (Vec<Operation>, Vec<Operation>) {
    match (a, b) {
        ([], _) => (Vec::new(), b.to_vec()),
        (_, []) => (a.to_vec(), Vec::new()),
        ([x], [y]) => (transform(x, y, side), transform(y, x, side.flip())),
        ([_], [y, rest @ ..]) => {
            let (a1, y1) = transform_sequences(a, std::slice::from_ref(y), side);
            let (a2, rest1) = transform_sequences(&a1, rest, side);
            (a2, [y1, rest1].concat())
        }
        ([x, rest @ ..], _) => {
            let (x1, b1) = transform_sequences(std::slice::from_ref(x), b, side);
            let (rest1, b2) = transform_sequences(rest, &b1, side);
            ([x1, rest1].concat(), b2)
        }
    }
}

fn transform_map(a: &MapOp, b: &MapOp, side: Side) -> Vec<MapOp> {
    let (key_a, key_b) = (map_key(a), map_key(b));
    if key_a != key_b {
        return vec![a.clone()];
    }
    match (a, b) {
        (MapOp::Remove { .. }, MapOp::Remove { .. }) => Vec::new(),
        // Last writer wins on the same key.
        _ if side.is_after() => vec![a.clone()],
        _ => Vec::new(),
    }
}

fn map_key(op: &MapOp) -> &str {
    match op {
        MapOp::Put { key, .. } | MapOp::Remove { key } => key,
    }
}

fn transform_list(a: &ListOp, b: &ListOp, side: Side) -> Vec<ListOp> {
    use ListOp::*;
    let one = |op: ListOp| vec![op];
    match (a, b) {
        (Insert { index, value }, Insert { index: other, .. }) => {
            let index = if *index < *other || (*index == *other && !side.is_after()) {
                *index
            } else {
                index + 1
            };
            one(Insert { index, value: value.clone() })
        }
        (Insert { index, value }, Remove { index: other }) => {
            let index = if index <= other { *index } else { index - 1 };
            one(Insert { index, value: value.clone() })
        }
        (Insert { .. }, Set { .. }) => one(a.clone()),

        (Remove { index }, Insert { index: other, .. }) => {
            one(Remove { index: if index < other { *index } else { index + 1 } })
        }
        (Remove { index }, Remove { index: other }) => match index.cmp(other) {
            std::cmp::Ordering::Less => one(a.clone()),
            std::cmp::Ordering::Equal => Vec::new(),
            std::cmp::Ordering::Greater => one(Remove { index: index - 1 }),
        },
        (Remove { .. }, Set { .. }) => one(a.clone()),

        (Set { index, value }, Insert { index: other, .. }) => {
            let index = if index < other { *index } else { index + 1 };
            one(Set { index, value: value.clone() })
        }
        (Set { index, value }, Remove { index: other }) => match index.cmp(other) {
            std::cmp::Ordering::Less => one(a.clone()),
            std::cmp::Ordering::Equal => Vec::new(),
            std::cmp::Ordering::Greater => one(Set { index: index - 1, value: value.clone() }),
        },
        (Set { index, .. }, Set { index: other, .. }) => {
            if index != other || side.is_after() {
                one(a.clone())
            } else {
                Vec::new()
            }
        }
    }
}

/// Maps an offset through the deletion of `[start, start + len)`.
fn map_through_delete(x: usize, start: usize, len: usize) -> usize {
    if x <= start {
        x
    } else if x >= start + len {
        x - len
    } else {
        start
    }
}

fn transform_text(a: &TextOp, b: &TextOp, side: Side) -> Vec<TextOp> {
    use TextOp::*;
    match (a, b) {
        (Insert { offset, text }, Insert { offset: other, text: other_text }) => {
            let offset = if *offset < *other || (*offset == *other && !side.is_after()) {
                *offset
            } else {
                offset + other_text.chars().count()
            };
            vec![Insert { offset, text: text.clone() }]
        }
        (Insert { offset, text }, Delete { offset: start, len }) => vec![Insert {
            offset: map_through_delete(*offset, *start, *len),
            text: text.clone(),
        }],
        (Insert { .. }, Annotate { .. }) => vec![a.clone()],

        (Delete { offset, len }, Insert { offset: at, text }) => {
            let added = text.chars().count();
            let end = offset + len;
            if *at <= *offset {
                vec![Delete { offset: offset + added, len: *len }]
            } else if *at >= end {
                vec![a.clone()]
            } else {
                vec![
                    Delete { offset: at + added, len: end - at },
                    Delete { offset: *offset, len: at - offset },
                ]
            }
        }
        (Delete { offset, len }, Delete { offset: start, len: other_len }) => {
            let new_start = map_through_delete(*offset, *start, *other_len);
            let new_end = map_through_delete(offset + len, *start, *other_len);
            if new_end > new_start {
                vec![Delete { offset: new_start, len: new_end - new_start }]
            } else {
                Vec::new()
            }
        }
        (Delete { .. }, Annotate { .. }) => vec![a.clone()],

        (Annotate { start, end, key, value }, Insert { offset: at, text }) => {
            let added = text.chars().count();
            let piece = |start: usize, end: usize| Annotate {
                start,
                end,
                key: key.clone(),
                value: value.clone(),
            };
            if *at <= *start {
                vec![piece(start + added, end + added)]
            } else if *at >= *end {
                vec![a.clone()]
            } else {
                vec![piece(*start, *at), piece(at + added, end + added)]
            }
        }
        (Annotate { start, end, key, value }, Delete { offset, len }) => {
            let new_start = map_through_delete(*start, *offset, *len);
            let new_end = map_through_delete(*end, *offset, *len);
            if new_end > new_start {
                vec![Annotate {
                    start: new_start,
                    end: new_end,
                    key: key.clone(),
                    value: value.clone(),
                }]
            } else {
                Vec::new()
            }
        }
        (
            Annotate { start, end, key, value },
            Annotate { start: other_start, end: other_end, key: other_key, .. },
        ) => {
            let disjoint = end <= other_start || start >= other_end;
            if key != other_key || disjoint || side.is_after() {
                return vec![a.clone()];
            }
            // The other write wins where the ranges overlap.
            let piece = |start: usize, end: usize| Annotate {
                start,
                end,
                key: key.clone(),
                value: value.clone(),
            };
            let mut pieces = Vec::new();
            if start < other_start {
                pieces.push(piece(*start, *other_start));
            }
            if end > other_end {
                pieces.push(piece(*other_end, *end));
            }
            pieces
        }
    }
}

fn transform_participants(a: &ParticipantOp, b: &ParticipantOp, side: Side) -> Vec<ParticipantOp> {
    let conflicting = a.participant() == b.participant() && a != b;
    if conflicting && !side.is_after() {
        Vec::new()
    } else {
        vec![a.clone()]
    }
}
