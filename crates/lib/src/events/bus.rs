//! Listener registry and synchronous dispatch.

use std::{
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use super::{Diagnostic, DiagnosticSink, Event, ListenerError, ParticipantEvent};
use crate::model::NodeId;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Which data events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Changes to the direct entries of one node.
    Children(NodeId),
    /// Changes anywhere in the subtree rooted at one node, itself included.
    Subtree(NodeId),
}

impl Scope {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Scope::Children(id) => &event.node == id,
            Scope::Subtree(id) => &event.node == id || event.ancestors.contains(id),
        }
    }
}

type DataListener = Box<dyn FnMut(&Event, &mut ListenerContext) -> Result<(), ListenerError>>;
type ParticipantListener =
    Box<dyn FnMut(&ParticipantEvent, &mut ListenerContext) -> Result<(), ListenerError>>;

enum Subscription {
    Data { scope: Scope, listener: DataListener },
    Participants(ParticipantListener),
}

struct Registered {
    id: ListenerId,
    subscription: Subscription,
}

/// Passed to every callback so listeners can (un)subscribe mid-dispatch.
///
/// Listeners added here start receiving events with the next dispatch.
/// Listeners removed here are skipped for the rest of the current one.
pub struct ListenerContext {
    next_id: u64,
    added: Vec<Registered>,
    removed: Vec<ListenerId>,
}

impl ListenerContext {
    fn new(next_id: u64) -> Self {
        Self {
            next_id,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub fn subscribe<F>(&mut self, scope: Scope, listener: F) -> ListenerId
    where
        F: FnMut(&Event, &mut ListenerContext) -> Result<(), ListenerError> + 'static,
    {
        let id = self.allocate();
        self.added.push(Registered {
            id,
            subscription: Subscription::Data {
                scope,
                listener: Box::new(listener),
            },
        });
        id
    }

    pub fn subscribe_participants<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ParticipantEvent, &mut ListenerContext) -> Result<(), ListenerError> + 'static,
    {
        let id = self.allocate();
        self.added.push(Registered {
            id,
            subscription: Subscription::Participants(Box::new(listener)),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.added.retain(|r| r.id != id);
        if !self.removed.contains(&id) {
            self.removed.push(id);
        }
    }
}

/// Per-document event log and listener registry.
pub struct EventBus {
    listeners: Vec<Registered>,
    next_id: u64,
    next_seq: u64,
    log: VecDeque<Event>,
    participant_log: VecDeque<ParticipantEvent>,
    capacity: Option<usize>,
    sink: Option<Box<dyn DiagnosticSink>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("next_seq", &self.next_seq)
            .field("logged", &(self.log.len() + self.participant_log.len()))
            .field("capacity", &self.capacity)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus retaining at most `capacity` events of each kind.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            next_seq: 0,
            log: VecDeque::new(),
            participant_log: VecDeque::new(),
            capacity,
            sink: None,
        }
    }

    /// Registers a listener for data events in `scope`.
    pub fn subscribe<F>(&mut self, scope: Scope, listener: F) -> ListenerId
    where
        F: FnMut(&Event, &mut ListenerContext) -> Result<(), ListenerError> + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Registered {
            id,
            subscription: Subscription::Data {
                scope,
                listener: Box::new(listener),
            },
        });
        id
    }

    /// Registers a listener for participant events.
    pub fn subscribe_participants<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ParticipantEvent, &mut ListenerContext) -> Result<(), ListenerError> + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Registered {
            id,
            subscription: Subscription::Participants(Box::new(listener)),
        });
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|r| r.id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Installs the sink for listener failures and other diagnostics.
    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sink = Some(sink);
    }

    pub fn clear_sink(&mut self) {
        self.sink = None;
    }

    /// Sequence number of the most recent event.
    pub fn last_seq(&self) -> u64 {
        self.next_seq
    }

    /// Retained data events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.log.iter()
    }

    /// Retained data events with `seq` greater than `after`.
    pub fn events_since(&self, after: u64) -> impl Iterator<Item = &Event> {
        self.log.iter().filter(move |e| e.seq > after)
    }

    /// Retained participant events, oldest first.
    pub fn participant_events(&self) -> impl Iterator<Item = &ParticipantEvent> {
        self.participant_log.iter()
    }

    /// Stamps, logs and delivers a data event. Returns its sequence number.
    pub fn publish(&mut self, mut event: Event) -> u64 {
        self.next_seq += 1;
        event.seq = self.next_seq;
        tracing::trace!(seq = event.seq, node = %event.node, kind = ?event.kind, "publish event");

        self.dispatch(event.seq, |subscription, ctx| match subscription {
            Subscription::Data { scope, listener } if scope.matches(&event) => {
                Some(listener(&event, ctx))
            }
            _ => None,
        });
        push_bounded(&mut self.log, event, self.capacity);
        self.next_seq
    }

    /// Stamps, logs and delivers a participant event.
    pub fn publish_participant(&mut self, mut event: ParticipantEvent) -> u64 {
        self.next_seq += 1;
        event.seq = self.next_seq;
        tracing::trace!(seq = event.seq, participant = %event.participant, kind = ?event.kind, "publish participant event");

        self.dispatch(event.seq, |subscription, ctx| match subscription {
            Subscription::Participants(listener) => Some(listener(&event, ctx)),
            Subscription::Data { .. } => None,
        });
        push_bounded(&mut self.participant_log, event, self.capacity);
        self.next_seq
    }

    /// Forwards a diagnostic to the sink, if one is installed.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(sink) = self.sink.as_mut() {
            sink.report(&diagnostic);
        }
    }

    /// Calls every listener on a snapshot of the registry.
    ///
    /// A failing or panicking listener does not stop delivery to the rest.
    fn dispatch<F>(&mut self, seq: u64, mut call: F)
    where
        F: FnMut(&mut Subscription, &mut ListenerContext) -> Option<Result<(), ListenerError>>,
    {
        let mut listeners = std::mem::take(&mut self.listeners);
        let mut ctx = ListenerContext::new(self.next_id);
        let mut failures = Vec::new();

        for registered in listeners.iter_mut() {
            if ctx.removed.contains(&registered.id) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                call(&mut registered.subscription, &mut ctx)
            }));
            match outcome {
                Ok(None) | Ok(Some(Ok(()))) => {}
                Ok(Some(Err(err))) => failures.push((registered.id, err.message)),
                Err(payload) => failures.push((registered.id, panic_message(payload.as_ref()))),
            }
        }

        let ListenerContext {
            next_id,
            added,
            removed,
        } = ctx;
        self.next_id = next_id;
        listeners.retain(|r| !removed.contains(&r.id));
        // Listeners registered on the bus itself cannot appear mid-dispatch,
        // so the taken snapshot is the whole registry.
        listeners.extend(added);
        self.listeners = listeners;

        for (listener, message) in failures {
            tracing::warn!(%listener, seq, "listener failed: {message}");
            self.report(Diagnostic::ListenerFailed {
                listener,
                event_seq: seq,
                message,
            });
        }
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T, capacity: Option<usize>) {
    if capacity == Some(0) {
        return;
    }
    log.push_back(item);
    if let Some(capacity) = capacity {
        while log.len() > capacity {
            log.pop_front();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
