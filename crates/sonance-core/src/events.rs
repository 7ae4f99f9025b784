use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::RwLock;

use crate::chunk::Chunk;
use crate::error::ErrorRecord;
use crate::metrics::ProcessingMetrics;
use crate::state::EngineState;
use crate::stream::StreamId;

/// Events published on the engine's bus (spec §4.1).
#[derive(Debug, Clone)]
pub enum Event {
    StateChange(EngineState, EngineState),
    MetricsUpdate(ProcessingMetrics),
    Chunk(Chunk),
    ProcessingStart(StreamId),
    ProcessingEnd(StreamId),
    Error(ErrorRecord),
    DegradedMode,
    Destroyed,
}

/// A discriminant used to subscribe to a single event kind without cloning
/// a full `Event` just to pattern-match its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChange,
    MetricsUpdate,
    Chunk,
    ProcessingStart,
    ProcessingEnd,
    Error,
    DegradedMode,
    Destroyed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StateChange(..) => EventKind::StateChange,
            Event::MetricsUpdate(_) => EventKind::MetricsUpdate,
            Event::Chunk(_) => EventKind::Chunk,
            Event::ProcessingStart(_) => EventKind::ProcessingStart,
            Event::ProcessingEnd(_) => EventKind::ProcessingEnd,
            Event::Error(_) => EventKind::Error,
            Event::DegradedMode => EventKind::DegradedMode,
            Event::Destroyed => EventKind::Destroyed,
        }
    }
}

pub type Callback = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    callback: Callback,
}

/// Message-passing event bus: a `Vec<Callback>` per channel, iterated in
/// registration order under a read lock. Callbacks are expected to be
/// short and allocation-free; a panicking callback is caught so it can
/// never poison delivery to subsequent subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(
            self.next_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        );
        self.subscribers.write().push(Subscriber { id, kind, callback });
        id
    }

    pub fn off(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Dispatches `event` to every subscriber registered for its kind, in
    /// registration order. Panicking subscribers are converted into an
    /// `Error` event's worth of diagnostic via `tracing`, but never cause
    /// this call to unwind, and never block later subscribers.
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            if subscriber.kind != kind {
                continue;
            }
            let callback = &subscriber.callback;
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if result.is_err() {
                tracing::error!(?kind, "subscriber callback panicked; event bus continues");
            }
        }
    }
}
