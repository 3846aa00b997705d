//! Event emitter with sequence guarantees.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use events::{Event, EventBus, EventEnvelope};

/// Wraps an [`EventBus`] and stamps every envelope with a monotonically
/// increasing sequence number, shared across clones.
#[derive(Clone, Debug)]
pub struct OrderedEventEmitter {
    bus: EventBus,
    sequence: Arc<AtomicU64>,
}

impl OrderedEventEmitter {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event with the next sequence number and return that number.
    pub fn emit(&self, event: Event) -> u64 {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.bus
            .publish(EventEnvelope::new(event).with_sequence(seq));
        seq
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
