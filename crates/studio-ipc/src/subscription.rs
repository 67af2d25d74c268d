//! Event subscriptions.
//!
//! Every observer gets its own channel. Once an observer's backlog reaches the
//! bus capacity, meter updates for it are shed until it catches up; every
//! other event is always delivered, so show/hide and edit notifications stay
//! in order and never go missing.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::trace;

use crate::events::{ParticipantEvent, ParticipantEventKind, StudioEvent};
use crate::types::ParticipantId;

/// Fan-out of engine events to subscribed observers.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<StudioEvent>>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus that sheds meter updates for observers lagging by
    /// `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Receiver<StudioEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Register an observer interested in a single participant.
    pub fn watch(&self, id: ParticipantId) -> ParticipantWatch {
        ParticipantWatch::new(id, self.subscribe())
    }

    /// Deliver an event to every live observer. Dropped receivers are pruned.
    pub fn publish(&self, event: StudioEvent) {
        let sheddable = is_meter(&event);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| {
            if sheddable && tx.len() >= self.capacity {
                trace!(backlog = tx.len(), "Observer lagging, skipping meter update");
                return true;
            }
            tx.send(event.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Meter updates are superseded by the next tick.
fn is_meter(event: &StudioEvent) -> bool {
    matches!(
        event,
        StudioEvent::Participant(event) if event.kind() == ParticipantEventKind::Meter
    )
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::EVENT_CHANNEL_CAPACITY)
    }
}

/// Events for one participant, as a UI row sees them.
///
/// Once a [`ParticipantEvent::Hidden`] has been yielded the watch is detached
/// and yields nothing more; a row for the same participant reappearing needs a
/// fresh watch.
pub struct ParticipantWatch {
    id: ParticipantId,
    rx: Receiver<StudioEvent>,
    detached: bool,
}

impl ParticipantWatch {
    pub fn new(id: ParticipantId, rx: Receiver<StudioEvent>) -> Self {
        Self {
            id,
            rx,
            detached: false,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Next already-queued event for this participant, without blocking.
    pub fn try_next(&mut self) -> Option<ParticipantEvent> {
        while !self.detached {
            let event = self.rx.try_recv().ok()?;
            if let Some(event) = self.accept(event) {
                return Some(event);
            }
        }
        None
    }

    /// Next event for this participant, waiting up to `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ParticipantEvent> {
        let deadline = std::time::Instant::now() + timeout;
        while !self.detached {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
        None
    }

    fn accept(&mut self, event: StudioEvent) -> Option<ParticipantEvent> {
        let StudioEvent::Participant(event) = event else {
            return None;
        };
        if event.participant() != Some(&self.id) {
            return None;
        }
        if matches!(event, ParticipantEvent::Hidden { .. }) {
            self.detached = true;
        }
        Some(event)
    }
}
