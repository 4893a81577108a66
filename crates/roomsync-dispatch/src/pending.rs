//! Bookkeeping for events that haven't finished delivery.

use std::time::Duration;

use dashmap::DashMap;
use roomsync_protocol::{Envelope, EventId, EventKind};
use tokio::time::Instant;

use crate::Target;

/// Where an event is in its delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

/// One tracked event.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub id: EventId,
    pub target: Target,
    pub kind: EventKind,
    pub envelope: Envelope,
    /// Sends made so far. Zero until the first send is attempted.
    pub attempts: u32,
    pub status: DeliveryStatus,
    pub created_at: Instant,
    pub last_attempt_at: Option<Instant>,
    pub critical: bool,
}

impl PendingEvent {
    pub(crate) fn new(target: Target, envelope: Envelope) -> Self {
        Self {
            id: envelope.event_id,
            target,
            kind: envelope.kind(),
            critical: envelope.critical,
            envelope,
            attempts: 0,
            status: DeliveryStatus::Pending,
            created_at: Instant::now(),
            last_attempt_at: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    events: DashMap<EventId, PendingEvent>,
}

impl PendingTable {
    pub(crate) fn insert(&self, event: PendingEvent) {
        self.events.insert(event.id, event);
    }

    /// Counts a send. Returns the new attempt number, or `None` if the
    /// entry has been swept.
    pub(crate) fn record_attempt(&self, id: EventId) -> Option<u32> {
        let mut event = self.events.get_mut(&id)?;
        event.attempts += 1;
        event.last_attempt_at = Some(Instant::now());
        Some(event.attempts)
    }

    /// Flags an event confirmed while no confirmation wait was running.
    /// Ignored until at least one send has happened.
    pub(crate) fn mark_acknowledged(&self, id: EventId) -> bool {
        match self.events.get_mut(&id) {
            Some(mut event) if event.attempts > 0 && event.status == DeliveryStatus::Pending => {
                event.status = DeliveryStatus::Delivered;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_acknowledged(&self, id: EventId) -> bool {
        self.events
            .get(&id)
            .is_some_and(|event| event.status == DeliveryStatus::Delivered)
    }

    pub(crate) fn mark_failed(&self, id: EventId) {
        if let Some(mut event) = self.events.get_mut(&id) {
            event.status = DeliveryStatus::Failed;
        }
    }

    pub(crate) fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    pub(crate) fn remove(&self, id: EventId) -> Option<PendingEvent> {
        self.events.remove(&id).map(|(_, event)| event)
    }

    pub(crate) fn get(&self, id: EventId) -> Option<PendingEvent> {
        self.events.get(&id).map(|event| event.clone())
    }

    /// Drops every entry at least `expiry` old and returns their ids.
    pub(crate) fn sweep(&self, now: Instant, expiry: Duration) -> Vec<EventId> {
        let expired: Vec<EventId> = self
            .events
            .iter()
            .filter(|event| now.saturating_duration_since(event.created_at) >= expiry)
            .map(|event| event.id)
            .collect();
        for id in &expired {
            self.events.remove(id);
        }
        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
