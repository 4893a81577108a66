//! The retrying dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use dashmap::DashMap;
use roomsync_protocol::{Envelope, EventId, EventKind, Room, RoomId, ServerEvent};
use roomsync_transport::{ConnectionId, TransportError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::pending::{PendingEvent, PendingTable};
use crate::stats::StatsRecorder;
use crate::{
    ConfirmationMode, DeliveryStats, DispatchConfig, DispatchError, EventTransport,
    FallbackChannel, FallbackRequest, Target,
};

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Per-event delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    /// Escalate to the fallback channel when retries run out.
    pub critical: bool,
    /// Overrides the configured retry count.
    pub max_retries: Option<u32>,
}

/// One event to deliver.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub room_id: RoomId,
    /// Room version the event describes.
    pub room_version: u64,
    pub target: Target,
    pub event: ServerEvent,
    pub options: EmitOptions,
}

impl Outbound {
    /// Broadcast to every subscriber of `room`. Criticality follows the
    /// event type.
    pub fn to_room(room: &Room, event: ServerEvent) -> Self {
        Self::new(room, Target::Room(room.id), event)
    }

    /// Send to a single connection.
    pub fn to_connection(room: &Room, conn: ConnectionId, event: ServerEvent) -> Self {
        Self::new(room, Target::Connection(conn), event)
    }

    fn new(room: &Room, target: Target, event: ServerEvent) -> Self {
        Self {
            room_id: room.id,
            room_version: room.version,
            target,
            options: EmitOptions {
                critical: event.kind().is_critical(),
                max_retries: None,
            },
            event,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.options.critical = critical;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.options.max_retries = Some(retries);
        self
    }
}

/// How a finished event got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Confirmed on push delivery.
    Delivered { attempts: u32 },
    /// Push delivery gave up, the fallback call succeeded and subscribers
    /// were told to refresh.
    Recovered { attempts: u32 },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Resolves to the outcome of one dispatched event.
#[derive(Debug)]
pub struct DeliveryHandle {
    event_id: EventId,
    task: JoinHandle<Result<Delivery, DispatchError>>,
}

impl DeliveryHandle {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Waits for delivery to finish.
    pub async fn outcome(self) -> Result<Delivery, DispatchError> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Aborted(self.event_id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Confirmation {
    Ack,
    Nack(String),
}

enum Attempt {
    Sent(oneshot::Receiver<Confirmation>),
    Failed,
    Expired,
}

struct Inner<T, F> {
    config: DispatchConfig,
    transport: Arc<T>,
    fallback: F,
    next_event_id: AtomicU64,
    pending: PendingTable,
    waiters: DashMap<EventId, oneshot::Sender<Confirmation>>,
    stats: StatsRecorder,
}

/// Delivers events with bounded retries, exponential backoff and, for
/// critical events, a request/response fallback.
///
/// ```text
/// dispatch ─→ send #1 ─→ wait ≤ confirm_timeout ─┬─ confirmed ─→ Delivered
///                ↑                               └─ failed
///                └── sleep backoff(n) ←── attempts left?
///                                                    │ no
///                                   critical? ─ yes ─┴→ fallback ─→ refresh notices
///                                       │ no
///                                       └→ DeliveryFailure (logged, dropped)
/// ```
///
/// Cheap to clone; clones share the pending table, counters and event ids.
pub struct Dispatcher<T, F> {
    inner: Arc<Inner<T, F>>,
}

impl<T, F> Clone for Dispatcher<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: EventTransport, F: FallbackChannel> Dispatcher<T, F> {
    pub fn new(config: DispatchConfig, transport: Arc<T>, fallback: F) -> Self {
        let config = config.validated();
        debug!(
            max_retries = config.max_retries,
            confirm_timeout_ms = config.confirm_timeout.as_millis() as u64,
            confirmation = ?config.confirmation,
            "dispatcher created"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                fallback,
                next_event_id: AtomicU64::new(1),
                pending: PendingTable::default(),
                waiters: DashMap::new(),
                stats: StatsRecorder::default(),
            }),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// Starts delivery of one event.
    ///
    /// The first send happens before this returns, so events dispatched one
    /// after another reach the transport in that order. Retries and the
    /// confirmation wait continue in a background task.
    pub async fn dispatch(&self, outbound: Outbound) -> DeliveryHandle {
        let inner = &self.inner;
        let event_id = inner.next_id();
        let envelope = Envelope {
            event_id,
            room_id: outbound.room_id,
            room_version: outbound.room_version,
            timestamp: Utc::now(),
            critical: outbound.options.critical,
            event: outbound.event,
        };
        let kind = envelope.kind();
        let target = outbound.target;
        let max_attempts = inner.config.max_attempts(outbound.options.max_retries);

        inner.pending.insert(PendingEvent::new(target, envelope.clone()));
        inner.stats.record(kind, |s| s.attempted += 1);

        let first = inner.attempt(event_id, target, &envelope).await;
        let task = tokio::spawn(Arc::clone(inner).drive(target, envelope, max_attempts, first));
        DeliveryHandle { event_id, task }
    }

    /// Dispatches and waits. Returns `true` only if push delivery was
    /// confirmed.
    pub async fn emit(&self, outbound: Outbound) -> bool {
        self.dispatch(outbound)
            .await
            .outcome()
            .await
            .is_ok_and(|delivery| delivery.is_delivered())
    }

    /// Records a client acknowledgment. Returns `false` for unknown or
    /// already finished events.
    pub fn acknowledge(&self, event_id: EventId) -> bool {
        if let Some((_, waiter)) = self.inner.waiters.remove(&event_id) {
            return waiter.send(Confirmation::Ack).is_ok();
        }
        // Between attempts: the next retry check picks this up.
        self.inner.pending.mark_acknowledged(event_id)
    }

    /// Records a client rejection; the current attempt counts as failed.
    pub fn reject(&self, event_id: EventId, reason: impl Into<String>) -> bool {
        match self.inner.waiters.remove(&event_id) {
            Some((_, waiter)) => waiter.send(Confirmation::Nack(reason.into())).is_ok(),
            None => false,
        }
    }

    /// Drops pending entries older than the configured expiry.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Sweeps on the configured interval until every dispatcher clone is
    /// dropped.
    pub fn spawn_janitor(&self) -> JoinHandle<()> {
        let weak: Weak<Inner<T, F>> = Arc::downgrade(&self.inner);
        let interval = self.inner.config.janitor_interval;
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("dispatcher dropped, janitor stopping");
                    break;
                };
                inner.sweep_expired();
            }
        })
    }

    pub fn stats(&self) -> DeliveryStats {
        self.inner.stats.snapshot(self.inner.pending.len())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn pending_event(&self, event_id: EventId) -> Option<PendingEvent> {
        self.inner.pending.get(event_id)
    }
}

impl<T: EventTransport, F: FallbackChannel> Inner<T, F> {
    fn next_id(&self) -> EventId {
        EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn attempt(&self, id: EventId, target: Target, envelope: &Envelope) -> Attempt {
        let Some(attempt) = self.pending.record_attempt(id) else {
            return Attempt::Expired;
        };
        let kind = envelope.kind();
        self.stats.record(kind, |s| s.attempts += 1);

        // Registered before sending so a fast acknowledgment can't be missed.
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);

        match self.transport.send(target, envelope).await {
            Ok(()) => {
                debug!(event_id = %id, %kind, %target, attempt, "event sent");
                Attempt::Sent(rx)
            }
            Err(e) => {
                self.waiters.remove(&id);
                warn!(event_id = %id, %kind, %target, attempt, error = %e, "event send failed");
                Attempt::Failed
            }
        }
    }

    async fn confirm(&self, id: EventId, rx: oneshot::Receiver<Confirmation>) -> bool {
        let result = time::timeout(self.config.confirm_timeout, rx).await;
        self.waiters.remove(&id);
        match result {
            Ok(Ok(Confirmation::Ack)) => true,
            Ok(Ok(Confirmation::Nack(reason))) => {
                warn!(event_id = %id, %reason, "client rejected event");
                false
            }
            // Waiter dropped by a sweep.
            Ok(Err(_)) => false,
            Err(_) => match self.config.confirmation {
                ConfirmationMode::Implicit => true,
                ConfirmationMode::Explicit => {
                    debug!(event_id = %id, "no acknowledgment before timeout");
                    false
                }
            },
        }
    }

    async fn drive(
        self: Arc<Self>,
        target: Target,
        envelope: Envelope,
        max_attempts: u32,
        first: Attempt,
    ) -> Result<Delivery, DispatchError> {
        let id = envelope.event_id;
        let kind = envelope.kind();
        let mut attempt = first;
        let mut attempts = 1;

        loop {
            let confirmed = match attempt {
                Attempt::Sent(rx) => self.confirm(id, rx).await,
                Attempt::Failed => false,
                Attempt::Expired => return Err(DispatchError::Expired(id)),
            };
            if !self.pending.contains(id) {
                return Err(DispatchError::Expired(id));
            }
            if confirmed || self.pending.is_acknowledged(id) {
                return Ok(self.finish_delivered(id, kind, attempts));
            }
            if attempts >= max_attempts {
                break;
            }

            let delay = self.config.retry_delay(attempts);
            debug!(
                event_id = %id,
                %kind,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            time::sleep(delay).await;
            if self.pending.is_acknowledged(id) {
                return Ok(self.finish_delivered(id, kind, attempts));
            }
            attempts += 1;
            attempt = self.attempt(id, target, &envelope).await;
        }

        self.pending.mark_failed(id);
        self.stats.record(kind, |s| s.failed += 1);

        if envelope.critical {
            return self.fall_back(target, &envelope, attempts).await;
        }
        warn!(event_id = %id, %kind, %target, attempts, "event dropped after exhausting retries");
        Err(DispatchError::DeliveryFailure {
            event_id: id,
            kind,
            attempts,
        })
    }

    fn finish_delivered(&self, id: EventId, kind: EventKind, attempts: u32) -> Delivery {
        if self.pending.remove(id).is_some() {
            self.stats.record(kind, |s| s.delivered += 1);
            debug!(event_id = %id, %kind, attempts, "event delivered");
        }
        Delivery::Delivered { attempts }
    }

    async fn fall_back(
        &self,
        target: Target,
        envelope: &Envelope,
        attempts: u32,
    ) -> Result<Delivery, DispatchError> {
        let id = envelope.event_id;
        let kind = envelope.kind();
        let request = FallbackRequest::for_envelope(envelope);
        warn!(
            event_id = %id,
            %kind,
            attempts,
            method = request.method(),
            path = %request.path(),
            "push delivery exhausted, calling fallback"
        );

        match self.fallback.call(request).await {
            Ok(room) => {
                self.stats.record(kind, |s| s.fallback_succeeded += 1);
                info!(event_id = %id, %kind, room_id = %room.id, version = room.version, "fallback succeeded");
                self.notify(
                    Target::Room(room.id),
                    room.id,
                    room.version,
                    ServerEvent::StateRefreshRequired {
                        version: room.version,
                    },
                )
                .await;
                self.notify(
                    target,
                    room.id,
                    room.version,
                    ServerEvent::FallbackNotification { event_type: kind },
                )
                .await;
                Ok(Delivery::Recovered { attempts })
            }
            Err(e) => {
                self.stats.record(kind, |s| s.fallback_failed += 1);
                warn!(event_id = %id, %kind, error = %e, "fallback failed, asking subscribers to refresh");
                self.notify(
                    Target::Room(envelope.room_id),
                    envelope.room_id,
                    envelope.room_version,
                    ServerEvent::StateRefreshRequired {
                        version: envelope.room_version,
                    },
                )
                .await;
                Err(DispatchError::FallbackFailure {
                    event_id: id,
                    kind,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Best-effort delivery of a recovery notice.
    ///
    /// Notices are never critical, are not tracked in the pending table and
    /// don't wait for confirmation: the send is retried with the normal
    /// backoff until the transport accepts it.
    async fn notify(&self, target: Target, room_id: RoomId, room_version: u64, event: ServerEvent) {
        let envelope = Envelope {
            event_id: self.next_id(),
            room_id,
            room_version,
            timestamp: Utc::now(),
            critical: false,
            event,
        };
        let kind = envelope.kind();
        self.stats.record(kind, |s| s.attempted += 1);

        let max_attempts = self.config.max_attempts(None);
        let mut last_error: Option<TransportError> = None;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                time::sleep(self.config.retry_delay(attempt - 1)).await;
            }
            self.stats.record(kind, |s| s.attempts += 1);
            match self.transport.send(target, &envelope).await {
                Ok(()) => {
                    self.stats.record(kind, |s| s.delivered += 1);
                    debug!(event_id = %envelope.event_id, %kind, %target, "notice sent");
                    return;
                }
                Err(e) => last_error = Some(e),
            }
        }

        self.stats.record(kind, |s| s.failed += 1);
        warn!(
            event_id = %envelope.event_id,
            %kind,
            %target,
            error = ?last_error,
            "notice dropped after exhausting retries"
        );
    }

    fn sweep_expired(&self) -> usize {
        let expired = self.pending.sweep(Instant::now(), self.config.pending_expiry);
        for id in &expired {
            self.waiters.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired pending events swept");
        }
        expired.len()
    }
}
