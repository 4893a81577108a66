//! Reliable event delivery for roomsync.
//!
//! Every room-state change is pushed to subscribers through a
//! [`Dispatcher`]. Delivery is confirmed per event (implicitly or by client
//! acknowledgment), retried with exponential backoff, and, for critical
//! events, recovered through a request/response [`FallbackChannel`] when
//! retries run out. Subscribers are then told to refresh, so a lost event
//! never leaves a client silently out of date.
//!
//! # Integration
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(DispatchConfig::default(), hub, fallback);
//! let _janitor = dispatcher.spawn_janitor();
//!
//! // After a committed mutation:
//! dispatcher.dispatch(Outbound::to_room(&room, event)).await;
//!
//! // When a client frame arrives:
//! dispatcher.acknowledge(event_id);
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod dispatcher;
mod error;
mod fallback;
mod pending;
mod stats;
mod transport;

pub use config::{ConfirmationMode, DispatchConfig};
pub use dispatcher::{Delivery, DeliveryHandle, Dispatcher, EmitOptions, Outbound};
pub use error::{DispatchError, FallbackError};
pub use fallback::{FallbackChannel, FallbackRequest};
pub use pending::{DeliveryStatus, PendingEvent};
pub use stats::{DeliveryStats, KindStats};
pub use transport::{EventTransport, Target};
