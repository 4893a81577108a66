//! Room document storage for roomsync.
//!
//! The store is the single writer of room documents. Every change is a
//! conditional write against the version the caller last saw:
//!
//! ```text
//! get(R-1) ──→ v7 ──→ mutate copy ──→ compare_and_swap(7, v8)
//!                                          │
//!                         stored still v7? ├─ yes → committed v8
//!                                          └─ no  → VersionConflict(current)
//! ```
//!
//! # Key Types
//!
//! - [`RoomStore`] — the contract, with scoped operations built on
//!   [`RoomStore::apply_mutation`]
//! - [`MemoryRoomStore`] — the bundled engine
//! - [`mutations`] and [`teams`] — the pure edits those operations apply

mod config;
mod error;
mod memory;
pub mod mutations;
mod store;
pub mod teams;

pub use config::StoreConfig;
pub use error::StoreError;
pub use memory::MemoryRoomStore;
pub use store::RoomStore;
