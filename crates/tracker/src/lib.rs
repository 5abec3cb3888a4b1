//! Job-lifecycle reconciliation engine.
//!
//! [`JobTracker`] tracks one generation job at a time across three
//! independent update channels (polling, row feed, session socket),
//! merges their updates into one canonical [`JobState`], recovers an
//! in-flight job after a restart, and enforces a per-type wall-clock
//! timeout from the *original* submission time.
//!
//! The engine is generic over the `lumeo-core` trait seams, so it runs
//! unchanged against the HTTP/WebSocket transports in `lumeo-client`
//! and against in-memory fakes in tests.
//!
//! [`JobState`]: lumeo_core::reconcile::JobState

mod feed;
mod polling;
mod resolver;
mod socket;

pub mod controller;
pub mod recovery;
pub mod store;
pub mod timeout;

pub use controller::{JobTracker, TrackerConfig};
pub use store::{FileStartTimeStore, MemoryStartTimeStore};
