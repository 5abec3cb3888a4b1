//! HTTP and WebSocket transports for the lumeo backend.
//!
//! Provides the concrete implementations of the seams `lumeo-core`
//! defines: [`api::BackendApi`] for the pull path (create, fetch,
//! recovery query, cancel, output lookup), [`socket::SocketSession`]
//! for the shared per-session event socket with automatic reconnect,
//! and [`feed::RowFeed`] for the per-job row-level change feed.

pub mod api;
pub mod feed;
pub mod messages;
pub mod reconnect;
pub mod socket;
