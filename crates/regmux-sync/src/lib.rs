//! # regmux sync
//!
//! Peer surface and flood propagation of register writes across the link
//! graph.
//!
//! ## Key Types
//!
//! - [`Request`] / [`Response`] - What instances send each other
//! - [`Transport`] - Delivers a request to a peer instance
//! - [`RequestHandler`] - Serves requests arriving from peers
//! - [`SyncPropagator`] - Forwards a wave to unvisited links
//! - [`MemoryNetwork`] - In-memory network of instances
//!
//! ## Wave Flow
//!
//! ```text
//! A (write)                    B                         C
//!   |-- SyncAll(src=A/0, ------>|                         |
//!   |   visited={A})            |-- SyncAll(src=B/0, ---->|
//!   |                           |   visited={A,B})        | links {A,B} visited
//!   |                           |<-- Synced{A,B,C} -------|
//!   |<-- Synced{A,B,C} ---------|                         |
//!   | link C already visited, skipped                     |
//! ```
//!
//! ## Design Notes
//!
//! - **Depth-first flood**: links are called one at a time and each reply
//!   extends the visited set, so every reachable registry applies a wave once
//! - **Isolated failures**: a failing peer is logged, stays unvisited and can
//!   still be reached through another link
//! - **No retries**: a peer no path reaches simply misses the wave

pub mod error;
pub mod messages;
pub mod propagator;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{Request, Response, SyncAllParams, SyncMultipleParams, VisitedSet};
pub use propagator::{FanOutReport, SyncPropagator};
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, Network, RequestHandler, Transport,
    TransportExt,
};
