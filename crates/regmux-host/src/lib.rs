//! # regmux host
//!
//! Bridge between many concurrent async callers and one embedded scripting
//! host that is single-threaded, blocking and non-reentrant.
//!
//! ## Key Types
//!
//! - [`Host`] - The host's dispatch entry point
//! - [`HostBridge`] - FIFO worker owning the host; submit, call, shut down
//! - [`HostErrorTable`] - Closed table of domain errors for one subsystem
//! - [`VarClient`] - Variable namespaces of host locations
//! - [`RegClient`] - Register slots and the link table
//! - [`MemoryHost`] - In-memory host for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use regmux_host::{BridgeConfig, HostBridge, MemoryHost, RegClient};
//!
//! async fn example() {
//!     let bridge = HostBridge::start(MemoryHost::new(), BridgeConfig::default()).unwrap();
//!     let registers = RegClient::new(bridge.clone());
//!
//!     registers.mark_loaded().await.unwrap();
//!     let values = registers.get_all_registers().await.unwrap();
//!     # let _ = values;
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One worker**: the host lives on a dedicated thread; awaiting a call
//!   never blocks the scheduler
//! - **Strict FIFO**: calls execute one at a time in submission order
//! - **Typed replies**: malformed replies and unknown error codes become
//!   `InvalidResponse`, never a panic

pub mod bridge;
pub mod error;
pub mod memory;
pub mod registers;
pub mod reply;
pub mod traits;
pub mod vars;

pub use bridge::{BridgeConfig, HostBridge, Outcome, PendingCall, ShutdownMode};
pub use error::{ApiCallError, HostError, HostFault, Result};
pub use memory::MemoryHost;
pub use registers::RegClient;
pub use reply::{decode_reply, map_or_empty, HostErrorTable, NoDomainErrors};
pub use traits::{Host, HostRaise};
pub use vars::{LocationInfo, VarClient, VarHostError};
