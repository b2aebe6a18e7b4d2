//! # regmux
//!
//! Shared session variables and registers across cooperating instances, each
//! fronting one embedded, single-threaded scripting host.
//!
//! ## Overview
//!
//! An [`Instance`] serves three services over its host:
//!
//! - **Mux**: session, window and buffer scoped variable namespaces, with
//!   session info published to a parent instance
//! - **Registers**: named clipboard-like slots, flooded to every linked
//!   registry on write
//! - **Extension**: actions the host triggers itself (publish, sync down)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use regmux::{Instance, InstanceConfig};
//! use regmux::host::MemoryHost;
//! use regmux::sync::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!
//!     let root = Instance::start(InstanceConfig::new("root"), MemoryHost::new(), network.clone())
//!         .await
//!         .unwrap();
//!
//!     let config = InstanceConfig::new("child").with_parent_reg("root", "0");
//!     let child = Instance::start(config, MemoryHost::new(), network.clone())
//!         .await
//!         .unwrap();
//!
//!     // writes on the child now reach the root, and the other way round
//!     child.shutdown().await;
//!     root.shutdown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `regmux::core` - Identifiers, references, links, error taxonomy
//! - `regmux::host` - Host bridge and typed host clients
//! - `regmux::sync` - Peer surface and wave propagation

pub mod config;
pub mod error;
pub mod ext;
pub mod instance;
pub mod mux;
pub mod reg;

pub use regmux_core as core;
pub use regmux_host as host;
pub use regmux_sync as sync;

pub use config::{InstanceConfig, ParentMux, ParentReg};
pub use error::{InstanceError, Result};
pub use ext::ExtensionService;
pub use instance::Instance;
pub use mux::{KeyValues, MuxService};
pub use reg::{RegService, RegistryInfo};

pub use regmux_core::{
    ApiError, ErrorCode, InstanceId, LinkTable, RegLink, RegisterUpdates, RegisterValues, Regname,
    RegistryId,
};
