//! # regmux core
//!
//! Pure primitives shared by every regmux crate.
//!
//! This crate contains no I/O, no threads, no networking.
//!
//! ## Key Types
//!
//! - [`Reference`] / [`Scope`] - Parsed `prefix:id` location references
//! - [`Regname`] - Single-character register names
//! - [`RegLink`] - A registry on some instance; the edge type of the link graph
//! - [`LinkTable`] - Reference-counted outbound links of a registry
//! - [`ApiError`] - Error taxonomy crossing component and instance boundaries

pub mod error;
pub mod link;
pub mod reference;
pub mod regname;
pub mod types;

pub use error::{
    ApiError, CoreError, ErrorCode, HostCallFailed, InvalidLocation, InvalidResponse,
    LocationDoesNotExist, OpaqueUpstream, RejectedUnlinkedSync, Result, WireError,
};
pub use link::{LinkCounts, LinkTable};
pub use reference::{parse_reference, Reference, Scope};
pub use regname::Regname;
pub use types::{
    InstanceId, RegLink, RegisterUpdates, RegisterValues, RegistryId, VarUpdates, VarValues,
};
