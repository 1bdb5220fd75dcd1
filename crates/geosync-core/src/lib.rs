//! # geosync-core — Foundational Types for geosync
//!
//! Defines the value types shared by every other crate in the workspace:
//! the identifiers of a repository resource and of its GeoServer workspace,
//! the desired-state [`LayerDescriptor`], the actual-state [`CatalogEntry`],
//! and the rules a layer name has to satisfy before it can be embedded in a
//! GeoServer REST path.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `geosync-*` crates (this is the leaf of the DAG).
//! - No I/O. Everything here is recomputed per reconciliation run.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod layer;
pub mod manifest;

pub use error::CoreError;
pub use identity::{ResourceId, WorkspaceId};
pub use layer::{
    normalize_layer_name, validate_layer_name, CatalogEntry, LayerDescriptor, LayerType,
    StoreType,
};
pub use manifest::{strip_extension, ResourceFile};
