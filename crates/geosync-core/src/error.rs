//! # Error Types
//!
//! Validation errors raised by the constructors and rule checks in this
//! crate. Network and catalog failures live in the client and engine crates.

use thiserror::Error;

/// Validation failure on a core value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A resource identifier was empty or contained characters that cannot
    /// appear in a workspace name or a storage path.
    #[error("invalid resource id {id:?}: {reason}")]
    InvalidResourceId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A layer name cannot be used as a GeoServer store or resource name.
    #[error("invalid layer name {name:?}: {reason}")]
    InvalidLayerName {
        /// The rejected name, before normalization.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}
