//! # Reconciliation Planner
//!
//! Pure diff of desired layers against catalog entries. Names are compared
//! after slash normalization; store kind is not part of the match, so a
//! layer whose file changed kind under the same name is left alone.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use geosync_core::{CatalogEntry, LayerDescriptor};

/// Actions that converge a workspace on its desired layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    /// Create (reset) the workspace before registering.
    pub create_workspace: bool,
    /// Layers to stage and publish, in manifest order.
    pub to_register: Vec<LayerDescriptor>,
    /// Orphaned catalog entries, sorted.
    pub to_unregister: Vec<CatalogEntry>,
}

impl ReconciliationPlan {
    /// True when the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        !self.create_workspace && self.to_register.is_empty() && self.to_unregister.is_empty()
    }
}

/// Compute the plan for one resource.
///
/// Descriptors that normalize to the same name are registered once (the
/// first wins); both would map onto one store.
pub fn plan(desired: &[LayerDescriptor], actual: &BTreeSet<CatalogEntry>) -> ReconciliationPlan {
    let published: HashSet<&str> = actual.iter().map(|e| e.layer_name.as_str()).collect();
    let wanted: HashSet<String> = desired.iter().map(LayerDescriptor::normalized_name).collect();

    let mut seen = HashSet::new();
    let to_register: Vec<LayerDescriptor> = desired
        .iter()
        .filter(|d| {
            let name = d.normalized_name();
            !published.contains(name.as_str()) && seen.insert(name)
        })
        .cloned()
        .collect();

    let to_unregister: Vec<CatalogEntry> = actual
        .iter()
        .filter(|e| !wanted.contains(&e.layer_name))
        .cloned()
        .collect();

    ReconciliationPlan {
        create_workspace: !to_register.is_empty() && actual.is_empty(),
        to_register,
        to_unregister,
    }
}
