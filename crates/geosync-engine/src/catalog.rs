//! # Catalog Reader
//!
//! Reads the actual state of a workspace: the union of its vector stores
//! and its coverages.

use std::collections::BTreeSet;

use geosync_client::{ClientError, GeoServerClient};
use geosync_core::{CatalogEntry, StoreType, WorkspaceId};

use crate::error::ReconcileError;

/// List every published store of a workspace.
///
/// A listing answered with a non-success status counts as "no entries of
/// that kind", so a missing workspace reads as an empty catalog. When
/// GeoServer is not configured the catalog is empty.
pub async fn read_catalog(
    geoserver: &GeoServerClient,
    workspace: &WorkspaceId,
) -> Result<BTreeSet<CatalogEntry>, ReconcileError> {
    if !geoserver.is_configured() {
        return Ok(BTreeSet::new());
    }

    let datastores = listing(geoserver.list_datastores(workspace).await, workspace)?;
    let coverages = listing(geoserver.list_coverages(workspace).await, workspace)?;

    let entries: BTreeSet<CatalogEntry> = datastores
        .into_iter()
        .map(|name| (name, StoreType::DataStores))
        .chain(coverages.into_iter().map(|name| (name, StoreType::CoverageStores)))
        .map(|(layer_name, store_type)| CatalogEntry {
            layer_name,
            store_type,
        })
        .collect();

    tracing::debug!(workspace = %workspace, entries = entries.len(), "catalog read");
    Ok(entries)
}

fn listing(
    result: Result<Vec<String>, ClientError>,
    workspace: &WorkspaceId,
) -> Result<Vec<String>, ReconcileError> {
    match result {
        Ok(names) => Ok(names),
        Err(ClientError::Api { endpoint, status, .. }) => {
            tracing::debug!(%endpoint, status, "listing refused; treating as empty");
            Ok(Vec::new())
        }
        Err(ClientError::NotConfigured) => Ok(Vec::new()),
        Err(ClientError::Decode { reason, .. }) => Err(ReconcileError::CatalogInconsistency {
            workspace: workspace.to_string(),
            reason,
        }),
        Err(source) => Err(ReconcileError::CatalogUnreadable {
            workspace: workspace.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws() -> WorkspaceId {
        WorkspaceId::for_resource("HS", &"abc".parse().unwrap())
    }

    #[test]
    fn refused_listing_is_empty() {
        let err = ClientError::Api {
            endpoint: "GET x".into(),
            status: 404,
            body: "No such workspace".into(),
        };
        assert!(listing(Err(err), &ws()).unwrap().is_empty());
    }

    #[test]
    fn undecodable_listing_is_inconsistency() {
        let err = ClientError::Decode {
            endpoint: "GET x".into(),
            reason: "missing `coverages`".into(),
        };
        assert!(matches!(
            listing(Err(err), &ws()),
            Err(ReconcileError::CatalogInconsistency { .. })
        ));
    }

    #[test]
    fn url_error_is_unreadable() {
        let err = ClientError::Url {
            endpoint: "GET x".into(),
            base: "mailto:x".into(),
        };
        assert!(matches!(
            listing(Err(err), &ws()),
            Err(ReconcileError::CatalogUnreadable { .. })
        ));
    }
}
