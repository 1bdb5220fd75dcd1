//! # Inventory Classifier
//!
//! Turns a repository manifest into the desired state: one
//! [`LayerDescriptor`] per publishable file.
//!
//! A file is publishable when its (logical file type, content type) pair
//! and its URL extension match one of:
//!
//! | Logical file type | Content type | Extension | Layer |
//! |-------------------|--------------|-----------|-------|
//! | `GeoRasterLogicalFile` | `image/tiff` | `tif` | Raster |
//! | `GeoFeatureLogicalFile` | `application/x-qgis` | `shp` | Feature |
//!
//! and GeoServer is configured. Feature layers pick up whichever `.shx`,
//! `.dbf` and `.prj` siblings the manifest lists.

use std::collections::HashSet;

use serde::Serialize;
use url::Url;

use geosync_client::{Manifest, RepositoryClient};
use geosync_core::{strip_extension, LayerDescriptor, LayerType, ResourceFile, ResourceId};

use crate::error::ReconcileError;

/// Sidecar extensions of a shapefile, in the order they are staged.
const SHAPEFILE_SIDECARS: [&str; 3] = ["shx", "dbf", "prj"];

/// Whether the repository lets anyone read the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
}

/// Desired state of one resource.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub access: Access,
    /// Publishable layers in manifest order. Empty when private.
    pub layers: Vec<LayerDescriptor>,
}

/// Fetch a resource's manifest and classify it.
///
/// A private or absent resource is not an error; it yields
/// [`Access::Private`] and no layers.
pub async fn fetch_inventory(
    repository: &RepositoryClient,
    resource_id: &ResourceId,
    publishing_enabled: bool,
) -> Result<Inventory, ReconcileError> {
    let manifest = repository
        .file_list(resource_id)
        .await
        .map_err(|source| ReconcileError::ManifestUnavailable {
            resource_id: resource_id.to_string(),
            source,
        })?;

    match manifest {
        Manifest::Private { .. } => Ok(Inventory {
            access: Access::Private,
            layers: Vec::new(),
        }),
        Manifest::Public(files) => {
            let layers = if publishing_enabled {
                classify(resource_id, &files)
            } else {
                Vec::new()
            };
            tracing::info!(
                files = files.len(),
                layers = layers.len(),
                "manifest classified"
            );
            Ok(Inventory {
                access: Access::Public,
                layers,
            })
        }
    }
}

/// Derive layer descriptors from a public manifest.
pub fn classify(resource_id: &ResourceId, files: &[ResourceFile]) -> Vec<LayerDescriptor> {
    let listed: HashSet<&str> = files.iter().map(|f| f.url.as_str()).collect();

    files
        .iter()
        .filter_map(|file| {
            let layer_type = layer_type_of(file)?;
            let Some(location) = ContentsLocation::parse(resource_id, &file.url) else {
                tracing::warn!(url = %file.url, "file is outside the resource contents; skipping");
                return None;
            };

            let associated_files = match layer_type {
                LayerType::Raster => Vec::new(),
                LayerType::Feature => sidecars(resource_id, &file.url, &listed),
            };

            let file_name = if file.file_name.is_empty() {
                strip_extension(location.file_name()).to_string()
            } else {
                file.file_stem().to_string()
            };

            Some(LayerDescriptor {
                layer_name: strip_extension(&location.relative).to_string(),
                layer_type,
                file_name,
                source_path: location.source_path,
                associated_files,
            })
        })
        .collect()
}

fn layer_type_of(file: &ResourceFile) -> Option<LayerType> {
    match (
        file.logical_file_type.as_str(),
        file.content_type.as_str(),
        file.extension(),
    ) {
        ("GeoRasterLogicalFile", "image/tiff", Some("tif")) => Some(LayerType::Raster),
        ("GeoFeatureLogicalFile", "application/x-qgis", Some("shp")) => Some(LayerType::Feature),
        _ => None,
    }
}

/// Source paths of the sidecars of `shp_url` that the manifest lists.
fn sidecars(resource_id: &ResourceId, shp_url: &str, listed: &HashSet<&str>) -> Vec<String> {
    let Some(base) = shp_url.strip_suffix(".shp") else {
        return Vec::new();
    };
    SHAPEFILE_SIDECARS
        .iter()
        .map(|ext| format!("{base}.{ext}"))
        .filter(|url| listed.contains(url.as_str()))
        .filter_map(|url| ContentsLocation::parse(resource_id, &url).map(|l| l.source_path))
        .collect()
}

/// Where a manifest URL sits inside a resource.
#[derive(Debug, PartialEq, Eq)]
struct ContentsLocation {
    /// `{resource_id}/data/contents/{relative}`, percent-decoded.
    source_path: String,
    /// Path below `data/contents/`, percent-decoded.
    relative: String,
}

impl ContentsLocation {
    fn parse(resource_id: &ResourceId, raw_url: &str) -> Option<Self> {
        let url = Url::parse(raw_url).ok()?;
        let segments = url
            .path_segments()?
            .map(|s| urlencoding::decode(s).map(|c| c.into_owned()))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        let start = segments.windows(3).position(|w| {
            w[0] == resource_id.as_str() && w[1] == "data" && w[2] == "contents"
        })?;
        let relative = &segments[start + 3..];
        if relative.is_empty() || relative.iter().any(|s| s.is_empty()) {
            return None;
        }

        Some(Self {
            source_path: segments[start..].join("/"),
            relative: relative.join("/"),
        })
    }

    fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}
