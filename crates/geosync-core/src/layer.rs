//! # Layers and Catalog Entries
//!
//! [`LayerDescriptor`] is one file the repository says should be published
//! (desired state). [`CatalogEntry`] is one store GeoServer says is
//! published (actual state). The two are compared by normalized name: the
//! descriptor's name is a contents-relative path, and GeoServer rejects `/`
//! in identifiers, so every `/` becomes a single space before comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Characters GeoServer parses as extension or list separators in REST paths.
const FORBIDDEN_NAME_CHARS: [char; 2] = ['.', ','];

/// Replace every `/` with a single space.
pub fn normalize_layer_name(name: &str) -> String {
    name.replace('/', " ")
}

/// Reject names that GeoServer would misparse when embedded in a REST path.
pub fn validate_layer_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::InvalidLayerName {
            name: name.to_string(),
            reason: "must not be empty".into(),
        });
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(CoreError::InvalidLayerName {
            name: name.to_string(),
            reason: format!("contains forbidden character {c:?}"),
        });
    }
    Ok(())
}

/// Kind of published layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LayerType {
    /// GeoTIFF coverage.
    Raster,
    /// ESRI shapefile feature type.
    Feature,
}

impl LayerType {
    /// Store collection the layer is registered under.
    pub fn store_type(self) -> StoreType {
        match self {
            Self::Raster => StoreType::CoverageStores,
            Self::Feature => StoreType::DataStores,
        }
    }

    /// Resource collection beneath the store (`coverages` / `featuretypes`).
    pub fn layer_group(self) -> &'static str {
        match self {
            Self::Raster => "coverages",
            Self::Feature => "featuretypes",
        }
    }

    /// Top-level key of the resource description JSON document.
    pub fn verification_key(self) -> &'static str {
        match self {
            Self::Raster => "coverage",
            Self::Feature => "featureType",
        }
    }

    /// Extension used in the `external.{file_type}` registration path.
    pub fn file_type(self) -> &'static str {
        match self {
            Self::Raster => "geotiff",
            Self::Feature => "shp",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => write!(f, "GeographicRaster"),
            Self::Feature => write!(f, "GeographicFeature"),
        }
    }
}

/// GeoServer store collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoreType {
    #[serde(rename = "coveragestores")]
    CoverageStores,
    #[serde(rename = "datastores")]
    DataStores,
}

impl StoreType {
    /// Path segment used in the GeoServer REST API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoverageStores => "coveragestores",
            Self::DataStores => "datastores",
        }
    }

    /// Extensions of the staged files that back a store of this kind.
    pub fn staged_extensions(self) -> &'static [&'static str] {
        match self {
            Self::CoverageStores => &["tif"],
            Self::DataStores => &["shp", "shx", "dbf", "prj"],
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository file that should be published as a layer.
///
/// The GeoServer-facing attributes (`store_type`, `layer_group`,
/// `verification_key`, `file_type`) are fixed by `layer_type` and exposed as
/// methods so they can never disagree with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Contents-relative path without extension, e.g. `rivers/flow`.
    pub layer_name: String,
    pub layer_type: LayerType,
    /// Declared file name without extension. GeoServer names the generated
    /// resource after this.
    pub file_name: String,
    /// Path from the resource id onward: `{resource_id}/data/contents/...`.
    pub source_path: String,
    /// Sidecar paths in the same form as `source_path`, ordered `.shx`,
    /// `.dbf`, `.prj`. Always empty for rasters.
    #[serde(default)]
    pub associated_files: Vec<String>,
}

impl LayerDescriptor {
    /// Layer name with `/` replaced by a space. This is the name used for
    /// the store, the resource and the style on GeoServer.
    pub fn normalized_name(&self) -> String {
        normalize_layer_name(&self.layer_name)
    }

    pub fn store_type(&self) -> StoreType {
        self.layer_type.store_type()
    }

    pub fn layer_group(&self) -> &'static str {
        self.layer_type.layer_group()
    }

    pub fn verification_key(&self) -> &'static str {
        self.layer_type.verification_key()
    }

    pub fn file_type(&self) -> &'static str {
        self.layer_type.file_type()
    }

    /// Primary file followed by its sidecars.
    pub fn staged_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source_path.as_str())
            .chain(self.associated_files.iter().map(String::as_str))
    }

    /// The catalog entry this descriptor produces once published.
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            layer_name: self.normalized_name(),
            store_type: self.store_type(),
        }
    }
}

/// A store currently published in a resource's workspace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Store name as GeoServer reports it (already slash-free).
    pub layer_name: String,
    pub store_type: StoreType,
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.layer_name, self.store_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shapefile() -> LayerDescriptor {
        LayerDescriptor {
            layer_name: "zones/parcels".into(),
            layer_type: LayerType::Feature,
            file_name: "parcels".into(),
            source_path: "abc/data/contents/zones/parcels.shp".into(),
            associated_files: vec![
                "abc/data/contents/zones/parcels.shx".into(),
                "abc/data/contents/zones/parcels.dbf".into(),
            ],
        }
    }

    #[test]
    fn normalize_replaces_every_slash() {
        assert_eq!(normalize_layer_name("a/b/c"), "a b c");
        assert_eq!(normalize_layer_name("plain"), "plain");
    }

    #[test]
    fn validate_rejects_dot_and_comma() {
        assert!(validate_layer_name("watershed").is_ok());
        assert!(validate_layer_name("dir/watershed").is_ok());
        assert!(matches!(
            validate_layer_name("water.shed"),
            Err(CoreError::InvalidLayerName { .. })
        ));
        assert!(validate_layer_name("a,b").is_err());
        assert!(validate_layer_name("").is_err());
    }

    #[test]
    fn raster_attributes() {
        let t = LayerType::Raster;
        assert_eq!(t.store_type(), StoreType::CoverageStores);
        assert_eq!(t.layer_group(), "coverages");
        assert_eq!(t.verification_key(), "coverage");
        assert_eq!(t.file_type(), "geotiff");
    }

    #[test]
    fn feature_attributes() {
        let t = LayerType::Feature;
        assert_eq!(t.store_type(), StoreType::DataStores);
        assert_eq!(t.layer_group(), "featuretypes");
        assert_eq!(t.verification_key(), "featureType");
        assert_eq!(t.file_type(), "shp");
    }

    #[test]
    fn store_type_serializes_as_rest_segment() {
        let json = serde_json::to_string(&StoreType::CoverageStores).unwrap();
        assert_eq!(json, "\"coveragestores\"");
        let back: StoreType = serde_json::from_str("\"datastores\"").unwrap();
        assert_eq!(back, StoreType::DataStores);
    }

    #[test]
    fn staged_paths_lists_primary_then_sidecars() {
        let d = shapefile();
        let paths: Vec<&str> = d.staged_paths().collect();
        assert_eq!(
            paths,
            vec![
                "abc/data/contents/zones/parcels.shp",
                "abc/data/contents/zones/parcels.shx",
                "abc/data/contents/zones/parcels.dbf",
            ]
        );
    }

    #[test]
    fn catalog_entry_uses_normalized_name() {
        let entry = shapefile().catalog_entry();
        assert_eq!(entry.layer_name, "zones parcels");
        assert_eq!(entry.store_type, StoreType::DataStores);
    }

    proptest! {
        #[test]
        fn normalized_names_never_contain_slash(name in ".{0,40}") {
            prop_assert!(!normalize_layer_name(&name).contains('/'));
        }

        #[test]
        fn names_with_forbidden_chars_always_rejected(
            prefix in "[a-z/ ]{0,10}",
            sep in prop::sample::select(vec!['.', ',']),
            suffix in "[a-z]{0,10}",
        ) {
            let name = format!("{prefix}{sep}{suffix}");
            prop_assert!(validate_layer_name(&name).is_err());
        }
    }
}
