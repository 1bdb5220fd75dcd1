//! # Layer Publisher
//!
//! Turns a staged file into a named, queryable layer:
//!
//! 1. Reject names GeoServer would misparse (`.` or `,`).
//! 2. Register the staged file as an external store (`201` expected).
//! 3. Read back the generated resource; require `{key}.enabled == true`
//!    and take its `nativeBoundingBox`.
//! 4. Rename the resource to the layer name by rewriting `name` in the
//!    retrieved document and writing it back (`200` expected).
//! 5. Rasters only: synthesize and bind a greyscale style. Failures here
//!    leave the layer published with GeoServer's default style.
//! 6. Build the WMS preview URL.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use geosync_client::{GeoServerClient, RepositoryClient, ResourcePath};
use geosync_core::{validate_layer_name, LayerDescriptor, LayerType, WorkspaceId};

use crate::error::{LayerFailure, PublishStep, StyleError};
use crate::stage::Stager;
use crate::style::{render_sld, vrt_path, RasterStatistics};

/// Preview map size, in pixels.
const PREVIEW_WIDTH: u32 = 612;
const PREVIEW_HEIGHT: u32 = 768;

/// A layer that made it through the publish protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedLayer {
    /// Normalized name the layer is published under.
    pub name: String,
    pub preview_url: Url,
    /// Whether the synthesized raster style was bound.
    pub styled: bool,
}

/// `nativeBoundingBox` of a generated resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
    /// Either `"EPSG:4326"` or `{"@class": "projected", "$": "PROJCS[...]"}`.
    #[serde(default)]
    pub crs: Option<Value>,
}

impl BoundingBox {
    /// Spatial reference suitable for the `srs` query parameter.
    pub fn srs(&self) -> Option<&str> {
        match self.crs.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            Value::Object(map) => map.get("$").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Runs the publish protocol against one GeoServer.
#[derive(Debug, Clone)]
pub struct Publisher {
    geoserver: GeoServerClient,
    repository: RepositoryClient,
    stager: Stager,
}

impl Publisher {
    pub fn new(geoserver: GeoServerClient, repository: RepositoryClient, stager: Stager) -> Self {
        Self {
            geoserver,
            repository,
            stager,
        }
    }

    /// Publish a staged descriptor.
    pub async fn publish(
        &self,
        workspace: &WorkspaceId,
        descriptor: &LayerDescriptor,
    ) -> Result<PublishedLayer, LayerFailure> {
        validate_layer_name(&descriptor.layer_name)?;
        let name = descriptor.normalized_name();
        let root = self
            .geoserver
            .service_root()
            .map_err(|e| LayerFailure::publish(PublishStep::Register, e))?;

        self.geoserver
            .register_external(
                workspace,
                descriptor.store_type(),
                &name,
                descriptor.file_type(),
                &self.stager.staged_uri(&descriptor.source_path),
            )
            .await
            .map_err(|e| LayerFailure::publish(PublishStep::Register, e))?;

        let path = ResourcePath {
            workspace,
            store_type: descriptor.store_type(),
            store: &name,
            layer_group: descriptor.layer_group(),
            resource: &descriptor.file_name,
        };
        let mut document = self
            .geoserver
            .get_resource(&path)
            .await
            .map_err(|e| LayerFailure::publish(PublishStep::Verify, e))?;
        let bbox = verify(&document, descriptor.verification_key())
            .map_err(|reason| LayerFailure::publish(PublishStep::Verify, reason))?;

        document[descriptor.verification_key()]["name"] = Value::String(name.clone());
        self.geoserver
            .put_resource(&path, &document)
            .await
            .map_err(|e| LayerFailure::publish(PublishStep::Rename, e))?;

        let styled = match descriptor.layer_type {
            LayerType::Feature => false,
            LayerType::Raster => match self.style_raster(workspace, descriptor, &name).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(layer = %name, "raster left with default style: {e}");
                    false
                }
            },
        };

        let preview_url = preview_url(&root, workspace, &name, &bbox);

        tracing::info!(layer = %name, store_type = %descriptor.store_type(), styled, "layer published");
        Ok(PublishedLayer {
            name,
            preview_url,
            styled,
        })
    }

    async fn style_raster(
        &self,
        workspace: &WorkspaceId,
        descriptor: &LayerDescriptor,
        name: &str,
    ) -> Result<(), StyleError> {
        let vrt = self
            .repository
            .fetch_text(&vrt_path(&descriptor.source_path))
            .await
            .map_err(StyleError::Fetch)?;
        let stats = RasterStatistics::from_vrt(&vrt)?;
        let sld = render_sld(name, &stats);

        self.geoserver
            .upsert_style(workspace, name, &sld)
            .await
            .map_err(StyleError::Upload)?;
        self.geoserver
            .set_default_style(workspace, name, name)
            .await
            .map_err(StyleError::Bind)?;
        Ok(())
    }
}

/// Check `{key}.enabled == true` and extract `{key}.nativeBoundingBox`.
fn verify(document: &Value, key: &str) -> Result<BoundingBox, String> {
    let resource = document
        .get(key)
        .filter(|r| r.is_object())
        .ok_or_else(|| format!("resource description has no `{key}` object"))?;

    if resource.get("enabled") != Some(&Value::Bool(true)) {
        return Err(format!("`{key}.enabled` is not true"));
    }

    let bbox = resource
        .get("nativeBoundingBox")
        .ok_or_else(|| format!("`{key}.nativeBoundingBox` is missing"))?;
    BoundingBox::deserialize(bbox).map_err(|e| format!("`{key}.nativeBoundingBox` is malformed: {e}"))
}

/// `{root}/{ws}/wms?service=WMS&...&layers={ws}:{layer}&bbox=...`
pub fn preview_url(service_root: &Url, workspace: &WorkspaceId, layer: &str, bbox: &BoundingBox) -> Url {
    let mut url = service_root.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend([workspace.as_str(), "wms"]);
    }
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("service", "WMS")
            .append_pair("version", "1.1.0")
            .append_pair("request", "GetMap")
            .append_pair("layers", &format!("{workspace}:{layer}"))
            .append_pair(
                "bbox",
                &format!("{},{},{},{}", bbox.minx, bbox.miny, bbox.maxx, bbox.maxy),
            )
            .append_pair("width", &PREVIEW_WIDTH.to_string())
            .append_pair("height", &PREVIEW_HEIGHT.to_string())
            .append_pair("format", "application/openlayers");
        if let Some(srs) = bbox.srs() {
            query.append_pair("srs", srs);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ws() -> WorkspaceId {
        WorkspaceId::for_resource("HS", &"abc".parse().unwrap())
    }

    #[test]
    fn verify_accepts_enabled_resource() {
        let doc = json!({"coverage": {
            "name": "watershed",
            "enabled": true,
            "nativeBoundingBox": {"minx": -111.5, "miny": 40.0, "maxx": -111.0, "maxy": 41.0, "crs": "EPSG:4326"}
        }});
        let bbox = verify(&doc, "coverage").unwrap();
        assert_eq!(bbox.minx, -111.5);
        assert_eq!(bbox.srs(), Some("EPSG:4326"));
    }

    #[test]
    fn verify_rejects_disabled_resource() {
        let doc = json!({"featureType": {"enabled": false, "nativeBoundingBox": {}}});
        assert!(verify(&doc, "featureType").unwrap_err().contains("enabled"));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let doc = json!({"featureType": {"enabled": true}});
        assert!(verify(&doc, "coverage").is_err());
    }

    #[test]
    fn verify_rejects_malformed_bbox() {
        let doc = json!({"coverage": {"enabled": true, "nativeBoundingBox": {"minx": "west"}}});
        assert!(verify(&doc, "coverage").unwrap_err().contains("malformed"));
    }

    #[test]
    fn projected_crs_object_yields_srs() {
        let bbox: BoundingBox = serde_json::from_value(json!({
            "minx": 0.0, "miny": 0.0, "maxx": 1.0, "maxy": 1.0,
            "crs": {"@class": "projected", "$": "EPSG:26912"}
        }))
        .unwrap();
        assert_eq!(bbox.srs(), Some("EPSG:26912"));
    }

    #[test]
    fn preview_url_has_wms_parameters() {
        let root = Url::parse("https://geo.example.org/geoserver").unwrap();
        let bbox = BoundingBox {
            minx: -111.5,
            miny: 40.0,
            maxx: -111.0,
            maxy: 41.25,
            crs: Some(json!("EPSG:4326")),
        };
        let url = preview_url(&root, &ws(), "rivers flow", &bbox);

        assert_eq!(url.path(), "/geoserver/HS-abc/wms");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("request"), Some("GetMap"));
        assert_eq!(get("layers"), Some("HS-abc:rivers flow"));
        assert_eq!(get("bbox"), Some("-111.5,40,-111,41.25"));
        assert_eq!(get("width"), Some("612"));
        assert_eq!(get("height"), Some("768"));
        assert_eq!(get("format"), Some("application/openlayers"));
        assert_eq!(get("srs"), Some("EPSG:4326"));
    }

    #[test]
    fn preview_url_without_crs_omits_srs() {
        let root = Url::parse("https://geo.example.org/geoserver").unwrap();
        let bbox = BoundingBox {
            minx: 0.0,
            miny: 0.0,
            maxx: 1.0,
            maxy: 1.0,
            crs: None,
        };
        let url = preview_url(&root, &ws(), "dem", &bbox);
        assert!(!url.query_pairs().any(|(k, _)| k == "srs"));
    }
}
