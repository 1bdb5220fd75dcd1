//! Typed client for the GeoServer REST API.
//!
//! All paths are relative to the configured REST base
//! (e.g. `https://host/geoserver/rest`). Requests use HTTP basic auth.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/workspaces.json` | List workspaces |
//! | POST   | `/workspaces` | Create workspace |
//! | DELETE | `/workspaces/{ws}?recurse=true` | Delete workspace |
//! | GET    | `/workspaces/{ws}/datastores.json` | List vector stores |
//! | GET    | `/workspaces/{ws}/coverages.json` | List coverages |
//! | PUT    | `/workspaces/{ws}/{store_type}/{name}/external.{file_type}` | Register staged file |
//! | GET/PUT | `/workspaces/{ws}/{store_type}/{name}/{layer_group}/{file_name}.json` | Resource description |
//! | DELETE | `/workspaces/{ws}/{store_type}/{name}?recurse=true` | Delete store |
//! | POST   | `/workspaces/{ws}/styles` | Create SLD style |
//! | PUT    | `/workspaces/{ws}/styles/{name}` | Replace SLD style |
//! | PUT    | `/layers/{ws}:{name}` | Bind default style |

use reqwest::StatusCode;
use serde_json::Value;
use url::Url;
use zeroize::Zeroizing;

use geosync_core::{StoreType, WorkspaceId};

use crate::error::ClientError;
use crate::http::{api_error, decode_json, ensure_success, join_segments, parent_url};
use crate::retry::retry_send;

const SLD_CONTENT_TYPE: &str = "application/vnd.ogc.sld+xml";

/// Query parameters for cascading deletes.
const RECURSE_DELETE: [(&str, &str); 2] = [("recurse", "true"), ("update", "overwrite")];

/// Client for the GeoServer REST API.
#[derive(Clone)]
pub struct GeoServerClient {
    http: reqwest::Client,
    base_url: Option<Url>,
    username: String,
    password: Zeroizing<String>,
}

impl std::fmt::Debug for GeoServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoServerClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl GeoServerClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: Option<Url>,
        username: String,
        password: Zeroizing<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
        }
    }

    /// Whether a REST base URL is configured.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// GeoServer web root (the REST base without its last segment), used
    /// for OGC service URLs such as `{root}/{ws}/wms`.
    pub fn service_root(&self) -> Result<Url, ClientError> {
        self.base().map(parent_url)
    }

    fn base(&self) -> Result<&Url, ClientError> {
        self.base_url.as_ref().ok_or(ClientError::NotConfigured)
    }

    fn url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
        endpoint: &str,
    ) -> Result<Url, ClientError> {
        join_segments(self.base()?, segments, endpoint)
    }

    async fn send(
        &self,
        endpoint: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        retry_send(endpoint, || {
            build()
                .basic_auth(&self.username, Some(self.password.as_str()))
                .send()
        })
        .await
        .map_err(|e| ClientError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    // -- Workspaces -----------------------------------------------------------

    /// List workspace names.
    ///
    /// Calls `GET /workspaces.json`. An empty server answers
    /// `{"workspaces": ""}`.
    pub async fn list_workspaces(&self) -> Result<Vec<String>, ClientError> {
        let endpoint = "GET /workspaces.json";
        let url = self.url(["workspaces.json"], endpoint)?;
        let resp = self.send(endpoint, || self.http.get(url.clone())).await?;
        let resp = ensure_success(resp, endpoint).await?;
        let body: Value = decode_json(resp, endpoint).await?;
        named_items(&body, "workspaces", "workspace", endpoint)
    }

    /// Create an empty workspace.
    ///
    /// Calls `POST /workspaces` with `{"workspace": {"name": ws}}`.
    pub async fn create_workspace(&self, ws: &WorkspaceId) -> Result<(), ClientError> {
        let endpoint = format!("POST /workspaces ({ws})");
        let url = self.url(["workspaces"], &endpoint)?;
        let body = serde_json::json!({ "workspace": { "name": ws.as_str() } });
        let resp = self
            .send(&endpoint, || self.http.post(url.clone()).json(&body))
            .await?;
        ensure_success(resp, &endpoint).await?;
        Ok(())
    }

    /// Delete a workspace and everything in it.
    ///
    /// Calls `DELETE /workspaces/{ws}?recurse=true&update=overwrite`.
    /// Returns `false` when the workspace did not exist.
    pub async fn delete_workspace(&self, ws: &WorkspaceId) -> Result<bool, ClientError> {
        let endpoint = format!("DELETE /workspaces/{ws}");
        let url = self.url(["workspaces", ws.as_str()], &endpoint)?;
        let resp = self
            .send(&endpoint, || {
                self.http.delete(url.clone()).query(&RECURSE_DELETE)
            })
            .await?;
        deleted(resp, &endpoint).await
    }

    // -- Catalog listings -----------------------------------------------------

    /// List the vector stores of a workspace.
    ///
    /// Calls `GET /workspaces/{ws}/datastores.json`.
    pub async fn list_datastores(&self, ws: &WorkspaceId) -> Result<Vec<String>, ClientError> {
        let endpoint = format!("GET /workspaces/{ws}/datastores.json");
        let url = self.url(["workspaces", ws.as_str(), "datastores.json"], &endpoint)?;
        let resp = self.send(&endpoint, || self.http.get(url.clone())).await?;
        let resp = ensure_success(resp, &endpoint).await?;
        let body: Value = decode_json(resp, &endpoint).await?;
        named_items(&body, "dataStores", "dataStore", &endpoint)
    }

    /// List the coverages of a workspace.
    ///
    /// Calls `GET /workspaces/{ws}/coverages.json`.
    pub async fn list_coverages(&self, ws: &WorkspaceId) -> Result<Vec<String>, ClientError> {
        let endpoint = format!("GET /workspaces/{ws}/coverages.json");
        let url = self.url(["workspaces", ws.as_str(), "coverages.json"], &endpoint)?;
        let resp = self.send(&endpoint, || self.http.get(url.clone())).await?;
        let resp = ensure_success(resp, &endpoint).await?;
        let body: Value = decode_json(resp, &endpoint).await?;
        named_items(&body, "coverages", "coverage", &endpoint)
    }

    // -- Stores ---------------------------------------------------------------

    /// Register a file already on GeoServer's storage as a new store.
    ///
    /// Calls `PUT /workspaces/{ws}/{store_type}/{name}/external.{file_type}`
    /// with the `file://` URI as a plain-text body. Only `201 Created`
    /// counts as success.
    pub async fn register_external(
        &self,
        ws: &WorkspaceId,
        store_type: StoreType,
        name: &str,
        file_type: &str,
        file_uri: &str,
    ) -> Result<(), ClientError> {
        let endpoint = format!("PUT /workspaces/{ws}/{store_type}/{name}/external.{file_type}");
        let external = format!("external.{file_type}");
        let url = self.url(
            ["workspaces", ws.as_str(), store_type.as_str(), name, external.as_str()],
            &endpoint,
        )?;
        let resp = self
            .send(&endpoint, || {
                self.http
                    .put(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "text/plain")
                    .body(file_uri.to_string())
            })
            .await?;
        if resp.status() != StatusCode::CREATED {
            return Err(api_error(resp, &endpoint).await);
        }
        Ok(())
    }

    /// Delete a store and its layers.
    ///
    /// Calls `DELETE /workspaces/{ws}/{store_type}/{name}?recurse=true&update=overwrite`.
    /// Returns `false` when the store did not exist.
    pub async fn delete_store(
        &self,
        ws: &WorkspaceId,
        store_type: StoreType,
        name: &str,
    ) -> Result<bool, ClientError> {
        let endpoint = format!("DELETE /workspaces/{ws}/{store_type}/{name}");
        let url = self.url(
            ["workspaces", ws.as_str(), store_type.as_str(), name],
            &endpoint,
        )?;
        let resp = self
            .send(&endpoint, || {
                self.http.delete(url.clone()).query(&RECURSE_DELETE)
            })
            .await?;
        deleted(resp, &endpoint).await
    }

    // -- Resource descriptions ------------------------------------------------

    /// Fetch the JSON description of a store's generated resource.
    ///
    /// Calls `GET /workspaces/{ws}/{store_type}/{store}/{layer_group}/{resource}.json`.
    pub async fn get_resource(
        &self,
        path: &ResourcePath<'_>,
    ) -> Result<Value, ClientError> {
        let endpoint = format!("GET {path}");
        let url = path.url(self, &endpoint)?;
        let resp = self.send(&endpoint, || self.http.get(url.clone())).await?;
        let resp = ensure_success(resp, &endpoint).await?;
        decode_json(resp, &endpoint).await
    }

    /// Write back a full resource description.
    ///
    /// Calls `PUT` on the same path as [`get_resource`](Self::get_resource).
    /// Only `200 OK` counts as success.
    pub async fn put_resource(
        &self,
        path: &ResourcePath<'_>,
        document: &Value,
    ) -> Result<(), ClientError> {
        let endpoint = format!("PUT {path}");
        let url = path.url(self, &endpoint)?;
        let resp = self
            .send(&endpoint, || self.http.put(url.clone()).json(document))
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(api_error(resp, &endpoint).await);
        }
        Ok(())
    }

    // -- Styles ---------------------------------------------------------------

    /// Create a workspace style from an SLD document, replacing an existing
    /// style of the same name.
    ///
    /// Calls `POST /workspaces/{ws}/styles?name={name}`; on `403`/`409`
    /// (style exists) falls back to `PUT /workspaces/{ws}/styles/{name}`.
    pub async fn upsert_style(
        &self,
        ws: &WorkspaceId,
        name: &str,
        sld: &str,
    ) -> Result<(), ClientError> {
        let endpoint = format!("POST /workspaces/{ws}/styles");
        let url = self.url(["workspaces", ws.as_str(), "styles"], &endpoint)?;
        let resp = self
            .send(&endpoint, || {
                self.http
                    .post(url.clone())
                    .query(&[("name", name)])
                    .header(reqwest::header::CONTENT_TYPE, SLD_CONTENT_TYPE)
                    .body(sld.to_string())
            })
            .await?;

        match resp.status() {
            StatusCode::CREATED => Ok(()),
            StatusCode::FORBIDDEN | StatusCode::CONFLICT => {
                tracing::debug!(workspace = %ws, style = name, "style exists; replacing");
                self.replace_style(ws, name, sld).await
            }
            _ => Err(api_error(resp, &endpoint).await),
        }
    }

    async fn replace_style(
        &self,
        ws: &WorkspaceId,
        name: &str,
        sld: &str,
    ) -> Result<(), ClientError> {
        let endpoint = format!("PUT /workspaces/{ws}/styles/{name}");
        let url = self.url(["workspaces", ws.as_str(), "styles", name], &endpoint)?;
        let resp = self
            .send(&endpoint, || {
                self.http
                    .put(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, SLD_CONTENT_TYPE)
                    .body(sld.to_string())
            })
            .await?;
        ensure_success(resp, &endpoint).await?;
        Ok(())
    }

    /// Make a workspace style the default style of a layer.
    ///
    /// Calls `PUT /layers/{ws}:{layer}`.
    pub async fn set_default_style(
        &self,
        ws: &WorkspaceId,
        layer: &str,
        style: &str,
    ) -> Result<(), ClientError> {
        let qualified = format!("{ws}:{layer}");
        let endpoint = format!("PUT /layers/{qualified}");
        let url = self.url(["layers", qualified.as_str()], &endpoint)?;
        let body = serde_json::json!({
            "layer": {
                "defaultStyle": { "name": style, "workspace": ws.as_str() }
            }
        });
        let resp = self
            .send(&endpoint, || self.http.put(url.clone()).json(&body))
            .await?;
        ensure_success(resp, &endpoint).await?;
        Ok(())
    }
}

/// Location of a generated resource description.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePath<'a> {
    pub workspace: &'a WorkspaceId,
    pub store_type: StoreType,
    pub store: &'a str,
    /// `coverages` or `featuretypes`.
    pub layer_group: &'a str,
    /// Resource name GeoServer derived from the file name.
    pub resource: &'a str,
}

impl ResourcePath<'_> {
    fn url(&self, client: &GeoServerClient, endpoint: &str) -> Result<Url, ClientError> {
        let file = format!("{}.json", self.resource);
        client.url(
            [
                "workspaces",
                self.workspace.as_str(),
                self.store_type.as_str(),
                self.store,
                self.layer_group,
                file.as_str(),
            ],
            endpoint,
        )
    }
}

impl std::fmt::Display for ResourcePath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/workspaces/{}/{}/{}/{}/{}.json",
            self.workspace, self.store_type, self.store, self.layer_group, self.resource
        )
    }
}

/// Interpret a DELETE response: 2xx means deleted, 404 means absent.
async fn deleted(resp: reqwest::Response, endpoint: &str) -> Result<bool, ClientError> {
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    ensure_success(resp, endpoint).await?;
    Ok(true)
}

/// Extract `name`s from GeoServer's list envelope:
/// `{"<outer>": {"<inner>": [{"name": ...}, ...]}}`.
///
/// An empty list is sent as `{"<outer>": ""}`; a single item is sometimes
/// sent as an object instead of a one-element array.
pub(crate) fn named_items(
    body: &Value,
    outer: &str,
    inner: &str,
    endpoint: &str,
) -> Result<Vec<String>, ClientError> {
    let bad = |reason: String| ClientError::Decode {
        endpoint: endpoint.to_string(),
        reason,
    };

    let container = match body.get(outer) {
        None | Some(Value::Null) => return Err(bad(format!("missing `{outer}`"))),
        Some(Value::String(s)) if s.is_empty() => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(bad(format!("`{outer}` has unexpected shape: {other}"))),
    };

    let items: Vec<&Value> = match container.get(inner) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        Some(other) => return Err(bad(format!("`{outer}.{inner}` has unexpected shape: {other}"))),
    };

    items
        .into_iter()
        .map(|item| {
            item.get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| bad(format!("`{inner}` entry without a name: {item}")))
        })
        .collect()
}
