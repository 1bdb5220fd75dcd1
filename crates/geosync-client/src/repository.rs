//! Typed client for the content repository (HydroShare REST API).
//!
//! ## Paths
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `{api}/resource/{id}/file_list/` | File manifest (paginated via `next`) |
//! | GET | `{root}/resource/{source_path}` | File content |
//! | GET | `{root}/discoverapi/?filter={json}&pnum={n}` | Public resource search |
//!
//! `{api}` is the configured repository URL (e.g. `https://host/hsapi`) and
//! `{root}` is its parent (`https://host/`).

use serde::Deserialize;
use url::Url;

use geosync_core::{ResourceFile, ResourceId};

use crate::error::ClientError;
use crate::http::{api_error, decode_json, ensure_success, join_segments, parent_url};
use crate::retry::retry_send;

/// Statuses that mean "this resource is not publicly readable".
const PRIVATE_STATUSES: [u16; 4] = [401, 403, 404, 410];

/// Upper bound on followed `next` links, guarding against a server that
/// paginates in a loop.
const MAX_MANIFEST_PAGES: usize = 1000;

/// Resource types the discovery search is restricted to.
const GEO_RESOURCE_TYPES: [&str; 2] = ["Geographic Feature (ESRI Shapefiles)", "Geographic Raster"];

/// Result of a manifest fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    /// The resource is readable; its complete file list.
    Public(Vec<ResourceFile>),
    /// The repository refused or could not find the resource.
    Private { status: u16 },
}

#[derive(Debug, Deserialize)]
struct FileListPage {
    #[serde(default)]
    results: Vec<ResourceFile>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryPage {
    #[serde(default)]
    pagecount: u32,
    #[serde(default)]
    rescount: u32,
    /// Either a JSON array or a string containing one.
    #[serde(default)]
    resources: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DiscoveredResource {
    #[serde(default)]
    short_id: Option<String>,
}

/// Client for the repository REST API.
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    http: reqwest::Client,
    api_url: Url,
    root_url: Url,
}

impl RepositoryClient {
    pub(crate) fn new(http: reqwest::Client, api_url: Url) -> Self {
        let root_url = parent_url(&api_url);
        Self {
            http,
            api_url,
            root_url,
        }
    }

    /// Fetch the complete file manifest of a resource.
    ///
    /// Calls `GET {api}/resource/{id}/file_list/` and follows `next` links.
    /// 401/403/404/410 on the first page yields [`Manifest::Private`]; any
    /// other non-2xx status is an error.
    pub async fn file_list(&self, id: &ResourceId) -> Result<Manifest, ClientError> {
        let endpoint = format!("GET /resource/{id}/file_list/");
        let mut url = join_segments(
            &self.api_url,
            ["resource", id.as_str(), "file_list", ""],
            &endpoint,
        )?;

        let mut files = Vec::new();
        for page in 0..MAX_MANIFEST_PAGES {
            let resp = retry_send(&endpoint, || self.http.get(url.clone()).send())
                .await
                .map_err(|e| ClientError::Http {
                    endpoint: endpoint.clone(),
                    source: e,
                })?;

            let status = resp.status().as_u16();
            if page == 0 && PRIVATE_STATUSES.contains(&status) {
                tracing::info!(resource_id = %id, status, "manifest not readable; resource is private");
                return Ok(Manifest::Private { status });
            }
            let resp = ensure_success(resp, &endpoint).await?;
            let body: FileListPage = decode_json(resp, &endpoint).await?;
            files.extend(body.results);

            match body.next.filter(|n| !n.is_empty()) {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| ClientError::Decode {
                        endpoint: endpoint.clone(),
                        reason: format!("invalid next link {next:?}: {e}"),
                    })?;
                }
                None => {
                    tracing::debug!(resource_id = %id, files = files.len(), pages = page + 1, "manifest fetched");
                    return Ok(Manifest::Public(files));
                }
            }
        }

        Err(ClientError::Decode {
            endpoint,
            reason: format!("manifest exceeded {MAX_MANIFEST_PAGES} pages"),
        })
    }

    /// URL of a file's content, from its `{id}/data/contents/...` path.
    pub fn file_url(&self, source_path: &str) -> Result<Url, ClientError> {
        join_segments(
            &self.root_url,
            std::iter::once("resource").chain(source_path.split('/')),
            "file url",
        )
    }

    /// Start downloading a file. The caller streams the body.
    ///
    /// Calls `GET {root}/resource/{source_path}`.
    pub async fn open_file(&self, source_path: &str) -> Result<reqwest::Response, ClientError> {
        let endpoint = format!("GET /resource/{source_path}");
        let url = self.file_url(source_path)?;
        let resp = retry_send(&endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        ensure_success(resp, &endpoint).await
    }

    /// Download a small text document (e.g. a `.vrt` statistics sidecar).
    pub async fn fetch_text(&self, source_path: &str) -> Result<String, ClientError> {
        let endpoint = format!("GET /resource/{source_path}");
        let resp = self.open_file(source_path).await?;
        resp.text().await.map_err(|e| ClientError::Http {
            endpoint,
            source: e,
        })
    }

    /// List the short ids of every public or published geospatial resource.
    ///
    /// Calls `GET {root}/discoverapi/?filter={json}` for the page count,
    /// then each page with `&pnum={n}`.
    pub async fn discover_public_geo_resources(&self) -> Result<Vec<ResourceId>, ClientError> {
        let endpoint = "GET /discoverapi/";
        let filter = serde_json::json!({
            "type": GEO_RESOURCE_TYPES,
            "availability": ["public", "published"],
            "geofilter": "false",
        })
        .to_string();
        let base = join_segments(&self.root_url, ["discoverapi", ""], endpoint)?;

        let first = self.discovery_page(&base, &filter, None).await?;
        tracing::info!(
            pages = first.pagecount,
            resources = first.rescount,
            "discovering public geospatial resources"
        );

        let mut ids = Vec::new();
        for pnum in 1..=first.pagecount {
            let page = self.discovery_page(&base, &filter, Some(pnum)).await?;
            for raw in parse_discovered(page.resources, endpoint)? {
                match ResourceId::new(raw) {
                    Ok(id) => ids.push(id),
                    Err(e) => tracing::warn!("skipping discovered resource: {e}"),
                }
            }
        }

        if ids.len() != first.rescount as usize {
            tracing::warn!(
                found = ids.len(),
                expected = first.rescount,
                "discovery returned a different number of resources than reported"
            );
        }
        Ok(ids)
    }

    async fn discovery_page(
        &self,
        base: &Url,
        filter: &str,
        pnum: Option<u32>,
    ) -> Result<DiscoveryPage, ClientError> {
        let endpoint = "GET /discoverapi/";
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("filter", filter);
            if let Some(n) = pnum {
                query.append_pair("pnum", &n.to_string());
            }
        }

        let resp = retry_send(endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        if !resp.status().is_success() {
            return Err(api_error(resp, endpoint).await);
        }
        decode_json(resp, endpoint).await
    }
}

/// Extract `short_id`s from a discovery page's `resources` field, which the
/// repository sends either as an array or as a JSON-encoded string.
fn parse_discovered(
    resources: Option<serde_json::Value>,
    endpoint: &str,
) -> Result<Vec<String>, ClientError> {
    let decode_err = |reason: String| ClientError::Decode {
        endpoint: endpoint.to_string(),
        reason,
    };
    let list: Vec<DiscoveredResource> = match resources {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::String(s)) => {
            serde_json::from_str(&s).map_err(|e| decode_err(e.to_string()))?
        }
        Some(other) => serde_json::from_value(other).map_err(|e| decode_err(e.to_string()))?,
    };
    Ok(list.into_iter().filter_map(|r| r.short_id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_discovered_accepts_encoded_string() {
        let value = serde_json::Value::String(r#"[{"short_id":"abc"},{"title":"x"}]"#.into());
        assert_eq!(parse_discovered(Some(value), "t").unwrap(), vec!["abc"]);
    }

    #[test]
    fn parse_discovered_accepts_array() {
        let value = serde_json::json!([{"short_id": "a"}, {"short_id": "b"}]);
        assert_eq!(parse_discovered(Some(value), "t").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn parse_discovered_missing_is_empty() {
        assert!(parse_discovered(None, "t").unwrap().is_empty());
    }

    #[test]
    fn parse_discovered_rejects_garbage() {
        let value = serde_json::Value::String("not json".into());
        assert!(matches!(
            parse_discovered(Some(value), "t"),
            Err(ClientError::Decode { .. })
        ));
    }

    #[test]
    fn file_url_uses_repository_root() {
        let client = RepositoryClient::new(
            reqwest::Client::new(),
            Url::parse("http://hs.local/hsapi").unwrap(),
        );
        let url = client.file_url("abc/data/contents/dir/a b.tif").unwrap();
        assert_eq!(
            url.as_str(),
            "http://hs.local/resource/abc/data/contents/dir/a%20b.tif"
        );
    }
}
