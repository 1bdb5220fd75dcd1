//! Stateful fakes of the repository and GeoServer, mounted on wiremock
//! servers, and a harness that wires a `Reconciler` to them.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use geosync_client::GeoSyncConfig;
use geosync_core::ResourceId;
use geosync_engine::Reconciler;

const REST_PREFIX: &str = "/geoserver/rest";

fn decoded_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string()))
        .collect()
}

// ── Fake repository ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RepoFile {
    pub rel: String,
    pub logical_file_type: String,
    pub content_type: String,
    /// `None` lists the file but serves 404 for its content.
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct RepoResource {
    private: bool,
    files: Vec<RepoFile>,
}

#[derive(Debug, Default)]
struct RepoState {
    base: String,
    resources: BTreeMap<String, RepoResource>,
}

/// In-memory repository serving `file_list` and file content.
#[derive(Clone, Default)]
pub struct FakeRepository {
    state: Arc<Mutex<RepoState>>,
}

impl FakeRepository {
    fn file_url(base: &str, id: &str, rel: &str) -> String {
        let encoded: Vec<String> = rel
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{base}/resource/{id}/data/contents/{}", encoded.join("/"))
    }

    pub fn add(&self, id: &str, file: RepoFile) {
        let mut state = self.state.lock();
        let resource = state.resources.entry(id.to_string()).or_default();
        resource.files.retain(|f| f.rel != file.rel);
        resource.files.push(file);
    }

    pub fn add_raster(&self, id: &str, rel: &str, bytes: &[u8]) {
        self.add(
            id,
            RepoFile {
                rel: rel.into(),
                logical_file_type: "GeoRasterLogicalFile".into(),
                content_type: "image/tiff".into(),
                bytes: Some(bytes.to_vec()),
            },
        );
    }

    pub fn add_statistics(&self, id: &str, rel: &str, min: &str, max: &str, ndv: &str) {
        let xml = format!(
            r#"<VRTDataset rasterXSize="4" rasterYSize="4">
  <VRTRasterBand dataType="Float32" band="1">
    <Metadata>
      <MDI key="STATISTICS_MAXIMUM">{max}</MDI>
      <MDI key="STATISTICS_MINIMUM">{min}</MDI>
    </Metadata>
    <NoDataValue>{ndv}</NoDataValue>
  </VRTRasterBand>
</VRTDataset>"#
        );
        self.add(
            id,
            RepoFile {
                rel: rel.into(),
                logical_file_type: "GeoRasterLogicalFile".into(),
                content_type: "application/xml".into(),
                bytes: Some(xml.into_bytes()),
            },
        );
    }

    /// A shapefile and the given sidecar extensions.
    pub fn add_shapefile(&self, id: &str, stem: &str, sidecars: &[&str]) {
        self.add(
            id,
            RepoFile {
                rel: format!("{stem}.shp"),
                logical_file_type: "GeoFeatureLogicalFile".into(),
                content_type: "application/x-qgis".into(),
                bytes: Some(b"shp".to_vec()),
            },
        );
        for ext in sidecars {
            self.add(
                id,
                RepoFile {
                    rel: format!("{stem}.{ext}"),
                    logical_file_type: "GeoFeatureLogicalFile".into(),
                    content_type: "application/octet-stream".into(),
                    bytes: Some(ext.as_bytes().to_vec()),
                },
            );
        }
    }

    /// Remove every file whose path starts with `prefix`.
    pub fn remove(&self, id: &str, prefix: &str) {
        if let Some(r) = self.state.lock().resources.get_mut(id) {
            r.files.retain(|f| !f.rel.starts_with(prefix));
        }
    }

    pub fn set_private(&self, id: &str, private: bool) {
        self.state
            .lock()
            .resources
            .entry(id.to_string())
            .or_default()
            .private = private;
    }
}

impl Respond for FakeRepository {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if request.method.as_str() != "GET" {
            return ResponseTemplate::new(405);
        }
        let state = self.state.lock();
        let segments = decoded_segments(request.url.path());
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

        match segs.as_slice() {
            ["hsapi", "resource", id, "file_list"] => match state.resources.get(*id) {
                None => ResponseTemplate::new(404),
                Some(r) if r.private => ResponseTemplate::new(403),
                Some(r) => {
                    let results: Vec<Value> = r
                        .files
                        .iter()
                        .map(|f| {
                            json!({
                                "url": Self::file_url(&state.base, id, &f.rel),
                                "logical_file_type": f.logical_file_type,
                                "content_type": f.content_type,
                                "file_name": f.rel.rsplit('/').next().unwrap_or(&f.rel),
                                "size": f.bytes.as_ref().map(Vec::len).unwrap_or(0),
                            })
                        })
                        .collect();
                    ResponseTemplate::new(200).set_body_json(json!({
                        "count": results.len(),
                        "next": null,
                        "results": results,
                    }))
                }
            },
            ["resource", id, "data", "contents", rest @ ..] => {
                let rel = rest.join("/");
                let file = state
                    .resources
                    .get(*id)
                    .filter(|r| !r.private)
                    .and_then(|r| r.files.iter().find(|f| f.rel == rel))
                    .and_then(|f| f.bytes.clone());
                match file {
                    Some(bytes) => ResponseTemplate::new(200).set_body_bytes(bytes),
                    None => ResponseTemplate::new(404),
                }
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

// ── Fake GeoServer ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Store {
    pub file_uri: String,
    pub resource_name: String,
    pub enabled: bool,
}

#[derive(Debug, Default, Clone)]
pub struct FakeWorkspace {
    /// Keyed by (store type, store name).
    pub stores: BTreeMap<(String, String), Store>,
    pub styles: BTreeMap<String, String>,
    pub default_styles: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct GsState {
    pub workspaces: BTreeMap<String, FakeWorkspace>,
    /// `METHOD /path` of every request, REST prefix stripped.
    pub calls: Vec<String>,
    /// Store names whose registration answers 500.
    pub fail_register: BTreeSet<String>,
    /// Store names whose generated resource is disabled.
    pub disabled: BTreeSet<String>,
    /// Answer coverage listings with an uninterpretable body.
    pub garbage_listing: bool,
    /// Store names whose DELETE answers 500.
    pub fail_delete: BTreeSet<String>,
    /// Store names whose resource rewrite answers 500.
    pub fail_rename: BTreeSet<String>,
}

/// In-memory GeoServer REST API.
#[derive(Clone, Default)]
pub struct FakeGeoServer {
    pub state: Arc<Mutex<GsState>>,
}

fn resource_key(store_type: &str) -> &'static str {
    if store_type == "coveragestores" {
        "coverage"
    } else {
        "featureType"
    }
}

fn name_list(outer: &str, inner: &str, names: Vec<String>) -> Value {
    if names.is_empty() {
        return json!({ outer: "" });
    }
    let items: Vec<Value> = names.into_iter().map(|n| json!({ "name": n })).collect();
    json!({ outer: { inner: items } })
}

impl FakeGeoServer {
    pub fn workspace(&self, name: &str) -> Option<FakeWorkspace> {
        self.state.lock().workspaces.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn store_names(&self, ws: &str) -> Vec<String> {
        self.workspace(ws)
            .map(|w| w.stores.keys().map(|(_, n)| n.clone()).collect())
            .unwrap_or_default()
    }
}

impl Respond for FakeGeoServer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.as_str().to_string();
        let Some(path) = request.url.path().strip_prefix(REST_PREFIX) else {
            return ResponseTemplate::new(404);
        };
        let mut state = self.state.lock();
        state.calls.push(format!("{method} {}", decoded_segments(path).join("/")));

        let segments = decoded_segments(path);
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let query = |key: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };
        let body_json = || serde_json::from_slice::<Value>(&request.body).unwrap_or(Value::Null);
        let body_text = || String::from_utf8_lossy(&request.body).into_owned();

        match (method.as_str(), segs.as_slice()) {
            ("GET", ["workspaces.json"]) => {
                let names = state.workspaces.keys().cloned().collect();
                ResponseTemplate::new(200).set_body_json(name_list("workspaces", "workspace", names))
            }
            ("POST", ["workspaces"]) => {
                let Some(name) = body_json()["workspace"]["name"].as_str().map(str::to_string) else {
                    return ResponseTemplate::new(400);
                };
                if state.workspaces.contains_key(&name) {
                    return ResponseTemplate::new(409);
                }
                state.workspaces.insert(name, FakeWorkspace::default());
                ResponseTemplate::new(201)
            }
            ("DELETE", ["workspaces", ws]) => {
                if query("recurse").as_deref() != Some("true") {
                    return ResponseTemplate::new(403);
                }
                match state.workspaces.remove(*ws) {
                    Some(_) => ResponseTemplate::new(200),
                    None => ResponseTemplate::new(404),
                }
            }
            ("GET", ["workspaces", ws, "datastores.json"]) => match state.workspaces.get(*ws) {
                None => ResponseTemplate::new(404).set_body_string("No such workspace"),
                Some(w) => {
                    let names = w
                        .stores
                        .iter()
                        .filter(|((t, _), _)| t == "datastores")
                        .map(|((_, n), _)| n.clone())
                        .collect();
                    ResponseTemplate::new(200).set_body_json(name_list("dataStores", "dataStore", names))
                }
            },
            ("GET", ["workspaces", ws, "coverages.json"]) => {
                if state.garbage_listing {
                    return ResponseTemplate::new(200).set_body_json(json!({ "coverages": 5 }));
                }
                match state.workspaces.get(*ws) {
                    None => ResponseTemplate::new(404).set_body_string("No such workspace"),
                    Some(w) => {
                        let names = w
                            .stores
                            .iter()
                            .filter(|((t, _), _)| t == "coveragestores")
                            .map(|(_, s)| s.resource_name.clone())
                            .collect();
                        ResponseTemplate::new(200).set_body_json(name_list("coverages", "coverage", names))
                    }
                }
            }
            ("PUT", ["workspaces", ws, store_type, store, external]) if external.starts_with("external.") => {
                let fail = state.fail_register.contains(*store);
                let enabled = !state.disabled.contains(*store);
                let Some(w) = state.workspaces.get_mut(*ws) else {
                    return ResponseTemplate::new(404).set_body_string("No such workspace");
                };
                if fail {
                    return ResponseTemplate::new(500).set_body_string("registration failed");
                }
                let file_uri = body_text();
                let file = file_uri.rsplit('/').next().unwrap_or_default();
                let resource_name = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file).to_string();
                w.stores.insert(
                    (store_type.to_string(), store.to_string()),
                    Store {
                        file_uri,
                        resource_name,
                        enabled,
                    },
                );
                ResponseTemplate::new(201)
            }
            ("GET", ["workspaces", ws, store_type, store, _group, resource]) => {
                let Some(s) = state
                    .workspaces
                    .get(*ws)
                    .and_then(|w| w.stores.get(&(store_type.to_string(), store.to_string())))
                else {
                    return ResponseTemplate::new(404);
                };
                if resource.strip_suffix(".json") != Some(s.resource_name.as_str()) {
                    return ResponseTemplate::new(404);
                }
                let key = resource_key(store_type);
                ResponseTemplate::new(200).set_body_json(json!({
                    key: {
                        "name": s.resource_name,
                        "nativeName": s.resource_name,
                        "title": s.resource_name,
                        "enabled": s.enabled,
                        "nativeBoundingBox": {
                            "minx": -112.0, "maxx": -111.0,
                            "miny": 40.0, "maxy": 41.5,
                            "crs": "EPSG:4326"
                        }
                    }
                }))
            }
            ("PUT", ["workspaces", ws, store_type, store, _group, _resource]) => {
                if state.fail_rename.contains(*store) {
                    return ResponseTemplate::new(500).set_body_string("rename failed");
                }
                let key = resource_key(store_type);
                let doc = body_json();
                let Some(new_name) = doc[key]["name"].as_str().map(str::to_string) else {
                    return ResponseTemplate::new(400);
                };
                // The rest of the document must survive the rewrite.
                if doc[key]["nativeName"].is_null() {
                    return ResponseTemplate::new(400);
                }
                match state
                    .workspaces
                    .get_mut(*ws)
                    .and_then(|w| w.stores.get_mut(&(store_type.to_string(), store.to_string())))
                {
                    Some(s) => {
                        s.resource_name = new_name;
                        ResponseTemplate::new(200)
                    }
                    None => ResponseTemplate::new(404),
                }
            }
            ("DELETE", ["workspaces", ws, store_type, store]) => {
                if state.fail_delete.contains(*store) {
                    return ResponseTemplate::new(500).set_body_string("delete failed");
                }
                let removed = state
                    .workspaces
                    .get_mut(*ws)
                    .and_then(|w| w.stores.remove(&(store_type.to_string(), store.to_string())));
                match removed {
                    Some(_) => ResponseTemplate::new(200),
                    None => ResponseTemplate::new(404),
                }
            }
            ("POST", ["workspaces", ws, "styles"]) => {
                let name = query("name").unwrap_or_default();
                let sld = body_text();
                let Some(w) = state.workspaces.get_mut(*ws) else {
                    return ResponseTemplate::new(404);
                };
                if w.styles.contains_key(&name) {
                    return ResponseTemplate::new(403);
                }
                w.styles.insert(name, sld);
                ResponseTemplate::new(201)
            }
            ("PUT", ["workspaces", ws, "styles", name]) => {
                let sld = body_text();
                match state.workspaces.get_mut(*ws) {
                    Some(w) => {
                        w.styles.insert(name.to_string(), sld);
                        ResponseTemplate::new(200)
                    }
                    None => ResponseTemplate::new(404),
                }
            }
            ("PUT", ["layers", qualified]) => {
                let Some((ws, layer)) = qualified.split_once(':') else {
                    return ResponseTemplate::new(400);
                };
                let style = body_json()["layer"]["defaultStyle"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                match state.workspaces.get_mut(ws) {
                    Some(w) if w.styles.contains_key(&style) => {
                        w.default_styles.insert(layer.to_string(), style);
                        ResponseTemplate::new(200)
                    }
                    _ => ResponseTemplate::new(404),
                }
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub repo: FakeRepository,
    pub geoserver: FakeGeoServer,
    pub storage: TempDir,
    pub config: GeoSyncConfig,
    pub reconciler: Reconciler,
    pub repo_server: MockServer,
    pub gs_server: MockServer,
}

impl Harness {
    pub async fn start() -> Self {
        let repo_server = MockServer::start().await;
        let gs_server = MockServer::start().await;

        let repo = FakeRepository::default();
        repo.state.lock().base = repo_server.uri();
        Mock::given(any())
            .respond_with(repo.clone())
            .mount(&repo_server)
            .await;

        let geoserver = FakeGeoServer::default();
        Mock::given(any())
            .respond_with(geoserver.clone())
            .mount(&gs_server)
            .await;

        let storage = tempfile::tempdir().unwrap();
        let config = GeoSyncConfig::local_mock(
            &format!("{}/hsapi", repo_server.uri()),
            &format!("{}{REST_PREFIX}", gs_server.uri()),
            storage.path(),
        )
        .unwrap();
        let reconciler = Reconciler::new(&config).unwrap();

        Self {
            repo,
            geoserver,
            storage,
            config,
            reconciler,
            repo_server,
            gs_server,
        }
    }

    pub fn staged(&self, source_path: &str) -> PathBuf {
        self.storage.path().join(source_path)
    }

    pub fn gs_root(&self) -> String {
        format!("{}/geoserver", self.gs_server.uri())
    }
}

pub fn rid(s: &str) -> ResourceId {
    s.parse().unwrap()
}
