//! Subcommand handlers run against wiremock servers.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geosync_cli::audit::{run_missing_layers, run_missing_workspaces, MissingLayersArgs, MissingWorkspacesArgs};
use geosync_cli::resolve_ids;
use geosync_cli::unregister::{run_unregister, UnregisterArgs};
use geosync_cli::update::{reconcile_all, render, run_update, UpdateArgs};
use geosync_client::GeoSyncConfig;
use geosync_core::ResourceId;
use geosync_engine::{Dispatcher, Reconciler};

struct Servers {
    repository: MockServer,
    geoserver: MockServer,
    storage: tempfile::TempDir,
}

impl Servers {
    async fn start() -> Self {
        Self {
            repository: MockServer::start().await,
            geoserver: MockServer::start().await,
            storage: tempfile::tempdir().unwrap(),
        }
    }

    fn reconciler(&self) -> Reconciler {
        let config = GeoSyncConfig::local_mock(
            &format!("{}/hsapi", self.repository.uri()),
            &format!("{}/geoserver/rest", self.geoserver.uri()),
            self.storage.path(),
        )
        .unwrap();
        Reconciler::new(&config).unwrap()
    }

    async fn manifest_status(&self, id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/hsapi/resource/{id}/file_list/")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.repository)
            .await;
    }

    async fn workspace_deletes_missing(&self) {
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.geoserver)
            .await;
    }
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn update_of_private_resources_exits_zero() {
    let s = Servers::start().await;
    s.manifest_status("abc", 404).await;
    s.manifest_status("def", 403).await;
    s.workspace_deletes_missing().await;

    let args = UpdateArgs {
        ids: ids(&["abc", "def"]),
        jobs: 2,
        json: false,
    };
    assert_eq!(run_update(&args, s.reconciler()).await.unwrap(), 0);
}

#[tokio::test]
async fn update_with_unreadable_manifest_exits_one() {
    let s = Servers::start().await;
    s.manifest_status("abc", 500).await;

    let args = UpdateArgs {
        ids: ids(&["abc"]),
        jobs: 1,
        json: true,
    };
    assert_eq!(run_update(&args, s.reconciler()).await.unwrap(), 1);
}

#[tokio::test]
async fn update_rejects_malformed_ids() {
    let s = Servers::start().await;
    let args = UpdateArgs {
        ids: ids(&["../etc"]),
        jobs: 1,
        json: false,
    };
    let err = run_update(&args, s.reconciler()).await.unwrap_err();
    assert!(err.to_string().contains("invalid resource id"));
}

#[tokio::test]
async fn outcomes_keep_input_order() {
    let s = Servers::start().await;
    for id in ["r1", "r2", "r3"] {
        s.manifest_status(id, 404).await;
    }
    s.workspace_deletes_missing().await;
    let dispatcher = Dispatcher::new(s.reconciler());
    let order: Vec<ResourceId> = ["r3", "r1", "r2"].iter().map(|s| s.parse().unwrap()).collect();

    let outcomes = reconcile_all(&dispatcher, order.clone(), 2).await.unwrap();

    let got: Vec<ResourceId> = outcomes.iter().map(|o| o.resource_id.clone()).collect();
    assert_eq!(got, order);
    let lines = render(&outcomes[0]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("r3: ok (private)"), "{}", lines[0]);
}

#[tokio::test]
async fn no_ids_falls_back_to_discovery() {
    let s = Servers::start().await;
    Mock::given(method("GET"))
        .and(path("/discoverapi/"))
        .and(query_param("pnum", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pagecount": 1,
            "rescount": 2,
            "resources": [{"short_id": "r1"}, {"short_id": "r2"}]
        })))
        .mount(&s.repository)
        .await;
    Mock::given(method("GET"))
        .and(path("/discoverapi/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pagecount": 1,
            "rescount": 2,
            "resources": []
        })))
        .mount(&s.repository)
        .await;

    let found = resolve_ids(&s.reconciler(), &[]).await.unwrap();
    assert_eq!(found, vec!["r1".parse::<ResourceId>().unwrap(), "r2".parse().unwrap()]);
}

#[tokio::test]
async fn unregister_reports_each_resource() {
    let s = Servers::start().await;
    s.workspace_deletes_missing().await;

    let args = UnregisterArgs { ids: ids(&["abc"]) };
    assert_eq!(run_unregister(&args, s.reconciler()).await.unwrap(), 0);
}

#[tokio::test]
async fn unregister_failure_exits_one() {
    let s = Servers::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&s.geoserver)
        .await;

    let args = UnregisterArgs { ids: ids(&["abc"]) };
    assert_eq!(run_unregister(&args, s.reconciler()).await.unwrap(), 1);
}

#[tokio::test]
async fn audits_of_private_resources_report_nothing() {
    let s = Servers::start().await;
    s.manifest_status("abc", 404).await;
    Mock::given(method("GET"))
        .and(path("/geoserver/rest/workspaces.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "workspaces": {"workspace": [{"name": "HS-other"}]}
        })))
        .mount(&s.geoserver)
        .await;
    let reconciler = s.reconciler();

    let layers = MissingLayersArgs { ids: ids(&["abc"]) };
    assert_eq!(run_missing_layers(&layers, &reconciler).await.unwrap(), 0);

    let workspaces = MissingWorkspacesArgs { ids: ids(&["abc"]) };
    assert_eq!(run_missing_workspaces(&workspaces, &reconciler).await.unwrap(), 0);
}
