//! Integration tests for ReferenceDataNode
//!
//! Runs the node against a local axum server standing in for the hospital
//! backend, with the cache in a temp directory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tempfile::TempDir;

use his_node::{DictionaryLocation, NodeConfig, NodeError, ReferenceDataNode};
use his_selectors::{FieldError, MatcherConfig};
use his_sync::SeedOutcome;

#[derive(Clone, Default)]
struct Backend {
    region_calls: Arc<AtomicUsize>,
}

async fn regions(
    State(backend): State<Backend>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.region_calls.fetch_add(1, Ordering::SeqCst);
    match params.get("parentCode").map(String::as_str) {
        None => Json(json!([
            {"code": "110000", "name": "北京市"},
            {"code": "130000", "name": "河北省"},
            {"code": "410000", "name": "河南省"}
        ])),
        Some("110000") => Json(json!([{"code": "110100", "name": "市辖区"}])),
        Some("110100") => Json(json!([
            {"code": "110101", "name": "东城区"},
            {"code": "110102", "name": "西城区"}
        ])),
        Some(_) => Json(json!([])),
    }
}

async fn ethnic() -> Json<Value> {
    Json(json!([
        {"code": "01", "name": "汉族", "name_py": "hanzu", "name_py_first": "hz"},
        {"code": "02", "name": "蒙古族", "name_py": "mengguzu", "name_py_first": "mgz"}
    ]))
}

async fn country() -> Json<Value> {
    Json(json!([
        {"code": "CHN", "name_cn": "中国", "name_en": "China", "name_py_first": "zg"}
    ]))
}

async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/region", get(regions))
        .route("/assets/dicts/ethnic.json", get(ethnic))
        .route("/assets/dicts/country_full_cn.json", get(country))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn node_config(temp: &TempDir, addr: SocketAddr) -> NodeConfig {
    NodeConfig::with_data_dir(temp.path())
        .with_regions_endpoint(format!("http://{addr}/api/region"))
        .with_dictionaries(DictionaryLocation::Http {
            ethnicity_url: format!("http://{addr}/assets/dicts/ethnic.json"),
            nationality_url: format!("http://{addr}/assets/dicts/country_full_cn.json"),
        })
}

#[tokio::test]
async fn test_node_lifecycle() {
    let (addr, _backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();

    assert!(!node.is_started());
    assert_eq!(node.start().await.unwrap(), SeedOutcome::Seeded(3));
    assert!(node.is_started());
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let (addr, backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();

    {
        let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();
        node.start().await.unwrap();
        node.coordinator().load_children("110000").await.unwrap();
    }
    let calls_before = backend.region_calls.load(Ordering::SeqCst);

    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();
    assert_eq!(node.start().await.unwrap(), SeedOutcome::AlreadySeeded);
    assert_eq!(node.coordinator().load_children("110000").await.unwrap().len(), 1);

    assert_eq!(backend.region_calls.load(Ordering::SeqCst), calls_before);
    assert_eq!(node.stats().await.unwrap().cached_nodes, 4);
}

#[tokio::test]
async fn test_region_selector_walks_the_tree() {
    let (addr, _backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();

    let selector = node.region_selector(true, true).await.unwrap();
    assert_eq!(selector.validate(), Some(FieldError::Required));

    selector.select(0, "110000").await.unwrap();
    selector.select(1, "110100").await.unwrap();
    selector.select(2, "110102").await.unwrap();
    selector.set_text("address", " 西长安街 ").unwrap();

    let value = selector.value();
    assert_eq!(value.level("county"), Some("110102"));
    assert_eq!(value.text_field("address"), Some("西长安街"));
    assert_eq!(selector.validate(), None);
}

#[tokio::test]
async fn test_two_selectors_share_the_cache() {
    let (addr, backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();

    let home = node.region_selector(true, false).await.unwrap();
    let birthplace = node.region_selector(false, false).await.unwrap();
    home.select(0, "110000").await.unwrap();
    let calls = backend.region_calls.load(Ordering::SeqCst);

    birthplace.select(0, "110000").await.unwrap();
    assert_eq!(backend.region_calls.load(Ordering::SeqCst), calls);
    assert_eq!(birthplace.candidates(1).unwrap().nodes().len(), 1);
}

#[tokio::test]
async fn test_search_after_seed() {
    let (addr, _backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();
    node.start().await.unwrap();

    let hits = node.search("河", None).await.unwrap();
    let codes: Vec<_> = hits.iter().map(|n| n.code.as_str()).collect();
    assert_eq!(codes, vec!["130000", "410000"]);
}

#[tokio::test]
async fn test_lookup_fields_over_http_dictionaries() {
    let (addr, _backend) = spawn_backend().await;
    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();

    let ethnicity = node.lookup_field(MatcherConfig::ethnicity());
    ethnicity.input("汉族");
    ethnicity.blur().await;
    assert_eq!(ethnicity.value().as_deref(), Some("01"));

    let nationality = node.lookup_field(MatcherConfig::nationality());
    nationality.input("chi");
    assert_eq!(nationality.suggestions().await[0].code, "CHN");
    nationality.blur().await;
    assert_eq!(nationality.validate(), Some(FieldError::InvalidOption));
}

#[tokio::test]
async fn test_unreachable_backend_leaves_cache_empty() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let temp = TempDir::new().unwrap();
    let node = ReferenceDataNode::open(node_config(&temp, addr)).unwrap();

    assert_eq!(node.start().await.unwrap(), SeedOutcome::Skipped);
    assert_eq!(node.stats().await.unwrap().cached_nodes, 0);
    assert_eq!(node.stats().await.unwrap().sync.remote_failures, 1);
}
