//! HTTP source tests against a local axum server

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use his_core::{DictionaryKind, RegionSource, SourceError};
use his_storage::{InMemoryReferenceStore, ReferenceRepository};
use his_sync::{DictionaryCache, HttpDictionarySource, HttpRegionSource, SyncCoordinator};

async fn regions(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("parentCode").map(String::as_str) {
        None => Json(json!([
            {"code": "110000", "name": "北京市"},
            {"code": "310000", "name": "上海市", "level": "municipality"}
        ]))
        .into_response(),
        Some("110000") => Json(json!([
            {"code": " 110100 ", "name": "市辖区", "parentCode": "110000", "level": "city"}
        ]))
        .into_response(),
        Some("500000") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some(_) => Json(json!([])).into_response(),
    }
}

async fn ethnic() -> impl IntoResponse {
    Json(json!([
        {"code": "01", "name": "汉族", "name_py": "hanzu", "name_py_first": "hz"},
        {"code": "02", "name": "蒙古族", "name_py": "mengguzu", "name_py_first": "mgz"}
    ]))
}

async fn country() -> impl IntoResponse {
    Json(json!([
        {"code": "CHN", "name_cn": "中国", "name_en": "China", "name_py_first": "zg"},
        {"code": "FRA", "name_cn": "法国", "name_en": "France", "name_py_first": "fg"}
    ]))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/regions", get(regions))
        .route("/assets/ethnic.json", get(ethnic))
        .route("/assets/country.json", get(country))
        .route("/assets/broken.json", get(|| async { "not json" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_region_source_roots_and_children() {
    let addr = spawn_server().await;
    let source = HttpRegionSource::new(format!("http://{addr}/api/regions"));

    let roots = source.fetch_roots().await.unwrap();
    assert_eq!(roots.len(), 2);
    assert!(roots[0].parent_code.is_none());

    let children = source.fetch_children("110000").await.unwrap();
    assert_eq!(children[0].parent_code.as_deref(), Some("110000"));
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let addr = spawn_server().await;
    let source = HttpRegionSource::new(format!("http://{addr}/api/regions"));

    let err = source.fetch_children("500000").await.unwrap_err();
    assert_eq!(err, SourceError::Status(500));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpRegionSource::new(format!("http://{addr}/api/regions"));
    assert!(matches!(
        source.fetch_roots().await.unwrap_err(),
        SourceError::Http(_)
    ));
}

#[tokio::test]
async fn test_coordinator_over_http() {
    let addr = spawn_server().await;
    let source = Arc::new(HttpRegionSource::new(format!("http://{addr}/api/regions")));
    let repository = ReferenceRepository::new(Arc::new(InMemoryReferenceStore::new()));
    let coordinator = SyncCoordinator::new(repository, source);

    let roots = coordinator.load_roots().await.unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].level.as_deref(), Some("province"));

    let children = coordinator.load_children("110000").await.unwrap();
    assert_eq!(children[0].code, "110100");

    // Server error degrades to an empty list
    assert!(coordinator.load_children("500000").await.unwrap().is_empty());
    assert_eq!(coordinator.stats().remote_failures, 1);
}

#[tokio::test]
async fn test_dictionaries_over_http() {
    let addr = spawn_server().await;
    let source = HttpDictionarySource::new()
        .with_ethnicity_url(format!("http://{addr}/assets/ethnic.json"))
        .with_nationality_url(format!("http://{addr}/assets/country.json"));
    let cache = DictionaryCache::new(Arc::new(source));

    let ethnic = cache.get(DictionaryKind::Ethnicity).await;
    assert_eq!(ethnic[0].display_name, "汉族");

    let country = cache.get(DictionaryKind::Nationality).await;
    assert_eq!(country[0].display_name, "中国");
    assert_eq!(country[0].english_name.as_deref(), Some("China"));
}

#[tokio::test]
async fn test_broken_asset_degrades_to_empty() {
    let addr = spawn_server().await;
    let source = HttpDictionarySource::new()
        .with_ethnicity_url(format!("http://{addr}/assets/broken.json"));
    let cache = DictionaryCache::new(Arc::new(source));

    assert!(cache.get(DictionaryKind::Ethnicity).await.is_empty());
    assert!(!cache.is_loaded(DictionaryKind::Ethnicity));
}
