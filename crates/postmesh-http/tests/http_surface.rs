//! Router behavior over the in-memory reference store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use postmesh_dispatch::{ServiceRegistry, StoreDispatcher, TransferService};
use postmesh_http::{build_router, AdmissionConfig, AdmissionController, AppState};
use postmesh_store::memory::MemoryEntityStore;
use postmesh_store::{ServiceKind, StoreMethodDirectory};

fn test_router() -> axum::Router {
    let mut registry = ServiceRegistry::new();
    for kind in ServiceKind::ALL {
        registry = registry.register(kind, Arc::new(MemoryEntityStore::new(kind)));
    }
    let transfer = TransferService::new(StoreDispatcher::new(
        registry,
        Arc::new(StoreMethodDirectory),
    ));
    let state = AppState {
        transfer: Arc::new(transfer),
        admission: Arc::new(AdmissionController::new(AdmissionConfig::default())),
        on_store_dispatched: None,
    };
    build_router(Arc::new(state))
}

fn business_request(path: &str, ip: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_reports_name_and_version() {
    let router = test_router();

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "postmesh-relay");
}

#[tokio::test]
async fn business_route_returns_the_dispatch_result() {
    let router = test_router();

    let body = json!({ "wallet": "0xabc", "data": {"hash": "0x1"}, "sig": "0xdef" });
    let response = router
        .oneshot(business_request("/v1/like/add", "10.1.1.1", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["wallet"], "0xabc");
    assert_eq!(result["data"]["hash"], "0x1");
    assert_eq!(result["sig"], "0xdef");
}

#[tokio::test]
async fn unknown_service_resolves_to_null_success() {
    let router = test_router();

    let body = json!({ "wallet": "0xabc", "data": {}, "sig": "0xdef" });
    let response = router
        .oneshot(business_request("/v1/media/add", "10.1.1.2", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);
}

#[tokio::test]
async fn disallowed_method_maps_to_bad_request() {
    let router = test_router();

    let body = json!({ "wallet": "0xabc", "data": {}, "sig": "0xdef" });
    let response = router
        .oneshot(business_request("/v1/like/drop", "10.1.1.3", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["error"]
        .as_str()
        .unwrap()
        .contains("invalid rpcMessage.serviceMethod"));
}

#[tokio::test]
async fn missing_body_fields_map_to_bad_request() {
    let router = test_router();

    let response = router
        .oneshot(business_request(
            "/v1/like/add",
            "10.1.1.4",
            &json!({ "wallet": "0xabc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid rpcMessage.body");
}

#[tokio::test]
async fn search_route_carries_its_own_limit() {
    let router = test_router();
    let body = json!({ "wallet": "0xabc", "data": {}, "sig": "0xdef" });

    for _ in 0..15 {
        let response = router
            .clone()
            .oneshot(business_request("/v1/search/queryList", "10.9.9.9", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(business_request("/v1/search/queryList", "10.9.9.9", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("(searching)"));

    // The same key still gets through on a non-search route.
    let response = router
        .oneshot(business_request("/v1/like/queryList", "10.9.9.9", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
