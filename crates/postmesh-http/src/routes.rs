//! Router and handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::BoxFuture;
use serde_json::{json, Value};

use postmesh_dispatch::TransferService;
use postmesh_types::{MessageBody, PostmeshError, RpcMessage};

use crate::admission::{Admission, AdmissionController, RouteClass};

/// Route that carries the search-scoped limiter on top of the global one.
const SEARCH_ROUTE: &str = "/v1/search/queryList";

/// Hook invoked after a successful store dispatch, with the dispatched
/// envelope. The daemon uses it to publish the message on the gossip
/// topic; it runs fire-and-forget.
pub type DispatchHook = Arc<dyn Fn(RpcMessage) -> BoxFuture<'static, ()> + Send + Sync>;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared state behind every route.
pub struct AppState {
    pub transfer: Arc<TransferService>,
    pub admission: Arc<AdmissionController>,
    pub on_store_dispatched: Option<DispatchHook>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the full router: index, business routes, admission guard.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index).post(index))
        .route("/v1/:service/:method", post(business))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_guard,
        ))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Admission middleware
// ---------------------------------------------------------------------------

/// Gates every request before routing or dispatch work.
async fn admission_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = request_key(&request);

    let mut classes = vec![RouteClass::Global];
    if request.uri().path() == SEARCH_ROUTE {
        classes.push(RouteClass::Search);
    }

    for class in classes {
        if let Admission::Rejected {
            status, message, ..
        } = state.admission.admit(&key, class)
        {
            let status = StatusCode::from_u16(status)
                .unwrap_or(StatusCode::TOO_MANY_REQUESTS);
            // Body-level contract only; no legacy X-RateLimit-* headers.
            return (status, message).into_response();
        }
    }

    next.run(request).await
}

/// Request key for admission: the client IP where known, otherwise the
/// forwarded address, otherwise a shared local key.
fn request_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Json<Value> {
    Json(json!({
        "name": "postmesh-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Maps `POST /v1/{serviceName}/{serviceMethod}` onto a `store`
/// envelope and returns the dispatch result as JSON.
async fn business(
    State(state): State<Arc<AppState>>,
    Path((service, method)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Response {
    let body: MessageBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid rpcMessage.body" })),
            )
                .into_response();
        }
    };

    let rpc_message = RpcMessage::store(service, method, body);

    match state.transfer.execute(&rpc_message).await {
        Ok(result) => {
            if let Some(hook) = &state.on_store_dispatched {
                tokio::spawn(hook(rpc_message));
            }
            Json(result).into_response()
        }
        Err(err @ PostmeshError::InvalidMessage { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(%err, "business dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
