//! HTTP surface.
//!
//! Every check route sits behind [`require_credentials`]; the gate runs before
//! the body is even parsed, so an unauthorized caller never reaches the engine.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::AuthGate;
use crate::errors::ApiError;
use crate::probe::prelude::*;
use crate::service::CheckService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CheckService>,
    pub gate: Arc<AuthGate>,
}

pub fn router(state: AppState) -> Router {
    let checks = Router::new()
        .route("/Chat/CheckQuantum", post(check_quantum))
        .route("/Chat/CheckSmtp", post(check_smtp))
        .route("/Chat/CheckHttp", post(check_http))
        .route("/Chat/CheckHttps", post(check_https))
        .route("/Chat/CheckDns", post(check_dns))
        .route("/Chat/CheckIcmp", post(check_icmp))
        .route("/Chat/CheckRawConnect", post(check_raw_connect))
        .route("/Chat/CheckNmap", post(check_nmap))
        .route("/Chat/CheckCrawlSite", post(check_crawl_site))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_credentials,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(checks)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_credentials(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.gate.authorize(request.headers())?;
    Ok(next.run(request).await)
}

/// Validation failures are the caller's fault (400); everything else that
/// reached the pipeline is a well-formed answer (200).
fn respond<T: Serialize>(envelope: ResultEnvelope<T>) -> Response {
    let status = match envelope.failure {
        Some(FailureKind::Validation) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    (status, Json(envelope)).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn check_quantum(State(state): State<AppState>, Json(body): Json<UrlRequest>) -> Response {
    respond(state.service.check_quantum(body).await)
}

async fn check_smtp(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::Smtp(body)).await)
}

async fn check_http(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::Http(body)).await)
}

async fn check_https(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::Https(body)).await)
}

async fn check_dns(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::Dns(body)).await)
}

async fn check_icmp(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::Icmp(body)).await)
}

async fn check_raw_connect(
    State(state): State<AppState>,
    Json(body): Json<HostRequest>,
) -> Response {
    respond(state.service.check(ProbeRequest::RawConnect(body)).await)
}

async fn check_nmap(State(state): State<AppState>, Json(body): Json<HostRequest>) -> Response {
    respond(state.service.check(ProbeRequest::NmapProbe(body)).await)
}

async fn check_crawl_site(
    State(state): State<AppState>,
    Json(body): Json<HostRequest>,
) -> Response {
    respond(state.service.check(ProbeRequest::CrawlSite(body)).await)
}
