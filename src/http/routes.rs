//! The fixed route table (C8, spec §6): one `axum::Router` wiring every
//! HTTP route to its handler, the token gate, and static file serving.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregator::aggregate_status;
use crate::app::AppState;
use crate::core::error::{BridgeError, Result};
use crate::core::model::Configuration;
use crate::handlers;
use crate::http::auth::require_token;
use crate::http::diag;
use crate::http::query::{flag, RawQuery};
use crate::http::static_pages;

/// Spec-mandated limit (§6): a `POST /api/config` body over this size is a
/// *bad-request*, not a transport-level rejection.
const MAX_CONFIG_BODY_BYTES: usize = 512 * 1024;

/// A generous backstop well above [`MAX_CONFIG_BODY_BYTES`], purely so an
/// oversized body never gets buffered in full before `post_config` can
/// reject it with the standard JSON error envelope. Bodies between the two
/// limits still reach the handler and get the spec's 400 treatment; only a
/// body past this backstop falls back to tower's bare rejection.
const BODY_LIMIT_BACKSTOP_BYTES: usize = 8 * MAX_CONFIG_BODY_BYTES;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/control", get(control_page).fallback(method_not_allowed))
        .route("/config", get(config_page).fallback(method_not_allowed))
        .route("/health", get(health))
        .route("/favicon.ico", get(favicon))
        .route(
            "/api/config",
            get(get_config)
                .post(post_config)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BACKSTOP_BYTES)),
        )
        .route("/api/status", get(status).fallback(method_not_allowed))
        .route("/api/diag", get(diag_route).fallback(method_not_allowed))
        .route("/api/cmd/light", get(light).fallback(method_not_allowed))
        .route("/api/cmd/shutter", get(shutter).fallback(method_not_allowed))
        .route(
            "/api/cmd/thermostat",
            get(thermostat).fallback(method_not_allowed),
        )
        .route("/api/cmd/poll", get(poll).fallback(method_not_allowed))
        .route(
            "/api/cmd/apply-inputs",
            get(apply_inputs).fallback(method_not_allowed),
        )
        .route(
            "/api/cmd/program-address",
            get(program_address).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "/control")],
    )
        .into_response()
}

async fn control_page(State(state): State<AppState>) -> Response {
    static_pages::control(state).await
}

async fn config_page(State(state): State<AppState>) -> Response {
    static_pages::config_page(state).await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> impl IntoResponse {
    BridgeError::not_found("route")
}

async fn method_not_allowed() -> impl IntoResponse {
    BridgeError::MethodNotAllowed
}

async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.store.config().await)
}

async fn post_config(State(state): State<AppState>, body: Bytes) -> Result<Json<serde_json::Value>> {
    if body.is_empty() {
        let config = state.store.config().await;
        return Ok(Json(serde_json::json!({"ok": true, "config": config})));
    }
    if body.len() > MAX_CONFIG_BODY_BYTES {
        return Err(BridgeError::bad_request(format!(
            "config body too large: {} bytes (max {MAX_CONFIG_BODY_BYTES})",
            body.len()
        )));
    }
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| BridgeError::bad_request(format!("invalid JSON body: {e}")))?;
    let config = state.store.replace_config(raw).await?;
    state.gateway.update_settings(config.gateway.clone());
    Ok(Json(serde_json::json!({"ok": true, "config": config})))
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<crate::aggregator::StatusResult>> {
    require_token(&state, &query).await?;
    let refresh = flag(&query, "refresh");
    Ok(Json(
        aggregate_status(&state.gateway, &state.locks, &state.store, refresh).await,
    ))
}

async fn diag_route(State(state): State<AppState>, Query(query): Query<RawQuery>) -> Result<Json<diag::DiagReply>> {
    require_token(&state, &query).await?;
    Ok(Json(diag::handle(&state).await))
}

async fn light(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<handlers::light::LightReply>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::light::handle(&state, &query).await?))
}

async fn shutter(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<handlers::shutter::ShutterReply>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::shutter::handle(&state, &query).await?))
}

async fn thermostat(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<handlers::thermostat::ThermostatReply>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::thermostat::handle(&state, &query).await?))
}

async fn poll(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<crate::core::model::BoardSnapshot>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::poll::handle(&state, &query).await?))
}

async fn apply_inputs(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<handlers::apply_inputs::ApplyInputsReply>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::apply_inputs::handle(&state, &query).await?))
}

async fn program_address(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Result<Json<handlers::program_address::ProgramAddressReply>> {
    require_token(&state, &query).await?;
    Ok(Json(handlers::program_address::handle(&state, &query).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::core::model::GatewaySettings;
    use crate::gateway::{AddressLocks, GatewayClient};
    use crate::store::Store;

    async fn test_state() -> AppState {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        let gateway = Arc::new(GatewayClient::new(GatewaySettings::default()));
        let locks = Arc::new(AddressLocks::new());
        AppState::new(store, gateway, locks, dir.path().to_path_buf())
    }

    /// Boots the real router on an ephemeral port and issues a bare-bones
    /// HTTP/1.1 request over a raw socket, returning the status line and
    /// body. There is no HTTP client in this crate's dependency graph, so
    /// this mirrors the gateway transport tests' own raw-TCP style rather
    /// than pulling one in just for tests.
    async fn request(router: Router, path: &str) -> (u16, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).into_owned();
        let status_line = text.lines().next().unwrap_or("");
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let body = text.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
        (status, body)
    }

    /// Same as `request`, but issues a `POST` with a raw body and no
    /// `Content-Length` trickery beyond what's accurate.
    async fn post_request(router: Router, path: &str, body: &[u8]) -> (u16, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let header = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(header.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).into_owned();
        let status_line = text.lines().next().unwrap_or("");
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let body = text.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
        (status, body)
    }

    #[tokio::test]
    async fn oversized_config_body_is_a_json_bad_request() {
        let router = build_router(test_state().await);
        let oversized = vec![b'a'; MAX_CONFIG_BODY_BYTES + 1];
        let (status, body) = post_request(router, "/api/config", &oversized).await;
        assert_eq!(status, 400);
        assert!(body.contains("\"ok\":false"));
    }

    #[tokio::test]
    async fn health_is_reachable_without_a_token() {
        let router = build_router(test_state().await);
        let (status, body) = request(router, "/health").await;
        assert_eq!(status, 200);
        assert!(body.contains("\"ok\":true"));
    }

    #[tokio::test]
    async fn unknown_path_is_a_json_404() {
        let router = build_router(test_state().await);
        let (status, body) = request(router, "/nope").await;
        assert_eq!(status, 404);
        assert!(body.contains("\"ok\":false"));
    }

    #[tokio::test]
    async fn status_without_a_token_is_unauthorised() {
        let router = build_router(test_state().await);
        let (status, _) = request(router, "/api/status").await;
        assert_eq!(status, 401);
    }

    #[tokio::test]
    async fn root_redirects_to_control() {
        let router = build_router(test_state().await);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.starts_with("HTTP/1.1 302"));
        assert!(text.contains("location: /control") || text.contains("Location: /control"));
    }
}
