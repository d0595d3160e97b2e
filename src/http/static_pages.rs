//! Serves the two static HTML pages (`/control`, `/config`). The pages
//! themselves are an external collaborator (spec §1's out-of-scope list);
//! this module only owns the route's HTTP contract — content type, cache
//! policy, and a 404 when the file is absent from disk.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

async fn serve(state: &AppState, file_name: &str) -> Response {
    let path = state.static_dir.join(file_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => {
            tracing::warn!(path = %path.display(), "static page missing");
            (
                StatusCode::NOT_FOUND,
                axum::Json(serde_json::json!({"ok": false, "error": "non trovato"})),
            )
                .into_response()
        }
    }
}

pub async fn control(state: AppState) -> Response {
    serve(&state, "control.html").await
}

pub async fn config_page(state: AppState) -> Response {
    serve(&state, "config.html").await
}
