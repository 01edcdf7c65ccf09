//! Status surface: connectivity view and retry action over HTTP

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::monitor::ConnectivityMonitor;

/// Status router application state
#[derive(Clone)]
pub struct StatusState {
    pub monitor: Arc<ConnectivityMonitor>,
}

/// Build the status axum router
pub fn build_router(monitor: Arc<ConnectivityMonitor>) -> Router {
    let status_state = StatusState { monitor };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/retry", post(retry_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(status_state)
}

async fn index_handler(State(status): State<StatusState>) -> impl IntoResponse {
    let state = status.monitor.status();

    let (label, color, bg) = if state.use_fallback_data {
        ("Offline mode", "#721c24", "#f8d7da")
    } else {
        ("Connected", "#155724", "#d4edda")
    };
    let detail = state.last_error.as_deref().unwrap_or("");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Lifeline Status</title>
    <script>
        function render(s) {{
            const badge = document.getElementById('badge');
            badge.textContent = s.useFallbackData ? 'Offline mode' : 'Connected';
            document.getElementById('detail').textContent = s.lastError || '';
        }}
        function retryConnection() {{
            fetch('/api/retry', {{ method: 'POST' }}).then(r => r.json()).then(render);
        }}
        setInterval(() => fetch('/api/status').then(r => r.json()).then(render), 5000);
    </script>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 640px; margin: 0 auto; padding: 1rem;">
    <h1>Lifeline Status</h1>
    <p>
        <span id="badge" style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-weight: 600; color: {color}; background-color: {bg};">{label}</span>
        <span id="detail" style="margin-left: 0.5rem; color: #6c757d;">{detail}</span>
    </p>
    <button onclick="retryConnection()">Retry connection</button>
</body>
</html>"#,
        color = color,
        bg = bg,
        label = label,
        detail = html_escape(detail),
    );

    Html(html)
}

async fn status_handler(State(status): State<StatusState>) -> impl IntoResponse {
    axum::Json(status.monitor.status())
}

async fn retry_handler(State(status): State<StatusState>) -> impl IntoResponse {
    axum::Json(status.monitor.retry_connection().await)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
