use crate::coordinator::{ActiveDisable, LoggingDisableCoordinator};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hostlink_runtime::{ExternalEvent, HostLink};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// State shared across handlers
pub struct AppState {
    pub links: Vec<HostLink>,
    pub coordinator: Arc<LoggingDisableCoordinator>,
    pub external: broadcast::Sender<ExternalEvent>,
}

#[derive(Debug, Serialize)]
pub struct LinkStatus {
    pub name: String,
    pub state: hostlink_runtime::State,
    pub disables: Vec<ActiveDisable>,
}

impl AppState {
    fn status(&self, link: &HostLink) -> LinkStatus {
        LinkStatus {
            name: link.name().to_string(),
            state: link.state(),
            disables: self.coordinator.for_link(link.name()),
        }
    }

    fn find(&self, name: &str) -> Option<&HostLink> {
        self.links.iter().find(|link| link.name() == name)
    }
}

/// Operator router: metrics, link status, forced reconnects
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/api/v1/links", get(list_links))
        .route("/api/v1/links/:name", get(get_link))
        .route("/api/v1/links/:name/reconnect", post(reconnect_link))
        .route("/api/v1/reconnect", post(reconnect_all))
        .with_state(state)
}

// Handlers

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        hostlink_metrics::gather_metrics(),
    )
}

async fn list_links(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let links: Vec<LinkStatus> = state.links.iter().map(|link| state.status(link)).collect();
    Json(links)
}

async fn get_link(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.find(&name) {
        Some(link) => (StatusCode::OK, Json(Some(state.status(link)))).into_response(),
        None => (StatusCode::NOT_FOUND, Json(None::<LinkStatus>)).into_response(),
    }
}

async fn reconnect_link(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(link) = state.find(&name) else {
        return StatusCode::NOT_FOUND;
    };

    // Reconfigure from Idle is ignored by the state machine
    if !link.state().is_running() {
        return StatusCode::CONFLICT;
    }

    match link.reconfigure() {
        Ok(()) => {
            info!(link = %name, "Reconnect requested by operator");
            StatusCode::ACCEPTED
        }
        Err(e) => {
            warn!(link = %name, error = %e, "Reconnect request failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn reconnect_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let receivers = state.external.send(ExternalEvent::ForcedReconnect).unwrap_or(0);
    info!(receivers, "Forced reconnect broadcast");
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use hostlink_runtime::{LinkSettings, NoopAllowance, TcpHostClient};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::handshake::PassthroughHandshake;

    fn app_state() -> (Arc<AppState>, broadcast::Receiver<ExternalEvent>) {
        let coordinator = Arc::new(LoggingDisableCoordinator::default());
        let link = HostLink::spawn(
            "bingo",
            LinkSettings::default(),
            Arc::new(TcpHostClient::new("127.0.0.1", 1, Duration::from_millis(100))),
            Arc::new(PassthroughHandshake::new("bingo")),
            coordinator.clone(),
            Arc::new(NoopAllowance),
        );
        let (external, rx) = broadcast::channel(8);
        let state = Arc::new(AppState {
            links: vec![link],
            coordinator,
            external,
        });
        (state, rx)
    }

    async fn call(state: Arc<AppState>, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_list_links_reports_idle() {
        let (state, _rx) = app_state();
        let (status, body) = call(state, "GET", "/api/v1/links").await;

        assert_eq!(status, StatusCode::OK);
        let links: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(links[0]["name"], "bingo");
        assert_eq!(links[0]["state"], "idle");
        assert_eq!(links[0]["disables"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_link_is_not_found() {
        let (state, _rx) = app_state();
        let (status, _) = call(state.clone(), "GET", "/api/v1/links/keno").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(state, "POST", "/api/v1/links/keno/reconnect").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reconnect_idle_link_conflicts() {
        let (state, _rx) = app_state();
        let (status, _) = call(state, "POST", "/api/v1/links/bingo/reconnect").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_reconnect_all_broadcasts() {
        let (state, mut rx) = app_state();
        let (status, _) = call(state, "POST", "/api/v1/reconnect").await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(rx.recv().await.unwrap(), ExternalEvent::ForcedReconnect);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        hostlink_metrics::register_metrics();
        let (state, _rx) = app_state();
        let (status, body) = call(state, "GET", "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hostlink_connected_links"));
    }
}
