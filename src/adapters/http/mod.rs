//! Local HTTP JSON API (axum). Implements InputPort for `tg-sweep serve`.
//!
//! Bound to 127.0.0.1 only. Every request is logged with method, path, status
//! and duration.

pub mod error;
pub mod handlers;

use crate::domain::DomainError;
use crate::ports::InputPort;
use crate::usecases::ChatService;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_PORT: u16 = 8765;

#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<ChatService>,
    /// Cancelled by `POST /api/shutdown` or Ctrl-C.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(chats: Arc<ChatService>) -> Self {
        Self {
            chats,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(get_config).post(save_config))
        .route("/api/connect", post(connect))
        .route("/api/verify", post(verify))
        .route("/api/me", get(me))
        .route("/api/chats", get(chats))
        .route("/api/refresh", post(refresh))
        .route("/api/analyze", get(analyze))
        .route("/api/delete/{chat_id}", post(delete_now))
        .route("/api/pending", get(pending))
        .route("/api/pending/batch", post(schedule_batch))
        .route(
            "/api/pending/batch/{batch_id}",
            get(batch_report).delete(undo_batch),
        )
        .route("/api/pending/batch/{batch_id}/cancel", post(cancel_batch))
        .route("/api/pending/{chat_id}", post(schedule).delete(undo))
        .route("/api/export/{category}", get(export))
        .route("/api/logout", post(logout))
        .route("/api/reset", post(reset))
        .route("/api/shutdown", post(shutdown))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

pub struct HttpInputPort {
    state: AppState,
    port: u16,
}

impl HttpInputPort {
    pub fn new(state: AppState, port: u16) -> Self {
        Self { state, port }
    }
}

#[async_trait::async_trait]
impl InputPort for HttpInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| DomainError::Storage(format!("bind {}: {}", addr, e)))?;
        info!(%addr, "HTTP API listening");

        let token = self.state.shutdown.clone();
        axum::serve(listener, build_router(self.state.clone()))
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            })
            .await
            .map_err(|e| DomainError::Storage(format!("http server: {}", e)))?;

        self.state.chats.coordinator().shutdown().await;
        self.state.chats.session().close().await;
        info!("HTTP API stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockAuth, MockConnector, MockConversationSource};
    use crate::domain::Credentials;
    use crate::ports::{ConversationSource, CredentialStore};
    use crate::usecases::{ChatSettings, SessionManager};
    use axum::body::Body;
    use axum::http::{Method, StatusCode, header};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct MemoryStore(Mutex<Option<Credentials>>);

    #[async_trait::async_trait]
    impl CredentialStore for MemoryStore {
        async fn load(&self) -> Result<Option<Credentials>, DomainError> {
            Ok(self.0.lock().await.clone())
        }
        async fn save(&self, credentials: &Credentials) -> Result<(), DomainError> {
            *self.0.lock().await = Some(credentials.clone());
            Ok(())
        }
        async fn clear(&self) -> Result<(), DomainError> {
            *self.0.lock().await = None;
            Ok(())
        }
    }

    fn app() -> (Router, Arc<MockConversationSource>) {
        let source = Arc::new(MockConversationSource::demo());
        let connector = Arc::new(MockConnector::new(
            Arc::new(MockAuth::authorized()),
            source.clone(),
        ));
        let session = Arc::new(SessionManager::new(connector, Arc::new(MemoryStore::default())));
        let chats = Arc::new(ChatService::new(session, ChatSettings::default()));
        (build_router(AppState::new(chats)), source)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, bytes) = call_raw(app, method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn call_raw(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn connected_app() -> (Router, Arc<MockConversationSource>) {
        let (app, source) = app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/config",
            Some(json!({"api_id": 1, "api_hash": "hash"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::POST, "/api/connect", Some(json!({"phone": "+100"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "connected");
        assert_eq!(body["needs_code"], false);
        (app, source)
    }

    #[tokio::test(start_paused = true)]
    async fn health_and_not_connected() {
        let (app, _) = app();
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        assert_eq!(body["app"], "tg-sweep");

        let (status, body) = call(&app, Method::GET, "/api/chats", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NOT_CONNECTED");

        let (status, body) = call(&app, Method::POST, "/api/connect", Some(json!({"phone": "+1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NOT_CONFIGURED");
    }

    #[tokio::test(start_paused = true)]
    async fn config_hides_hash() {
        let (app, _) = connected_app().await;
        let (_, body) = call(&app, Method::GET, "/api/config", None).await;
        assert_eq!(body["configured"], true);
        assert_eq!(body["api_id"], 1);
        assert_eq!(body["phone"], "+100");
        assert!(body.get("api_hash").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn chats_and_analysis() {
        let (app, _) = connected_app().await;
        let (status, body) = call(&app, Method::GET, "/api/chats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["total"], 9);
        assert_eq!(body["stats"]["groups"], 2);
        assert_eq!(body["chats"].as_array().map(Vec::len), Some(9));

        let (status, body) = call(&app, Method::GET, "/api/analyze", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"]["deleted"], 1);
        assert_eq!(body["counts"]["bots"], 1);
        assert_eq!(body["users"]["active"][0]["id"], 101);
    }

    #[tokio::test(start_paused = true)]
    async fn chats_relist_and_hide_pending() {
        let (app, source) = connected_app().await;
        let (_, body) = call(&app, Method::GET, "/api/chats", None).await;
        assert_eq!(body["stats"]["total"], 9);

        // Left from another device.
        source.delete_dialog(103).await.unwrap();
        let (_, body) = call(&app, Method::GET, "/api/chats", None).await;
        assert_eq!(body["stats"]["total"], 8);

        let (status, _) = call(&app, Method::POST, "/api/pending/-201", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/api/chats", None).await;
        assert_eq!(body["stats"]["total"], 7);
        assert!(
            body["chats"]
                .as_array()
                .unwrap()
                .iter()
                .all(|c| c["id"] != -201)
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        let (status, body) = call(&app, Method::POST, "/api/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["total"], 7);
        assert_eq!(source.delete_calls(), vec![103, -201]);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_delete_is_429() {
        let (app, source) = connected_app().await;
        source.script_delete(-201, Err(DomainError::RateLimited { retry_after_secs: 7 }));
        let (status, body) = call(&app, Method::POST, "/api/delete/-201", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["retry_after"], 7);

        let (status, body) = call(&app, Method::POST, "/api/delete/-201", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "deleted");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_undo_then_404() {
        let (app, source) = connected_app().await;
        let (status, body) = call(&app, Method::POST, "/api/pending/-201", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["undo_secs"], 10);

        let (_, body) = call(&app, Method::GET, "/api/pending", None).await;
        assert_eq!(body["pending"][0]["id"], -201);

        let (status, _) = call(&app, Method::DELETE, "/api/pending/-201", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::DELETE, "/api/pending/-201", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(source.delete_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_runs_to_report() {
        let (app, source) = connected_app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/pending/batch",
            Some(json!({"ids": [-201, 999]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheduled"], json!([-201]));
        assert_eq!(body["skipped"], json!([999]));
        let batch_id = body["batch_id"].as_u64().unwrap();
        let uri = format!("/api/pending/batch/{}", batch_id);

        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["status"], "running");

        tokio::time::sleep(Duration::from_secs(11)).await;
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "finished");
        assert_eq!(body["report"]["committed"], 1);
        assert_eq!(source.delete_calls(), vec![-201]);

        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::GET, "/api/pending/batch/77", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn export_is_an_attachment() {
        let (app, _) = connected_app().await;
        let (status, headers, body) =
            call_raw(&app, Method::GET, "/api/export/channels?format=csv", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"channels_"));
        assert!(disposition.ends_with(".csv\""));
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("id,type,title"));
        assert!(text.contains("Daily News"));

        let (status, body) = call(&app, Method::GET, "/api/export/everything", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test(start_paused = true)]
    async fn logout_disconnects() {
        let (app, _) = connected_app().await;
        let (status, _) = call(&app, Method::POST, "/api/logout", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(body["connected"], false);
    }
}
