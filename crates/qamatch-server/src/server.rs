//! `QaServer`: axum HTTP surface over a [`QaController`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use qamatch_embeddings::QaController;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Matching and backfill orchestration.
    pub controller: Arc<QaController>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The HTTP server.
pub struct QaServer {
    config: ServerConfig,
    controller: Arc<QaController>,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl QaServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, controller: QaController) -> Self {
        Self {
            config,
            controller: Arc::new(controller),
            metrics: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            controller: self.controller.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.request_timeout(),
            ))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes));

        Router::new()
            .route("/match", post(handlers::match_handler))
            .route("/backfill", post(handlers::backfill_handler))
            .route("/records", get(handlers::records_handler))
            .route("/health", get(handlers::health_handler))
            .route("/metrics", get(handlers::metrics_handler))
            .layer(middleware)
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(%addr, "listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// The controller behind the routes.
    pub fn controller(&self) -> &Arc<QaController> {
        &self.controller
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use qamatch_embeddings::{
        BackfillOptions, Embedder, EmbeddingService, MockEmbeddingService, encode_token,
    };
    use qamatch_store::{NewRecord, RecordRepository, open_in_memory};
    use tower::ServiceExt;

    const DIMS: usize = 16;

    fn make_server(records: &[NewRecord]) -> QaServer {
        let repo = RecordRepository::new(open_in_memory().unwrap());
        let _ = repo.insert_many(records).unwrap();
        let embedder = Embedder::new(Arc::new(MockEmbeddingService::new(DIMS)));
        let controller = QaController::new(embedder, repo, BackfillOptions::default(), 64);
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        QaServer::new(config, controller)
    }

    fn record(partition: &str, question: &str, answer: &str) -> NewRecord {
        NewRecord {
            partition_key: partition.into(),
            secondary_key: "1".into(),
            question_text: question.into(),
            answer_text: answer.into(),
            ..NewRecord::default()
        }
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn accessors() {
        let server = make_server(&[]);
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.controller().embedder().dimensions(), DIMS);
    }

    #[tokio::test]
    async fn health_endpoint_reports_model() {
        let app = make_server(&[]).router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["model"], "mock");
        assert_eq!(parsed["dimensions"], DIMS);
    }

    #[tokio::test]
    async fn match_with_empty_partition_is_no_match() {
        let app = make_server(&[record("A", "hello", "world")]).router();
        let resp = app
            .oneshot(post_form("/match", "query=hello&partition_key=XYZ"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "no_match");
    }

    #[tokio::test]
    async fn match_finds_stored_vector() {
        let svc = MockEmbeddingService::new(DIMS);
        let token = encode_token(&svc.embed_single("hello").await.unwrap()).unwrap();
        let mut stored = record("A", "hello", "world");
        stored.vector = Some(token);
        let app = make_server(&[stored]).router();

        let resp = app
            .oneshot(post_form("/match", "title=hello&f_obj=A"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["status"], "matched");
        assert_eq!(parsed["match"]["answer_text"], "world");
        let score = parsed["match"]["similarity_score"].as_f64().unwrap();
        assert!((score - 1.0).abs() < 1e-5, "score {score}");
    }

    #[tokio::test]
    async fn match_without_query_is_400() {
        let app = make_server(&[]).router();
        let resp = app
            .oneshot(post_form("/match", "partition_key=A"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn match_with_unsupported_body_is_400() {
        let app = make_server(&[]).router();
        let req = Request::builder()
            .method("POST")
            .uri("/match")
            .header("content-type", "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backfill_then_records_show_vectors() {
        let server = make_server(&[record("A", "q1", "a1"), record("B", "q2", "a2")]);

        let resp = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/backfill?partition_key=A")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report = json_body(resp).await;
        assert_eq!(report["scanned"], 1);
        assert_eq!(report["updated"], 1);

        let resp = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/records")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listing = json_body(resp).await;
        assert_eq!(listing["count"], 2);
        assert_eq!(listing["records"][0]["has_vector"], true);
        assert_eq!(listing["records"][1]["has_vector"], false);
        assert!(listing["records"][0].get("vector").is_none());
    }

    #[tokio::test]
    async fn metrics_endpoint_without_recorder_is_404() {
        let app = make_server(&[]).router();
        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = make_server(&[]).with_metrics(handle).router();
        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server(&[]).router();
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_and_shuts_down() {
        let server = make_server(&[]);
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server
            .shutdown()
            .graceful_shutdown(handle, Some(std::time::Duration::from_secs(5)))
            .await;
        assert!(server.shutdown().is_shutting_down());
    }
}
