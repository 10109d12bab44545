//! HTTP API gateway for Scholar.
//!
//! Exposes `POST /answer` and `GET /health`. Every answer request is one
//! unit of work on the bounded `WorkerPool`.
//!
//! Built on Axum for high performance async HTTP.

pub mod pool;

pub use pool::WorkerPool;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use scholar_config::AppConfig;
use scholar_core::Error;
use scholar_core::document::AnswerResult;
use scholar_rag::{AnswerPipeline, AnsweredQuery, GenerationOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnswerPipeline>,
    pub pool: WorkerPool,
}

impl AppState {
    pub fn new(pipeline: Arc<AnswerPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            pool: WorkerPool::new(workers),
        }
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - HTTP trace logging
/// - `x-request-id` propagation (generated when absent)
/// - CORS for GET/POST with JSON bodies
/// - Request body size limit (64 KB)
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/answer", post(answer_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(cors)
                .layer(DefaultBodyLimit::max(64 * 1024)),
        )
}

/// Start the gateway HTTP server.
///
/// Builds the answer pipeline once (index load, backend clients) and fails
/// before binding if any of it is misconfigured.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let pipeline = Arc::new(AnswerPipeline::from_config(&config)?);
    pipeline.warm_up().await?;
    let state = AppState::new(pipeline, config.gateway.workers);
    let pool = state.pool.clone();
    let app = build_router(state);

    info!(addr = %addr, workers = pool.size(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            pool.close();
        })
        .await?;

    Ok(())
}

// --- Middleware ---

/// Tag every request with an id and echo it on the response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    debug!(request_id = %id, method = %req.method(), path = %req.uri().path(), "Request received");

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

// --- Errors ---

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// A pipeline error on its way to becoming an HTTP response.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        e if e.is_backend_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Answer request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Answer request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    debug: bool,
}

#[derive(Serialize)]
struct AnswerResponse {
    #[serde(flatten)]
    result: AnswerResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<DebugInfo>,
}

#[derive(Serialize)]
struct DebugInfo {
    query: String,
    top_k: usize,
    outcome: GenerationOutcome,
    ranked: Vec<RankedEntry>,
}

#[derive(Serialize)]
struct RankedEntry {
    doc_id: String,
    distance: f32,
    rerank_score: Option<f32>,
}

impl DebugInfo {
    fn new(query: String, answered: &AnsweredQuery) -> Self {
        Self {
            query,
            top_k: answered.top_k,
            outcome: answered.outcome,
            ranked: answered
                .ranked
                .iter()
                .map(|d| RankedEntry {
                    doc_id: d.doc_id.clone(),
                    distance: d.distance,
                    rerank_score: d.rerank_score,
                })
                .collect(),
        }
    }
}

async fn answer_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(Error::InvalidRequest("query must not be empty".into()).into());
    }
    info!(
        query_len = payload.query.len(),
        top_k = ?payload.top_k,
        debug = payload.debug,
        "Answer request"
    );

    debug!(available = state.pool.available(), "Queueing answer");
    let pipeline = state.pipeline.clone();
    let query = payload.query.clone();
    let top_k = payload.top_k;
    let answered = state
        .pool
        .run(async move { pipeline.answer(&query, top_k).await })
        .await??;

    let debug = payload
        .debug
        .then(|| DebugInfo::new(payload.query, &answered));
    Ok(Json(AnswerResponse {
        result: answered.result,
        debug,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use scholar_core::document::RetrievedDocument;
    use scholar_core::error::{IndexError, ProviderError};
    use scholar_core::message::Message;
    use scholar_core::provider::{
        EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    };
    use scholar_core::VectorIndex;
    use scholar_rag::{AnswerGenerator, GenerationSettings, RetrievalSettings, Retriever};
    use serde_json::Value;
    use tower::ServiceExt;

    const ANSWER: &str =
        "(A) Supported [2501.00002v1].\n\nSources used:\n[2501.00002v1]: Second paper";

    /// Chat and embedding mock: always the same answer, always the same vector.
    struct MockBackend;

    #[async_trait]
    impl Provider for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(ANSWER),
                usage: None,
                model: "mock-model".into(),
                metadata: serde_json::Map::new(),
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| vec![1.0, 0.0]).collect(),
                model: request.model,
                usage: None,
            })
        }
    }

    struct MockIndex {
        fail: bool,
    }

    #[async_trait]
    impl VectorIndex for MockIndex {
        fn name(&self) -> &str {
            "mock"
        }

        async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
            if self.fail {
                return Err(IndexError::DimensionMismatch {
                    expected: 384,
                    actual: query.len(),
                });
            }
            Ok([("2501.00001v1", "First paper", 0.1), ("2501.00002v1", "Second paper", 0.2)]
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, (id, title, distance))| {
                    RetrievedDocument::new(i as u64, *id, *title, "An abstract.", *distance)
                })
                .collect())
        }

        fn len(&self) -> usize {
            2
        }
    }

    fn test_state(fail_index: bool) -> AppState {
        let backend: Arc<MockBackend> = Arc::new(MockBackend);
        let retriever = Retriever::new(
            backend.clone(),
            Arc::new(MockIndex { fail: fail_index }),
            RetrievalSettings {
                embedding_model: "mock-embed".into(),
                top_k: 5,
                initial_retrieval_k: 10,
                max_context_chars: 6000,
                max_abstract_chars_per_doc: 1200,
            },
        );
        let generator = AnswerGenerator::new(
            backend,
            GenerationSettings {
                model: "mock-model".into(),
                temperature: 0.2,
                max_tokens: 400,
                stop: vec![],
            },
        );
        AppState::new(Arc::new(AnswerPipeline::new(retriever, generator)), 2)
    }

    fn post_answer(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/answer")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(false));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn answer_returns_reconciled_payload() {
        let app = build_router(test_state(false));

        let response = app
            .oneshot(post_answer(serde_json::json!({"query": "What works?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["answer"], ANSWER);
        assert_eq!(json["used_ids"], serde_json::json!(["2501.00002v1"]));
        assert_eq!(json["citations"].as_array().unwrap().len(), 1);
        assert_eq!(json["citations"][0]["doc_id"], "2501.00002v1");
        assert_eq!(json["retrieved_context"].as_array().unwrap().len(), 1);
        assert!(json.get("debug").is_none());
    }

    #[tokio::test]
    async fn debug_payload_lists_ranked_candidates() {
        let app = build_router(test_state(false));

        let response = app
            .oneshot(post_answer(serde_json::json!({
                "query": "What works?",
                "top_k": 1,
                "debug": true
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let debug = &json["debug"];
        assert_eq!(debug["query"], "What works?");
        assert_eq!(debug["top_k"], 1);
        assert_eq!(debug["outcome"], "accepted");
        assert_eq!(debug["ranked"].as_array().unwrap().len(), 2);
        assert_eq!(debug["ranked"][0]["doc_id"], "2501.00001v1");
        assert!(debug["ranked"][0]["rerank_score"].is_null());
    }

    #[tokio::test]
    async fn blank_query_is_bad_request() {
        for body in [serde_json::json!({"query": "   "}), serde_json::json!({})] {
            let app = build_router(test_state(false));
            let response = app.oneshot(post_answer(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert!(json["error"].as_str().unwrap().contains("query"));
        }
    }

    #[tokio::test]
    async fn zero_top_k_is_bad_request() {
        let app = build_router(test_state(false));
        let response = app
            .oneshot(post_answer(serde_json::json!({"query": "q", "top_k": 0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backend_failure_is_bad_gateway() {
        let app = build_router(test_state(true));
        let response = app
            .oneshot(post_answer(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("dimension"));
    }

    #[tokio::test]
    async fn closed_pool_is_internal_error() {
        let state = test_state(false);
        state.pool.close();
        let app = build_router(state);
        let response = app
            .oneshot(post_answer(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&Error::Provider(ProviderError::Network("down".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::config("bad")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&Error::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
