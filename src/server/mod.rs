//! HTTP 서버 - axum 기반 FAQ 질의 API
//!
//! - `POST /ask/` : `{"query": "..."}` → `{"answer", "matched_question", "confidence"}`
//! - `GET /health` : 로드 상태
//! - `GET /` : 정적 랜딩 페이지
//!
//! 리스너를 먼저 바인딩하고 모델/코퍼스를 로드합니다. 로드가 끝나기 전의
//! 질의는 503을 받습니다.

mod state;

pub use state::{LoadState, Readiness};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::embedding::create_embedder;
use crate::error::FaqError;
use crate::knowledge::{FaqService, FaqStore, MatchResult};

/// 기본 바인드 주소
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

// ============================================================================
// Configuration & State
// ============================================================================

/// 서버 설정
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub bind: String,
    pub db_path: PathBuf,
    pub model: String,
    pub fallback_message: String,
    /// 쉼표 구분 허용 Origin (없으면 전체 허용)
    pub cors_origins: Option<String>,
}

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub readiness: Readiness,
    pub model: String,
}

// ============================================================================
// Error Response
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// `FaqError` → HTTP 응답
#[derive(Debug)]
pub struct ApiError(pub FaqError);

impl From<FaqError> for ApiError {
    fn from(err: FaqError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_not_ready() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            tracing::error!("Query failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn landing_page() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    records: usize,
    model: String,
    loaded_at: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let (records, loaded_at) = match state.readiness.get() {
        Some(LoadState::Ready(service)) => (
            service.index().len(),
            Some(service.loaded_at().to_rfc3339()),
        ),
        _ => (0, None),
    };

    Json(HealthBody {
        status: state.readiness.status(),
        records,
        model: state.model.clone(),
        loaded_at,
    })
}

/// 요청 본문에서 `query` 문자열 추출
fn extract_query(body: &[u8]) -> Result<String, FaqError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| FaqError::MissingQueryField)?;

    value
        .get("query")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or(FaqError::MissingQueryField)
}

async fn ask(State(state): State<AppState>, body: Bytes) -> Result<Json<MatchResult>, ApiError> {
    let service = state.readiness.service()?;
    let query = extract_query(&body)?;

    let result = service.answer(&query).await?;
    Ok(Json(result))
}

// ============================================================================
// Router
// ============================================================================

/// CORS 레이어 (허용 Origin 미지정 시 전체 허용)
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        Some(list) if !list.trim().is_empty() => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        }
        _ => cors.allow_origin(Any),
    }
}

/// 라우터 구성
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/health", get(health))
        .route("/ask/", post(ask))
        .route("/ask", post(ask))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Startup
// ============================================================================

/// 모델 로드 + 코퍼스 임베딩
///
/// 빈 코퍼스는 `Ok(None)` (서버는 not-ready 상태로 유지),
/// 그 외 실패는 시작 단계 치명 에러입니다.
pub async fn initialize(config: &ServeConfig) -> Result<Option<FaqService>> {
    tracing::info!("Loading sentence model: {}", config.model);
    let model = config.model.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedder(&model))
        .await
        .context("Model loading task panicked")??;

    let store = FaqStore::open(&config.db_path)
        .with_context(|| format!("Failed to open FAQ store at {:?}", config.db_path))?;

    match FaqService::load(&store, embedder, config.fallback_message.clone()).await {
        Ok(service) => {
            tracing::info!(
                "Successfully loaded {} FAQs and created embeddings ({})",
                service.index().len(),
                service.model_name()
            );
            Ok(Some(service))
        }
        Err(FaqError::EmptyCorpus) => {
            tracing::warn!("No FAQ data found in {:?}", store.db_path());
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to build FAQ index"),
    }
}

/// 서버 실행 (Ctrl-C로 종료)
pub async fn serve(config: ServeConfig) -> Result<()> {
    let readiness = Readiness::new();
    let state = AppState {
        readiness: readiness.clone(),
        model: config.model.clone(),
    };
    let app = build_router(state, cors_layer(config.cors_origins.as_deref()));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("FAQ server listening on http://{}", config.bind);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    match initialize(&config).await {
        Ok(Some(service)) => {
            readiness.set_ready(Arc::new(service));
        }
        Ok(None) => {
            readiness.set_unavailable("FAQ corpus is empty");
        }
        Err(e) => {
            server.abort();
            return Err(e);
        }
    }

    server
        .await
        .context("Server task failed")?
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================================
// Tests
// ============================================================================
