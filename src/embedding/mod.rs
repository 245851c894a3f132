//! 임베딩 모듈 - 질문 텍스트 벡터화
//!
//! 두 가지 프로바이더를 제공합니다.
//! - [`LocalEmbedding`]: fastembed(ONNX) 기반 로컬 문장 임베딩 모델 (기본값 `all-MiniLM-L6-v2`)
//! - [`GeminiEmbedding`]: Gemini API 원격 임베딩 (`gemini-embedding-001`)
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder("all-MiniLM-L6-v2")?;
//! let vector = embedder.embed("What are your hours?").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[cfg(test)]
pub(crate) mod testing;

/// 기본 문장 임베딩 모델
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 같은 텍스트는 `embed`와 `embed_batch` 어느 쪽으로 인코딩해도
/// 같은 벡터가 나와야 합니다. 차원은 프로바이더가 결정합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더(모델) 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Local Embedding (fastembed)
// ============================================================================

/// 모델 식별자를 fastembed 모델로 변환
///
/// `sentence-transformers/`, `BAAI/` 같은 조직 접두사는 무시합니다.
pub fn resolve_local_model(name: &str) -> Option<EmbeddingModel> {
    let trimmed = name.trim();
    let short = trimmed.rsplit('/').next().unwrap_or(trimmed);

    match short.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        "paraphrase-multilingual-minilm-l12-v2" => Some(EmbeddingModel::ParaphraseMLMiniLML12V2),
        _ => None,
    }
}

/// 로컬 문장 임베딩 모델
///
/// 추론은 CPU 바운드이므로 `spawn_blocking`에서 실행합니다.
pub struct LocalEmbedding {
    model: Arc<TextEmbedding>,
    name: String,
}

impl LocalEmbedding {
    /// 모델 로드 (최초 실행 시 다운로드)
    pub fn new(model_name: &str) -> Result<Self> {
        let model = resolve_local_model(model_name)
            .ok_or_else(|| anyhow::anyhow!("Unsupported sentence model: {}", model_name))?;

        let options = InitOptions::new(model).with_show_download_progress(false);
        let embedding =
            TextEmbedding::try_new(options).context("Failed to load sentence embedding model")?;

        tracing::info!("Loaded local sentence model: {}", model_name);
        Ok(Self {
            model: Arc::new(embedding),
            name: model_name.to_string(),
        })
    }

    async fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .context("Embedding task panicked")?
            .context("Local embedding failed")
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let vectors = self.encode(texts.to_vec()).await?;
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Model returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 모델 이름
pub const GEMINI_MODEL: &str = "gemini-embedding-001";

/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// Gemini 기본 출력 차원
pub const GEMINI_DIMENSION: usize = 768;

/// Rate Limiter 설정 (무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

/// 슬라이딩 윈도우 Rate Limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests: max_requests as usize,
            window,
        }
    }

    /// 윈도우 안의 요청 수가 한도 미만이 될 때까지 대기
    async fn acquire(&mut self) {
        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests {
            if let Some(&oldest) = self.requests.first() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                tracing::debug!("Rate limit reached, waiting {:?}", wait);
                tokio::time::sleep(wait).await;
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        self.requests.push(Instant::now());
    }
}

/// Gemini 원격 임베딩
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'static str,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: [EmbedPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiEmbedding {
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 출력 차원 (768, 1536, 3072)
    pub fn new(api_key: String, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 환경변수 API 키로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?, GEMINI_DIMENSION)
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: "models/gemini-embedding-001",
            content: EmbedContent {
                parts: [EmbedPart { text }],
            },
            // 질문-질문 비교이므로 대칭 태스크 사용
            task_type: "SEMANTIC_SIMILARITY",
            output_dimensionality: self.dimension,
        };

        let mut last_error = anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES);

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.acquire().await;

            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = anyhow::anyhow!("Failed to send embedding request: {}", e);
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Embedding request failed, retrying (attempt {}/{})",
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(Self::backoff(attempt)).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return Ok(parsed.embedding.values);
            }

            if status.as_u16() != 429 {
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    anyhow::bail!(
                        "Gemini API error ({}): {}",
                        error.error.status,
                        error.error.message
                    );
                }
                anyhow::bail!("Gemini API error ({}): {}", status, body);
            }

            last_error = anyhow::anyhow!("Rate limit exceeded (429)");
            if attempt < MAX_RETRIES {
                let backoff = Self::backoff(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        GEMINI_MODEL
    }
}

// ============================================================================
// API Key Management
// ============================================================================

const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"];

/// API 키 로드
///
/// 우선순위: `GEMINI_API_KEY` > `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    for var in API_KEY_VARS {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable."
    )
}

/// API 키 존재 여부
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Factory Function
// ============================================================================

/// Gemini 모델 식별자 여부
pub fn is_gemini_model(name: &str) -> bool {
    let short = name.trim().trim_start_matches("models/");
    short.eq_ignore_ascii_case(GEMINI_MODEL)
}

/// 모델 식별자로 임베딩 프로바이더 생성
///
/// 모르는 식별자나 모델 로드 실패는 에러입니다 (시작 단계에서 치명적).
pub fn create_embedder(model_name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    if is_gemini_model(model_name) {
        let embedder = GeminiEmbedding::from_env()?;
        tracing::info!("Using Gemini API embedding (dimension: {})", embedder.dimension);
        return Ok(Arc::new(embedder));
    }

    Ok(Arc::new(LocalEmbedding::new(model_name)?))
}

// ============================================================================
// Tests
// ============================================================================
