//! FAQ Service - 시작 시 한 번 구성되는 읽기 전용 서비스 컨텍스트
//!
//! 임베딩 프로바이더, 불변 인덱스, 보류 문구를 묶어 요청 핸들러에 주입합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::embedding::EmbeddingProvider;
use crate::error::FaqError;

use super::index::EmbeddingIndex;
use super::matcher::{MatchResult, QueryMatcher};
use super::store::FaqStore;

/// FAQ 질의응답 서비스
pub struct FaqService {
    matcher: QueryMatcher,
    index: EmbeddingIndex,
    loaded_at: DateTime<Utc>,
}

impl FaqService {
    /// 구성된 인덱스로 생성
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: EmbeddingIndex,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            matcher: QueryMatcher::new(embedder, fallback_message),
            index,
            loaded_at: Utc::now(),
        }
    }

    /// 저장소에서 코퍼스를 읽고 임베딩하여 생성
    ///
    /// 저장소가 비어 있으면 `EmptyCorpus`.
    pub async fn load(
        store: &FaqStore,
        embedder: Arc<dyn EmbeddingProvider>,
        fallback_message: impl Into<String>,
    ) -> Result<Self, FaqError> {
        let index = EmbeddingIndex::load(store, embedder.as_ref()).await?;
        Ok(Self::new(embedder, index, fallback_message))
    }

    /// 질의에 답변
    pub async fn answer(&self, query: &str) -> Result<MatchResult, FaqError> {
        self.matcher.answer(query, Some(&self.index)).await
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn model_name(&self) -> &str {
        self.matcher.embedder().name()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
