//! Embedding Index - 메모리 상의 FAQ 코퍼스 + 질문 임베딩
//!
//! 시작 시 한 번 빌드되고 이후 변경되지 않습니다.
//! 레코드와 벡터는 위치(position)로 1:1 정렬되며, 위치는 로드 순서
//! (저장소 ID 오름차순)로 고정되어 동점 처리 기준이 됩니다.

use crate::embedding::EmbeddingProvider;
use crate::error::FaqError;

use super::store::{FaqRecord, FaqStore};

/// FAQ 임베딩 인덱스
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    records: Vec<FaqRecord>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingIndex {
    /// 레코드 전체의 질문을 한 번의 배치 호출로 인코딩하여 빌드
    pub async fn build(
        records: Vec<FaqRecord>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self, FaqError> {
        if records.is_empty() {
            return Err(FaqError::EmptyCorpus);
        }

        let questions: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
        let vectors = embedder
            .embed_batch(&questions)
            .await
            .map_err(|e| FaqError::Embedding(format!("{:#}", e)))?;

        let index = Self::from_parts(records, vectors)?;
        tracing::info!(
            "Built embedding index: {} FAQs ({})",
            index.len(),
            embedder.name()
        );
        Ok(index)
    }

    /// 저장소 전체를 읽어 빌드
    pub async fn load(store: &FaqStore, embedder: &dyn EmbeddingProvider) -> Result<Self, FaqError> {
        let records = store
            .get_all()
            .map_err(|e| FaqError::Store(format!("{:#}", e)))?;
        Self::build(records, embedder).await
    }

    /// 이미 계산된 벡터로 구성 (길이 불일치는 에러)
    pub fn from_parts(records: Vec<FaqRecord>, vectors: Vec<Vec<f32>>) -> Result<Self, FaqError> {
        if records.is_empty() {
            return Err(FaqError::EmptyCorpus);
        }
        if records.len() != vectors.len() {
            return Err(FaqError::Embedding(format!(
                "expected {} embeddings, got {}",
                records.len(),
                vectors.len()
            )));
        }
        Ok(Self { records, vectors })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 빌드된 인덱스는 항상 비어 있지 않음
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FaqRecord] {
        &self.records
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// 위치로 레코드 조회
    pub fn record(&self, position: usize) -> Option<&FaqRecord> {
        self.records.get(position)
    }
}
