//! 테스트용 결정적 임베딩 프로바이더

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::EmbeddingProvider;

/// 텍스트 → 고정 벡터 매핑 (없는 텍스트는 에러)
pub struct FixedEmbedding {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedEmbedding {
    pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { vectors }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector for {:?}", text))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
