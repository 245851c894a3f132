//! Query Matcher - 코사인 유사도 기반 최적 FAQ 선택
//!
//! 질의를 인덱스와 같은 벡터 공간으로 인코딩한 뒤, 모든 질문 벡터와의
//! 코사인 유사도를 계산해 최댓값을 고릅니다. 동점이면 코퍼스 순서상
//! 먼저 나온 항목을 선택합니다.
//!
//! 신뢰도가 [`SIMILARITY_THRESHOLD`]를 **초과**하면 답변하고,
//! 그 외에는 고정 안내 문구로 보류하되 가장 가까운 질문과 점수는 함께 돌려줍니다.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::FaqError;

use super::index::EmbeddingIndex;
use super::store::FaqRecord;

/// 답변 임계값 (strict `>`)
pub const SIMILARITY_THRESHOLD: f32 = 0.50;

/// 기본 보류 안내 문구
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I am unable to answer that. Please contact us for further assistance.";

// ============================================================================
// Types
// ============================================================================

/// 매칭 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// 임계값 초과 - 매칭된 답변 반환
    Answered,
    /// 임계값 이하 - 안내 문구 반환
    Deferred,
}

/// 매칭 결과
///
/// 직렬화 형태는 `{"answer", "matched_question", "confidence"}` 입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub answer: String,
    pub matched_question: String,
    pub confidence: f32,
    #[serde(skip)]
    pub status: MatchStatus,
    /// 매칭된 레코드 ID
    #[serde(skip)]
    pub record_id: i64,
}

impl MatchResult {
    /// 최적 후보와 점수로 응답 결정
    pub fn decide(record: &FaqRecord, confidence: f32, fallback_message: &str) -> Self {
        let (answer, status) = if confidence > SIMILARITY_THRESHOLD {
            (record.answer.clone(), MatchStatus::Answered)
        } else {
            (fallback_message.to_string(), MatchStatus::Deferred)
        };

        Self {
            answer,
            matched_question: record.question.clone(),
            confidence,
            status,
            record_id: record.id,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.status == MatchStatus::Answered
    }
}

// ============================================================================
// Similarity
// ============================================================================

/// 코사인 유사도 (-1.0 ~ 1.0)
///
/// 길이가 다르거나 빈 벡터, 0 벡터는 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 최고 유사도 위치와 점수
///
/// 동점이면 앞선 위치가 이깁니다. NaN 점수는 건너뜁니다.
pub fn best_match(query: &[f32], vectors: &[Vec<f32>]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;

    for (position, vector) in vectors.iter().enumerate() {
        let score = cosine_similarity(query, vector);
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((position, score)),
        }
    }

    best
}

// ============================================================================
// QueryMatcher
// ============================================================================

/// 질의 매처 (상태 없음, 읽기 전용)
#[derive(Clone)]
pub struct QueryMatcher {
    embedder: Arc<dyn EmbeddingProvider>,
    fallback_message: String,
}

impl QueryMatcher {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, fallback_message: impl Into<String>) -> Self {
        Self {
            embedder,
            fallback_message: fallback_message.into(),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// 질의에 답변
    ///
    /// # Errors
    /// * `NotReady` - 인덱스 없음
    /// * `EmptyQuery` - 공백 제거 후 빈 질의
    /// * `Embedding` - 질의 인코딩 실패
    pub async fn answer(
        &self,
        query: &str,
        index: Option<&EmbeddingIndex>,
    ) -> Result<MatchResult, FaqError> {
        let index = match index {
            Some(index) if !index.is_empty() => index,
            _ => return Err(FaqError::NotReady),
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(FaqError::EmptyQuery);
        }

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| FaqError::Embedding(format!("{:#}", e)))?;

        let (position, confidence) = best_match(&query_vector, index.vectors())
            .ok_or_else(|| FaqError::Embedding("no comparable vectors in index".to_string()))?;
        let record = index
            .record(position)
            .ok_or_else(|| FaqError::Embedding(format!("index position {} out of range", position)))?;

        let result = MatchResult::decide(record, confidence, &self.fallback_message);
        tracing::debug!(
            "Query matched FAQ #{} (confidence {:.4}, {:?})",
            record.id,
            confidence,
            result.status
        );
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::embedding::testing::FixedEmbedding;

    fn record(id: i64, question: &str, answer: &str) -> FaqRecord {
        FaqRecord {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            keywords: vec![],
            reference: String::new(),
        }
    }

    /// 단위 벡터 [1, 0]과의 코사인이 정확히 `c`가 되는 벡터 [c, s]
    fn unit_at(c: f32) -> Vec<f32> {
        vec![c, (1.0 - c * c).sqrt()]
    }

    fn hours_fixture() -> (QueryMatcher, EmbeddingIndex) {
        let embedder = FixedEmbedding::new(HashMap::from([
            ("When are you open?".to_string(), unit_at(0.71)),
            ("What is the weather?".to_string(), unit_at(0.12)),
        ]));
        let index = EmbeddingIndex::from_parts(
            vec![record(1, "What are your hours?", "9am-5pm")],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        (QueryMatcher::new(Arc::new(embedder), "Please call us."), index)
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![10.0, 20.0, 30.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_best_match_prefers_first_on_tie() {
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 0.0]];
        assert_eq!(best_match(&[1.0, 0.0], &vectors).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_best_match_negative_scores() {
        let vectors = vec![vec![-1.0, 0.0], vec![-1.0, -1.0]];
        let (position, score) = best_match(&[1.0, 0.0], &vectors).unwrap();
        assert_eq!(position, 1);
        assert!(score < 0.0);
    }

    #[test]
    fn test_best_match_skips_nan() {
        let vectors = vec![vec![f32::NAN, 0.0], vec![0.5, 0.5]];
        assert_eq!(best_match(&[1.0, 0.0], &vectors).map(|(i, _)| i), Some(1));
        assert_eq!(best_match(&[1.0, 0.0], &[]), None);
    }

    #[test]
    fn test_threshold_boundary() {
        let faq = record(1, "Q?", "A");

        let at = MatchResult::decide(&faq, 0.50, "fallback");
        assert_eq!(at.status, MatchStatus::Deferred);
        assert_eq!(at.answer, "fallback");
        assert_eq!(at.matched_question, "Q?");

        let above = MatchResult::decide(&faq, 0.500_000_1, "fallback");
        assert_eq!(above.status, MatchStatus::Answered);
        assert_eq!(above.answer, "A");
    }

    #[tokio::test]
    async fn test_answer_confident() {
        let (matcher, index) = hours_fixture();
        let result = matcher.answer("When are you open?", Some(&index)).await.unwrap();

        assert!(result.is_answered());
        assert_eq!(result.answer, "9am-5pm");
        assert_eq!(result.matched_question, "What are your hours?");
        assert!((result.confidence - 0.71).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_answer_defers_with_best_guess() {
        let (matcher, index) = hours_fixture();
        let result = matcher.answer("What is the weather?", Some(&index)).await.unwrap();

        assert_eq!(result.status, MatchStatus::Deferred);
        assert_eq!(result.answer, "Please call us.");
        assert_eq!(result.matched_question, "What are your hours?");
        assert!((result.confidence - 0.12).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_answer_trims_query() {
        let (matcher, index) = hours_fixture();
        let result = matcher
            .answer("  When are you open?\n", Some(&index))
            .await
            .unwrap();
        assert!(result.is_answered());
    }

    #[tokio::test]
    async fn test_answer_empty_query() {
        let (matcher, index) = hours_fixture();
        let result = matcher.answer("   ", Some(&index)).await;
        assert!(matches!(result, Err(FaqError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_answer_without_index() {
        let (matcher, _index) = hours_fixture();
        let result = matcher.answer("When are you open?", None).await;
        assert!(matches!(result, Err(FaqError::NotReady)));
    }

    #[tokio::test]
    async fn test_answer_tie_picks_earlier_record() {
        let embedder = FixedEmbedding::new(HashMap::from([("q".to_string(), vec![1.0, 0.0])]));
        let index = EmbeddingIndex::from_parts(
            vec![record(7, "first", "A1"), record(3, "second", "A2")],
            vec![vec![0.9, 0.1], vec![0.9, 0.1]],
        )
        .unwrap();
        let matcher = QueryMatcher::new(Arc::new(embedder), DEFAULT_FALLBACK_MESSAGE);

        let result = matcher.answer("q", Some(&index)).await.unwrap();
        assert_eq!(result.matched_question, "first");
        assert_eq!(result.record_id, 7);
    }

    #[test]
    fn test_serialized_shape() {
        let result = MatchResult::decide(&record(1, "What are your hours?", "9am-5pm"), 0.71, "x");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "answer": "9am-5pm",
                "matched_question": "What are your hours?",
                "confidence": 0.71f32
            })
        );
    }
}
