//! faq-match - 시맨틱 FAQ 매칭 서버
//!
//! 구조화된 텍스트 FAQ를 SQLite에 적재하고, 질문 임베딩의 코사인 유사도로
//! 자유 질의에 가장 가까운 FAQ를 찾아 답변합니다. 신뢰도가 임계값 이하이면
//! 안내 문구로 보류하되 가장 가까운 질문을 함께 돌려줍니다.

pub mod cli;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod server;

// Re-exports
pub use embedding::{
    create_embedder, EmbeddingProvider, GeminiEmbedding, LocalEmbedding, DEFAULT_MODEL,
};
pub use error::FaqError;
pub use knowledge::{
    CorpusParser, EmbeddingIndex, FaqDraft, FaqRecord, FaqService, FaqStore, IngestReport,
    MatchResult, MatchStatus, NewFaq, ParsedCorpus, QueryMatcher, SIMILARITY_THRESHOLD,
};
pub use server::{build_router, serve, AppState, Readiness, ServeConfig};
