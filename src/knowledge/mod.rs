//! Knowledge 모듈 - 시맨틱 FAQ 검색 엔진
//!
//! - Parser: `Question Id:` 블록 텍스트 → FAQ 초안
//! - Store: SQLite FAQ 레코드 저장소
//! - Index: 질문 임베딩 인덱스 (시작 시 1회 빌드)
//! - Matcher: 코사인 유사도 + 신뢰도 임계값
//! - Service: 요청 핸들러에 주입되는 서비스 컨텍스트

mod index;
mod ingest;
mod matcher;
mod parser;
mod service;
mod store;

// Re-exports
pub use index::EmbeddingIndex;
pub use ingest::{
    ingest_directory, ingest_file, list_corpus_files, IngestReport, DEFAULT_FAQ_PATH,
};
pub use matcher::{
    best_match, cosine_similarity, MatchResult, MatchStatus, QueryMatcher,
    DEFAULT_FALLBACK_MESSAGE, SIMILARITY_THRESHOLD,
};
pub use parser::{classify_line, split_keywords, CorpusParser, FaqDraft, LineKind, ParsedCorpus};
pub use service::FaqService;
pub use store::{FaqRecord, FaqStore, NewFaq, StoreStats, DEFAULT_DB_PATH};
