//! 에러 타입 - FAQ 매칭 도메인 에러
//!
//! 요청 처리 계층이 상태 코드로 매핑할 수 있도록 닫힌 에러 집합을 정의합니다.
//! 애플리케이션 배관(CLI, 시작 시퀀스, 저장소 I/O)은 `anyhow`를 사용합니다.

use thiserror::Error;

/// FAQ 매칭 에러
#[derive(Debug, Error)]
pub enum FaqError {
    /// 인덱스 빌드 시점에 저장소가 비어 있음
    #[error("FAQ corpus is empty")]
    EmptyCorpus,

    /// 인덱스/모델 로드 전 질의
    #[error("Server not ready.")]
    NotReady,

    /// 공백 제거 후 빈 질의
    #[error("Query cannot be empty.")]
    EmptyQuery,

    /// 요청 본문에 `query` 필드 없음
    #[error("Missing 'query' field.")]
    MissingQueryField,

    /// 코퍼스 파싱 중 예상하지 못한 형태의 라인
    #[error("malformed corpus line {line_no}: {line}")]
    MalformedCorpusLine { line_no: usize, line: String },

    /// question 또는 answer가 빠진 엔트리
    #[error("incomplete entry (id: {id})")]
    IncompleteEntry { id: String },

    /// 임베딩 프로바이더 실패
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// 레코드 저장소 실패
    #[error("record store error: {0}")]
    Store(String),
}

impl FaqError {
    /// 클라이언트 입력 에러 여부 (400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, FaqError::EmptyQuery | FaqError::MissingQueryField)
    }

    /// 서비스 준비 안 됨 여부 (503)
    pub fn is_not_ready(&self) -> bool {
        matches!(self, FaqError::NotReady | FaqError::EmptyCorpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(FaqError::EmptyQuery.is_client_error());
        assert!(FaqError::MissingQueryField.is_client_error());
        assert!(!FaqError::NotReady.is_client_error());

        assert!(FaqError::NotReady.is_not_ready());
        assert!(FaqError::EmptyCorpus.is_not_ready());
        assert!(!FaqError::Embedding("boom".into()).is_not_ready());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(FaqError::NotReady.to_string(), "Server not ready.");
        let err = FaqError::MalformedCorpusLine {
            line_no: 3,
            line: "Answer 9am".to_string(),
        };
        assert_eq!(err.to_string(), "malformed corpus line 3: Answer 9am");
    }
}
