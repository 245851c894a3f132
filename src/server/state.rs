//! 서비스 준비 상태 - 한 번만 기록되는 로드 결과
//!
//! 기록 전에는 "loading", 이후에는 읽기 전용이므로 질의 처리 경로에 락이 없습니다.

use std::sync::{Arc, OnceLock};

use crate::error::FaqError;
use crate::knowledge::FaqService;

/// 시작 시퀀스 결과
pub enum LoadState {
    Ready(Arc<FaqService>),
    /// 빈 코퍼스 등으로 질의를 받을 수 없음
    Unavailable(String),
}

/// 공유 준비 상태
#[derive(Clone, Default)]
pub struct Readiness {
    cell: Arc<OnceLock<LoadState>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// 서비스 준비 완료 기록 (이미 기록되어 있으면 false)
    pub fn set_ready(&self, service: Arc<FaqService>) -> bool {
        self.cell.set(LoadState::Ready(service)).is_ok()
    }

    /// 사용 불가 기록 (이미 기록되어 있으면 false)
    pub fn set_unavailable(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        tracing::warn!("Service unavailable: {}", reason);
        self.cell.set(LoadState::Unavailable(reason)).is_ok()
    }

    pub fn get(&self) -> Option<&LoadState> {
        self.cell.get()
    }

    /// 준비된 서비스 (아니면 `NotReady`)
    pub fn service(&self) -> Result<Arc<FaqService>, FaqError> {
        match self.cell.get() {
            Some(LoadState::Ready(service)) => Ok(Arc::clone(service)),
            _ => Err(FaqError::NotReady),
        }
    }

    pub fn status(&self) -> &'static str {
        match self.cell.get() {
            None => "loading",
            Some(LoadState::Ready(_)) => "ready",
            Some(LoadState::Unavailable(_)) => "unavailable",
        }
    }
}
