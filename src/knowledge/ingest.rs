//! 코퍼스 수집 - FAQ 텍스트 파일을 파싱해 저장소에 적재
//!
//! `FAQ_PATH` 폴더 바로 아래의 파일을 이름 순으로 처리합니다.
//! 읽을 수 없는 파일, 형식 오류 라인, 불완전한 엔트리는 건너뛰고 계속합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use super::parser::CorpusParser;
use super::store::FaqStore;

/// 기본 수집 폴더
pub const DEFAULT_FAQ_PATH: &str = "faq_data";

/// 수집 결과 집계
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub inserted: usize,
    pub skipped_entries: usize,
    pub malformed_lines: usize,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.files_processed += other.files_processed;
        self.files_skipped += other.files_skipped;
        self.inserted += other.inserted;
        self.skipped_entries += other.skipped_entries;
        self.malformed_lines += other.malformed_lines;
    }
}

/// 폴더 바로 아래의 일반 파일 목록 (이름 순)
pub fn list_corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("FAQ directory not found: {:?}", dir);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// 파일 하나 적재
///
/// 파일을 읽지 못하면 에러 (폴더 단위 수집에서는 건너뜀).
pub fn ingest_file(store: &FaqStore, path: &Path) -> Result<IngestReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read FAQ file: {:?}", path))?;

    tracing::info!("Processing file: {}", path.display());
    let parsed = CorpusParser::new().parse(&content);

    let mut report = IngestReport {
        files_processed: 1,
        skipped_entries: parsed.skipped_entries(),
        malformed_lines: parsed.malformed_lines(),
        ..Default::default()
    };

    if parsed.entries.is_empty() {
        tracing::warn!("No valid entries found in {}", path.display());
        return Ok(report);
    }

    for draft in parsed.entries {
        let id = draft.id.clone();
        match store.insert(&draft.into_new_faq()) {
            Ok(_) => report.inserted += 1,
            Err(e) => {
                tracing::warn!("Failed to insert entry {}: {:#}", id, e);
                report.skipped_entries += 1;
            }
        }
    }

    Ok(report)
}

/// 폴더 전체 적재
pub fn ingest_directory(store: &FaqStore, dir: &Path) -> Result<IngestReport> {
    let files = list_corpus_files(dir)?;
    if files.is_empty() {
        anyhow::bail!("No files found to process in {:?}", dir);
    }

    let mut report = IngestReport::default();
    for path in &files {
        match ingest_file(store, path) {
            Ok(file_report) => report.merge(file_report),
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", path.display(), e);
                report.files_skipped += 1;
            }
        }
    }

    tracing::info!(
        "Inserted {} FAQs from {} files ({} skipped entries, {} skipped files)",
        report.inserted,
        report.files_processed,
        report.skipped_entries,
        report.files_skipped
    );
    Ok(report)
}
