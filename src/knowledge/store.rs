//! FAQ Store - rusqlite 기반 동기 레코드 저장소
//!
//! FAQ 레코드(질문/답변/키워드/출처)를 저장하고 전체를 읽어옵니다.
//! 기본 위치: `./faq_data.db` (`DB_PATH`로 변경)

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};

use super::parser::split_keywords;

/// 기본 DB 파일 경로
pub const DEFAULT_DB_PATH: &str = "faq_data.db";

// ============================================================================
// Types
// ============================================================================

/// 저장된 FAQ 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqRecord {
    /// 자동 증가 ID (불투명, 연속 보장 없음)
    pub id: i64,
    pub question: String,
    pub answer: String,
    /// 정보용 태그 (매칭에는 사용하지 않음)
    pub keywords: Vec<String>,
    /// 출처 (없으면 빈 문자열)
    pub reference: String,
}

/// 새 FAQ 입력용 구조체
#[derive(Debug, Clone, PartialEq)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
    pub keywords: Vec<String>,
    pub reference: Option<String>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub record_count: usize,
    pub total_answer_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// FaqStore
// ============================================================================

/// FAQ 레코드 저장소
pub struct FaqStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl FaqStore {
    /// 저장소 열기 (없으면 생성, 스키마 보장)
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.create_schema_if_absent()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 생성 (멱등)
    pub fn create_schema_if_absent(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS faq (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                keywords TEXT,
                reference TEXT
            )",
            [],
        )
        .context("Failed to create faq table")?;

        tracing::debug!("FAQ store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 레코드 추가, 새 ID 반환
    pub fn insert(&self, faq: &NewFaq) -> Result<i64> {
        let conn = self.lock()?;
        let keywords = faq.keywords.join(", ");

        conn.execute(
            "INSERT INTO faq (question, answer, keywords, reference)
             VALUES (?1, ?2, ?3, ?4)",
            params![faq.question, faq.answer, keywords, faq.reference],
        )
        .context("Failed to insert FAQ")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Inserted FAQ id={}", id);

        Ok(id)
    }

    /// 전체 레코드 (ID 오름차순)
    pub fn get_all(&self) -> Result<Vec<FaqRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, question, answer, keywords, reference FROM faq ORDER BY id",
        )?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read FAQ rows")?;

        Ok(records)
    }

    /// ID로 조회
    pub fn get(&self, id: i64) -> Result<Option<FaqRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, question, answer, keywords, reference FROM faq WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], row_to_record)?;
        let record = rows.next().transpose().context("Failed to read FAQ row")?;
        Ok(record)
    }

    /// 레코드 삭제
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM faq WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// 레코드 수
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM faq", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let (count, total_size): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(answer)), 0) FROM faq",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            record_count: count as usize,
            total_answer_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FaqRecord> {
    let keywords: Option<String> = row.get(3)?;
    let reference: Option<String> = row.get(4)?;

    Ok(FaqRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        keywords: keywords.as_deref().map(split_keywords).unwrap_or_default(),
        reference: reference.unwrap_or_default(),
    })
}

// ============================================================================
// Tests
// ============================================================================
