//! CLI 모듈
//!
//! faq-match CLI 명령어 정의 및 구현. 설정은 환경변수(`DB_PATH`, `FAQ_PATH`,
//! `SENTENCE_MODEL` 등) 또는 전역 옵션으로 받습니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::embedding::{create_embedder, has_api_key, is_gemini_model, DEFAULT_MODEL};
use crate::error::FaqError;
use crate::knowledge::{
    ingest_directory, ingest_file, list_corpus_files, FaqService, FaqStore, IngestReport,
    MatchStatus, DEFAULT_DB_PATH, DEFAULT_FALLBACK_MESSAGE, DEFAULT_FAQ_PATH,
};
use crate::server::{serve, ServeConfig, DEFAULT_BIND};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "faq-match")]
#[command(version, about = "시맨틱 FAQ 매칭 서버", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

/// 공통 설정 (환경변수 우선 적용)
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// FAQ SQLite DB 경로
    #[arg(long, global = true, env = "DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// FAQ 텍스트 파일 폴더
    #[arg(long, global = true, env = "FAQ_PATH", default_value = DEFAULT_FAQ_PATH)]
    pub faq_path: PathBuf,

    /// 문장 임베딩 모델
    #[arg(long = "model", global = true, env = "SENTENCE_MODEL", default_value = DEFAULT_MODEL)]
    pub sentence_model: String,

    /// 신뢰도 미달 시 안내 문구
    #[arg(
        long,
        global = true,
        env = "FAQ_FALLBACK_MESSAGE",
        default_value = DEFAULT_FALLBACK_MESSAGE
    )]
    pub fallback_message: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행
    Serve {
        /// 바인드 주소 (host:port)
        #[arg(long, env = "FAQ_BIND", default_value = DEFAULT_BIND)]
        bind: String,

        /// 허용 CORS Origin (쉼표 구분, 미지정 시 전체 허용)
        #[arg(long, env = "FAQ_CORS_ORIGINS")]
        cors_origins: Option<String>,
    },

    /// FAQ 텍스트 파일을 DB에 적재
    Ingest {
        /// 단일 파일만 적재 (미지정 시 FAQ_PATH 폴더 전체)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// 질의 1회 실행
    Ask {
        /// 질문
        query: String,
    },

    /// 저장된 FAQ 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// FAQ 삭제
    Delete {
        /// 삭제할 FAQ ID
        #[arg(long)]
        id: i64,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings;
    match cli.command {
        Commands::Serve { bind, cors_origins } => {
            serve(ServeConfig {
                bind,
                db_path: settings.db_path,
                model: settings.sentence_model,
                fallback_message: settings.fallback_message,
                cors_origins,
            })
            .await
        }
        Commands::Ingest { file } => cmd_ingest(&settings, file),
        Commands::Ask { query } => cmd_ask(&settings, &query).await,
        Commands::List { limit } => cmd_list(&settings, limit),
        Commands::Delete { id } => cmd_delete(&settings, id),
        Commands::Status => cmd_status(&settings),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 적재 명령어 (ingest)
fn cmd_ingest(settings: &Settings, file: Option<PathBuf>) -> Result<()> {
    let report = if let Some(ref path) = file {
        let store = open_store(settings)?;
        ingest_file(&store, path)?
    } else {
        let files = list_corpus_files(&settings.faq_path)?;
        if files.is_empty() {
            bail!(
                "처리할 파일이 없습니다. FAQ_PATH를 확인하세요: {}",
                settings.faq_path.display()
            );
        }
        println!("[*] 수집 대상: {} 파일", files.len());

        let store = open_store(settings)?;
        ingest_directory(&store, &settings.faq_path)?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!();
    println!(
        "[OK] {} 개 FAQ 저장 완료 (파일 {} 개 처리, {} 개 건너뜀)",
        report.inserted, report.files_processed, report.files_skipped
    );
    if report.skipped_entries > 0 || report.malformed_lines > 0 {
        println!(
            "     불완전한 엔트리 {} 개, 형식 오류 라인 {} 개 무시",
            report.skipped_entries, report.malformed_lines
        );
    }
}

/// 질의 명령어 (ask)
async fn cmd_ask(settings: &Settings, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        bail!(FaqError::EmptyQuery);
    }

    let store = open_store(settings)?;
    let model = settings.sentence_model.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedder(&model))
        .await
        .context("Model loading task panicked")??;

    let service = match FaqService::load(&store, embedder, settings.fallback_message.clone()).await
    {
        Ok(service) => service,
        Err(FaqError::EmptyCorpus) => {
            bail!("저장된 FAQ가 없습니다. 먼저 `faq-match ingest`를 실행하세요.")
        }
        Err(e) => return Err(e).context("FAQ 인덱스 생성 실패"),
    };

    let result = service.answer(query).await?;

    let label = match result.status {
        MatchStatus::Answered => "[OK]",
        MatchStatus::Deferred => "[?]",
    };
    println!("{} {}", label, result.answer);
    println!(
        "     매칭 질문: {} (FAQ #{})",
        result.matched_question, result.record_id
    );
    println!("     신뢰도: {:.4}", result.confidence);

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(settings: &Settings, limit: usize) -> Result<()> {
    let store = open_store(settings)?;
    let records = store.get_all().context("FAQ 목록 조회 실패")?;

    if records.is_empty() {
        println!("[!] 저장된 FAQ가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 FAQ ({} 건):\n", records.len());

    for record in records.iter().take(limit) {
        println!("  #{:<4} {}", record.id, truncate_text(&record.question, 60));
        println!("        {}", truncate_text(&record.answer, 80));
        if !record.keywords.is_empty() {
            println!("        키워드: {}", record.keywords.join(", "));
        }
        if !record.reference.is_empty() {
            println!("        출처: {}", record.reference);
        }
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
fn cmd_delete(settings: &Settings, id: i64) -> Result<()> {
    let store = open_store(settings)?;

    if store.get(id).context("FAQ 조회 실패")?.is_none() {
        bail!("ID {}인 FAQ를 찾을 수 없습니다", id);
    }

    store.delete(id).context("FAQ 삭제 실패")?;
    println!("[OK] FAQ #{} 삭제됨", id);
    println!("     (실행 중인 서버에는 재시작 후 반영됩니다)");

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(settings: &Settings) -> Result<()> {
    println!("faq-match v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] DB: {}", settings.db_path.display());
    println!("[*] FAQ 폴더: {}", settings.faq_path.display());
    println!("[*] 임베딩 모델: {}", settings.sentence_model);
    if is_gemini_model(&settings.sentence_model) && !has_api_key() {
        println!("[!] GEMINI_API_KEY 또는 GOOGLE_AI_API_KEY가 설정되지 않았습니다.");
    }

    match open_store(settings).and_then(|store| store.stats()) {
        Ok(stats) => {
            println!("[OK] 저장된 FAQ: {} 건", stats.record_count);
            println!(
                "     총 답변 크기: {}",
                format_bytes(stats.total_answer_bytes)
            );
        }
        Err(e) => {
            println!("[!] 저장소 열기 실패: {:#}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn open_store(settings: &Settings) -> Result<FaqStore> {
    FaqStore::open(&settings.db_path).context("FaqStore 열기 실패")
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("9am-5pm\nSaturday", 20), "9am-5pm Saturday");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["faq-match", "status"]).unwrap();
        assert_eq!(cli.settings.sentence_model, DEFAULT_MODEL);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "faq-match",
            "ask",
            "When are you open?",
            "--db-path",
            "/tmp/other.db",
        ])
        .unwrap();
        assert_eq!(cli.settings.db_path, PathBuf::from("/tmp/other.db"));
        assert!(matches!(cli.command, Commands::Ask { ref query } if query == "When are you open?"));
    }
}
