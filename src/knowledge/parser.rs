//! Corpus Parser - 구조화된 FAQ 텍스트 파서
//!
//! 라인 단위 `label: value` 형식의 텍스트를 FAQ 초안(draft) 목록으로 변환합니다.
//!
//! ```text
//! Question Id: 42
//! Question: What are your hours?
//! Answer: 9am-5pm
//! Saturday by appointment
//! Keywords: hours, schedule
//! ```
//!
//! 각 라인은 [`LineKind`]로 분류되고, 작은 상태 기계가
//! "답변 누적 중" 플래그를 들고 다니며 초안을 조립합니다.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::FaqError;

use super::store::NewFaq;

// ============================================================================
// Types
// ============================================================================

/// 조립 중인 FAQ 초안
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaqDraft {
    /// 원본 파일의 Question Id (불투명 식별자, 로그용)
    pub id: String,
    pub question: String,
    /// 여러 줄일 수 있음 (줄바꿈 보존)
    pub answer: String,
    pub context: String,
    pub reference: String,
    pub keywords: Vec<String>,
}

impl FaqDraft {
    /// question/answer 모두 비어 있지 않은지
    pub fn is_complete(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }

    /// 저장소 입력으로 변환
    pub fn into_new_faq(self) -> NewFaq {
        NewFaq {
            question: self.question,
            answer: self.answer,
            keywords: self.keywords,
            reference: if self.reference.is_empty() {
                None
            } else {
                Some(self.reference)
            },
        }
    }
}

/// 라인 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `Question Id: <v>` - 새 엔트리 시작
    NewEntry(&'a str),
    Question(&'a str),
    Answer(&'a str),
    Context(&'a str),
    References(&'a str),
    Keywords(&'a str),
    /// 라벨 없는 비어있지 않은 라인
    Continuation(&'a str),
    Blank,
    /// 라벨로 시작하지만 `:`가 없는 라인
    Unrecognized(&'a str),
}

/// 파싱 결과
#[derive(Debug, Default)]
pub struct ParsedCorpus {
    /// 유효한 초안 (문서 순서)
    pub entries: Vec<FaqDraft>,
    /// 건너뛴 라인/엔트리 내역
    pub issues: Vec<FaqError>,
}

impl ParsedCorpus {
    /// 불완전해서 버린 엔트리 수
    pub fn skipped_entries(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, FaqError::IncompleteEntry { .. }))
            .count()
    }

    /// 형식 오류로 무시한 라인 수
    pub fn malformed_lines(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, FaqError::MalformedCorpusLine { .. }))
            .count()
    }

    fn extend(&mut self, other: ParsedCorpus) {
        self.entries.extend(other.entries);
        self.issues.extend(other.issues);
    }
}

// ============================================================================
// Line Classification
// ============================================================================

fn label_regex() -> &'static Regex {
    static LABEL_RE: OnceLock<Regex> = OnceLock::new();
    LABEL_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(question\s*id|question|answer|context|references?|keywords?)\b\s*(:)?\s*(.*)$",
        )
        .expect("label pattern is valid")
    })
}

/// 한 줄을 분류 (앞뒤 공백 제거 후, 라벨은 대소문자 무시)
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }

    let Some(caps) = label_regex().captures(line) else {
        return LineKind::Continuation(line);
    };

    if caps.get(2).is_none() {
        return LineKind::Unrecognized(line);
    }

    let value = caps.get(3).map_or("", |m| m.as_str().trim());
    let label = caps
        .get(1)
        .map_or(String::new(), |m| m.as_str().to_ascii_lowercase());

    if label.starts_with("question") && label.ends_with("id") {
        LineKind::NewEntry(value)
    } else if label == "question" {
        LineKind::Question(value)
    } else if label == "answer" {
        LineKind::Answer(value)
    } else if label == "context" {
        LineKind::Context(value)
    } else if label.starts_with("reference") {
        LineKind::References(value)
    } else {
        LineKind::Keywords(value)
    }
}

/// 쉼표로 분리하고 항목별 공백 제거 (빈 항목은 버림)
pub fn split_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// CorpusParser
// ============================================================================

/// 파서 상태 (문서 하나 동안 유지)
#[derive(Default)]
struct ParserState {
    current: Option<FaqDraft>,
    in_answer: bool,
    drafts: Vec<FaqDraft>,
}

impl ParserState {
    fn draft(&mut self) -> &mut FaqDraft {
        self.current.get_or_insert_with(FaqDraft::default)
    }

    fn flush(&mut self) {
        if let Some(draft) = self.current.take() {
            self.drafts.push(draft);
        }
    }

    fn apply(&mut self, kind: LineKind<'_>) {
        match kind {
            LineKind::NewEntry(id) => {
                self.flush();
                self.current = Some(FaqDraft {
                    id: id.to_string(),
                    ..Default::default()
                });
                self.in_answer = false;
            }
            LineKind::Question(v) => {
                self.draft().question = v.to_string();
                self.in_answer = false;
            }
            LineKind::Answer(v) => {
                self.draft().answer = v.to_string();
                self.in_answer = true;
            }
            LineKind::Context(v) => {
                self.draft().context = v.to_string();
                self.in_answer = false;
            }
            LineKind::References(v) => {
                self.draft().reference = v.to_string();
                self.in_answer = false;
            }
            LineKind::Keywords(v) => {
                self.draft().keywords = split_keywords(v);
                self.in_answer = false;
            }
            LineKind::Continuation(line) => {
                if self.in_answer {
                    let answer = &mut self.draft().answer;
                    answer.push('\n');
                    answer.push_str(line);
                }
            }
            LineKind::Blank | LineKind::Unrecognized(_) => {}
        }
    }
}

/// FAQ 코퍼스 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct CorpusParser;

impl CorpusParser {
    pub fn new() -> Self {
        Self
    }

    /// 문서 하나 파싱
    pub fn parse(&self, text: &str) -> ParsedCorpus {
        let mut state = ParserState::default();
        let mut issues = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let kind = classify_line(raw);
            if let LineKind::Unrecognized(line) = kind {
                let err = FaqError::MalformedCorpusLine {
                    line_no: i + 1,
                    line: line.to_string(),
                };
                tracing::warn!("Skipping line: {}", err);
                issues.push(err);
                continue;
            }
            state.apply(kind);
        }
        state.flush();

        let mut entries = Vec::with_capacity(state.drafts.len());
        for draft in state.drafts {
            if draft.is_complete() {
                entries.push(draft);
            } else {
                let id = if draft.id.is_empty() {
                    "Unknown ID".to_string()
                } else {
                    draft.id
                };
                tracing::warn!("Skipping entry with missing question/answer: {}", id);
                issues.push(FaqError::IncompleteEntry { id });
            }
        }

        tracing::debug!(
            "Parsed {} entries ({} issues)",
            entries.len(),
            issues.len()
        );
        ParsedCorpus { entries, issues }
    }

    /// 여러 문서를 순서대로 파싱 (문서 경계에서 상태 초기화)
    pub fn parse_documents<'a, I>(&self, documents: I) -> ParsedCorpus
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all = ParsedCorpus::default();
        for doc in documents {
            all.extend(self.parse(doc));
        }
        all
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Question Id: 1
Question: What are your hours?
Answer: 9am-5pm

Keywords: hours, schedule
References: website

Question Id: 2
Question: Do you ship abroad?
Answer: Yes.
Context: shipping
";

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("Question Id: 7"), LineKind::NewEntry("7"));
        assert_eq!(classify_line("question id:7"), LineKind::NewEntry("7"));
        assert_eq!(classify_line("QUESTION: Hi?"), LineKind::Question("Hi?"));
        assert_eq!(classify_line("  Answer:  yes  "), LineKind::Answer("yes"));
        assert_eq!(classify_line("Context: c"), LineKind::Context("c"));
        assert_eq!(classify_line("References: r"), LineKind::References("r"));
        assert_eq!(classify_line("Reference: r"), LineKind::References("r"));
        assert_eq!(classify_line("Keyword: a"), LineKind::Keywords("a"));
        assert_eq!(classify_line("keywords: a, b"), LineKind::Keywords("a, b"));
        assert_eq!(classify_line("   "), LineKind::Blank);
        assert_eq!(classify_line("Call us: 555"), LineKind::Continuation("Call us: 555"));
        assert_eq!(classify_line("Answers vary"), LineKind::Continuation("Answers vary"));
        assert_eq!(classify_line("Answer 9am"), LineKind::Unrecognized("Answer 9am"));
    }

    #[test]
    fn test_parse_basic() {
        let parsed = CorpusParser::new().parse(SAMPLE);
        assert_eq!(parsed.entries.len(), 2);
        assert!(parsed.issues.is_empty());

        let first = &parsed.entries[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.question, "What are your hours?");
        assert_eq!(first.answer, "9am-5pm");
        assert_eq!(first.keywords, vec!["hours", "schedule"]);
        assert_eq!(first.reference, "website");

        let second = &parsed.entries[1];
        assert_eq!(second.context, "shipping");
        assert_eq!(second.reference, "");
        assert!(second.keywords.is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = CorpusParser::new();
        assert_eq!(parser.parse(SAMPLE).entries, parser.parse(SAMPLE).entries);
    }

    #[test]
    fn test_multiline_answer() {
        let text = "Question Id: 1\nQuestion: Q?\nAnswer: line one\nline two\n\nline three\nKeywords: k\nnot part of answer\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].answer, "line one\nline two\nline three");
    }

    #[test]
    fn test_continuation_outside_answer_ignored() {
        let text = "Question Id: 1\nstray text\nQuestion: Q?\nmore stray\nAnswer: A\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries[0].question, "Q?");
        assert_eq!(parsed.entries[0].answer, "A");
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_question_line_ends_answer_mode() {
        let text = "Question Id: 1\nAnswer: A\nQuestion: Q?\ntrailing\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries[0].answer, "A");
    }

    #[test]
    fn test_incomplete_entry_dropped_on_new_id() {
        let text = "Question Id: 1\nQuestion: only a question\nQuestion Id: 2\nQuestion: Q2?\nAnswer: A2\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].id, "2");
        assert_eq!(parsed.skipped_entries(), 1);
        assert!(matches!(
            &parsed.issues[0],
            FaqError::IncompleteEntry { id } if id == "1"
        ));
    }

    #[test]
    fn test_keywords_trimmed() {
        let text = "Question Id: 1\nQuestion: Q?\nAnswer: A\nKeywords: billing, invoices ,tax\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries[0].keywords, vec!["billing", "invoices", "tax"]);
    }

    #[test]
    fn test_malformed_line_keeps_draft() {
        let text = "Question Id: 1\nQuestion: Q?\nAnswer: A\nAnswer without colon\nmore answer\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].answer, "A\nmore answer");
        assert_eq!(parsed.malformed_lines(), 1);
        assert!(matches!(
            &parsed.issues[0],
            FaqError::MalformedCorpusLine { line_no: 4, .. }
        ));
    }

    #[test]
    fn test_entry_without_id() {
        let text = "Question: Q?\nAnswer: A\n";
        let parsed = CorpusParser::new().parse(text);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].id, "");
    }

    #[test]
    fn test_empty_document() {
        let parsed = CorpusParser::new().parse("\n\n   \n");
        assert!(parsed.entries.is_empty());
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_parse_documents_keeps_order_and_resets_state() {
        let a = "Question Id: a1\nQuestion: A1?\nAnswer: first";
        let b = "continued?\nQuestion Id: b1\nQuestion: B1?\nAnswer: second\n";
        let parsed = CorpusParser::new().parse_documents([a, b]);
        let ids: Vec<_> = parsed.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1"]);
        assert_eq!(parsed.entries[0].answer, "first");
    }

    #[test]
    fn test_into_new_faq() {
        let draft = FaqDraft {
            id: "1".into(),
            question: "Q".into(),
            answer: "A".into(),
            ..Default::default()
        };
        let faq = draft.into_new_faq();
        assert_eq!(faq.reference, None);
        assert!(faq.keywords.is_empty());
    }
}
