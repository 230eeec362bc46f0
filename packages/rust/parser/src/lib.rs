//! Tagged export parser.
//!
//! Splits a flat export into [`Record`]s. The format is line oriented:
//! - A line of three or more hyphens separates records
//! - `SOURCE: <locator>` opens a record (required)
//! - `TITLE: <text>` may follow (optional)
//! - `CONTENT:` starts the body, which runs verbatim to the next separator
//!
//! Keys are case-insensitive. Parsing is best-effort: a malformed record is
//! reported and skipped, and scanning resumes at the next separator.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use c2md_shared::{C2mdError, Record, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of parsing one export: the good records plus one error per bad record.
#[derive(Debug, Default)]
pub struct ParseReport {
    /// Records in input order.
    pub records: Vec<Record>,
    /// One [`C2mdError::MalformedRecord`] per rejected record, in input order.
    pub errors: Vec<C2mdError>,
}

impl ParseReport {
    /// Whether every record in the input parsed cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scanner states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between records, waiting for `SOURCE:`.
    ScanningForSource,
    /// `SOURCE:` seen.
    HaveSource,
    /// `TITLE:` seen after `SOURCE:`.
    HaveTitle,
    /// Inside the body.
    InContent,
    /// Recovering from a malformed record until the next separator.
    Skipping,
}

/// Classification of one input line, computed outside the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Delimiter,
    Source(&'a str),
    Title(&'a str),
    Content(&'a str),
    Text,
}

/// What the scanner does on a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action<'a> {
    /// Nothing to record.
    None,
    /// Start a new record with this locator.
    Begin(&'a str),
    /// Store the title.
    SetTitle(&'a str),
    /// Open the body, seeding it with any inline text.
    OpenContent(&'a str),
    /// Append the raw line to the body.
    AppendContent,
    /// Finish the current record.
    Emit,
    /// Reject the current record with this message.
    Reject(&'static str),
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches a separator line: three or more hyphens, nothing else.
static DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3,}\s*$").expect("delimiter regex"));

/// Matches `SOURCE:`, `TITLE:` or `CONTENT:` at the start of a line.
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(source|title|content)\s*:(.*)$").expect("field regex")
});

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if DELIMITER_RE.is_match(line) {
        return LineKind::Delimiter;
    }
    if let Some(caps) = FIELD_RE.captures(line) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            return LineKind::Text;
        };
        let value = value.as_str();
        return match key.as_str().to_ascii_lowercase().as_str() {
            "source" => LineKind::Source(value),
            "title" => LineKind::Title(value),
            _ => LineKind::Content(value),
        };
    }
    LineKind::Text
}

/// The scanner's transition table.
fn transition(state: State, line: LineKind<'_>) -> (State, Action<'_>) {
    use LineKind as L;
    use State as S;

    match (state, line) {
        // Body: only a separator ends it.
        (S::InContent, L::Delimiter) => (S::ScanningForSource, Action::Emit),
        (S::InContent, _) => (S::InContent, Action::AppendContent),

        // Recovery: wait for the next separator.
        (S::Skipping, L::Delimiter) => (S::ScanningForSource, Action::None),
        (S::Skipping, _) => (S::Skipping, Action::None),

        (_, L::Blank) => (state, Action::None),

        (S::ScanningForSource, L::Delimiter) => (S::ScanningForSource, Action::None),
        (S::ScanningForSource, L::Source(value)) => (S::HaveSource, Action::Begin(value)),
        (S::ScanningForSource, _) => (S::Skipping, Action::Reject("missing SOURCE: field")),

        (S::HaveSource, L::Title(value)) => (S::HaveTitle, Action::SetTitle(value)),
        (S::HaveSource | S::HaveTitle, L::Content(value)) => {
            (S::InContent, Action::OpenContent(value))
        }
        (S::HaveSource | S::HaveTitle, L::Delimiter) => {
            (S::ScanningForSource, Action::Reject("missing CONTENT: field"))
        }
        (S::HaveSource | S::HaveTitle, L::Source(_)) => {
            (S::Skipping, Action::Reject("SOURCE: given more than once"))
        }
        (S::HaveTitle, L::Title(_)) => {
            (S::Skipping, Action::Reject("TITLE: given more than once"))
        }
        (S::HaveSource | S::HaveTitle, L::Text) => {
            (S::Skipping, Action::Reject("unexpected text before CONTENT:"))
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Record under construction.
#[derive(Debug, Default)]
struct Draft {
    line: usize,
    source: String,
    title: Option<String>,
    content: Vec<String>,
}

impl Draft {
    fn finish(self) -> Record {
        let start = self
            .content
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(self.content.len());
        let end = self
            .content
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(start, |i| i + 1);

        Record {
            source: self.source,
            title: self.title,
            content: self.content[start..end.max(start)].join("\n"),
            line: self.line,
        }
    }
}

/// Parse an export into records, collecting one error per malformed record.
///
/// Empty or whitespace-only input yields an empty report.
#[instrument(skip_all, fields(bytes = input.len()))]
pub fn parse_export(input: &str) -> ParseReport {
    let mut report = ParseReport::default();
    if input.trim().is_empty() {
        return report;
    }

    let mut state = State::ScanningForSource;
    let mut draft: Option<Draft> = None;
    // Line where the current (possibly sourceless) record began.
    let mut record_start = 1;

    for (idx, raw) in input.lines().enumerate() {
        let lineno = idx + 1;
        let kind = if state == State::InContent && !DELIMITER_RE.is_match(raw) {
            LineKind::Text
        } else {
            classify(raw)
        };

        if state == State::ScanningForSource && kind != LineKind::Blank {
            record_start = lineno;
        }

        let (next, action) = transition(state, kind);
        match action {
            Action::None => {}
            Action::Begin(value) => {
                let source = value.trim();
                if source.is_empty() {
                    reject(&mut report, record_start, "empty SOURCE: value");
                    state = State::Skipping;
                    continue;
                }
                draft = Some(Draft {
                    line: lineno,
                    source: source.to_string(),
                    ..Draft::default()
                });
            }
            Action::SetTitle(value) => {
                if let Some(d) = draft.as_mut() {
                    let title = value.trim();
                    d.title = (!title.is_empty()).then(|| title.to_string());
                }
            }
            Action::OpenContent(value) => {
                if let Some(d) = draft.as_mut() {
                    let inline = value.trim_start();
                    if !inline.is_empty() {
                        d.content.push(inline.to_string());
                    }
                }
            }
            Action::AppendContent => {
                if let Some(d) = draft.as_mut() {
                    d.content.push(raw.to_string());
                }
            }
            Action::Emit => {
                if let Some(d) = draft.take() {
                    emit(&mut report, d);
                }
            }
            Action::Reject(message) => {
                draft = None;
                reject(&mut report, record_start, message);
            }
        }
        state = next;
    }

    // End of input: accepted only from inside a body.
    match state {
        State::InContent => {
            if let Some(d) = draft.take() {
                emit(&mut report, d);
            }
        }
        State::HaveSource | State::HaveTitle => {
            reject(&mut report, record_start, "missing CONTENT: field");
        }
        State::ScanningForSource | State::Skipping => {}
    }

    debug!(
        records = report.records.len(),
        errors = report.errors.len(),
        "export parsed"
    );
    report
}

/// Parse an export, failing on the first malformed record.
pub fn parse_export_strict(input: &str) -> Result<Vec<Record>> {
    let mut report = parse_export(input);
    if report.errors.is_empty() {
        Ok(report.records)
    } else {
        Err(report.errors.swap_remove(0))
    }
}

fn emit(report: &mut ParseReport, draft: Draft) {
    let record = draft.finish();
    debug!(line = record.line, source = %record.source, "record parsed");
    report.records.push(record);
}

fn reject(report: &mut ParseReport, line: usize, message: &str) {
    warn!(line, message, "skipping malformed record");
    report.errors.push(C2mdError::malformed(line, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed_line(err: &C2mdError) -> usize {
        match err {
            C2mdError::MalformedRecord { line, .. } => *line,
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn parse_sample_fixture() {
        let content = std::fs::read_to_string("../../../fixtures/exports/sample.txt")
            .expect("read fixture");
        let report = parse_export(&content);

        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.records.len(), 4);
        assert_eq!(report.records[0].source, "https://docs.example.com/guide/install");
        assert_eq!(report.records[0].title.as_deref(), Some("Installation"));
        assert_eq!(report.records[3].source, "release-notes");
        assert!(report.records[3].title.is_none());
    }

    #[test]
    fn parse_two_records_from_readme_example() {
        let input = "SOURCE: https://example.com/docs/a\nTITLE: A\nCONTENT: # A\nbody\n---\nSOURCE: https://example.com/docs/a\nTITLE: A2\nCONTENT: other";
        let records = parse_export_strict(input).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "# A\nbody");
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].title.as_deref(), Some("A2"));
        assert_eq!(records[1].content, "other");
        assert_eq!(records[1].line, 5);
    }

    #[test]
    fn content_preserves_blank_lines_and_markdown() {
        let input = "SOURCE: x\nCONTENT:\n\n```rust\nfn main() {\n\n    println!(\"hi\");\n}\n```\n\n> quote  \n\n";
        let records = parse_export_strict(input).unwrap();
        assert_eq!(
            records[0].content,
            "```rust\nfn main() {\n\n    println!(\"hi\");\n}\n```\n\n> quote  "
        );
    }

    #[test]
    fn field_keys_inside_content_are_body_text() {
        let input = "SOURCE: x\nCONTENT:\nsource: not a key\nTITLE: neither\n";
        let records = parse_export_strict(input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "source: not a key\nTITLE: neither");
    }

    #[test]
    fn keys_are_case_insensitive_and_values_trimmed() {
        let input = "source:   https://example.com/x   \ntitle:  Case Test  \ncontent:\nbody";
        let records = parse_export_strict(input).unwrap();
        assert_eq!(records[0].source, "https://example.com/x");
        assert_eq!(records[0].title.as_deref(), Some("Case Test"));
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert!(parse_export("").records.is_empty());
        let report = parse_export("  \n\n \t\n");
        assert!(report.records.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn only_delimiters_yield_nothing() {
        let report = parse_export("---\n\n-----\n   \n----------------------------------------\n");
        assert!(report.records.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn missing_source_reports_start_line_and_continues() {
        let input = "SOURCE: a\nCONTENT: one\n---\n\nTITLE: orphan\nCONTENT: lost\n---\nSOURCE: b\nCONTENT: two\n";
        let report = parse_export(input);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].source, "a");
        assert_eq!(report.records[1].source, "b");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(malformed_line(&report.errors[0]), 5);
        assert!(report.errors[0].to_string().contains("missing SOURCE:"));
    }

    #[test]
    fn missing_content_is_malformed() {
        let report = parse_export("SOURCE: a\nTITLE: t\n---\nSOURCE: b\nCONTENT: ok");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].source, "b");
        assert_eq!(malformed_line(&report.errors[0]), 1);

        let report = parse_export("SOURCE: tail-without-body\n");
        assert!(report.records.is_empty());
        assert!(report.errors[0].to_string().contains("missing CONTENT:"));
    }

    #[test]
    fn repeated_fields_are_malformed() {
        let input = "\
SOURCE: a
SOURCE: b
CONTENT: x
---
SOURCE: c
TITLE: 1
TITLE: 2
CONTENT: y
";
        let report = parse_export(input);
        assert!(report.records.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(malformed_line(&report.errors[0]), 1);
        assert_eq!(malformed_line(&report.errors[1]), 5);
    }

    #[test]
    fn title_after_content_keyword_order_is_enforced() {
        let report = parse_export("TITLE: first\nSOURCE: a\nCONTENT: x");
        assert!(report.records.is_empty());
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn empty_source_value_is_malformed() {
        let report = parse_export("SOURCE:   \nCONTENT: x\n---\nSOURCE: ok\nCONTENT: y");
        assert_eq!(report.records.len(), 1);
        assert!(report.errors[0].to_string().contains("empty SOURCE:"));
    }

    #[test]
    fn crlf_input_is_accepted() {
        let input = "SOURCE: a\r\nTITLE: T\r\nCONTENT:\r\nline one\r\nline two\r\n---\r\nSOURCE: b\r\nCONTENT: z\r\n";
        let records = parse_export_strict(input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "line one\nline two");
    }

    #[test]
    fn strict_parse_returns_first_error() {
        let err = parse_export_strict("CONTENT: x\n---\nTITLE: y\nCONTENT: z").unwrap_err();
        assert_eq!(malformed_line(&err), 1);
    }

    #[test]
    fn order_is_preserved() {
        let input: String = (0..25)
            .map(|i| format!("SOURCE: id-{i}\nCONTENT: body {i}\n"))
            .collect::<Vec<_>>()
            .join("---\n");
        let records = parse_export_strict(&input).unwrap();
        assert_eq!(records.len(), 25);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.source, format!("id-{i}"));
        }
    }
}
