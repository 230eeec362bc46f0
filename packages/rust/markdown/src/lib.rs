//! Markdown serialization for records and index entries.
//!
//! Everything here is pure: callers own the filesystem. Record bodies are
//! emitted verbatim; only the optional title heading is generated.

use tracing::{debug, instrument};

use c2md_shared::Record;

/// Deepest heading level Markdown supports.
pub const MAX_HEADING_LEVEL: usize = 6;

// ---------------------------------------------------------------------------
// Record rendering
// ---------------------------------------------------------------------------

/// Render one record to the exact text persisted on disk.
///
/// With a title: `# <title>`, a blank line, then the body. Without one the
/// body is returned unchanged.
#[instrument(skip_all, fields(source = %record.source))]
pub fn render_record(record: &Record) -> String {
    let rendered = match record.display_title() {
        Some(title) => format!("{}\n\n{}", heading(1, title), record.content),
        None => record.content.clone(),
    };

    debug!(bytes = rendered.len(), "record rendered");
    rendered
}

/// Render a record to bytes, ready for writing.
pub fn render_record_bytes(record: &Record) -> Vec<u8> {
    render_record(record).into_bytes()
}

// ---------------------------------------------------------------------------
// Inline helpers
// ---------------------------------------------------------------------------

/// A single ATX heading line. `level` is clamped to `1..=6` and the text is
/// folded onto one line.
pub fn heading(level: usize, text: &str) -> String {
    let level = level.clamp(1, MAX_HEADING_LEVEL);
    format!("{} {}", "#".repeat(level), single_line(text))
}

/// A bullet list item linking `text` to `target`.
pub fn link_item(text: &str, target: &str) -> String {
    format!("- [{}]({})", escape_link_text(text), escape_link_target(target))
}

/// Escape characters that would end or nest link text.
pub fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in single_line(text).chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Percent-encode the few characters that break an inline link target.
fn escape_link_target(target: &str) -> String {
    target
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

/// Collapse line breaks and runs of whitespace into single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: Option<&str>, content: &str) -> Record {
        Record {
            source: "https://example.com/docs/a".into(),
            title: title.map(String::from),
            content: content.into(),
            line: 1,
        }
    }

    #[test]
    fn titled_record_gets_heading_and_blank_line() {
        let out = render_record(&record(Some("Getting Started"), "# A\nbody"));
        assert_eq!(out, "# Getting Started\n\n# A\nbody");
    }

    #[test]
    fn untitled_record_is_verbatim() {
        let body = "  indented\n\n```\n---\n```\n\\*not emphasis\\*";
        assert_eq!(render_record(&record(None, body)), body);
    }

    #[test]
    fn blank_title_counts_as_absent() {
        assert_eq!(render_record(&record(Some("   "), "body")), "body");
    }

    #[test]
    fn empty_body_with_title() {
        assert_eq!(render_record(&record(Some("T"), "")), "# T\n\n");
    }

    #[test]
    fn render_is_deterministic() {
        let r = record(Some("Same"), "content\r\nwith crlf");
        assert_eq!(render_record_bytes(&r), render_record_bytes(&r));
        assert!(render_record(&r).ends_with("content\r\nwith crlf"));
    }

    #[test]
    fn heading_levels_are_clamped() {
        assert_eq!(heading(0, "root"), "# root");
        assert_eq!(heading(3, "a/b/"), "### a/b/");
        assert_eq!(heading(9, "deep"), "###### deep");
        assert_eq!(heading(2, "multi\nline   title"), "## multi line title");
    }

    #[test]
    fn link_items_escape_brackets() {
        assert_eq!(link_item("A [beta]", "docs/a.md"), "- [A \\[beta\\]](docs/a.md)");
        assert_eq!(link_item("x", "a (1).md"), "- [x](a%20%281%29.md)");
    }
}
