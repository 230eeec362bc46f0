//! Core domain types for c2md conversions.

use serde::{Deserialize, Serialize};

/// Current schema version for the JSON run manifest.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One parsed unit of the export: a locator, an optional title, and a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The `SOURCE:` locator (URL or opaque identifier).
    pub source: String,
    /// The `TITLE:` text, if the record had a non-empty one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The body after `CONTENT:`, verbatim.
    pub content: String,
    /// 1-based line of the record's `SOURCE:` field in the input.
    pub line: usize,
}

impl Record {
    /// Title text if present and not blank.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// The optional JSON manifest written at the output root after a run.
///
/// Holds no timestamps, so identical input yields an identical file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Tool version that produced the output.
    pub tool_version: String,
    /// Number of records parsed from the input.
    pub records_parsed: usize,
    /// Written files, in input order.
    pub files: Vec<ManifestFile>,
}

/// A single written file in the [`RunManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the output root, `/`-separated.
    pub path: String,
    /// The record's locator.
    pub source: String,
    /// The record's title, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether a collision suffix was applied.
    #[serde(default)]
    pub renamed: bool,
    /// SHA-256 of the written bytes (lowercase hex).
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_ignores_blank() {
        let mut record = Record {
            source: "id".into(),
            title: Some("   ".into()),
            content: String::new(),
            line: 1,
        };
        assert_eq!(record.display_title(), None);

        record.title = Some("  Hooks  ".into());
        assert_eq!(record.display_title(), Some("Hooks"));
    }

    #[test]
    fn manifest_serialization() {
        let manifest = RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            tool_version: "0.1.0".into(),
            records_parsed: 1,
            files: vec![ManifestFile {
                path: "example.com/docs/a.md".into(),
                source: "https://example.com/docs/a".into(),
                title: None,
                renamed: false,
                sha256: "00".into(),
            }],
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        assert!(!json.contains("\"title\""));
        let parsed: RunManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.files[0].path, "example.com/docs/a.md");
    }
}
