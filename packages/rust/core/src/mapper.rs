//! Locator → relative path mapping.
//!
//! URL locators become `<host>/<path segments>/<stem>.md`; anything else is
//! an opaque identifier placed at the output root. Every component is
//! sanitized independently and never touches the filesystem.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use c2md_shared::{C2mdError, ConvertOptions, Record};

/// Stem used when a URL path is empty or ends in `/`.
const INDEX_STEM: &str = "index";

/// Prefix used when the configured one sanitizes to nothing.
const DEFAULT_FALLBACK_PREFIX: &str = "untitled";

/// Extension appended to every file stem.
const MARKDOWN_EXT: &str = ".md";

/// Runs of characters outside the portable filename set.
static UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("unsafe-char regex"));

/// Runs of two or more hyphens.
static HYPHEN_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("hyphen-run regex"));

/// A record paired with its sanitized relative location.
#[derive(Debug)]
pub struct PathMapping {
    /// The record being placed.
    pub record: Record,
    /// 1-based position of the record in the parsed sequence.
    pub ordinal: usize,
    /// Directory components below the output root (empty = root).
    pub segments: Vec<String>,
    /// File name including the `.md` extension.
    pub filename: String,
    /// Components that sanitized to nothing and took the fallback name.
    pub fallbacks: Vec<C2mdError>,
}

impl PathMapping {
    /// `/`-joined path relative to the output root.
    pub fn relative_path(&self) -> String {
        join_relative(&self.segments, &self.filename)
    }
}

/// Maps record locators to sanitized paths.
#[derive(Debug, Clone)]
pub struct PathMapper {
    fallback_prefix: String,
    max_component_len: usize,
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::from(&ConvertOptions::default())
    }
}

impl From<&ConvertOptions> for PathMapper {
    fn from(opts: &ConvertOptions) -> Self {
        Self {
            fallback_prefix: opts.fallback_prefix.clone(),
            max_component_len: opts.max_component_len,
        }
    }
}

impl PathMapper {
    /// Map every record, numbering them from 1 in input order.
    pub fn map_all(&self, records: Vec<Record>) -> Vec<PathMapping> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| self.map(record, i + 1))
            .collect()
    }

    /// Map one record. `ordinal` seeds the fallback name for unusable components.
    pub fn map(&self, record: Record, ordinal: usize) -> PathMapping {
        let (raw_dirs, raw_stem) = split_locator(&record.source);
        let mut fallbacks = Vec::new();

        let segments = raw_dirs
            .iter()
            .map(|raw| self.component(raw, ordinal, &mut fallbacks))
            .collect();

        let stem = self.component(&raw_stem, ordinal, &mut fallbacks);
        let filename = if stem.to_ascii_lowercase().ends_with(MARKDOWN_EXT) {
            stem
        } else {
            format!("{stem}{MARKDOWN_EXT}")
        };

        let mapping = PathMapping {
            record,
            ordinal,
            segments,
            filename,
            fallbacks,
        };
        debug!(
            ordinal,
            source = %mapping.record.source,
            path = %mapping.relative_path(),
            "locator mapped"
        );
        mapping
    }

    /// Sanitize one component, substituting the fallback name if nothing survives.
    fn component(&self, raw: &str, ordinal: usize, fallbacks: &mut Vec<C2mdError>) -> String {
        if let Some(clean) = sanitize_component(raw, self.max_component_len) {
            return clean;
        }
        let fallback = sanitize_component(
            &format!("{}-{ordinal}", self.fallback_prefix),
            self.max_component_len,
        )
        .unwrap_or_else(|| format!("{DEFAULT_FALLBACK_PREFIX}-{ordinal}"));
        warn!(component = raw, %fallback, "locator component unusable, substituting fallback");
        fallbacks.push(C2mdError::LocatorSanitization {
            component: raw.to_string(),
            fallback: fallback.clone(),
        });
        fallback
    }
}

/// Split a locator into raw directory components and a raw file stem.
///
/// Only absolute URLs with a host are decomposed. Scheme, port, query and
/// fragment are dropped.
fn split_locator(source: &str) -> (Vec<String>, String) {
    let source = source.trim();
    let url = match Url::parse(source) {
        Ok(url) if url.host_str().is_some() => url,
        _ => return (Vec::new(), source.to_string()),
    };

    let host = url.host_str().unwrap_or_default().to_string();
    let path = url.path();
    let mut parts: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();

    let stem = if path.ends_with('/') || parts.is_empty() {
        INDEX_STEM.to_string()
    } else {
        parts.pop().unwrap_or_else(|| INDEX_STEM.to_string())
    };

    let mut dirs = Vec::with_capacity(parts.len() + 1);
    dirs.push(host);
    dirs.extend(parts);
    (dirs, stem)
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Sanitize a single path component.
///
/// Trims whitespace, replaces anything outside `[A-Za-z0-9._-]` with `-`,
/// collapses hyphen runs, strips leading/trailing `-` and `.` (so `.` and
/// `..` cannot survive) and caps the length. Returns `None` if nothing is left.
pub fn sanitize_component(raw: &str, max_len: usize) -> Option<String> {
    let replaced = UNSAFE_RE.replace_all(raw.trim(), "-");
    let collapsed = HYPHEN_RUN_RE.replace_all(&replaced, "-");
    let mut clean = collapsed.trim_matches(['-', '.']).to_string();

    if clean.len() > max_len {
        // Only ASCII survives the replacement, so any byte index is a char boundary.
        clean.truncate(max_len);
        clean = clean.trim_end_matches(['-', '.']).to_string();
    }

    (!clean.is_empty()).then_some(clean)
}

/// Join directory components and a file name with `/`.
pub fn join_relative(segments: &[String], filename: &str) -> String {
    if segments.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{filename}", segments.join("/"))
    }
}
