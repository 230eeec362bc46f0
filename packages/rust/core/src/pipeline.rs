//! End-to-end `convert` pipeline: export → parse → map → plan → write → index.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use c2md_markdown::render_record_bytes;
use c2md_shared::{
    C2mdError, CURRENT_SCHEMA_VERSION, ConvertOptions, ManifestFile, Result, RunManifest,
};

use crate::index::{IndexOptions, write_index};
use crate::mapper::PathMapper;
use crate::organizer::{Manifest, ManifestEntry, Organizer, materialize, write_atomic};

/// Result of one conversion run.
#[derive(Debug)]
pub struct ConvertReport {
    /// Number of records the parser accepted.
    pub records_parsed: usize,
    /// Entries actually written, in input order.
    pub written: Manifest,
    /// Path of the index document, if one was written.
    pub index_path: Option<PathBuf>,
    /// Path of the JSON run manifest, if one was written.
    pub manifest_path: Option<PathBuf>,
    /// Failures: malformed records, failed file writes, and a failed index
    /// or run-manifest write.
    pub errors: Vec<C2mdError>,
    /// Non-fatal diagnostics such as sanitization fallbacks.
    pub warnings: Vec<C2mdError>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl ConvertReport {
    /// True when no record failed at any stage.
    pub fn is_success(&self) -> bool {
        !self.errors.iter().any(C2mdError::is_record_failure)
    }

    /// Number of written files that carry a collision suffix.
    pub fn renamed_count(&self) -> usize {
        self.written.renamed_count()
    }

    /// The output root.
    pub fn output_dir(&self) -> &Path {
        &self.written.root
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each file is written.
    fn file_written(&self, path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &ConvertReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_written(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &ConvertReport) {}
}

/// Convert the export at `input`.
///
/// A missing, non-regular or unreadable input is fatal.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn convert_file(
    input: &Path,
    opts: &ConvertOptions,
    progress: &dyn ProgressReporter,
) -> Result<ConvertReport> {
    let meta = std::fs::metadata(input).map_err(|e| C2mdError::io(input, e))?;
    if !meta.is_file() {
        return Err(C2mdError::validation(format!(
            "input is not a regular file: {}",
            input.display()
        )));
    }

    progress.phase("Reading export");
    let text = std::fs::read_to_string(input).map_err(|e| C2mdError::io(input, e))?;
    convert_str(&text, opts, progress)
}

/// Convert export text already in memory.
///
/// 1. Validate options and create the output root
/// 2. Parse records
/// 3. Map locators to paths
/// 4. Resolve collisions into a manifest
/// 5. Write files
/// 6. Write the index and, if enabled, the JSON run manifest
#[instrument(skip_all, fields(output = %opts.output_dir.display()))]
pub fn convert_str(
    text: &str,
    opts: &ConvertOptions,
    progress: &dyn ProgressReporter,
) -> Result<ConvertReport> {
    let start = Instant::now();
    opts.validate()?;

    std::fs::create_dir_all(&opts.output_dir).map_err(|e| C2mdError::io(&opts.output_dir, e))?;
    let root = opts
        .output_dir
        .canonicalize()
        .map_err(|e| C2mdError::io(&opts.output_dir, e))?;

    // --- Phase 1: Parse ---
    progress.phase("Parsing records");
    let parsed = c2md_parser::parse_export(text);
    let records_parsed = parsed.records.len();
    let mut errors = parsed.errors;
    for e in &errors {
        warn!(error = %e, "malformed record skipped");
    }

    // --- Phase 2: Map ---
    progress.phase("Mapping locators");
    let mut mappings = PathMapper::from(opts).map_all(parsed.records);
    let mut warnings = Vec::new();
    for mapping in &mut mappings {
        warnings.append(&mut mapping.fallbacks);
    }

    // --- Phase 3: Plan + write ---
    progress.phase("Writing files");
    let manifest = Organizer::new(&root, opts).plan(mappings);
    let total = manifest.len();
    let outcome = materialize(manifest, |entry, current| {
        progress.file_written(&entry.relative_path(), current, total);
    });
    errors.extend(outcome.failures);
    let written = outcome.written;

    // --- Phase 4: Index ---
    let index_path = if opts.tree {
        progress.phase("Building index");
        let result = write_index(&written, &opts.index_filename, &IndexOptions::from(opts));
        collect_output(result, &mut errors, "index")
    } else {
        None
    };

    // --- Phase 5: Run manifest ---
    let manifest_path = if opts.write_manifest {
        progress.phase("Writing manifest");
        let result = write_run_manifest(&written, records_parsed, &opts.manifest_filename);
        collect_output(result, &mut errors, "run manifest")
    } else {
        None
    };

    let report = ConvertReport {
        records_parsed,
        written,
        index_path,
        manifest_path,
        errors,
        warnings,
        elapsed: start.elapsed(),
    };

    progress.done(&report);

    info!(
        records = report.records_parsed,
        written = report.written.len(),
        renamed = report.renamed_count(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "convert pipeline complete"
    );

    Ok(report)
}

/// Keep a root-level output's path, or record its failure with the run's errors.
fn collect_output(
    result: Result<PathBuf>,
    errors: &mut Vec<C2mdError>,
    what: &str,
) -> Option<PathBuf> {
    match result {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "{what} not written");
            errors.push(e);
            None
        }
    }
}

/// Describe the written files for the JSON run manifest.
pub fn build_run_manifest(written: &Manifest, records_parsed: usize) -> RunManifest {
    RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        records_parsed,
        files: written.entries.iter().map(manifest_file).collect(),
    }
}

fn manifest_file(entry: &ManifestEntry) -> ManifestFile {
    let mut hasher = Sha256::new();
    hasher.update(render_record_bytes(&entry.record));

    ManifestFile {
        path: entry.relative_path(),
        source: entry.record.source.clone(),
        title: entry.record.display_title().map(String::from),
        renamed: entry.renamed,
        sha256: format!("{:x}", hasher.finalize()),
    }
}

fn write_run_manifest(
    written: &Manifest,
    records_parsed: usize,
    filename: &str,
) -> Result<PathBuf> {
    let run = build_run_manifest(written, records_parsed);
    let mut json = serde_json::to_string_pretty(&run)
        .map_err(|e| C2mdError::Serialization(format!("run manifest: {e}")))?;
    json.push('\n');

    let path = written.root.join(filename);
    write_atomic(&path, json.as_bytes()).map_err(|e| C2mdError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const README_EXAMPLE: &str = "\
SOURCE: https://example.com/docs/a
TITLE: A
CONTENT: # A
body
---
SOURCE: https://example.com/docs/a
TITLE: A2
CONTENT: other";

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("c2md-pipeline-test-{}", uuid::Uuid::now_v7()))
    }

    fn opts_for(dir: &Path) -> ConvertOptions {
        ConvertOptions {
            output_dir: dir.to_path_buf(),
            ..ConvertOptions::default()
        }
    }

    #[test]
    fn duplicate_locators_get_suffixed_files_and_index() {
        let dir = scratch();
        let report = convert_str(README_EXAMPLE, &opts_for(&dir), &SilentProgress).unwrap();

        assert!(report.is_success());
        assert_eq!(report.records_parsed, 2);
        assert_eq!(report.renamed_count(), 1);

        let a = fs::read_to_string(dir.join("example.com/docs/a.md")).unwrap();
        let a2 = fs::read_to_string(dir.join("example.com/docs/a-2.md")).unwrap();
        assert_eq!(a, "# A\n\n# A\nbody");
        assert_eq!(a2, "# A2\n\nother");

        let index = fs::read_to_string(dir.join("index.md")).unwrap();
        assert!(index.contains("### example.com/docs/\n"));
        assert!(index.contains("- [A](example.com/docs/a.md)"));
        assert!(index.contains("- [A2](example.com/docs/a-2.md)"));
        assert_eq!(report.index_path, Some(report.output_dir().join("index.md")));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_source_is_reported_but_others_are_written() {
        let dir = scratch();
        let text = fs::read_to_string("../../../fixtures/exports/malformed.txt").unwrap();
        let report = convert_str(&text, &opts_for(&dir), &SilentProgress).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], C2mdError::MalformedRecord { .. }));
        assert_eq!(report.written.len(), 2);
        assert!(dir.join("docs.example.com/api/client.md").is_file());
        assert!(dir.join("docs.example.com/api/server.md").is_file());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn opaque_identifier_lands_at_root() {
        let dir = scratch();
        let opts = ConvertOptions {
            tree: false,
            ..opts_for(&dir)
        };
        let text = "SOURCE: my-plain-id\nCONTENT: hello\n";
        let report = convert_str(text, &opts, &SilentProgress).unwrap();

        assert!(report.is_success());
        assert_eq!(fs::read_to_string(dir.join("my-plain-id.md")).unwrap(), "hello");
        assert!(report.index_path.is_none());
        assert!(!dir.join("index.md").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_failure_is_collected_and_excluded_from_index() {
        let dir = scratch();
        fs::create_dir_all(&dir).unwrap();
        // A pre-existing file where a host directory needs to go.
        fs::write(dir.join("example.com"), "in the way").unwrap();

        let text = "SOURCE: https://example.com/a\nCONTENT: x\n---\nSOURCE: kept\nCONTENT: y\n";
        let report = convert_str(text, &opts_for(&dir), &SilentProgress).unwrap();

        assert!(!report.is_success());
        assert!(matches!(report.errors[0], C2mdError::FileWrite { .. }));
        assert_eq!(report.written.len(), 1);

        let index = fs::read_to_string(dir.join("index.md")).unwrap();
        assert!(index.contains("(kept.md)"));
        assert!(!index.contains("example.com"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reruns_are_byte_identical() {
        let dir = scratch();
        let opts = ConvertOptions {
            write_manifest: true,
            ..opts_for(&dir)
        };

        convert_str(README_EXAMPLE, &opts, &SilentProgress).unwrap();
        let first_index = fs::read(dir.join("index.md")).unwrap();
        let first_manifest = fs::read(dir.join("c2md-manifest.json")).unwrap();

        convert_str(README_EXAMPLE, &opts, &SilentProgress).unwrap();
        assert_eq!(fs::read(dir.join("index.md")).unwrap(), first_index);
        assert_eq!(fs::read(dir.join("c2md-manifest.json")).unwrap(), first_manifest);
        // Reruns overwrite rather than suffix against the previous run.
        assert!(!dir.join("example.com/docs/a-3.md").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_manifest_lists_hashes() {
        let dir = scratch();
        let opts = ConvertOptions {
            write_manifest: true,
            ..opts_for(&dir)
        };
        let report = convert_str(README_EXAMPLE, &opts, &SilentProgress).unwrap();

        let path = report.manifest_path.clone().unwrap();
        let run: RunManifest = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(run.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(run.records_parsed, 2);
        assert_eq!(run.files.len(), 2);
        assert_eq!(run.files[1].path, "example.com/docs/a-2.md");
        assert!(run.files[1].renamed);
        assert_eq!(run.files[0].sha256.len(), 64);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sample_fixture_converts_cleanly() {
        let dir = scratch();
        let report = convert_file(
            Path::new("../../../fixtures/exports/sample.txt"),
            &opts_for(&dir),
            &SilentProgress,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.written.len(), 4);
        for rel in [
            "docs.example.com/guide/install.md",
            "docs.example.com/guide/configure.md",
            "docs.example.com/index.md",
            "release-notes.md",
            "index.md",
        ] {
            assert!(dir.join(rel).is_file(), "{rel}");
        }

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn index_write_failure_keeps_the_report() {
        let dir = scratch();
        // A non-empty directory where the index file should go.
        fs::create_dir_all(dir.join("index.md/occupied")).unwrap();

        let report = convert_str(README_EXAMPLE, &opts_for(&dir), &SilentProgress).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            C2mdError::Io { path, .. } if path.ends_with("index.md")
        ));
        assert!(report.index_path.is_none());
        assert_eq!(report.written.len(), 2);
        assert!(dir.join("example.com/docs/a-2.md").is_file());
        assert!(!dir.join(".index.md.tmp").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unsafe_fallback_prefix_is_rejected_before_writing() {
        let base = scratch();
        let out = base.join("out");
        let opts = ConvertOptions {
            fallback_prefix: "../escaped".into(),
            ..opts_for(&out)
        };

        let err = convert_str("SOURCE: ???\nCONTENT: pwned\n", &opts, &SilentProgress).unwrap_err();
        assert!(matches!(err, C2mdError::Config { .. }));
        assert!(!base.join("escaped-1.md").exists());
        assert!(!out.exists());

        fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn directory_input_is_fatal() {
        let dir = scratch();
        fs::create_dir_all(&dir).unwrap();
        let err = convert_file(&dir, &opts_for(&dir.join("out")), &SilentProgress).unwrap_err();
        assert!(matches!(err, C2mdError::Validation { .. }));
        assert!(!dir.join("out").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = scratch();
        let err =
            convert_file(&dir.join("nope.txt"), &opts_for(&dir), &SilentProgress).unwrap_err();
        assert!(matches!(err, C2mdError::Io { .. }));
        assert!(!dir.exists());
    }
}
