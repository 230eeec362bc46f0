//! Collision resolution and file materialization.
//!
//! Planning is pure: mappings are claimed in input order against a
//! [`ClaimedPaths`] set owned by the caller's [`Organizer`] run, producing a
//! [`Manifest`] with unique paths. Only [`materialize`] touches the disk.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use c2md_shared::{C2mdError, ConvertOptions, Record, Result};

use crate::mapper::{PathMapping, join_relative};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One record at its final, collision-free location.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    /// Directory components below the output root.
    pub segments: Vec<String>,
    /// Final file name (with any collision suffix).
    pub filename: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// The record written there.
    pub record: Record,
    /// 1-based position of the record in the parsed sequence.
    pub ordinal: usize,
    /// Whether a collision suffix was applied to the file or a directory.
    pub renamed: bool,
}

impl ManifestEntry {
    /// `/`-joined path relative to the output root.
    pub fn relative_path(&self) -> String {
        join_relative(&self.segments, &self.filename)
    }

    /// File name without its `.md` extension.
    pub fn stem(&self) -> &str {
        split_extension(&self.filename).0
    }
}

/// Ordered, collision-free list of files for one run.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Output root all entry paths live under.
    pub root: PathBuf,
    /// Entries in input order.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that needed a collision suffix.
    pub fn renamed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.renamed).count()
    }
}

// ---------------------------------------------------------------------------
// Claimed paths
// ---------------------------------------------------------------------------

/// Relative paths already taken in one run, as files or as directories.
#[derive(Debug, Default)]
pub struct ClaimedPaths {
    files: HashSet<String>,
    dirs: HashSet<String>,
    case_insensitive: bool,
}

impl ClaimedPaths {
    /// Empty set. With `case_insensitive`, `A.md` and `a.md` collide.
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ..Self::default()
        }
    }

    fn key(&self, rel: &str) -> String {
        if self.case_insensitive {
            rel.to_ascii_lowercase()
        } else {
            rel.to_string()
        }
    }

    /// Whether `rel` is taken by a file.
    pub fn is_file(&self, rel: &str) -> bool {
        self.files.contains(&self.key(rel))
    }

    /// Whether `rel` is taken by a file or a directory.
    pub fn is_taken(&self, rel: &str) -> bool {
        let key = self.key(rel);
        self.files.contains(&key) || self.dirs.contains(&key)
    }

    /// Claim `rel` as a file. Returns `false` if it was already taken.
    pub fn claim_file(&mut self, rel: &str) -> bool {
        if self.is_taken(rel) {
            return false;
        }
        let key = self.key(rel);
        self.files.insert(key)
    }

    fn claim_dir(&mut self, rel: &str) {
        let key = self.key(rel);
        self.dirs.insert(key);
    }
}

// ---------------------------------------------------------------------------
// Organizer
// ---------------------------------------------------------------------------

/// Plans unique locations for a batch of mappings.
#[derive(Debug, Clone)]
pub struct Organizer {
    root: PathBuf,
    separator: String,
    case_insensitive: bool,
    reserved: Vec<String>,
}

impl Organizer {
    /// Organizer writing under `root`, with root-level names reserved for
    /// the index and manifest when those outputs are enabled.
    pub fn new(root: impl Into<PathBuf>, opts: &ConvertOptions) -> Self {
        let mut reserved = Vec::new();
        if opts.tree {
            reserved.push(opts.index_filename.clone());
        }
        if opts.write_manifest {
            reserved.push(opts.manifest_filename.clone());
        }
        Self {
            root: root.into(),
            separator: opts.collision_separator.clone(),
            case_insensitive: opts.case_insensitive,
            reserved,
        }
    }

    /// Resolve collisions in input order and build the manifest.
    ///
    /// The first claimant keeps its path; later ones get `-2`, `-3`, …
    /// before the extension, taking the lowest free counter.
    #[instrument(skip_all, fields(mappings = mappings.len()))]
    pub fn plan(&self, mappings: Vec<PathMapping>) -> Manifest {
        let mut claims = ClaimedPaths::new(self.case_insensitive);
        for name in &self.reserved {
            claims.claim_file(name);
        }

        let mut entries = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let (segments, dirs_renamed) = self.resolve_dirs(&mut claims, &mapping.segments);
            let (filename, file_renamed) =
                self.resolve_file(&mut claims, &segments, &mapping.filename);
            let renamed = dirs_renamed || file_renamed;

            let rel = join_relative(&segments, &filename);
            if renamed {
                debug!(
                    ordinal = mapping.ordinal,
                    wanted = %mapping.relative_path(),
                    got = %rel,
                    "path collision resolved"
                );
            }

            let path = segments
                .iter()
                .fold(self.root.clone(), |p, s| p.join(s))
                .join(&filename);

            entries.push(ManifestEntry {
                segments,
                filename,
                path,
                record: mapping.record,
                ordinal: mapping.ordinal,
                renamed,
            });
        }

        let manifest = Manifest {
            root: self.root.clone(),
            entries,
        };
        debug!(
            entries = manifest.len(),
            renamed = manifest.renamed_count(),
            "manifest planned"
        );
        manifest
    }

    /// Claim each directory prefix, renaming a segment whose path is already a file.
    fn resolve_dirs(&self, claims: &mut ClaimedPaths, wanted: &[String]) -> (Vec<String>, bool) {
        let mut resolved: Vec<String> = Vec::with_capacity(wanted.len());
        let mut renamed = false;

        for segment in wanted {
            let mut name = segment.clone();
            let mut counter = 1;
            while claims.is_file(&join_relative(&resolved, &name)) {
                counter += 1;
                name = format!("{segment}{}{counter}", self.separator);
                renamed = true;
            }
            claims.claim_dir(&join_relative(&resolved, &name));
            resolved.push(name);
        }

        (resolved, renamed)
    }

    /// Claim a file name in `dirs`, suffixing it until free.
    fn resolve_file(
        &self,
        claims: &mut ClaimedPaths,
        dirs: &[String],
        wanted: &str,
    ) -> (String, bool) {
        if claims.claim_file(&join_relative(dirs, wanted)) {
            return (wanted.to_string(), false);
        }

        let (stem, ext) = split_extension(wanted);
        let mut counter = 2;
        loop {
            let candidate = format!("{stem}{}{counter}{ext}", self.separator);
            if claims.claim_file(&join_relative(dirs, &candidate)) {
                return (candidate, true);
            }
            counter += 1;
        }
    }
}

/// Split `name.md` into (`name`, `.md`); names without the extension keep all.
fn split_extension(filename: &str) -> (&str, &str) {
    let len = filename.len();
    if len > 3
        && filename.is_char_boundary(len - 3)
        && filename[len - 3..].eq_ignore_ascii_case(".md")
    {
        filename.split_at(len - 3)
    } else {
        (filename, "")
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Result of writing a manifest to disk.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Entries that were written, in input order.
    pub written: Manifest,
    /// One [`C2mdError::FileWrite`] per entry that failed.
    pub failures: Vec<C2mdError>,
}

/// Write every manifest entry, continuing past per-file failures.
///
/// `on_written` is called after each successful write with the entry and
/// its 1-based position in the manifest.
#[instrument(skip_all, fields(root = %manifest.root.display(), entries = manifest.len()))]
pub fn materialize(
    manifest: Manifest,
    mut on_written: impl FnMut(&ManifestEntry, usize),
) -> WriteOutcome {
    let mut outcome = WriteOutcome {
        written: Manifest {
            root: manifest.root,
            entries: Vec::with_capacity(manifest.entries.len()),
        },
        failures: Vec::new(),
    };

    for (i, entry) in manifest.entries.into_iter().enumerate() {
        match write_entry(&entry) {
            Ok(()) => {
                on_written(&entry, i + 1);
                outcome.written.entries.push(entry);
            }
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "write failed, skipping file");
                outcome.failures.push(e);
            }
        }
    }

    info!(
        written = outcome.written.len(),
        failed = outcome.failures.len(),
        "files materialized"
    );
    outcome
}

fn write_entry(entry: &ManifestEntry) -> Result<()> {
    if let Some(parent) = entry.path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| C2mdError::file_write(&entry.path, e))?;
    }

    let bytes = c2md_markdown::render_record_bytes(&entry.record);
    write_atomic(&entry.path, &bytes).map_err(|e| C2mdError::file_write(&entry.path, e))?;

    debug!(path = %entry.path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

/// Write `bytes` to a temporary sibling, then rename it over `path`.
///
/// The temporary file is removed if any step fails, so `path` is either the
/// old content or the complete new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| {
        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&temp, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
