//! Table-of-contents generation.
//!
//! Rebuilds the directory tree from the written manifest and renders one
//! Markdown document mirroring it: root files first, then a heading per
//! directory (deeper directories get deeper headings) followed by links to
//! that directory's files.

use std::path::PathBuf;

use tracing::{debug, instrument};

use c2md_markdown::{heading, link_item};
use c2md_shared::{C2mdError, ConvertOptions, Result};

use crate::organizer::{Manifest, write_atomic};
use crate::tree::DirectoryTree;

/// Index rendering options.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Text of the level-1 heading.
    pub title: String,
    /// Whether to end with a "generated by" line.
    pub footer: bool,
}

impl From<&ConvertOptions> for IndexOptions {
    fn from(opts: &ConvertOptions) -> Self {
        Self {
            title: opts.index_title.clone(),
            footer: opts.index_footer,
        }
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from(&ConvertOptions::default())
    }
}

/// Render the index document for `manifest`.
///
/// Link text is the record title when present, else the file stem. Link
/// targets are `/`-separated paths relative to the output root.
#[instrument(skip_all, fields(entries = manifest.len()))]
pub fn render_index(manifest: &Manifest, opts: &IndexOptions) -> String {
    let tree = DirectoryTree::from_manifest(manifest);
    let mut lines = vec![heading(1, &opts.title)];

    for id in tree.walk() {
        let node = tree.node(id);
        if id != DirectoryTree::ROOT {
            lines.push(String::new());
            lines.push(heading(node.depth() + 1, &node.display_path()));
        }
        if node.files.is_empty() {
            continue;
        }

        lines.push(String::new());
        for &idx in node.files.values() {
            let entry = &manifest.entries[idx];
            let text = entry.record.display_title().unwrap_or_else(|| entry.stem());
            lines.push(link_item(text, &entry.relative_path()));
        }
    }

    if opts.footer {
        lines.push(String::new());
        lines.push("_Generated by c2md_".to_string());
    }

    debug!(
        directories = tree.dir_count(),
        files = tree.file_count(),
        "index rendered"
    );

    let mut doc = lines.join("\n");
    doc.push('\n');
    doc
}

/// Render and atomically write the index to `<root>/<filename>`.
pub fn write_index(manifest: &Manifest, filename: &str, opts: &IndexOptions) -> Result<PathBuf> {
    let path = manifest.root.join(filename);
    let doc = render_index(manifest, opts);
    write_atomic(&path, doc.as_bytes()).map_err(|e| C2mdError::io(&path, e))?;
    debug!(path = %path.display(), "wrote index");
    Ok(path)
}
