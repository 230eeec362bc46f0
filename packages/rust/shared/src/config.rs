//! Application configuration for c2md.
//!
//! User config lives at `~/.c2md/c2md.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{C2mdError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "c2md.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".c2md";

// ---------------------------------------------------------------------------
// Config structs (matching c2md.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output layout settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Path sanitization and collision settings.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Index document settings.
    #[serde(default)]
    pub index: IndexConfig,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output directory.
    #[serde(default = "default_output_dir")]
    pub directory: String,

    /// Whether to generate the index document.
    #[serde(default = "default_true")]
    pub tree: bool,

    /// Root-level filename of the index document.
    #[serde(default = "default_index_filename")]
    pub index_filename: String,

    /// Whether to write the JSON run manifest.
    #[serde(default)]
    pub write_manifest: bool,

    /// Root-level filename of the JSON run manifest.
    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            tree: true,
            index_filename: default_index_filename(),
            write_manifest: false,
            manifest_filename: default_manifest_filename(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_true() -> bool {
    true
}
fn default_index_filename() -> String {
    "index.md".into()
}
fn default_manifest_filename() -> String {
    "c2md-manifest.json".into()
}

/// `[naming]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prefix for names that sanitize to nothing (`<prefix>-<n>`).
    #[serde(default = "default_fallback_prefix")]
    pub fallback_prefix: String,

    /// Separator placed between a stem and its collision counter.
    #[serde(default = "default_collision_separator")]
    pub collision_separator: String,

    /// Maximum characters kept per path component (excluding `.md`).
    #[serde(default = "default_max_component_len")]
    pub max_component_len: usize,

    /// Treat paths differing only by ASCII case as colliding.
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            fallback_prefix: default_fallback_prefix(),
            collision_separator: default_collision_separator(),
            max_component_len: default_max_component_len(),
            case_insensitive: true,
        }
    }
}

fn default_fallback_prefix() -> String {
    "untitled".into()
}
fn default_collision_separator() -> String {
    "-".into()
}
fn default_max_component_len() -> usize {
    120
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Level-1 heading of the index document.
    #[serde(default = "default_index_title")]
    pub title: String,

    /// Whether to close the index with a "generated by" line.
    #[serde(default = "default_true")]
    pub footer: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            title: default_index_title(),
            footer: true,
        }
    }
}

fn default_index_title() -> String {
    "Documentation Index".into()
}

// ---------------------------------------------------------------------------
// Convert options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime conversion options, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Output root directory.
    pub output_dir: PathBuf,
    /// Whether to generate the index document.
    pub tree: bool,
    /// Root-level index filename.
    pub index_filename: String,
    /// Index heading text.
    pub index_title: String,
    /// Whether the index ends with a footer line.
    pub index_footer: bool,
    /// Whether to write the JSON run manifest.
    pub write_manifest: bool,
    /// Root-level JSON manifest filename.
    pub manifest_filename: String,
    /// Fallback name prefix for unusable components.
    pub fallback_prefix: String,
    /// Separator before collision counters.
    pub collision_separator: String,
    /// Per-component length cap.
    pub max_component_len: usize,
    /// Case-insensitive collision detection.
    pub case_insensitive: bool,
}

impl From<&AppConfig> for ConvertOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output.directory),
            tree: config.output.tree,
            index_filename: config.output.index_filename.clone(),
            index_title: config.index.title.clone(),
            index_footer: config.index.footer,
            write_manifest: config.output.write_manifest,
            manifest_filename: config.output.manifest_filename.clone(),
            fallback_prefix: config.naming.fallback_prefix.clone(),
            collision_separator: config.naming.collision_separator.clone(),
            max_component_len: config.naming.max_component_len,
            case_insensitive: config.naming.case_insensitive,
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl ConvertOptions {
    /// Reject option values that would break path generation.
    pub fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("output.index_filename", &self.index_filename),
            ("output.manifest_filename", &self.manifest_filename),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(C2mdError::config(format!(
                    "{key} must be a plain file name, got {name:?}"
                )));
            }
        }
        let prefix = &self.fallback_prefix;
        if prefix.is_empty()
            || !prefix.chars().all(is_portable_char)
            || prefix.starts_with(['.', '-'])
            || prefix.ends_with(['.', '-'])
        {
            return Err(C2mdError::config(format!(
                "naming.fallback_prefix must use only [A-Za-z0-9._-] and not start or end \
                 with '.' or '-', got {prefix:?}"
            )));
        }
        let separator = &self.collision_separator;
        if !separator.chars().all(|c| c != '.' && is_portable_char(c)) {
            return Err(C2mdError::config(format!(
                "naming.collision_separator must use only [A-Za-z0-9_-], got {separator:?}"
            )));
        }
        if self.max_component_len < 8 {
            return Err(C2mdError::config(format!(
                "naming.max_component_len must be at least 8, got {}",
                self.max_component_len
            )));
        }
        Ok(())
    }
}

/// Characters allowed in generated path components.
fn is_portable_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.c2md/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| C2mdError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.c2md/c2md.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = match config_file_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(error = %e, "no home directory, using default config");
            return Ok(AppConfig::default());
        }
    };

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| C2mdError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| C2mdError::config(format!("failed to parse {}: {e}", path.display())))
}
