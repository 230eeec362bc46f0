//! CLI definition, option resolution, tracing setup and the convert command.

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use c2md_core::{ConvertReport, ProgressReporter, convert_file};
use c2md_shared::{AppConfig, ConvertOptions, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// c2md: split a tagged documentation export into a tree of Markdown files.
#[derive(Parser)]
#[command(
    name = "c2md",
    version,
    about = "Convert a tagged documentation export into a directory of Markdown files with an index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Export file to convert.
    #[arg(required_unless_present = "show_config")]
    pub input: Option<PathBuf>,

    /// Output directory (defaults to `output.directory` from config).
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Generate the table-of-contents index.
    #[arg(short = 'T', long, overrides_with = "no_tree")]
    pub tree: bool,

    /// Skip the table-of-contents index.
    #[arg(long, overrides_with = "tree")]
    pub no_tree: bool,

    /// Also write a JSON run manifest at the output root.
    #[arg(long)]
    pub manifest: bool,

    /// Config file to use instead of `~/.c2md/c2md.toml`.
    #[arg(long, env = "C2MD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration as TOML and exit.
    #[arg(long)]
    pub show_config: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// `Some` when a tree flag was given, `None` to defer to config.
    fn tree_override(&self) -> Option<bool> {
        match (self.tree, self.no_tree) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Apply command-line flags on top of config-derived options.
    fn apply_overrides(&self, mut opts: ConvertOptions) -> ConvertOptions {
        if let Some(dir) = &self.directory {
            opts.output_dir = dir.clone();
        }
        if let Some(tree) = self.tree_override() {
            opts.tree = tree;
        }
        if self.manifest {
            opts.write_manifest = true;
        }
        opts
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "c2md=info",
        1 => "c2md=debug",
        _ => "c2md=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Run the CLI.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    if cli.show_config {
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| eyre!("failed to serialize config: {e}"))?;
        print!("{toml_str}");
        return Ok(());
    }

    let input = cli
        .input
        .as_deref()
        .ok_or_else(|| eyre!("no input file given"))?;
    let opts = cli.apply_overrides(ConvertOptions::from(&config));
    cmd_convert(input, &opts)
}

fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config_from(path)?
        }
        None => load_config()?,
    };
    Ok(config)
}

fn cmd_convert(input: &Path, opts: &ConvertOptions) -> Result<()> {
    info!(
        input = %input.display(),
        output = %opts.output_dir.display(),
        tree = opts.tree,
        "converting export"
    );

    let reporter = CliProgress::new();
    let report = convert_file(input, opts, &reporter)?;
    print_summary(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!(
            "{} error(s) during conversion; see the summary above",
            report.errors.len()
        ))
    }
}

fn print_summary(report: &ConvertReport) {
    println!();
    println!("  Records: {}", report.records_parsed);
    println!("  Written: {}", report.written.len());
    println!("  Renamed: {}", report.renamed_count());
    println!("  Output:  {}", report.output_dir().display());
    if let Some(index) = &report.index_path {
        println!("  Index:   {}", index.display());
    }
    if let Some(manifest) = &report.manifest_path {
        println!("  Manifest: {}", manifest.display());
    }
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());

    if !report.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for warning in &report.warnings {
            println!("    - {warning}");
        }
    }
    if !report.errors.is_empty() {
        println!();
        println!("  Errors:");
        for error in &report.errors {
            println!("    - {error}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_written(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {path}"));
    }

    fn done(&self, _report: &ConvertReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    // Fatal errors skip `done`.
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("c2md").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn input_is_required_unless_showing_config() {
        assert!(Cli::try_parse_from(["c2md"]).is_err());
        assert!(parse(&["--show-config"]).input.is_none());
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        config.output.tree = false;
        config.output.directory = "from-config".into();

        let cli = parse(&["export.txt", "-d", "out", "-T", "--manifest"]);
        let opts = cli.apply_overrides(ConvertOptions::from(&config));
        assert_eq!(opts.output_dir, PathBuf::from("out"));
        assert!(opts.tree);
        assert!(opts.write_manifest);
    }

    #[test]
    fn config_applies_without_flags() {
        let mut config = AppConfig::default();
        config.output.tree = false;

        let opts = parse(&["export.txt"]).apply_overrides(ConvertOptions::from(&config));
        assert!(!opts.tree);
        assert_eq!(opts.output_dir, PathBuf::from("."));
    }

    #[test]
    fn last_tree_flag_wins() {
        assert_eq!(parse(&["x", "-T", "--no-tree"]).tree_override(), Some(false));
        assert_eq!(parse(&["x", "--no-tree", "--tree"]).tree_override(), Some(true));
        assert_eq!(parse(&["x"]).tree_override(), None);
    }
}
