//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use arxivflat_core::{
    AssembleRequest, AssembledDocument, Pipeline, PipelineConfig, PipelineError, ProgressReporter,
};
use arxivflat_shared::{AppConfig, cache_dir, init_config, load_config};
use arxivflat_storage::DiskCache;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// arxivflat: one LaTeX file from an arXiv submission.
#[derive(Parser)]
#[command(
    name = "arxivflat",
    version,
    about = "Fetch an arXiv submission's LaTeX source and flatten its includes into one document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Cache directory, overriding `cache.dir` from the config file.
    #[arg(long, env = "ARXIVFLAT_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a submission and print its merged LaTeX source.
    Get {
        /// arXiv URL, `arXiv:` reference, or bare identifier.
        reference: String,

        /// Write the merged document to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Discard any cached copy and download again.
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or clear the local bundle cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// List cached submissions.
    List,
    /// Remove one submission from the cache.
    Purge {
        /// arXiv URL, `arXiv:` reference, or bare identifier.
        reference: String,
    },
    /// Print the cache directory.
    Path,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout is
/// reserved for the merged document.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "arxivflat=warn",
        1 => "arxivflat=info",
        2 => "arxivflat=debug",
        _ => "arxivflat=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let cache_override = cli.cache_dir;
    match cli.command {
        Command::Get {
            reference,
            output,
            refresh,
        } => cmd_get(&reference, output, refresh, cache_override).await,
        Command::Cache { action } => match action {
            CacheAction::List => cmd_cache_list(cache_override),
            CacheAction::Purge { reference } => cmd_cache_purge(&reference, cache_override).await,
            CacheAction::Path => cmd_cache_path(cache_override),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cache_override),
        },
    }
}

/// Config file values with command-line overrides applied.
fn resolved_config(cache_override: Option<PathBuf>) -> Result<AppConfig> {
    Ok(apply_overrides(load_config()?, cache_override))
}

fn apply_overrides(mut config: AppConfig, cache_override: Option<PathBuf>) -> AppConfig {
    if let Some(dir) = cache_override {
        config.cache.dir = Some(dir.to_string_lossy().into_owned());
    }
    config
}

fn open_cache(config: &AppConfig) -> Result<DiskCache> {
    Ok(DiskCache::open(cache_dir(config)?)?)
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let cache = Arc::new(open_cache(config)?);
    Ok(Pipeline::new(PipelineConfig::from(config), cache)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_get(
    reference: &str,
    output: Option<PathBuf>,
    refresh: bool,
    cache_override: Option<PathBuf>,
) -> Result<()> {
    let config = resolved_config(cache_override)?;
    let pipeline = build_pipeline(&config)?;

    info!(reference, refresh, "assembling submission");

    let reporter = CliProgress::new();
    let request = AssembleRequest::new(reference).refresh(refresh);
    let document = pipeline.assemble(&request, &reporter).await?;

    if !document.missing.is_empty() {
        warn!(targets = ?document.missing, "some includes were not found and were left as-is");
    }
    if !document.size_limited.is_empty() {
        warn!(
            skipped = document.size_limited.len(),
            "output size limit reached; remaining includes were left as-is"
        );
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &document.text)
                .map_err(|e| eyre!("failed to write '{}': {e}", path.display()))?;
            eprintln!();
            eprintln!("  Submission: {}", document.id);
            eprintln!("  Entry:      {}", document.entry);
            eprintln!("  Inlined:    {}", document.inlined.len());
            eprintln!("  Missing:    {}", document.missing.len());
            eprintln!("  Cached:     {}", if document.from_cache { "yes" } else { "no" });
            eprintln!("  Written to: {}", path.display());
            eprintln!();
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.text.as_bytes())?;
            if !document.text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
    }

    Ok(())
}

fn cmd_cache_list(cache_override: Option<PathBuf>) -> Result<()> {
    let config = resolved_config(cache_override)?;
    let cache = open_cache(&config)?;
    let entries = cache.entries()?;

    if entries.is_empty() {
        println!("No cached submissions in {}", cache.root().display());
        return Ok(());
    }

    println!("{:<24} {:>6} {:>12}  STORED", "ID", "FILES", "BYTES");
    for manifest in &entries {
        println!(
            "{:<24} {:>6} {:>12}  {}",
            manifest.id.to_string(),
            manifest.file_count,
            manifest.total_bytes,
            manifest.stored_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    Ok(())
}

async fn cmd_cache_purge(reference: &str, cache_override: Option<PathBuf>) -> Result<()> {
    let config = resolved_config(cache_override)?;
    let pipeline = build_pipeline(&config)?;

    if pipeline.purge(reference).await? {
        println!("Purged cached source for {reference}");
    } else {
        println!("Nothing cached for {reference}");
    }
    Ok(())
}

fn cmd_cache_path(cache_override: Option<PathBuf>) -> Result<()> {
    let config = resolved_config(cache_override)?;
    println!("{}", cache_dir(&config)?.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cache_override: Option<PathBuf>) -> Result<()> {
    let config = resolved_config(cache_override)?;
    println!("{}", render_config(&config)?);
    Ok(())
}

fn render_config(config: &AppConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
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

    fn done(&self, _document: &AssembledDocument) {
        self.spinner.finish_and_clear();
    }

    fn failed(&self, _error: &PipelineError) {
        self.spinner.finish_and_clear();
    }
}
