//! Application configuration for arxivflat.
//!
//! User config lives at `~/.arxivflat/arxivflat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArxivFlatError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "arxivflat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".arxivflat";

/// Cache directory name inside the config directory.
const CACHE_DIR_NAME: &str = "cache";

// ---------------------------------------------------------------------------
// Config structs (matching arxivflat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bundle cache settings.
    #[serde(default)]
    pub cache: CacheSection,

    /// Remote fetch settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Include-resolution settings.
    #[serde(default)]
    pub assembly: AssemblySection,
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSection {
    /// Cache directory. `~` expands to the home directory.
    /// Defaults to `~/.arxivflat/cache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Drop image and PDF files before caching a bundle.
    #[serde(default)]
    pub prune_assets: bool,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Source-archive endpoint; the submission id is appended as a path segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single HTTP attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry delay; doubles on each subsequent retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Largest accepted archive, compressed or decompressed, in MiB.
    #[serde(default = "default_max_archive_mb")]
    pub max_archive_mb: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_archive_mb: default_max_archive_mb(),
        }
    }
}

fn default_base_url() -> String {
    "https://export.arxiv.org/e-print".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_max_archive_mb() -> u64 {
    200
}

/// `[assembly]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblySection {
    /// Maximum include nesting depth; deeper directives are left verbatim.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Cap on the merged document size; once reached, remaining directives
    /// are left verbatim.
    #[serde(default = "default_max_output_mb")]
    pub max_output_mb: u64,
}

impl Default for AssemblySection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_output_mb: default_max_output_mb(),
        }
    }
}

fn default_max_depth() -> usize {
    32
}
fn default_max_output_mb() -> u64 {
    64
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Endpoint the submission id is appended to.
    pub base_url: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_backoff: Duration,
    /// Size limit for downloaded and decompressed payloads.
    pub max_archive_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.fetch.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            max_retries: config.fetch.max_retries,
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
            max_archive_bytes: config.fetch.max_archive_mb.saturating_mul(1024 * 1024),
        }
    }
}

/// Runtime assembly configuration.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Maximum include nesting depth.
    pub max_depth: usize,
    /// Inlining stops once the merged text reaches this many bytes.
    pub max_output_bytes: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AssemblyConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_depth: config.assembly.max_depth,
            max_output_bytes: usize::try_from(config.assembly.max_output_mb.saturating_mul(1024 * 1024))
                .unwrap_or(usize::MAX),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.arxivflat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArxivFlatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.arxivflat/arxivflat.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the bundle cache directory from config, expanding `~`.
pub fn cache_dir(config: &AppConfig) -> Result<PathBuf> {
    match config.cache.dir.as_deref() {
        Some(dir) => expand_home(dir),
        None => Ok(config_dir()?.join(CACHE_DIR_NAME)),
    }
}

fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir()
        .ok_or_else(|| ArxivFlatError::config("could not determine home directory"))?;
    Ok(home.join(rest))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArxivFlatError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ArxivFlatError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        return Err(ArxivFlatError::config("fetch.timeout_secs must be positive"));
    }
    if config.assembly.max_output_mb == 0 {
        return Err(ArxivFlatError::config("assembly.max_output_mb must be positive"));
    }
    if config.fetch.max_archive_mb == 0 {
        return Err(ArxivFlatError::config("fetch.max_archive_mb must be positive"));
    }
    if !config.fetch.base_url.starts_with("http://") && !config.fetch.base_url.starts_with("https://") {
        return Err(ArxivFlatError::config(format!(
            "fetch.base_url must be an http(s) URL, got '{}'",
            config.fetch.base_url
        )));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArxivFlatError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArxivFlatError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArxivFlatError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("export.arxiv.org"));
        assert!(toml_str.contains("max_depth"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.max_retries, 2);
        assert_eq!(parsed.assembly.max_depth, 32);
        assert_eq!(parsed.assembly.max_output_mb, 64);
        assert!(!parsed.cache.prune_assets);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[cache]
dir = "/tmp/arxiv-cache"
prune_assets = true

[fetch]
max_retries = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.cache.dir.as_deref(), Some("/tmp/arxiv-cache"));
        assert!(config.cache.prune_assets);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(cache_dir(&config).unwrap(), PathBuf::from("/tmp/arxiv-cache"));
    }

    #[test]
    fn fetch_config_from_app_config() {
        let mut app = AppConfig::default();
        app.fetch.base_url = "http://127.0.0.1:9000/e-print/".into();
        app.fetch.max_archive_mb = 2;
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.base_url, "http://127.0.0.1:9000/e-print");
        assert_eq!(fetch.timeout, Duration::from_secs(30));
        assert_eq!(fetch.retry_backoff, Duration::from_millis(500));
        assert_eq!(fetch.max_archive_bytes, 2 * 1024 * 1024);

        app.assembly.max_output_mb = 3;
        assert_eq!(AssemblyConfig::from(&app).max_output_bytes, 3 * 1024 * 1024);
    }

    #[test]
    fn load_rejects_invalid_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("arxivflat.toml");

        std::fs::write(&path, "[fetch]\ntimeout_secs = 0\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        std::fs::write(&path, "[assembly]\nmax_output_mb = 0\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_output_mb"));

        std::fs::write(&path, "[fetch]\nbase_url = \"ftp://x\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"));

        std::fs::write(&path, "not = [valid").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home("~/cache").unwrap(), home.join("cache"));
        assert_eq!(expand_home("~").unwrap(), home.join(""));
        assert_eq!(expand_home("~user/x").unwrap(), PathBuf::from("~user/x"));
        assert_eq!(expand_home("/abs").unwrap(), PathBuf::from("/abs"));
    }
}
