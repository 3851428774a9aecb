//! Configuration for the capture core.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CAPTURE_HOME, CAPTURE_OUTBOX)
//! 2. Config file (.capture/config.yaml)
//! 3. Defaults (~/.capture)
//!
//! Config file discovery:
//! - Searches current directory and parents for .capture/config.yaml
//! - Paths in config file are relative to the .capture/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::ExpirationPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_STORY_TTL_HOURS: i64 = 24;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub stories: Option<StoriesConfig>,
    #[serde(default)]
    pub licensing: Option<LicensingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .capture/)
    pub home: Option<String>,
    /// Outbox file (relative to .capture/)
    pub outbox: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoriesConfig {
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicensingConfig {
    pub default_usage_limit: Option<u32>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// JSONL outbox of published domain events
    pub outbox: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Lifetime of a story when the payload omits `expiresAt`
    pub story_ttl_hours: i64,
    /// Usage limit for newly issued licenses; `None` is unlimited
    pub default_usage_limit: Option<u32>,
    story_policy: ExpirationPolicy,
}

impl ResolvedConfig {
    pub fn expiration_policy(&self) -> ExpirationPolicy {
        self.story_policy
    }
}

/// Values taken from the process environment
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    home: Option<String>,
    outbox: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("CAPTURE_HOME").ok(),
            outbox: std::env::var("CAPTURE_OUTBOX").ok(),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".capture").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge the sources into one resolved config
fn resolve(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    env: EnvOverrides,
) -> Result<ResolvedConfig> {
    let file = config_file.as_deref().map(load_config_file).transpose()?;
    let capture_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = match (env.home, paths.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(capture_dir, &home),
        (None, None) => default_home,
    };

    let outbox = match (env.outbox, paths.outbox) {
        (Some(env_outbox), _) => PathBuf::from(env_outbox),
        (None, Some(outbox)) => resolve_path(capture_dir, &outbox),
        (None, None) => home.join("outbox.jsonl"),
    };

    let story_ttl_hours = file
        .as_ref()
        .and_then(|f| f.stories.as_ref())
        .and_then(|s| s.ttl_hours)
        .unwrap_or(DEFAULT_STORY_TTL_HOURS);
    let story_policy = ExpirationPolicy::try_hours(story_ttl_hours)
        .with_context(|| format!("Invalid stories.ttl_hours: {}", story_ttl_hours))?;

    let default_usage_limit = file
        .as_ref()
        .and_then(|f| f.licensing.as_ref())
        .and_then(|l| l.default_usage_limit);
    if default_usage_limit == Some(0) {
        anyhow::bail!("licensing.default_usage_limit must be at least 1");
    }

    Ok(ResolvedConfig {
        home,
        outbox,
        config_file,
        story_ttl_hours,
        default_usage_limit,
        story_policy,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".capture");

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve(default_home, find_config_file(&cwd), EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the outbox path ($CAPTURE_HOME/outbox.jsonl unless overridden)
pub fn outbox_path() -> Result<PathBuf> {
    Ok(config()?.outbox.clone())
}
