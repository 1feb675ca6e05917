//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.toolscout/config.json`) and environment.
//! Every field has a default, so a missing file or `{}` is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog;
use crate::probe::Prober;
use crate::registry::BuildOptions;
use crate::servers::{self, ServerOptions};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Local tool probing.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Registry cache location and freshness.
    #[serde(default)]
    pub cache: CacheConfig,

    /// External MCP server discovery.
    #[serde(default)]
    pub servers: ServersConfig,
}

/// Probe settings for the registry build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Wall-clock budget for a whole registry build (default 30).
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// Timeout for each `--version` / `-V` invocation (default 3000).
    #[serde(default = "default_version_timeout_ms")]
    pub version_timeout_ms: u64,

    /// Probes in flight at once (default 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Tools probed in addition to the built-in seed list.
    #[serde(default)]
    pub extra_tools: Vec<String>,

    /// Seed tools to skip.
    #[serde(default)]
    pub disabled_tools: Vec<String>,
}

fn default_build_timeout_secs() -> u64 {
    30
}

fn default_version_timeout_ms() -> u64 {
    3000
}

fn default_concurrency() -> usize {
    8
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            build_timeout_secs: default_build_timeout_secs(),
            version_timeout_ms: default_version_timeout_ms(),
            concurrency: default_concurrency(),
            extra_tools: Vec::new(),
            disabled_tools: Vec::new(),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Cache file. Overridden by TOOLSCOUT_CACHE_PATH. Relative paths resolve against the config file's parent.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// A cache older than this is rebuilt (default 3600).
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// When a build produces nothing, serve the hardcoded fallback registry (default true).
    #[serde(default = "default_true")]
    pub fallback: bool,

    /// How long the background (session-start) path waits for a build before answering from what it has (default 1000).
    #[serde(default = "default_background_wait_ms")]
    pub background_wait_ms: u64,
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_background_wait_ms() -> u64 {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_age_secs: default_max_age_secs(),
            fallback: true,
            background_wait_ms: default_background_wait_ms(),
        }
    }
}

/// MCP server discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServersConfig {
    /// Read server config files at all (default true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Contact servers to list their tools (default true). When false, servers are only listed.
    #[serde(default = "default_true")]
    pub enumerate: bool,

    /// Per-server enumeration timeout (default 5000).
    #[serde(default = "default_server_timeout_ms")]
    pub timeout_ms: u64,

    /// Server config files read after the built-in candidates.
    #[serde(default)]
    pub extra_config_paths: Vec<PathBuf>,

    /// Start servers declared in the working directory's `.mcp.json` / `.vscode/mcp.json` (default false).
    #[serde(default)]
    pub trust_project_config: bool,
}

fn default_server_timeout_ms() -> u64 {
    5000
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enumerate: true,
            timeout_ms: default_server_timeout_ms(),
            extra_config_paths: Vec::new(),
            trust_project_config: false,
        }
    }
}

impl Config {
    /// Seed list plus extra tools, minus disabled tools.
    pub fn tool_list(&self) -> Vec<String> {
        let disabled = &self.discovery.disabled_tools;
        catalog::seed_tools()
            .map(String::from)
            .chain(self.discovery.extra_tools.iter().cloned())
            .filter(|t| !disabled.iter().any(|d| d == t))
            .collect()
    }

    pub fn prober(&self) -> Prober {
        Prober::from_env(Duration::from_millis(self.discovery.version_timeout_ms))
    }

    /// Builder inputs for this config, probing over PATH and reading the default server candidates.
    pub fn build_options(&self) -> BuildOptions {
        let servers = self.servers.enabled.then(|| ServerOptions {
            enumerate: self.servers.enumerate,
            timeout: Duration::from_millis(self.servers.timeout_ms),
            deadline: None,
        });
        BuildOptions {
            tools: self.tool_list(),
            prober: self.prober(),
            concurrency: self.discovery.concurrency,
            budget: Duration::from_secs(self.discovery.build_timeout_secs),
            server_candidates: servers::default_candidate_paths(
                &self.servers.extra_config_paths,
                self.servers.trust_project_config,
            ),
            servers,
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TOOLSCOUT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".toolscout").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or TOOLSCOUT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving relative paths).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolve the cache file: TOOLSCOUT_CACHE_PATH, then `cache.path` (relative to the config file's parent), then `registry.json` next to the config file.
pub fn resolve_cache_path(config: &Config, config_path: &Path) -> PathBuf {
    let env = std::env::var("TOOLSCOUT_CACHE_PATH")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);
    cache_path_from(env, config, config_path)
}

fn cache_path_from(env: Option<PathBuf>, config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if let Some(p) = env {
        return p;
    }
    match &config.cache.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("registry.json"),
    }
}
