//! Query surface: the operations callers use (ensure, discover, list, describe, refresh).
//!
//! A [`ToolScout`] loads the cached registry when it is fresh and rebuilds it
//! otherwise. Callers always get either a (possibly empty) list or an explicit
//! [`QueryError::RegistryUnavailable`]; "no match" is never an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache;
use crate::catalog::{self, Category};
use crate::config::{self, Config};
use crate::entry::{ToolEntry, ToolKind};
use crate::matcher::{self, Query};
use crate::registry::{self, BuildError, BuildOptions, Registry};
use crate::servers::ServerEntry;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// No cache, no fallback, and the build produced nothing.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),
}

/// Post-match filtering applied by [`ToolScout::discover_filtered`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Filter {
    pub available_only: bool,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn apply(&self, entries: Vec<ToolEntry>) -> Vec<ToolEntry> {
        entries
            .into_iter()
            .filter(|e| !self.available_only || e.available)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// On-demand detail for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetail {
    #[serde(flatten)]
    pub entry: ToolEntry,
    /// True when the entry was re-probed just now rather than read from the registry.
    pub live: bool,
    /// Error/task patterns that recommend this tool.
    pub recommended_for: Vec<String>,
    /// Owning server, for remote capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerEntry>,
}

/// A registry rebuild running in the background. Await [`RefreshTask::wait`] to observe completion.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<Result<Registry, QueryError>>,
}

impl RefreshTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the rebuild to finish (it has already written the cache when this returns Ok).
    pub async fn wait(self) -> Result<Registry, QueryError> {
        self.handle
            .await
            .map_err(|e| QueryError::RegistryUnavailable(format!("refresh task failed: {}", e)))?
    }

    /// Wait at most `budget`. None when still running.
    pub async fn wait_for(&mut self, budget: Duration) -> Option<Result<Registry, QueryError>> {
        match tokio::time::timeout(budget, &mut self.handle).await {
            Ok(joined) => Some(joined.unwrap_or_else(|e| {
                Err(QueryError::RegistryUnavailable(format!("refresh task failed: {}", e)))
            })),
            Err(_) => None,
        }
    }
}

/// Result of the session-start path: the best registry available now, plus the rebuild if it is still running.
#[derive(Debug)]
pub struct BackgroundEnsure {
    pub registry: Result<Registry, QueryError>,
    pub pending: Option<RefreshTask>,
}

/// Entry point for queries. Cheap to clone; holds no registry state of its own.
#[derive(Debug, Clone)]
pub struct ToolScout {
    cache_path: PathBuf,
    options: BuildOptions,
    max_age: Duration,
    fallback: bool,
    background_wait: Duration,
}

impl ToolScout {
    pub fn new(cache_path: impl Into<PathBuf>, options: BuildOptions) -> Self {
        let defaults = config::CacheConfig::default();
        Self {
            cache_path: cache_path.into(),
            options,
            max_age: Duration::from_secs(defaults.max_age_secs),
            fallback: defaults.fallback,
            background_wait: Duration::from_millis(defaults.background_wait_ms),
        }
    }

    pub fn from_config(config: &Config, config_path: &Path) -> Self {
        Self::new(
            config::resolve_cache_path(config, config_path),
            config.build_options(),
        )
        .with_max_age(Duration::from_secs(config.cache.max_age_secs))
        .with_fallback(config.cache.fallback)
        .with_background_wait(Duration::from_millis(config.cache.background_wait_ms))
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_background_wait(mut self, wait: Duration) -> Self {
        self.background_wait = wait;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// The cached registry if it is fresh.
    pub fn fresh_cache(&self) -> Option<Registry> {
        cache::read(&self.cache_path)
            .filter(|r| cache::is_fresh(r, self.max_age, chrono::Utc::now()))
    }

    /// Fresh cache, else a synchronous rebuild.
    pub async fn ensure_registry(&self) -> Result<Registry, QueryError> {
        if let Some(reg) = self.fresh_cache() {
            log::debug!("using cached registry from {}", reg.built_at);
            return Ok(reg);
        }
        self.refresh().await
    }

    /// Session-start path: never blocks longer than the background wait. When the rebuild is not
    /// done in time, answers from the stale cache or, if enabled, the fallback list (tagged
    /// `fallback`) and hands back the running rebuild.
    pub async fn ensure_registry_background(&self) -> BackgroundEnsure {
        let cached = cache::read(&self.cache_path);
        if let Some(reg) = &cached {
            if cache::is_fresh(reg, self.max_age, chrono::Utc::now()) {
                return BackgroundEnsure {
                    registry: Ok(reg.clone()),
                    pending: None,
                };
            }
        }
        let mut task = self.spawn_refresh();
        if let Some(done) = task.wait_for(self.background_wait).await {
            return BackgroundEnsure {
                registry: done,
                pending: None,
            };
        }
        log::debug!("registry rebuild still running after {:?}", self.background_wait);
        let registry = match cached {
            Some(reg) => Ok(reg.into_fallback()),
            None if self.fallback => Ok(registry::fallback_registry(&self.options.prober)),
            None => Err(QueryError::RegistryUnavailable(
                "no cache yet and the rebuild is still running".to_string(),
            )),
        };
        BackgroundEnsure {
            registry,
            pending: Some(task),
        }
    }

    /// Rebuild unconditionally and persist.
    pub async fn refresh(&self) -> Result<Registry, QueryError> {
        match registry::build(&self.options).await {
            Ok(reg) => {
                self.persist(&reg);
                Ok(reg)
            }
            Err(e) => self.recover(e),
        }
    }

    /// Start [`ToolScout::refresh`] on the runtime and return its handle.
    pub fn spawn_refresh(&self) -> RefreshTask {
        let scout = self.clone();
        RefreshTask {
            handle: tokio::spawn(async move { scout.refresh().await }),
        }
    }

    pub async fn discover(&self, query: &Query) -> Result<Vec<ToolEntry>, QueryError> {
        self.discover_filtered(query, Filter::default()).await
    }

    pub async fn discover_filtered(
        &self,
        query: &Query,
        filter: Filter,
    ) -> Result<Vec<ToolEntry>, QueryError> {
        let reg = self.ensure_registry().await?;
        Ok(filter.apply(matcher::match_tools(query, &reg)))
    }

    /// Every entry, or those in `category`, in registry order.
    pub async fn list(
        &self,
        category: Option<Category>,
        filter: Filter,
    ) -> Result<Vec<ToolEntry>, QueryError> {
        let reg = self.ensure_registry().await?;
        let entries = reg
            .entries
            .into_iter()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .collect();
        Ok(filter.apply(entries))
    }

    /// Detail for one tool, or None when the registry does not know it.
    pub async fn describe(&self, name: &str) -> Result<Option<ToolDetail>, QueryError> {
        let reg = self.ensure_registry().await?;
        Ok(match reg.get(name) {
            Some(entry) => Some(self.detail(&reg, entry).await),
            None => None,
        })
    }

    pub async fn servers(&self) -> Result<Vec<ServerEntry>, QueryError> {
        Ok(self.ensure_registry().await?.servers)
    }

    async fn detail(&self, reg: &Registry, entry: &ToolEntry) -> ToolDetail {
        let recommended_for = catalog::rules_for(&entry.name)
            .into_iter()
            .map(String::from)
            .collect();
        match entry.kind {
            ToolKind::LocalBinary => ToolDetail {
                entry: self.options.prober.probe(&entry.name).await,
                live: true,
                recommended_for,
                server: None,
            },
            ToolKind::RemoteCapability => ToolDetail {
                entry: entry.clone(),
                live: false,
                recommended_for,
                server: reg.servers.iter().find(|s| s.name == entry.location).cloned(),
            },
        }
    }

    fn persist(&self, reg: &Registry) {
        if let Err(e) = cache::write(&self.cache_path, reg) {
            log::warn!("could not write registry cache: {:#}", e);
        }
    }

    /// Build failed: stale cache, else fallback list (persisted so a cache exists), else unavailable.
    fn recover(&self, err: BuildError) -> Result<Registry, QueryError> {
        log::warn!("registry build failed: {}", err);
        if let Some(stale) = cache::read(&self.cache_path) {
            return Ok(stale.into_fallback());
        }
        if self.fallback {
            let reg = registry::fallback_registry(&self.options.prober);
            self.persist(&reg);
            return Ok(reg);
        }
        Err(QueryError::RegistryUnavailable(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_applies_availability_then_limit() {
        let entries = vec![
            ToolEntry::missing("a"),
            ToolEntry::local("b", "/bin/b", None),
            ToolEntry::local("c", "/bin/c", None),
            ToolEntry::local("d", "/bin/d", None),
        ];
        let f = Filter {
            available_only: true,
            limit: Some(2),
        };
        let names: Vec<_> = f.apply(entries.clone()).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(Filter::default().apply(entries).len(), 4);
    }

    #[test]
    fn detail_serializes_flat() {
        let d = ToolDetail {
            entry: ToolEntry::missing("jq"),
            live: true,
            recommended_for: vec!["json".into()],
            server: None,
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["name"], "jq");
        assert_eq!(v["recommendedFor"][0], "json");
        assert!(v.get("server").is_none());
    }
}
