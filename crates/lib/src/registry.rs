//! Registry builder: probe the seed tools and discover servers, merged into one sorted,
//! timestamped snapshot.
//!
//! Probes run concurrently in a bounded pool and each worker fills its own slot, so
//! merging needs no locking. The whole build is bounded by a wall-clock budget; when it
//! expires, in-flight probes are abandoned and recorded as unavailable, finished results
//! are kept, and the registry is marked incomplete.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::catalog;
use crate::entry::{sort_entries, ToolEntry, ToolKind};
use crate::probe::Prober;
use crate::servers::{self, ServerCandidate, ServerEntry, ServerOptions};

/// A timestamped snapshot of every known tool entry. Never mutated after it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub built_at: DateTime<Utc>,
    /// False when the build hit its time budget.
    pub complete: bool,
    /// True for the hardcoded fallback or a stale registry served in place of a fresh build.
    pub fallback: bool,
    pub entries: Vec<ToolEntry>,
    pub servers: Vec<ServerEntry>,
}

impl Registry {
    /// Entries whose name equals `name` (case-insensitive), in registry order.
    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ToolEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name.eq_ignore_ascii_case(name))
    }

    /// Look up by bare name (local binary preferred) or by `server/capability`.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        let name = name.trim();
        if let Some(e) = self
            .entries
            .iter()
            .filter(|e| e.name.eq_ignore_ascii_case(name))
            .min_by_key(|e| e.kind)
        {
            return Some(e);
        }
        let (server, cap) = name.split_once('/')?;
        self.entries.iter().find(|e| {
            e.kind == ToolKind::RemoteCapability
                && e.location.eq_ignore_ascii_case(server)
                && e.name.eq_ignore_ascii_case(cap)
        })
    }

    pub fn available_count(&self) -> usize {
        self.entries.iter().filter(|e| e.available).count()
    }

    /// The same snapshot, marked as served in place of a fresh build.
    pub fn into_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("registry build produced no entries")]
    Empty,
}

/// Inputs for [`build`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Tool names to probe, in order. Duplicates are ignored.
    pub tools: Vec<String>,
    pub prober: Prober,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Wall-clock budget for the whole build.
    pub budget: Duration,
    /// Server config candidates; ignored when `servers` is None.
    pub server_candidates: Vec<ServerCandidate>,
    /// None disables server discovery.
    pub servers: Option<ServerOptions>,
}

impl BuildOptions {
    /// Seed tools from the catalog over PATH, no server discovery.
    pub fn local_only(prober: Prober) -> Self {
        Self {
            tools: catalog::seed_tools().map(String::from).collect(),
            prober,
            concurrency: 8,
            budget: Duration::from_secs(30),
            server_candidates: Vec::new(),
            servers: None,
        }
    }
}

/// Build a registry. Fails only when nothing at all was produced before the deadline.
pub async fn build(opts: &BuildOptions) -> Result<Registry, BuildError> {
    let started = std::time::Instant::now();
    let deadline = deadline_after(opts.budget);
    let names = dedupe(&opts.tools);

    let probes = probe_all(&names, &opts.prober, opts.concurrency, deadline);
    let discovery = async {
        let Some(server_opts) = &opts.servers else {
            return (Vec::new(), true);
        };
        let server_opts = ServerOptions {
            deadline: Some(deadline),
            ..server_opts.clone()
        };
        let found = servers::discover_servers(&opts.server_candidates, &server_opts).await;
        let cut = found
            .iter()
            .filter(|s| s.error.as_deref() == Some(servers::BUDGET_EXPIRED))
            .count();
        if cut > 0 {
            log::warn!("{} server(s) still enumerating when the build budget expired", cut);
        }
        (found, cut == 0)
    };
    let (probed, (servers, servers_complete)) = tokio::join!(probes, discovery);

    if probed.finished == 0 && servers.is_empty() {
        return Err(BuildError::Empty);
    }

    let mut entries = probed.entries;
    let mut seen = HashSet::new();
    for server in &servers {
        for cap in &server.capabilities {
            let entry = ToolEntry::remote(&cap.name, &server.name, cap.description.as_deref());
            if seen.insert(entry.key()) {
                entries.push(entry);
            }
        }
    }
    sort_entries(&mut entries);

    let complete = probed.complete && servers_complete;
    log::info!(
        "built registry: {} entries ({} available), {} servers{} in {:?}",
        entries.len(),
        entries.iter().filter(|e| e.available).count(),
        servers.len(),
        if complete { "" } else { " [incomplete]" },
        started.elapsed()
    );
    Ok(Registry {
        built_at: Utc::now(),
        complete,
        fallback: false,
        entries,
        servers,
    })
}

/// Minimal registry from the hardcoded fallback list: path lookup only, no subprocesses.
pub fn fallback_registry(prober: &Prober) -> Registry {
    let mut entries: Vec<ToolEntry> = catalog::FALLBACK_TOOLS
        .iter()
        .map(|name| prober.probe_path_only(name))
        .collect();
    sort_entries(&mut entries);
    Registry {
        built_at: Utc::now(),
        complete: false,
        fallback: true,
        entries,
        servers: Vec::new(),
    }
}

/// `budget` from now, saturating to a far-future instant instead of overflowing.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn dedupe(tools: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tools
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
        .map(String::from)
        .collect()
}

struct Probed {
    entries: Vec<ToolEntry>,
    /// Probes that finished before the deadline.
    finished: usize,
    complete: bool,
}

async fn probe_all(names: &[String], prober: &Prober, concurrency: usize, deadline: Instant) -> Probed {
    let permits = Arc::new(Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS)));
    let mut set = JoinSet::new();
    for (slot, name) in names.iter().enumerate() {
        let permits = Arc::clone(&permits);
        let prober = prober.clone();
        let name = name.clone();
        set.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            (slot, prober.probe(&name).await)
        });
    }

    let mut slots: Vec<Option<ToolEntry>> = vec![None; names.len()];
    let mut finished = 0;
    let mut complete = true;
    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((slot, entry)))) => {
                slots[slot] = Some(entry);
                finished += 1;
            }
            Ok(Some(Err(e))) => log::warn!("probe task failed: {}", e),
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "build budget expired with {} of {} probes finished",
                    finished,
                    names.len()
                );
                complete = false;
                set.abort_all();
                break;
            }
        }
    }

    let entries = slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| slot.unwrap_or_else(|| ToolEntry::missing(name)))
        .collect();
    Probed {
        entries,
        finished,
        complete,
    }
}
