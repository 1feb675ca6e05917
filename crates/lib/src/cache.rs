//! On-disk registry cache: `{timestamp, complete, fallback, tools: {key: entry}, servers: {name: server}}`.
//!
//! Writes go to a temporary file in the same directory and are renamed into place, so a
//! reader never sees a truncated document. Any read or parse failure is reported as
//! "no cache"; callers rebuild.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{sort_entries, ToolEntry};
use crate::registry::Registry;
use crate::servers::ServerEntry;

/// Serialized form. `complete` and `fallback` were added after the first schema and default when absent.
#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    timestamp: DateTime<Utc>,
    #[serde(default = "default_true")]
    complete: bool,
    #[serde(default)]
    fallback: bool,
    #[serde(default)]
    tools: BTreeMap<String, ToolEntry>,
    #[serde(default, with = "servers_by_name")]
    servers: Vec<ServerEntry>,
}

fn default_true() -> bool {
    true
}

impl From<&Registry> for CacheDocument {
    fn from(r: &Registry) -> Self {
        Self {
            timestamp: r.built_at,
            complete: r.complete,
            fallback: r.fallback,
            tools: r.entries.iter().map(|e| (e.key(), e.clone())).collect(),
            servers: r.servers.clone(),
        }
    }
}

impl From<CacheDocument> for Registry {
    fn from(d: CacheDocument) -> Self {
        let mut entries: Vec<ToolEntry> = d.tools.into_values().map(ToolEntry::normalized).collect();
        sort_entries(&mut entries);
        Registry {
            built_at: d.timestamp,
            complete: d.complete,
            fallback: d.fallback,
            entries,
            servers: d.servers,
        }
    }
}

/// Servers as a JSON object keyed by name, preserving discovery order.
mod servers_by_name {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::servers::ServerEntry;

    pub fn serialize<S: Serializer>(servers: &[ServerEntry], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(servers.len()))?;
        for server in servers {
            map.serialize_entry(&server.name, server)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ServerEntry>, D::Error> {
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(d)?;
        map.into_iter()
            .map(|(name, v)| {
                let mut server: ServerEntry = serde_json::from_value(v).map_err(D::Error::custom)?;
                server.name = name;
                Ok(server)
            })
            .collect()
    }
}

/// Write `registry` to `path` atomically (temp file + rename). Creates the parent directory.
pub fn write(path: &Path, registry: &Registry) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating cache directory {}", dir.display()))?;
    let body = serde_json::to_vec_pretty(&CacheDocument::from(registry))
        .context("serializing registry")?;
    let tmp = temp_path(dir, path);
    let written = std::fs::write(&tmp, body)
        .with_context(|| format!("writing {}", tmp.display()))
        .and_then(|_| {
            std::fs::rename(&tmp, path)
                .with_context(|| format!("renaming cache into {}", path.display()))
        });
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written?;
    log::debug!("wrote registry cache {}", path.display());
    Ok(())
}

fn temp_path(dir: &Path, path: &Path) -> PathBuf {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry.json".to_string());
    dir.join(format!(".{}.{}.tmp", file, uuid::Uuid::new_v4()))
}

/// Read the cache. Missing, unreadable, truncated or malformed files all yield None.
pub fn read(path: &Path) -> Option<Registry> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no registry cache at {}", path.display());
            return None;
        }
        Err(e) => {
            log::warn!("reading registry cache {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice::<CacheDocument>(&bytes) {
        Ok(doc) => Some(doc.into()),
        Err(e) => {
            log::warn!("ignoring corrupt registry cache {}: {}", path.display(), e);
            None
        }
    }
}

/// A cache is fresh when it is a real build (not a fallback) younger than `max_age`.
pub fn is_fresh(registry: &Registry, max_age: Duration, now: DateTime<Utc>) -> bool {
    if registry.fallback {
        return false;
    }
    let age = now.signed_duration_since(registry.built_at);
    match age.to_std() {
        Ok(age) => age < max_age,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servers::{Capability, ServerStatus, Transport};

    fn temp_cache_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("toolscout-cache-{}", uuid::Uuid::new_v4()))
            .join("registry.json")
    }

    fn sample() -> Registry {
        let mut entries = vec![
            ToolEntry::local("git", "/usr/bin/git", Some("git version 2.43.0".into())),
            ToolEntry::missing("jq"),
            ToolEntry::remote("search", "github", Some("Search code")),
        ];
        sort_entries(&mut entries);
        Registry {
            built_at: Utc::now(),
            complete: true,
            fallback: false,
            entries,
            servers: vec![
                ServerEntry {
                    name: "zeta".into(),
                    description: "Z".into(),
                    source: "/x/.mcp.json".into(),
                    transport: Transport::Http,
                    status: ServerStatus::Error,
                    error: Some("timed out".into()),
                    capabilities: Vec::new(),
                },
                ServerEntry {
                    name: "github".into(),
                    description: "GitHub".into(),
                    source: "/x/.mcp.json".into(),
                    transport: Transport::Stdio,
                    status: ServerStatus::Active,
                    error: None,
                    capabilities: vec![Capability {
                        name: "search".into(),
                        description: Some("Search code".into()),
                    }],
                },
            ],
        }
    }

    #[test]
    fn write_then_read_is_lossless() {
        let path = temp_cache_path();
        let reg = sample();
        write(&path, &reg).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back, reg);
        let names: Vec<_> = back.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "github"]);
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let path = temp_cache_path();
        write(&path, &sample()).unwrap();
        write(&path, &sample()).unwrap();
        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["registry.json"]);
    }

    #[test]
    fn failed_write_removes_temp_file() {
        let path = temp_cache_path();
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        assert!(write(&path, &sample()).is_err());
        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["registry.json"]);
    }

    #[test]
    fn truncated_or_garbage_cache_reads_as_absent() {
        let path = temp_cache_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();
        assert!(read(&path).is_none());
        std::fs::write(&path, b"{\"timestamp\": \"2024-01-01T00:00:00Z\", \"tools\": {").unwrap();
        assert!(read(&path).is_none());
        assert!(read(&path.with_file_name("absent.json")).is_none());
    }

    #[test]
    fn older_schema_without_flags_loads() {
        let path = temp_cache_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let doc = r#"{
            "timestamp": "2024-05-01T12:00:00Z",
            "tools": {
                "jq": {"name": "jq", "type": "local-binary", "description": "d", "category": "data-processing",
                       "available": false, "location": "/stale/jq", "version": "1.6"}
            },
            "servers": {},
            "futureField": 42
        }"#;
        std::fs::write(&path, doc).unwrap();
        let reg = read(&path).unwrap();
        assert!(reg.complete);
        assert!(!reg.fallback);
        assert_eq!(reg.entries.len(), 1);
        assert_eq!(reg.entries[0].location, crate::entry::NOT_INSTALLED);
        assert_eq!(reg.entries[0].version, crate::entry::UNKNOWN_VERSION);
    }

    #[test]
    fn freshness() {
        let now = Utc::now();
        let mut reg = sample();
        reg.built_at = now - chrono::Duration::seconds(10);
        assert!(is_fresh(&reg, Duration::from_secs(60), now));
        assert!(!is_fresh(&reg, Duration::from_secs(5), now));
        reg.built_at = now + chrono::Duration::seconds(600);
        assert!(!is_fresh(&reg, Duration::from_secs(60), now));
        reg.built_at = now;
        reg.fallback = true;
        assert!(!is_fresh(&reg, Duration::from_secs(60), now));
    }
}
