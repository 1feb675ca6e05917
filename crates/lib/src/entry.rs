//! Tool entries: one discoverable capability, either a local binary or a capability
//! exposed by an external server.

use serde::{Deserialize, Serialize};

use crate::catalog::{self, Category};

/// Location sentinel for entries that could not be resolved.
pub const NOT_INSTALLED: &str = "not installed";
/// Version sentinel when no version could be determined.
pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    LocalBinary,
    RemoteCapability,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::LocalBinary => "local-binary",
            ToolKind::RemoteCapability => "remote-capability",
        }
    }
}

/// One discoverable capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub description: String,
    pub category: Category,
    pub available: bool,
    /// Resolved path (local binary) or owning server name (remote capability).
    pub location: String,
    pub version: String,
}

impl ToolEntry {
    /// A local binary that was found at `path`.
    pub fn local(name: &str, path: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: ToolKind::LocalBinary,
            description: catalog::describe(name),
            category: catalog::categorize(name),
            available: true,
            location: path.into(),
            version: version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
        }
    }

    /// A known-but-absent local binary. Location and version always hold the sentinels.
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ToolKind::LocalBinary,
            description: catalog::describe(name),
            category: catalog::categorize(name),
            available: false,
            location: NOT_INSTALLED.to_string(),
            version: UNKNOWN_VERSION.to_string(),
        }
    }

    /// A capability exposed by `server`.
    pub fn remote(name: &str, server: &str, description: Option<&str>) -> Self {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("{} capability provided by {}", name, server));
        Self {
            name: name.to_string(),
            kind: ToolKind::RemoteCapability,
            description,
            category: Category::Remote,
            available: true,
            location: server.to_string(),
            version: UNKNOWN_VERSION.to_string(),
        }
    }

    /// Cache map key: the bare name for local binaries, `server/name` for remote capabilities.
    pub fn key(&self) -> String {
        match self.kind {
            ToolKind::LocalBinary => self.name.clone(),
            ToolKind::RemoteCapability => format!("{}/{}", self.location, self.name),
        }
    }

    /// Restore the sentinel invariant on entries read from disk.
    pub(crate) fn normalized(mut self) -> Self {
        if !self.available {
            self.location = NOT_INSTALLED.to_string();
            self.version = UNKNOWN_VERSION.to_string();
        }
        self
    }
}

/// Registry ordering: case-insensitive name, then exact name, type and location.
pub fn sort_entries(entries: &mut [ToolEntry]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.location.cmp(&b.location))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_holds_sentinels() {
        let e = ToolEntry::missing("jq");
        assert!(!e.available);
        assert_eq!(e.location, NOT_INSTALLED);
        assert_eq!(e.version, UNKNOWN_VERSION);
        assert_eq!(e.description, "Command-line JSON processor");
    }

    #[test]
    fn local_entry_with_blank_version_is_unknown() {
        let e = ToolEntry::local("mytool", "/usr/bin/mytool", Some("  ".into()));
        assert_eq!(e.version, UNKNOWN_VERSION);
        assert_eq!(e.description, "mytool command line tool");
        assert_eq!(e.category, Category::Other);
    }

    #[test]
    fn normalized_clears_stale_values() {
        let mut e = ToolEntry::local("git", "/usr/bin/git", Some("git version 2.40".into()));
        e.available = false;
        let e = e.normalized();
        assert_eq!(e.location, NOT_INSTALLED);
        assert_eq!(e.version, UNKNOWN_VERSION);
    }

    #[test]
    fn remote_key_is_qualified() {
        let e = ToolEntry::remote("search", "github", None);
        assert_eq!(e.key(), "github/search");
        assert_eq!(e.description, "search capability provided by github");
        assert_eq!(e.category, Category::Remote);
    }

    #[test]
    fn sort_is_case_insensitive_and_total() {
        let mut v = vec![
            ToolEntry::missing("Zed"),
            ToolEntry::remote("git", "srv", None),
            ToolEntry::missing("apt"),
            ToolEntry::missing("git"),
        ];
        sort_entries(&mut v);
        let names: Vec<_> = v.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("apt", ToolKind::LocalBinary),
                ("git", ToolKind::LocalBinary),
                ("git", ToolKind::RemoteCapability),
                ("Zed", ToolKind::LocalBinary),
            ]
        );
    }

    #[test]
    fn serializes_type_field_kebab_case() {
        let v = serde_json::to_value(ToolEntry::missing("tar")).unwrap();
        assert_eq!(v["type"], "local-binary");
        assert_eq!(v["category"], "archive");
    }
}
