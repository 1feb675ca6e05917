//! Matcher: rank registry entries for an error message, task description, free text,
//! category or tool name.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, Category, MatchRule};
use crate::entry::ToolEntry;
use crate::registry::Registry;

/// What kind of input a query carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Error message, matched against the error rules.
    Error,
    /// Task description, matched against the task rules.
    Task,
    /// Substring over name, description and category.
    Text,
    /// Exact category.
    Category,
    /// Exact tool name.
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub mode: QueryMode,
    pub value: String,
}

impl Query {
    pub fn new(mode: QueryMode, value: impl Into<String>) -> Self {
        Self {
            mode,
            value: value.into(),
        }
    }

    pub fn error(value: impl Into<String>) -> Self {
        Self::new(QueryMode::Error, value)
    }

    pub fn task(value: impl Into<String>) -> Self {
        Self::new(QueryMode::Task, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(QueryMode::Text, value)
    }
}

/// Entries matching `query`, most relevant first. An empty result is a normal outcome.
pub fn match_tools(query: &Query, registry: &Registry) -> Vec<ToolEntry> {
    match query.mode {
        QueryMode::Error => by_rules(catalog::ERROR_RULES, &query.value, registry),
        QueryMode::Task => by_rules(catalog::TASK_RULES, &query.value, registry),
        QueryMode::Text => by_text(&query.value, registry),
        QueryMode::Category => match Category::parse(&query.value) {
            Some(c) => registry
                .entries
                .iter()
                .filter(|e| e.category == c)
                .cloned()
                .collect(),
            None => Vec::new(),
        },
        QueryMode::Name => registry.find(query.value.trim()).cloned().collect(),
    }
}

/// Symmetric containment, case-insensitive: pattern in value, or value in pattern.
fn rule_matches(rule: &MatchRule, value_lower: &str) -> bool {
    value_lower.contains(rule.pattern) || rule.pattern.contains(value_lower)
}

/// Recommended tool names from every matching rule, in rule order, first occurrence kept.
pub fn recommendations(rules: &[MatchRule], value: &str) -> Vec<&'static str> {
    let value = value.trim().to_lowercase();
    let mut seen = HashSet::new();
    rules
        .iter()
        .filter(|r| rule_matches(r, &value))
        .flat_map(|r| r.recommended.iter().copied())
        .filter(|name| seen.insert(*name))
        .collect()
}

fn by_rules(rules: &[MatchRule], value: &str, registry: &Registry) -> Vec<ToolEntry> {
    recommendations(rules, value)
        .into_iter()
        .flat_map(|name| registry.find(name).cloned().collect::<Vec<_>>())
        .collect()
}

fn by_text(value: &str, registry: &Registry) -> Vec<ToolEntry> {
    let needle = value.trim().to_lowercase();
    registry
        .entries
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle)
                || e.description.to_lowercase().contains(&needle)
                || e.category.as_str().contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::sort_entries;
    use chrono::Utc;

    fn registry(entries: Vec<ToolEntry>) -> Registry {
        let mut entries = entries;
        sort_entries(&mut entries);
        Registry {
            built_at: Utc::now(),
            complete: true,
            fallback: false,
            entries,
            servers: Vec::new(),
        }
    }

    fn names(v: &[ToolEntry]) -> Vec<&str> {
        v.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn permission_denied_returns_curated_order() {
        let reg = registry(vec![
            ToolEntry::missing("lsof"),
            ToolEntry::local("sudo", "/usr/bin/sudo", None),
            ToolEntry::local("chmod", "/bin/chmod", None),
        ]);
        let got = match_tools(&Query::error("permission denied"), &reg);
        assert_eq!(names(&got), vec!["sudo", "chmod", "lsof"]);
    }

    #[test]
    fn error_pattern_contained_in_longer_message() {
        let reg = registry(vec![
            ToolEntry::missing("sudo"),
            ToolEntry::missing("chmod"),
            ToolEntry::missing("lsof"),
        ]);
        let got = match_tools(&Query::error("bash: /etc/hosts: Permission denied"), &reg);
        assert_eq!(names(&got), vec!["sudo", "chmod", "lsof"]);
    }

    #[test]
    fn abbreviated_query_matches_longer_pattern() {
        let recs = recommendations(catalog::ERROR_RULES, "permission");
        assert_eq!(&recs[..3], &["sudo", "chmod", "lsof"]);
    }

    #[test]
    fn unknown_recommendations_are_dropped() {
        let reg = registry(vec![ToolEntry::missing("chmod")]);
        let got = match_tools(&Query::error("permission denied"), &reg);
        assert_eq!(names(&got), vec!["chmod"]);
    }

    #[test]
    fn overlapping_rules_dedupe_keeping_first() {
        let recs = recommendations(
            catalog::ERROR_RULES,
            "connection refused: address already in use",
        );
        assert_eq!(recs, vec!["netstat", "lsof", "curl", "nc", "kill"]);
    }

    #[test]
    fn network_task_includes_network_tools() {
        let reg = registry(
            ["ping", "netstat", "traceroute", "gdb", "jq"]
                .iter()
                .map(|n| ToolEntry::missing(n))
                .collect(),
        );
        let got = match_tools(&Query::task("debug network issues"), &reg);
        let got = names(&got);
        assert_eq!(&got[..3], &["ping", "netstat", "traceroute"]);
        assert!(got.contains(&"gdb"));
        assert!(!got.contains(&"jq"));
    }

    #[test]
    fn empty_text_returns_everything_in_registry_order() {
        let reg = registry(vec![
            ToolEntry::missing("tar"),
            ToolEntry::missing("git"),
            ToolEntry::missing("jq"),
        ]);
        let got = match_tools(&Query::text(""), &reg);
        assert_eq!(names(&got), vec!["git", "jq", "tar"]);
    }

    #[test]
    fn text_matches_description_and_category() {
        let reg = registry(vec![
            ToolEntry::missing("jq"),
            ToolEntry::missing("tar"),
            ToolEntry::remote("fetch", "web", Some("Fetch a URL")),
        ]);
        assert_eq!(names(&match_tools(&Query::text("JSON"), &reg)), vec!["jq"]);
        assert_eq!(names(&match_tools(&Query::text("archive"), &reg)), vec!["tar"]);
        assert_eq!(names(&match_tools(&Query::text("remote"), &reg)), vec!["fetch"]);
        assert!(match_tools(&Query::text("kubernetes"), &reg).is_empty());
    }

    #[test]
    fn category_and_name_are_exact() {
        let reg = registry(vec![
            ToolEntry::missing("jq"),
            ToolEntry::missing("yq"),
            ToolEntry::missing("git"),
        ]);
        let cat = match_tools(&Query::new(QueryMode::Category, "Data-Processing"), &reg);
        assert_eq!(names(&cat), vec!["jq", "yq"]);
        assert!(match_tools(&Query::new(QueryMode::Category, "data"), &reg).is_empty());
        assert_eq!(names(&match_tools(&Query::new(QueryMode::Name, "GIT"), &reg)), vec!["git"]);
        assert!(match_tools(&Query::new(QueryMode::Name, "gi"), &reg).is_empty());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let reg = registry(vec![ToolEntry::missing("git")]);
        assert!(match_tools(&Query::error("the flux capacitor overheated"), &reg).is_empty());
    }
}
