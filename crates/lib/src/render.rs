//! Text, markdown and JSON renderings of query results, sized for an assistant's context.

use serde::Serialize;

use crate::entry::{ToolEntry, ToolKind};
use crate::query::ToolDetail;
use crate::registry::Registry;
use crate::servers::ServerEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown format: {} (expected text, markdown or json)", other)),
        }
    }
}

const NO_MATCH: &str = "no matching tools";

fn mark(e: &ToolEntry) -> &'static str {
    if e.available {
        "✓"
    } else {
        "✗"
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// One line per entry; the cheap summary callers see first.
pub fn entries(list: &[ToolEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json(list),
        OutputFormat::Text => {
            if list.is_empty() {
                return NO_MATCH.to_string();
            }
            list.iter()
                .map(|e| {
                    let origin = match e.kind {
                        ToolKind::LocalBinary => String::new(),
                        ToolKind::RemoteCapability => format!(" @{}", e.location),
                    };
                    format!("{} {}{} [{}] - {}", mark(e), e.name, origin, e.category, e.description)
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        OutputFormat::Markdown => {
            if list.is_empty() {
                return format!("_{}_", NO_MATCH);
            }
            let mut out = String::from("| | Tool | Category | Description |\n|---|---|---|---|\n");
            for e in list {
                let name = match e.kind {
                    ToolKind::LocalBinary => format!("`{}`", e.name),
                    ToolKind::RemoteCapability => format!("`{}` ({})", e.name, e.location),
                };
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    mark(e),
                    name,
                    e.category,
                    e.description.replace('|', "\\|")
                ));
            }
            out.trim_end().to_string()
        }
    }
}

/// Full detail for one tool.
pub fn detail(d: &ToolDetail, format: OutputFormat) -> String {
    let e = &d.entry;
    match format {
        OutputFormat::Json => json(d),
        OutputFormat::Text | OutputFormat::Markdown => {
            let md = format == OutputFormat::Markdown;
            let mut lines = Vec::new();
            if md {
                lines.push(format!("### `{}`", e.name));
            } else {
                lines.push(e.name.clone());
            }
            let bullet = if md { "- " } else { "  " };
            lines.push(format!("{}description: {}", bullet, e.description));
            lines.push(format!("{}type: {}", bullet, e.kind.as_str()));
            lines.push(format!("{}category: {}", bullet, e.category));
            lines.push(format!("{}available: {}", bullet, if e.available { "yes" } else { "no" }));
            let location_label = match e.kind {
                ToolKind::LocalBinary => "path",
                ToolKind::RemoteCapability => "server",
            };
            lines.push(format!("{}{}: {}", bullet, location_label, e.location));
            lines.push(format!("{}version: {}", bullet, e.version));
            if !d.recommended_for.is_empty() {
                lines.push(format!("{}recommended for: {}", bullet, d.recommended_for.join(", ")));
            }
            if let Some(s) = &d.server {
                lines.push(format!(
                    "{}server status: {} ({} capabilities, from {})",
                    bullet,
                    s.status.as_str(),
                    s.capabilities.len(),
                    s.source
                ));
            }
            lines.join("\n")
        }
    }
}

/// Configured servers with their status.
pub fn servers(list: &[ServerEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json(list),
        OutputFormat::Text | OutputFormat::Markdown => {
            if list.is_empty() {
                return "no servers configured".to_string();
            }
            let bullet = if format == OutputFormat::Markdown { "- " } else { "" };
            list.iter()
                .map(|s| {
                    let mut line = format!(
                        "{}{} [{}] {} capabilities - {}",
                        bullet,
                        s.name,
                        s.status.as_str(),
                        s.capabilities.len(),
                        s.description
                    );
                    if let Some(err) = &s.error {
                        line.push_str(&format!(" ({})", err));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// One-paragraph summary for the session-start hook.
pub fn summary(reg: &Registry) -> String {
    let mut s = format!(
        "{} tools known, {} available",
        reg.entries.len(),
        reg.available_count()
    );
    if !reg.servers.is_empty() {
        s.push_str(&format!(", {} MCP servers", reg.servers.len()));
    }
    if reg.fallback {
        s.push_str(" (fallback inventory; full discovery pending)");
    } else if !reg.complete {
        s.push_str(" (partial: discovery hit its time budget)");
    }
    s.push_str(". Use `toolscout discover --error <msg>` or `--task <desc>` to find tools, `toolscout describe <name>` for detail.");
    s
}

/// Session-start output: the summary line, or a JSON object with the same counts.
pub fn hook(reg: &Registry, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json(&serde_json::json!({
            "summary": summary(reg),
            "builtAt": reg.built_at,
            "tools": reg.entries.len(),
            "available": reg.available_count(),
            "servers": reg.servers.len(),
            "complete": reg.complete,
            "fallback": reg.fallback,
        })),
        OutputFormat::Text | OutputFormat::Markdown => summary(reg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_explicit() {
        assert_eq!(entries(&[], OutputFormat::Text), "no matching tools");
        assert_eq!(entries(&[], OutputFormat::Json), "[]");
    }

    #[test]
    fn text_line_shows_mark_category_and_server() {
        let list = vec![
            ToolEntry::local("jq", "/usr/bin/jq", None),
            ToolEntry::remote("search", "github", Some("Search code")),
        ];
        let out = entries(&list, OutputFormat::Text);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "✓ jq [data-processing] - Command-line JSON processor");
        assert_eq!(lines[1], "✓ search @github [remote] - Search code");
    }

    #[test]
    fn markdown_escapes_pipes() {
        let mut e = ToolEntry::missing("x");
        e.description = "a | b".into();
        let out = entries(&[e], OutputFormat::Markdown);
        assert!(out.contains("a \\| b"));
        assert!(out.starts_with("| | Tool |"));
    }

    #[test]
    fn fallback_summary_says_so() {
        let reg = Registry {
            built_at: chrono::Utc::now(),
            complete: false,
            fallback: true,
            entries: vec![ToolEntry::missing("git")],
            servers: Vec::new(),
        };
        let s = summary(&reg);
        assert!(s.starts_with("1 tools known, 0 available (fallback inventory"));
        let v: serde_json::Value = serde_json::from_str(&hook(&reg, OutputFormat::Json)).unwrap();
        assert_eq!(v["fallback"], true);
        assert_eq!(v["tools"], 1);
    }

    #[test]
    fn format_parse() {
        assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
