//! External MCP server discovery: read server declarations from known config files and
//! best-effort enumerate each server's tools over stdio or HTTP JSON-RPC.
//!
//! Every failure here is local. A malformed config file is skipped, an unreachable
//! server is reported with `status=error`, and neither stops the rest of discovery.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Instant;

const MCP_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "toolscout";

/// Error recorded for a server whose enumeration was cut off by the build deadline.
pub const BUDGET_EXPIRED: &str = "build budget expired";

/// How a server is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Contacted and enumerated.
    Active,
    /// Declared but enumeration failed; capabilities are empty.
    Error,
    /// Declared; enumeration disabled.
    #[default]
    Configured,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Active => "active",
            ServerStatus::Error => "error",
            ServerStatus::Configured => "configured",
        }
    }
}

/// One capability (MCP tool) exposed by a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A configured server and what enumeration found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    #[serde(default)]
    pub name: String,
    pub description: String,
    /// Config file the declaration came from.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// A server declaration as written in a config file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDecl {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ServerDecl {
    fn transport(&self) -> Transport {
        if self.command.as_deref().is_some_and(|c| !c.trim().is_empty()) {
            Transport::Stdio
        } else if self.url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
            Transport::Http
        } else {
            Transport::Unknown
        }
    }
}

/// Options for [`discover_servers`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// When false, servers are listed as `configured` without being contacted.
    pub enumerate: bool,
    /// Per-server enumeration budget.
    pub timeout: Duration,
    /// Hard stop shared by every server; enumerations still running then are recorded as errors.
    pub deadline: Option<Instant>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            enumerate: true,
            timeout: Duration::from_secs(5),
            deadline: None,
        }
    }
}

/// A server config file to read. Servers from an untrusted file are listed but never started or contacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCandidate {
    pub path: PathBuf,
    pub trusted: bool,
}

impl ServerCandidate {
    pub fn trusted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trusted: true,
        }
    }

    pub fn untrusted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trusted: false,
        }
    }
}

impl From<PathBuf> for ServerCandidate {
    fn from(path: PathBuf) -> Self {
        Self::trusted(path)
    }
}

/// Candidate config files in lookup order: project-local first, then per-user editor/agent configs, then `extra`.
/// Project-local files are trusted only with `trust_project`.
pub fn candidate_paths(
    cwd: Option<&Path>,
    home: Option<&Path>,
    extra: &[PathBuf],
    trust_project: bool,
) -> Vec<ServerCandidate> {
    let mut out = Vec::new();
    if let Some(cwd) = cwd {
        for path in [cwd.join(".mcp.json"), cwd.join(".vscode").join("mcp.json")] {
            out.push(ServerCandidate {
                path,
                trusted: trust_project,
            });
        }
    }
    if let Some(home) = home {
        let user = [
            home.join(".claude.json"),
            home.join(".claude").join("mcp.json"),
            home.join(".cursor").join("mcp.json"),
            home.join(".config")
                .join("Claude")
                .join("claude_desktop_config.json"),
            home.join("Library")
                .join("Application Support")
                .join("Claude")
                .join("claude_desktop_config.json"),
        ];
        out.extend(user.into_iter().map(ServerCandidate::trusted));
    }
    out.extend(extra.iter().cloned().map(ServerCandidate::trusted));
    out
}

/// Candidate paths for the current process (working directory and home directory).
pub fn default_candidate_paths(extra: &[PathBuf], trust_project: bool) -> Vec<ServerCandidate> {
    let cwd = std::env::current_dir().ok();
    let home = dirs::home_dir();
    candidate_paths(cwd.as_deref(), home.as_deref(), extra, trust_project)
}

/// Parse one config document into `(name, declaration)` pairs in key order.
/// Reads `servers`, falling back to `mcpServers`. A declaration that does not fit the schema is returned as an error string.
pub fn parse_server_config(content: &str) -> Result<Vec<(String, Result<ServerDecl, String>)>, String> {
    let doc: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let obj = doc
        .as_object()
        .ok_or_else(|| "config root is not an object".to_string())?;
    let servers = match obj.get("servers").or_else(|| obj.get("mcpServers")) {
        Some(Value::Object(m)) => m,
        Some(_) => return Err("servers is not an object".to_string()),
        None => return Ok(Vec::new()),
    };
    Ok(servers
        .iter()
        .map(|(name, v)| {
            let decl = serde_json::from_value::<ServerDecl>(v.clone()).map_err(|e| e.to_string());
            (name.clone(), decl)
        })
        .collect())
}

/// Read every candidate that exists and parses, then enumerate the declared servers concurrently.
/// Output order: candidate order, then key order within each file; a name seen earlier wins.
pub async fn discover_servers(candidates: &[ServerCandidate], opts: &ServerOptions) -> Vec<ServerEntry> {
    let mut seen = HashSet::new();
    let mut declared = Vec::new();
    for candidate in candidates {
        let path = &candidate.path;
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                log::warn!("skipping server config {}: {}", path.display(), e);
                continue;
            }
        };
        let servers = match parse_server_config(&content) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("skipping server config {}: {}", path.display(), e);
                continue;
            }
        };
        log::debug!("{} server(s) declared in {}", servers.len(), path.display());
        for (name, decl) in servers {
            if !seen.insert(name.clone()) {
                log::debug!("server {} already declared earlier, skipping {}", name, path.display());
                continue;
            }
            if !candidate.trusted && opts.enumerate {
                log::debug!("not starting server {} from untrusted {}", name, path.display());
            }
            let source = path.to_string_lossy().into_owned();
            declared.push((name, decl, source, candidate.trusted));
        }
    }

    let futures = declared
        .into_iter()
        .map(|(name, decl, source, trusted)| resolve_server(name, decl, source, opts, trusted));
    futures_util::future::join_all(futures).await
}

async fn resolve_server(
    name: String,
    decl: Result<ServerDecl, String>,
    source: String,
    opts: &ServerOptions,
    trusted: bool,
) -> ServerEntry {
    let decl = match decl {
        Ok(d) => d,
        Err(e) => {
            log::warn!("server {} in {}: invalid declaration: {}", name, source, e);
            return ServerEntry {
                description: format!("{} MCP server", name),
                name,
                source,
                transport: Transport::Unknown,
                status: ServerStatus::Error,
                error: Some(format!("invalid declaration: {}", e)),
                capabilities: Vec::new(),
            };
        }
    };
    let mut entry = ServerEntry {
        description: decl
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("{} MCP server", name)),
        name,
        source,
        transport: decl.transport(),
        status: ServerStatus::Configured,
        error: None,
        capabilities: Vec::new(),
    };
    if !opts.enumerate || !trusted {
        return entry;
    }

    let own = Instant::now().checked_add(opts.timeout);
    let (until, cut_by_budget) = match (own, opts.deadline) {
        (Some(own), Some(deadline)) if deadline < own => (Some(deadline), true),
        (None, Some(deadline)) => (Some(deadline), true),
        (own, _) => (own, false),
    };
    let result = match until {
        Some(until) => match tokio::time::timeout_at(until, enumerate(&decl, opts.timeout)).await {
            Ok(r) => r,
            Err(_) if cut_by_budget => Err(BUDGET_EXPIRED.to_string()),
            Err(_) => Err(format!("timed out after {:?}", opts.timeout)),
        },
        None => enumerate(&decl, opts.timeout).await,
    };
    match result {
        Ok(caps) => {
            log::debug!("server {}: {} capabilities", entry.name, caps.len());
            entry.status = ServerStatus::Active;
            entry.capabilities = caps;
        }
        Err(e) => {
            log::warn!("server {} unreachable: {}", entry.name, e);
            entry.status = ServerStatus::Error;
            entry.error = Some(e);
        }
    }
    entry
}

async fn enumerate(decl: &ServerDecl, timeout: Duration) -> Result<Vec<Capability>, String> {
    match decl.transport() {
        Transport::Stdio => enumerate_stdio(decl).await,
        Transport::Http => enumerate_http(decl, timeout).await,
        Transport::Unknown => Err("no command or url declared".to_string()),
    }
}

fn initialize_request(id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": MCP_VERSION,
            "capabilities": {},
            "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") }
        }
    })
}

fn initialized_notification() -> Value {
    json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })
}

fn tools_list_request(id: u64) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": "tools/list", "params": {} })
}

/// If `msg` is the response to `id`, return its result (or its error as Err). None for anything else.
fn response_for(msg: &Value, id: u64) -> Option<Result<Value, String>> {
    if msg.get("id").and_then(Value::as_u64) != Some(id) {
        return None;
    }
    if let Some(err) = msg.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(Err(format!("server error: {}", message)));
    }
    Some(Ok(msg.get("result").cloned().unwrap_or(Value::Null)))
}

/// True when the initialize result advertises a tools capability.
fn advertises_tools(init: &Value) -> bool {
    init.get("capabilities")
        .and_then(|c| c.get("tools"))
        .is_some()
}

fn parse_tools(result: &Value) -> Result<Vec<Capability>, String> {
    let tools = result
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| "tools/list result has no tools array".to_string())?;
    Ok(tools
        .iter()
        .filter_map(|t| {
            let name = t.get("name").and_then(Value::as_str)?;
            Some(Capability {
                name: name.to_string(),
                description: t
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        })
        .collect())
}

async fn enumerate_stdio(decl: &ServerDecl) -> Result<Vec<Capability>, String> {
    let command = decl.command.as_deref().unwrap_or_default();
    let mut child = tokio::process::Command::new(command)
        .args(&decl.args)
        .envs(&decl.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("spawn {}: {}", command, e))?;
    let mut stdin = child.stdin.take().ok_or("no stdin")?;
    let stdout = child.stdout.take().ok_or("no stdout")?;
    let mut lines = BufReader::new(stdout).lines();

    let result = async {
        send_line(&mut stdin, &initialize_request(1)).await?;
        let init = read_response(&mut lines, 1).await?;
        if !advertises_tools(&init) {
            return Ok(Vec::new());
        }
        send_line(&mut stdin, &initialized_notification()).await?;
        send_line(&mut stdin, &tools_list_request(2)).await?;
        let tools = read_response(&mut lines, 2).await?;
        parse_tools(&tools)
    }
    .await;

    drop(stdin);
    let _ = child.start_kill();
    result
}

async fn send_line(stdin: &mut tokio::process::ChildStdin, msg: &Value) -> Result<(), String> {
    let mut line = msg.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| format!("write to server: {}", e))?;
    stdin
        .flush()
        .await
        .map_err(|e| format!("write to server: {}", e))
}

async fn read_response<R>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    id: u64,
) -> Result<Value, String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| format!("read from server: {}", e))?
            .ok_or_else(|| "server closed stdout".to_string())?;
        let Ok(msg) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if let Some(r) = response_for(&msg, id) {
            return r;
        }
    }
}

async fn enumerate_http(decl: &ServerDecl, timeout: Duration) -> Result<Vec<Capability>, String> {
    let url = decl.url.as_deref().unwrap_or_default();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;
    let mut session: Option<String> = None;

    let init = http_call(&client, url, decl, &mut session, &initialize_request(1), Some(1)).await?;
    if !advertises_tools(&init) {
        return Ok(Vec::new());
    }
    http_call(&client, url, decl, &mut session, &initialized_notification(), None).await?;
    let tools = http_call(&client, url, decl, &mut session, &tools_list_request(2), Some(2)).await?;
    parse_tools(&tools)
}

/// POST one JSON-RPC message. For requests (`id` set) the matching result is returned; notifications return Null.
async fn http_call(
    client: &reqwest::Client,
    url: &str,
    decl: &ServerDecl,
    session: &mut Option<String>,
    body: &Value,
    id: Option<u64>,
) -> Result<Value, String> {
    let mut req = client
        .post(url)
        .header("Accept", "application/json, text/event-stream")
        .json(body);
    for (k, v) in &decl.headers {
        req = req.header(k.as_str(), v.as_str());
    }
    if let Some(s) = session.as_deref() {
        req = req.header("Mcp-Session-Id", s);
    }
    let resp = req.send().await.map_err(|e| format!("http: {}", e))?;
    if !resp.status().is_success() {
        return Err(format!("http status {}", resp.status()));
    }
    if let Some(s) = resp
        .headers()
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
    {
        *session = Some(s.to_string());
    }
    let Some(id) = id else {
        return Ok(Value::Null);
    };
    let is_sse = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));
    let text = resp.text().await.map_err(|e| format!("http: {}", e))?;
    let messages: Vec<Value> = if is_sse {
        text.lines()
            .filter_map(|l| l.strip_prefix("data:"))
            .filter_map(|d| serde_json::from_str(d.trim()).ok())
            .collect()
    } else {
        let v: Value = serde_json::from_str(&text).map_err(|e| format!("invalid response: {}", e))?;
        match v {
            Value::Array(batch) => batch,
            other => vec![other],
        }
    };
    messages
        .iter()
        .find_map(|m| response_for(m, id))
        .unwrap_or_else(|| Err(format!("no response for request {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_servers_in_key_order() {
        let cfg = r#"{"servers": {"zeta": {"command": "z"}, "alpha": {"url": "http://x", "description": "A"}}}"#;
        let parsed = parse_server_config(cfg).unwrap();
        let names: Vec<_> = parsed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        let alpha = parsed[1].1.as_ref().unwrap();
        assert_eq!(alpha.description.as_deref(), Some("A"));
        assert_eq!(alpha.transport(), Transport::Http);
    }

    #[test]
    fn parse_accepts_mcp_servers_alias_and_ignores_unknown_keys() {
        let cfg = r#"{"theme": "dark", "mcpServers": {"fs": {"command": "npx", "args": ["-y", "fs"], "disabled": false}}}"#;
        let parsed = parse_server_config(cfg).unwrap();
        assert_eq!(parsed.len(), 1);
        let fs = parsed[0].1.as_ref().unwrap();
        assert_eq!(fs.args, vec!["-y", "fs"]);
        assert_eq!(fs.transport(), Transport::Stdio);
    }

    #[test]
    fn parse_without_servers_is_empty_and_bad_json_is_error() {
        assert!(parse_server_config(r#"{"other": 1}"#).unwrap().is_empty());
        assert!(parse_server_config("{not json").is_err());
        assert!(parse_server_config("[]").is_err());
        assert!(parse_server_config(r#"{"servers": []}"#).is_err());
    }

    #[test]
    fn bad_declaration_is_reported_per_server() {
        let cfg = r#"{"servers": {"ok": {"command": "x"}, "bad": {"args": "not-a-list"}}}"#;
        let parsed = parse_server_config(cfg).unwrap();
        assert!(parsed[0].1.is_ok());
        assert!(parsed[1].1.is_err());
    }

    #[test]
    fn candidate_order_is_project_then_home_then_extra() {
        let c = candidate_paths(
            Some(Path::new("/proj")),
            Some(Path::new("/home/u")),
            &[PathBuf::from("/etc/extra.json")],
            false,
        );
        assert_eq!(c[0], ServerCandidate::untrusted("/proj/.mcp.json"));
        assert_eq!(c[1], ServerCandidate::untrusted("/proj/.vscode/mcp.json"));
        assert_eq!(c[2], ServerCandidate::trusted("/home/u/.claude.json"));
        assert_eq!(c.last().unwrap(), &ServerCandidate::trusted("/etc/extra.json"));
        assert!(c[2..].iter().all(|c| c.trusted));

        let trusting = candidate_paths(Some(Path::new("/proj")), None, &[], true);
        assert!(trusting.iter().all(|c| c.trusted));
    }

    #[test]
    fn response_matching() {
        let ok = json!({"jsonrpc": "2.0", "id": 2, "result": {"tools": []}});
        let err = json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "nope"}});
        let note = json!({"jsonrpc": "2.0", "method": "notifications/progress"});
        assert!(response_for(&ok, 2).unwrap().is_ok());
        assert!(response_for(&ok, 1).is_none());
        assert_eq!(response_for(&err, 2).unwrap().unwrap_err(), "server error: nope");
        assert!(response_for(&note, 2).is_none());
    }

    #[test]
    fn parse_tools_skips_nameless_entries() {
        let res = json!({"tools": [{"name": "a", "description": "first"}, {"description": "no name"}, {"name": "b"}]});
        let caps = parse_tools(&res).unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].description.as_deref(), Some("first"));
        assert_eq!(caps[1].description, None);
        assert!(parse_tools(&json!({})).is_err());
    }

    #[tokio::test]
    async fn server_without_transport_is_error() {
        let dir = std::env::temp_dir().join(format!("toolscout-servers-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mcp.json");
        std::fs::write(&path, r#"{"servers": {"ghost": {"description": "Nowhere"}}}"#).unwrap();
        let servers = discover_servers(&[ServerCandidate::from(path)], &ServerOptions::default()).await;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].status, ServerStatus::Error);
        assert_eq!(servers[0].description, "Nowhere");
        assert!(servers[0].capabilities.is_empty());
        assert!(servers[0].error.is_some());
    }

    #[tokio::test]
    async fn enumeration_disabled_marks_configured() {
        let dir = std::env::temp_dir().join(format!("toolscout-servers-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mcp.json");
        std::fs::write(&path, r#"{"servers": {"fs": {"command": "does-not-exist-xyz"}}}"#).unwrap();
        let opts = ServerOptions {
            enumerate: false,
            ..Default::default()
        };
        let servers = discover_servers(&[ServerCandidate::from(path)], &opts).await;
        assert_eq!(servers[0].status, ServerStatus::Configured);
        assert_eq!(servers[0].transport, Transport::Stdio);
        assert_eq!(servers[0].description, "fs MCP server");
    }

    #[tokio::test]
    async fn unreadable_candidate_is_skipped() {
        let dir = std::env::temp_dir().join(format!("toolscout-servers-{}", uuid::Uuid::new_v4()));
        let not_a_file = dir.join("mcp.json");
        std::fs::create_dir_all(&not_a_file).unwrap();
        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"servers": {"fs": {"command": "x"}}}"#).unwrap();
        let opts = ServerOptions {
            enumerate: false,
            ..Default::default()
        };
        let servers = discover_servers(&[ServerCandidate::from(not_a_file), ServerCandidate::from(good)], &opts).await;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "fs");
    }
}
