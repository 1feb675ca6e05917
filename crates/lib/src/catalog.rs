//! Static knowledge base: curated tool descriptions and categories, the seed and
//! fallback tool lists, and the error/task match rules.
//!
//! Everything here is fixed data. Descriptions are curated rather than scraped
//! from `--help`, whose output is too inconsistent across tools to be useful.

use serde::{Deserialize, Serialize};

/// Category of a tool entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Development,
    DataProcessing,
    Network,
    System,
    Archive,
    Container,
    Cloud,
    Documentation,
    /// Capabilities exposed by an external MCP server.
    Remote,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Development,
        Category::DataProcessing,
        Category::Network,
        Category::System,
        Category::Archive,
        Category::Container,
        Category::Cloud,
        Category::Documentation,
        Category::Remote,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Development => "development",
            Category::DataProcessing => "data-processing",
            Category::Network => "network",
            Category::System => "system",
            Category::Archive => "archive",
            Category::Container => "container",
            Category::Cloud => "cloud",
            Category::Documentation => "documentation",
            Category::Remote => "remote",
            Category::Other => "other",
        }
    }

    /// Parse a category name case-insensitively. Underscores and spaces are accepted in place of dashes.
    pub fn parse(s: &str) -> Option<Category> {
        let norm = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Category::ALL.into_iter().find(|c| c.as_str() == norm)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A curated tool: name, category, one-line description.
#[derive(Debug, Clone, Copy)]
pub struct KnownTool {
    pub name: &'static str,
    pub category: Category,
    pub description: &'static str,
}

const fn tool(name: &'static str, category: Category, description: &'static str) -> KnownTool {
    KnownTool {
        name,
        category,
        description,
    }
}

use Category::*;

/// Curated tool table. Also the seed list probed by the registry builder, in this order.
pub const KNOWN_TOOLS: &[KnownTool] = &[
    // development
    tool("git", Development, "Distributed version control system"),
    tool("gh", Development, "GitHub CLI for pull requests, issues and releases"),
    tool("make", Development, "Build automation from Makefiles"),
    tool("cmake", Development, "Cross-platform build system generator"),
    tool("cargo", Development, "Rust package manager and build tool"),
    tool("rustc", Development, "Rust compiler"),
    tool("go", Development, "Go toolchain: build, test and module management"),
    tool("node", Development, "JavaScript runtime"),
    tool("npm", Development, "Node.js package manager"),
    tool("yarn", Development, "Alternative Node.js package manager"),
    tool("pnpm", Development, "Disk-efficient Node.js package manager"),
    tool("python3", Development, "Python 3 interpreter"),
    tool("pip", Development, "Python package installer"),
    tool("pip3", Development, "Python 3 package installer"),
    tool("java", Development, "Java runtime launcher"),
    tool("gcc", Development, "GNU C/C++ compiler"),
    tool("clang", Development, "LLVM C/C++ compiler"),
    tool("gdb", Development, "GNU debugger"),
    tool("valgrind", Development, "Memory error and leak detector"),
    tool("strace", Development, "Trace system calls and signals of a process"),
    tool("rg", Development, "ripgrep: fast recursive regex search"),
    tool("ag", Development, "The Silver Searcher: fast code search"),
    tool("fd", Development, "Fast and user-friendly alternative to find"),
    tool("grep", Development, "Search text using patterns"),
    tool("find", Development, "Search for files in a directory hierarchy"),
    tool("tree", Development, "List directory contents as a tree"),
    tool("diff", Development, "Compare files line by line"),
    // data processing
    tool("jq", DataProcessing, "Command-line JSON processor"),
    tool("yq", DataProcessing, "Command-line YAML processor"),
    tool("mlr", DataProcessing, "Miller: CSV/TSV/JSON record processing"),
    tool("sqlite3", DataProcessing, "SQLite database shell"),
    tool("psql", DataProcessing, "PostgreSQL interactive terminal"),
    tool("mysql", DataProcessing, "MySQL command-line client"),
    tool("awk", DataProcessing, "Pattern scanning and text processing language"),
    tool("sed", DataProcessing, "Stream editor for filtering and transforming text"),
    tool("sort", DataProcessing, "Sort lines of text"),
    tool("csvlook", DataProcessing, "Render CSV as a readable table (csvkit)"),
    // network
    tool("curl", Network, "Transfer data with URLs (HTTP, FTP, ...)"),
    tool("wget", Network, "Non-interactive network downloader"),
    tool("http", Network, "HTTPie: human-friendly HTTP client"),
    tool("ping", Network, "Send ICMP echo requests to network hosts"),
    tool("traceroute", Network, "Print the route packets take to a host"),
    tool("netstat", Network, "Show network connections, routing tables and interfaces"),
    tool("ss", Network, "Investigate sockets"),
    tool("dig", Network, "DNS lookup utility"),
    tool("nslookup", Network, "Query internet name servers"),
    tool("nc", Network, "netcat: read and write data across network connections"),
    tool("nmap", Network, "Network exploration and port scanner"),
    tool("ssh", Network, "OpenSSH remote login client"),
    tool("scp", Network, "Secure copy over SSH"),
    tool("rsync", Network, "Fast incremental file transfer"),
    tool("openssl", Network, "TLS/SSL toolkit and certificate inspection"),
    tool("lsof", Network, "List open files and the processes holding them"),
    // system
    tool("sudo", System, "Execute a command as another user"),
    tool("chmod", System, "Change file mode bits"),
    tool("chown", System, "Change file owner and group"),
    tool("ps", System, "Report a snapshot of current processes"),
    tool("top", System, "Display Linux processes"),
    tool("htop", System, "Interactive process viewer"),
    tool("kill", System, "Send a signal to a process"),
    tool("df", System, "Report file system disk space usage"),
    tool("du", System, "Estimate file space usage"),
    tool("ncdu", System, "NCurses disk usage analyzer"),
    tool("free", System, "Display amount of free and used memory"),
    tool("systemctl", System, "Control the systemd system and service manager"),
    tool("journalctl", System, "Query the systemd journal"),
    tool("which", System, "Locate a command on PATH"),
    tool("brew", System, "Homebrew package manager"),
    tool("apt", System, "Debian/Ubuntu package manager"),
    tool("ls", System, "List directory contents"),
    tool("locate", System, "Find files by name using a prebuilt index"),
    // archive
    tool("tar", Archive, "Create and extract tar archives"),
    tool("zip", Archive, "Package and compress files into zip archives"),
    tool("unzip", Archive, "Extract files from zip archives"),
    tool("gzip", Archive, "Compress or expand files (gzip)"),
    tool("xz", Archive, "Compress or decompress .xz files"),
    tool("7z", Archive, "7-Zip file archiver"),
    // container
    tool("docker", Container, "Build, run and manage containers"),
    tool("docker-compose", Container, "Define and run multi-container applications"),
    tool("podman", Container, "Daemonless container engine"),
    tool("kubectl", Container, "Kubernetes cluster command-line client"),
    tool("helm", Container, "Kubernetes package manager"),
    tool("k9s", Container, "Terminal UI for Kubernetes clusters"),
    // cloud
    tool("aws", Cloud, "Amazon Web Services CLI"),
    tool("gcloud", Cloud, "Google Cloud CLI"),
    tool("az", Cloud, "Microsoft Azure CLI"),
    tool("terraform", Cloud, "Infrastructure as code provisioning"),
    // documentation
    tool("man", Documentation, "Display manual pages"),
    tool("tldr", Documentation, "Simplified, example-driven man pages"),
    tool("pandoc", Documentation, "Universal document converter"),
];

/// Minimal hardcoded inventory used when a full build cannot be obtained.
pub const FALLBACK_TOOLS: &[&str] = &[
    "git", "python3", "node", "npm", "curl", "jq", "grep", "find", "ls",
];

/// Static association between a pattern and an ordered list of recommended tools.
#[derive(Debug, Clone, Copy)]
pub struct MatchRule {
    pub pattern: &'static str,
    pub recommended: &'static [&'static str],
}

const fn rule(pattern: &'static str, recommended: &'static [&'static str]) -> MatchRule {
    MatchRule {
        pattern,
        recommended,
    }
}

/// Error-message patterns, in definition order.
pub const ERROR_RULES: &[MatchRule] = &[
    rule("permission denied", &["sudo", "chmod", "lsof"]),
    rule("command not found", &["which", "brew", "apt"]),
    rule("connection refused", &["netstat", "lsof", "curl", "nc"]),
    rule("address already in use", &["lsof", "netstat", "kill"]),
    rule("port already in use", &["lsof", "netstat", "kill"]),
    rule("no such file or directory", &["find", "ls", "locate"]),
    rule("no space left on device", &["df", "du", "ncdu"]),
    rule("out of memory", &["free", "top", "htop"]),
    rule("too many open files", &["lsof", "ps"]),
    rule("timed out", &["ping", "traceroute", "curl"]),
    rule("could not resolve host", &["dig", "nslookup", "ping"]),
    rule("certificate", &["openssl", "curl"]),
    rule("merge conflict", &["git", "diff"]),
    rule("module not found", &["npm", "node", "pip", "python3"]),
    rule("modulenotfounderror", &["pip", "python3"]),
    rule("segmentation fault", &["gdb", "valgrind", "strace"]),
    rule("cannot connect to the docker daemon", &["docker", "systemctl"]),
    rule("unexpected token", &["jq", "node"]),
    rule("yaml", &["yq"]),
];

/// Task-description patterns, in definition order.
pub const TASK_RULES: &[MatchRule] = &[
    rule("network", &["ping", "netstat", "traceroute", "curl", "dig", "nmap"]),
    rule("dns", &["dig", "nslookup"]),
    rule("http", &["curl", "http", "wget"]),
    rule("api", &["curl", "http", "jq"]),
    rule("download", &["curl", "wget"]),
    rule("json", &["jq", "python3"]),
    rule("yaml", &["yq"]),
    rule("csv", &["mlr", "csvlook", "awk"]),
    rule("search code", &["rg", "ag", "grep"]),
    rule("find files", &["fd", "find", "locate"]),
    rule("text processing", &["awk", "sed", "sort"]),
    rule("version control", &["git", "gh"]),
    rule("pull request", &["gh", "git"]),
    rule("container", &["docker", "podman", "docker-compose"]),
    rule("kubernetes", &["kubectl", "helm", "k9s"]),
    rule("deploy", &["kubectl", "terraform", "docker"]),
    rule("cloud", &["aws", "gcloud", "az", "terraform"]),
    rule("process", &["ps", "top", "htop", "kill"]),
    rule("performance", &["htop", "top", "strace"]),
    rule("memory", &["free", "valgrind", "htop"]),
    rule("disk", &["df", "du", "ncdu"]),
    rule("compress", &["tar", "gzip", "zip", "xz"]),
    rule("archive", &["tar", "zip", "unzip", "7z"]),
    rule("database", &["sqlite3", "psql", "mysql"]),
    rule("debug", &["gdb", "strace", "valgrind"]),
    rule("build", &["make", "cmake", "cargo"]),
    rule("remote server", &["ssh", "scp", "rsync"]),
    rule("documentation", &["man", "tldr", "pandoc"]),
];

/// Look up a curated tool by exact name.
pub fn known(name: &str) -> Option<&'static KnownTool> {
    KNOWN_TOOLS.iter().find(|t| t.name == name)
}

/// Curated description, or `"<name> command line tool"`.
pub fn describe(name: &str) -> String {
    match known(name) {
        Some(t) => t.description.to_string(),
        None => format!("{} command line tool", name),
    }
}

/// Curated category, or [`Category::Other`].
pub fn categorize(name: &str) -> Category {
    known(name).map(|t| t.category).unwrap_or_default()
}

/// Names probed by the registry builder, in table order.
pub fn seed_tools() -> impl Iterator<Item = &'static str> {
    KNOWN_TOOLS.iter().map(|t| t.name)
}

/// Patterns (from both rule sets) that recommend `name`, error rules first.
pub fn rules_for(name: &str) -> Vec<&'static str> {
    ERROR_RULES
        .iter()
        .chain(TASK_RULES.iter())
        .filter(|r| r.recommended.iter().any(|t| t.eq_ignore_ascii_case(name)))
        .map(|r| r.pattern)
        .collect()
}
