//! System tool prober: resolve a tool name on the executable search path and ask it for a version.
//!
//! Probing never fails. A missing tool, a failing or hanging version query, or a
//! spawn error all end up recorded in the returned [`ToolEntry`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use crate::entry::ToolEntry;

/// Version flags tried in order; first non-empty successful output wins.
const VERSION_FLAGS: [&str; 2] = ["--version", "-V"];
const MAX_VERSION_LEN: usize = 120;

/// Resolves tool names against a list of search directories (PATH by default).
#[derive(Debug, Clone)]
pub struct Prober {
    search_dirs: Vec<PathBuf>,
    version_timeout: Duration,
}

impl Prober {
    /// Prober over the process PATH.
    pub fn from_env(version_timeout: Duration) -> Self {
        let search_dirs = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        Self::with_search_dirs(search_dirs, version_timeout)
    }

    /// Prober over an explicit list of directories.
    pub fn with_search_dirs(search_dirs: Vec<PathBuf>, version_timeout: Duration) -> Self {
        Self {
            search_dirs: search_dirs
                .into_iter()
                .filter(|d| !d.as_os_str().is_empty())
                .collect(),
            version_timeout,
        }
    }

    pub fn version_timeout(&self) -> Duration {
        self.version_timeout
    }

    /// Path lookup only (no subprocess). Names containing a path separator are checked as given.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
            let p = Path::new(name);
            return is_executable(p).then(|| p.to_path_buf());
        }
        for dir in &self.search_dirs {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Some(candidate);
            }
            #[cfg(windows)]
            {
                let with_ext = dir.join(format!("{}.exe", name));
                if is_executable(&with_ext) {
                    return Some(with_ext);
                }
            }
        }
        None
    }

    /// Resolve `name` and query its version. Never fails.
    pub async fn probe(&self, name: &str) -> ToolEntry {
        let Some(path) = self.resolve(name) else {
            log::debug!("probe {}: not found", name);
            return ToolEntry::missing(name);
        };
        let version = self.query_version(&path).await;
        log::debug!(
            "probe {}: {} ({})",
            name,
            path.display(),
            version.as_deref().unwrap_or("no version")
        );
        ToolEntry::local(name, path.to_string_lossy(), version)
    }

    /// Resolve without running anything; version is always unknown. Used for the fallback registry.
    pub fn probe_path_only(&self, name: &str) -> ToolEntry {
        match self.resolve(name) {
            Some(path) => ToolEntry::local(name, path.to_string_lossy(), None),
            None => ToolEntry::missing(name),
        }
    }

    async fn query_version(&self, path: &Path) -> Option<String> {
        for flag in VERSION_FLAGS {
            match run_version(path, flag, self.version_timeout).await {
                Ok(Some(v)) => return Some(v),
                Ok(None) => {}
                Err(e) => log::debug!("{} {}: {}", path.display(), flag, e),
            }
        }
        None
    }
}

/// Run `path flag` with stdin closed; returns the first non-empty output line on success.
async fn run_version(path: &Path, flag: &str, timeout: Duration) -> Result<Option<String>, String> {
    let child = tokio::process::Command::new(path)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| format!("timed out after {:?}", timeout))?
        .map_err(|e| format!("exec failed: {}", e))?;
    if !output.status.success() {
        return Err(format!("exit {}", output.status));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(first_line(&stdout).or_else(|| first_line(&stderr)))
}

fn first_line(s: &str) -> Option<String> {
    let line = s.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(MAX_VERSION_LEN).collect())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(m) => m.is_file() && m.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{NOT_INSTALLED, UNKNOWN_VERSION};

    fn temp_bin_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("toolscout-probe-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp bin dir");
        dir
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[test]
    fn first_line_skips_blank_lines_and_truncates() {
        assert_eq!(first_line("\n  \n v1.2 \nmore"), Some("v1.2".to_string()));
        assert_eq!(first_line("   "), None);
        let long = "x".repeat(500);
        assert_eq!(first_line(&long).map(|s| s.len()), Some(MAX_VERSION_LEN));
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable_with_sentinels() {
        let dir = temp_bin_dir();
        let prober = Prober::with_search_dirs(vec![dir], Duration::from_secs(1));
        let e = prober.probe("definitely-not-a-real-tool-xyz").await;
        assert!(!e.available);
        assert_eq!(e.location, NOT_INSTALLED);
        assert_eq!(e.version, UNKNOWN_VERSION);
        assert_eq!(e.description, "definitely-not-a-real-tool-xyz command line tool");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn present_tool_reports_path_and_version() {
        let dir = temp_bin_dir();
        let path = write_script(&dir, "fakever", "echo \"fakever 1.2.3\"");
        let prober = Prober::with_search_dirs(vec![dir], Duration::from_secs(5));
        let e = prober.probe("fakever").await;
        assert!(e.available);
        assert_eq!(e.location, path.to_string_lossy());
        assert_eq!(e.version, "fakever 1.2.3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn falls_back_to_short_flag() {
        let dir = temp_bin_dir();
        write_script(
            &dir,
            "shortflag",
            "if [ \"$1\" = \"-V\" ]; then echo \"shortflag 0.9\" >&2; exit 0; fi\nexit 2",
        );
        let prober = Prober::with_search_dirs(vec![dir], Duration::from_secs(5));
        let e = prober.probe("shortflag").await;
        assert!(e.available);
        assert_eq!(e.version, "shortflag 0.9");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hanging_version_query_is_unknown_not_error() {
        let dir = temp_bin_dir();
        write_script(&dir, "sleeper", "sleep 10");
        let prober = Prober::with_search_dirs(vec![dir], Duration::from_millis(200));
        let e = prober.probe("sleeper").await;
        assert!(e.available);
        assert_eq!(e.version, UNKNOWN_VERSION);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_not_resolved() {
        let dir = temp_bin_dir();
        std::fs::write(dir.join("plain"), "not a program").unwrap();
        let prober = Prober::with_search_dirs(vec![dir.clone()], Duration::from_secs(1));
        assert!(prober.resolve("plain").is_none());
        let abs = dir.join("plain");
        assert!(prober.resolve(abs.to_str().unwrap()).is_none());
    }

    #[test]
    fn empty_search_dirs_are_ignored() {
        let prober = Prober::with_search_dirs(vec![PathBuf::new()], Duration::from_secs(1));
        assert!(prober.search_dirs.is_empty());
        assert!(prober.resolve("").is_none());
    }
}
