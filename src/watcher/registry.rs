//! Probe registry (§4.2 / C2): scans a directory for probe executables and
//! invokes each in describe mode to build the set of bindings the watcher
//! registers with the web service.

use crate::contract::Description;
use crate::wire::RegisterProbeType;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

const DESCRIBE_FLAG: &str = "--describe";
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a directory child into the probe executable path: either
/// `<child>/<child>` (a probe shipped as its own directory) or `<child>`
/// itself (a bare executable).
fn resolve_executable(child: &Path) -> Option<PathBuf> {
    if child.is_dir() {
        let name = child.file_name()?;
        let nested = child.join(name);
        if is_executable(&nested) {
            return Some(nested);
        }
        None
    } else if is_executable(child) {
        Some(child.to_path_buf())
    } else {
        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

async fn describe(executable_path: &Path) -> Option<Description> {
    let mut cmd = Command::new(executable_path);
    cmd.arg(DESCRIBE_FLAG)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = match tokio::time::timeout(DESCRIBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(probe = %executable_path.display(), error = %e, "failed to spawn probe for describe");
            return None;
        }
        Err(_elapsed) => {
            warn!(probe = %executable_path.display(), "describe timed out");
            return None;
        }
    };

    if !output.status.success() {
        warn!(probe = %executable_path.display(), status = ?output.status, "describe exited non-zero");
        return None;
    }

    match serde_json::from_slice::<Description>(&output.stdout) {
        Ok(desc) => Some(desc),
        Err(e) => {
            warn!(probe = %executable_path.display(), error = %e, "describe output was not valid JSON");
            None
        }
    }
}

/// Scans `probes_dir`'s immediate children, describes each resolvable
/// executable, and returns the set of probe-type registration payloads.
/// Rediscovery is idempotent: running this twice with no filesystem
/// changes yields the same bindings (Testable Property implicit in §4.2).
pub async fn discover(probes_dir: &Path) -> crate::error::Result<Vec<RegisterProbeType>> {
    let mut entries = match tokio::fs::read_dir(probes_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %probes_dir.display(), error = %e, "could not read probes directory");
            return Ok(Vec::new());
        }
    };

    let mut discovered = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Some(executable_path) = resolve_executable(&entry.path()) else {
            continue;
        };
        let Some(desc) = describe(&executable_path).await else {
            continue;
        };

        discovered.push(RegisterProbeType {
            name: desc.name,
            version: desc.version,
            description: desc.description,
            arguments: desc.arguments,
            executable_path: executable_path.to_string_lossy().to_string(),
            subcommand: None,
        });
    }

    discovered.sort_by(|a, b| (a.name.as_str(), a.version.as_str()).cmp(&(b.name.as_str(), b.version.as_str())));
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    async fn write_fake_probe(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, body).await.unwrap();
        let mut perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&path, perms).await.unwrap();
        path
    }

    #[tokio::test]
    async fn discovers_bare_executables_and_skips_failures() {
        let tmp = std::env::temp_dir().join(format!("monitor-registry-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&tmp).await.unwrap();

        write_fake_probe(
            &tmp,
            "disk-space",
            "#!/bin/sh\necho '{\"name\":\"disk-space\",\"description\":\"d\",\"version\":\"1.0.0\",\"arguments\":{\"required\":{},\"optional\":{}}}'\n",
        )
        .await;

        write_fake_probe(&tmp, "broken", "#!/bin/sh\nexit 1\n").await;

        let found = discover(&tmp).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "disk-space");

        let found_again = discover(&tmp).await.unwrap();
        assert_eq!(found_again.len(), found.len());
        assert_eq!(found_again[0].name, found[0].name);

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }

    #[tokio::test]
    async fn missing_directory_yields_empty_not_error() {
        let found = discover(Path::new("/nonexistent/probes/dir")).await.unwrap();
        assert!(found.is_empty());
    }
}
