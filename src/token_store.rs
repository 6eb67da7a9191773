//! Token store (§4.10 / C10): a per-watcher-name persistent random token
//! kept under the user's config directory, the way a deployed watcher
//! survives restarts without re-registering under a new identity.

use crate::error::{Error, Result};
use rand::RngCore;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("monitor"))
        .ok_or_else(|| Error::msg("could not determine user config directory"))
}

fn token_path(watcher_name: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(format!("{watcher_name}.token")))
}

/// Returns the persistent token for `watcher_name`, generating and
/// persisting a new one (32 random bytes, lowercase hex) if none exists.
pub async fn load_or_create(watcher_name: &str) -> Result<String> {
    let dir = config_dir()?;
    tokio::fs::create_dir_all(&dir).await?;
    #[cfg(unix)]
    set_mode(&dir, 0o700).await?;

    let path = token_path(watcher_name)?;
    match tokio::fs::read_to_string(&path).await {
        Ok(existing) => Ok(existing.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let token = generate();
            tokio::fs::write(&path, &token).await?;
            #[cfg(unix)]
            set_mode(&path, 0o600).await?;
            Ok(token)
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the persisted token file for `watcher_name`, if present. Used by
/// the `uninstall` CLI subcommand.
pub async fn remove(watcher_name: &str) -> Result<()> {
    let path = token_path(watcher_name)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[must_use]
fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(unix)]
async fn set_mode(path: &std::path::Path, mode: u32) -> Result<()> {
    let perms = std::fs::Permissions::from_mode(mode);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_64_char_lowercase_hex() {
        let token = generate();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn load_or_create_is_idempotent() {
        // isolate HOME/XDG so this test never touches a real user's config dir
        let tmp = std::env::temp_dir().join(format!("monitor-token-test-{}", generate()));
        tokio::fs::create_dir_all(&tmp).await.unwrap();
        // SAFETY: test-only, single-threaded within this test's own process env mutation window.
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", &tmp);
        }

        let name = "watcher-a";
        let first = load_or_create(name).await.unwrap();
        let second = load_or_create(name).await.unwrap();
        assert_eq!(first, second);

        remove(name).await.unwrap();
        let third = load_or_create(name).await.unwrap();
        assert_ne!(first, third);

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }
}
