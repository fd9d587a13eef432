//! Session files. One grammers SqliteSession per phone number.
//!
//! Files live in `<data_dir>/sessions/<digits>.session` so several accounts
//! can be logged in one after another without clobbering each other.

use grammers_session::storages::SqliteSession;
use std::path::{Path, PathBuf};

pub const SESSION_EXTENSION: &str = "session";

/// Session file for `phone`: digits only, so `+1 (555) 0100` and `15550100` share a file.
pub fn session_path(sessions_dir: &Path, phone: &str) -> PathBuf {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let stem = if digits.is_empty() { "default" } else { digits.as_str() };
    sessions_dir.join(format!("{}.{}", stem, SESSION_EXTENSION))
}

/// Opens a persistent session storage at the given path.
///
/// The file is created if it does not exist. Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, or if the
/// SQLite database cannot be opened (e.g. permissions, disk full).
pub async fn open_file_session(path: impl AsRef<Path>) -> anyhow::Result<SqliteSession> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("create session directory: {}", e))?;
    }
    SqliteSession::open(path)
        .await
        .map_err(|e| anyhow::anyhow!("open session file: {}", e))
}

/// Delete one session file. Missing files are fine.
pub async fn remove_session(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Delete every `*.session` file in `sessions_dir`. Returns how many were removed.
pub async fn remove_all_sessions(sessions_dir: &Path) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(sessions_dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == SESSION_EXTENSION) {
            remove_session(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_path_keeps_digits_only() {
        let dir = Path::new("/data/sessions");
        assert_eq!(
            session_path(dir, "+1 (555) 0100"),
            PathBuf::from("/data/sessions/15550100.session")
        );
        assert_eq!(session_path(dir, "+"), PathBuf::from("/data/sessions/default.session"));
    }

    #[tokio::test]
    async fn remove_all_only_touches_session_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.session"), b"x").unwrap();
        std::fs::write(dir.path().join("2.session"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(remove_all_sessions(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(remove_all_sessions(&dir.path().join("missing")).await.unwrap(), 0);
        remove_session(&dir.path().join("1.session")).await.unwrap();
    }
}
