//! Persistence for active sessions.
//!
//! Active sessions are held in a JSON file under the state directory. An
//! exclusive lock file guards every read-modify-write cycle so two
//! invocations cannot interleave their updates.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use att_core::SessionStore;
use fs2::FileExt;

/// Guard holding the store's lock file. The lock releases when dropped.
pub struct StoreLock {
    _file: File,
}

/// Acquire the exclusive lock guarding `store_path`.
///
/// Blocks until any concurrent invocation releases it.
pub fn lock(store_path: &Path) -> Result<StoreLock> {
    let lock_path = store_path.with_extension("lock");
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(&lock_path)
        .with_context(|| format!("failed to create lock file {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    Ok(StoreLock { _file: file })
}

/// Read the session store, treating a missing file as empty.
pub fn load(store_path: &Path) -> Result<SessionStore> {
    let contents = match fs::read_to_string(store_path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SessionStore::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read {}", store_path.display()));
        }
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", store_path.display()))
}

/// Write the session store back to disk.
pub fn save(store_path: &Path, store: &SessionStore) -> Result<()> {
    if let Some(parent) = store_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(store).context("failed to serialize sessions")?;
    fs::write(store_path, contents)
        .with_context(|| format!("failed to write {}", store_path.display()))
}
