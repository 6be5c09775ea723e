use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::error::{Result, ScanError};

static OPEN_SOURCES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn open_sources() -> MutexGuard<'static, HashSet<String>> {
    OPEN_SOURCES
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lease_key(path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    std::fs::canonicalize(Path::new(path))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Process-wide exclusive claim on a source path.
///
/// Held by an open `VideoSource`; dropping it releases the path.
#[derive(Debug)]
pub(crate) struct SourceLease {
    key: String,
}

impl SourceLease {
    pub(crate) fn acquire(path: &str) -> Result<Self> {
        let key = lease_key(path);
        if !open_sources().insert(key.clone()) {
            return Err(ScanError::source_open(
                path,
                "source is already open in another scan",
            ));
        }
        Ok(Self { key })
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        open_sources().remove(&self.key);
    }
}

/// True while some open source holds `path`.
pub fn is_source_open(path: &str) -> bool {
    open_sources().contains(&lease_key(path))
}
