//! Download cache: a stable key-to-path mapping plus per-key locks so at most
//! one fetch per resource is in flight.

use crate::pipeline::CancelToken;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
    in_flight: Mutex<HashSet<String>>,
    released: Condvar,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path for `key`. The file name is the SHA-256 of the key followed
    /// by the extension of the key's path component, if any.
    pub fn resolve(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut name = to_hex(&digest);
        if let Some(ext) = key_extension(key) {
            name.push('.');
            name.push_str(ext);
        }
        self.dir.join(name)
    }

    /// Blocks until `key` is free and takes it. The lease releases the key
    /// when dropped.
    pub fn lock(&self, key: &str) -> CacheLease<'_> {
        let mut in_flight = self.in_flight();
        while in_flight.contains(key) {
            in_flight = self
                .released
                .wait(in_flight)
                .unwrap_or_else(|err| err.into_inner());
        }
        self.take(in_flight, key)
    }

    /// Like [`FileCache::lock`], but gives up and returns `None` once `cancel`
    /// is set.
    pub fn lock_or_cancel(&self, key: &str, cancel: &CancelToken) -> Option<CacheLease<'_>> {
        let mut in_flight = self.in_flight();
        while in_flight.contains(key) {
            if cancel.is_cancelled() {
                return None;
            }
            let (guard, _) = self
                .released
                .wait_timeout(in_flight, LOCK_POLL_INTERVAL)
                .unwrap_or_else(|err| err.into_inner());
            in_flight = guard;
        }
        if cancel.is_cancelled() {
            return None;
        }
        Some(self.take(in_flight, key))
    }

    pub fn try_lock(&self, key: &str) -> Option<CacheLease<'_>> {
        let in_flight = self.in_flight();
        if in_flight.contains(key) {
            return None;
        }
        Some(self.take(in_flight, key))
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.in_flight().contains(key)
    }

    fn take(&self, mut in_flight: MutexGuard<'_, HashSet<String>>, key: &str) -> CacheLease<'_> {
        in_flight.insert(key.to_string());
        CacheLease {
            cache: self,
            key: key.to_string(),
            path: self.resolve(key),
        }
    }

    fn release(&self, key: &str) {
        self.in_flight().remove(key);
        self.released.notify_all();
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Exclusive hold on one cache key.
#[derive(Debug)]
pub struct CacheLease<'a> {
    cache: &'a FileCache,
    key: String,
    path: PathBuf,
}

impl CacheLease<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLease<'_> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

fn key_extension(key: &str) -> Option<&str> {
    let without_query = key.split(['?', '#']).next().unwrap_or(key);
    let last_segment = without_query.rsplit(['/', '\\']).next()?;
    let (stem, ext) = last_segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 8 {
        return None;
    }
    ext.chars()
        .all(|ch| ch.is_ascii_alphanumeric())
        .then_some(ext)
}

fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
