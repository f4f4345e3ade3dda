//! Cancellable, checksum-verified download-or-copy into the resource cache.
//!
//! A fetch holds the cache lease for its source for its whole duration. The
//! transfer runs on a worker thread into a private partial file; the calling
//! thread waits on completion while emitting progress and watching for
//! cancellation. The destination path only ever holds a fully transferred
//! and verified artifact.

pub mod checksum;
pub mod progress;
pub mod transfer;

pub use checksum::{Checksum, ChecksumError, HashKind};
pub use progress::TransferProgress;
pub use transfer::{Source, TransferMode};

use crate::cache::FileCache;
use crate::pipeline::CancelToken;
use crate::shared::errors::ErrorKind;
use crate::shared::fs_atomic::{promote_file, unique_sibling_path};
use crate::ui::Ui;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid source `{locator}`: {reason}")]
    InvalidSource { locator: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("failed to read source {path}: {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to hash {path}: {source}")]
    Hash {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{kind} checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        kind: HashKind,
        expected: String,
        actual: String,
    },
    #[error("transfer aborted")]
    Aborted,
    #[error("transfer worker exited without reporting a result")]
    WorkerLost,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSource { .. } => ErrorKind::Configuration,
            Self::ChecksumMismatch { .. } => ErrorKind::Verification,
            _ => ErrorKind::Transfer,
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub source: String,
    pub target: PathBuf,
    pub checksum: Option<Checksum>,
    pub mode: TransferMode,
}

impl DownloadJob {
    pub fn new(source: impl Into<String>, target: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let source = source.into();
        let mode = Source::parse(&source)?.mode();
        Ok(Self {
            source,
            target: target.into(),
            checksum: None,
            mode,
        })
    }

    pub fn with_checksum(mut self, checksum: Option<Checksum>) -> Self {
        self.checksum = checksum;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed(PathBuf),
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct Fetcher {
    progress_interval: Duration,
    cancel_poll_interval: Duration,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
        }
    }
}

impl Fetcher {
    pub fn new(progress_interval: Duration, cancel_poll_interval: Duration) -> Self {
        Self {
            progress_interval,
            cancel_poll_interval,
        }
    }

    pub fn fetch(
        &self,
        cache: &FileCache,
        job: &DownloadJob,
        cancel: &CancelToken,
        ui: &dyn Ui,
    ) -> Result<FetchOutcome, FetchError> {
        let source = Source::parse(&job.source)?;

        let Some(_lease) = cache.lock_or_cancel(&job.source, cancel) else {
            return Ok(FetchOutcome::Cancelled);
        };

        if let Some(checksum) = job.checksum.as_ref() {
            if job.target.is_file() && verify(checksum, &job.target).is_ok() {
                ui.message(&format!(
                    "Using cached copy at {} (checksum verified)",
                    job.target.display()
                ));
                return Ok(FetchOutcome::Completed(job.target.clone()));
            }
        }

        if let Some(parent) = job.target.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let partial = unique_sibling_path(&job.target, "part").map_err(|source| {
            FetchError::Write {
                path: job.target.display().to_string(),
                source,
            }
        })?;

        let progress = Arc::new(TransferProgress::new());
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        {
            let progress = progress.clone();
            let cancel = cancel.clone();
            let partial = partial.clone();
            thread::spawn(move || {
                let result = transfer::run_transfer(&source, &partial, &progress, &cancel);
                let _ = done_tx.send(result);
            });
        }

        let mut last_tick = Instant::now();
        let result = loop {
            match done_rx.recv_timeout(self.cancel_poll_interval) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Err(FetchError::WorkerLost),
            }
            if last_tick.elapsed() >= self.progress_interval {
                last_tick = Instant::now();
                if let Some(percent) = progress.percent() {
                    ui.message(&format!("Download progress: {percent}%"));
                }
            }
            if cancel.is_cancelled() {
                ui.say("Interrupt received. Cancelling download...");
                return Ok(FetchOutcome::Cancelled);
            }
        };

        if let Err(err) = result {
            let _ = fs::remove_file(&partial);
            if matches!(err, FetchError::Aborted) && cancel.is_cancelled() {
                return Ok(FetchOutcome::Cancelled);
            }
            return Err(err);
        }

        if let Some(checksum) = job.checksum.as_ref() {
            if let Err(err) = verify(checksum, &partial) {
                let _ = fs::remove_file(&partial);
                return Err(relabel(err, &job.target));
            }
        }

        promote_file(&partial, &job.target).map_err(|source| FetchError::Write {
            path: job.target.display().to_string(),
            source,
        })?;
        Ok(FetchOutcome::Completed(job.target.clone()))
    }
}

/// Copies an already fetched artifact to `dest` and re-verifies it there. The
/// copy goes through a partial file so `dest` never holds unverified bytes.
pub fn stage_verified_copy(
    from: &Path,
    dest: &Path,
    checksum: Option<&Checksum>,
) -> Result<PathBuf, FetchError> {
    let partial = unique_sibling_path(dest, "part").map_err(|source| FetchError::Write {
        path: dest.display().to_string(),
        source,
    })?;
    transfer::run_transfer(
        &Source::File(from.to_path_buf()),
        &partial,
        &TransferProgress::new(),
        &CancelToken::new(),
    )?;
    if let Some(checksum) = checksum {
        if let Err(err) = verify(checksum, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(relabel(err, dest));
        }
    }
    promote_file(&partial, dest).map_err(|source| FetchError::Write {
        path: dest.display().to_string(),
        source,
    })?;
    Ok(dest.to_path_buf())
}

pub fn verify(checksum: &Checksum, path: &Path) -> Result<(), FetchError> {
    let mismatch = checksum.check_file(path).map_err(|source| FetchError::Hash {
        path: path.display().to_string(),
        source,
    })?;
    match mismatch {
        None => Ok(()),
        Some(actual) => Err(FetchError::ChecksumMismatch {
            path: path.display().to_string(),
            kind: checksum.kind(),
            expected: checksum.to_hex(),
            actual,
        }),
    }
}

fn relabel(err: FetchError, path: &Path) -> FetchError {
    match err {
        FetchError::ChecksumMismatch {
            kind,
            expected,
            actual,
            ..
        } => FetchError::ChecksumMismatch {
            path: path.display().to_string(),
            kind,
            expected,
            actual,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MemoryUi;
    use tempfile::tempdir;

    fn sha256_of(bytes: &[u8]) -> Checksum {
        use sha2::Digest;
        let digest = sha2::Sha256::digest(bytes);
        Checksum::from_hex(HashKind::Sha256, &hex::encode(digest)).expect("checksum")
    }

    #[test]
    fn copy_fetch_verifies_and_promotes() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("rescue.iso");
        fs::write(&src, b"iso-bytes").expect("write src");
        let cache = FileCache::new(temp.path().join("cache"));
        let locator = src.display().to_string();
        let job = DownloadJob::new(&locator, cache.resolve(&locator))
            .expect("job")
            .with_checksum(Some(sha256_of(b"iso-bytes")));
        assert_eq!(job.mode, TransferMode::Copy);

        let outcome = Fetcher::default()
            .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
            .expect("fetch");
        assert_eq!(outcome, FetchOutcome::Completed(job.target.clone()));
        assert_eq!(fs::read(&job.target).expect("read"), b"iso-bytes");
        assert!(!cache.is_locked(&locator));
    }

    #[test]
    fn checksum_mismatch_never_promotes_target() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("rescue.iso");
        fs::write(&src, b"tampered").expect("write src");
        let cache = FileCache::new(temp.path().join("cache"));
        let locator = src.display().to_string();
        let job = DownloadJob::new(&locator, cache.resolve(&locator))
            .expect("job")
            .with_checksum(Some(sha256_of(b"original")));

        let err = Fetcher::default()
            .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Verification);
        assert!(!job.target.exists());
        let leftovers = fs::read_dir(temp.path().join("cache"))
            .expect("cache dir")
            .count();
        assert_eq!(leftovers, 0);
        assert!(!cache.is_locked(&locator));
    }

    #[test]
    fn verified_cache_hit_skips_transfer() {
        let temp = tempdir().expect("tempdir");
        let cache = FileCache::new(temp.path().join("cache"));
        let locator = temp.path().join("gone.iso").display().to_string();
        let target = cache.resolve(&locator);
        fs::create_dir_all(cache.dir()).expect("cache dir");
        fs::write(&target, b"cached").expect("seed cache");

        let job = DownloadJob::new(&locator, &target)
            .expect("job")
            .with_checksum(Some(sha256_of(b"cached")));
        let ui = MemoryUi::new();
        let outcome = Fetcher::default()
            .fetch(&cache, &job, &CancelToken::new(), &ui)
            .expect("cache hit");
        assert_eq!(outcome, FetchOutcome::Completed(target));
        assert!(ui.contains("Using cached copy"));
    }

    #[test]
    fn stage_verified_copy_writes_named_copy() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("abc123");
        fs::write(&src, b"iso").expect("write src");
        let dest = temp.path().join("rescue.iso");

        let staged = stage_verified_copy(&src, &dest, Some(&sha256_of(b"iso"))).expect("copy");
        assert_eq!(staged, dest);
        assert_eq!(fs::read(&dest).expect("read"), b"iso");

        let other = temp.path().join("other.iso");
        let err = stage_verified_copy(&src, &other, Some(&sha256_of(b"nope"))).expect_err("bad");
        assert!(matches!(err, FetchError::ChecksumMismatch { .. }));
        assert!(!other.exists());
    }
}
