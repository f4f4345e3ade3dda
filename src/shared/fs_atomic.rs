use crate::shared::time::now_nanos;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling path that is unique per process and call, used for in-progress
/// writes that are renamed into place once complete.
pub fn unique_sibling_path(path: &Path, suffix: &str) -> std::io::Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))?;
    let name = format!(
        ".{}.{suffix}-{}-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("file"),
        std::process::id(),
        now_nanos(),
        UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed),
    );
    Ok(parent.join(name))
}

pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp_path = unique_sibling_path(path, "tmp")?;

    {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    promote_file(&tmp_path, path)
}

/// Renames a fully written file over `path` and syncs the parent directory.
pub fn promote_file(from: &Path, path: &Path) -> std::io::Result<()> {
    if let Err(err) = fs::rename(from, path) {
        let _ = fs::remove_file(from);
        return Err(err);
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => sync_parent_dir(parent),
        _ => Ok(()),
    }
}

/// Creates a fresh directory under the system temp dir, e.g. for copies that
/// need a specific file name or extension.
pub fn create_unique_temp_dir(prefix: &str) -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "{prefix}-{}-{}-{}",
        std::process::id(),
        now_nanos(),
        UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed),
    ));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}
