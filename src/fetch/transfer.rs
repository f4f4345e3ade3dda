use super::progress::TransferProgress;
use super::FetchError;
use crate::pipeline::CancelToken;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const COPY_BUFFER_SIZE: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the bytes of a source reach the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Network,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(String),
    File(PathBuf),
}

impl Source {
    pub fn parse(locator: &str) -> Result<Self, FetchError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidSource {
                locator: locator.to_string(),
                reason: "source is empty".to_string(),
            });
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Http(trimmed.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("file://") {
            let decoded = urlencoding::decode(rest).map_err(|err| FetchError::InvalidSource {
                locator: locator.to_string(),
                reason: format!("path is not valid utf-8 after decoding: {err}"),
            })?;
            return Ok(Self::File(PathBuf::from(decoded.into_owned())));
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(FetchError::InvalidSource {
                locator: locator.to_string(),
                reason: format!("unsupported scheme `{scheme}`"),
            });
        }
        Ok(Self::File(PathBuf::from(trimmed)))
    }

    pub fn mode(&self) -> TransferMode {
        match self {
            Self::Http(_) => TransferMode::Network,
            Self::File(_) => TransferMode::Copy,
        }
    }
}

/// Streams `source` into `dest`, updating `progress` as bytes land. Stops
/// between chunks once `cancel` is set, removing the partial file.
pub(crate) fn run_transfer(
    source: &Source,
    dest: &Path,
    progress: &TransferProgress,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let result = match source {
        Source::Http(url) => http_transfer(url, dest, progress, cancel),
        Source::File(path) => file_transfer(path, dest, progress, cancel),
    };
    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

fn http_transfer(
    url: &str,
    dest: &Path,
    progress: &TransferProgress,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .user_agent(concat!("vmforge/", env!("CARGO_PKG_VERSION")))
        .build();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            })
        }
        Err(err) => {
            return Err(FetchError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            })
        }
    };

    let total = response
        .header("Content-Length")
        .and_then(|raw| raw.trim().parse::<u64>().ok());
    progress.set_total(total);

    let reader = response.into_reader();
    copy_stream(reader, url, dest, progress, cancel)
}

fn file_transfer(
    path: &Path,
    dest: &Path,
    progress: &TransferProgress,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let file = File::open(path).map_err(|source| FetchError::ReadSource {
        path: path.display().to_string(),
        source,
    })?;
    let total = file
        .metadata()
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len());
    progress.set_total(total);
    copy_stream(file, &path.display().to_string(), dest, progress, cancel)
}

fn copy_stream(
    mut reader: impl Read,
    origin: &str,
    dest: &Path,
    progress: &TransferProgress,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let write_error = |source| FetchError::Write {
        path: dest.display().to_string(),
        source,
    };
    let file = File::create(dest).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Aborted);
        }
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FetchError::ReadSource {
                    path: origin.to_string(),
                    source,
                })
            }
        };
        writer.write_all(&buf[..read]).map_err(write_error)?;
        progress.advance(read as u64);
    }

    let file = writer
        .into_inner()
        .map_err(|err| write_error(err.into_error()))?;
    file.sync_all().map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_classifies_locators() {
        assert_eq!(
            Source::parse("https://mirror.example/rescue.iso").expect("https"),
            Source::Http("https://mirror.example/rescue.iso".to_string())
        );
        assert_eq!(
            Source::parse("file:///srv/isos/rescue%20cd.iso").expect("file url"),
            Source::File(PathBuf::from("/srv/isos/rescue cd.iso"))
        );
        assert_eq!(
            Source::parse("./rescue.iso").expect("bare path").mode(),
            TransferMode::Copy
        );
        assert!(matches!(
            Source::parse("ftp://mirror.example/rescue.iso"),
            Err(FetchError::InvalidSource { .. })
        ));
        assert!(Source::parse("  ").is_err());
    }

    #[test]
    fn file_transfer_copies_and_tracks_progress() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src.bin");
        let dest = temp.path().join("dest.bin");
        fs::write(&src, vec![7u8; 200_000]).expect("write src");

        let progress = TransferProgress::new();
        run_transfer(
            &Source::File(src.clone()),
            &dest,
            &progress,
            &CancelToken::new(),
        )
        .expect("transfer");

        assert_eq!(fs::read(&dest).expect("read dest").len(), 200_000);
        assert_eq!(progress.total(), Some(200_000));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn cancelled_transfer_leaves_no_partial_file() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src.bin");
        let dest = temp.path().join("dest.bin");
        fs::write(&src, b"payload").expect("write src");

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_transfer(&Source::File(src), &dest, &TransferProgress::new(), &cancel)
            .expect_err("aborted");
        assert!(matches!(err, FetchError::Aborted));
        assert!(!dest.exists());
    }

    #[test]
    fn missing_source_is_a_transfer_error() {
        let temp = tempdir().expect("tempdir");
        let err = run_transfer(
            &Source::File(temp.path().join("missing.iso")),
            &temp.path().join("dest.iso"),
            &TransferProgress::new(),
            &CancelToken::new(),
        )
        .expect_err("missing");
        assert!(matches!(err, FetchError::ReadSource { .. }));
    }
}
