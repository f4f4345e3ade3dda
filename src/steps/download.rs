use crate::fetch::{stage_verified_copy, DownloadJob, FetchOutcome, Fetcher};
use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;
use crate::shared::fs_atomic::create_unique_temp_dir;
use std::path::PathBuf;
use std::sync::Arc;

const ASSET_LABEL: &str = "boot media";

/// Fetches the configured boot media into the cache and publishes its path
/// as `asset_path`. Publishes `None` when no media is configured.
pub struct DownloadMedia {
    fetcher: Fetcher,
    extension: Option<String>,
    copy_dir: Option<PathBuf>,
}

impl DownloadMedia {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            extension: None,
            copy_dir: None,
        }
    }

    /// Hands later steps a verified copy whose name ends in `extension`,
    /// for hypervisors that pick a media type from the file name.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

impl Step for DownloadMedia {
    fn name(&self) -> &str {
        "download_media"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        let Some(asset) = state.config.asset().cloned() else {
            state.asset_path = None;
            return StepAction::Continue;
        };

        let checksum = match state.config.asset_checksum() {
            Ok(checksum) => checksum,
            Err(err) => return halt(state, BuildError::Config(err)),
        };
        let target = state.cache.resolve(&asset.url);
        let job = match DownloadJob::new(&asset.url, target) {
            Ok(job) => job.with_checksum(checksum.clone()),
            Err(err) => {
                return halt(
                    state,
                    BuildError::Fetch {
                        what: ASSET_LABEL.to_string(),
                        source: err,
                    },
                )
            }
        };

        state.log.info(
            "fetch.started",
            &format!("url={} target={}", job.source, job.target.display()),
        );
        state.ui.say(&format!(
            "Copying or downloading {ASSET_LABEL}. Progress will be reported periodically."
        ));

        let cache = Arc::clone(&state.cache);
        let ui = Arc::clone(&state.ui);
        let cancel = state.cancel_token();
        let fetched = match self.fetcher.fetch(&cache, &job, &cancel, ui.as_ref()) {
            Ok(FetchOutcome::Completed(path)) => path,
            Ok(FetchOutcome::Cancelled) => {
                state.log.warn("fetch.cancelled", &job.source);
                return StepAction::Halt;
            }
            Err(err) => {
                return halt(
                    state,
                    BuildError::Fetch {
                        what: ASSET_LABEL.to_string(),
                        source: err,
                    },
                )
            }
        };
        state
            .log
            .info("fetch.completed", &format!("path={}", fetched.display()));

        let Some(extension) = self.extension.clone() else {
            state.asset_path = Some(fetched);
            return StepAction::Continue;
        };

        let dir = match create_unique_temp_dir("vmforge-media") {
            Ok(dir) => dir,
            Err(err) => {
                return halt(
                    state,
                    BuildError::io("error creating copy directory for", ASSET_LABEL, err),
                )
            }
        };
        self.copy_dir = Some(dir.clone());
        let dest = dir.join(format!("{}{extension}", state.config.vm_name));
        match stage_verified_copy(&fetched, &dest, checksum.as_ref()) {
            Ok(path) => {
                state
                    .log
                    .info("fetch.staged", &format!("path={}", path.display()));
                state.asset_path = Some(path);
                StepAction::Continue
            }
            Err(err) => halt(
                state,
                BuildError::Fetch {
                    what: ASSET_LABEL.to_string(),
                    source: err,
                },
            ),
        }
    }

    fn cleanup(&mut self, _state: &mut BuildState) -> Result<(), BuildError> {
        let Some(dir) = self.copy_dir.take() else {
            return Ok(());
        };
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BuildError::io("error removing", dir.display(), err)),
        }
    }
}
