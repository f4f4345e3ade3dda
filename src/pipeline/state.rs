use crate::cache::FileCache;
use crate::config::BuildConfig;
use crate::driver::Driver;
use crate::input::ConsoleConnector;
use crate::shared::errors::BuildError;
use crate::shared::logging::BuildLog;
use crate::ui::Ui;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CANCEL_SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Process-wide cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `total`, waking early on cancellation. Returns `false` when
    /// the sleep was cut short.
    pub fn sleep(&self, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.is_cancelled() {
                return false;
            }
            let step = remaining.min(CANCEL_SLEEP_SLICE);
            thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
        !self.is_cancelled()
    }
}

/// Context threaded through every step of a build.
///
/// Inputs are set when the build is assembled; `asset_path` and
/// `export_path` are produced by steps. Only the running step mutates the
/// state, so no locking is needed beyond the cancellation flag.
pub struct BuildState {
    pub config: BuildConfig,
    pub driver: Arc<dyn Driver>,
    pub console: Arc<dyn ConsoleConnector>,
    pub cache: Arc<FileCache>,
    pub ui: Arc<dyn Ui>,
    pub log: BuildLog,
    /// Hypervisor handle for the machine: the VM name for VirtualBox, the VMX
    /// path for VMware.
    pub machine: String,
    pub host_ip: String,
    pub http_port: u16,
    pub vnc_port: u16,
    /// Local path of the fetched asset. `None` when no asset is configured.
    pub asset_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
    error: Option<BuildError>,
    cancel: CancelToken,
}

impl BuildState {
    pub fn new(
        config: BuildConfig,
        driver: Arc<dyn Driver>,
        console: Arc<dyn ConsoleConnector>,
        ui: Arc<dyn Ui>,
    ) -> Self {
        let machine = match config.vmx_path.as_ref() {
            Some(vmx) => vmx.display().to_string(),
            None => config.vm_name.clone(),
        };
        let log = match config.log_path.as_ref() {
            Some(path) => BuildLog::new(path),
            None => BuildLog::disabled(),
        };
        Self {
            cache: Arc::new(FileCache::new(&config.cache_dir)),
            http_port: config.http_port,
            vnc_port: config.vnc_port,
            host_ip: String::new(),
            machine,
            config,
            driver,
            console,
            ui,
            log,
            asset_path: None,
            export_path: None,
            error: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_host_ip(mut self, host_ip: impl Into<String>) -> Self {
        self.host_ip = host_ip.into();
        self
    }

    pub fn with_log(mut self, log: BuildLog) -> Self {
        self.log = log;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records `error` unless an earlier one is already recorded; the first
    /// fatal error is the one reported for the build.
    pub fn record_error(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<BuildError> {
        self.error.take()
    }
}
