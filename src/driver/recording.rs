use super::{BootDevice, Driver, DriverError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Start { handle: String, headless: bool },
    Stop { handle: String },
    IsRunning { handle: String },
    RunCommand(Vec<String>),
    AttachMedia { handle: String, media: PathBuf },
    DetachMedia { handle: String },
    SetBootOrder { handle: String, order: Vec<BootDevice> },
    Export { handle: String, output_dir: PathBuf },
}

impl DriverCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::IsRunning { .. } => "is_running",
            Self::RunCommand(_) => "run_command",
            Self::AttachMedia { .. } => "attach_media",
            Self::DetachMedia { .. } => "detach_media",
            Self::SetBootOrder { .. } => "set_boot_order",
            Self::Export { .. } => "export",
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<DriverCall>,
    running: HashSet<String>,
}

/// Records operations instead of touching a hypervisor. Operations named
/// with [`RecordingDriver::failing`] return an error after being recorded.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    recorded: Mutex<Recorded>,
    failing: HashSet<&'static str>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(DriverCall::name).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        let name = call.name();
        self.lock().calls.push(call);
        if self.failing.contains(name) {
            return Err(DriverError::NonZeroExit {
                command: name.to_string(),
                exit_code: 1,
                stderr: format!("{name} failed"),
            });
        }
        Ok(())
    }
}

impl Driver for RecordingDriver {
    fn start(&self, handle: &str, headless: bool) -> Result<(), DriverError> {
        self.record(DriverCall::Start {
            handle: handle.to_string(),
            headless,
        })?;
        self.lock().running.insert(handle.to_string());
        Ok(())
    }

    fn stop(&self, handle: &str) -> Result<(), DriverError> {
        self.record(DriverCall::Stop {
            handle: handle.to_string(),
        })?;
        self.lock().running.remove(handle);
        Ok(())
    }

    fn is_running(&self, handle: &str) -> Result<bool, DriverError> {
        self.record(DriverCall::IsRunning {
            handle: handle.to_string(),
        })?;
        Ok(self.lock().running.contains(handle))
    }

    fn run_command(&self, args: &[String]) -> Result<String, DriverError> {
        self.record(DriverCall::RunCommand(args.to_vec()))?;
        Ok(String::new())
    }

    fn attach_media(&self, handle: &str, media: &Path) -> Result<(), DriverError> {
        self.record(DriverCall::AttachMedia {
            handle: handle.to_string(),
            media: media.to_path_buf(),
        })
    }

    fn detach_media(&self, handle: &str) -> Result<(), DriverError> {
        self.record(DriverCall::DetachMedia {
            handle: handle.to_string(),
        })
    }

    fn set_boot_order(&self, handle: &str, order: &[BootDevice]) -> Result<(), DriverError> {
        self.record(DriverCall::SetBootOrder {
            handle: handle.to_string(),
            order: order.to_vec(),
        })
    }

    fn export(&self, handle: &str, output_dir: &Path) -> Result<PathBuf, DriverError> {
        self.record(DriverCall::Export {
            handle: handle.to_string(),
            output_dir: output_dir.to_path_buf(),
        })?;
        let name = Path::new(handle)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| handle.into());
        Ok(output_dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_running_machines() {
        let driver = RecordingDriver::new();
        driver.start("build", true).expect("start");
        assert!(driver.is_running("build").expect("query"));
        driver.stop("build").expect("stop");
        assert!(!driver.is_running("build").expect("query"));
        assert_eq!(
            driver.call_names(),
            vec!["start", "is_running", "stop", "is_running"]
        );
    }

    #[test]
    fn failing_operation_is_still_recorded() {
        let driver = RecordingDriver::new().failing("attach_media");
        let err = driver
            .attach_media("build", Path::new("/tmp/rescue.iso"))
            .expect_err("configured to fail");
        assert!(err.to_string().contains("attach_media"));
        assert_eq!(driver.call_names(), vec!["attach_media"]);
    }
}
