//! Hypervisor control surface.
//!
//! Steps talk to a [`Driver`] only; each hypervisor implementation turns the
//! operations into command invocations or VMX edits.

pub mod command;
pub mod host_ip;
pub mod recording;
pub mod virtualbox;
pub mod vmware;

pub use command::{CommandOutput, CommandRunner};
pub use host_ip::{host_ip_for, parse_ifconfig_ipv4, VIRTUALBOX_NAT_HOST_IP};
pub use recording::{DriverCall, RecordingDriver};
pub use virtualbox::{VirtualBoxDriver, VirtualBoxScancodeConnector};
pub use vmware::VmwareDriver;

use crate::vmx::VmxError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("hypervisor binary not found: {binary}")]
    MissingBinary { binary: String },
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("`{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Vmx(#[from] VmxError),
    #[error("unexpected output from `{command}`: {reason}")]
    UnexpectedOutput { command: String, reason: String },
}

/// A device the firmware may boot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDevice {
    Cdrom,
    Disk,
}

impl fmt::Display for BootDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdrom => f.write_str("cdrom"),
            Self::Disk => f.write_str("disk"),
        }
    }
}

/// Boot order used while the rescue media is attached.
pub const MEDIA_FIRST: [BootDevice; 2] = [BootDevice::Cdrom, BootDevice::Disk];
/// Boot order the machine is left with afterwards.
pub const DISK_FIRST: [BootDevice; 2] = [BootDevice::Disk, BootDevice::Cdrom];

/// Operations a build needs from a hypervisor. `handle` is the machine
/// identifier carried in the build state.
pub trait Driver: Send + Sync {
    fn start(&self, handle: &str, headless: bool) -> Result<(), DriverError>;

    fn stop(&self, handle: &str) -> Result<(), DriverError>;

    fn is_running(&self, handle: &str) -> Result<bool, DriverError>;

    /// Opaque pass-through to the hypervisor's command-line tool. Returns
    /// captured stdout.
    fn run_command(&self, args: &[String]) -> Result<String, DriverError>;

    fn attach_media(&self, handle: &str, media: &Path) -> Result<(), DriverError>;

    /// Must succeed when nothing is attached.
    fn detach_media(&self, handle: &str) -> Result<(), DriverError>;

    fn set_boot_order(&self, handle: &str, order: &[BootDevice]) -> Result<(), DriverError>;

    /// Produces the build artifact and returns its path.
    fn export(&self, handle: &str, output_dir: &Path) -> Result<PathBuf, DriverError>;
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> DriverError {
    DriverError::Io {
        path: path.display().to_string(),
        source,
    }
}
