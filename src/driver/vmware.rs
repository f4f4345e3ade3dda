use super::command::{args, CommandRunner};
use super::{BootDevice, Driver, DriverError};
use crate::vmx::{self, VmxData};
use std::path::{Path, PathBuf};

pub const CDROM_FILE_NAME: &str = "ide1:0.fileName";
pub const CDROM_START_CONNECTED: &str = "ide1:0.startConnected";
pub const CDROM_PRESENT: &str = "ide1:0.present";
pub const CDROM_DEVICE_TYPE: &str = "ide1:0.deviceType";
pub const BIOS_BOOT_ORDER: &str = "bios.bootOrder";

/// Drives VMware through `vmrun` and direct VMX edits. Handles are VMX paths.
#[derive(Debug, Clone)]
pub struct VmwareDriver {
    runner: CommandRunner,
    host_type: String,
}

impl Default for VmwareDriver {
    fn default() -> Self {
        let host_type = if cfg!(target_os = "macos") {
            "fusion"
        } else {
            "ws"
        };
        Self::new(CommandRunner::new("vmrun"), host_type)
    }
}

impl VmwareDriver {
    pub fn new(runner: CommandRunner, host_type: impl Into<String>) -> Self {
        Self {
            runner,
            host_type: host_type.into(),
        }
    }

    fn vmrun(&self, rest: &[&str]) -> Result<String, DriverError> {
        let mut command_args = args(["-T", self.host_type.as_str()]);
        command_args.extend(rest.iter().map(|arg| arg.to_string()));
        Ok(self.runner.run(&command_args)?.stdout)
    }
}

impl Driver for VmwareDriver {
    fn start(&self, handle: &str, headless: bool) -> Result<(), DriverError> {
        let mode = if headless { "nogui" } else { "gui" };
        self.vmrun(&["start", handle, mode])?;
        Ok(())
    }

    fn stop(&self, handle: &str) -> Result<(), DriverError> {
        self.vmrun(&["stop", handle, "hard"])?;
        Ok(())
    }

    fn is_running(&self, handle: &str) -> Result<bool, DriverError> {
        let stdout = self.vmrun(&["list"])?;
        Ok(list_contains(&stdout, Path::new(handle)))
    }

    fn run_command(&self, command_args: &[String]) -> Result<String, DriverError> {
        Ok(self.runner.run(command_args)?.stdout)
    }

    fn attach_media(&self, handle: &str, media: &Path) -> Result<(), DriverError> {
        let media = media.display().to_string();
        vmx::update(Path::new(handle), |data| attach_cdrom(data, &media))?;
        Ok(())
    }

    fn detach_media(&self, handle: &str) -> Result<(), DriverError> {
        vmx::update(Path::new(handle), detach_cdrom)?;
        Ok(())
    }

    fn set_boot_order(&self, handle: &str, order: &[BootDevice]) -> Result<(), DriverError> {
        vmx::update(Path::new(handle), |data| apply_boot_order(data, order))?;
        Ok(())
    }

    fn export(&self, handle: &str, _output_dir: &Path) -> Result<PathBuf, DriverError> {
        Ok(PathBuf::from(handle))
    }
}

pub fn attach_cdrom(data: &mut VmxData, media: &str) {
    data.insert(CDROM_FILE_NAME.to_string(), media.to_string());
    data.insert(CDROM_DEVICE_TYPE.to_string(), "cdrom-image".to_string());
    data.insert(CDROM_START_CONNECTED.to_string(), "TRUE".to_string());
    data.insert(CDROM_PRESENT.to_string(), "TRUE".to_string());
}

/// Leaves an empty physical drive in place of the image.
pub fn detach_cdrom(data: &mut VmxData) {
    data.insert(CDROM_DEVICE_TYPE.to_string(), "atapi-cdrom".to_string());
    data.insert(CDROM_START_CONNECTED.to_string(), "FALSE".to_string());
    vmx::delete(data, CDROM_FILE_NAME);
}

/// Disk-first is the firmware default, so it is expressed by dropping the key.
pub fn apply_boot_order(data: &mut VmxData, order: &[BootDevice]) {
    if order.first().copied().unwrap_or(BootDevice::Disk) == BootDevice::Disk {
        vmx::delete(data, BIOS_BOOT_ORDER);
        return;
    }
    let value = order
        .iter()
        .map(|device| match device {
            BootDevice::Cdrom => "cdrom",
            BootDevice::Disk => "hdd",
        })
        .collect::<Vec<_>>()
        .join(",");
    data.insert(BIOS_BOOT_ORDER.to_string(), value);
}

fn list_contains(list_output: &str, vmx_path: &Path) -> bool {
    let wanted = vmx_path
        .canonicalize()
        .unwrap_or_else(|_| vmx_path.to_path_buf());
    list_output.lines().skip(1).any(|line| {
        let listed = Path::new(line.trim());
        listed == vmx_path || listed.canonicalize().ok().as_deref() == Some(wanted.as_path())
    })
}
