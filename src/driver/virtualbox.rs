use super::command::{args, CommandRunner};
use super::{io_error, BootDevice, Driver, DriverError};
use crate::input::scancode::event_hex;
use crate::input::{ConsoleConnector, InputError, KeyEncoding, KeyEvent, KeySink};
use crate::pipeline::BuildState;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STORAGE_CONTROLLER: &str = "IDE Controller";
const BOOT_SLOTS: usize = 4;

/// Drives VirtualBox through `VBoxManage`. Handles are VM names.
#[derive(Debug, Clone)]
pub struct VirtualBoxDriver {
    runner: CommandRunner,
}

impl Default for VirtualBoxDriver {
    fn default() -> Self {
        Self::new(CommandRunner::new("VBoxManage"))
    }
}

impl VirtualBoxDriver {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn vboxmanage(&self, command_args: Vec<String>) -> Result<String, DriverError> {
        Ok(self.runner.run(&command_args)?.stdout)
    }
}

impl Driver for VirtualBoxDriver {
    fn start(&self, handle: &str, headless: bool) -> Result<(), DriverError> {
        let mode = if headless { "headless" } else { "gui" };
        self.vboxmanage(args(["startvm", handle, "--type", mode]))?;
        Ok(())
    }

    fn stop(&self, handle: &str) -> Result<(), DriverError> {
        self.vboxmanage(args(["controlvm", handle, "poweroff"]))?;
        Ok(())
    }

    fn is_running(&self, handle: &str) -> Result<bool, DriverError> {
        let stdout = self.vboxmanage(args(["showvminfo", handle, "--machinereadable"]))?;
        Ok(parse_vm_running(&stdout))
    }

    fn run_command(&self, command_args: &[String]) -> Result<String, DriverError> {
        self.vboxmanage(command_args.to_vec())
    }

    fn attach_media(&self, handle: &str, media: &Path) -> Result<(), DriverError> {
        let media = media.display().to_string();
        self.vboxmanage(args([
            "storageattach",
            handle,
            "--storagectl",
            STORAGE_CONTROLLER,
            "--port",
            "0",
            "--device",
            "1",
            "--type",
            "dvddrive",
            "--medium",
            media.as_str(),
        ]))?;
        Ok(())
    }

    fn detach_media(&self, handle: &str) -> Result<(), DriverError> {
        self.vboxmanage(args([
            "storageattach",
            handle,
            "--storagectl",
            STORAGE_CONTROLLER,
            "--port",
            "0",
            "--device",
            "1",
            "--medium",
            "none",
        ]))?;
        Ok(())
    }

    fn set_boot_order(&self, handle: &str, order: &[BootDevice]) -> Result<(), DriverError> {
        self.vboxmanage(boot_order_args(handle, order))?;
        Ok(())
    }

    fn export(&self, handle: &str, output_dir: &Path) -> Result<PathBuf, DriverError> {
        std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
        let output = output_dir.join(format!("{handle}.ovf"));
        let output_arg = output.display().to_string();
        self.vboxmanage(args(["export", handle, "--output", output_arg.as_str()]))?;
        Ok(output)
    }
}

fn boot_order_args(handle: &str, order: &[BootDevice]) -> Vec<String> {
    let mut command_args = args(["modifyvm", handle]);
    for slot in 0..BOOT_SLOTS {
        let device = match order.get(slot) {
            Some(BootDevice::Cdrom) => "dvd",
            Some(BootDevice::Disk) => "disk",
            None => "none",
        };
        command_args.push(format!("--boot{}", slot + 1));
        command_args.push(device.to_string());
    }
    command_args
}

fn parse_vm_running(showvminfo: &str) -> bool {
    showvminfo.lines().any(|line| {
        matches!(
            line.trim(),
            "VMState=\"running\"" | "VMState=\"stopping\"" | "VMState=\"paused\""
        )
    })
}

/// Types into a VirtualBox guest by pushing scancodes through the build's
/// driver with `controlvm <vm> keyboardputscancode`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualBoxScancodeConnector;

impl ConsoleConnector for VirtualBoxScancodeConnector {
    fn open(&self, state: &BuildState) -> Result<Box<dyn KeySink>, InputError> {
        Ok(Box::new(ScancodeSink {
            driver: Arc::clone(&state.driver),
            machine: state.machine.clone(),
        }))
    }
}

struct ScancodeSink {
    driver: Arc<dyn Driver>,
    machine: String,
}

impl KeySink for ScancodeSink {
    fn encoding(&self) -> KeyEncoding {
        KeyEncoding::Scancode
    }

    fn send(&mut self, event: KeyEvent) -> Result<(), InputError> {
        let mut command_args = args(["controlvm", self.machine.as_str(), "keyboardputscancode"]);
        command_args.extend(event_hex(event));
        self.driver
            .run_command(&command_args)
            .map(|_| ())
            .map_err(|err| InputError::Send(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DISK_FIRST, MEDIA_FIRST};

    #[test]
    fn boot_order_fills_all_four_slots() {
        assert_eq!(
            boot_order_args("build", &MEDIA_FIRST),
            args([
                "modifyvm", "build", "--boot1", "dvd", "--boot2", "disk", "--boot3", "none",
                "--boot4", "none"
            ])
        );
        assert_eq!(boot_order_args("build", &DISK_FIRST)[3], "disk");
    }

    #[test]
    fn machine_readable_state_detects_running() {
        assert!(parse_vm_running("name=\"build\"\nVMState=\"running\"\n"));
        assert!(!parse_vm_running("name=\"build\"\nVMState=\"poweroff\"\n"));
    }
}
