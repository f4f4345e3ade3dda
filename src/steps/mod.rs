//! Build steps and the per-hypervisor pipelines assembled from them.

pub mod attach_media;
pub mod boot_order;
pub mod clean_files;
pub mod download;
pub mod export;
pub mod start_machine;
pub mod type_command;

pub use attach_media::AttachMedia;
pub use boot_order::SetBootOrder;
pub use clean_files::CleanFiles;
pub use download::DownloadMedia;
pub use export::ExportMachine;
pub use start_machine::StartMachine;
pub use type_command::TypeBootCommand;

use crate::config::{BuildConfig, Hypervisor};
use crate::driver::{
    host_ip_for, Driver, RecordingDriver, VirtualBoxDriver, VirtualBoxScancodeConnector,
    VmwareDriver,
};
use crate::fetch::Fetcher;
use crate::input::{ConsoleConnector, KeyEncoding, RecordingConsole, VncConnector};
use crate::pipeline::{BuildState, CancelToken, RunOutcome, Runner, Step};
use crate::shared::errors::BuildError;
use crate::ui::Ui;
use std::sync::Arc;

const DRY_RUN_HOST_IP: &str = "127.0.0.1";

/// Steps for `hypervisor`, in run order.
pub fn pipeline_steps(hypervisor: Hypervisor, fetcher: Fetcher) -> Vec<Box<dyn Step>> {
    match hypervisor {
        Hypervisor::Virtualbox => vec![
            Box::new(DownloadMedia::new(fetcher).with_extension(".iso")),
            Box::new(AttachMedia::new()),
            Box::new(SetBootOrder::new()),
            Box::new(StartMachine::new()),
            Box::new(TypeBootCommand::new()),
            Box::new(ExportMachine::new()),
        ],
        Hypervisor::Vmware => vec![
            Box::new(DownloadMedia::new(fetcher)),
            Box::new(AttachMedia::new()),
            Box::new(SetBootOrder::new()),
            Box::new(StartMachine::new()),
            Box::new(TypeBootCommand::new()),
            Box::new(CleanFiles::new()),
            Box::new(ExportMachine::new()),
        ],
    }
}

/// Creates the build state with the hypervisor's real driver and console.
/// A dry run records driver calls and keystrokes instead.
pub fn prepare_state(
    config: BuildConfig,
    ui: Arc<dyn Ui>,
    cancel: CancelToken,
    dry_run: bool,
) -> Result<BuildState, BuildError> {
    let hypervisor = config.hypervisor;
    let host_ip = if dry_run {
        DRY_RUN_HOST_IP.to_string()
    } else {
        host_ip_for(hypervisor, &config.host_interface)
            .map_err(|err| BuildError::driver("error determining host IP", err))?
    };
    let state = BuildState::new(
        config,
        driver_for(hypervisor, dry_run),
        console_for(hypervisor, dry_run),
        ui,
    );
    Ok(state.with_cancel_token(cancel).with_host_ip(host_ip))
}

fn driver_for(hypervisor: Hypervisor, dry_run: bool) -> Arc<dyn Driver> {
    match (hypervisor, dry_run) {
        (_, true) => Arc::new(RecordingDriver::new()),
        (Hypervisor::Virtualbox, false) => Arc::new(VirtualBoxDriver::default()),
        (Hypervisor::Vmware, false) => Arc::new(VmwareDriver::default()),
    }
}

fn console_for(hypervisor: Hypervisor, dry_run: bool) -> Arc<dyn ConsoleConnector> {
    match (hypervisor, dry_run) {
        (Hypervisor::Virtualbox, true) => Arc::new(RecordingConsole::new(KeyEncoding::Scancode)),
        (Hypervisor::Vmware, true) => Arc::new(RecordingConsole::new(KeyEncoding::Keysym)),
        (Hypervisor::Virtualbox, false) => Arc::new(VirtualBoxScancodeConnector),
        (Hypervisor::Vmware, false) => Arc::new(VncConnector::default()),
    }
}

/// Runs the configured hypervisor's pipeline over `state`.
pub fn run_build(state: &mut BuildState, fetcher: Fetcher) -> RunOutcome {
    let mut runner = Runner::new(pipeline_steps(state.config.hypervisor, fetcher));
    state.log.info(
        "pipeline.started",
        &format!(
            "hypervisor={} machine={} steps={}",
            state.config.hypervisor,
            state.machine,
            runner.step_names().join(",")
        ),
    );
    runner.run(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(hypervisor: Hypervisor) -> Vec<String> {
        Runner::new(pipeline_steps(hypervisor, Fetcher::default())).step_names()
    }

    #[test]
    fn virtualbox_pipeline_order() {
        assert_eq!(
            names(Hypervisor::Virtualbox),
            vec![
                "download_media",
                "attach_media",
                "set_boot_order",
                "start_machine",
                "type_boot_command",
                "export"
            ]
        );
    }

    #[test]
    fn vmware_pipeline_cleans_before_export() {
        let steps = names(Hypervisor::Vmware);
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[5], "clean_files");
        assert_eq!(steps[6], "export");
    }
}
