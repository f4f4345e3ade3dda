use crate::config::Hypervisor;
use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;

/// Powers the machine on and waits out the configured boot delay.
#[derive(Debug, Default)]
pub struct StartMachine {
    started: Option<String>,
}

impl StartMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for StartMachine {
    fn name(&self) -> &str {
        "start_machine"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        if state.asset_path.is_none() {
            return StepAction::Continue;
        }

        state.ui.say("Starting the virtual machine...");
        if state.config.headless {
            state.ui.message(&headless_notice(state));
        }

        if let Err(err) = state.driver.start(&state.machine, state.config.headless) {
            return halt(state, BuildError::driver("error starting VM", err));
        }
        self.started = Some(state.machine.clone());
        state.log.info(
            "driver.machine.started",
            &format!("machine={} headless={}", state.machine, state.config.headless),
        );

        let boot_wait = state.config.boot_wait();
        if !boot_wait.is_zero() {
            state
                .ui
                .say(&format!("Waiting {}s for boot...", boot_wait.as_secs()));
            if !state.cancel_token().sleep(boot_wait) {
                state.log.warn("pipeline.boot_wait.cancelled", &state.machine);
                return StepAction::Halt;
            }
        }
        StepAction::Continue
    }

    fn cleanup(&mut self, state: &mut BuildState) -> Result<(), BuildError> {
        let Some(handle) = self.started.take() else {
            return Ok(());
        };
        match state.driver.is_running(&handle) {
            Ok(true) => state
                .driver
                .stop(&handle)
                .map_err(|err| BuildError::driver("error shutting down VM", err)),
            Ok(false) => Ok(()),
            Err(err) => {
                state.log.warn(
                    "driver.machine.state_unknown",
                    &format!("machine={handle} error={err}"),
                );
                Ok(())
            }
        }
    }
}

fn headless_notice(state: &BuildState) -> String {
    match state.config.hypervisor {
        Hypervisor::Virtualbox => "WARNING: The VM will be started in headless mode, as configured.\n\
             In headless mode, errors during the boot sequence or OS setup\n\
             won't be easily visible. Use at your own discretion."
            .to_string(),
        Hypervisor::Vmware => format!(
            "The VM will be run headless, without a GUI. If you want to\n\
             view the screen of the VM, connect via VNC without a password to\n\
             127.0.0.1:{}",
            state.vnc_port
        ),
    }
}
