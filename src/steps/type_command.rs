use crate::input::{BootCommandData, InputInjector, TypeOutcome};
use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;
use std::sync::Arc;

/// Types each configured boot command into the machine's console.
#[derive(Debug, Default)]
pub struct TypeBootCommand;

impl TypeBootCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Step for TypeBootCommand {
    fn name(&self) -> &str {
        "type_boot_command"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        if state.asset_path.is_none() || state.config.boot_command.is_empty() {
            return StepAction::Continue;
        }

        let injector = InputInjector::new(
            BootCommandData::new(
                state.host_ip.clone(),
                state.http_port,
                state.config.vm_name.clone(),
            ),
            state.config.wait_durations(),
        );
        let commands = state.config.boot_command.clone();
        let cancel = state.cancel_token();

        state.ui.say("Typing the boot command...");
        let console = Arc::clone(&state.console);
        let mut sink = match console.open(state) {
            Ok(sink) => sink,
            Err(err) => return halt(state, BuildError::Input(err)),
        };

        for (index, command) in commands.iter().enumerate() {
            match injector.type_command(sink.as_mut(), command, &cancel) {
                Ok(TypeOutcome::Completed) => {
                    state
                        .log
                        .info("input.typed", &format!("command_index={index}"));
                }
                Ok(TypeOutcome::Cancelled) => {
                    state
                        .log
                        .warn("input.cancelled", &format!("command_index={index}"));
                    return StepAction::Halt;
                }
                Err(err) => return halt(state, BuildError::Input(err)),
            }
        }
        StepAction::Continue
    }
}
