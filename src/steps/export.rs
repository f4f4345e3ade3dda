use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;

/// Produces the build artifact and publishes it as `export_path`.
#[derive(Debug, Default)]
pub struct ExportMachine;

impl ExportMachine {
    pub fn new() -> Self {
        Self
    }
}

impl Step for ExportMachine {
    fn name(&self) -> &str {
        "export"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        state.ui.say("Exporting virtual machine...");
        match state
            .driver
            .export(&state.machine, &state.config.output_dir)
        {
            Ok(path) => {
                state
                    .log
                    .info("driver.exported", &format!("path={}", path.display()));
                state.export_path = Some(path);
                StepAction::Continue
            }
            Err(err) => halt(state, BuildError::driver("error exporting virtual machine", err)),
        }
    }
}
