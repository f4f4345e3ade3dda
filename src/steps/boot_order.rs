use crate::driver::{DISK_FIRST, MEDIA_FIRST};
use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;

/// Boots from the attached media; cleanup puts the disk first again.
#[derive(Debug, Default)]
pub struct SetBootOrder {
    changed_on: Option<String>,
}

impl SetBootOrder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for SetBootOrder {
    fn name(&self) -> &str {
        "set_boot_order"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        if state.asset_path.is_none() {
            return StepAction::Continue;
        }

        if let Err(err) = state.driver.set_boot_order(&state.machine, &MEDIA_FIRST) {
            return halt(state, BuildError::driver("error setting boot order", err));
        }
        self.changed_on = Some(state.machine.clone());
        StepAction::Continue
    }

    fn cleanup(&mut self, state: &mut BuildState) -> Result<(), BuildError> {
        let Some(handle) = self.changed_on.take() else {
            return Ok(());
        };
        state
            .driver
            .set_boot_order(&handle, &DISK_FIRST)
            .map_err(|err| BuildError::driver("error restoring device boot order", err))
    }
}
