use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;

/// Inserts the fetched media into the machine's optical drive.
#[derive(Debug, Default)]
pub struct AttachMedia {
    attached_to: Option<String>,
}

impl AttachMedia {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for AttachMedia {
    fn name(&self) -> &str {
        "attach_media"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        let Some(media) = state.asset_path.clone() else {
            return StepAction::Continue;
        };

        state.ui.say("Attaching boot media...");
        if let Err(err) = state.driver.attach_media(&state.machine, &media) {
            return halt(state, BuildError::driver("error attaching boot media", err));
        }
        self.attached_to = Some(state.machine.clone());
        state
            .log
            .info("driver.media.attached", &format!("media={}", media.display()));
        StepAction::Continue
    }

    fn cleanup(&mut self, state: &mut BuildState) -> Result<(), BuildError> {
        let Some(handle) = self.attached_to.take() else {
            return Ok(());
        };
        state
            .driver
            .detach_media(&handle)
            .map_err(|err| BuildError::driver("error detaching boot media", err))
    }
}
