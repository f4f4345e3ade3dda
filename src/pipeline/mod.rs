//! Sequential step runner.
//!
//! Steps run one at a time in pipeline order over a shared [`BuildState`].
//! Every step whose `run` was invoked gets exactly one `cleanup`, in reverse
//! order, whether the pipeline finished, halted, or was cancelled.

pub mod state;

pub use state::{BuildState, CancelToken};

use crate::shared::errors::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Continue,
    Halt,
}

pub trait Step {
    fn name(&self) -> &str;

    fn run(&mut self, state: &mut BuildState) -> StepAction;

    /// Undo whatever `run` did. Errors are reported by the runner and never
    /// replace the error that stopped the build.
    fn cleanup(&mut self, _state: &mut BuildState) -> Result<(), BuildError> {
        Ok(())
    }
}

/// Terminal outcome of a pipeline run.
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded,
    Halted {
        step: String,
        error: Option<BuildError>,
    },
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Records `error` as the build error, reports it, and returns
/// [`StepAction::Halt`].
pub fn halt(state: &mut BuildState, error: BuildError) -> StepAction {
    let text = error.to_string();
    state.ui.error(&text);
    state.log.error("pipeline.step.error", &text);
    state.record_error(error);
    StepAction::Halt
}

pub struct Runner {
    steps: Vec<Box<dyn Step>>,
}

impl Runner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.name().to_string()).collect()
    }

    pub fn run(&mut self, state: &mut BuildState) -> RunOutcome {
        let mut executed = Vec::with_capacity(self.steps.len());
        let mut halted_at = None;

        for (index, step) in self.steps.iter_mut().enumerate() {
            if state.is_cancelled() {
                state
                    .log
                    .warn("pipeline.cancelled", &format!("before step={}", step.name()));
                break;
            }

            state
                .log
                .info("pipeline.step.started", &format!("step={}", step.name()));
            let action = step.run(state);
            executed.push(index);

            if action == StepAction::Halt {
                state
                    .log
                    .warn("pipeline.step.halted", &format!("step={}", step.name()));
                halted_at = Some(step.name().to_string());
                break;
            }
            state
                .log
                .info("pipeline.step.completed", &format!("step={}", step.name()));
        }

        for index in executed.into_iter().rev() {
            let step = &mut self.steps[index];
            if let Err(err) = step.cleanup(state) {
                let text = format!("Error cleaning up step `{}`: {err}", step.name());
                state.ui.error(&text);
                state.log.warn("pipeline.cleanup.failed", &text);
            }
        }

        if state.is_cancelled() {
            state.log.warn("pipeline.finished", "outcome=cancelled");
            return RunOutcome::Cancelled;
        }
        if let Some(step) = halted_at {
            state.log.error("pipeline.finished", "outcome=halted");
            return RunOutcome::Halted {
                step,
                error: state.take_error(),
            };
        }
        state.log.info("pipeline.finished", "outcome=succeeded");
        RunOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn cancel_token_clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_token_sleep_wakes_early_when_cancelled() {
        let token = CancelToken::new();
        let waker = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            waker.cancel();
        });

        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().expect("join waker");
    }

    #[test]
    fn cancel_token_sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(10)));
    }
}
