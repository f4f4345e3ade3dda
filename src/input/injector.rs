use super::template::{render_boot_command, BootCommandData};
use super::tokens::{tokenize, Token};
use super::{encode_token, InputError, KeyEncoding, KeyEvent, KeySink, WaitDurations};
use crate::pipeline::CancelToken;
use std::time::Duration;

/// One step of typing: the events for a single key, or a pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedInput {
    Keys { token: Token, events: Vec<KeyEvent> },
    Pause(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOutcome {
    Completed,
    Cancelled,
}

/// Encodes the whole command up front so an untypeable character fails
/// before the first key reaches the console.
pub fn plan_keystrokes(
    rendered: &str,
    encoding: KeyEncoding,
    waits: &WaitDurations,
) -> Result<Vec<PlannedInput>, InputError> {
    tokenize(rendered)
        .into_iter()
        .map(|token| match token {
            Token::Wait(length) => Ok(PlannedInput::Pause(waits.for_length(length))),
            other => Ok(PlannedInput::Keys {
                token: other,
                events: encode_token(&other, encoding)?,
            }),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct InputInjector {
    data: BootCommandData,
    waits: WaitDurations,
}

impl InputInjector {
    pub fn new(data: BootCommandData, waits: WaitDurations) -> Self {
        Self { data, waits }
    }

    pub fn data(&self) -> &BootCommandData {
        &self.data
    }

    /// Renders `template` and types it into `sink`. Cancellation is checked
    /// before every key and during every pause.
    pub fn type_command(
        &self,
        sink: &mut dyn KeySink,
        template: &str,
        cancel: &CancelToken,
    ) -> Result<TypeOutcome, InputError> {
        let rendered = render_boot_command(template, &self.data)?;
        let plan = plan_keystrokes(&rendered, sink.encoding(), &self.waits)?;
        send_plan(sink, &plan, cancel)
    }
}

pub fn send_plan(
    sink: &mut dyn KeySink,
    plan: &[PlannedInput],
    cancel: &CancelToken,
) -> Result<TypeOutcome, InputError> {
    for input in plan {
        match input {
            PlannedInput::Pause(duration) => {
                if !cancel.sleep(*duration) {
                    return Ok(TypeOutcome::Cancelled);
                }
            }
            PlannedInput::Keys { events, .. } => {
                if cancel.is_cancelled() {
                    return Ok(TypeOutcome::Cancelled);
                }
                for event in events {
                    sink.send(*event)?;
                }
            }
        }
    }
    Ok(TypeOutcome::Completed)
}
