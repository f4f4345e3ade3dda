use super::{ConsoleConnector, InputError, KeyEncoding, KeyEvent, KeySink};
use crate::pipeline::BuildState;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Recorded {
    opens: usize,
    events: Vec<KeyEvent>,
}

/// Console that records key events instead of delivering them. Used for
/// dry runs, where nothing should reach a real machine.
#[derive(Debug, Clone)]
pub struct RecordingConsole {
    encoding: KeyEncoding,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingConsole {
    pub fn new(encoding: KeyEncoding) -> Self {
        Self {
            encoding,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    pub fn events(&self) -> Vec<KeyEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConsoleConnector for RecordingConsole {
    fn open(&self, state: &BuildState) -> Result<Box<dyn KeySink>, InputError> {
        self.lock().opens += 1;
        state
            .log
            .info("input.recording.opened", &format!("encoding={}", self.encoding));
        Ok(Box::new(RecordingSink {
            encoding: self.encoding,
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct RecordingSink {
    encoding: KeyEncoding,
    recorded: Arc<Mutex<Recorded>>,
}

impl KeySink for RecordingSink {
    fn encoding(&self) -> KeyEncoding {
        self.encoding
    }

    fn send(&mut self, event: KeyEvent) -> Result<(), InputError> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .push(event);
        Ok(())
    }
}
