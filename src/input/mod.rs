//! Typing boot commands into a machine's console.
//!
//! A command template is rendered, split into tokens (characters, special
//! keys, wait directives), encoded for the console's key encoding, and then
//! sent one key at a time with a cancellation check before every character.

pub mod injector;
pub mod keysym;
pub mod recording;
pub mod scancode;
pub mod template;
pub mod tokens;
pub mod vnc;

pub use injector::{plan_keystrokes, InputInjector, PlannedInput, TypeOutcome};
pub use recording::RecordingConsole;
pub use template::{render_boot_command, BootCommandData};
pub use tokens::{tokenize, SpecialKey, Token, WaitLength};
pub use vnc::{VncClient, VncConnector};

use crate::pipeline::BuildState;
use crate::shared::errors::ErrorKind;
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("template error: {reason}")]
    Template { reason: String },
    #[error("character {ch:?} cannot be typed with {encoding} encoding")]
    UnsupportedCharacter { ch: char, encoding: KeyEncoding },
    #[error("failed to connect to console at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("console handshake failed: {0}")]
    Handshake(String),
    #[error("console i/o failed: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send key event: {0}")]
    Send(String),
}

impl InputError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Template { .. } | Self::UnsupportedCharacter { .. } => ErrorKind::Configuration,
            _ => ErrorKind::Input,
        }
    }
}

/// Which code space a console consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// PC AT set 1 scancodes; codes above `0xff` carry the `0xe0` prefix in
    /// their high byte.
    Scancode,
    /// X11 keysyms as used by the RFB protocol.
    Keysym,
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scancode => f.write_str("scancode"),
            Self::Keysym => f.write_str("keysym"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn press(code: u32) -> Self {
        Self {
            code,
            pressed: true,
        }
    }

    pub fn release(code: u32) -> Self {
        Self {
            code,
            pressed: false,
        }
    }
}

/// Pause lengths for the `wait`, `wait5` and `wait10` directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitDurations {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for WaitDurations {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(1),
            medium: Duration::from_secs(5),
            long: Duration::from_secs(10),
        }
    }
}

impl WaitDurations {
    pub fn for_length(&self, length: WaitLength) -> Duration {
        match length {
            WaitLength::Short => self.short,
            WaitLength::Medium => self.medium,
            WaitLength::Long => self.long,
        }
    }
}

/// A live console that accepts key events.
pub trait KeySink {
    fn encoding(&self) -> KeyEncoding;

    fn send(&mut self, event: KeyEvent) -> Result<(), InputError>;
}

/// Opens a console session for the machine described by the build state.
pub trait ConsoleConnector: Send + Sync {
    fn open(&self, state: &BuildState) -> Result<Box<dyn KeySink>, InputError>;
}

/// Encodes a non-wait token into the key events for `encoding`.
pub fn encode_token(token: &Token, encoding: KeyEncoding) -> Result<Vec<KeyEvent>, InputError> {
    match encoding {
        KeyEncoding::Scancode => scancode::encode(token),
        KeyEncoding::Keysym => keysym::encode(token),
    }
}
