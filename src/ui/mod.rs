use std::sync::Mutex;

/// Sink for user-facing build output.
pub trait Ui: Send + Sync {
    /// A headline for a new phase of work.
    fn say(&self, message: &str);
    /// Supplementary detail under the current phase.
    fn message(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        println!("==> {message}");
    }

    fn message(&self, message: &str) {
        for line in message.lines() {
            println!("    {line}");
        }
    }

    fn error(&self, message: &str) {
        eprintln!("==> {message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiLine {
    Say(String),
    Message(String),
    Error(String),
}

/// Records every line in memory. Used by embedders that render output
/// themselves and by tests.
#[derive(Debug, Default)]
pub struct MemoryUi {
    lines: Mutex<Vec<UiLine>>,
}

impl MemoryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<UiLine> {
        self.lines
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                UiLine::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| match line {
            UiLine::Say(text) | UiLine::Message(text) | UiLine::Error(text) => {
                text.contains(needle)
            }
        })
    }

    fn push(&self, line: UiLine) {
        self.lines
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(line);
    }
}

impl Ui for MemoryUi {
    fn say(&self, message: &str) {
        self.push(UiLine::Say(message.to_string()));
    }

    fn message(&self, message: &str) {
        self.push(UiLine::Message(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(UiLine::Error(message.to_string()));
    }
}
