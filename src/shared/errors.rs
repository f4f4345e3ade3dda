use crate::config::ConfigError;
use crate::driver::DriverError;
use crate::fetch::FetchError;
use crate::input::InputError;
use crate::vmx::VmxError;
use std::fmt;

/// Coarse classification of a build failure, used by callers that only need
/// to know how the pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transfer,
    Verification,
    Driver,
    Input,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Transfer => "transfer",
            Self::Verification => "verification",
            Self::Driver => "driver",
            Self::Input => "input",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

/// The error a step records into the build state before halting.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("error downloading {what}: {source}")]
    Fetch {
        what: String,
        #[source]
        source: FetchError,
    },
    #[error("{action}: {source}")]
    Driver {
        action: String,
        #[source]
        source: DriverError,
    },
    #[error("{action}: {source}")]
    Vmx {
        action: String,
        #[source]
        source: VmxError,
    },
    #[error("error typing boot command: {0}")]
    Input(#[from] InputError),
    #[error("{action} {path}: {source}")]
    Io {
        action: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn driver(action: impl Into<String>, source: DriverError) -> Self {
        Self::Driver {
            action: action.into(),
            source,
        }
    }

    pub fn io(action: impl Into<String>, path: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            action: action.into(),
            path: path.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Config(_) => ErrorKind::Configuration,
            Self::Fetch { source, .. } => source.kind(),
            Self::Driver { .. } | Self::Vmx { .. } => ErrorKind::Driver,
            Self::Input(source) => source.kind(),
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
