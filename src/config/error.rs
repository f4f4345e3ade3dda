#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("build validation failed: {0}")]
    Build(String),
    #[error("error parsing checksum: {0}")]
    Checksum(String),
    #[error("boot command {index} is not a valid template: {reason}")]
    BootCommandTemplate { index: usize, reason: String },
}
