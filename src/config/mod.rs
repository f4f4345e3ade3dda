pub mod error;
pub mod load;

pub use error::ConfigError;
pub use load::load_build_config;

use crate::fetch::checksum::{Checksum, HashKind};
use crate::input::template::{render_boot_command, BootCommandData};
use crate::input::WaitDurations;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "output-vmforge";
pub const DEFAULT_CACHE_DIR: &str = "vmforge_cache";
pub const DEFAULT_HOST_INTERFACE: &str = "vmnet8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hypervisor {
    Virtualbox,
    Vmware,
}

impl fmt::Display for Hypervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtualbox => f.write_str("virtualbox"),
            Self::Vmware => f.write_str("vmware"),
        }
    }
}

/// Optional boot medium (e.g. a rescue ISO) fetched into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub url: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default = "default_checksum_type")]
    pub checksum_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_wait_short_ms")]
    pub short_ms: u64,
    #[serde(default = "default_wait_medium_ms")]
    pub medium_ms: u64,
    #[serde(default = "default_wait_long_ms")]
    pub long_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            short_ms: default_wait_short_ms(),
            medium_ms: default_wait_medium_ms(),
            long_ms: default_wait_long_ms(),
        }
    }
}

impl From<WaitConfig> for WaitDurations {
    fn from(value: WaitConfig) -> Self {
        WaitDurations {
            short: Duration::from_millis(value.short_ms),
            medium: Duration::from_millis(value.medium_ms),
            long: Duration::from_millis(value.long_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub vm_name: String,
    pub hypervisor: Hypervisor,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub boot_wait_secs: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_vnc_port")]
    pub vnc_port: u16,
    #[serde(default)]
    pub vmx_path: Option<PathBuf>,
    #[serde(default)]
    pub asset: Option<AssetConfig>,
    #[serde(default)]
    pub boot_command: Vec<String>,
    #[serde(default = "default_keep_extensions")]
    pub keep_extensions: Vec<String>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_host_interface")]
    pub host_interface: String,
    #[serde(default)]
    pub wait: WaitConfig,
}

impl BuildConfig {
    /// Minimal configuration with every optional field at its default.
    pub fn new(vm_name: impl Into<String>, hypervisor: Hypervisor) -> Self {
        Self {
            vm_name: vm_name.into(),
            hypervisor,
            headless: false,
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            boot_wait_secs: 0,
            http_port: default_http_port(),
            vnc_port: default_vnc_port(),
            vmx_path: None,
            asset: None,
            boot_command: Vec::new(),
            keep_extensions: default_keep_extensions(),
            log_path: None,
            host_interface: default_host_interface(),
            wait: WaitConfig::default(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vm_name.trim().is_empty() {
            return Err(ConfigError::Build("`vm_name` must be non-empty".to_string()));
        }
        if self.hypervisor == Hypervisor::Vmware && self.vmx_path.is_none() {
            return Err(ConfigError::Build(
                "`vmx_path` is required when `hypervisor` is `vmware`".to_string(),
            ));
        }
        for ext in &self.keep_extensions {
            if !ext.starts_with('.') {
                return Err(ConfigError::Build(format!(
                    "keep extension `{ext}` must start with `.`"
                )));
            }
        }
        self.asset_checksum()?;

        let placeholder = BootCommandData::new("127.0.0.1", self.http_port, &self.vm_name);
        for (index, command) in self.boot_command.iter().enumerate() {
            render_boot_command(command, &placeholder).map_err(|err| {
                ConfigError::BootCommandTemplate {
                    index,
                    reason: err.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// The configured asset, or `None` when no asset URL was given.
    pub fn asset(&self) -> Option<&AssetConfig> {
        self.asset
            .as_ref()
            .filter(|asset| !asset.url.trim().is_empty())
    }

    /// Decodes the asset checksum. An empty checksum means "do not verify".
    pub fn asset_checksum(&self) -> Result<Option<Checksum>, ConfigError> {
        let Some(asset) = self.asset() else {
            return Ok(None);
        };
        if asset.checksum.trim().is_empty() {
            return Ok(None);
        }
        let kind = HashKind::from_str(&asset.checksum_type).map_err(ConfigError::Checksum)?;
        Checksum::from_hex(kind, &asset.checksum)
            .map(Some)
            .map_err(|err| ConfigError::Checksum(err.to_string()))
    }

    pub fn boot_wait(&self) -> Duration {
        Duration::from_secs(self.boot_wait_secs)
    }

    pub fn wait_durations(&self) -> WaitDurations {
        self.wait.into()
    }
}

fn default_checksum_type() -> String {
    "sha256".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_http_port() -> u16 {
    8080
}

fn default_vnc_port() -> u16 {
    5900
}

fn default_keep_extensions() -> Vec<String> {
    vec![".vmdk".to_string(), ".vmx".to_string()]
}

fn default_host_interface() -> String {
    DEFAULT_HOST_INTERFACE.to_string()
}

fn default_wait_short_ms() -> u64 {
    1_000
}

fn default_wait_medium_ms() -> u64 {
    5_000
}

fn default_wait_long_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> BuildConfig {
        serde_yaml::from_str(raw).expect("parse build config")
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: virtualbox
"#,
        );
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.vnc_port, 5900);
        assert_eq!(config.keep_extensions, vec![".vmdk", ".vmx"]);
        assert_eq!(config.wait_durations().medium, Duration::from_secs(5));
        assert!(config.asset().is_none());
        config.validate().expect("valid");
    }

    #[test]
    fn empty_asset_url_counts_as_unconfigured() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: virtualbox
asset:
  url: ""
  checksum: "zz"
"#,
        );
        assert!(config.asset().is_none());
        assert_eq!(config.asset_checksum().expect("no checksum"), None);
    }

    #[test]
    fn bad_checksum_hex_is_a_configuration_error() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: virtualbox
asset:
  url: https://example.invalid/rescue.iso
  checksum: "not-hex"
  checksum_type: md5
"#,
        );
        let err = config.validate().expect_err("bad checksum");
        assert!(matches!(err, ConfigError::Checksum(_)), "{err}");
    }

    #[test]
    fn unknown_checksum_type_is_rejected() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: virtualbox
asset:
  url: https://example.invalid/rescue.iso
  checksum: "00"
  checksum_type: crc32
"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Checksum(reason)) if reason.contains("crc32")
        ));
    }

    #[test]
    fn vmware_requires_vmx_path() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: vmware
"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Build(_))));
    }

    #[test]
    fn broken_boot_command_template_is_reported_with_index() {
        let config = parse(
            r#"
vm_name: rescue
hypervisor: virtualbox
boot_command:
  - "<esc><wait>"
  - "linux ks=http://{{ .HTTPIP }}:{{ .HTTPPort }/ks.cfg"
"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BootCommandTemplate { index: 1, .. })
        ));
    }
}
