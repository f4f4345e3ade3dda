//! VMware `.vmx` configuration files: flat `key = "value"` lines.
//!
//! Keys are kept sorted so saving the same data twice yields the same bytes.

use crate::shared::fs_atomic::atomic_write_file;
use std::collections::BTreeMap;
use std::path::Path;

pub type VmxData = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum VmxError {
    #[error("error reading VMX {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("error writing VMX {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn parse(contents: &str) -> VmxData {
    let mut data = VmxData::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        data.insert(key.to_string(), value.to_string());
    }
    data
}

pub fn encode(data: &VmxData) -> String {
    let mut out = String::new();
    for (key, value) in data {
        out.push_str(key);
        out.push_str(" = \"");
        out.push_str(value);
        out.push_str("\"\n");
    }
    out
}

pub fn load(path: &Path) -> Result<VmxData, VmxError> {
    let contents = std::fs::read_to_string(path).map_err(|source| VmxError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse(&contents))
}

pub fn save(path: &Path, data: &VmxData) -> Result<(), VmxError> {
    atomic_write_file(path, encode(data).as_bytes()).map_err(|source| VmxError::Write {
        path: path.display().to_string(),
        source,
    })
}

pub fn delete(data: &mut VmxData, key: &str) -> Option<String> {
    data.remove(key)
}

/// Loads `path`, applies `edit`, and saves the result.
pub fn update(path: &Path, edit: impl FnOnce(&mut VmxData)) -> Result<(), VmxError> {
    let mut data = load(path)?;
    edit(&mut data);
    save(path, &data)
}
