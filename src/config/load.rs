use super::{BuildConfig, ConfigError};
use std::path::Path;

pub fn load_build_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let config = BuildConfig::from_path(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_reads_and_validates_yaml() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("build.yaml");
        fs::write(
            &path,
            r#"
vm_name: rescue
hypervisor: virtualbox
asset:
  url: https://example.invalid/rescue.iso
  checksum: "d41d8cd98f00b204e9800998ecf8427e"
  checksum_type: md5
boot_command:
  - "<wait10>linux ks=http://{{ .HTTPIP }}:{{ .HTTPPort }}/ks.cfg<enter>"
"#,
        )
        .expect("write config");

        let config = load_build_config(&path).expect("load");
        assert_eq!(config.vm_name, "rescue");
        assert!(config.asset_checksum().expect("checksum").is_some());
    }

    #[test]
    fn load_reports_missing_file_path() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("missing.yaml");
        let err = load_build_config(&path).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }
}
