use crate::driver::vmware::{detach_cdrom, BIOS_BOOT_ORDER};
use crate::pipeline::{halt, BuildState, Step, StepAction};
use crate::shared::errors::BuildError;
use crate::vmx;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the VMX to its pre-build drive settings and deletes every file in
/// the output directory whose extension is not in `keep_extensions`.
#[derive(Debug, Default)]
pub struct CleanFiles;

impl CleanFiles {
    pub fn new() -> Self {
        Self
    }
}

impl Step for CleanFiles {
    fn name(&self) -> &str {
        "clean_files"
    }

    fn run(&mut self, state: &mut BuildState) -> StepAction {
        let vmx_path = PathBuf::from(&state.machine);
        let restored = vmx::update(&vmx_path, |data| {
            detach_cdrom(data);
            vmx::delete(data, BIOS_BOOT_ORDER);
        });
        if let Err(source) = restored {
            return halt(
                state,
                BuildError::Vmx {
                    action: "error restoring VMX".to_string(),
                    source,
                },
            );
        }

        state.ui.say("Deleting unnecessary VMware files...");
        let output_dir = state.config.output_dir.clone();
        let mut doomed = Vec::new();
        if let Err(err) = collect_unkept(&output_dir, &state.config.keep_extensions, &mut doomed) {
            return halt(state, err);
        }
        for path in doomed {
            state.ui.message(&format!("Deleting: {}", path.display()));
            if let Err(err) = fs::remove_file(&path) {
                return halt(state, BuildError::io("error deleting", path.display(), err));
            }
        }
        StepAction::Continue
    }
}

fn collect_unkept(
    dir: &Path,
    keep_extensions: &[String],
    out: &mut Vec<PathBuf>,
) -> Result<(), BuildError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(BuildError::io("error reading", dir.display(), err)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| BuildError::io("error reading", dir.display(), err))?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        let file_type = fs::symlink_metadata(&path)
            .map_err(|err| BuildError::io("error reading", path.display(), err))?
            .file_type();
        if file_type.is_dir() {
            collect_unkept(&path, keep_extensions, out)?;
        } else if !is_kept(&path, keep_extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_kept(path: &Path, keep_extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    keep_extensions
        .iter()
        .any(|kept| kept.strip_prefix('.') == Some(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_extensions_are_kept() {
        let keep = vec![".vmdk".to_string(), ".vmx".to_string()];
        assert!(is_kept(Path::new("out/disk.vmdk"), &keep));
        assert!(is_kept(Path::new("out/build.vmx"), &keep));
        assert!(!is_kept(Path::new("out/build.vmx.lck"), &keep));
        assert!(!is_kept(Path::new("out/vmware.log"), &keep));
        assert!(!is_kept(Path::new("out/nvram"), &keep));
    }

    #[test]
    fn collects_nested_files_and_tolerates_missing_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("logs")).expect("mkdir");
        fs::write(dir.path().join("disk.vmdk"), b"disk").expect("write");
        fs::write(dir.path().join("logs/vmware.log"), b"log").expect("write");

        let keep = vec![".vmdk".to_string()];
        let mut doomed = Vec::new();
        collect_unkept(dir.path(), &keep, &mut doomed).expect("walk");
        assert_eq!(doomed, vec![dir.path().join("logs/vmware.log")]);

        let mut none = Vec::new();
        collect_unkept(&dir.path().join("absent"), &keep, &mut none).expect("missing ok");
        assert!(none.is_empty());
    }
}
