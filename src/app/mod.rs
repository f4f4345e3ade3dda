//! Command-line surface: `build`, `validate` and `help`.

use crate::config::load::load_build_config;
use crate::fetch::Fetcher;
use crate::pipeline::{CancelToken, RunOutcome};
use crate::steps::{prepare_state, run_build};
use crate::ui::{ConsoleUi, Ui};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const STOP_FILE_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Build,
    Validate,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "build" => CliVerb::Build,
        "validate" => CliVerb::Validate,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  build <config.yaml> [--dry-run] [--stop-file <path>]".to_string(),
        "                                       Run the build pipeline for a config".to_string(),
        "  validate <config.yaml>               Check a config without side effects".to_string(),
        "  help                                 Show this help".to_string(),
        String::new(),
        "A build is cancelled when the stop file appears; cleanup still runs.".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildArgs {
    config: PathBuf,
    dry_run: bool,
    stop_file: Option<PathBuf>,
}

fn parse_build_args(args: &[String]) -> Result<BuildArgs, String> {
    let mut config = None;
    let mut dry_run = false;
    let mut stop_file = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--stop-file" => {
                let path = iter
                    .next()
                    .ok_or_else(|| "`--stop-file` requires a path".to_string())?;
                stop_file = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag `{flag}`")),
            path => {
                if config.is_some() {
                    return Err(format!("unexpected argument `{path}`"));
                }
                config = Some(PathBuf::from(path));
            }
        }
    }
    Ok(BuildArgs {
        config: config.ok_or_else(|| "usage: build <config.yaml>".to_string())?,
        dry_run,
        stop_file,
    })
}

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let Some(verb) = args.first() else {
        return Ok(cli_help_lines().join("\n"));
    };
    match parse_cli_verb(verb) {
        CliVerb::Help => Ok(cli_help_lines().join("\n")),
        CliVerb::Validate => {
            let path = args
                .get(1)
                .ok_or_else(|| "usage: validate <config.yaml>".to_string())?;
            let config = load_build_config(Path::new(path)).map_err(|e| e.to_string())?;
            Ok(format!(
                "config ok: vm_name={} hypervisor={} boot_commands={}",
                config.vm_name,
                config.hypervisor,
                config.boot_command.len()
            ))
        }
        CliVerb::Build => cmd_build(&parse_build_args(&args[1..])?),
        CliVerb::Unknown => Err(format!("unknown command `{verb}`\n{}", cli_help_lines().join("\n"))),
    }
}

fn cmd_build(args: &BuildArgs) -> Result<String, String> {
    let config = load_build_config(&args.config).map_err(|e| e.to_string())?;
    let cancel = CancelToken::new();
    let ui: Arc<dyn Ui> = Arc::new(ConsoleUi);
    let mut state =
        prepare_state(config, ui, cancel.clone(), args.dry_run).map_err(|e| e.to_string())?;

    let watcher = args
        .stop_file
        .as_ref()
        .map(|path| StopFileWatcher::spawn(path.clone(), cancel.clone()));
    let outcome = run_build(&mut state, Fetcher::default());
    if let Some(watcher) = watcher {
        watcher.shutdown();
    }

    match outcome {
        RunOutcome::Succeeded => Ok(match state.export_path.as_ref() {
            Some(path) => format!("Build finished. Artifact: {}", path.display()),
            None => "Build finished.".to_string(),
        }),
        RunOutcome::Cancelled => Err("Build was cancelled.".to_string()),
        RunOutcome::Halted { step, error } => Err(match error {
            Some(err) => format!("Build errored in step `{step}` ({}): {err}", err.kind()),
            None => format!("Build halted in step `{step}`."),
        }),
    }
}

/// Cancels the build when a stop file appears.
struct StopFileWatcher {
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StopFileWatcher {
    fn spawn(path: PathBuf, cancel: CancelToken) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);
        let handle = thread::spawn(move || {
            while !done_flag.load(Ordering::Relaxed) {
                if path.exists() {
                    cancel.cancel();
                    return;
                }
                thread::sleep(STOP_FILE_POLL);
            }
        });
        Self { done, handle }
    }

    fn shutdown(self) {
        self.done.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}
