use super::{io_error, DriverError};
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs one hypervisor CLI binary with captured output and a hard timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    binary: String,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn command_form(&self, args: &[String]) -> String {
        if args.is_empty() {
            return self.binary.clone();
        }
        format!("{} {}", self.binary, args.join(" "))
    }

    pub fn run(&self, args: &[String]) -> Result<CommandOutput, DriverError> {
        let command_form = self.command_form(args);
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DriverError::MissingBinary {
                    binary: self.binary.clone(),
                })
            }
            Err(err) => return Err(io_error(Path::new(&self.binary), err)),
        };

        let stdout = child.stdout.take().ok_or_else(|| {
            io_error(
                Path::new(&self.binary),
                std::io::Error::other("missing stdout pipe"),
            )
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            io_error(
                Path::new(&self.binary),
                std::io::Error::other("missing stderr pipe"),
            )
        })?;

        let stdout_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = BufReader::new(stdout).read_to_string(&mut buf);
            buf
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf);
            buf
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = stdout_reader.join();
                        let _ = stderr_reader.join();
                        return Err(DriverError::Timeout {
                            command: command_form,
                            timeout_ms: self.timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(io_error(Path::new(&self.binary), err)),
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(DriverError::NonZeroExit {
                command: command_form,
                exit_code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
