//! External process runner shared by the CLI adapters.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::context::AdapterContext;
use crate::error::TranscodeError;

/// Timeout applied to `-version` style environment probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// A command line invocation with a time budget.
///
/// Stdout lines are reported as `info` messages and stderr lines as `warn`
/// messages of the owning adapter, either line by line while the process
/// runs (streaming) or once it has exited. Stderr lines matching the progress
/// pattern are reported as `debug` instead.
#[derive(Debug, Clone)]
pub struct CliProcess {
    program: PathBuf,
    args: Vec<String>,
    timeout_secs: u64,
    stream_output: bool,
    progress_pattern: Option<Regex>,
}

impl CliProcess {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: 3600,
            stream_output: false,
            progress_pattern: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn stream_output(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    pub fn progress_pattern(mut self, pattern: Regex) -> Self {
        self.progress_pattern = Some(pattern);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Runs the process to completion.
    ///
    /// A non-zero exit status is a [`TranscodeFailed`](TranscodeError::TranscodeFailed)
    /// error carrying the status text and stderr. Exceeding the time budget kills
    /// the process and returns [`Timeout`](TranscodeError::Timeout).
    pub async fn run(&self, context: &AdapterContext) -> Result<CliOutput, TranscodeError> {
        let adapter = context.key();
        tracing::debug!(
            adapter = %adapter,
            program = %self.program.display(),
            args = ?self.args,
            "Spawning process"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(adapter, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TranscodeError::transcode_failed(adapter, "process stdout was not captured", None)
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            TranscodeError::transcode_failed(adapter, "process stderr was not captured", None)
        })?;

        let stream = self.stream_output;
        let progress = self.progress_pattern.as_ref();
        let read_stdout = collect_lines(stdout, |line| {
            if stream {
                context.info(line);
            }
        });
        let read_stderr = collect_lines(stderr, |line| {
            if stream {
                if progress.is_some_and(|re| re.is_match(line)) {
                    context.debug(line);
                } else {
                    context.warn(line);
                }
            }
        });

        let result = timeout(Duration::from_secs(self.timeout_secs), async {
            let (stdout, stderr, status) = tokio::join!(read_stdout, read_stderr, child.wait());
            Ok::<_, std::io::Error>((status?, stdout?, stderr?))
        })
        .await;

        let (status, stdout, stderr) = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(TranscodeError::Io(e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        adapter = %adapter,
                        error = %e,
                        "Failed to kill timed out process"
                    );
                }
                return Err(TranscodeError::Timeout {
                    adapter: adapter.to_string(),
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        if !stream {
            if !stdout.trim().is_empty() {
                context.info(stdout.trim_end());
            }
            if !stderr.trim().is_empty() {
                context.warn(stderr.trim_end());
            }
        }

        if !status.success() {
            return Err(TranscodeError::transcode_failed(
                adapter,
                format!("{} exited with {}", self.program.display(), status),
                if stderr.is_empty() { None } else { Some(stderr) },
            ));
        }

        Ok(CliOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn spawn_error(&self, adapter: &str, e: std::io::Error) -> TranscodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::environment(
                adapter,
                format!("executable not found: {}", self.program.display()),
            )
        } else {
            TranscodeError::transcode_failed(
                adapter,
                format!("failed to start {}: {e}", self.program.display()),
                None,
            )
        }
    }
}

async fn collect_lines<R, F>(reader: R, mut on_line: F) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Some(line) = lines.next_line().await? {
        on_line(&line);
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}

/// Checks that `program` can be started and exits successfully with `arg`.
pub async fn probe_executable(
    adapter: &str,
    program: &Path,
    arg: &str,
) -> Result<(), TranscodeError> {
    let output = Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(TranscodeError::environment(
            adapter,
            format!(
                "{} {arg} exited with {}",
                program.display(),
                output.status
            ),
        )),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(TranscodeError::environment(
            adapter,
            format!("executable not found: {}", program.display()),
        )),
        Ok(Err(e)) => Err(TranscodeError::environment(
            adapter,
            format!("failed to start {}: {e}", program.display()),
        )),
        Err(_) => Err(TranscodeError::environment(
            adapter,
            format!("{} {arg} did not finish in time", program.display()),
        )),
    }
}
