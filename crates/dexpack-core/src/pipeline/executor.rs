//! External-tool execution infrastructure.
//!
//! Provides the trait seam between the pipeline runner and the OS, plus
//! the process-spawning implementation used in production.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::StageLimits;
use crate::error::{DexpackError, Result};
use crate::pipeline::stage::StageKind;
use crate::signing::redact_passwords;

/// One external command: a tool path and its argument list.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: PathBuf,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            args: Vec::new(),
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

    /// Short tool name for error messages.
    pub fn tool_name(&self) -> String {
        self.tool
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.tool.display().to_string())
    }

    /// Loggable command line with passwords redacted.
    pub fn display_line(&self) -> String {
        let line = format!("{} {}", self.tool.display(), self.args.join(" "));
        redact_passwords(&line)
    }
}

/// Result of a completed tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit code of the process (0 = success).
    pub exit_code: i32,
    /// Path to the stdout log file.
    pub stdout_path: PathBuf,
    /// Path to the stderr log file.
    pub stderr_path: PathBuf,
    /// Number of lines written to stdout.
    pub stdout_lines: i32,
    /// Number of lines written to stderr.
    pub stderr_lines: i32,
}

/// Trait for external-tool execution.
///
/// The production implementation spawns real processes; tests substitute
/// a recording fake so stage sequencing can be exercised without an SDK.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs the tool to completion.
    ///
    /// Returns `Ok` only for a zero exit status; a non-zero exit becomes
    /// `DexpackError::ToolFailed` so the pipeline fails fast.
    async fn run(
        &self,
        stage: StageKind,
        invocation: &ToolInvocation,
        log_dir: &Path,
    ) -> Result<ToolOutput>;
}

/// Process-spawning tool executor.
///
/// Captures stdout/stderr into per-stage log files (size-capped) and
/// enforces a per-stage timeout.
pub struct ProcessExecutor {
    limits: StageLimits,
}

impl ProcessExecutor {
    /// Creates an executor with limits from the environment.
    pub fn new() -> Self {
        Self {
            limits: StageLimits::from_env(),
        }
    }

    pub fn with_limits(limits: StageLimits) -> Self {
        Self { limits }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ProcessExecutor {
    async fn run(
        &self,
        stage: StageKind,
        invocation: &ToolInvocation,
        log_dir: &Path,
    ) -> Result<ToolOutput> {
        tokio::fs::create_dir_all(log_dir).await?;

        let stdout_path = log_dir.join(format!("{}-{}-stdout.log", stage.index(), stage.as_str()));
        let stderr_path = log_dir.join(format!("{}-{}-stderr.log", stage.index(), stage.as_str()));

        let stdout_file = tokio::fs::File::create(&stdout_path).await?;
        let stderr_file = tokio::fs::File::create(&stderr_path).await?;

        tracing::debug!("[{}] {}", stage, invocation.display_line());

        let mut child = Command::new(&invocation.tool)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DexpackError::ToolNotFound(invocation.tool.display().to_string())
                } else {
                    DexpackError::Io(e)
                }
            })?;

        let child_stdout = child.stdout.take().expect("stdout was piped");
        let child_stderr = child.stderr.take().expect("stderr was piped");

        let mut stdout_writer = tokio::io::BufWriter::new(stdout_file);
        let mut stderr_writer = tokio::io::BufWriter::new(stderr_file);

        let timeout = std::time::Duration::from_secs(self.limits.max_stage_duration_secs);
        let max_bytes = self.limits.max_log_size_bytes;

        let stdout_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(child_stdout);
            let mut line = String::new();
            let mut bytes_written = 0u64;
            let mut lines = 0i32;

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(n) => {
                        bytes_written += n as u64;
                        if bytes_written <= max_bytes {
                            use tokio::io::AsyncWriteExt;
                            let _ = stdout_writer.write_all(line.as_bytes()).await;
                            lines += 1;
                        }
                    }
                    Err(_) => break,
                }
            }
            use tokio::io::AsyncWriteExt;
            let _ = stdout_writer.flush().await;
            lines
        });

        let stderr_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(child_stderr);
            let mut line = String::new();
            let mut bytes_written = 0u64;
            let mut lines = 0i32;

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(n) => {
                        bytes_written += n as u64;
                        if bytes_written <= max_bytes {
                            use tokio::io::AsyncWriteExt;
                            let _ = stderr_writer.write_all(line.as_bytes()).await;
                            lines += 1;
                        }
                    }
                    Err(_) => break,
                }
            }
            use tokio::io::AsyncWriteExt;
            let _ = stderr_writer.flush().await;
            lines
        });

        let status = tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                return Err(DexpackError::StageTimeout {
                    tool: invocation.tool_name(),
                    timeout_secs: self.limits.max_stage_duration_secs,
                });
            }
            status = child.wait() => status?,
        };

        let stdout_lines = stdout_handle.await.unwrap_or(0);
        let stderr_lines = stderr_handle.await.unwrap_or(0);

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            return Err(DexpackError::ToolFailed {
                tool: invocation.tool_name(),
                exit_code,
                stderr_tail: stderr_tail(&stderr_path).await,
            });
        }

        Ok(ToolOutput {
            exit_code,
            stdout_path,
            stderr_path,
            stdout_lines,
            stderr_lines,
        })
    }
}

/// Last lines of a stderr log, redacted, for embedding in an error.
async fn stderr_tail(path: &Path) -> String {
    const TAIL_LINES: usize = 20;

    let content = tokio::fs::read_to_string(path).await.unwrap_or_default();
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    redact_passwords(lines[start..].join("\n").trim())
}
