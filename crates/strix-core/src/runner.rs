//! Tool runner seam
//!
//! The engine only depends on [`ToolRunner`]; [`ProcessRunner`] spawns real
//! subprocesses with Tokio.

use crate::error::ExecutionFault;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use strix_model::Tool;
use tokio::process::Command;

/// One tool invocation
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Tool being run
    pub tool: &'a Tool,
    /// Program and arguments
    pub argv: &'a [String],
    /// Extra environment variables
    pub env: &'a [(String, String)],
    /// Working directory
    pub cwd: &'a Path,
    /// Hard timeout
    pub timeout: Option<Duration>,
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code; `None` when killed by a signal
    pub exit_code: Option<i32>,
}

impl RunOutput {
    /// Whether the process exited with status zero
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools
#[async_trait]
pub trait ToolRunner: Send + Sync + std::fmt::Debug {
    /// Whether the tool's command can be found
    async fn is_installed(&self, tool: &Tool) -> bool;

    /// Run one command to completion
    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput, ExecutionFault>;
}

/// Subprocess runner
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    search_path: Option<Vec<PathBuf>>,
}

impl ProcessRunner {
    /// Runner resolving commands through `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve commands through the given directories instead of `PATH`
    #[must_use]
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = Some(dirs);
        self
    }

    fn locate(&self, command: &str) -> Option<PathBuf> {
        let candidate = Path::new(command);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }
        let dirs = match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default(),
        };
        dirs.into_iter().map(|d| d.join(command)).find(|p| p.is_file())
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn is_installed(&self, tool: &Tool) -> bool {
        self.locate(&tool.command).is_some()
    }

    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput, ExecutionFault> {
        let fault = |exit_code: Option<i32>, message: String| ExecutionFault::ToolFault {
            tool: request.tool.name.clone(),
            exit_code,
            message,
        };
        let (program, args) = request
            .argv
            .split_first()
            .ok_or_else(|| fault(None, "empty command line".into()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(request.env.iter().map(|(k, v)| (k, v)))
            .current_dir(request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %request.tool.name, argv = ?request.argv, "spawning tool");
        let pending = command.output();
        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| fault(None, format!("timed out after {}s", limit.as_secs())))?,
            None => pending.await,
        }
        .map_err(|e| fault(None, e.to_string()))?;

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}
