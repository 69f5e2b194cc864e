//! External tool execution
//!
//! Every external tool (`docker`, `kubectl`, `conduit`) is run through a
//! [`ToolRunner`], so the pipeline can be exercised without a cluster. The
//! process-backed runner blocks the pipeline until the tool exits and turns a
//! non-zero exit into [`ToolError::Failed`].

use crate::error::ToolError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

/// One external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    /// Collect stdout for the caller instead of streaming it
    pub capture: bool,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: false,
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

    /// Capture stdout
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools to completion
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `command`; any non-zero exit is an error
    async fn run(&self, command: &Command) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    verbose: bool,
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Create a runner; `verbose` streams tool output to the console
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            working_dir: None,
        }
    }

    /// Run every tool from `dir`
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &Command) -> Result<ToolOutput, ToolError> {
        let line = command.to_string();
        if self.verbose {
            info!("exec {}", line);
        } else {
            debug!("exec {}", line);
        }

        let mut child = tokio::process::Command::new(&command.program);
        child.args(&command.args).stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            child.current_dir(dir);
        }

        let streamed = self.verbose && !command.capture;
        if streamed {
            child.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            child.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let output = child.output().await.map_err(|source| ToolError::Spawn {
            command: line.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if self.verbose && command.capture && !stderr.is_empty() {
            eprint!("{}", stderr);
        }

        match output.status.code() {
            Some(0) => Ok(ToolOutput { stdout, stderr }),
            Some(code) => Err(ToolError::Failed {
                command: line,
                code,
                stderr,
            }),
            None => Err(ToolError::Terminated { command: line }),
        }
    }
}
