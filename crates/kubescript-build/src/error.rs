//! Build error types

use crate::stages::StageKind;
use kubescript_core::{ConfigError, RegistrationError};
use thiserror::Error;

/// External tool failures
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool ran and exited non-zero
    #[error("`{command}` exited with status {code}{}", stderr_tail(.stderr))]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The tool was killed before exiting
    #[error("`{command}` was terminated by a signal")]
    Terminated { command: String },

    /// The tool could not be started
    #[error("Cannot start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lines of captured stderr kept in the error message
const STDERR_TAIL_LINES: usize = 5;

/// `": <last lines>"` of `stderr`, or nothing when it is blank
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    format!(": {}", lines[start..].join("\n"))
}

impl ToolError {
    /// Exit status of the failing process, when it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ToolError::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Command line of the failing invocation
    pub fn command(&self) -> &str {
        match self {
            ToolError::Failed { command, .. }
            | ToolError::Terminated { command }
            | ToolError::Spawn { command, .. } => command,
        }
    }
}

/// Build-phase errors
#[derive(Debug, Error)]
pub enum BuildError {
    /// Malformed template or invalid build input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration or descriptor could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Declarations could not be finalised
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// External tool failed
    #[error("External tool failed: {0}")]
    Tool(#[from] ToolError),

    /// Gateway address never became available
    #[error("Cannot resolve gateway address: {0}")]
    AddressResolution(String),

    /// Gateway admin API unreachable or rejected a request
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Dependency loader failure
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BuildError {
    fn from(err: reqwest::Error) -> Self {
        BuildError::Gateway(err.to_string())
    }
}

impl BuildError {
    /// Process exit code to report for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Tool(tool) => tool.exit_code().unwrap_or(1),
            _ => 1,
        }
    }
}

/// A pipeline run aborted at `stage`
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: StageKind,
    #[source]
    pub source: BuildError,
}

impl PipelineError {
    pub fn new(stage: StageKind, source: BuildError) -> Self {
        Self { stage, source }
    }

    /// Exit code of the failing tool, or 1
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }
}

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_carries_tool_status() {
        let err = BuildError::Tool(ToolError::Failed {
            command: "docker push shop:1.0.0".to_string(),
            code: 7,
            stderr: String::new(),
        });
        assert_eq!(err.exit_code(), 7);

        let pipeline = PipelineError::new(StageKind::Image, err);
        assert_eq!(pipeline.exit_code(), 7);
        assert!(pipeline.to_string().starts_with("image stage failed"));
    }

    #[test]
    fn test_failed_tool_message_includes_stderr_tail() {
        let err = ToolError::Failed {
            command: "docker push shop:1.0.0".to_string(),
            code: 1,
            stderr: "line 1\nline 2\n\nline 3\nline 4\nline 5\ndenied: access forbidden\n"
                .to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`docker push shop:1.0.0` exited with status 1: \
             line 2\nline 3\nline 4\nline 5\ndenied: access forbidden"
        );

        let quiet = ToolError::Failed {
            command: "kubectl apply -f out".to_string(),
            code: 2,
            stderr: "  \n".to_string(),
        };
        assert_eq!(quiet.to_string(), "`kubectl apply -f out` exited with status 2");
    }

    #[test]
    fn test_non_tool_errors_exit_with_one() {
        assert_eq!(BuildError::Gateway("down".into()).exit_code(), 1);
        assert_eq!(
            BuildError::Tool(ToolError::Terminated {
                command: "kubectl".into()
            })
            .exit_code(),
            1
        );
    }
}
