//! Test doubles for the build pipeline

use crate::error::{Result, ToolError};
use crate::gateway::GatewayAdmin;
use crate::process::{Command, ToolOutput, ToolRunner};
use crate::progress::Progress;
use crate::subscriptions::SubscriptionSet;
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every command and answers from a script.
///
/// `conduit inject <file>` echoes the file back with [`Self::INJECTED_MARKER`]
/// prepended, unless a scripted response matches first.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Command>>,
    responses: Vec<(String, String)>,
    failures: Vec<(String, i32)>,
}

impl RecordingRunner {
    pub const INJECTED_MARKER: &'static str = "# injected\n";

    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `stdout`
    pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
        self.responses.push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Fail commands starting with `prefix` with exit `code`
    pub fn fail(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(&self, command: &Command) -> std::result::Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(command.clone());
        let line = command.to_string();

        if let Some((_, code)) = self.failures.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            return Err(ToolError::Failed {
                command: line,
                code: *code,
                stderr: "scripted failure".to_string(),
            });
        }

        let response = self
            .responses
            .iter()
            .find(|(p, _)| line.starts_with(p.as_str()));
        if let Some((_, stdout)) = response {
            return Ok(ToolOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            });
        }

        let is_inject = command.args.first().map(String::as_str) == Some("inject");
        if command.program == "conduit" && is_inject {
            let file = command.args.get(1).cloned().unwrap_or_default();
            let contents = std::fs::read_to_string(&file).unwrap_or_default();
            return Ok(ToolOutput {
                stdout: format!("{}{}", Self::INJECTED_MARKER, contents),
                stderr: String::new(),
            });
        }

        Ok(ToolOutput::default())
    }
}

/// Records every progress notification as `"<event> <label>"`
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Progress for RecordingProgress {
    fn stage_started(&self, label: &str) {
        self.push(format!("start {}", label));
    }

    fn stage_succeeded(&self, label: &str) {
        self.push(format!("done {}", label));
    }

    fn stage_failed(&self, label: &str, _reason: &str) {
        self.push(format!("fail {}", label));
    }

    fn finished(&self, message: &str) {
        self.push(format!("finish {}", message));
    }
}

/// Records every pushed subscription set
#[derive(Default)]
pub struct RecordingGateway {
    pushed: Mutex<Vec<(String, SubscriptionSet)>>,
}

impl RecordingGateway {
    pub fn pushed(&self) -> Vec<(String, SubscriptionSet)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayAdmin for RecordingGateway {
    async fn push(&self, address: &str, set: &SubscriptionSet) -> Result<()> {
        self.pushed
            .lock()
            .unwrap()
            .push((address.to_string(), set.clone()));
        Ok(())
    }
}
