//! Scripted runner for tests above the process layer

use super::CommandRunner;
use adbridge_shared::{BridgeError, Invocation, InvocationResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub enum Reply {
    Output(i32, &'static str),
    Timeout,
    SpawnFailure,
}

/// Replies keyed by `describe()` of the invocation; unknown commands
/// exit with code 1.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: HashMap<String, Reply>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn reply(mut self, command: &str, reply: Reply) -> Self {
        self.replies.insert(command.to_string(), reply);
        self
    }

    pub fn ok(self, command: &str, stdout: &'static str) -> Self {
        self.reply(command, Reply::Output(0, stdout))
    }

    pub fn called(&self, command: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == command)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<InvocationResult, BridgeError> {
        let command = invocation.describe();
        self.calls.lock().unwrap().push(command.clone());
        match self.replies.get(&command) {
            Some(Reply::Output(code, stdout)) => Ok(InvocationResult {
                exit_code: *code,
                stdout: stdout.to_string(),
                stderr: if *code == 0 { String::new() } else { "error".into() },
            }),
            Some(Reply::Timeout) => Err(BridgeError::Timeout {
                command,
                timeout: invocation.timeout,
            }),
            Some(Reply::SpawnFailure) => Err(BridgeError::ExecutionFailure {
                command,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            None => Ok(InvocationResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("unscripted: {command}"),
            }),
        }
    }
}
