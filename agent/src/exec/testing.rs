//! Scripted command runner for tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::exec::command::{CommandOutput, CommandRunner, CommandSpec};

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Records every command and answers from a closure
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Handler,
}

impl ScriptedRunner {
    pub(crate) fn new(handler: impl Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Every command exits zero with empty output
    pub(crate) fn succeeding() -> Self {
        Self::new(|_| CommandOutput::ok(""))
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::line).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok((self.handler)(spec))
    }
}
