//! Self-test module exercising typed parameter binding.

use std::sync::Arc;

use async_trait::async_trait;

use shunt_fabric::msg::{CmdDesc, MsgRequest, MsgResponse};

use crate::command::{param, CommandSet};
use crate::error::HookError;
use crate::module::{ModuleContext, WorkerModule};
use crate::params::Arg;

pub struct TesterWorker {
    commands: CommandSet,
    context: Option<Arc<ModuleContext>>,
}

impl TesterWorker {
    pub fn new() -> Self {
        let mut commands = CommandSet::new();
        commands
            .register_fn(
                "cmd",
                "Concatenate the typed parameters",
                vec![
                    param("p1").doc("meta1").default(1i64),
                    param("p2").doc("meta2").default("2"),
                ],
                |Arg(p1): Arg<i64>, Arg(p2): Arg<String>| async move { format!("{p1}-{p2}") },
            )
            .expect("tester command registration is static");
        Self {
            commands,
            context: None,
        }
    }
}

impl Default for TesterWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerModule for TesterWorker {
    fn name(&self) -> &str {
        "tester"
    }

    fn version(&self) -> &str {
        shunt_core::version()
    }

    fn doc(&self) -> &str {
        "Test worker"
    }

    fn cmds(&self) -> Vec<CmdDesc> {
        self.commands.descs()
    }

    async fn open(&mut self, context: Arc<ModuleContext>) -> Result<(), HookError> {
        self.context = Some(context);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), HookError> {
        self.context = None;
        Ok(())
    }

    async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, HookError> {
        let prefix = self
            .context
            .as_ref()
            .map(|ctx| ctx.command_prefix.clone())
            .unwrap_or_else(|| "/".to_string());
        Ok(self.commands.run_with_prefix(request, &prefix).await?)
    }
}

#[cfg(test)]
mod tests {
    use shunt_fabric::msg::MsgProvider;

    use super::*;

    #[tokio::test]
    async fn cmd_binds_both_parameters() {
        let worker = TesterWorker::new();
        let request = MsgRequest::new(MsgProvider::Tester, "/cmd,p1=7,p2=seven");
        let response = worker.run(&request).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("7-seven"));
    }

    #[tokio::test]
    async fn cmd_defaults_apply() {
        let worker = TesterWorker::new();
        let request = MsgRequest::new(MsgProvider::Tester, "/cmd");
        let response = worker.run(&request).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("1-2"));
    }
}
