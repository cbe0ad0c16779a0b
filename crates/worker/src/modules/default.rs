//! The default worker: echo plus a placeholder chat command.

use std::sync::Arc;

use async_trait::async_trait;

use shunt_fabric::msg::{CmdDesc, MsgRequest, MsgResponse};

use crate::command::{param, CommandSet};
use crate::error::HookError;
use crate::module::{ModuleContext, WorkerModule};
use crate::params::{Arg, Body};

pub struct DefaultWorker {
    commands: CommandSet,
    context: Option<Arc<ModuleContext>>,
}

impl DefaultWorker {
    pub fn new() -> Self {
        let mut commands = CommandSet::new();
        commands
            .register_fn("echo", "Echo the body back", vec![], |Body(body): Body| {
                async move { body }
            })
            .expect("echo registration is static");
        commands
            .register_fn(
                "chat",
                "Talk to the chatbot",
                vec![
                    param("n").doc("Number of chat completions").default(1i64),
                    param("model").doc("Chat model name").default("gpt-4o"),
                ],
                |Arg(n): Arg<i64>, Arg(model): Arg<String>| async move { format!("{model}-{n}") },
            )
            .expect("chat registration is static");
        Self {
            commands,
            context: None,
        }
    }
}

impl Default for DefaultWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerModule for DefaultWorker {
    fn name(&self) -> &str {
        "default"
    }

    fn version(&self) -> &str {
        shunt_core::version()
    }

    fn doc(&self) -> &str {
        "Default shunt worker"
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
    async fn echo_returns_the_body() {
        let worker = DefaultWorker::new();
        let request = MsgRequest::new(MsgProvider::Tester, "/echo hello world");
        let response = worker.run(&request).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("hello world"));
        assert_eq!(response.msg_uuid, request.msg_uuid);
    }

    #[tokio::test]
    async fn chat_reports_model_and_count() {
        let worker = DefaultWorker::new();
        let request = MsgRequest::new(MsgProvider::Tester, "/chat,model=gpt-4o,n=2 hi");
        let response = worker.run(&request).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("gpt-4o-2"));
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let worker = DefaultWorker::new();
        let request = MsgRequest::new(MsgProvider::Tester, "/nope");
        assert!(worker.run(&request).await.is_err());
    }

    #[test]
    fn descriptor_lists_both_commands() {
        let worker = DefaultWorker::new();
        let cmds = worker.cmds();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].key, "echo");
        assert_eq!(cmds[1].key, "chat");
        assert_eq!(cmds[1].params.len(), 2);
    }
}
