//! Worker module for OpenAI-compatible chat completion APIs.
//!
//! `init` parses the trailing module options (`-- --openai-api-key ...`)
//! with env fallbacks, `open` builds the HTTP client, and the `gpt`
//! command forwards the body as a chat prompt.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tracing::debug;

use shunt_fabric::msg::{CmdDesc, MsgRequest, MsgResponse};

use crate::command::{param, CommandSet};
use crate::error::{CommandError, HookError};
use crate::module::{ModuleContext, WorkerModule};
use crate::params::{Arg, Body};

const DEFAULT_MODEL: &str = "gpt-4o";

/// Module options, supplied after `--` on the worker command line.
#[derive(Debug, Parser)]
#[command(name = "gpt", about = "Worker module for OpenAI-compatible chat APIs", no_binary_name = true)]
struct GptOptions {
    /// API key for the chat completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "OPENAI_TIMEOUT", default_value_t = 120.0)]
    openai_timeout: f64,

    /// Base URL of the API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    openai_base_url: String,
}

struct GptClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GptClient {
    async fn complete(&self, model: &str, n: i64, prompt: &str) -> Result<String, CommandError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "n": n.max(1),
            "messages": [{"role": "user", "content": prompt}],
        });

        debug!(model = %model, n, "chat completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| CommandError::msg(format!("chat API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommandError::msg(format!(
                "chat API error {status}: {body}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CommandError::msg(format!("chat API response unreadable: {e}")))?;

        let choices = payload["choices"]
            .as_array()
            .ok_or_else(|| CommandError::msg("chat API response has no choices"))?;

        let mut contents = Vec::with_capacity(choices.len());
        for choice in choices {
            if let Some(content) = choice["message"]["content"].as_str() {
                contents.push(content.to_string());
            }
        }
        if contents.is_empty() {
            return Err(CommandError::msg("chat API returned no content"));
        }
        Ok(contents.join("\n\n"))
    }
}

pub struct GptWorker {
    commands: CommandSet,
    options: Option<GptOptions>,
    client: Arc<StdMutex<Option<Arc<GptClient>>>>,
}

impl GptWorker {
    pub fn new() -> Self {
        let client: Arc<StdMutex<Option<Arc<GptClient>>>> = Arc::new(StdMutex::new(None));

        let mut commands = CommandSet::new();
        let handler_client = client.clone();
        commands
            .register_fn(
                "gpt",
                "Talk to an OpenAI-compatible chatbot",
                vec![
                    param("n").doc("Number of chat completions").default(1i64),
                    param("model").doc("Chat model name").default(DEFAULT_MODEL),
                ],
                move |Arg(n): Arg<i64>, Arg(model): Arg<String>, Body(prompt): Body| {
                    let client = handler_client.clone();
                    async move {
                        let client = client
                            .lock()
                            .expect("client slot poisoned")
                            .clone()
                            .ok_or_else(|| CommandError::msg("gpt module is not open"))?;
                        client.complete(&model, n, &prompt).await
                    }
                },
            )
            .expect("gpt registration is static");

        Self {
            commands,
            options: None,
            client,
        }
    }
}

impl Default for GptWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerModule for GptWorker {
    fn name(&self) -> &str {
        "gpt"
    }

    fn version(&self) -> &str {
        shunt_core::version()
    }

    fn doc(&self) -> &str {
        "Worker module for OpenAI-compatible chat APIs"
    }

    fn cmds(&self) -> Vec<CmdDesc> {
        self.commands.descs()
    }

    fn init(&mut self, opts: &[String]) -> Result<(), HookError> {
        let options = GptOptions::try_parse_from(opts)?;
        debug!(timeout = options.openai_timeout, base_url = %options.openai_base_url, "gpt options parsed");
        self.options = Some(options);
        Ok(())
    }

    async fn open(&mut self, _context: Arc<ModuleContext>) -> Result<(), HookError> {
        let options = self.options.as_ref().ok_or("gpt module was never initialized")?;
        let api_key = options
            .openai_api_key
            .clone()
            .ok_or("an API key is required (--openai-api-key or OPENAI_API_KEY)")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(options.openai_timeout.max(0.0)))
            .build()?;

        *self.client.lock().expect("client slot poisoned") = Some(Arc::new(GptClient {
            http,
            api_key,
            base_url: options.openai_base_url.trim_end_matches('/').to_string(),
        }));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), HookError> {
        *self.client.lock().expect("client slot poisoned") = None;
        Ok(())
    }

    async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, HookError> {
        Ok(self.commands.run(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_parses_module_options() {
        let mut worker = GptWorker::new();
        worker
            .init(&[
                "--openai-api-key".to_string(),
                "sk-test".to_string(),
                "--openai-timeout".to_string(),
                "30".to_string(),
            ])
            .unwrap();
        let options = worker.options.as_ref().unwrap();
        assert_eq!(options.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(options.openai_timeout, 30.0);
    }

    #[test]
    fn init_rejects_unknown_options() {
        let mut worker = GptWorker::new();
        assert!(worker.init(&["--bogus".to_string()]).is_err());
    }

    #[tokio::test]
    async fn run_before_open_reports_a_command_error() {
        let worker = GptWorker::new();
        let request = shunt_fabric::msg::MsgRequest::new(
            shunt_fabric::msg::MsgProvider::Tester,
            "/gpt hello",
        );
        let response = worker.run(&request).await.unwrap();
        assert!(response.has_error());
    }

    #[test]
    fn descriptor_lists_the_gpt_command() {
        let worker = GptWorker::new();
        let cmds = worker.cmds();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].key, "gpt");
        assert_eq!(cmds[0].params.len(), 2);
    }
}
