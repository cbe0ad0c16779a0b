//! The worker module interface and its lifecycle host.
//!
//! A module exposes metadata plus four hooks: synchronous `init` with
//! trailing free-form options, async `open`/`close`, and `run`. The
//! [`ModuleHost`] enforces the `Uninit → Initialized → Open → Closed`
//! state machine and wraps every hook failure with the module and hook
//! names so the cause stays attached.

use std::sync::Arc;

use async_trait::async_trait;

use shunt_context::BaseContext;
use shunt_fabric::client::FabricClient;
use shunt_fabric::msg::{CmdDesc, MsgProvider, MsgRequest, MsgResponse, MsgWorker};
use shunt_fabric::paths::make_request_path;
use shunt_store::MsgUploader;

use crate::error::{HookError, WorkerError};

/// What a module sees of its hosting node.
#[derive(Clone)]
pub struct ModuleContext {
    pub provider: MsgProvider,
    pub command_prefix: String,
    pub debug: bool,
    pub verbose: u8,
    pub fabric: Arc<dyn FabricClient>,
    pub uploader: Option<Arc<MsgUploader>>,
}

impl ModuleContext {
    pub fn from_base(context: &BaseContext) -> Self {
        Self {
            provider: context.provider(),
            command_prefix: context.command_prefix().to_string(),
            debug: context.debug(),
            verbose: context.verbose(),
            fabric: context.fabric(),
            uploader: context.uploader(),
        }
    }
}

/// A pluggable command implementation hosted by a worker node.
#[async_trait]
pub trait WorkerModule: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn doc(&self) -> &str;

    /// Request queue key; by convention derived from the name.
    fn path(&self) -> String {
        make_request_path(self.name())
    }

    fn cmds(&self) -> Vec<CmdDesc>;

    /// Synchronous setup with trailing free-form options.
    fn init(&mut self, opts: &[String]) -> Result<(), HookError> {
        tracing::debug!(module = %self.name(), ?opts, "initialize worker module");
        Ok(())
    }

    async fn open(&mut self, context: Arc<ModuleContext>) -> Result<(), HookError>;

    async fn close(&mut self) -> Result<(), HookError>;

    async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, HookError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Uninit,
    Initialized,
    Open,
    Closed,
}

impl ModuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninit => "uninit",
            Self::Initialized => "initialized",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Drives a module through its lifecycle.
pub struct ModuleHost {
    module: Box<dyn WorkerModule>,
    state: ModuleState,
}

impl ModuleHost {
    pub fn new(module: Box<dyn WorkerModule>) -> Self {
        Self {
            module,
            state: ModuleState::Uninit,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Build the immutable descriptor published on the register channel.
    pub fn descriptor(&self) -> MsgWorker {
        MsgWorker {
            name: self.module.name().to_string(),
            version: self.module.version().to_string(),
            doc: self.module.doc().to_string(),
            path: self.module.path(),
            cmds: self.module.cmds(),
        }
    }

    fn state_error(&self, hook: &'static str, expected: &'static str) -> WorkerError {
        WorkerError::State {
            module: self.module.name().to_string(),
            hook,
            expected,
            actual: self.state.as_str(),
        }
    }

    fn hook_error(&self, hook: &'static str, source: HookError) -> WorkerError {
        WorkerError::Hook {
            module: self.module.name().to_string(),
            hook,
            source,
        }
    }

    pub fn init(&mut self, opts: &[String]) -> Result<(), WorkerError> {
        if self.state != ModuleState::Uninit {
            return Err(self.state_error("init", "uninit"));
        }
        self.module
            .init(opts)
            .map_err(|e| self.hook_error("init", e))?;
        self.state = ModuleState::Initialized;
        Ok(())
    }

    /// Exactly once before any `run`; a second open is an error.
    pub async fn open(&mut self, context: Arc<ModuleContext>) -> Result<(), WorkerError> {
        if self.state != ModuleState::Initialized {
            return Err(self.state_error("open", "initialized"));
        }
        self.module
            .open(context)
            .await
            .map_err(|e| self.hook_error("open", e))?;
        self.state = ModuleState::Open;
        Ok(())
    }

    pub async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, WorkerError> {
        if self.state != ModuleState::Open {
            return Err(self.state_error("run", "open"));
        }
        self.module
            .run(request)
            .await
            .map_err(|e| self.hook_error("run", e))
    }

    /// Legal from `Open` (transitions regardless of the hook outcome)
    /// and idempotent once `Closed`; anything earlier is an error.
    pub async fn close(&mut self) -> Result<(), WorkerError> {
        match self.state {
            ModuleState::Open => {
                let result = self.module.close().await;
                self.state = ModuleState::Closed;
                result.map_err(|e| self.hook_error("close", e))
            }
            ModuleState::Closed => Ok(()),
            ModuleState::Uninit | ModuleState::Initialized => {
                Err(self.state_error("close", "open"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyModule {
        fail_run: bool,
    }

    #[async_trait]
    impl WorkerModule for FlakyModule {
        fn name(&self) -> &str {
            "flaky"
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn doc(&self) -> &str {
            "Test module"
        }

        fn cmds(&self) -> Vec<CmdDesc> {
            vec![CmdDesc::new("x", "do X")]
        }

        async fn open(&mut self, _context: Arc<ModuleContext>) -> Result<(), HookError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), HookError> {
            Ok(())
        }

        async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, HookError> {
            if self.fail_run {
                return Err("synthetic failure".into());
            }
            Ok(MsgResponse::new(&request.msg_uuid, "ok"))
        }
    }

    fn host(fail_run: bool) -> ModuleHost {
        ModuleHost::new(Box::new(FlakyModule { fail_run }))
    }

    fn test_context() -> Arc<ModuleContext> {
        Arc::new(ModuleContext {
            provider: MsgProvider::Tester,
            command_prefix: "/".into(),
            debug: false,
            verbose: 0,
            fabric: Arc::new(NullFabric),
            uploader: None,
        })
    }

    #[test]
    fn descriptor_reflects_module_metadata() {
        let host = host(false);
        let descriptor = host.descriptor();
        assert_eq!(descriptor.name, "flaky");
        assert_eq!(descriptor.path, "/osom/api/request/flaky");
        assert_eq!(descriptor.cmds.len(), 1);
    }

    #[tokio::test]
    async fn run_before_open_is_a_state_error() {
        let host = host(false);
        let request = MsgRequest::new(MsgProvider::Tester, "/x");
        let result = host.run(&request).await;
        assert!(matches!(result, Err(WorkerError::State { hook: "run", .. })));
    }

    #[tokio::test]
    async fn close_before_open_is_a_state_error() {
        let mut host = host(false);
        host.init(&[]).unwrap();
        let result = host.close().await;
        assert!(matches!(
            result,
            Err(WorkerError::State { hook: "close", .. })
        ));
    }

    #[test]
    fn double_init_is_a_state_error() {
        let mut host = host(false);
        host.init(&[]).unwrap();
        let result = host.init(&[]);
        assert!(matches!(
            result,
            Err(WorkerError::State { hook: "init", .. })
        ));
    }

    #[tokio::test]
    async fn run_errors_are_wrapped_with_module_and_hook() {
        let mut host = host(true);
        host.init(&[]).unwrap();
        host.open(test_context()).await.unwrap();

        let request = MsgRequest::new(MsgProvider::Tester, "/x");
        let error = host.run(&request).await.unwrap_err();
        let message = error.to_string();
        assert!(message.contains("flaky"));
        assert!(message.contains("run"));
    }

    #[tokio::test]
    async fn double_open_is_a_state_error() {
        let mut host = host(false);
        host.init(&[]).unwrap();
        host.open(test_context()).await.unwrap();
        let result = host.open(test_context()).await;
        assert!(matches!(
            result,
            Err(WorkerError::State { hook: "open", .. })
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_once_closed() {
        let mut host = host(false);
        host.init(&[]).unwrap();
        host.open(test_context()).await.unwrap();
        host.close().await.unwrap();
        host.close().await.unwrap();
        assert_eq!(host.state(), ModuleState::Closed);
    }

    /// Fabric stub for lifecycle tests: every operation is a no-op.
    struct NullFabric;

    #[async_trait]
    impl FabricClient for NullFabric {
        async fn publish(&self, _key: &str, _data: &[u8]) -> Result<(), shunt_fabric::FabricError> {
            Ok(())
        }

        async fn lpush_bytes(
            &self,
            _key: &str,
            _data: &[u8],
            _expire: Option<u64>,
        ) -> Result<(), shunt_fabric::FabricError> {
            Ok(())
        }

        async fn brpop_bytes(
            &self,
            _key: &str,
            _timeout: u64,
        ) -> Result<Option<(Vec<u8>, Vec<u8>)>, shunt_fabric::FabricError> {
            Ok(None)
        }

        async fn ping(&self, _timeout: Option<std::time::Duration>) -> bool {
            true
        }

        async fn exists(&self, _key: &str) -> Result<bool, shunt_fabric::FabricError> {
            Ok(false)
        }

        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, shunt_fabric::FabricError> {
            Ok(None)
        }

        async fn set_bytes(&self, _key: &str, _value: &[u8]) -> Result<(), shunt_fabric::FabricError> {
            Ok(())
        }
    }
}
