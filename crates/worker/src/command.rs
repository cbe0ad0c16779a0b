//! Command registration and the call-time binding plan.
//!
//! At registration the handler's parameter slots (in source order) are
//! zipped with the declared [`ParamSpec`]s: configurable slots consume
//! specs, runtime slots don't. The resulting plan is applied on every
//! call — no signature inspection happens in the hot path.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tracing::warn;

use shunt_fabric::msg::{CmdDesc, MsgCmd, MsgRequest, MsgResponse, ParamDesc, ParamValue};

use crate::error::{CommandError, RegistrationError};
use crate::params::CommandParam;
use crate::reply::{IntoReply, Reply};

/// Declared metadata for one configurable parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub key: String,
    pub doc: String,
    pub default: ParamValue,
}

/// Start a [`ParamSpec`] builder: `param("n").doc("...").default(1)`.
pub fn param(key: impl Into<String>) -> ParamSpec {
    ParamSpec {
        key: key.into(),
        doc: String::new(),
        default: ParamValue::Null,
    }
}

impl ParamSpec {
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn default(mut self, default: impl Into<ParamValue>) -> Self {
        self.default = default.into();
        self
    }
}

/// One slot of a handler signature.
pub struct SlotKind {
    pub configurable: bool,
    pub matches_default: fn(&ParamValue) -> bool,
}

pub type BoxedHandler = Arc<
    dyn Fn(
            MsgRequest,
            MsgCmd,
            Arc<[Option<ParamDesc>]>,
        ) -> BoxFuture<'static, Result<Reply, CommandError>>
        + Send
        + Sync,
>;

/// Implemented for async functions whose arguments are [`CommandParam`]s.
pub trait Handler<T>: Clone + Send + Sync + Sized + 'static {
    fn slots() -> Vec<SlotKind>;
    fn into_boxed(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler<()> for F
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + 'static,
{
    fn slots() -> Vec<SlotKind> {
        Vec::new()
    }

    fn into_boxed(self) -> BoxedHandler {
        Arc::new(move |_request, _cmd, _plan| {
            let handler = self.clone();
            Box::pin(async move { handler().await.into_reply() })
        })
    }
}

macro_rules! impl_handler {
    ($($ty:ident),+) => {
        impl<F, Fut, R, $($ty,)+> Handler<($($ty,)+)> for F
        where
            F: Fn($($ty),+) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoReply + 'static,
            $($ty: CommandParam + 'static,)+
        {
            fn slots() -> Vec<SlotKind> {
                vec![$(SlotKind {
                    configurable: <$ty as CommandParam>::configurable(),
                    matches_default: <$ty as CommandParam>::matches_default,
                }),+]
            }

            fn into_boxed(self) -> BoxedHandler {
                Arc::new(move |request, cmd, plan| {
                    let handler = self.clone();
                    Box::pin(async move {
                        let mut slot = 0usize;
                        $(
                            #[allow(non_snake_case)]
                            let $ty = <$ty as CommandParam>::bind(
                                &request,
                                &cmd,
                                plan[slot].as_ref(),
                            )
                            .map_err(CommandError::from)?;
                            slot += 1;
                        )+
                        let _ = slot;
                        handler($($ty),+).await.into_reply()
                    })
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// A registered command with its binding plan.
pub struct WorkerCommand {
    key: String,
    doc: String,
    params: Vec<ParamDesc>,
    plan: Arc<[Option<ParamDesc>]>,
    handler: BoxedHandler,
}

impl WorkerCommand {
    pub fn new<H, T>(
        key: impl Into<String>,
        doc: impl Into<String>,
        specs: Vec<ParamSpec>,
        handler: H,
    ) -> Result<Self, RegistrationError>
    where
        H: Handler<T>,
    {
        let key = key.into();
        if key.is_empty() {
            return Err(RegistrationError::EmptyKey);
        }

        let slots = H::slots();
        let mut spec_iter = specs.into_iter();
        let mut plan = Vec::with_capacity(slots.len());
        let mut params = Vec::new();

        for (index, slot) in slots.iter().enumerate() {
            if slot.configurable {
                let spec = spec_iter
                    .next()
                    .ok_or(RegistrationError::MissingSpec { index })?;
                if !(slot.matches_default)(&spec.default) {
                    return Err(RegistrationError::DefaultMismatch { key: spec.key });
                }
                let desc = ParamDesc::new(spec.key, spec.doc, spec.default);
                params.push(desc.clone());
                plan.push(Some(desc));
            } else {
                plan.push(None);
            }
        }

        let leftover = spec_iter.count();
        if leftover > 0 {
            return Err(RegistrationError::UnusedSpecs { count: leftover });
        }

        Ok(Self {
            key,
            doc: doc.into(),
            params,
            plan: plan.into(),
            handler: handler.into_boxed(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// The configurable parameter descriptors, in source order.
    pub fn params(&self) -> &[ParamDesc] {
        &self.params
    }

    pub fn as_desc(&self) -> CmdDesc {
        CmdDesc {
            key: self.key.clone(),
            doc: self.doc.clone(),
            params: self.params.clone(),
        }
    }

    /// Bind and invoke the handler. Always yields a response carrying
    /// the request uuid — handler failures become its error string.
    pub async fn call(&self, request: &MsgRequest, cmd: &MsgCmd) -> MsgResponse {
        match (self.handler)(request.clone(), cmd.clone(), self.plan.clone()).await {
            Ok(reply) => {
                let mut response = MsgResponse::empty(&request.msg_uuid);
                response.content = reply.content;
                response.files = reply.files;
                response
            }
            Err(e) => {
                warn!(msg_uuid = %request.msg_uuid, command = %self.key, error = %e, "command failed");
                MsgResponse::error(&request.msg_uuid, e.to_string())
            }
        }
    }
}

/// A worker's command table with the default dispatch behaviour.
#[derive(Default)]
pub struct CommandSet {
    commands: IndexMap<String, WorkerCommand>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: WorkerCommand) {
        self.commands.insert(command.key.clone(), command);
    }

    /// Register an async function under `key` with its declared specs.
    pub fn register_fn<H, T>(
        &mut self,
        key: impl Into<String>,
        doc: impl Into<String>,
        specs: Vec<ParamSpec>,
        handler: H,
    ) -> Result<(), RegistrationError>
    where
        H: Handler<T>,
    {
        self.register(WorkerCommand::new(key, doc, specs, handler)?);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&WorkerCommand> {
        self.commands.get(key)
    }

    pub fn descs(&self) -> Vec<CmdDesc> {
        self.commands.values().map(WorkerCommand::as_desc).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Parse, look up, and dispatch. Non-commands and unknown keys are
    /// errors for the caller to classify.
    pub async fn run(&self, request: &MsgRequest) -> Result<MsgResponse, CommandError> {
        self.run_with_prefix(request, shunt_fabric::msg::cmd::COMMAND_PREFIX)
            .await
    }

    pub async fn run_with_prefix(
        &self,
        request: &MsgRequest,
        prefix: &str,
    ) -> Result<MsgResponse, CommandError> {
        let cmd = request
            .parse_command_with(prefix)
            .ok_or_else(|| CommandError::NotACommand(request.content.clone()))?;
        let command = self
            .get(&cmd.command)
            .ok_or_else(|| CommandError::UnknownCommand(cmd.command.clone()))?;
        Ok(command.call(request, &cmd).await)
    }
}
