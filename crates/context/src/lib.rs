//! Shared per-node context: broker client, database handle, blob-store
//! handle, and the subscribe-handler router that fans pub/sub
//! deliveries out to node-specific logic.

pub mod router;

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

use shunt_core::Config;
use shunt_fabric::client::{BrokerConfig, CallbackError, FabricClient, MqCallback, MqClient};
use shunt_fabric::msg::MsgProvider;
use shunt_fabric::FabricError;
use shunt_store::{DbClient, MsgUploader, StorageClient, StoreError};

pub use router::{HandlerError, SubscribeHandler, SubscribeRouter};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Fabric(#[from] FabricError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ConnectHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Owns a node's shared clients. Children are brought up in creation
/// order (database, blob store, broker) and torn down in reverse.
pub struct BaseContext {
    provider: MsgProvider,
    command_prefix: String,
    debug: bool,
    verbose: u8,
    broker_config: BrokerConfig,
    mq: Arc<MqClient>,
    db: Option<Arc<DbClient>>,
    storage: Option<Arc<StorageClient>>,
    uploader: Option<Arc<MsgUploader>>,
    router: SubscribeRouter,
    on_connect: StdMutex<Option<ConnectHook>>,
}

impl BaseContext {
    /// Connect every configured child client. Database and blob store
    /// are optional; the broker is required for dispatch.
    pub async fn connect(
        provider: MsgProvider,
        config: &Config,
        broker: &BrokerConfig,
    ) -> Result<Self, ContextError> {
        let db = if config.postgres.is_configured() {
            Some(Arc::new(DbClient::connect(&config.postgres).await?))
        } else {
            debug!("database not configured, audit persistence disabled");
            None
        };

        let storage = if config.storage.is_configured() {
            Some(Arc::new(StorageClient::connect(&config.storage)?))
        } else {
            debug!("blob store not configured, file persistence disabled");
            None
        };

        let uploader = match (&db, &storage) {
            (Some(db), Some(storage)) => {
                Some(Arc::new(MsgUploader::new(db.clone(), storage.clone())))
            }
            _ => None,
        };

        let mq = Arc::new(MqClient::connect(broker).await?);

        Ok(Self {
            provider,
            command_prefix: config.dispatch.command_prefix.clone(),
            debug: config.debug,
            verbose: config.verbose,
            broker_config: broker.clone(),
            mq,
            db,
            storage,
            uploader,
            router: SubscribeRouter::new(),
            on_connect: StdMutex::new(None),
        })
    }

    /// Register a subscription handler. Must happen before [`open`](Self::open)
    /// for the channel to be part of the subscribe set.
    pub fn add_subscribe_handler(
        &self,
        path: &str,
        handler: SubscribeHandler,
    ) -> Result<(), ContextError> {
        self.router.insert(path, handler)?;
        Ok(())
    }

    /// Hook invoked once the broker connection is healthy (used by node
    /// runtimes to publish membership traffic).
    pub fn set_on_connect(&self, hook: ConnectHook) {
        *self.on_connect.lock().expect("hook lock poisoned") = Some(hook);
    }

    /// Start the broker subscriber over every registered channel.
    pub async fn open(self: &Arc<Self>) -> Result<(), ContextError> {
        let channels = self.router.channels();
        let callback: Arc<dyn MqCallback> = Arc::clone(self) as Arc<dyn MqCallback>;
        self.mq.open(&channels, callback).await?;
        info!(provider = %self.provider, "context opened");
        Ok(())
    }

    /// Tear down in reverse creation order.
    pub async fn close(&self) -> Result<(), ContextError> {
        self.mq.close().await?;
        if let Some(db) = &self.db {
            db.close().await;
        }
        info!(provider = %self.provider, "context closed");
        Ok(())
    }

    pub fn provider(&self) -> MsgProvider {
        self.provider
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn broker_config(&self) -> &BrokerConfig {
        &self.broker_config
    }

    pub fn fabric(&self) -> Arc<dyn FabricClient> {
        self.mq.clone() as Arc<dyn FabricClient>
    }

    pub fn db(&self) -> Option<Arc<DbClient>> {
        self.db.clone()
    }

    pub fn storage(&self) -> Option<Arc<StorageClient>> {
        self.storage.clone()
    }

    pub fn uploader(&self) -> Option<Arc<MsgUploader>> {
        self.uploader.clone()
    }
}

#[async_trait]
impl MqCallback for BaseContext {
    async fn on_connect(&self) -> Result<(), CallbackError> {
        info!(provider = %self.provider, "broker connection established");
        let hook = self
            .on_connect
            .lock()
            .expect("hook lock poisoned")
            .clone();
        if let Some(hook) = hook {
            hook().await?;
        }
        Ok(())
    }

    async fn on_subscribe(&self, channel: Vec<u8>, data: Vec<u8>) -> Result<(), CallbackError> {
        self.router.dispatch(&channel, data).await
    }

    async fn on_closing(&self) {
        warn!(provider = %self.provider, "broker subscriber is closing");
    }
}
