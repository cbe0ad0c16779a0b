//! Broker client: pub/sub subscription lifecycle plus the queue data
//! plane (publish, pipelined push-with-expiry, blocking pop).
//!
//! One multiplexed connection serves ordinary commands and a second one
//! is reserved for blocking pops, so a long BRPOP never stalls the
//! command pipeline. The pub/sub connection lives inside the subscriber
//! task spawned by [`MqClient::open`].

use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shunt_core::config::{env_f64, env_opt, env_or};

use crate::error::FabricError;
use crate::paths::{decode_path, encode_path, BROADCAST_PATH};

/// TLS peer-verification mode for `rediss://` URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslCertReqs {
    #[default]
    None,
    Optional,
    Required,
}

impl FromStr for SslCertReqs {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            other => Err(FabricError::Transport(format!(
                "unknown ssl_cert_reqs mode: {other}"
            ))),
        }
    }
}

/// Broker connection options, loaded from `SHUNT_REDIS_*`.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker endpoint. When absent the node cannot dispatch.
    pub url: Option<String>,
    pub connection_timeout: f64,
    pub subscribe_timeout: f64,
    /// Worker pop wait in seconds; 0 blocks indefinitely.
    pub blocking_timeout: f64,
    pub close_timeout: f64,
    pub expire_short: f64,
    pub expire_medium: f64,
    pub expire_long: f64,
    pub ssl_cert_reqs: SslCertReqs,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            connection_timeout: 8.0,
            subscribe_timeout: 8.0,
            blocking_timeout: 0.0,
            close_timeout: 4.0,
            expire_short: 4.0,
            expire_medium: 8.0,
            expire_long: 12.0,
            ssl_cert_reqs: SslCertReqs::None,
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env_opt("SHUNT_REDIS_URL"),
            connection_timeout: env_f64(
                "SHUNT_REDIS_CONNECTION_TIMEOUT",
                defaults.connection_timeout,
            ),
            subscribe_timeout: env_f64("SHUNT_REDIS_SUBSCRIBE_TIMEOUT", defaults.subscribe_timeout),
            blocking_timeout: env_f64("SHUNT_REDIS_BLOCKING_TIMEOUT", defaults.blocking_timeout),
            close_timeout: env_f64("SHUNT_REDIS_CLOSE_TIMEOUT", defaults.close_timeout),
            expire_short: env_f64("SHUNT_REDIS_EXPIRE_SHORT", defaults.expire_short),
            expire_medium: env_f64("SHUNT_REDIS_EXPIRE_MEDIUM", defaults.expire_medium),
            expire_long: env_f64("SHUNT_REDIS_EXPIRE_LONG", defaults.expire_long),
            ssl_cert_reqs: env_or("SHUNT_REDIS_SSL_CERT_REQS", "none")
                .parse()
                .unwrap_or_default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Effective connection URL with the TLS verification mode applied.
    ///
    /// `none` maps to the insecure `rediss://` variant; plain `redis://`
    /// URLs are untouched.
    pub fn effective_url(&self) -> Result<String, FabricError> {
        let url = self.url.as_deref().ok_or(FabricError::NotConfigured)?;
        if url.starts_with("rediss://")
            && self.ssl_cert_reqs == SslCertReqs::None
            && !url.ends_with("#insecure")
        {
            Ok(format!("{url}#insecure"))
        } else {
            Ok(url.to_string())
        }
    }
}

/// Callbacks driven by the subscriber task.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait MqCallback: Send + Sync {
    /// Invoked once after the health probe succeeds, before subscribing.
    async fn on_connect(&self) -> Result<(), CallbackError>;

    /// Invoked for every delivery on a subscribed channel. Errors are
    /// logged by the client; the loop keeps running.
    async fn on_subscribe(&self, channel: Vec<u8>, data: Vec<u8>) -> Result<(), CallbackError>;

    /// Invoked on the subscriber task's exit path, before unsubscribing.
    async fn on_closing(&self);
}

/// Queue/pub-sub data plane, kept as a trait so node runtimes can be
/// driven against an in-memory fabric in tests.
#[async_trait]
pub trait FabricClient: Send + Sync {
    async fn publish(&self, key: &str, data: &[u8]) -> Result<(), FabricError>;

    /// Left-push onto a FIFO queue. With `expire`, the push and the
    /// expiry are applied as one atomic pipeline.
    async fn lpush_bytes(
        &self,
        key: &str,
        data: &[u8],
        expire: Option<u64>,
    ) -> Result<(), FabricError>;

    /// Blocking right-pop. `timeout` is whole seconds, 0 blocks
    /// indefinitely. Returns `None` on timeout — never an error.
    async fn brpop_bytes(
        &self,
        key: &str,
        timeout: u64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, FabricError>;

    async fn ping(&self, timeout: Option<Duration>) -> bool;

    async fn exists(&self, key: &str) -> Result<bool, FabricError>;
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, FabricError>;
    async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<(), FabricError>;

    async fn get_str(&self, key: &str) -> Result<Option<String>, FabricError> {
        match self.get_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| FabricError::Transport(format!("value at {key:?} is not UTF-8: {e}"))),
            None => Ok(None),
        }
    }

    async fn set_str(&self, key: &str, value: &str) -> Result<(), FabricError> {
        self.set_bytes(key, value.as_bytes()).await
    }
}

/// Redis-backed broker client.
pub struct MqClient {
    client: redis::Client,
    conn: Mutex<MultiplexedConnection>,
    blocking: Mutex<MultiplexedConnection>,
    subscribe_timeout: Duration,
    close_timeout: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    done: watch::Sender<bool>,
    subscribe_begin: Arc<StdMutex<Option<Instant>>>,
}

impl MqClient {
    /// Establish the command connections. The subscriber starts in
    /// [`open`](Self::open).
    pub async fn connect(config: &BrokerConfig) -> Result<Self, FabricError> {
        let url = config.effective_url()?;
        let client = redis::Client::open(url.as_str())?;
        let connect_timeout = Duration::from_secs_f64(config.connection_timeout.max(0.0));

        let conn = tokio::time::timeout(connect_timeout, client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| FabricError::Timeout(connect_timeout))??;
        let blocking =
            tokio::time::timeout(connect_timeout, client.get_multiplexed_tokio_connection())
                .await
                .map_err(|_| FabricError::Timeout(connect_timeout))??;

        let (done, _) = watch::channel(false);

        Ok(Self {
            client,
            conn: Mutex::new(conn),
            blocking: Mutex::new(blocking),
            subscribe_timeout: Duration::from_secs_f64(config.subscribe_timeout.max(0.0)),
            close_timeout: Duration::from_secs_f64(config.close_timeout.max(0.0)),
            task: Mutex::new(None),
            done,
            subscribe_begin: Arc::new(StdMutex::new(None)),
        })
    }

    /// Start the background subscriber.
    ///
    /// Probes the broker first — a failed PING is surfaced here and the
    /// loop never starts. `channels` defaults to the broadcast channel
    /// when empty.
    pub async fn open(
        &self,
        channels: &[String],
        callback: Arc<dyn MqCallback>,
    ) -> Result<(), FabricError> {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return Err(FabricError::Transport("subscriber already open".into()));
        }

        debug!("Broker PING ...");
        {
            let mut conn = self.conn.lock().await;
            let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        }
        info!("Broker PING->PONG!");

        callback
            .on_connect()
            .await
            .map_err(|e| FabricError::Transport(format!("on_connect callback failed: {e}")))?;

        let subscribe_paths = if channels.is_empty() {
            vec![encode_path(BROADCAST_PATH)?]
        } else {
            channels
                .iter()
                .map(|c| encode_path(c))
                .collect::<Result<Vec<_>, _>>()?
        };

        self.done.send_replace(false);
        let task = tokio::spawn(Self::subscribe_main(
            self.client.clone(),
            subscribe_paths,
            callback,
            self.subscribe_timeout,
            self.done.subscribe(),
            Arc::clone(&self.subscribe_begin),
        ));
        *guard = Some(task);
        Ok(())
    }

    async fn subscribe_main(
        client: redis::Client,
        channels: Vec<Vec<u8>>,
        callback: Arc<dyn MqCallback>,
        subscribe_timeout: Duration,
        done: watch::Receiver<bool>,
        subscribe_begin: Arc<StdMutex<Option<Instant>>>,
    ) {
        let mut pubsub = match client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                error!(error = %e, "pub/sub connection failed");
                callback.on_closing().await;
                return;
            }
        };

        debug!("Requesting a subscription ...");
        for channel in &channels {
            if let Err(e) = pubsub.subscribe(channel.as_slice()).await {
                error!(error = %e, channel = %decode_path(channel), "subscribe failed");
                callback.on_closing().await;
                return;
            }
        }
        info!("Subscription completed!");

        while !*done.borrow() {
            *subscribe_begin.lock().expect("begin slot poisoned") = Some(Instant::now());
            let next = {
                let mut stream = pubsub.on_message();
                tokio::time::timeout(subscribe_timeout, stream.next()).await
            };
            *subscribe_begin.lock().expect("begin slot poisoned") = None;

            let msg = match next {
                Err(_) => continue,
                Ok(None) => {
                    warn!("pub/sub stream ended");
                    break;
                }
                Ok(Some(msg)) => msg,
            };

            let channel: Vec<u8> = msg.get_channel().unwrap_or_default();
            let data = msg.get_payload_bytes().to_vec();
            debug!(
                channel = %decode_path(&channel),
                bytes = data.len(),
                "Data was received on subscription channel"
            );

            // Shield: a failing handler never brings the loop down.
            if let Err(e) = callback.on_subscribe(channel, data).await {
                error!(error = %e, "subscribe handler failed");
            }
        }

        callback.on_closing().await;
        for channel in &channels {
            if let Err(e) = pubsub.unsubscribe(channel.as_slice()).await {
                debug!(error = %e, channel = %decode_path(channel), "unsubscribe on close failed");
            }
        }
    }

    /// Signal and join the subscriber with a bounded grace period.
    ///
    /// If the subscriber is mid-wait and its remaining wait exceeds the
    /// close budget, the task is cancelled outright — otherwise shutdown
    /// could block for a full subscribe slice.
    pub async fn close(&self) -> Result<(), FabricError> {
        let handle = match self.task.lock().await.take() {
            Some(handle) => handle,
            None => {
                warn!("close called without an open subscriber");
                return Ok(());
            }
        };

        let _ = self.done.send(true);

        if let Some(begin) = *self.subscribe_begin.lock().expect("begin slot poisoned") {
            let remaining = self.subscribe_timeout.saturating_sub(begin.elapsed());
            if remaining > self.close_timeout {
                warn!(
                    remaining = ?remaining,
                    budget = ?self.close_timeout,
                    "Forcing cancellation of the subscriber task during close"
                );
                handle.abort();
            }
        }

        let abort = handle.abort_handle();
        match tokio::time::timeout(self.close_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(FabricError::Transport(format!(
                "subscriber task failed: {e}"
            ))),
            Err(_) => {
                warn!("subscriber join exceeded the close budget, cancelling");
                abort.abort();
                Ok(())
            }
        }
    }
}

#[async_trait]
impl FabricClient for MqClient {
    async fn publish(&self, key: &str, data: &[u8]) -> Result<(), FabricError> {
        let channel = encode_path(key)?;
        let mut conn = self.conn.lock().await;
        let receivers: i64 = conn.publish(channel.as_slice(), data).await?;
        debug!(key = %key, receivers, "published");
        Ok(())
    }

    async fn lpush_bytes(
        &self,
        key: &str,
        data: &[u8],
        expire: Option<u64>,
    ) -> Result<(), FabricError> {
        let queue = encode_path(key)?;
        let mut conn = self.conn.lock().await;
        match expire {
            Some(seconds) => {
                debug!(key = %key, bytes = data.len(), expire = seconds, "left push");
                redis::pipe()
                    .atomic()
                    .lpush(queue.as_slice(), data)
                    .ignore()
                    .expire(queue.as_slice(), seconds as i64)
                    .ignore()
                    .query_async::<()>(&mut *conn)
                    .await?;
            }
            None => {
                debug!(key = %key, bytes = data.len(), "left push");
                let _: i64 = conn.lpush(queue.as_slice(), data).await?;
            }
        }
        Ok(())
    }

    async fn brpop_bytes(
        &self,
        key: &str,
        timeout: u64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, FabricError> {
        let queue = encode_path(key)?;
        debug!(key = %key, timeout, "blocking right pop ...");
        let mut conn = self.blocking.lock().await;
        let value: Option<(Vec<u8>, Vec<u8>)> =
            conn.brpop(queue.as_slice(), timeout as f64).await?;
        match &value {
            Some((popped_key, data)) => {
                debug!(key = %decode_path(popped_key), bytes = data.len(), "blocking right pop done")
            }
            None => debug!(key = %key, "blocking right pop timed out"),
        }
        Ok(value)
    }

    async fn ping(&self, timeout: Option<Duration>) -> bool {
        let probe = async {
            let mut conn = self.conn.lock().await;
            redis::cmd("PING")
                .query_async::<String>(&mut *conn)
                .await
                .is_ok()
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, probe).await.unwrap_or(false),
            None => probe.await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, FabricError> {
        let encoded = encode_path(key)?;
        let mut conn = self.conn.lock().await;
        let exists: i64 = conn.exists(encoded.as_slice()).await?;
        Ok(exists == 1)
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, FabricError> {
        let encoded = encode_path(key)?;
        let mut conn = self.conn.lock().await;
        Ok(conn.get(encoded.as_slice()).await?)
    }

    async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<(), FabricError> {
        let encoded = encode_path(key)?;
        let mut conn = self.conn.lock().await;
        let _: () = conn.set(encoded.as_slice(), value).await?;
        Ok(())
    }
}
