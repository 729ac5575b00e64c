//! WebSocket RPC client for an OpenClaw-style agent gateway.
//!
//! Every operation opens its own connection, performs the `connect`
//! handshake, runs one RPC (or one chat run), and closes the socket on every
//! exit path. Nothing is pooled, retried, or shared between calls, so a
//! [`GatewayClient`] can be cloned freely and used from concurrent tasks.

pub mod chat;
pub mod config;
mod connection;
pub mod error;
pub mod handshake;
mod rpc;

use {
    nodi_protocol::{ConnectParams, RequestFrame},
    serde_json::Value,
    tokio_util::sync::CancellationToken,
    tracing::debug,
};

pub use {
    chat::{ChatRunResult, ChatSend, RunAccumulator},
    config::GatewayConfig,
    error::{Error, Phase, Result},
    handshake::Hello,
};

use crate::connection::Connection;

#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    url: url::Url,
    cancel: CancellationToken,
}

impl GatewayClient {
    /// Build a client, failing fast on an unusable URL.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let url = config.validate()?;
        Ok(Self {
            config,
            url,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future operations of this client (and its clones)
    /// when `cancel` fires. They return [`Error::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Connect, complete the handshake, and disconnect.
    pub async fn probe(&self) -> Result<Hello> {
        let (conn, hello) = self.connect().await?;
        conn.close().await;
        Ok(hello)
    }

    /// Invoke `method` and return the response payload (`Null` if none).
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let method = method.trim();
        if method.is_empty() {
            return Err(Error::invalid_argument("method required"));
        }

        let (mut conn, _hello) = self.connect().await?;
        let request = RequestFrame::new(method, params);
        let result = rpc::round_trip(&mut conn, &request, Phase::Response).await;
        conn.close().await;

        let payload = rpc::into_payload(result?, method, "gateway call failed")?;
        debug!(method, "gateway call ok");
        Ok(payload)
    }

    /// Send a chat message and wait until the run reaches a terminal state.
    ///
    /// The run id doubles as the `chat.send` idempotency key.
    pub async fn chat_send_wait_final(&self, send: ChatSend) -> Result<ChatRunResult> {
        send.validate()?;

        let (mut conn, _hello) = self.connect().await?;
        let result = chat::drive(&mut conn, send).await;
        conn.close().await;
        result
    }

    async fn connect(&self) -> Result<(Connection, Hello)> {
        let mut conn = Connection::open(&self.config, &self.url, self.cancel.clone()).await?;
        let params = ConnectParams::operator(self.config.token());
        match handshake::perform(&mut conn, params, self.config.connect_delay()).await {
            Ok(hello) => Ok((conn, hello)),
            Err(e) => {
                conn.close().await;
                Err(e)
            },
        }
    }
}
