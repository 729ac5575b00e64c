//! One gateway WebSocket, owned by a single operation.

use std::time::Duration;

use {
    futures::{SinkExt, StreamExt},
    nodi_protocol::{Frame, RequestFrame, codec},
    tokio::{
        net::TcpStream,
        time::{Instant, Interval, MissedTickBehavior},
    },
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream,
        tungstenite::{
            self, Message,
            client::IntoClientRequest,
            http::{HeaderValue, header::ORIGIN},
        },
    },
    tokio_util::sync::CancellationToken,
    tracing::debug,
};

use crate::{Error, GatewayConfig, Phase, Result};

/// Stream type returned by `tokio_tungstenite::connect_async`.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) struct Connection {
    ws: WsStream,
    cancel: CancellationToken,
    keepalive: Interval,
}

impl Connection {
    /// Open the socket. The caller must already have validated the config.
    pub(crate) async fn open(
        config: &GatewayConfig,
        url: &url::Url,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut request = url.as_str().into_client_request()?;
        if let Some(origin) = &config.origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| Error::config(format!("invalid origin {origin:?}: {e}")))?;
            request.headers_mut().insert(ORIGIN, value);
        }

        let (ws, _response) = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = tokio_tungstenite::connect_async(request) => result?,
        };
        debug!(url = %url, "gateway socket open");

        Ok(Self {
            ws,
            cancel,
            keepalive: keepalive_interval(config.keepalive()),
        })
    }

    pub(crate) async fn send(&mut self, frame: &RequestFrame, phase: Phase) -> Result<()> {
        let text = codec::encode(frame)?;
        debug!(method = %frame.method, id = %frame.id, "gateway send");
        tokio::select! {
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.ws.send(Message::Text(text.into())) => {
                result.map_err(|e| send_error(e, phase))
            }
        }
    }

    /// Wait for the next decodable message.
    ///
    /// Returns `Frame::Malformed` for text that is not a known frame shape.
    /// A close frame, end of stream, or read error becomes
    /// `Error::ConnectionLost` tagged with `phase`.
    pub(crate) async fn next_frame(&mut self, phase: Phase) -> Result<Frame> {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                _ = self.keepalive.tick() => {
                    if let Err(e) = self.ws.send(Message::Ping(Vec::new().into())).await {
                        return Err(send_error(e, phase));
                    }
                }
                msg = self.ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => return Ok(codec::decode(text.as_str())),
                    Some(Ok(Message::Binary(bytes))) => {
                        let frame =
                            std::str::from_utf8(&bytes).map_or(Frame::Malformed, codec::decode);
                        return Ok(frame);
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| format!("{} {}", f.code, f.reason.as_str()));
                        return Err(Error::connection_lost(phase, reason));
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => return Err(Error::connection_lost(phase, Some(e.to_string()))),
                    None => return Err(Error::connection_lost(phase, None)),
                },
            }
        }
    }

    /// Best-effort close; the socket is dropped either way.
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("gateway close: {e}");
        }
    }
}

fn keepalive_interval(period: Duration) -> Interval {
    let now = Instant::now();
    let start = now.checked_add(period).unwrap_or(now);
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn send_error(err: tungstenite::Error, phase: Phase) -> Error {
    match err {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_) => Error::connection_lost(phase, Some(err.to_string())),
        other => other.into(),
    }
}
