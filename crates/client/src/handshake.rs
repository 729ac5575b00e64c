//! `connect` handshake.
//!
//! The bridge waits briefly for a `connect.challenge` before sending its
//! `connect` request: a challenge triggers the send immediately, otherwise
//! the delay timer does. The request sits in a one-shot slot so whichever
//! path fires first sends it and the other finds the slot empty.

use std::time::Duration;

use {
    nodi_protocol::{ConnectParams, Frame, RequestFrame, events, methods},
    serde_json::Value,
    tracing::debug,
};

use crate::{Error, Phase, Result, connection::Connection};

/// What the gateway told us while accepting the connection.
#[derive(Debug, Clone)]
pub struct Hello {
    /// `payload` of the successful `connect` response.
    pub payload: Value,
    /// Nonce from a `connect.challenge`, if one was sent. The shared-token
    /// auth mode does not sign it.
    pub challenge_nonce: Option<String>,
}

pub(crate) async fn perform(
    conn: &mut Connection,
    params: ConnectParams,
    delay: Duration,
) -> Result<Hello> {
    let request = RequestFrame::new(methods::CONNECT, Some(serde_json::to_value(params)?));
    let connect_id = request.id.clone();
    let mut pending = Some(request);
    let mut nonce: Option<String> = None;

    let timer = tokio::time::sleep(delay);
    tokio::pin!(timer);

    loop {
        let frame = tokio::select! {
            () = &mut timer, if pending.is_some() => {
                if let Some(request) = pending.take() {
                    debug!("no connect.challenge before delay, sending connect");
                    conn.send(&request, Phase::Handshake).await?;
                }
                continue;
            }
            frame = conn.next_frame(Phase::Handshake) => frame?,
        };

        match frame {
            Frame::Event(ev) if ev.event == events::CONNECT_CHALLENGE => {
                if let Some(n) = ev.challenge_nonce() {
                    nonce = Some(n.to_string());
                }
                if let Some(request) = pending.take() {
                    debug!(
                        has_nonce = nonce.is_some(),
                        "connect.challenge received, sending connect"
                    );
                    conn.send(&request, Phase::Handshake).await?;
                }
            },
            Frame::Response(res) if res.id == connect_id => {
                if res.ok {
                    return Ok(Hello {
                        payload: res.payload.unwrap_or(Value::Null),
                        challenge_nonce: nonce,
                    });
                }
                let message = res.error_message().unwrap_or("gateway connect failed");
                return Err(Error::HandshakeFailed(message.to_string()));
            },
            _ => {},
        }
    }
}
