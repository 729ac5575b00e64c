use {
    nodi_protocol::{RequestFrame, ResponseFrame},
    serde_json::Value,
};

use crate::{Error, Phase, Result, connection::Connection};

/// Send `request` and pump frames until its response arrives.
///
/// Events and responses for other ids are skipped.
pub(crate) async fn round_trip(
    conn: &mut Connection,
    request: &RequestFrame,
    phase: Phase,
) -> Result<ResponseFrame> {
    conn.send(request, phase).await?;
    loop {
        if let Some(res) = conn.next_frame(phase).await?.into_response_for(&request.id) {
            return Ok(res);
        }
    }
}

/// Unwrap a response into its payload, or a `Gateway` error carrying the
/// server's message (`fallback` when it sent none).
pub(crate) fn into_payload(res: ResponseFrame, method: &str, fallback: &str) -> Result<Value> {
    if res.ok {
        return Ok(res.payload.unwrap_or(Value::Null));
    }
    Err(Error::Gateway {
        method: method.to_string(),
        message: res.error_message().unwrap_or(fallback).to_string(),
        code: res.error_code().map(str::to_string),
    })
}
