//! Text encoding of frames.
//!
//! Decoding is total: a connection may carry frame shapes the current reader
//! does not care about, so anything unrecognized comes back as
//! [`Frame::Malformed`] and is skipped by every consumer.

use crate::{EventFrame, GatewayFrame, RequestFrame, ResponseFrame};

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
    Event(EventFrame),
    Malformed,
}

impl From<GatewayFrame> for Frame {
    fn from(frame: GatewayFrame) -> Self {
        match frame {
            GatewayFrame::Request(req) => Self::Request(req),
            GatewayFrame::Response(res) => Self::Response(res),
            GatewayFrame::Event(ev) => Self::Event(ev),
        }
    }
}

impl Frame {
    /// The response if this frame answers request `id`.
    pub fn into_response_for(self, id: &str) -> Option<ResponseFrame> {
        match self {
            Self::Response(res) if res.id == id => Some(res),
            _ => None,
        }
    }
}

/// Serialize a request frame to its JSON text form.
pub fn encode(frame: &RequestFrame) -> serde_json::Result<String> {
    #[derive(serde::Serialize)]
    struct Tagged<'a> {
        r#type: &'static str,
        #[serde(flatten)]
        frame: &'a RequestFrame,
    }

    serde_json::to_string(&Tagged {
        r#type: "req",
        frame,
    })
}

/// Parse one text message. Never fails.
pub fn decode(text: &str) -> Frame {
    serde_json::from_str::<GatewayFrame>(text).map_or(Frame::Malformed, Frame::from)
}
