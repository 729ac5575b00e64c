//! Gateway WebSocket/RPC protocol definitions, client side.
//!
//! Protocol version 3. All communication uses JSON text frames over WebSocket.
//!
//! Frame types:
//! - `RequestFrame`: bridge → gateway RPC call
//! - `ResponseFrame`: gateway → bridge RPC result, correlated by `id`
//! - `EventFrame`: gateway → bridge server-push

pub mod chat;
pub mod codec;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

pub use {
    chat::{ChatAttachment, ChatEvent, ChatSendParams, ChatState, SessionPatchParams},
    codec::{Frame, decode, encode},
};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 3;
/// Delay before the bridge sends `connect` unprompted when no challenge arrives.
pub const CONNECT_DELAY_MS: u64 = 750;
/// WebSocket ping interval while a call is waiting on frames.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 20;

// ── Methods and events ───────────────────────────────────────────────────────

pub mod methods {
    pub const CONNECT: &str = "connect";
    pub const HEALTH: &str = "health";
    pub const STATUS: &str = "status";
    pub const CHAT_SEND: &str = "chat.send";
    pub const SESSIONS_PATCH: &str = "sessions.patch";
}

pub mod events {
    pub const CONNECT_CHALLENGE: &str = "connect.challenge";
    pub const CHAT: &str = "chat";
}

// ── Roles and scopes ─────────────────────────────────────────────────────────

pub mod roles {
    pub const OPERATOR: &str = "operator";
}

pub mod scopes {
    pub const ADMIN: &str = "operator.admin";
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorShape {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
        }
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Bridge → gateway RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RequestFrame {
    /// Build a request with a fresh UUID v4 correlation id.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), method, params)
    }

    pub fn with_id(
        id: impl Into<String>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Gateway → bridge RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    /// Anything other than a literal `true` counts as failure.
    #[serde(default, deserialize_with = "literal_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Server-supplied error message, if any non-empty one was sent.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.is_empty())
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.code.as_deref())
    }
}

/// Gateway → bridge server-push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
            seq: None,
        }
    }

    /// `payload.nonce` of a `connect.challenge` event.
    pub fn challenge_nonce(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("nonce"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Wire-level discriminated union of the frame shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "res")]
    Response(ResponseFrame),
    #[serde(rename = "event")]
    Event(EventFrame),
}

// ── Connect handshake ────────────────────────────────────────────────────────

/// Parameters sent by the bridge in its `connect` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "minProtocol")]
    pub min_protocol: u32,
    #[serde(rename = "maxProtocol")]
    pub max_protocol: u32,
    pub client: ClientInfo,
    #[serde(default)]
    pub caps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectAuth>,
}

impl ConnectParams {
    /// Operator-role connect parameters for this bridge.
    ///
    /// `auth` is omitted entirely when no token is configured, which the
    /// gateway accepts in trusted-network mode.
    pub fn operator(token: Option<&str>) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientInfo::bridge(),
            caps: Vec::new(),
            role: Some(roles::OPERATOR.into()),
            scopes: Some(vec![scopes::ADMIN.into()]),
            auth: token.map(|t| ConnectAuth {
                token: Some(t.to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

impl ClientInfo {
    /// The fixed identity this bridge presents. The id must be one the
    /// gateway recognizes as a webchat client.
    pub fn bridge() -> Self {
        Self {
            id: "webchat".into(),
            display_name: Some("nodi webchat bridge".into()),
            version: env!("CARGO_PKG_VERSION").into(),
            platform: "rust".into(),
            mode: "webchat".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Deserialize an optional nested value, dropping it instead of failing the
/// whole frame when it has an unexpected shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn literal_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(serde_json::Value::deserialize(deserializer)? == serde_json::Value::Bool(true))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── Connect params ─────────────────────────────────────────────────

    #[test]
    fn operator_connect_params_shape() {
        let params = ConnectParams::operator(Some("secret"));
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["minProtocol"], 3);
        assert_eq!(json["maxProtocol"], 3);
        assert_eq!(json["client"]["id"], "webchat");
        assert_eq!(json["client"]["mode"], "webchat");
        assert_eq!(json["caps"], serde_json::json!([]));
        assert_eq!(json["role"], "operator");
        assert_eq!(json["scopes"], serde_json::json!(["operator.admin"]));
        assert_eq!(json["auth"]["token"], "secret");
    }

    #[test]
    fn connect_params_without_token_omit_auth() {
        let json = serde_json::to_value(ConnectParams::operator(None)).unwrap();
        assert!(!json.as_object().unwrap().contains_key("auth"));
    }

    #[test]
    fn v3_connect_params_round_trip() {
        let json = serde_json::json!({
            "minProtocol": 3,
            "maxProtocol": 3,
            "client": { "id": "test", "version": "0.1.0", "platform": "rust", "mode": "webchat" },
        });
        let params: ConnectParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.min_protocol, 3);
        assert_eq!(params.client.id, "test");
        assert!(params.caps.is_empty());
        assert!(params.auth.is_none());
    }

    // ── Frames ─────────────────────────────────────────────────────────

    #[test]
    fn request_frames_get_distinct_ids() {
        let a = RequestFrame::new("health", None);
        let b = RequestFrame::new("health", None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn request_frame_omits_null_params() {
        let frame = GatewayFrame::Request(RequestFrame::with_id("1", "health", None));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "req");
        assert!(!json.as_object().unwrap().contains_key("params"));
    }

    #[test]
    fn response_error_message_ignores_empty() {
        let frame = ResponseFrame::err("1", ErrorShape::new(""));
        assert!(frame.error_message().is_none());
        let frame = ResponseFrame::err("1", ErrorShape::new("nope"));
        assert_eq!(frame.error_message(), Some("nope"));
    }

    #[test]
    fn response_with_string_error_still_parses() {
        let json = r#"{"type":"res","id":"1","ok":false,"error":"flat string"}"#;
        let frame: GatewayFrame = serde_json::from_str(json).unwrap();
        match frame {
            GatewayFrame::Response(inner) => {
                assert!(!inner.ok);
                assert!(inner.error.is_none());
            },
            _ => panic!("expected Response frame"),
        }
    }

    #[test]
    fn response_without_ok_is_failure() {
        let json = r#"{"type":"res","id":"1","payload":{}}"#;
        let frame: GatewayFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, GatewayFrame::Response(ref r) if !r.ok));
    }

    #[test]
    fn non_boolean_ok_is_failure() {
        let json = r#"{"type":"res","id":"1","ok":"yes","payload":{}}"#;
        let frame: GatewayFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, GatewayFrame::Response(ref r) if !r.ok));
    }

    #[test]
    fn challenge_nonce_extraction() {
        let frame = EventFrame::new("connect.challenge", serde_json::json!({"nonce": "abc"}));
        assert_eq!(frame.challenge_nonce(), Some("abc"));

        let frame = EventFrame::new("connect.challenge", serde_json::json!({"nonce": 7}));
        assert!(frame.challenge_nonce().is_none());

        let frame = EventFrame {
            event: "connect.challenge".into(),
            payload: None,
            seq: None,
        };
        assert!(frame.challenge_nonce().is_none());
    }
}
