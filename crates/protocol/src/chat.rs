//! `chat.send` parameters and `chat` event payloads.

use serde::{Deserialize, Serialize};

use crate::lenient;

// ── chat.send ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams {
    pub session_key: String,
    pub message: String,
    /// Doubles as the run id the gateway stamps on `chat` events.
    pub idempotency_key: String,
    pub deliver: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ChatAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Inline attachment. `content` is a `data:<mime>;base64,<bytes>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAttachment {
    pub r#type: String,
    pub mime_type: String,
    pub file_name: String,
    pub content: String,
}

impl ChatAttachment {
    pub fn image(
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
        data_url: impl Into<String>,
    ) -> Self {
        Self {
            r#type: "image".into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
            content: data_url.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.r#type == "image"
    }
}

/// `sessions.patch` parameters used to pin a model on a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPatchParams {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// ── chat events ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Delta,
    Final,
    Error,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl ChatState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Final | Self::Error | Self::Aborted)
    }
}

/// Payload of an `event: "chat"` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub run_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<ChatState>,
    /// Kept untyped; only `content[0].text` is read and any other shape
    /// counts as "no text".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
}

impl ChatEvent {
    /// Parse an event payload, `None` if it is not a chat payload.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        if !payload.is_object() {
            return None;
        }
        serde_json::from_value(payload.clone()).ok()
    }

    /// `message.content[0].text`, if present and a string.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.pointer("/content/0/text"))
            .and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn send_params_omit_unset_optionals() {
        let params = ChatSendParams {
            session_key: "s1".into(),
            message: "Hej".into(),
            idempotency_key: "run-1".into(),
            deliver: false,
            attachments: Vec::new(),
            thinking: None,
            timeout_ms: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            json!({"sessionKey": "s1", "message": "Hej", "idempotencyKey": "run-1", "deliver": false})
        );
    }

    #[test]
    fn send_params_include_supplied_optionals() {
        let params = ChatSendParams {
            session_key: "s1".into(),
            message: String::new(),
            idempotency_key: "run-1".into(),
            deliver: false,
            attachments: vec![ChatAttachment {
                r#type: "image".into(),
                mime_type: "image/png".into(),
                file_name: "a.png".into(),
                content: "data:image/png;base64,AAAA".into(),
            }],
            thinking: Some("low".into()),
            timeout_ms: Some(20_000),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["thinking"], "low");
        assert_eq!(json["timeoutMs"], 20_000);
        assert_eq!(json["attachments"][0]["type"], "image");
        assert_eq!(json["attachments"][0]["mimeType"], "image/png");
        assert_eq!(json["attachments"][0]["fileName"], "a.png");
    }

    #[test]
    fn chat_event_delta_text() {
        let ev = ChatEvent::from_payload(&json!({
            "runId": "r1",
            "state": "delta",
            "message": {"role": "assistant", "content": [{"type": "text", "text": "Hej"}]},
        }))
        .unwrap();
        assert_eq!(ev.state, Some(ChatState::Delta));
        assert_eq!(ev.text(), Some("Hej"));
    }

    #[test]
    fn chat_event_malformed_content_has_no_text() {
        for message in [
            json!({"content": []}),
            json!({"content": "Hej"}),
            json!({"content": [{"text": 5}]}),
            json!("flat"),
        ] {
            let ev = ChatEvent::from_payload(&json!({
                "runId": "r1",
                "state": "delta",
                "message": message,
            }))
            .unwrap();
            assert!(ev.text().is_none());
        }
    }

    #[test]
    fn chat_event_error_message() {
        let ev = ChatEvent::from_payload(&json!({
            "runId": "r1",
            "state": "error",
            "errorMessage": "model unavailable",
        }))
        .unwrap();
        assert_eq!(ev.state, Some(ChatState::Error));
        assert!(ev.state.unwrap().is_terminal());
        assert_eq!(ev.error_message.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn chat_event_unknown_or_missing_state() {
        let ev = ChatEvent::from_payload(&json!({"runId": "r1", "state": "thinking"})).unwrap();
        assert_eq!(ev.state, Some(ChatState::Unknown));
        assert!(!ChatState::Unknown.is_terminal());

        let ev = ChatEvent::from_payload(&json!({"runId": "r1"})).unwrap();
        assert!(ev.state.is_none());
    }

    #[test]
    fn chat_event_requires_run_id() {
        assert!(ChatEvent::from_payload(&json!({"state": "final"})).is_none());
        assert!(ChatEvent::from_payload(&json!("final")).is_none());
    }
}
