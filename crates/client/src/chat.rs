//! Chat run driver: `chat.send`, then follow `chat` events to a terminal state.

use {
    nodi_protocol::{
        ChatAttachment, ChatEvent, ChatSendParams, ChatState, Frame, RequestFrame, events,
        methods,
    },
    serde::Serialize,
    tracing::{debug, info},
};

use crate::{Error, Phase, Result, connection::Connection, rpc};

/// Input to [`crate::GatewayClient::chat_send_wait_final`].
#[derive(Debug, Clone, Default)]
pub struct ChatSend {
    pub session_key: String,
    pub message: String,
    /// Thinking level forwarded to the gateway. Blank means unset.
    pub thinking: Option<String>,
    /// Forwarded to the gateway only; no local deadline is enforced.
    pub timeout_ms: Option<u64>,
    pub attachments: Vec<ChatAttachment>,
}

impl ChatSend {
    pub fn new(session_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<ChatAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.session_key.trim().is_empty() {
            return Err(Error::invalid_argument("sessionKey required"));
        }
        Ok(())
    }

    fn into_params(self, run_id: &str) -> ChatSendParams {
        ChatSendParams {
            session_key: self.session_key,
            message: self.message,
            idempotency_key: run_id.to_string(),
            deliver: false,
            attachments: self.attachments,
            thinking: self.thinking.filter(|t| !t.trim().is_empty()),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Outcome of a completed chat run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRunResult {
    pub session_key: String,
    pub run_id: String,
    pub final_text: String,
}

/// Assistant text collected across `delta` events of one run.
#[derive(Debug, Clone)]
pub struct RunAccumulator {
    run_id: String,
    text: String,
}

impl RunAccumulator {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            text: String::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Merge one chunk of streamed text.
    ///
    /// Gateways either stream full-so-far snapshots or bare tokens and do not
    /// say which. A chunk that extends what we already have is a snapshot and
    /// replaces it; anything else is a token and is appended.
    pub fn reconcile(&mut self, incoming: &str) {
        if incoming.starts_with(self.text.as_str()) {
            self.text.clear();
        }
        self.text.push_str(incoming);
    }

    /// Apply one chat event addressed to this run.
    ///
    /// Returns `Some` when the event is terminal.
    fn apply(&mut self, event: &ChatEvent) -> Option<Result<()>> {
        match event.state? {
            ChatState::Delta => {
                self.reconcile(event.text().unwrap_or_default());
                None
            },
            ChatState::Final => {
                if let Some(text) = event.text().filter(|t| !t.is_empty()) {
                    self.reconcile(text);
                }
                Some(Ok(()))
            },
            ChatState::Error => Some(Err(Error::RunError(
                event
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "chat run error".to_string()),
            ))),
            ChatState::Aborted => Some(Err(Error::RunAborted)),
            ChatState::Unknown => None,
        }
    }

    /// The event payload if `frame` is a `chat` event for this run.
    fn matching_event(&self, frame: Frame) -> Option<ChatEvent> {
        let Frame::Event(ev) = frame else {
            return None;
        };
        if ev.event != events::CHAT {
            return None;
        }
        ChatEvent::from_payload(ev.payload.as_ref()?).filter(|chat| chat.run_id == self.run_id)
    }
}

pub(crate) async fn drive(conn: &mut Connection, send: ChatSend) -> Result<ChatRunResult> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let session_key = send.session_key.clone();
    let params = serde_json::to_value(send.into_params(&run_id))?;
    let request = RequestFrame::new(methods::CHAT_SEND, Some(params));

    let ack = rpc::round_trip(conn, &request, Phase::ChatAck).await?;
    rpc::into_payload(ack, methods::CHAT_SEND, "chat.send failed")?;
    debug!(run_id = %run_id, session_key = %session_key, "chat.send accepted");

    let mut acc = RunAccumulator::new(run_id);
    loop {
        let frame = conn.next_frame(Phase::ChatStream).await?;
        let Some(event) = acc.matching_event(frame) else {
            continue;
        };
        if let Some(outcome) = acc.apply(&event) {
            outcome?;
            info!(run_id = %acc.run_id, chars = acc.text.len(), "chat run final");
            return Ok(ChatRunResult {
                session_key,
                run_id: acc.run_id,
                final_text: acc.text,
            });
        }
    }
}
