//! Chat requests carrying uploaded files.

use std::sync::Arc;

use {
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    nodi_client::{ChatSend, GatewayClient},
    nodi_protocol::{ChatAttachment, SessionPatchParams, methods},
    serde::{Deserialize, Serialize},
    tracing::{debug, info},
};

use crate::{
    BridgeConfig, Result,
    files::{FileStore, PdfTextExtractor, StoredFile},
};

pub const SESSION_KEY_PREFIX: &str = "agent:main:webchat:";
pub const VISION_SUFFIX: &str = ":vision";
const TRUNCATION_MARKER: &str = "\n\n[...truncated]";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeChatRequest {
    pub text: Option<String>,
    pub session_key: Option<String>,
    pub thinking: Option<String>,
    pub timeout_ms: Option<u64>,
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeChatReply {
    pub session_key: String,
    pub run_id: String,
    pub text: String,
}

pub struct ChatBridge {
    client: GatewayClient,
    files: Arc<dyn FileStore>,
    pdf: Arc<dyn PdfTextExtractor>,
    config: BridgeConfig,
}

impl ChatBridge {
    pub fn new(
        client: GatewayClient,
        files: Arc<dyn FileStore>,
        pdf: Arc<dyn PdfTextExtractor>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            client,
            files,
            pdf,
            config,
        }
    }

    pub async fn send(&self, req: BridgeChatRequest) -> Result<BridgeChatReply> {
        let session_key = req
            .session_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map_or_else(new_session_key, str::to_string);

        let mut message = req.text.unwrap_or_default();
        let mut attachments = Vec::new();
        for file_id in req.file_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            let Some(file) = self.files.resolve(file_id).await? else {
                debug!(file_id, "unknown file id, skipping");
                continue;
            };
            if file.is_image() {
                attachments.push(self.image_attachment(&file).await?);
            } else if file.is_pdf() {
                message.push_str(&self.pdf_section(&file).await?);
            }
        }

        let run_key = if attachments.iter().any(ChatAttachment::is_image) {
            let vision_key = format!("{session_key}{VISION_SUFFIX}");
            self.pin_vision_model(&vision_key).await?;
            vision_key
        } else {
            session_key.clone()
        };

        let mut send = ChatSend::new(run_key, message).with_attachments(attachments);
        send.thinking = req.thinking;
        send.timeout_ms = req.timeout_ms;
        let result = self.client.chat_send_wait_final(send).await?;

        Ok(BridgeChatReply {
            session_key,
            run_id: result.run_id,
            text: result.final_text,
        })
    }

    async fn image_attachment(&self, file: &StoredFile) -> Result<ChatAttachment> {
        let bytes = self.files.read(file).await?;
        let data_url = format!("data:{};base64,{}", file.mime_type, BASE64.encode(&bytes));
        Ok(ChatAttachment::image(
            &file.mime_type,
            &file.file_name,
            data_url,
        ))
    }

    async fn pdf_section(&self, file: &StoredFile) -> Result<String> {
        let text = self.pdf.extract_text(&file.path).await?;
        Ok(pdf_section(
            &file.file_name,
            &text,
            self.config.pdf_text_limit,
        ))
    }

    async fn pin_vision_model(&self, key: &str) -> Result<()> {
        let params = SessionPatchParams {
            key: key.to_string(),
            model: Some(self.config.vision_model.clone()),
        };
        self.client
            .call(
                methods::SESSIONS_PATCH,
                Some(serde_json::to_value(params).map_err(nodi_client::Error::from)?),
            )
            .await?;
        info!(session_key = %key, model = %self.config.vision_model, "pinned vision model");
        Ok(())
    }
}

fn new_session_key() -> String {
    format!("{SESSION_KEY_PREFIX}{}", uuid::Uuid::new_v4())
}

/// Message suffix presenting extracted PDF text to the agent.
pub fn pdf_section(file_name: &str, text: &str, limit: usize) -> String {
    let text = text.trim();
    let header = format!("\n\n[PDF: {file_name}]\n");
    if text.is_empty() {
        return format!("{header}\n(could not extract text)\n");
    }
    let body = match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    };
    format!("{header}\n```\n{body}\n```\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pdf_section_wraps_text_in_fence() {
        assert_eq!(
            pdf_section("report.pdf", "  Hello\nWorld \n", 100),
            "\n\n[PDF: report.pdf]\n\n```\nHello\nWorld\n```\n"
        );
    }

    #[test]
    fn pdf_section_truncates_by_chars() {
        let section = pdf_section("a.pdf", "åäöåäö", 3);
        assert_eq!(
            section,
            "\n\n[PDF: a.pdf]\n\n```\nåäö\n\n[...truncated]\n```\n"
        );
        // Exactly at the limit is not truncated.
        assert!(!pdf_section("a.pdf", "abc", 3).contains("truncated"));
    }

    #[test]
    fn pdf_section_without_text() {
        assert_eq!(
            pdf_section("scan.pdf", " \n ", 100),
            "\n\n[PDF: scan.pdf]\n\n(could not extract text)\n"
        );
    }

    #[test]
    fn generated_session_keys_are_unique() {
        let a = new_session_key();
        let b = new_session_key();
        assert!(a.starts_with(SESSION_KEY_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let req: BridgeChatRequest = serde_json::from_value(serde_json::json!({
            "text": "hi",
            "sessionKey": "s1",
            "timeoutMs": 5000,
            "fileIds": ["a", "b"],
        }))
        .unwrap();
        assert_eq!(req.session_key.as_deref(), Some("s1"));
        assert_eq!(req.timeout_ms, Some(5000));
        assert_eq!(req.file_ids, vec!["a", "b"]);
        assert!(req.thinking.is_none());
    }
}
