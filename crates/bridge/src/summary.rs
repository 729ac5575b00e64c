//! Titles and short summaries for captured inbox notes.

use std::sync::LazyLock;

use {
    nodi_client::{ChatSend, GatewayClient},
    regex::Regex,
    serde::{Deserialize, Serialize},
    tracing::warn,
};

pub const SUMMARIZE_SESSION_KEY: &str = "agent:ops:web:nodi-inbox-summarize";
pub const TITLE_MAX_CHARS: usize = 90;
pub const SUMMARY_MAX_CHARS: usize = 280;
const SUMMARIZE_TIMEOUT_MS: u64 = 20_000;

static SENTENCE_END: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.{12,90}?)[.!?](\s|$)").ok());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub title: String,
    pub summary: String,
}

impl CaptureSummary {
    /// Title derived locally from `text`, with no summary.
    pub fn derived(text: &str) -> Self {
        Self {
            title: derive_title(text),
            summary: String::new(),
        }
    }
}

/// Title taken from the first line of `text`, cut at an early sentence end.
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "(empty)".to_string();
    }
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(text);

    let title = SENTENCE_END
        .as_ref()
        .and_then(|re| re.captures(first_line))
        .and_then(|caps| caps.get(1))
        .map_or(first_line, |m| m.as_str());
    cap_chars(title.trim(), TITLE_MAX_CHARS)
}

/// Ask the gateway for a title and summary of `text`.
///
/// Never fails: any gateway or parse problem yields the derived title and an
/// empty summary.
pub async fn summarize_capture(client: &GatewayClient, text: &str) -> CaptureSummary {
    match request_summary(client, text).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "capture summary unavailable, using derived title");
            CaptureSummary::derived(text)
        },
    }
}

#[derive(Deserialize)]
struct SummaryReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

async fn request_summary(client: &GatewayClient, text: &str) -> crate::Result<CaptureSummary> {
    let send = ChatSend::new(SUMMARIZE_SESSION_KEY, summarize_prompt(text))
        .with_thinking("off")
        .with_timeout_ms(SUMMARIZE_TIMEOUT_MS);
    let result = client.chat_send_wait_final(send).await?;
    let reply: SummaryReply = serde_json::from_str(result.final_text.trim())
        .map_err(nodi_client::Error::from)?;
    Ok(parse_reply(reply, text))
}

fn parse_reply(reply: SummaryReply, text: &str) -> CaptureSummary {
    let title = reply
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| derive_title(text), |t| cap_chars(t, TITLE_MAX_CHARS));
    let summary = cap_chars(
        reply.summary.as_deref().unwrap_or_default().trim(),
        SUMMARY_MAX_CHARS,
    );
    CaptureSummary { title, summary }
}

fn summarize_prompt(text: &str) -> String {
    format!(
        "You will receive a note to be filed in an inbox. Reply with strict JSON \
         containing the fields title and summary. title: at most {TITLE_MAX_CHARS} \
         characters. summary: at most {SUMMARY_MAX_CHARS} characters. Use the \
         language of the note. No other text.\n\nTEXT:\n{text}"
    )
}

fn cap_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", s[..cut].trim_end()),
        None => s.to_string(),
    }
}
