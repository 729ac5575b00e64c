//! Web-chat bridge on top of the gateway client: uploads, PDF text, vision
//! session pinning, and inbox capture summaries.

pub mod chat;
pub mod config;
pub mod error;
pub mod files;
pub mod summary;

pub use {
    chat::{BridgeChatReply, BridgeChatRequest, ChatBridge},
    config::BridgeConfig,
    error::{Error, Result},
    files::{DirFileStore, FileStore, PdfTextExtractor, Pdftotext, StoredFile},
    summary::{CaptureSummary, derive_title, summarize_capture},
};
