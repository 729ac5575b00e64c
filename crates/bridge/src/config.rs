use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_UPLOAD_DIR: &str = "/tmp/nodi-clawdbot/uploads";
pub const DEFAULT_VISION_MODEL: &str = "anthropic/claude-sonnet-4-5";
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;
pub const DEFAULT_PDF_TEXT_LIMIT: usize = 30_000;

/// Settings for turning uploaded files into chat input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding uploads as `<file id>__<file name>`.
    pub upload_dir: PathBuf,
    /// Model pinned on the `:vision` session when a run carries images.
    pub vision_model: String,
    pub max_attachment_bytes: u64,
    /// Extracted PDF text is cut to this many characters.
    pub pdf_text_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            vision_model: DEFAULT_VISION_MODEL.into(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            pdf_text_limit: DEFAULT_PDF_TEXT_LIMIT,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.upload_dir, PathBuf::from("/tmp/nodi-clawdbot/uploads"));
        assert_eq!(cfg.vision_model, "anthropic/claude-sonnet-4-5");
        assert_eq!(cfg.max_attachment_bytes, 26_214_400);
        assert_eq!(cfg.pdf_text_limit, 30_000);
    }

    #[test]
    fn load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "vision_model = \"openai/gpt-4o\"\npdf_text_limit = 100\n").unwrap();

        let cfg = BridgeConfig::load(&path).unwrap();
        assert_eq!(cfg.vision_model, "openai/gpt-4o");
        assert_eq!(cfg.pdf_text_limit, 100);
        assert_eq!(cfg.upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
    }

    #[test]
    fn load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "pdf_text_limit = \"lots\"").unwrap();
        assert!(matches!(BridgeConfig::load(&path), Err(Error::Config(_))));
    }
}
