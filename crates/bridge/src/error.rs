#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Gateway(#[from] nodi_client::Error),

    #[error("attachment {file_name}: {message}")]
    Attachment { file_name: String, message: String },

    #[error("pdf text extraction failed: {0}")]
    Pdf(String),

    #[error("bridge config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn attachment(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Attachment {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn pdf(message: impl Into<String>) -> Self {
        Self::Pdf(message.into())
    }

    /// HTTP-style status a calling layer can surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Gateway(e) => e.status_code(),
            Self::Attachment { .. } => 400,
            Self::Pdf(_) | Self::Config(_) | Self::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_passes_through() {
        let err: Error = nodi_client::Error::RunAborted.into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "chat run aborted");
    }

    #[test]
    fn attachment_errors_are_client_errors() {
        let err = Error::attachment("big.png", "exceeds 26214400 bytes");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "attachment big.png: exceeds 26214400 bytes");
    }
}
