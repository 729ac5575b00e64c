use std::fmt;

/// Where in an operation the gateway connection was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Response,
    ChatAck,
    ChatStream,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Handshake => "connect",
            Self::Response => "call",
            Self::ChatAck => "chat.send",
            Self::ChatStream => "chat",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("gateway config: {0}")]
    Config(String),

    #[error("gateway handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("{method}: {message}")]
    Gateway {
        method: String,
        message: String,
        code: Option<String>,
    },

    #[error("chat run error: {0}")]
    RunError(String),

    #[error("chat run aborted")]
    RunAborted,

    #[error("gateway disconnected during {phase}{}", suffix(.reason))]
    ConnectionLost {
        phase: Phase,
        reason: Option<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Tungstenite(Box<tokio_tungstenite::tungstenite::Error>),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    #[must_use]
    pub fn connection_lost(phase: Phase, reason: Option<String>) -> Self {
        Self::ConnectionLost { phase, reason }
    }

    /// HTTP-style status a calling layer can surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::RunAborted => 409,
            Self::Cancelled => 499,
            Self::HandshakeFailed(_) | Self::Gateway { .. } | Self::RunError(_) => 502,
            Self::ConnectionLost { .. } => 504,
            Self::Config(_) | Self::Tungstenite(_) | Self::Json(_) => 500,
        }
    }
}

fn suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Tungstenite(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_lost_display() {
        let err = Error::connection_lost(Phase::ChatStream, None);
        assert_eq!(err.to_string(), "gateway disconnected during chat");

        let err = Error::connection_lost(Phase::Handshake, Some("reset by peer".into()));
        assert_eq!(
            err.to_string(),
            "gateway disconnected during connect: reset by peer"
        );
    }

    #[test]
    fn gateway_error_display() {
        let err = Error::Gateway {
            method: "health".into(),
            message: "forbidden".into(),
            code: Some("FORBIDDEN".into()),
        };
        assert_eq!(err.to_string(), "health: forbidden");
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::invalid_argument("x").status_code(), 400);
        assert_eq!(Error::RunAborted.status_code(), 409);
        assert_eq!(Error::Cancelled.status_code(), 499);
        assert_eq!(Error::RunError("x".into()).status_code(), 502);
        assert_eq!(
            Error::connection_lost(Phase::Response, None).status_code(),
            504
        );
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("not-json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
