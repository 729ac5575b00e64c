use std::{path::Path, time::Duration};

use {
    nodi_protocol::{CONNECT_DELAY_MS, KEEPALIVE_INTERVAL_SECS},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

pub const ENV_URL: &str = "OPENCLAW_URL";
pub const ENV_TOKEN: &str = "OPENCLAW_GATEWAY_TOKEN";
pub const ENV_ORIGIN: &str = "OPENCLAW_ORIGIN";

/// Upper bound for `keepalive_secs`.
pub const MAX_KEEPALIVE_SECS: u64 = 3_600;

/// Where and how to reach the gateway.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// WebSocket URL, e.g. `ws://127.0.0.1:18790`.
    pub url: String,

    /// Shared gateway token. Omitted from `connect` when unset.
    #[serde(
        serialize_with = "serialize_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,

    /// Value for the `Origin` header on the upgrade request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// How long to wait for a `connect.challenge` before sending `connect`.
    pub connect_delay_ms: u64,

    /// WebSocket ping interval while waiting on frames.
    pub keepalive_secs: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("origin", &self.origin)
            .field("connect_delay_ms", &self.connect_delay_ms)
            .field("keepalive_secs", &self.keepalive_secs)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            origin: None,
            connect_delay_ms: CONNECT_DELAY_MS,
            keepalive_secs: KEEPALIVE_INTERVAL_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = non_blank(token).map(Secret::new);
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = non_blank(origin);
        self
    }

    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Read `OPENCLAW_URL`, `OPENCLAW_GATEWAY_TOKEN` and `OPENCLAW_ORIGIN`.
    /// Blank values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(non_blank(lookup(ENV_URL)).unwrap_or_default())
            .with_token(lookup(ENV_TOKEN))
            .with_origin(lookup(ENV_ORIGIN))
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut cfg: Self =
            toml::from_str(raw).map_err(|e| Error::config(format!("invalid config: {e}")))?;
        // Normalize blanks the same way the env path does.
        cfg.token = cfg
            .token
            .filter(|t| !t.expose_secret().trim().is_empty());
        cfg.origin = non_blank(cfg.origin);
        Ok(cfg)
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.clamp(1, MAX_KEEPALIVE_SECS))
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Check the URL and timings up front so misconfiguration fails before
    /// any I/O.
    pub fn validate(&self) -> Result<url::Url> {
        if self.keepalive_secs > MAX_KEEPALIVE_SECS {
            return Err(Error::config(format!(
                "keepalive_secs must be at most {MAX_KEEPALIVE_SECS}, got {}",
                self.keepalive_secs
            )));
        }
        if self.url.trim().is_empty() {
            return Err(Error::config(format!(
                "{ENV_URL} is required (e.g. ws://127.0.0.1:18790)"
            )));
        }
        let url = url::Url::parse(self.url.trim())
            .map_err(|e| Error::config(format!("invalid gateway url {:?}: {e}", self.url)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "gateway url must use ws:// or wss://, got {other}://"
            ))),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
