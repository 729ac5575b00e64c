use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    nodi_bridge::{
        BridgeChatRequest, BridgeConfig, CaptureSummary, ChatBridge, DirFileStore, Pdftotext,
        summarize_capture,
    },
    nodi_client::{GatewayClient, GatewayConfig, config},
    serde_json::{Value, json},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

/// Talk to an OpenClaw-style agent gateway over its WebSocket RPC protocol.
///
/// Every command opens its own connection and closes it when done.
#[derive(Parser, Debug)]
#[command(name = "nodi", version)]
struct Cli {
    /// Gateway WebSocket URL.
    #[arg(long, global = true, env = config::ENV_URL)]
    url: Option<String>,

    /// Shared gateway token.
    #[arg(long, global = true, env = config::ENV_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Origin header for the WebSocket upgrade.
    #[arg(long, global = true, env = config::ENV_ORIGIN)]
    origin: Option<String>,

    /// Gateway TOML config. Flags and environment override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bridge TOML config (upload dir, vision model, limits).
    #[arg(long, global = true)]
    bridge_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect, complete the handshake, and print the hello payload.
    Probe,
    /// Call `health`.
    Health,
    /// Call `status`.
    Status,
    /// Call an arbitrary gateway method.
    Call {
        method: String,
        /// JSON params object.
        #[arg(long)]
        params: Option<String>,
    },
    /// Send a chat message and wait for the final reply.
    Chat {
        message: String,
        /// Session key. A fresh webchat session is used when omitted.
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        thinking: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Id of a previously uploaded file. Repeatable.
        #[arg(long = "file-id")]
        file_ids: Vec<String>,
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
    /// Store a local image or PDF for use with `chat --file-id`.
    Upload {
        path: PathBuf,
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
    /// Title and summarize a note for the inbox.
    Summarize { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("ctrl-c, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let output = run(cli, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<Value> {
    let gateway = load_gateway_config(&cli)?;
    let mut bridge_config = load_bridge_config(&cli)?;
    let client = move || -> Result<GatewayClient> {
        Ok(GatewayClient::new(gateway)
            .context("invalid gateway configuration")?
            .with_cancellation(cancel))
    };

    let value = match cli.command {
        Command::Probe => {
            let hello = client()?.probe().await?;
            json!({ "hello": hello.payload, "challengeNonce": hello.challenge_nonce })
        },
        Command::Health => client()?.call("health", None).await?,
        Command::Status => client()?.call("status", None).await?,
        Command::Call { method, params } => {
            let params = params
                .map(|p| serde_json::from_str::<Value>(&p))
                .transpose()
                .context("--params must be valid JSON")?;
            client()?.call(&method, params).await?
        },
        Command::Chat {
            message,
            session,
            thinking,
            timeout_ms,
            file_ids,
            upload_dir,
        } => {
            if let Some(dir) = upload_dir {
                bridge_config = bridge_config.with_upload_dir(dir);
            }
            let store = DirFileStore::new(
                &bridge_config.upload_dir,
                bridge_config.max_attachment_bytes,
            );
            let bridge = ChatBridge::new(
                client()?,
                Arc::new(store),
                Arc::new(Pdftotext::default()),
                bridge_config,
            );
            let reply = bridge
                .send(BridgeChatRequest {
                    text: Some(message),
                    session_key: session,
                    thinking,
                    timeout_ms,
                    file_ids,
                })
                .await?;
            serde_json::to_value(reply)?
        },
        Command::Upload { path, upload_dir } => {
            if let Some(dir) = upload_dir {
                bridge_config = bridge_config.with_upload_dir(dir);
            }
            upload(&path, &bridge_config).await?
        },
        Command::Summarize { text } => serde_json::to_value(summarize(client(), &text).await)?,
    };
    Ok(value)
}

async fn upload(path: &Path, config: &BridgeConfig) -> Result<Value> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("upload path has no file name")?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let stored = DirFileStore::new(&config.upload_dir, config.max_attachment_bytes)
        .save(file_name, &bytes)
        .await?;
    Ok(json!({
        "fileId": stored.id,
        "fileName": stored.file_name,
        "mimeType": stored.mime_type,
        "sizeBytes": stored.size_bytes,
    }))
}

/// Summaries never fail: without a usable gateway the title is derived locally.
async fn summarize(client: Result<GatewayClient>, text: &str) -> CaptureSummary {
    match client {
        Ok(client) => summarize_capture(&client, text).await,
        Err(e) => {
            warn!("gateway unavailable, using derived title: {e:#}");
            CaptureSummary::derived(text)
        },
    }
}

fn load_gateway_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(url) = cli.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        config.url = url.to_string();
    }
    if cli.token.is_some() {
        config = config.with_token(cli.token.clone());
    }
    if cli.origin.is_some() {
        config = config.with_origin(cli.origin.clone());
    }
    Ok(config)
}

fn load_bridge_config(cli: &Cli) -> Result<BridgeConfig> {
    Ok(match &cli.bridge_config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    })
}
