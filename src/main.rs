//! tether — resilient WebSocket relay client.
//!
//! Connects to a JSON-RPC-style WebSocket endpoint and relays opaque
//! messages: stdin lines go out (buffered while disconnected and flushed
//! in order on the next connection), inbound messages are printed to
//! stdout one per line.
//!
//! Usage:
//!   tether wss://example.com/api --token secret
//!   tether ws://127.0.0.1:7070/ws --retry
//!   tether wss://example.com/api --proxy http://proxy:8080 --proxy direct

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tether_client::{connect, derive_origin, ConnectOptions};
use tether_protocol::ProxyConfig;
use tether_transport::{ConnectionState, InboundSink, OutboundWriter, WsSession};
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Delay between attempts in `--retry` mode. Fixed on purpose: backoff
/// policy belongs to whoever embeds the transport, and this tool keeps the
/// simplest possible one.
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "tether", about = "Resilient WebSocket relay client")]
struct Cli {
    /// Endpoint URL (ws:// or wss://)
    url: String,

    /// Bearer token for the Authorization header
    #[arg(long, default_value = "")]
    token: String,

    /// Origin header (derived from the endpoint URL if omitted)
    #[arg(long)]
    origin: Option<String>,

    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// X-Client-Version header
    #[arg(long)]
    client_version: Option<String>,

    /// Proxy entry: http://[user:pass@]host:port, socks5://host:port, or
    /// `direct`. Repeatable; entries are tried in order.
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Reconnect after the connection ends
    #[arg(long)]
    retry: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Prints every inbound message to stdout, one per line.
struct StdoutSink;

impl InboundSink for StdoutSink {
    fn on_message(&self, raw: String) {
        println!("{raw}");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .unwrap_or_else(|e| panic!("Failed to open log file {}: {e}", log_path.display()));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        // stdout carries inbound messages, so logs go to stderr.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut proxies = Vec::new();
    for entry in &cli.proxies {
        match ProxyConfig::parse(entry) {
            Ok(proxy) => proxies.push(proxy),
            Err(err) => {
                error!(%err, "invalid --proxy entry");
                std::process::exit(2);
            }
        }
    }

    let origin = cli
        .origin
        .clone()
        .unwrap_or_else(|| derive_origin(&cli.url));
    let user_agent = cli
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("tether/{}", env!("CARGO_PKG_VERSION")));
    let client_version = cli
        .client_version
        .clone()
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    info!(url = %cli.url, %origin, proxies = proxies.len(), "starting");

    let writer = Arc::new(OutboundWriter::<WsSession>::new());
    let inbound: Arc<dyn InboundSink> = Arc::new(StdoutSink);

    // stdin pump: every line becomes one outbound message. Lines typed
    // while disconnected are buffered and flushed on the next connection.
    let stdin_done = Arc::new(tokio::sync::Notify::new());
    {
        let writer = writer.clone();
        let stdin_done = stdin_done.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                writer.send(line).await;
            }
            stdin_done.notify_one();
        });
    }

    loop {
        let opts = ConnectOptions {
            url: cli.url.clone(),
            origin: Some(origin.clone()),
            user_agent: user_agent.clone(),
            client_version: client_version.clone(),
            token: cli.token.clone(),
            proxies: proxies.clone(),
            tls: None,
        };

        match connect(opts, writer.clone(), inbound.clone()).await {
            Ok(handle) => {
                tokio::select! {
                    state = handle.wait() => match state {
                        ConnectionState::Closed(info) => info!(%info, "connection closed"),
                        ConnectionState::Errored(err) => warn!(%err, "connection errored"),
                        ConnectionState::Cancelled => {
                            info!("connection cancelled");
                            break;
                        }
                        _ => {}
                    },
                    _ = tokio::signal::ctrl_c() => {
                        handle.cancel();
                        handle.wait().await;
                        info!("interrupted");
                        break;
                    }
                    _ = stdin_done.notified() => {
                        handle.cancel();
                        handle.wait().await;
                        info!("stdin closed, leaving");
                        break;
                    }
                }
            }
            Err(err) => {
                error!(%err, "connection attempt failed");
                if !cli.retry {
                    std::process::exit(1);
                }
            }
        }

        if !cli.retry {
            break;
        }
        let pending = writer.pending_len().await;
        if pending > 0 {
            info!(pending, "messages buffered, reconnecting");
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}
