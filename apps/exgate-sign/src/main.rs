//! exgate-sign - sign exchange requests from the command line.
//!
//! Reads credentials from `BYBIT_API_KEY` / `BYBIT_SECRET_KEY`, signs the
//! given request exactly as the gateway would, and prints the resulting
//! `X-BAPI-*` headers as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! exgate-sign get category=spot symbol=BTCUSDT
//! exgate-sign post '{"symbol":"BTCUSDT","side":"Buy"}'
//! exgate-sign nonce
//! exgate-sign key-status --last-rotation 2024-05-01T00:00:00Z
//! ```
//!
//! `nonce` only shows the nonce format. The nonce lives in this process's
//! store, which is cleared on exit, so no gateway will accept it.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BYBIT_API_KEY` | *(required for signing)* | Exchange API key |
//! | `BYBIT_SECRET_KEY` | *(required for signing)* | Exchange secret key |
//! | `EXGATE_*` | see `AuthConfig::from_env` | Auth layer settings |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use exgate_auth::{AuthContext, AuthHeaders, EnvCredentialProvider, OutboundRequest};
use exgate_core::{AuthConfig, SystemClock};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "exgate-sign")]
#[command(about = "Sign exchange requests with HMAC-SHA256", long_about = None)]
struct Cli {
    /// Print compact instead of pretty JSON.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign a GET request from KEY=VALUE query parameters
    Get {
        /// Query parameters as KEY=VALUE
        #[arg(value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Sign a POST request over a raw JSON body
    Post {
        /// Request body, sent verbatim
        body: String,
    },
    /// Print a sample nonce (format demo only, not accepted by any gateway)
    Nonce,
    /// Report rotation status for a key
    KeyStatus {
        /// When the key was last rotated (RFC 3339)
        #[arg(long, value_parser = parse_rfc3339)]
        last_rotation: DateTime<Utc>,
    },
}

/// JSON printed for a signed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedOutput {
    method: &'static str,
    headers: BTreeMap<String, String>,
}

impl SignedOutput {
    fn new(method: &'static str, headers: &AuthHeaders) -> Self {
        Self {
            method,
            headers: headers.to_map(),
        }
    }
}

/// JSON printed for a sample nonce.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NonceOutput {
    nonce: String,
    /// Lifetime a gateway gives the nonces it issues.
    lifetime_secs: u64,
    /// Always `false`: the nonce is dropped when the process exits.
    usable: bool,
}

/// Initialize the tracing subscriber on stderr.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    Ok((key.to_owned(), value.to_owned()))
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp `{s}`: {e}"))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn run(cli: Cli, ctx: &AuthContext) -> Result<()> {
    let auth = ctx.authenticator();
    match cli.command {
        Commands::Get { params } => {
            let headers = auth
                .sign_outbound(&OutboundRequest::Get(params))
                .context("failed to sign GET request")?;
            print_json(&SignedOutput::new("GET", &headers), cli.compact)
        }
        Commands::Post { body } => {
            let headers = auth
                .sign_outbound(&OutboundRequest::Post(body))
                .context("failed to sign POST request")?;
            print_json(&SignedOutput::new("POST", &headers), cli.compact)
        }
        Commands::Nonce => {
            let output = NonceOutput {
                nonce: ctx.issue_nonce(),
                lifetime_secs: ctx.config().nonce_expiration_secs,
                usable: false,
            };
            print_json(&output, cli.compact)
        }
        Commands::KeyStatus { last_rotation } => {
            print_json(&ctx.key_status(last_rotation), cli.compact)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AuthConfig::from_env();
    init_tracing(&config.log_level)?;

    let ctx = AuthContext::init(
        config,
        Arc::new(EnvCredentialProvider::new()),
        Arc::new(SystemClock),
    )
    .context("failed to initialize auth context")?;
    info!("exgate-sign ready");

    let result = run(cli, &ctx);
    ctx.shutdown().await;
    result
}
