//! OssGate Server - direct-upload policy issuance and callback verification.
//!
//! Clients call `POST /oss/policy` for a signed upload policy, upload straight
//! to the storage service, and the storage service then calls
//! `POST /oss/callback`, which is accepted only with a valid RSA signature.
//!
//! # Usage
//!
//! ```text
//! OSS_ACCESS_KEY_ID=... OSS_ACCESS_KEY_SECRET=... ossgate-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:9100` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `OSS_ACCESS_KEY_ID` | *(required)* | Access key id |
//! | `OSS_ACCESS_KEY_SECRET` | *(required)* | Access key secret |
//! | `OSS_ENDPOINT` | *(empty)* | Storage endpoint |
//! | `OSS_BUCKET` | *(empty)* | Bucket name |
//! | `OSS_UPLOAD_DIR` | *(empty)* | Root directory for uploaded keys |
//! | `OSS_HOST` | *(empty)* | Upload host returned to clients |
//! | `OSS_HOST_ALIASES` | *(empty)* | Comma-separated alternate public hosts |
//! | `OSS_CALLBACK_URL` | *(empty)* | URL the storage service calls back |
//! | `OSS_PUB_KEY_HOSTS` | `gosspublic.alicdn.com` | Hosts trusted to serve callback public keys |
//! | `OSS_PUB_KEY_TIMEOUT_SECS` | `5` | Public key fetch timeout |
//! | `OSS_PUB_KEY_CACHE_TTL_SECS` | `300` | Public key cache TTL (`0` disables) |

mod gateway;
mod handler;
mod service;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use ossgate_auth::{CallbackVerifier, PolicyIssuer};
use ossgate_core::OssConfig;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::gateway::GatewayService;

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
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
        .init();

    Ok(())
}

/// Build the gateway from configuration, failing on incomplete credentials.
fn build_gateway(config: &OssConfig) -> Result<GatewayService> {
    let issuer = PolicyIssuer::from_config(config).context("invalid OSS access key")?;
    let verifier =
        CallbackVerifier::from_config(config).context("failed to build public key client")?;
    Ok(GatewayService::new(issuer, verifier))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: GatewayService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Succeeds if the response is 200 OK and reports the server as running.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = OssConfig::from_env().context("invalid configuration")?;

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    let gateway = build_gateway(&config)?;

    if config.callback_url.is_empty() {
        warn!("OSS_CALLBACK_URL is not set, issued policies carry an empty callback url");
    }

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        access_key_id = %config.access_key_id,
        bucket = %config.bucket,
        host = %config.host,
        upload_dir = %config.upload_dir,
        pub_key_hosts = ?config.pub_key_hosts,
        version = VERSION,
        "starting OssGate Server",
    );

    serve(listener, gateway).await
}
