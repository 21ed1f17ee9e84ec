use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod server;
use server::ServerState;

use droidrelay_core::config::RelayConfig;
use droidrelay_core::executor::CommandExecutor;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "droidrelay-server")]
#[command(about = "HTTP relay forwarding automation commands to Android devices")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000", env = "DROIDRELAY_BIND")]
    bind: SocketAddr,

    /// Device used when a request omits device_id
    #[arg(short, long, env = "DROIDRELAY_DEVICE")]
    device: Option<String>,

    /// Path to the adb executable
    #[arg(long, env = "DROIDRELAY_ADB")]
    adb_path: Option<String>,

    /// Forward actions to a remote automation service instead of local adb
    #[arg(long, env = "DROIDRELAY_REMOTE_URL")]
    remote_url: Option<String>,

    /// Bearer token for the remote automation service
    #[arg(long, env = "DROIDRELAY_REMOTE_API_KEY", hide_env_values = true)]
    remote_api_key: Option<String>,

    /// Require callers to send this bearer token
    #[arg(long, env = "DROIDRELAY_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Write logs to droidrelay-server.log in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    /// Layers command-line values over the persisted config.
    fn merge_into(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(device) = &self.device {
            config.default_device_id = device.clone();
        }
        if let Some(adb_path) = &self.adb_path {
            config.adb_path = adb_path.clone();
        }
        if self.remote_url.is_some() {
            config.remote_url = self.remote_url.clone();
        }
        if self.remote_api_key.is_some() {
            config.remote_api_key = self.remote_api_key.clone();
        }
        if self.auth_token.is_some() {
            config.auth_token = self.auth_token.clone();
        }
        config
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&args.log_dir, args.log_format) {
        (Some(dir), LogFormat::Json) => {
            let file_appender = tracing_appender::rolling::never(dir, "droidrelay-server.log");
            builder.json().with_writer(file_appender).init();
        }
        (Some(dir), LogFormat::Text) => {
            let file_appender = tracing_appender::rolling::never(dir, "droidrelay-server.log");
            builder.with_writer(file_appender).with_ansi(false).init();
        }
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).init(),
        (None, LogFormat::Text) => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args);

    let config = args.merge_into(RelayConfig::load());
    let executor = CommandExecutor::from_config(config.driver_config());

    info!(
        bind = %args.bind,
        backend = executor.driver().name(),
        device = %config.default_device_id,
        auth = config.auth_token.is_some(),
        "Starting droidrelay-server"
    );

    let state = ServerState::new(executor, config.default_device_id.clone())
        .with_auth_token(config.auth_token.clone());
    let app = server::router(Arc::new(state));

    let listener = TcpListener::bind(args.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            info!(error = %e, "SIGTERM handler unavailable; waiting for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }
}
