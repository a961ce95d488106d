use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use lenstail_api::{GraphqlCatalogFetcher, OauthTokenProvider};
use lenstail_core::config::Config;
use lenstail_stream::{ConnectionManager, StreamSettings};
use lenstail_telemetry::{init_telemetry, TelemetryConfig, TracingEventSink};

/// Live-tail of occupancy counts and device status over GraphQL
/// subscriptions, with automatic reconnect.
#[derive(Debug, Parser)]
#[command(name = "lenstail", version)]
struct Args {
    /// Emit JSON log lines instead of human-readable output.
    #[arg(long)]
    json_logs: bool,
    /// Default log directive when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_telemetry(&TelemetryConfig {
        default_directive: args.log_level.clone(),
        json: args.json_logs,
    });

    // Missing configuration is the one failure that exits non-zero; once the
    // manager starts, every failure reschedules instead.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lenstail: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(ws = %config.ws_url, tenant = %config.tenant_id, "starting lenstail");

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("lenstail: http client: {e}");
            std::process::exit(2);
        }
    };

    let tokens = Arc::new(OauthTokenProvider::new(http.clone(), &config));
    let catalog = Arc::new(GraphqlCatalogFetcher::new(http, &config));
    let sink = Arc::new(TracingEventSink);

    let manager = ConnectionManager::new(
        config,
        StreamSettings::default(),
        tokens,
        catalog,
        sink,
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal_token.cancel();
        }
    });

    manager.run(shutdown).await;
}
