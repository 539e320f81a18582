use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use euk_gateway::backend::BackendClient;
use euk_gateway::config::Args;
use euk_gateway::governor::RequestGovernor;
use euk_gateway::handlers::router;
use euk_gateway::rate_limit::RateLimiter;
use euk_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // parse cli arguments
    let args = Args::parse();

    let governor = RequestGovernor::new(args.governor_config());
    let backend = BackendClient::new(&args.backend_url, args.backend_timeout(), governor.clone());

    let state = Arc::new(AppState {
        backend,
        rate_limiter: RateLimiter::new(args.rate_limit_config()),
        mock_fallback: args.mock_fallback,
    });

    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(port = args.port, "Gateway running");
    info!(backend = %state.backend.base_url(), "Forwarding to EUK backend");
    info!(
        max = args.rate_limit_max,
        window_ms = args.rate_limit_window_ms,
        "Rate limit per client"
    );
    info!(
        max_concurrent = args.max_concurrent,
        batch_delay_ms = args.batch_delay_ms,
        "Outbound request batching"
    );
    if args.mock_fallback {
        info!("Mock fallback enabled");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let dropped = governor.queue_length();
    governor.clear();
    info!(dropped, "Gateway stopped");
    Ok(())
}

// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
