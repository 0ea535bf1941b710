use std::sync::Arc;

use anyhow::Context;
use shelfsync_api::{build_app_router, init_tracing, AppContext};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = shelfsync_infra::config::load().context("failed to load configuration")?;
    info!(addr = %config.server.addr, scheduler = config.scheduler.enabled, "configuration loaded");

    let ctx = Arc::new(AppContext::new(config).context("failed to initialise services")?);

    if ctx.has_proxy_source() {
        if let Err(error) = ctx.refresh_proxies().await {
            warn!(%error, "initial proxy refresh failed; continuing with static endpoints");
        }
    }

    let mut scheduler = ctx.scheduler();
    if ctx.config.scheduler.enabled {
        scheduler.start().await.context("failed to start sync scheduler")?;
    }

    let listener = tokio::net::TcpListener::bind(&ctx.config.server.addr)
        .await
        .with_context(|| format!("failed to bind {}", ctx.config.server.addr))?;
    info!(addr = %ctx.config.server.addr, "listening");

    axum::serve(listener, build_app_router(ctx.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped accepting connections, cleaning up");
    if scheduler.is_running() {
        if let Err(error) = scheduler.stop().await {
            warn!(%error, "scheduler did not stop cleanly");
        }
    }
    info!("graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        () = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
