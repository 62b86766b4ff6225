use anyhow::{Context, Result};
use clap::Parser;
use heatmap_server::services::interpolation::{Capabilities, SurfaceEstimator};
use heatmap_server::services::store::PgMeasurementStore;
use heatmap_server::{cli, config, db, openapi, routes, state};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind heatmap-server listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind heatmap-server listener on {addr}"))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!(
            "{}",
            serde_json::to_string_pretty(&openapi::openapi_json())?
        );
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::HeatmapConfig::from_env()?;
    let pool = db::connect_lazy(&config.database_url, config.db_max_connections)?;

    let capabilities = Capabilities::detect(config.enable_scattered);
    if !capabilities.scattered {
        tracing::warn!("scattered interpolation disabled; method=grid will answer 501");
    }
    if config.excluded_station_codes.is_empty() {
        tracing::info!("no stations excluded from heatmap queries");
    }

    let state = state::AppState {
        config: config.clone(),
        db: pool.clone(),
        store: Arc::new(PgMeasurementStore::new(pool)),
        estimator: SurfaceEstimator::new(capabilities),
    };

    let app = routes::router(state).layer(CorsLayer::permissive());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(
        addr = %addr,
        scattered = capabilities.scattered,
        excluded_stations = config.excluded_station_codes.len(),
        "heatmap-server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
