use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use citescope_adapters::build_registry;
use citescope_core::{AppConfig, FileConfig, RateLimiter};
use citescope_scheduler::{Merger, Scheduler};
use citescope_server::routes;
use citescope_server::AppState;
use citescope_store::Store;

#[derive(Parser)]
#[command(name = "citescope-server", about = "Citescope bibliometric aggregation server")]
struct Cli {
    /// Path to the INI config file.
    #[arg(long, default_value = "./config/citescope.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    tracing::info!("Starting citescope-server");

    let cli = Cli::parse();

    let config_path = cli.config.canonicalize().with_context(|| {
        format!("Config file not found: {}. Create one or specify --config <path>", cli.config.display())
    })?;
    let file_config = Arc::new(FileConfig::load(&config_path)?);
    tracing::info!(config = %config_path.display(), "Loaded config");

    let config = AppConfig::from_env()?;

    // Separate pools for HTTP handlers and the scheduler/merger background
    // work, mirroring the teacher's http_pool/worker_pool split.
    let http_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    let worker_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../../migrations").run(&http_pool).await?;
    tracing::info!("Migrations complete");

    let http_store = Arc::new(Store::new(http_pool));
    let worker_store = Arc::new(Store::new(worker_pool));

    let http_client = citescope_core::build_client()?;
    let registry = Arc::new(build_registry());

    let scheduler = Scheduler::new(worker_store.clone(), registry.clone(), http_client.clone());
    let scheduler_waker = scheduler.waker();
    let merger = Arc::new(Merger::new(worker_store.clone()));

    let state = Arc::new(AppState {
        store: http_store,
        registry,
        merger: merger.clone(),
        session_secret: config.session_secret,
        secure_cookies: file_config.www.secure,
        scheduler_waker,
        rate_limiter: RateLimiter::new(file_config.auth.fail_retry_delay),
        whitelist: file_config.auth.whitelist.clone(),
    });

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", file_config.www.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>());

    let crawler_enabled = file_config.storage.crawler;
    let scheduler_task = tokio::spawn(async move {
        if crawler_enabled {
            scheduler.run().await;
        } else {
            tracing::info!("crawler disabled by config, scheduler idle");
            std::future::pending::<()>().await;
        }
    });

    let merge_task = tokio::spawn(async move { run_periodic_merge(worker_store, merger).await });

    tokio::select! {
        result = server => { result?; }
        _ = scheduler_task => {}
        _ = merge_task => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}

/// Sweeps every user with at least one source on a fixed interval
/// (spec.md §4.3 "default every 24h"), independent of on-demand
/// `/rest/force-merge` calls.
async fn run_periodic_merge(store: Arc<Store>, merger: Arc<Merger>) {
    let mut interval = tokio::time::interval(citescope_scheduler::merger::PERIODIC_INTERVAL);
    loop {
        interval.tick().await;
        match store.all_user_ids().await {
            Ok(user_ids) => merger.run_all_due(&user_ids).await,
            Err(err) => tracing::error!(error = %err, "failed to list users for periodic merge"),
        }
    }
}
