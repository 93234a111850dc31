use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::AppState;
use common::{Config, ProductCatalog, RunMode};
use engine::{JobRunner, RecalcJob, SnapshotJob};
use memstore::ShadowCatalog;
use store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.mode, "repricerd starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("database migration failed")?;
    info!("Database ready");

    let sqlite = Arc::new(SqliteStore::new(pool));

    // ── Catalog (injected based on REPRICER_MODE) ─────────────────────────────
    let catalog: Arc<dyn ProductCatalog> = match cfg.mode {
        RunMode::Live => {
            info!("live mode — recalculated prices are applied to the catalog");
            sqlite.clone()
        }
        RunMode::DryRun => {
            info!("dry-run mode — recalculated prices are shadowed, catalog untouched");
            Arc::new(ShadowCatalog::new(sqlite.clone()))
        }
    };

    // ── Jobs + scheduler ──────────────────────────────────────────────────────
    let snapshot = SnapshotJob::new(sqlite.clone(), catalog.clone());
    let recalc = RecalcJob::new(sqlite.clone(), catalog.clone());
    let runner = Arc::new(JobRunner::new(snapshot, recalc));

    if cfg.run_on_startup {
        let today = chrono::Utc::now().date_naive();
        let (snapshot_run, recalc_run) = runner.run_once(today).await;
        if let Err(e) = snapshot_run {
            error!(error = %e, "startup snapshot run failed");
        }
        if let Err(e) = recalc_run {
            error!(error = %e, "startup recalculation run failed");
        }
    }
    tokio::spawn(runner.clone().run_daily());

    // ── Reporting API ─────────────────────────────────────────────────────────
    let state = AppState {
        store: sqlite.clone(),
        catalog,
        runner,
        mode: cfg.mode,
    };
    tokio::spawn(api::serve(state, cfg.api_port));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
