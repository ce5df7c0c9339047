//! Wiring & DI. Entry point: bootstrap adapters, inject into the desk, dispatch the CLI.
//! No business logic here.

use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tutoring_desk::adapters::cli::{Cli, Commands, execute};
use tutoring_desk::adapters::http::{AppState, create_router};
use tutoring_desk::adapters::identity::{GoTrueIdentity, MockIdentity};
use tutoring_desk::adapters::persistence::{MemoryStore, SqliteStore};
use tutoring_desk::ports::{IdentityPort, TutoringApi};
use tutoring_desk::shared::config::AppConfig;
use tutoring_desk::usecases::{DeskSettings, TutoringDesk};

/// How often `serve` sweeps overdue pending requests into `expired`.
const EXPIRY_SWEEP_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cli = Cli::parse();
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config not loaded, using defaults");
            AppConfig::default()
        }
    };
    let settings = DeskSettings::from_config(&cfg);

    // --- Identity: hosted service when configured, in-memory otherwise ---
    let identity: Arc<dyn IdentityPort> = if cfg.is_identity_configured() {
        let url = cfg.identity_url.clone().unwrap_or_default();
        info!(url = %url, "identity service enabled");
        Arc::new(GoTrueIdentity::new(
            url,
            cfg.identity_api_key.clone().unwrap_or_default(),
        ))
    } else {
        warn!("TUTORING_IDENTITY_URL / TUTORING_IDENTITY_API_KEY not set, using in-memory identity");
        Arc::new(MockIdentity::new())
    };

    // --- Store: one object implements every store port ---
    let desk = if cli.ephemeral {
        info!("ephemeral run: state is kept in memory only");
        TutoringDesk::wire(Arc::new(MemoryStore::new()), identity, settings)
    } else {
        let data_path = PathBuf::from(cfg.data_dir_or_default());
        let store = SqliteStore::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?;
        info!(path = %store.path().display(), "database opened");
        TutoringDesk::wire(Arc::new(store), identity, settings)
    };
    let api: Arc<dyn TutoringApi> = Arc::new(desk);

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.http_bind_or_default());
            serve(api, &bind).await
        }
        command => {
            let out = execute(api.as_ref(), command)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", out);
            Ok(())
        }
    }
}

/// Run the HTTP API until Ctrl-C, sweeping expired requests in the background.
async fn serve(api: Arc<dyn TutoringApi>, bind: &str) -> anyhow::Result<()> {
    let sweeper = Arc::clone(&api);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(EXPIRY_SWEEP_SECS));
        loop {
            tick.tick().await;
            if let Err(e) = sweeper.expire_overdue_requests().await {
                error!(error = %e, "expiry sweep failed");
            }
        }
    });

    let router = create_router(AppState { api });
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {}", bind, e))?;
    info!(addr = %bind, "HTTP API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await?;
    Ok(())
}
