//! augur binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Install tracing
//! 3. Build the narrator, session store and turn orchestrator
//! 4. Start the idle-session sweep when expiry is enabled
//! 5. Serve the axum API

mod cli;

use std::sync::Arc;
use std::time::Duration;

use augur_api::routes;
use augur_api::state::AppState;
use augur_chat::SessionStore;
use augur_core::config::AugurConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::CliArgs;

/// Periodically delete sessions idle longer than `idle`.
async fn sweep_loop(store: Arc<SessionStore>, idle: chrono::Duration, every: Duration) {
    tracing::info!(
        idle_minutes = idle.num_minutes(),
        interval_secs = every.as_secs(),
        "Idle session sweep started"
    );
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match store.purge_expired(idle) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(removed = n, "Idle sessions swept"),
            Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = AugurConfig::load_or_default(&config_file);

    // Tracing.
    let level = args.resolve_log_level(std::env::var("RUST_LOG").ok(), &config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting augur v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    config.server.port = args.resolve_port(config.server.port);
    config.server.host = args.resolve_host(&config.server.host);

    let state = AppState::from_config(config.clone())?;
    tracing::info!(
        narrator = %config.narrator.provider,
        history_window = config.session.history_window,
        "Turn orchestrator ready"
    );

    // === Background tasks ===

    if config.session.idle_timeout_minutes > 0 {
        let store = Arc::clone(state.store());
        let idle = chrono::Duration::minutes(i64::from(config.session.idle_timeout_minutes));
        let every = Duration::from_secs(config.session.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            sweep_loop(store, idle, every).await;
        });
    } else {
        tracing::info!("Session expiry disabled");
    }

    // === API server ===

    if let Err(e) = routes::start_server(&config, state).await {
        tracing::error!(error = %e, "API server stopped");
        tracing::error!("If the port is taken, try: augur --port {}", config.server.port.saturating_add(1));
        return Err(e.into());
    }

    Ok(())
}
