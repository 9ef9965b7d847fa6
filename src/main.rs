//! STREAMBET — live-stream wagering and wallet ledger core.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores state from disk (or creates fresh), and runs the event
//! delivery and persistence loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use streambet::config;
use streambet::engine::Engine;
use streambet::oracle::{StubOracle, VerificationService};
use streambet::storage;
use streambet::store::Store;

const BANNER: &str = r#"
 ____ _____ ____  _____    _    __  __ ____  _____ _____
/ ___|_   _|  _ \| ____|  / \  |  \/  | __ )| ____|_   _|
\___ \ | | | |_) |  _|   / _ \ | |\/| |  _ \|  _|   | |
 ___) || | |  _ <| |___ / ___ \| |  | | |_) | |___  | |
|____/ |_| |_| \_\_____/_/   \_\_|  |_|____/|_____| |_|

  Live-Stream Wagering Core
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        platform = %cfg.platform.name,
        signup_balance = %cfg.platform.signup_balance,
        currency = %cfg.platform.currency,
        "STREAMBET starting up"
    );

    // -- Restore or create state -----------------------------------------

    let state_file = cfg.storage.state_file.clone();
    let store = match storage::load_state(Some(&state_file))? {
        Some(snapshot) => {
            let store = Store::from_snapshot(snapshot);
            info!(
                total_balance = %store.total_balance()?,
                "Resumed from saved state"
            );
            store
        }
        None => {
            info!("Fresh start");
            Store::new()
        }
    };
    let store = Arc::new(store);

    if !store.audit_all()? {
        anyhow::bail!("ledger audit failed on restored state");
    }

    // -- Initialise components -------------------------------------------

    let engine = Engine::new(Arc::clone(&store), &cfg);
    let _verifier = VerificationService::new(
        Arc::clone(&store),
        engine.settlement.clone(),
        Arc::new(StubOracle::new()),
        cfg.oracle.clone(),
    );

    // -- Delivery and persistence loop -----------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(5));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering delivery loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let entries = store.drain_events()?;
                for entry in &entries {
                    info!(
                        event = entry.event.name(),
                        stream_id = %entry.event.stream_id(),
                        payload = %serde_json::to_string(&entry.event)?,
                        "Event delivered"
                    );
                }
                if !entries.is_empty() {
                    if let Err(e) = storage::save_state(&store.snapshot()?, Some(&state_file)) {
                        error!(error = %e, "Failed to save state");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final state
    storage::save_state(&store.snapshot()?, Some(&state_file))?;
    info!(
        total_balance = %store.total_balance()?,
        "STREAMBET shut down cleanly."
    );

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("streambet=info"));

    let json_logging = std::env::var("STREAMBET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
