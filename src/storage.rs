//! Persistence layer.
//!
//! Saves and loads the whole store as a JSON snapshot. A relational
//! backend can replace this later for transaction history queries, but a
//! single file covers the restart-survival requirement.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::store::StoreSnapshot;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "streambet_state.json";

/// Save a store snapshot to a JSON file.
pub fn save_state(snapshot: &StoreSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise store snapshot")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        wallets = snapshot.wallets.len(),
        bets = snapshot.bets.len(),
        "State saved"
    );
    Ok(())
}

/// Load a store snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<StoreSnapshot>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let snapshot: StoreSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        wallets = snapshot.wallets.len(),
        streams = snapshot.streams.len(),
        bets = snapshot.bets.len(),
        pending_events = snapshot.outbox.len(),
        "State loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use rust_decimal_macros::dec;

    fn temp_path() -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("streambet_test_state_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_path();
        let store = Store::new();
        let user_id = store.register_user("viewer1").unwrap();
        store
            .wallet(user_id)
            .unwrap()
            .lock()
            .unwrap()
            .deposit(dec!(75), "seed", "DEP-1")
            .unwrap();

        save_state(&store.snapshot().unwrap(), Some(&path)).unwrap();

        let loaded = load_state(Some(&path)).unwrap().unwrap();
        let restored = Store::from_snapshot(loaded);
        let balance = restored.wallet(user_id).unwrap().lock().unwrap().balance();
        assert_eq!(balance, dec!(75));
        assert!(restored.audit_all().unwrap());

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let path = "/tmp/streambet_nonexistent_state_12345.json";
        let loaded = load_state(Some(path)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_ledger_history_survives_restart() {
        let path = temp_path();
        let store = Store::new();
        let user_id = store.register_user("viewer1").unwrap();
        {
            let wallet = store.wallet(user_id).unwrap();
            let mut w = wallet.lock().unwrap();
            w.deposit(dec!(100), "seed", "DEP-1").unwrap();
            w.withdraw(dec!(30), "cash out", "WIT-1").unwrap();
        }

        save_state(&store.snapshot().unwrap(), Some(&path)).unwrap();
        let restored = Store::from_snapshot(load_state(Some(&path)).unwrap().unwrap());

        let wallet = restored.wallet(user_id).unwrap();
        let w = wallet.lock().unwrap();
        assert_eq!(w.balance(), dec!(70));
        assert_eq!(w.transaction_count(), 2);
        // Duplicate-reference guard still armed after restore.
        drop(w);
        let err = wallet
            .lock()
            .unwrap()
            .deposit(dec!(1), "replay", "DEP-1")
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_reference");

        delete_state(Some(&path)).unwrap();
    }
}
