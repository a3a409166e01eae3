//! # Reconciler
//!
//! Turns an operator snapshot into one atomic store replace.
//!
//! ```text
//! FullStateSnapshot ──► ReconcilePlan::from_snapshot ──► ConfigStore::replace_all
//!                        (validation, no I/O)             (one transaction)
//! ```

use tracing::info;

use crate::error::SyncResult;
use roslinki_core::{FullStateSnapshot, ReconcilePlan};
use roslinki_db::{ConfigStore, ReplaceOutcome};

#[derive(Debug, Clone)]
pub struct Reconciler {
    store: ConfigStore,
}

impl Reconciler {
    pub fn new(store: ConfigStore) -> Self {
        Reconciler { store }
    }

    /// Validates and persists a full snapshot.
    ///
    /// Validation failures return before the store is touched. Storage
    /// failures leave the previous state in place.
    pub async fn apply(&self, snapshot: &FullStateSnapshot) -> SyncResult<ReplaceOutcome> {
        let plan = ReconcilePlan::from_snapshot(snapshot)?;

        let outcome = self.store.replace_all(&plan).await?;

        info!(
            scan_interval = plan.config().scan_interval,
            inserted = outcome.inserted.len(),
            updated = outcome.updated,
            deleted = outcome.deleted,
            "State reconciled"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roslinki_core::{Device, GlobalConfig};
    use roslinki_db::{Database, DbConfig};

    fn device(id: i64, name: &str) -> Device {
        Device {
            id,
            name: name.to_string(),
            sensor_pin: 1,
            pump_pin: 2,
            threshold: 300,
            last_value: None,
        }
    }

    async fn setup() -> (Database, Reconciler) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let reconciler = Reconciler::new(db.config_store());
        (db, reconciler)
    }

    #[tokio::test]
    async fn test_apply_persists_snapshot() {
        let (db, reconciler) = setup().await;

        let snapshot = FullStateSnapshot {
            config: GlobalConfig { scan_interval: 2000 },
            devices: vec![device(0, "Basil"), device(0, "Mint")],
        };
        let outcome = reconciler.apply(&snapshot).await.unwrap();
        assert_eq!(outcome.inserted.len(), 2);

        let stored = db.config_store().read_snapshot().await.unwrap();
        assert_eq!(stored.config.scan_interval, 2000);
        assert_eq!(stored.devices.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_leaves_store_untouched() {
        let (db, reconciler) = setup().await;

        let snapshot = FullStateSnapshot {
            config: GlobalConfig { scan_interval: 0 },
            devices: vec![device(0, "Basil")],
        };
        let err = reconciler.apply(&snapshot).await.unwrap_err();
        assert!(err.is_validation());

        let stored = db.config_store().read_snapshot().await.unwrap();
        assert_eq!(stored.config.scan_interval, 5000);
        assert!(stored.devices.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_a_conflict() {
        let (_db, reconciler) = setup().await;

        let snapshot = FullStateSnapshot {
            config: GlobalConfig { scan_interval: 1000 },
            devices: vec![device(42, "Ghost")],
        };
        let err = reconciler.apply(&snapshot).await.unwrap_err();
        assert!(err.is_storage());
        assert!(err.is_conflict());
    }
}
