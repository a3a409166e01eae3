//! # Config Store
//!
//! Persistence for the authoritative config and device set.
//!
//! ## Full-State Replace
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   replace_all(plan)                                     │
//! │                                                                         │
//! │  ┌─────────────────────── SINGLE TRANSACTION ──────────────────────┐   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE global_config SET scan_interval = ?  (current row)   │   │
//! │  │                                                                 │   │
//! │  │  2. keep = plan.surviving_ids()                                 │   │
//! │  │                                                                 │   │
//! │  │  3. DELETE FROM device WHERE id NOT IN (keep)                   │   │
//! │  │     (keep = ∅ → DELETE FROM device)                             │   │
//! │  │                                                                 │   │
//! │  │  4. Existing → UPDATE device ... WHERE id = ?                   │   │
//! │  │     (0 rows affected → NotFound, whole replace rolls back)      │   │
//! │  │     New      → INSERT INTO device ... (SQLite assigns id)       │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← all or nothing; dropping the transaction rolls it back        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use roslinki_core::{
    Device, DeviceFields, DeviceId, FullStateSnapshot, GlobalConfig, ReconcilePlan,
    SubmittedDevice,
};

/// What a `replace_all` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Ids assigned to `New` devices, in submission order.
    pub inserted: Vec<DeviceId>,
    /// Number of `Existing` devices updated in place.
    pub updated: usize,
    /// Number of persisted devices removed.
    pub deleted: u64,
}

/// Row shape of the device read with its derived last value.
#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: i64,
    name: String,
    sensor_pin: i32,
    pump_pin: i32,
    threshold: i32,
    last_value: Option<i32>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            name: row.name,
            sensor_pin: row.sensor_pin,
            pump_pin: row.pump_pin,
            threshold: row.threshold,
            last_value: row.last_value,
        }
    }
}

/// Repository for the config row and the device table.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    /// Creates a new ConfigStore.
    pub fn new(pool: SqlitePool) -> Self {
        ConfigStore { pool }
    }

    /// Reads config plus every device with its last sensor value.
    ///
    /// Both reads run in one transaction, so a concurrent `replace_all`
    /// is seen entirely or not at all. Devices are ordered by id.
    pub async fn read_snapshot(&self) -> DbResult<FullStateSnapshot> {
        let mut tx = self.pool.begin().await?;

        let config = read_config(&mut tx).await?;

        let rows: Vec<DeviceRow> = sqlx::query_as(
            r#"
            SELECT
                d.id,
                d.name,
                d.sensor_pin,
                d.pump_pin,
                d.threshold,
                (
                    SELECT s.value
                    FROM sensor_logs s
                    WHERE s.device_id = d.id
                    ORDER BY s.timestamp DESC, s.id DESC
                    LIMIT 1
                ) AS last_value
            FROM device d
            ORDER BY d.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FullStateSnapshot {
            config,
            devices: rows.into_iter().map(Device::from).collect(),
        })
    }

    /// Atomically replaces the config and the whole device set with a
    /// validated plan.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - an `Existing` id matches no row; nothing is changed
    pub async fn replace_all(&self, plan: &ReconcilePlan) -> DbResult<ReplaceOutcome> {
        let config = plan.config();
        let devices = plan.devices();
        let surviving = plan.surviving_ids();

        debug!(
            scan_interval = config.scan_interval,
            devices = devices.len(),
            keep = surviving.len(),
            "Replacing full state"
        );

        let mut tx = self.pool.begin().await?;

        write_config(&mut tx, config).await?;

        let deleted = delete_except(&mut tx, surviving).await?;

        let mut outcome = ReplaceOutcome {
            deleted,
            ..ReplaceOutcome::default()
        };

        for device in devices {
            match device {
                SubmittedDevice::Existing { id, fields } => {
                    update_device(&mut tx, *id, fields).await?;
                    outcome.updated += 1;
                }
                SubmittedDevice::New(fields) => {
                    let id = insert_device(&mut tx, fields).await?;
                    outcome.inserted.push(id);
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            inserted = outcome.inserted.len(),
            updated = outcome.updated,
            deleted = outcome.deleted,
            "Full state replaced"
        );

        Ok(outcome)
    }
}

// =============================================================================
// Statement Helpers
// =============================================================================

async fn read_config(conn: &mut SqliteConnection) -> DbResult<GlobalConfig> {
    let scan_interval: Option<i32> =
        sqlx::query_scalar("SELECT scan_interval FROM global_config ORDER BY id DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    Ok(scan_interval
        .map(|scan_interval| GlobalConfig { scan_interval })
        .unwrap_or_default())
}

async fn write_config(conn: &mut SqliteConnection, config: &GlobalConfig) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE global_config
        SET scan_interval = ?1
        WHERE id = (SELECT MAX(id) FROM global_config)
        "#,
    )
    .bind(config.scan_interval)
    .execute(&mut *conn)
    .await?;

    // Seed row missing (table emptied by hand): recreate it.
    if result.rows_affected() == 0 {
        sqlx::query("INSERT INTO global_config (scan_interval) VALUES (?1)")
            .bind(config.scan_interval)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn delete_except(conn: &mut SqliteConnection, keep: &BTreeSet<DeviceId>) -> DbResult<u64> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM device");

    if !keep.is_empty() {
        query.push(" WHERE id NOT IN (");
        let mut ids = query.separated(", ");
        for id in keep {
            ids.push_bind(id.get());
        }
        ids.push_unseparated(")");
    }

    let result = query.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

async fn update_device(
    conn: &mut SqliteConnection,
    id: DeviceId,
    fields: &DeviceFields,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE device SET
            name = ?2,
            sensor_pin = ?3,
            pump_pin = ?4,
            threshold = ?5
        WHERE id = ?1
        "#,
    )
    .bind(id.get())
    .bind(&fields.name)
    .bind(fields.sensor_pin)
    .bind(fields.pump_pin)
    .bind(fields.threshold)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Device", id));
    }

    Ok(())
}

async fn insert_device(conn: &mut SqliteConnection, fields: &DeviceFields) -> DbResult<DeviceId> {
    let result = sqlx::query(
        r#"
        INSERT INTO device (name, sensor_pin, pump_pin, threshold)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&fields.name)
    .bind(fields.sensor_pin)
    .bind(fields.pump_pin)
    .bind(fields.threshold)
    .execute(&mut *conn)
    .await?;

    let raw = result.last_insert_rowid();
    DeviceId::new(raw).ok_or_else(|| DbError::Internal(format!("invalid rowid {}", raw)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{TimeZone, Utc};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn fields(name: &str, sensor_pin: i32, pump_pin: i32, threshold: i32) -> DeviceFields {
        DeviceFields {
            name: name.to_string(),
            sensor_pin,
            pump_pin,
            threshold,
        }
    }

    fn config(scan_interval: i32) -> GlobalConfig {
        GlobalConfig { scan_interval }
    }

    impl ConfigStore {
        async fn replace_parts(
            &self,
            config: &GlobalConfig,
            devices: &[SubmittedDevice],
        ) -> DbResult<ReplaceOutcome> {
            let devices = devices
                .iter()
                .map(|device| {
                    let fields = device.fields();
                    Device {
                        id: device.id().map_or(0, |id| id.get()),
                        name: fields.name.clone(),
                        sensor_pin: fields.sensor_pin,
                        pump_pin: fields.pump_pin,
                        threshold: fields.threshold,
                        last_value: None,
                    }
                })
                .collect();
            let plan = ReconcilePlan::from_snapshot(&FullStateSnapshot {
                config: *config,
                devices,
            })
            .unwrap();
            self.replace_all(&plan).await
        }
    }

    fn resubmit(snapshot: &FullStateSnapshot) -> Vec<SubmittedDevice> {
        snapshot
            .devices
            .iter()
            .map(|d| SubmittedDevice::from_wire(d).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_fresh_store_has_seeded_config() {
        let db = setup().await;

        let snapshot = db.config_store().read_snapshot().await.unwrap();
        assert_eq!(snapshot.config.scan_interval, 5000);
        assert!(snapshot.devices.is_empty());
    }

    #[tokio::test]
    async fn test_new_devices_get_fresh_ids() {
        let db = setup().await;
        let store = db.config_store();

        let devices: Vec<SubmittedDevice> = (0..3)
            .map(|i| SubmittedDevice::New(fields("Basil", i, i + 10, 400)))
            .collect();

        let outcome = store.replace_parts(&config(5000), &devices).await.unwrap();
        assert_eq!(outcome.inserted.len(), 3);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.deleted, 0);

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.devices.len(), 3);
        let ids: BTreeSet<i64> = snapshot.devices.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id > 0));
    }

    #[tokio::test]
    async fn test_basil_scenario() {
        let db = setup().await;
        let store = db.config_store();

        store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::New(fields("Basil", 2, 3, 400))],
            )
            .await
            .unwrap();

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.config.scan_interval, 5000);
        assert_eq!(snapshot.devices.len(), 1);

        let basil = &snapshot.devices[0];
        assert!(basil.id > 0);
        assert_eq!(basil.name, "Basil");
        assert_eq!(basil.sensor_pin, 2);
        assert_eq!(basil.pump_pin, 3);
        assert_eq!(basil.threshold, 400);
        assert_eq!(basil.last_value, None);

        db.telemetry().record_sensor(basil.id, 550, None).await.unwrap();

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.devices[0].last_value, Some(550));
    }

    #[tokio::test]
    async fn test_resubmitting_snapshot_is_idempotent() {
        let db = setup().await;
        let store = db.config_store();

        store
            .replace_parts(
                &config(3000),
                &[
                    SubmittedDevice::New(fields("Basil", 2, 3, 400)),
                    SubmittedDevice::New(fields("Mint", 4, 5, 350)),
                ],
            )
            .await
            .unwrap();

        let before = store.read_snapshot().await.unwrap();
        db.telemetry().record_sensor(before.devices[0].id, 120, None).await.unwrap();
        let before = store.read_snapshot().await.unwrap();

        let outcome = store
            .replace_parts(&before.config, &resubmit(&before))
            .await
            .unwrap();
        assert!(outcome.inserted.is_empty());
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.deleted, 0);

        let after = store.read_snapshot().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_replace_deletes_unlisted_and_updates_in_place() {
        let db = setup().await;
        let store = db.config_store();

        let first = store
            .replace_parts(
                &config(5000),
                &[
                    SubmittedDevice::New(fields("Basil", 2, 3, 400)),
                    SubmittedDevice::New(fields("Mint", 4, 5, 350)),
                    SubmittedDevice::New(fields("Thyme", 6, 7, 300)),
                ],
            )
            .await
            .unwrap();
        let (basil, mint, thyme) = (first.inserted[0], first.inserted[1], first.inserted[2]);

        let outcome = store
            .replace_parts(
                &config(2000),
                &[
                    SubmittedDevice::Existing {
                        id: thyme,
                        fields: fields("Thyme", 6, 7, 250),
                    },
                    SubmittedDevice::New(fields("Sage", 8, 9, 500)),
                    SubmittedDevice::Existing {
                        id: basil,
                        fields: fields("Basil", 2, 3, 420),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.inserted.len(), 1);

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.config.scan_interval, 2000);
        assert!(snapshot.device(mint).is_none());
        assert_eq!(snapshot.device(thyme).unwrap().threshold, 250);
        assert_eq!(snapshot.device(basil).unwrap().threshold, 420);

        // ordered by id, the new device last
        let ids: Vec<i64> = snapshot.devices.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![basil.get(), thyme.get(), outcome.inserted[0].get()]);
        assert!(outcome.inserted[0] > thyme);
    }

    #[tokio::test]
    async fn test_empty_device_list_deletes_everything() {
        let db = setup().await;
        let store = db.config_store();

        store
            .replace_parts(
                &config(5000),
                &[
                    SubmittedDevice::New(fields("Basil", 2, 3, 400)),
                    SubmittedDevice::New(fields("Mint", 4, 5, 350)),
                ],
            )
            .await
            .unwrap();

        let outcome = store.replace_parts(&config(5000), &[]).await.unwrap();
        assert_eq!(outcome.deleted, 2);

        let snapshot = store.read_snapshot().await.unwrap();
        assert!(snapshot.devices.is_empty());
    }

    #[tokio::test]
    async fn test_stale_id_rolls_back_everything() {
        let db = setup().await;
        let store = db.config_store();

        let first = store
            .replace_parts(
                &config(5000),
                &[
                    SubmittedDevice::New(fields("Basil", 2, 3, 400)),
                    SubmittedDevice::New(fields("Mint", 4, 5, 350)),
                ],
            )
            .await
            .unwrap();
        let before = store.read_snapshot().await.unwrap();

        // Mint is dropped and id 999 was never assigned
        let err = store
            .replace_parts(
                &config(9000),
                &[
                    SubmittedDevice::Existing {
                        id: first.inserted[0],
                        fields: fields("Basil", 2, 3, 1),
                    },
                    SubmittedDevice::New(fields("Sage", 8, 9, 500)),
                    SubmittedDevice::Existing {
                        id: DeviceId::new(999).unwrap(),
                        fields: fields("Ghost", 0, 0, 0),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let after = store.read_snapshot().await.unwrap();
        assert_eq!(after.config.scan_interval, 5000);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_deleted_ids_are_never_reused() {
        let db = setup().await;
        let store = db.config_store();

        let first = store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::New(fields("Basil", 2, 3, 400))],
            )
            .await
            .unwrap();
        store.replace_parts(&config(5000), &[]).await.unwrap();

        let second = store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::New(fields("Basil", 2, 3, 400))],
            )
            .await
            .unwrap();
        assert!(second.inserted[0] > first.inserted[0]);

        // The old id cannot be brought back by resubmitting it
        let err = store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::Existing {
                    id: first.inserted[0],
                    fields: fields("Basil", 2, 3, 400),
                }],
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_last_value_prefers_latest_timestamp_then_id() {
        let db = setup().await;
        let store = db.config_store();
        let telemetry = db.telemetry();

        let outcome = store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::New(fields("Basil", 2, 3, 400))],
            )
            .await
            .unwrap();
        let id = outcome.inserted[0].get();

        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        telemetry.record_sensor(id, 100, Some(t2)).await.unwrap();
        // Arrives later but was measured earlier
        telemetry.record_sensor(id, 200, Some(t1)).await.unwrap();

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.devices[0].last_value, Some(100));

        // Same timestamp: highest log id wins
        telemetry.record_sensor(id, 300, Some(t2)).await.unwrap();
        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.devices[0].last_value, Some(300));
    }

    #[tokio::test]
    async fn test_pump_events_do_not_change_last_value() {
        let db = setup().await;
        let store = db.config_store();

        let outcome = store
            .replace_parts(
                &config(5000),
                &[SubmittedDevice::New(fields("Basil", 2, 3, 400))],
            )
            .await
            .unwrap();
        let id = outcome.inserted[0].get();

        db.telemetry().record_pump(id, 1, None).await.unwrap();

        let snapshot = store.read_snapshot().await.unwrap();
        assert_eq!(snapshot.devices[0].last_value, None);
    }

    #[tokio::test]
    async fn test_readers_see_pre_or_post_replace_state() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("gateway.db")).max_connections(4))
            .await
            .unwrap();
        let store = db.config_store();

        let small: Vec<SubmittedDevice> = (0..2)
            .map(|i| SubmittedDevice::New(fields("A", i, i, 1)))
            .collect();
        let large: Vec<SubmittedDevice> = (0..20)
            .map(|i| SubmittedDevice::New(fields("B", i, i, 2)))
            .collect();

        store.replace_parts(&config(1000), &small).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    store.replace_parts(&config(2000), &large).await.unwrap();
                    store.replace_parts(&config(1000), &small).await.unwrap();
                }
            })
        };

        for _ in 0..50 {
            let snapshot = store.read_snapshot().await.unwrap();
            match snapshot.config.scan_interval {
                1000 => {
                    assert_eq!(snapshot.devices.len(), 2);
                    assert!(snapshot.devices.iter().all(|d| d.name == "A"));
                }
                2000 => {
                    assert_eq!(snapshot.devices.len(), 20);
                    assert!(snapshot.devices.iter().all(|d| d.name == "B"));
                }
                other => panic!("unexpected scan interval {}", other),
            }
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
        db.close().await;
    }
}
