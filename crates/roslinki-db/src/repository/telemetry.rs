//! # Telemetry Repository
//!
//! Append-only sensor and pump logs.
//!
//! Each record is a single `INSERT`. There is no foreign key to `device`:
//! readings from unconfigured or deleted devices are kept.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use roslinki_core::telemetry::{normalize_pump_action, resolve_timestamp};
use roslinki_core::{PumpLogEntry, SensorLogEntry};

/// Repository for telemetry log appends.
#[derive(Debug, Clone)]
pub struct TelemetryRepository {
    pool: SqlitePool,
}

impl TelemetryRepository {
    /// Creates a new TelemetryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TelemetryRepository { pool }
    }

    /// Appends a moisture reading.
    ///
    /// ## Arguments
    /// * `device_id` - Producer's device id (need not be configured)
    /// * `value` - Raw sensor value
    /// * `timestamp` - Producer clock; missing or zero means "now"
    pub async fn record_sensor(
        &self,
        device_id: i64,
        value: i32,
        timestamp: Option<DateTime<Utc>>,
    ) -> DbResult<SensorLogEntry> {
        let timestamp = resolve_timestamp(timestamp, Utc::now());

        let result = sqlx::query(
            "INSERT INTO sensor_logs (device_id, value, timestamp) VALUES (?1, ?2, ?3)",
        )
        .bind(device_id)
        .bind(value)
        .bind(stored_timestamp(&timestamp))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, device_id, value, "Sensor reading recorded");

        Ok(SensorLogEntry {
            id,
            device_id,
            value,
            timestamp,
        })
    }

    /// Appends a pump state change. Any nonzero `action` is stored as on.
    pub async fn record_pump(
        &self,
        device_id: i64,
        action: i32,
        timestamp: Option<DateTime<Utc>>,
    ) -> DbResult<PumpLogEntry> {
        let timestamp = resolve_timestamp(timestamp, Utc::now());
        let is_on = normalize_pump_action(action);

        let result = sqlx::query(
            "INSERT INTO pump_logs (device_id, action, timestamp) VALUES (?1, ?2, ?3)",
        )
        .bind(device_id)
        .bind(i32::from(is_on))
        .bind(stored_timestamp(&timestamp))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, device_id, is_on, "Pump event recorded");

        Ok(PumpLogEntry {
            id,
            device_id,
            is_on,
            timestamp,
        })
    }
}

/// Fixed-width UTC text form: lexicographic order is chronological order.
fn stored_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_record_sensor_for_unknown_device() {
        let db = setup().await;

        let entry = db.telemetry().record_sensor(42, 550, None).await.unwrap();
        assert!(entry.id > 0);
        assert_eq!(entry.device_id, 42);
        assert_eq!(entry.value, 550);
    }

    #[tokio::test]
    async fn test_missing_timestamp_uses_gateway_clock() {
        let db = setup().await;

        let before = Utc::now() - chrono::Duration::seconds(1);
        let entry = db.telemetry().record_sensor(1, 10, None).await.unwrap();
        assert!(entry.timestamp >= before);

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let entry = db.telemetry().record_pump(1, 1, Some(epoch)).await.unwrap();
        assert!(entry.timestamp >= before);
    }

    #[tokio::test]
    async fn test_pump_action_is_stored_as_flag() {
        let db = setup().await;
        let telemetry = db.telemetry();

        let entry = telemetry.record_pump(3, 7, None).await.unwrap();
        assert!(entry.is_on);

        let stored: i32 = sqlx::query_scalar("SELECT action FROM pump_logs WHERE id = ?1")
            .bind(entry.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, 1);

        let entry = telemetry.record_pump(3, 0, None).await.unwrap();
        assert!(!entry.is_on);
    }

    #[test]
    fn test_stored_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let frac = Utc.timestamp_millis_opt(whole.timestamp_millis() + 500).unwrap();

        assert_eq!(stored_timestamp(&whole), "2024-05-01T10:00:00.000Z");
        assert_eq!(stored_timestamp(&frac), "2024-05-01T10:00:00.500Z");
        assert!(stored_timestamp(&whole) < stored_timestamp(&frac));
    }
}
