//! # Telemetry Types
//!
//! Inbound sensor/pump payloads and the append-only log entries they become.
//!
//! ## Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Producer payload                      Stored log entry                 │
//! │  ────────────────                      ────────────────                 │
//! │  {plant_id: 3, action: 7}         ──►  {device_id: 3, is_on: true,      │
//! │                                         timestamp: <gateway now>}       │
//! │                                                                         │
//! │  • action: nonzero → on, zero → off                                     │
//! │  • timestamp: missing or zero → gateway clock at ingestion              │
//! │  • timestamps are kept in UTC, millisecond precision                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound Payloads
// =============================================================================

/// A moisture reading published by a field controller.
///
/// `device_id` is not required to reference a configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    #[serde(alias = "plant_id", alias = "device_id")]
    pub device_id: i64,

    pub value: i32,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A pump state change published by a field controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpEvent {
    #[serde(alias = "plant_id", alias = "device_id")]
    pub device_id: i64,

    /// Raw action flag. Anything nonzero means "on".
    pub action: i32,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PumpEvent {
    /// Returns the normalized pump state.
    pub fn is_on(&self) -> bool {
        normalize_pump_action(self.action)
    }
}

// =============================================================================
// Log Entries
// =============================================================================

/// A persisted row of `sensor_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorLogEntry {
    pub id: i64,
    pub device_id: i64,
    pub value: i32,
    pub timestamp: DateTime<Utc>,
}

/// A persisted row of `pump_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpLogEntry {
    pub id: i64,
    pub device_id: i64,
    pub is_on: bool,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Normalizers
// =============================================================================

/// Coerces a raw pump action flag to a strict boolean.
#[inline]
pub fn normalize_pump_action(action: i32) -> bool {
    action != 0
}

/// Picks the timestamp to record for an inbound message.
///
/// Producers without a clock send nothing or the zero/epoch time; those
/// get `now`. The result is truncated to milliseconds so the stored text
/// form sorts chronologically.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use roslinki_core::telemetry::resolve_timestamp;
///
/// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// assert_eq!(resolve_timestamp(None, now), now);
///
/// let epoch = Utc.timestamp_opt(0, 0).unwrap();
/// assert_eq!(resolve_timestamp(Some(epoch), now), now);
/// ```
pub fn resolve_timestamp(produced: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let ts = match produced {
        Some(ts) if ts.timestamp() > 0 => ts,
        _ => now,
    };
    ts.trunc_subsecs(3)
}

// =============================================================================
// Unit Tests
// =============================================================================
