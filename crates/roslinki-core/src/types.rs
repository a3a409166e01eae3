//! # Domain Types
//!
//! Core domain types shared by the store, the broadcaster and the HTTP layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  FullStateSnapshot   (wire format, both directions)              │  │
//! │  │  ─────────────────                                               │  │
//! │  │  config:  GlobalConfig { scanInterval }                          │  │
//! │  │  devices: [Device { id, name, sensorPin, pumpPin,                │  │
//! │  │                     threshold, lastValue? }]                     │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │ submission boundary                   │
//! │                                 ▼                                       │
//! │  ┌─────────────────────┐   ┌──────────────────────────────────────┐   │
//! │  │  SubmittedDevice    │   │  DeviceFields                        │   │
//! │  │  ───────────────    │   │  ────────────                        │   │
//! │  │  New(fields)        │──►│  name, sensor_pin, pump_pin,         │   │
//! │  │  Existing{id,fields}│   │  threshold                           │   │
//! │  └─────────────────────┘   └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Naming
//! The snapshot is serialized in camelCase. The legacy snake_case keys
//! (`scan_interval`, `sensor_pin`, ...) are accepted on input.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Device Id
// =============================================================================

/// Identifier of a persisted device.
///
/// Always strictly positive. "Not yet persisted" is expressed with
/// [`SubmittedDevice::New`], never with a zero id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct DeviceId(#[ts(type = "number")] i64);

impl DeviceId {
    /// Wraps a raw id, returning `None` for zero or negative values.
    #[inline]
    pub const fn new(raw: i64) -> Option<Self> {
        if raw > 0 {
            Some(DeviceId(raw))
        } else {
            None
        }
    }

    /// Returns the raw integer id.
    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Global Config
// =============================================================================

/// The single authoritative gateway configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GlobalConfig {
    /// Sensor scan period in **milliseconds**, as consumed by the field devices.
    #[serde(alias = "scan_interval")]
    pub scan_interval: i32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            scan_interval: crate::DEFAULT_SCAN_INTERVAL_MS,
        }
    }
}

// =============================================================================
// Device
// =============================================================================

/// The mutable, operator-controlled attributes of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFields {
    pub name: String,
    pub sensor_pin: i32,
    pub pump_pin: i32,
    pub threshold: i32,
}

/// A device as it appears on the wire.
///
/// `id == 0` (or a missing or `null` id) marks a device the operator wants
/// created. `last_value` is derived from the sensor log on read and ignored
/// on submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Device {
    #[serde(default, deserialize_with = "id_or_new")]
    #[ts(type = "number")]
    pub id: i64,

    pub name: String,

    #[serde(alias = "sensor_pin")]
    pub sensor_pin: i32,

    #[serde(alias = "pump_pin")]
    pub pump_pin: i32,

    pub threshold: i32,

    /// Most recent sensor reading for this device, if any.
    #[serde(default, alias = "last_value")]
    pub last_value: Option<i32>,
}

impl Device {
    /// Returns the operator-controlled attributes.
    pub fn fields(&self) -> DeviceFields {
        DeviceFields {
            name: self.name.clone(),
            sensor_pin: self.sensor_pin,
            pump_pin: self.pump_pin,
            threshold: self.threshold,
        }
    }
}

fn id_or_new<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

// =============================================================================
// Submitted Device
// =============================================================================

/// A device from an operator submission, tagged by persistence intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedDevice {
    /// Not persisted yet: the store assigns a fresh id.
    New(DeviceFields),
    /// Already persisted: update in place by id.
    Existing { id: DeviceId, fields: DeviceFields },
}

impl SubmittedDevice {
    /// Classifies a wire device.
    ///
    /// ## Rules
    /// - `id == 0` → `New`
    /// - `id > 0`  → `Existing`
    /// - `id < 0`  → `ValidationError::InvalidFormat`
    pub fn from_wire(device: &Device) -> Result<Self, ValidationError> {
        match device.id {
            0 => Ok(SubmittedDevice::New(device.fields())),
            raw => DeviceId::new(raw)
                .map(|id| SubmittedDevice::Existing {
                    id,
                    fields: device.fields(),
                })
                .ok_or_else(|| ValidationError::InvalidFormat {
                    field: "id".to_string(),
                    reason: format!("device id must not be negative, got {}", raw),
                }),
        }
    }

    /// Returns the persisted id, if any.
    pub fn id(&self) -> Option<DeviceId> {
        match self {
            SubmittedDevice::New(_) => None,
            SubmittedDevice::Existing { id, .. } => Some(*id),
        }
    }

    pub fn fields(&self) -> &DeviceFields {
        match self {
            SubmittedDevice::New(fields) => fields,
            SubmittedDevice::Existing { fields, .. } => fields,
        }
    }
}

// =============================================================================
// Full State Snapshot
// =============================================================================

/// Config plus the complete device set at one instant.
///
/// This is both what the operator submits and what gets broadcast to the
/// field, so a saved snapshot is echoed back unchanged (apart from
/// freshly assigned ids and derived last values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FullStateSnapshot {
    pub config: GlobalConfig,

    #[serde(default)]
    pub devices: Vec<Device>,
}

impl FullStateSnapshot {
    /// Looks up a device by id.
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id.get())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
