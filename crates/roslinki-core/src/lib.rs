//! # roslinki-core: Pure Domain Logic for the Roslinki Gateway
//!
//! This crate holds the domain model of the irrigation gateway as pure
//! types and functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Roslinki Gateway Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐   │
//! │  │  HTTP (operator save/read)   │   │  MQTT (telemetry in,         │   │
//! │  │                              │   │        config out)           │   │
//! │  └──────────────┬───────────────┘   └──────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────────────────────▼───────────────┐   │
//! │  │                  roslinki-sync (coordinator)                    │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 │                                       │
//! │  ┌──────────────────────────────▼──────────────────────────────────┐   │
//! │  │             ★ roslinki-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐ │   │
//! │  │   │   types   │  │ telemetry  │  │ reconcile │  │ validation│ │   │
//! │  │   │ Snapshot  │  │ Reading    │  │   Plan    │  │   rules   │ │   │
//! │  │   │  Device   │  │ PumpEvent  │  │           │  │           │ │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                 │                                       │
//! │  ┌──────────────────────────────▼──────────────────────────────────┐   │
//! │  │                  roslinki-db (SQLite store)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Snapshot, device and config types
//! - [`telemetry`] - Inbound payloads and log entries
//! - [`reconcile`] - Validated full-state replacement plans
//! - [`validation`] - Submission rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use roslinki_core::{FullStateSnapshot, ReconcilePlan};
//!
//! let submission: FullStateSnapshot = serde_json::from_str(r#"{
//!     "config": {"scanInterval": 5000},
//!     "devices": [{"id": 0, "name": "Basil", "sensorPin": 2, "pumpPin": 3, "threshold": 400}]
//! }"#).unwrap();
//!
//! let plan = ReconcilePlan::from_snapshot(&submission).unwrap();
//! assert!(plan.surviving_ids().is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod reconcile;
pub mod telemetry;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use reconcile::ReconcilePlan;
pub use telemetry::{PumpEvent, PumpLogEntry, SensorLogEntry, SensorReading};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Scan interval seeded into a fresh database, in milliseconds.
///
/// Must match the default row inserted by `001_initial_schema.sql`.
pub const DEFAULT_SCAN_INTERVAL_MS: i32 = 5000;
