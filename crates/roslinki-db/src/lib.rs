//! # roslinki-db: Database Layer for the Roslinki Gateway
//!
//! SQLite persistence for the authoritative config/device state and the
//! append-only telemetry logs, using sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Roslinki Gateway Data Flow                         │
//! │                                                                         │
//! │  Reconciler / Broadcaster / Inbound telemetry                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  roslinki-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ ConfigStore    │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ TelemetryRepo  │    │ 001_init.sql │ │   │
//! │  │   │ WAL mode      │    │                │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   sensor_logs · pump_logs · device · global_config             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Config store and telemetry logs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roslinki_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("gateway.db")).await?;
//!
//! db.telemetry().record_sensor(1, 550, None).await?;
//! let snapshot = db.config_store().read_snapshot().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::state::{ConfigStore, ReplaceOutcome};
pub use repository::telemetry::TelemetryRepository;
