//! # roslinki-sync: Reconciliation and Broadcast Engine
//!
//! This crate connects the gateway store to the field. Operator saves are
//! reconciled into the store and then announced on the config topic;
//! sensor and pump telemetry is ingested from the broker.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gateway Sync Architecture                        │
//! │                                                                         │
//! │  operator save                                         field devices    │
//! │       │                                                   ▲     │       │
//! │       ▼                                                   │     │       │
//! │  ┌────────────────┐   announce   ┌────────────────┐      │     │       │
//! │  │ SyncCoordinator│ ───────────► │ AnnounceWorker │      │     │       │
//! │  │                │  (coalesced) │ tick + on save │      │     │       │
//! │  └───────┬────────┘              └───────┬────────┘      │     │       │
//! │          │                               │               │     │       │
//! │          ▼                               ▼               │     │       │
//! │  ┌────────────────┐              ┌────────────────┐      │     │       │
//! │  │  Reconciler    │              │  Broadcaster   │──────┘     │       │
//! │  │ plan + replace │              │ retained JSON  │  <prefix>/ │       │
//! │  └───────┬────────┘              └───────┬────────┘   config   │       │
//! │          │                               │                     │       │
//! │          ▼                               ▼                     ▼       │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐   │
//! │  │  roslinki-db ConfigStore     │   │  Transport (MQTT / memory)   │   │
//! │  │  TelemetryRepository ◄───────┼───┤  InboundHandler              │   │
//! │  └──────────────────────────────┘   └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`coordinator`] - Save entry point and the single announce worker
//! - [`reconciler`] - Validated full-state replace
//! - [`broadcaster`] - Snapshot publish on the config topic
//! - [`transport`] - Transport trait, connection state, in-memory transport
//! - [`mqtt`] - rumqttc client with reconnect and backoff
//! - [`inbound`] - Sensor/pump telemetry ingest
//! - [`protocol`] - Topic layout
//! - [`config`] - Gateway configuration (TOML + env)
//! - [`error`] - Sync error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod broadcaster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inbound;
pub mod mqtt;
pub mod protocol;
pub mod reconciler;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use broadcaster::{AnnounceReport, Broadcaster};
pub use config::{GatewayConfig, MqttSettings};
pub use coordinator::{AnnounceWorker, CoordinatorHandle, CoordinatorState, SyncCoordinator};
pub use error::{SyncError, SyncResult, TransportError};
pub use inbound::InboundHandler;
pub use mqtt::{MqttEventLoop, MqttTransport};
pub use protocol::Topics;
pub use reconciler::Reconciler;
pub use transport::{ConnectionState, MemoryTransport, Transport};
