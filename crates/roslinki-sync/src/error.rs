//! # Sync Error Types
//!
//! Error types for the save → persist → announce flow and for the
//! pub/sub side of the gateway.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │    Storage      │  │     Transport           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  MustBePositive │  │  NotFound       │  │  Disconnected           │ │
//! │  │  InvalidFormat  │  │  QueryFailed    │  │  Timeout                │ │
//! │  │  Conflict       │  │  PoolExhausted  │  │  PublishFailed          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │   → operator, sync     → operator, sync     → logged by the worker     │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Decode      │  │     Encode      │  │     Config              │ │
//! │  │  bad telemetry  │  │  bad announce   │  │  startup only           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │   → logged, dropped    → logged by the worker                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use roslinki_core::ValidationError;
use roslinki_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Transport Error
// =============================================================================

/// Pub/sub transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Broker connection is not established.
    #[error("Not connected to broker")]
    Disconnected,

    /// Publish did not complete in time.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// Client rejected the publish request.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Client rejected the subscribe request.
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Broker URL could not be parsed or has an unsupported scheme.
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    /// TLS connector could not be built.
    #[error("TLS error: {0}")]
    Tls(String),
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering all gateway flow failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Submission rejected before any persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Store failure; nothing was committed.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// Pub/sub failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Inbound payload or topic could not be understood.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Outbound payload could not be serialized.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Invalid or unreadable gateway configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Coordinator no longer accepts work.
    #[error("Sync coordinator is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Transport(TransportError::InvalidBrokerUrl(err.to_string()))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, SyncError::Decode(_))
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, SyncError::Encode(_))
    }

    /// Returns true if the submission disagrees with itself or with the
    /// persisted state (duplicate id, or an id that no longer exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            SyncError::Validation(e) => e.is_conflict(),
            SyncError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}
