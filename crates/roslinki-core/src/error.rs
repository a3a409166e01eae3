//! # Error Types
//!
//! Domain-specific error types for roslinki-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  roslinki-core errors (this file)                                      │
//! │  └── ValidationError  - Submission rejected before any persistence     │
//! │                                                                         │
//! │  roslinki-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  roslinki-sync errors (separate crate)                                 │
//! │  └── SyncError        - Validation | Storage | Transport | Decode      │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError → ApiError → Operator               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised while turning an operator submission into a reconcile plan.
/// Nothing has touched the store yet when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value must be strictly positive (e.g. `scanInterval`).
    #[error("{field} must be positive, got {value}")]
    MustBePositive { field: String, value: i64 },

    /// Invalid format (e.g. negative device id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same persisted device id was submitted more than once.
    ///
    /// ## When This Occurs
    /// ```text
    /// devices: [{id: 1, name: "Basil"}, {id: 1, name: "Mint"}]
    ///                 │                        │
    ///                 └──── which one wins? ───┘
    ///
    /// Ambiguous intent is rejected, never deduplicated.
    /// ```
    #[error("conflicting submission: device id {id} appears more than once")]
    Conflict { id: i64 },
}

impl ValidationError {
    /// Returns true for identifier collisions (as opposed to malformed values).
    pub fn is_conflict(&self) -> bool {
        matches!(self, ValidationError::Conflict { .. })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
