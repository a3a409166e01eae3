//! # Validation Module
//!
//! Submission checks the store does not perform itself.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum Json extractor)                           │
//! │  └── Shape validation (deserialization)                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── scanInterval > 0                                                  │
//! │  ├── device ids are not negative                                       │
//! │  └── no nonzero device id appears twice                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Existing ids must still be persisted                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::types::{DeviceId, GlobalConfig, SubmittedDevice};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Config Validators
// =============================================================================

/// Validates the scan interval.
///
/// ## Example
/// ```rust
/// use roslinki_core::validation::validate_scan_interval;
///
/// assert!(validate_scan_interval(5000).is_ok());
/// assert!(validate_scan_interval(0).is_err());
/// assert!(validate_scan_interval(-100).is_err());
/// ```
pub fn validate_scan_interval(scan_interval: i32) -> ValidationResult<()> {
    if scan_interval <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "scanInterval".to_string(),
            value: i64::from(scan_interval),
        });
    }

    Ok(())
}

/// Validates a global config.
pub fn validate_config(config: &GlobalConfig) -> ValidationResult<()> {
    validate_scan_interval(config.scan_interval)
}

// =============================================================================
// Device Set Validators
// =============================================================================

/// Collects the ids of `Existing` devices, rejecting duplicates.
///
/// `New` devices never collide with anything, even when every other
/// field is identical.
///
/// ## Returns
/// The set of ids that survive the reconciliation.
pub fn collect_surviving_ids(devices: &[SubmittedDevice]) -> ValidationResult<BTreeSet<DeviceId>> {
    let mut seen = BTreeSet::new();

    for id in devices.iter().filter_map(SubmittedDevice::id) {
        if !seen.insert(id) {
            return Err(ValidationError::Conflict { id: id.get() });
        }
    }

    Ok(seen)
}

// =============================================================================
// Unit Tests
// =============================================================================
