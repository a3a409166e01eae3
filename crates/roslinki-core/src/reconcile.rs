//! # Reconcile Planning
//!
//! Turns an operator's [`FullStateSnapshot`] into a validated
//! [`ReconcilePlan`] that the store can apply in one transaction.
//!
//! ## Plan Semantics
//! ```text
//! Persisted:  {1: Basil, 2: Mint, 3: Thyme}
//! Submitted:  [{id:1, Basil'}, {id:0, Sage}, {id:3, Thyme}]
//!
//!   keep   = {1, 3}            (Existing ids)
//!   delete = persisted − keep  → {2}
//!   update = 1, 3              (in place, by id)
//!   insert = Sage              (store assigns id 4)
//! ```
//!
//! An empty device list is a valid plan that deletes every device.

use std::collections::BTreeSet;

use crate::types::{DeviceId, FullStateSnapshot, GlobalConfig, SubmittedDevice};
use crate::validation::{collect_surviving_ids, validate_config, ValidationResult};

/// A validated full-state replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    config: GlobalConfig,
    devices: Vec<SubmittedDevice>,
    surviving: BTreeSet<DeviceId>,
}

impl ReconcilePlan {
    /// Validates a submission and classifies each device.
    ///
    /// ## Errors
    /// - `MustBePositive` for a non-positive scan interval
    /// - `InvalidFormat` for a negative device id
    /// - `Conflict` when a nonzero id is submitted twice
    pub fn from_snapshot(snapshot: &FullStateSnapshot) -> ValidationResult<Self> {
        validate_config(&snapshot.config)?;

        let devices = snapshot
            .devices
            .iter()
            .map(SubmittedDevice::from_wire)
            .collect::<ValidationResult<Vec<_>>>()?;

        let surviving = collect_surviving_ids(&devices)?;

        Ok(ReconcilePlan {
            config: snapshot.config,
            devices,
            surviving,
        })
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Submitted devices, in submission order.
    pub fn devices(&self) -> &[SubmittedDevice] {
        &self.devices
    }

    /// Ids that must still exist after the plan is applied. Every other
    /// persisted device is deleted.
    pub fn surviving_ids(&self) -> &BTreeSet<DeviceId> {
        &self.surviving
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
