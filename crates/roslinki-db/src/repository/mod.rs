//! # Repository Module
//!
//! Database repository implementations for the gateway store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Database (pool.rs)                                                    │
//! │  ├── config_store() → ConfigStore                                      │
//! │  │   ├── read_snapshot()          config + devices + lastValue         │
//! │  │   └── replace_all(plan)        one transaction                      │
//! │  │                                                                      │
//! │  └── telemetry() → TelemetryRepository                                 │
//! │      ├── record_sensor(id, value, ts?)                                 │
//! │      └── record_pump(id, action, ts?)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod state;
pub mod telemetry;
