//! # roslinki-gateway
//!
//! Operator HTTP surface of the gateway. The binary in `main.rs` wires the
//! store, the MQTT link and the announce worker, then serves [`api::router`].

pub mod api;
pub mod error;

pub use api::{router, AppState};
pub use error::ApiError;
