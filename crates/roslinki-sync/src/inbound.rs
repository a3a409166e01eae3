//! # Inbound Telemetry Handler
//!
//! Decodes messages from the field and appends them to the telemetry logs.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inbound Message Handling                             │
//! │                                                                         │
//! │  MQTT event loop (Publish packet)                                      │
//! │       │                                                                 │
//! │       │  dispatch(topic, payload)  ── one spawned task per message     │
//! │       ▼                                                                 │
//! │  ┌─────────────────┐                                                   │
//! │  │ decode          │── unknown topic / bad JSON ──► warn!, drop        │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │     ┌─────┴──────────────┐                                              │
//! │     ▼                    ▼                                              │
//! │  SensorReading        PumpEvent                                        │
//! │     │                    │                                              │
//! │     ▼                    ▼                                              │
//! │  record_sensor()      record_pump()  ── storage error ──► error!, drop │
//! │                                                                         │
//! │  At-most-once: nothing is retried.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{SyncError, SyncResult};
use crate::protocol::{InboundKind, Topics};
use roslinki_core::{PumpEvent, PumpLogEntry, SensorLogEntry, SensorReading};
use roslinki_db::Database;

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Sensor(SensorReading),
    Pump(PumpEvent),
}

/// What an inbound message turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Sensor(SensorLogEntry),
    Pump(PumpLogEntry),
}

/// Decodes a payload according to its topic.
pub fn decode(topics: &Topics, topic: &str, payload: &[u8]) -> SyncResult<InboundMessage> {
    match topics.classify(topic) {
        Some(InboundKind::SensorLog) => {
            Ok(InboundMessage::Sensor(serde_json::from_slice(payload)?))
        }
        Some(InboundKind::PumpLog) => Ok(InboundMessage::Pump(serde_json::from_slice(payload)?)),
        None => Err(SyncError::Decode(format!("unexpected topic '{}'", topic))),
    }
}

/// Handler for telemetry arriving from the field.
#[derive(Debug, Clone)]
pub struct InboundHandler {
    db: Database,
    topics: Topics,
}

impl InboundHandler {
    pub fn new(db: Database, topics: Topics) -> Self {
        InboundHandler { db, topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Handles one message on its own task. Failures are logged here.
    pub fn dispatch(&self, topic: String, payload: Vec<u8>) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            match handler.handle(&topic, &payload).await {
                Ok(recorded) => debug!(topic = %topic, ?recorded, "Telemetry recorded"),
                Err(e) if e.is_decode() => {
                    warn!(
                        topic = %topic,
                        payload = %String::from_utf8_lossy(&payload),
                        error = %e,
                        "Dropping undecodable telemetry"
                    );
                }
                Err(e) => error!(topic = %topic, error = %e, "Failed to record telemetry"),
            }
        })
    }

    /// Decodes and records one message.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> SyncResult<Recorded> {
        let telemetry = self.db.telemetry();

        let recorded = match decode(&self.topics, topic, payload)? {
            InboundMessage::Sensor(reading) => Recorded::Sensor(
                telemetry
                    .record_sensor(reading.device_id, reading.value, reading.timestamp)
                    .await?,
            ),
            InboundMessage::Pump(event) => Recorded::Pump(
                telemetry
                    .record_pump(event.device_id, event.action, event.timestamp)
                    .await?,
            ),
        };

        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roslinki_db::DbConfig;

    async fn setup() -> (Database, InboundHandler) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let handler = InboundHandler::new(db.clone(), Topics::default());
        (db, handler)
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_firmware_sensor_payload_is_recorded() {
        let (db, handler) = setup().await;

        let recorded = handler
            .handle("roslinki/sensor_logs", br#"{"plant_id": 4, "value": 550}"#)
            .await
            .unwrap();

        match recorded {
            Recorded::Sensor(entry) => {
                assert_eq!(entry.device_id, 4);
                assert_eq!(entry.value, 550);
            }
            other => panic!("expected sensor entry, got {:?}", other),
        }
        assert_eq!(count(&db, "sensor_logs").await, 1);
    }

    #[tokio::test]
    async fn test_pump_payload_is_normalized() {
        let (_db, handler) = setup().await;

        let recorded = handler
            .handle(
                "roslinki/pump_logs",
                br#"{"deviceId": 4, "action": 3, "timestamp": "2024-05-01T10:00:00Z"}"#,
            )
            .await
            .unwrap();

        match recorded {
            Recorded::Pump(entry) => assert!(entry.is_on),
            other => panic!("expected pump entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_messages_are_decode_errors() {
        let (db, handler) = setup().await;

        let err = handler
            .handle("roslinki/sensor_logs", b"not json")
            .await
            .unwrap_err();
        assert!(err.is_decode());

        let err = handler
            .handle("roslinki/sensor_logs", br#"{"plant_id": 4}"#)
            .await
            .unwrap_err();
        assert!(err.is_decode());

        let err = handler
            .handle("roslinki/config", br#"{"plant_id": 4, "value": 1}"#)
            .await
            .unwrap_err();
        assert!(err.is_decode());

        assert_eq!(count(&db, "sensor_logs").await, 0);
    }

    #[tokio::test]
    async fn test_dispatch_drops_bad_message_and_keeps_good_one() {
        let (db, handler) = setup().await;

        let bad = handler.dispatch("roslinki/pump_logs".into(), b"{".to_vec());
        let good = handler.dispatch(
            "roslinki/pump_logs".into(),
            br#"{"plant_id": 1, "action": 0}"#.to_vec(),
        );

        bad.await.unwrap();
        good.await.unwrap();

        assert_eq!(count(&db, "pump_logs").await, 1);
    }
}
