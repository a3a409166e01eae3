//! # Config Broadcaster
//!
//! Publishes the current full state to the field as a retained message.
//!
//! ## Announce
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          announce()                                     │
//! │                                                                         │
//! │  transport connected? ── no ──► Transport(Disconnected), store unread   │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  ConfigStore::read_snapshot()   (one read transaction)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  serde_json::to_vec(snapshot)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  publish(<prefix>/config, retain = true)  ── bounded by publish_timeout│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each announce reads the store at that moment, so it never carries a
//! state older than the last committed save.
//!
//! ## Firmware Compatibility
//! The payload is the camelCase snapshot (`config.scanInterval`,
//! `devices[].sensorPin`). Older field firmware reads
//! `config.scan_interval` and keeps its previous scan period when that key
//! is absent. Such devices need a firmware update to follow interval
//! changes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::{SyncError, SyncResult, TransportError};
use crate::transport::Transport;
use roslinki_db::ConfigStore;

/// What one successful announce published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceReport {
    pub topic: String,
    pub bytes: usize,
    pub devices: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    store: ConfigStore,
    transport: Arc<dyn Transport>,
    topic: String,
    publish_timeout: Duration,
}

impl Broadcaster {
    pub fn new(
        store: ConfigStore,
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Broadcaster {
            store,
            transport,
            topic: topic.into(),
            publish_timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Reads the current state and publishes it.
    ///
    /// ## Errors
    /// * `TransportError::Disconnected` - broker link is down
    /// * `TransportError::Timeout` - publish exceeded `publish_timeout`
    /// * `DbError` - snapshot could not be read
    pub async fn announce(&self) -> SyncResult<AnnounceReport> {
        if !self.transport.is_connected().await {
            return Err(TransportError::Disconnected.into());
        }

        let snapshot = self.store.read_snapshot().await?;
        let payload = encode(&snapshot)?;
        let bytes = payload.len();

        tokio::time::timeout(
            self.publish_timeout,
            self.transport.publish(&self.topic, payload, true),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.publish_timeout))??;

        debug!(
            topic = %self.topic,
            bytes,
            devices = snapshot.devices.len(),
            "Snapshot announced"
        );

        Ok(AnnounceReport {
            topic: self.topic.clone(),
            bytes,
            devices: snapshot.devices.len(),
        })
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> SyncResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SyncError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::transport::{ConnectionState, MemoryTransport};
    use roslinki_core::{Device, FullStateSnapshot, GlobalConfig, ReconcilePlan};
    use roslinki_db::{Database, DbConfig};

    async fn setup(transport: MemoryTransport) -> (Database, Broadcaster) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let broadcaster = Broadcaster::new(
            db.config_store(),
            Arc::new(transport),
            "roslinki/config",
            Duration::from_secs(5),
        );
        (db, broadcaster)
    }

    fn new_device(name: &str) -> Device {
        Device {
            id: 0,
            name: name.to_string(),
            sensor_pin: 3,
            pump_pin: 4,
            threshold: 400,
            last_value: None,
        }
    }

    async fn save(db: &Database, scan_interval: i32, names: &[&str]) {
        let plan = ReconcilePlan::from_snapshot(&FullStateSnapshot {
            config: GlobalConfig { scan_interval },
            devices: names.iter().map(|n| new_device(n)).collect(),
        })
        .unwrap();
        db.config_store().replace_all(&plan).await.unwrap();
    }

    #[tokio::test]
    async fn test_announce_publishes_retained_snapshot() {
        let transport = MemoryTransport::new();
        let (db, broadcaster) = setup(transport.clone()).await;
        save(&db, 1500, &["Basil"]).await;

        let report = broadcaster.announce().await.unwrap();
        assert_eq!(report.devices, 1);

        let message = transport.last_published().await.unwrap();
        assert_eq!(message.topic, "roslinki/config");
        assert!(message.retain);
        assert_eq!(message.payload.len(), report.bytes);

        let snapshot: FullStateSnapshot = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(snapshot.config.scan_interval, 1500);
        assert_eq!(snapshot.devices[0].name, "Basil");
        assert!(snapshot.devices[0].id > 0);
    }

    #[tokio::test]
    async fn test_disconnected_announce_publishes_nothing() {
        let transport = MemoryTransport::disconnected();
        let (_db, broadcaster) = setup(transport.clone()).await;

        let err = broadcaster.announce().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport(TransportError::Disconnected)
        ));
        assert!(transport.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_announce_after_reconnect_carries_current_state() {
        let transport = MemoryTransport::disconnected();
        let (db, broadcaster) = setup(transport.clone()).await;

        save(&db, 1000, &["Basil"]).await;
        assert!(broadcaster.announce().await.is_err());
        save(&db, 2000, &["Mint", "Thyme"]).await;

        transport.set_state(ConnectionState::Connected).await;
        broadcaster.announce().await.unwrap();

        let published = transport.published().await;
        assert_eq!(published.len(), 1);
        let snapshot: FullStateSnapshot = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(snapshot.config.scan_interval, 2000);
        let names: Vec<_> = snapshot.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Mint", "Thyme"]);
    }

    #[tokio::test]
    async fn test_slow_publish_times_out() {
        let transport = MemoryTransport::new();
        transport
            .set_publish_delay(Some(Duration::from_secs(1)))
            .await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let broadcaster = Broadcaster::new(
            db.config_store(),
            Arc::new(transport.clone()),
            "roslinki/config",
            Duration::from_millis(50),
        );

        let err = broadcaster.announce().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport(TransportError::Timeout(d)) if d == Duration::from_millis(50)
        ));
        assert!(transport.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_payload_uses_camel_case_keys() {
        let transport = MemoryTransport::new();
        let (db, broadcaster) = setup(transport.clone()).await;
        save(&db, 4000, &["Basil"]).await;
        broadcaster.announce().await.unwrap();

        let message = transport.last_published().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(value["config"]["scanInterval"], 4000);
        assert!(value["config"].get("scan_interval").is_none());
        assert_eq!(value["devices"][0]["sensorPin"], 3);
    }

    #[test]
    fn test_unserializable_payload_is_encode_error() {
        let mut value = HashMap::new();
        value.insert((1, 2), 3);

        let err = encode(&value).unwrap_err();
        assert!(err.is_encode());
        assert!(!err.is_decode());
    }
}
