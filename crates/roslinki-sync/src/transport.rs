//! # Pub/Sub Transport
//!
//! The publish side of the broker connection, behind a trait so the
//! broadcaster can run against a real broker or an in-memory recorder.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Broker Connection States                             │
//! │                                                                         │
//! │  ┌────────────┐    poll()     ┌────────────┐                           │
//! │  │Disconnected│ ────────────► │ Connecting │                           │
//! │  └────────────┘               └─────┬──────┘                           │
//! │        ▲                            │                                   │
//! │        │                  ConnAck   │   error                           │
//! │        │                      ┌─────┴─────┐                            │
//! │        │                      ▼           ▼                             │
//! │        │            ┌────────────┐  ┌────────────┐                     │
//! │        │            │ Connected  │  │ Backoff    │                     │
//! │        │            └─────┬──────┘  └─────┬──────┘                     │
//! │        │                  │               │                             │
//! │        │            error │               │  timer expired              │
//! │        │                  ▼               │                             │
//! │        │            ┌────────────┐        │                             │
//! │        └─────────── │Reconnecting│ ◄──────┘                            │
//! │        (shutdown)   └────────────┘                                      │
//! │                                                                         │
//! │  BACKOFF: 500ms → 1s → 2s → ... → 60s max                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::TransportError;

// =============================================================================
// Transport State
// =============================================================================

/// Connection state of the broker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and ready.
    Connected,
    /// Waiting before reconnection attempt.
    Backoff,
    /// Reconnection in progress.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff => write!(f, "backoff"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Outbound side of the pub/sub link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the current connection state.
    async fn state(&self) -> ConnectionState;

    /// Returns true if currently connected.
    async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Publishes one message at QoS 0.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool)
        -> Result<(), TransportError>;
}

// =============================================================================
// Memory Transport
// =============================================================================

/// A message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// In-process transport that records every publish.
///
/// Starts connected. Connectivity and publish latency can be changed at
/// any time, which makes it the transport for tests and broker-less runs.
///
/// ## Example
/// ```rust,ignore
/// let transport = MemoryTransport::new();
/// transport.publish("roslinki/config", b"{}".to_vec(), true).await?;
/// assert_eq!(transport.published().await.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<RwLock<ConnectionState>>,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    publish_delay: Arc<RwLock<Option<Duration>>>,
    count_tx: Arc<watch::Sender<usize>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates a connected transport.
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        MemoryTransport {
            state: Arc::new(RwLock::new(ConnectionState::Connected)),
            published: Arc::new(Mutex::new(Vec::new())),
            publish_delay: Arc::new(RwLock::new(None)),
            count_tx: Arc::new(count_tx),
        }
    }

    /// Creates a transport that starts disconnected.
    pub fn disconnected() -> Self {
        let mut transport = Self::new();
        transport.state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        transport
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    /// Delays every subsequent publish by `delay`.
    pub async fn set_publish_delay(&self, delay: Option<Duration>) {
        *self.publish_delay.write().await = delay;
    }

    /// Returns every message published so far, oldest first.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub async fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().await.last().cloned()
    }

    /// Waits until at least `count` messages have been published.
    pub async fn wait_for_publishes(&self, count: usize) {
        let mut rx = self.count_tx.subscribe();
        // Sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|published| *published >= count).await;
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), TransportError> {
        let delay = *self.publish_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.is_connected().await {
            return Err(TransportError::Disconnected);
        }

        let mut published = self.published.lock().await;
        published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        self.count_tx.send_replace(published.len());

        Ok(())
    }
}
