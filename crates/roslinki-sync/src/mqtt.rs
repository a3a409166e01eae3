//! # MQTT Transport
//!
//! Broker client built on `rumqttc`: a cloneable publish handle plus the
//! event loop that owns the connection.
//!
//! ## Task Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  MqttTransport (Clone)            MqttEventLoop (one task)              │
//! │  ─────────────────────            ─────────────────────────             │
//! │  publish() ──► AsyncClient ──────► EventLoop::poll()                    │
//! │  state()   ◄── Arc<RwLock<ConnectionState>> ◄── ConnAck / error         │
//! │  shutdown() ─────── mpsc ────────► break                                │
//! │                                        │                                │
//! │                                        ├─ ConnAck  → subscribe inbound  │
//! │                                        ├─ Publish  → InboundHandler     │
//! │                                        └─ error    → backoff, re-poll   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use rumqttc::tokio_rustls::rustls;
use rumqttc::tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rumqttc::tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rumqttc::tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::MqttSettings;
use crate::error::{SyncError, SyncResult, TransportError};
use crate::inbound::InboundHandler;
use crate::transport::{ConnectionState, Transport};

/// Capacity of the client → event loop request queue.
const REQUEST_CAPACITY: usize = 32;

// =============================================================================
// Transport Handle
// =============================================================================

/// Publish handle for the broker connection.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    state: Arc<RwLock<ConnectionState>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl MqttTransport {
    /// Builds the client and its event loop. Nothing connects until the
    /// event loop runs.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let (transport, event_loop) = MqttTransport::new(&config.mqtt, inbound)?;
    /// tokio::spawn(event_loop.run());
    /// ```
    pub fn new(
        settings: &MqttSettings,
        inbound: InboundHandler,
    ) -> SyncResult<(Self, MqttEventLoop)> {
        let options = mqtt_options(settings)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));

        let backoff = ExponentialBackoff {
            current_interval: settings.initial_backoff(),
            initial_interval: settings.initial_backoff(),
            max_interval: settings.max_backoff(),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let event_loop = MqttEventLoop {
            eventloop,
            client: client.clone(),
            state: state.clone(),
            inbound,
            backoff,
            shutdown_rx,
        };

        let transport = MqttTransport {
            client,
            state,
            shutdown_tx,
        };

        Ok((transport, event_loop))
    }

    /// Stops the event loop and disconnects from the broker.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }
}

fn mqtt_options(settings: &MqttSettings) -> SyncResult<MqttOptions> {
    let endpoint = settings.endpoint()?;

    let mut options = MqttOptions::new(settings.client_id.clone(), endpoint.host, endpoint.port);
    options.set_keep_alive(settings.keep_alive());
    options.set_clean_session(true);

    if let Some(username) = &settings.username {
        options.set_credentials(username.clone(), settings.password.clone().unwrap_or_default());
    }

    if endpoint.tls {
        let tls = tls_config(settings.tls_insecure)?;
        options.set_transport(rumqttc::Transport::tls_with_config(tls));
    }

    Ok(options)
}

fn tls_config(insecure: bool) -> Result<TlsConfiguration, TransportError> {
    let config = if insecure {
        warn!("Broker certificate verification disabled");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
            .with_no_client_auth()
    } else {
        let certs = rustls_native_certs::load_native_certs()
            .map_err(|e| TransportError::Tls(format!("platform certificates: {e}")))?;
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs);
        debug!(added, ignored, "Loaded platform root certificates");
        if added == 0 {
            return Err(TransportError::Tls("no usable root certificates".into()));
        }
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    Ok(TlsConfiguration::Rustls(Arc::new(config)))
}

/// Accepts any broker certificate. Used only with `MQTT_TLS_INSECURE`.
#[derive(Debug)]
struct SkipServerVerification;

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

// =============================================================================
// Event Loop
// =============================================================================

/// Owns the broker connection: reconnects, resubscribes, routes telemetry.
pub struct MqttEventLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    state: Arc<RwLock<ConnectionState>>,
    inbound: InboundHandler,
    backoff: ExponentialBackoff,
    shutdown_rx: mpsc::Receiver<()>,
}

impl MqttEventLoop {
    /// Main event loop.
    pub async fn run(mut self) {
        info!("MQTT event loop starting");
        *self.state.write().await = ConnectionState::Connecting;

        loop {
            tokio::select! {
                event = self.eventloop.poll() => {
                    match event {
                        Ok(event) => self.on_event(event).await,
                        Err(e) => {
                            error!(error = %e, "MQTT connection error");
                            if !self.wait_backoff().await {
                                break;
                            }
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("MQTT event loop shutting down");
                    if let Err(e) = self.client.try_disconnect() {
                        debug!(error = %e, "Disconnect request not delivered");
                    }
                    break;
                }
            }
        }

        *self.state.write().await = ConnectionState::Disconnected;
        info!("MQTT event loop stopped");
    }

    async fn on_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code != ConnectReturnCode::Success {
                    warn!(code = ?ack.code, "Broker refused connection");
                    return;
                }

                info!(session_present = ack.session_present, "Connected to broker");
                *self.state.write().await = ConnectionState::Connected;
                self.backoff.reset();

                if let Err(e) = self.subscribe().await {
                    error!(error = %e, "Failed to subscribe to telemetry topics");
                }
            }

            Event::Incoming(Packet::Publish(publish)) => {
                self.inbound
                    .dispatch(publish.topic.clone(), publish.payload.to_vec());
            }

            Event::Incoming(Packet::Disconnect) => {
                warn!("Broker sent disconnect");
                *self.state.write().await = ConnectionState::Disconnected;
            }

            _ => {}
        }
    }

    async fn subscribe(&mut self) -> Result<(), TransportError> {
        let client = self.client.clone();
        let topics: Vec<String> = self
            .inbound
            .topics()
            .inbound()
            .into_iter()
            .map(str::to_string)
            .collect();

        for topic in topics {
            client
                .subscribe(topic.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;
            debug!(%topic, "Subscribed");
        }
        Ok(())
    }

    /// Sleeps for the next backoff interval. Returns false on shutdown.
    async fn wait_backoff(&mut self) -> bool {
        *self.state.write().await = ConnectionState::Backoff;

        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.backoff.max_interval);
        debug!(?delay, "Waiting before reconnect");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                *self.state.write().await = ConnectionState::Reconnecting;
                true
            }
            _ = self.shutdown_rx.recv() => {
                info!("Shutdown during backoff");
                false
            }
        }
    }
}
