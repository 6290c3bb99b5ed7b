// This file is part of Astarte.
//
// Copyright 2026 SECO Mind Srl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! The MQTT transport adapter, wrapping `rumqttc`'s `AsyncClient`/`EventLoop` pair behind the
//! [`Connection`]/[`EventLoop`] traits (§6).
//!
//! The event loop owns the [`Pairing`] collaborator for the lifetime of the connection (§4.4,
//! §7): a poll error indicating the broker rejected the device's TLS client certificate or
//! credentials re-invokes pairing and rebuilds the `rumqttc` client/event-loop pair in place,
//! rather than retrying indefinitely against stale credentials. The rebuilt client is published
//! through the `Arc<RwLock<_>>` shared with every [`Mqtt`] clone, so in-flight publishers observe
//! the new client without needing to be recreated themselves.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS, Transport};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use super::{Connection, EventLoop, TransportEvent};
use crate::pairing::{Pairing, TransportConfig};
use crate::topic::ClientId;

/// Error returned while building or driving the MQTT transport.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker URL couldn't be parsed.
    #[error("invalid broker url {0}")]
    BrokerUrl(String),
    /// The client certificate or private key PEM couldn't be parsed.
    #[error("invalid tls credentials")]
    Tls(#[source] std::io::Error),
    /// The rustls client config couldn't be built.
    #[error("invalid tls configuration")]
    RustlsConfig(#[from] rustls::Error),
    /// A client operation failed.
    #[error("mqtt client error")]
    Client(#[from] rumqttc::ClientError),
    /// The event loop returned a connection error.
    #[error("mqtt connection error")]
    Connection(#[from] rumqttc::ConnectionError),
    /// Re-pairing, triggered by a credential/TLS failure, itself failed.
    #[error("could not re-obtain credentials from the pairing API")]
    Pairing(#[from] crate::pairing::PairingError),
}

fn reliability_to_qos(reliability: u8) -> QoS {
    match reliability {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn build_tls_config(transport: &TransportConfig) -> Result<rustls::ClientConfig, MqttError> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().certs {
        let _ = roots.add(cert);
    }

    let certs = rustls_pemfile::certs(&mut transport.client_cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(MqttError::Tls)?;
    let key = rustls_pemfile::private_key(&mut transport.private_key_pem.as_bytes())
        .map_err(MqttError::Tls)?
        .ok_or_else(|| MqttError::Tls(std::io::Error::other("no private key found in PEM")))?;

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)?;

    Ok(config)
}

/// Builds a fresh `rumqttc` client/event-loop pair from `transport`'s credentials.
fn build_client(
    client_id: &ClientId<String>,
    transport: &TransportConfig,
    keepalive: Duration,
) -> Result<(AsyncClient, rumqttc::EventLoop), MqttError> {
    let url = url::Url::parse(&transport.broker_url)
        .map_err(|_| MqttError::BrokerUrl(transport.broker_url.clone()))?;
    let host = url
        .host_str()
        .ok_or_else(|| MqttError::BrokerUrl(transport.broker_url.clone()))?;
    let port = url.port().unwrap_or(8883);

    let mut options = MqttOptions::new(client_id.to_string(), host, port);
    options.set_keep_alive(keepalive);
    options.set_clean_session(false);

    let tls_config = build_tls_config(transport)?;
    options.set_transport(Transport::tls_with_config(tls_config.into()));

    Ok(AsyncClient::new(options, 100))
}

/// Whether a poll error indicates the broker rejected the device's TLS client certificate or
/// its credentials, as opposed to a transient network failure that plain reconnection can heal.
///
/// Best-effort: matched against the error's rendered message rather than a `rumqttc::ConnectionError`
/// variant, since the TLS/auth-rejection shape of that enum couldn't be confirmed against the
/// exact `rumqttc` version this workspace depends on (see `DESIGN.md`).
fn is_credential_error(err: &rumqttc::ConnectionError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("tls")
        || message.contains("certificate")
        || message.contains("not authorized")
        || message.contains("bad user name or password")
        || message.contains("unauthorized")
}

/// The cheap, cloneable publish/subscribe half of the MQTT adapter. Shares the underlying
/// `rumqttc::AsyncClient` with its [`MqttEventLoop`] so a credential-triggered rebuild is visible
/// to every clone already held by a [`crate::client::DeviceClient`].
#[derive(Clone)]
pub struct Mqtt {
    client_id: ClientId<String>,
    client: Arc<RwLock<AsyncClient>>,
}

/// The MQTT adapter's inbound event loop, exclusively owned by [`crate::device::DeviceConnection`].
/// Generic over the [`Pairing`] implementation so it can re-acquire credentials on a
/// credential/TLS failure without the core depending on a concrete pairing transport.
pub struct MqttEventLoop<P> {
    client_id: ClientId<String>,
    event_loop: rumqttc::EventLoop,
    client: Arc<RwLock<AsyncClient>>,
    pairing: P,
    keepalive: Duration,
}

impl Mqtt {
    /// Pairs `pairing` for broker credentials and builds the MQTT client/event-loop pair.
    pub async fn connect<P>(
        client_id: ClientId<String>,
        pairing: P,
        keepalive: Duration,
    ) -> Result<(Self, MqttEventLoop<P>), MqttError>
    where
        P: Pairing,
    {
        let transport = pairing.obtain_transport_config().await?;
        let (client, event_loop) = build_client(&client_id, &transport, keepalive)?;
        let client = Arc::new(RwLock::new(client));

        Ok((
            Mqtt {
                client_id: client_id.clone(),
                client: Arc::clone(&client),
            },
            MqttEventLoop {
                client_id,
                event_loop,
                client,
                pairing,
                keepalive,
            },
        ))
    }
}

impl Connection for Mqtt {
    type Err = MqttError;

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<(), Self::Err> {
        trace!(topic, qos, retain, "mqtt publish");
        self.client
            .read()
            .await
            .publish(topic, reliability_to_qos(qos), retain, payload)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Err> {
        self.client.read().await.subscribe(topic, QoS::ExactlyOnce).await?;
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), Self::Err> {
        self.client.read().await.unsubscribe(topic).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Self::Err> {
        self.client.read().await.disconnect().await?;
        Ok(())
    }
}

impl<P> MqttEventLoop<P>
where
    P: Pairing,
{
    /// Re-obtains credentials from `self.pairing` and rebuilds the `rumqttc` client/event-loop
    /// pair in place, publishing the new client through the shared lock.
    async fn rebuild_from_pairing(&mut self) -> Result<(), MqttError> {
        debug!(client_id = %self.client_id, "re-pairing after a credential/tls failure");
        let transport = self.pairing.obtain_transport_config().await?;
        let (client, event_loop) = build_client(&self.client_id, &transport, self.keepalive)?;

        *self.client.write().await = client;
        self.event_loop = event_loop;

        Ok(())
    }
}

impl<P> EventLoop for MqttEventLoop<P>
where
    P: Pairing,
{
    type Err = MqttError;

    async fn poll(&mut self) -> Result<TransportEvent, Self::Err> {
        loop {
            let event = match self.event_loop.poll().await {
                Ok(event) => event,
                Err(err) if is_credential_error(&err) => {
                    warn!(error = %err, "mqtt credentials rejected, re-pairing");
                    self.rebuild_from_pairing().await?;
                    continue;
                }
                Err(err) => return Err(MqttError::Connection(err)),
            };

            match event {
                MqttEvent::Incoming(Packet::ConnAck(ack)) => {
                    return Ok(TransportEvent::LinkUp {
                        session_present: ack.session_present,
                    });
                }
                MqttEvent::Incoming(Packet::Disconnect) => {
                    return Ok(TransportEvent::LinkDown { reason: 0 });
                }
                MqttEvent::Incoming(Packet::Publish(publish)) => {
                    if !publish.topic.starts_with(&format!("{}/", self.client_id)) {
                        warn!(topic = publish.topic, "dropping message outside client id namespace");
                        continue;
                    }

                    return Ok(TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                _ => continue,
            }
        }
    }
}
