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

//! The pairing collaborator (§6): out of the core's direct responsibility, but its contract is
//! captured as the [`Pairing`] trait so the MQTT transport can be built against a fake in tests.

use std::future::Future;

use base64::Engine;
use rcgen::{CertificateParams, KeyPair};
use serde::Deserialize;
use tracing::{debug, trace};

/// Error returned by a pairing operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// The HTTP request itself failed (DNS, TLS, timeout, ...).
    #[error("pairing request failed")]
    Request(#[from] reqwest::Error),
    /// The pairing API rejected the device: `422`.
    #[error("device already registered")]
    AlreadyRegistered,
    /// The pairing API rejected the credentials: `401`/`403`.
    #[error("pairing authentication failed")]
    Unauthorized,
    /// Any other non-2xx response.
    #[error("pairing API error: {status} {body}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },
    /// The response body couldn't be parsed as the expected JSON shape.
    #[error("couldn't parse pairing response")]
    Decode(#[from] serde_json::Error),
    /// Key pair or CSR generation failed.
    #[error("couldn't generate device key pair")]
    Crypto(#[from] rcgen::Error),
}

/// A device's MQTT broker connection parameters, returned by [`Pairing::obtain_transport_config`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// The broker URL (`mqtts://host:port`).
    pub broker_url: String,
    /// The PEM-encoded client certificate chain.
    pub client_cert_pem: String,
    /// The PEM-encoded private key matching `client_cert_pem`.
    pub private_key_pem: String,
}

#[derive(Debug, Deserialize)]
struct MqttV1Credentials {
    client_crt: String,
}

#[derive(Debug, Deserialize)]
struct DeviceStatus {
    protocols: Protocols,
}

#[derive(Debug, Deserialize)]
struct Protocols {
    astarte_mqtt_v1: MqttV1Protocol,
}

#[derive(Debug, Deserialize)]
struct MqttV1Protocol {
    broker_url: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsSecret {
    credentials_secret: String,
}

#[derive(Debug, Deserialize)]
struct GenericApiResponse<T> {
    data: T,
}

/// Generates a random (UUIDv4) device id, base64url-encoded without padding (§6).
#[must_use]
pub fn generate_random_device_id() -> String {
    encode_device_id(uuid::Uuid::new_v4())
}

/// Deterministically generates a device id (UUIDv5) from `namespace` and `unique_data`,
/// base64url-encoded without padding (§6).
#[must_use]
pub fn generate_device_id(namespace: uuid::Uuid, unique_data: &str) -> String {
    encode_device_id(uuid::Uuid::new_v5(&namespace, unique_data.as_bytes()))
}

fn encode_device_id(id: uuid::Uuid) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// The pairing contract: register a device and obtain transport credentials. Implemented by
/// [`HttpPairing`] against the real API, and by an in-memory fake in tests.
pub trait Pairing: Send + Sync {
    /// Registers the device, or confirms an existing registration, and returns the MQTT transport
    /// config (broker URL + client certificate).
    fn obtain_transport_config(
        &self,
    ) -> impl Future<Output = Result<TransportConfig, PairingError>> + Send;
}

/// A [`reqwest`]-based pairing client talking to an Astarte pairing API instance.
#[derive(Debug, Clone)]
pub struct HttpPairing {
    pairing_url: String,
    realm: String,
    device_id: String,
    credentials_secret: String,
    client: reqwest::Client,
}

impl HttpPairing {
    /// Builds a pairing client for `device_id` in `realm`, authenticated with
    /// `credentials_secret`.
    pub fn new(pairing_url: impl Into<String>, realm: impl Into<String>, device_id: impl Into<String>, credentials_secret: impl Into<String>) -> Self {
        Self {
            pairing_url: pairing_url.into(),
            realm: realm.into(),
            device_id: device_id.into(),
            credentials_secret: credentials_secret.into(),
            client: reqwest::Client::new(),
        }
    }

    fn device_base_url(&self) -> String {
        format!("{}/v1/{}/devices/{}", self.pairing_url, self.realm, self.device_id)
    }

    /// Registers `device_id` against the pairing API using an agent JWT, returning the
    /// credentials secret used to authenticate every subsequent pairing call
    /// (`POST /v1/<realm>/agent/devices`, §6).
    pub async fn register_device(
        pairing_url: &str,
        realm: &str,
        device_id: &str,
        jwt: &str,
    ) -> Result<String, PairingError> {
        let client = reqwest::Client::new();
        let url = format!("{pairing_url}/v1/{realm}/agent/devices");

        let response = client
            .post(&url)
            .bearer_auth(jwt)
            .json(&serde_json::json!({ "data": { "hw_id": device_id } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        let body: GenericApiResponse<CredentialsSecret> = response.json().await?;
        Ok(body.data.credentials_secret)
    }

    async fn map_error(response: reqwest::Response) -> PairingError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            422 => PairingError::AlreadyRegistered,
            401 | 403 => PairingError::Unauthorized,
            _ => PairingError::Api {
                status: status.as_u16(),
                body,
            },
        }
    }

    async fn generate_csr(&self) -> Result<(String, KeyPair), PairingError> {
        let key_pair = KeyPair::generate()?;
        let common_name = format!("{}/{}", self.realm, self.device_id);
        let params = CertificateParams::new(Vec::<String>::new())?;
        let csr = params.serialize_request(&key_pair)?.pem()?;
        debug!(common_name, "generated CSR");
        Ok((csr, key_pair))
    }
}

impl Pairing for HttpPairing {
    async fn obtain_transport_config(&self) -> Result<TransportConfig, PairingError> {
        let (csr, key_pair) = self.generate_csr().await?;

        let url = format!("{}/protocols/astarte_mqtt_v1/credentials", self.device_base_url());
        trace!(url, "requesting client certificate");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials_secret)
            .json(&serde_json::json!({ "data": { "csr": csr } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        let body: GenericApiResponse<MqttV1Credentials> = response.json().await?;

        let status_response = self
            .client
            .get(self.device_base_url())
            .bearer_auth(&self.credentials_secret)
            .send()
            .await?;

        if !status_response.status().is_success() {
            return Err(Self::map_error(status_response).await);
        }

        let status: GenericApiResponse<DeviceStatus> = status_response.json().await?;

        Ok(TransportConfig {
            broker_url: status.data.protocols.astarte_mqtt_v1.broker_url,
            client_cert_pem: body.data.client_crt,
            private_key_pem: key_pair.serialize_pem(),
        })
    }
}

impl HttpPairing {
    /// Verifies that a previously-obtained client certificate is still valid
    /// (`POST …/credentials/verify`, §6).
    pub async fn verify_credentials(&self, client_cert_pem: &str) -> Result<bool, PairingError> {
        let url = format!(
            "{}/protocols/astarte_mqtt_v1/credentials/verify",
            self.device_base_url()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials_secret)
            .json(&serde_json::json!({ "data": { "client_crt": client_cert_pem } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        #[derive(Deserialize)]
        struct Valid {
            valid: bool,
        }

        let body: GenericApiResponse<Valid> = response.json().await?;
        Ok(body.data.valid)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// An in-memory [`Pairing`] fake, returning a fixed [`TransportConfig`] or a canned error.
    pub(crate) struct FakePairing {
        result: Mutex<Option<Result<TransportConfig, ()>>>,
    }

    impl FakePairing {
        pub(crate) fn new(config: TransportConfig) -> Self {
            Self {
                result: Mutex::new(Some(Ok(config))),
            }
        }
    }

    impl Pairing for FakePairing {
        async fn obtain_transport_config(&self) -> Result<TransportConfig, PairingError> {
            match self.result.lock().unwrap().take() {
                Some(Ok(config)) => Ok(config),
                _ => Err(PairingError::AlreadyRegistered),
            }
        }
    }

    #[tokio::test]
    async fn fake_pairing_returns_configured_result() {
        let config = TransportConfig {
            broker_url: "mqtts://example.test:8883".to_string(),
            client_cert_pem: "cert".to_string(),
            private_key_pem: "key".to_string(),
        };
        let pairing = FakePairing::new(config.clone());

        let got = pairing.obtain_transport_config().await.unwrap();
        assert_eq!(got.broker_url, config.broker_url);
    }

    #[test]
    fn random_device_id_has_no_padding() {
        let id = generate_random_device_id();
        assert!(!id.contains('='));
        assert_eq!(id.len(), 22);
    }

    #[test]
    fn device_id_generation_is_deterministic() {
        let namespace = uuid::Uuid::new_v4();
        let a = generate_device_id(namespace, "unique-data");
        let b = generate_device_id(namespace, "unique-data");
        assert_eq!(a, b);

        let c = generate_device_id(namespace, "other-data");
        assert_ne!(a, c);
    }
}
