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

//! Builder for an Astarte device (§5 ambient configuration layer).

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use astarte_interfaces::Interface;
use tracing::debug;

use crate::client::DeviceClient;
use crate::connection::mqtt::Mqtt;
use crate::device::{self, DeviceConnection, DeviceEvent};
use crate::introspection::Introspection;
use crate::pairing::{HttpPairing, Pairing};
use crate::store::{MemoryStore, PropertyStore};
use crate::topic::ClientId;

/// Error returned while building or connecting a device.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    /// No interface was added before `connect()`.
    #[error("device must have at least one interface")]
    MissingInterfaces,
    /// An interface file or directory couldn't be read/parsed.
    #[error("couldn't add interface")]
    Interface(#[from] crate::introspection::AddInterfaceError),
    /// Couldn't read an interface directory.
    #[error("couldn't read interface directory {}", .0.display())]
    Io(std::path::PathBuf, #[source] std::io::Error),
    /// Pairing failed while connecting.
    #[error("pairing error")]
    Pairing(#[from] crate::pairing::PairingError),
    /// The MQTT client couldn't be constructed from the pairing response.
    #[error("invalid mqtt configuration")]
    Mqtt(#[from] crate::connection::mqtt::MqttError),
    /// The message-hub gRPC client couldn't be constructed.
    #[cfg(feature = "message-hub")]
    #[error("message hub connection failed")]
    Grpc(#[from] crate::connection::grpc::GrpcError),
}

/// Builds a [`DeviceClient`]/[`DeviceConnection`] pair, generic over the property store backend.
#[derive(Clone)]
pub struct DeviceBuilder<S> {
    interfaces: Vec<Interface>,
    store: S,
    channel_capacity: usize,
}

impl Default for DeviceBuilder<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBuilder<MemoryStore> {
    /// Starts a builder backed by an in-memory, non-durable property store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interfaces: Vec::new(),
            store: MemoryStore::new(),
            channel_capacity: 128,
        }
    }
}

impl<S> Debug for DeviceBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("interfaces", &self.interfaces.len())
            .finish_non_exhaustive()
    }
}

impl<S> DeviceBuilder<S>
where
    S: PropertyStore,
{
    /// Swaps the property store backend.
    pub fn store<S2>(self, store: S2) -> DeviceBuilder<S2>
    where
        S2: PropertyStore,
    {
        DeviceBuilder {
            interfaces: self.interfaces,
            store,
            channel_capacity: self.channel_capacity,
        }
    }

    /// Adds a single interface.
    pub fn interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Parses and adds every `.json` interface file in `dir`.
    pub fn interface_directory(mut self, dir: impl AsRef<Path>) -> Result<Self, BuilderError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|err| BuilderError::Io(dir.to_path_buf(), err))?;

        for entry in entries {
            let entry = entry.map_err(|err| BuilderError::Io(dir.to_path_buf(), err))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let interface = Interface::from_file(&path)
                .map_err(crate::introspection::AddInterfaceError::from)
                .map_err(|err| err.add_path_context(path.clone()))?;
            self.interfaces.push(interface);
        }

        Ok(self)
    }

    /// Sets the bounded capacity of the inbound [`DeviceEvent`] channel. Default `128`.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Connects over MQTT, pairing via `pairing` to obtain broker credentials. `pairing` is kept
    /// by the returned event loop for the lifetime of the connection, so it can re-authenticate
    /// if the broker later rejects the device's credentials.
    pub async fn connect_mqtt<P>(
        self,
        realm: &str,
        device_id: &str,
        pairing: P,
        keepalive: Duration,
    ) -> Result<
        (
            DeviceClient<Mqtt, S>,
            DeviceConnection<Mqtt, S, crate::connection::mqtt::MqttEventLoop<P>>,
            async_channel::Receiver<DeviceEvent>,
        ),
        BuilderError,
    >
    where
        S: Clone,
        P: Pairing + 'static,
    {
        if self.interfaces.is_empty() {
            return Err(BuilderError::MissingInterfaces);
        }

        let client_id = ClientId {
            realm: realm.to_string(),
            device_id: device_id.to_string(),
        };

        let (connection, event_loop) = Mqtt::connect(client_id.clone(), pairing, keepalive).await?;
        debug!(client_id = %client_id, "connected mqtt transport");

        let introspection = Introspection::new(self.interfaces);

        let (client, device_connection, events) =
            device::build(client_id, introspection, self.store, connection, event_loop);

        Ok((client, device_connection, events))
    }
}

/// Connects over the Astarte message-hub via gRPC (feature `message-hub`).
#[cfg(feature = "message-hub")]
pub struct GrpcConfig {
    /// The message-hub endpoint, e.g. `http://localhost:50051`.
    pub endpoint: String,
    /// The message-hub node identifier.
    pub node_id: uuid::Uuid,
}

#[cfg(feature = "message-hub")]
impl GrpcConfig {
    /// Builds a gRPC connection config.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, node_id: uuid::Uuid) -> Self {
        Self {
            endpoint: endpoint.into(),
            node_id,
        }
    }
}

#[cfg(feature = "message-hub")]
impl<S> DeviceBuilder<S>
where
    S: PropertyStore,
{
    /// Connects over gRPC to a running Astarte message-hub instance.
    pub async fn connect_grpc(
        self,
        config: GrpcConfig,
    ) -> Result<
        (
            DeviceClient<crate::connection::grpc::Grpc, S>,
            DeviceConnection<crate::connection::grpc::Grpc, S, crate::connection::grpc::GrpcEventLoop>,
            async_channel::Receiver<DeviceEvent>,
        ),
        BuilderError,
    >
    where
        S: Clone,
    {
        if self.interfaces.is_empty() {
            return Err(BuilderError::MissingInterfaces);
        }

        let client_id = ClientId {
            realm: config.node_id.to_string(),
            device_id: String::new(),
        };

        let (connection, event_loop) =
            crate::connection::grpc::Grpc::connect(&config, &self.interfaces).await?;

        let introspection = Introspection::new(self.interfaces);

        let (client, device_connection, events) =
            device::build(client_id, introspection, self.store, connection, event_loop);

        Ok((client, device_connection, events))
    }
}
