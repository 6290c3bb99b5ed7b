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

//! The publish half of the device core (§4.5): [`DeviceClient`] is the cheap, cloneable,
//! `Send + Sync` handle callers use to send data and manage introspection. Its counterpart,
//! [`crate::device::DeviceConnection`], owns the transport's event loop and is never cloned.

mod datastream;
mod property;

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, RwLock};

use astarte_interfaces::Interface;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::introspection::{DeviceIntrospection, DynamicIntrospection, Introspection};
use crate::store::PropertyStore;
use crate::topic::ClientId;
use crate::Error;

pub use datastream::AstarteObject;

/// The device's connection state (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt is active. The initial state.
    #[default]
    Disconnected,
    /// A connection attempt (or the post-link-up handshake) is in progress.
    Connecting,
    /// The handshake completed; `send`/`send_object`/property calls are accepted.
    Connected,
}

/// The user-facing handle to a running device: send data, add/remove interfaces, query
/// connection state. Cloning is cheap — every clone shares the same introspection, store and
/// transport handle.
#[derive(Clone)]
pub struct DeviceClient<C, S> {
    pub(crate) client_id: ClientId<String>,
    pub(crate) introspection: Introspection,
    pub(crate) store: S,
    pub(crate) state: Arc<RwLock<ConnectionState>>,
    pub(crate) connection: C,
}

impl<C, S> DeviceClient<C, S> {
    pub(crate) fn new(
        client_id: ClientId<String>,
        introspection: Introspection,
        store: S,
        state: Arc<RwLock<ConnectionState>>,
        connection: C,
    ) -> Self {
        Self {
            client_id,
            introspection,
            store,
            state,
            connection,
        }
    }

    /// The current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    pub(crate) fn require_connected(&self) -> Result<(), Error> {
        match self.connection_state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Connecting => Err(Error::BusyConnecting),
            ConnectionState::Disconnected => Err(Error::NotConnected),
        }
    }

    pub(crate) fn require_not_connecting(&self) -> Result<(), Error> {
        if self.connection_state() == ConnectionState::Connecting {
            return Err(Error::BusyConnecting);
        }
        Ok(())
    }

    pub(crate) fn lookup_interface(&self, interface_name: &str) -> Result<Interface, Error> {
        self.introspection
            .get(interface_name)
            .ok_or_else(|| Error::InterfaceNotFound(interface_name.to_string()))
    }
}

impl<C, S> DeviceClient<C, S>
where
    C: Connection,
    S: PropertyStore,
{
    /// Re-sends the introspection control message, reflecting the current set of interfaces to
    /// the server (§4.4).
    async fn republish_introspection(&self) -> Result<(), Error> {
        let introspection = self.introspection.to_introspection_string();
        self.connection
            .publish(
                &self.client_id.to_string(),
                introspection.into_bytes(),
                2,
                false,
            )
            .await
            .map_err(Error::store)
    }

    /// Applies the transport-facing side effects of adding `interface` while connected: a fresh
    /// introspection publish, and — if it's server-owned — subscribing to its topic (§3, §4.4).
    async fn on_interface_added(&self, interface: &Interface) -> Result<(), Error> {
        if self.connection_state() != ConnectionState::Connected {
            return Ok(());
        }

        if !interface.is_device_owned() {
            let topic = format!("{}/{}/#", self.client_id, interface.name());
            self.connection.subscribe(&topic).await.map_err(Error::store)?;
        }

        self.republish_introspection().await
    }

    /// Applies the transport-facing side effects of removing `interface` while connected:
    /// deleting its stored property rows, unsubscribing if it was server-owned, and republishing
    /// introspection (§3, §4.4).
    async fn on_interface_removed(&self, interface: &Interface) -> Result<(), Error> {
        if interface.is_property() {
            self.store
                .delete_by_interface(interface.name())
                .await
                .map_err(Error::store)?;
        }

        if self.connection_state() != ConnectionState::Connected {
            return Ok(());
        }

        if !interface.is_device_owned() {
            let topic = format!("{}/{}/#", self.client_id, interface.name());
            self.connection.unsubscribe(&topic).await.map_err(Error::store)?;
        }

        self.republish_introspection().await
    }
}

impl<C, S> DeviceIntrospection for DeviceClient<C, S>
where
    C: Connection,
    S: PropertyStore,
{
    fn get_interface<F, O>(&self, interface_name: &str, mut f: F) -> impl Future<Output = O> + Send
    where
        F: FnMut(Option<&Interface>) -> O + Send,
    {
        let interface = self.introspection.get(interface_name);
        async move { f(interface.as_ref()) }
    }
}

impl<C, S> DynamicIntrospection for DeviceClient<C, S>
where
    C: Connection,
    S: PropertyStore,
{
    #[instrument(skip_all, fields(interface = interface.name()))]
    fn add_interface(&self, interface: Interface) -> impl Future<Output = Result<bool, Error>> + Send {
        let client = self.clone();
        async move {
            client.require_not_connecting()?;
            let added = client.introspection.insert(interface.clone());
            debug!(added, "interface added to introspection");
            if added {
                client.on_interface_added(&interface).await?;
            }
            Ok(added)
        }
    }

    fn extend_interfaces<I>(&self, interfaces: I) -> impl Future<Output = Result<Vec<String>, Error>> + Send
    where
        I: IntoIterator<Item = Interface> + Send,
    {
        let client = self.clone();
        let interfaces: Vec<_> = interfaces.into_iter().collect();
        async move {
            client.require_not_connecting()?;
            let added: Vec<Interface> = interfaces
                .into_iter()
                .filter(|i| client.introspection.insert(i.clone()))
                .collect();

            if client.connection_state() == ConnectionState::Connected {
                for interface in &added {
                    if !interface.is_device_owned() {
                        let topic = format!("{}/{}/#", client.client_id, interface.name());
                        client.connection.subscribe(&topic).await.map_err(Error::store)?;
                    }
                }
                if !added.is_empty() {
                    client.republish_introspection().await?;
                }
            }

            Ok(added.into_iter().map(|i| i.name().to_string()).collect())
        }
    }

    fn add_interface_from_file<P>(&self, file_path: P) -> impl Future<Output = Result<bool, Error>> + Send
    where
        P: AsRef<Path> + Send + Sync,
    {
        let client = self.clone();
        let path = file_path.as_ref().to_path_buf();
        async move {
            let interface = Interface::from_file(&path)
                .map_err(crate::introspection::AddInterfaceError::from)
                .map_err(|err| err.add_path_context(path.clone()))?;
            client.add_interface(interface).await
        }
    }

    fn add_interface_from_str(&self, json_str: &str) -> impl Future<Output = Result<bool, Error>> + Send {
        let client = self.clone();
        let json_str = json_str.to_string();
        async move {
            let interface = Interface::from_str(&json_str)
                .map_err(crate::introspection::AddInterfaceError::from)?;
            client.add_interface(interface).await
        }
    }

    fn remove_interface(&self, interface_name: &str) -> impl Future<Output = Result<bool, Error>> + Send {
        let client = self.clone();
        let interface_name = interface_name.to_string();
        async move {
            client.require_not_connecting()?;
            let Some(interface) = client.introspection.get(&interface_name) else {
                return Ok(false);
            };

            let removed = client.introspection.remove(&interface_name);
            if removed {
                client.on_interface_removed(&interface).await?;
            }
            Ok(removed)
        }
    }

    fn remove_interfaces<I>(&self, interfaces_name: I) -> impl Future<Output = Result<Vec<String>, Error>> + Send
    where
        I: IntoIterator<Item = String> + Send,
        I::IntoIter: Send,
    {
        let client = self.clone();
        let names: Vec<_> = interfaces_name.into_iter().collect();
        async move {
            client.require_not_connecting()?;

            let mut removed = Vec::new();
            for name in names {
                let Some(interface) = client.introspection.get(&name) else {
                    continue;
                };
                if client.introspection.remove(&name) {
                    removed.push(interface);
                }
            }

            for interface in &removed {
                if interface.is_property() {
                    client
                        .store
                        .delete_by_interface(interface.name())
                        .await
                        .map_err(Error::store)?;
                }
            }

            if client.connection_state() == ConnectionState::Connected {
                for interface in &removed {
                    if !interface.is_device_owned() {
                        let topic = format!("{}/{}/#", client.client_id, interface.name());
                        client.connection.unsubscribe(&topic).await.map_err(Error::store)?;
                    }
                }
                if !removed.is_empty() {
                    client.republish_introspection().await?;
                }
            }

            Ok(removed.into_iter().map(|i| i.name().to_string()).collect())
        }
    }
}
