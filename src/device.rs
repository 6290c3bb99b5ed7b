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

//! [`DeviceConnection`] owns the transport's event loop: the connection handshake (§4.4), the
//! receive pipeline (§4.6) and device-owned property resync (§4.7).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use astarte_interfaces::{Interface, Ownership};
use tracing::{debug, error, trace, warn};

use crate::client::{ConnectionState, DeviceClient};
use crate::connection::{Connection, EventLoop, TransportEvent};
use crate::introspection::Introspection;
use crate::payload;
use crate::store::PropertyStore;
use crate::topic::{ClientId, ParsedTopic};
use crate::types::AstarteData;
use crate::Error;

/// An inbound occurrence surfaced to the caller after the receive pipeline has validated it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The device finished (re)connecting: introspection was published and the resync burst
    /// completed.
    Connected,
    /// The link went down; automatic reconnection is in progress.
    Disconnected,
    /// An individual datastream or property value arrived.
    Individual {
        /// The owning interface.
        interface: String,
        /// The mapping path.
        path: String,
        /// The decoded value, or `None` for a property unset.
        data: Option<AstarteData>,
    },
    /// An object-aggregated datastream value arrived.
    Object {
        /// The owning interface.
        interface: String,
        /// The common path prefix of the object.
        path: String,
        /// The decoded per-key values.
        data: HashMap<String, AstarteData>,
    },
}

/// Owns the transport's inbound event loop. Never cloned: exactly one `handle_events` future
/// drives it, normally spawned as its own task by the caller.
pub struct DeviceConnection<C, S, E> {
    client_id: ClientId<String>,
    introspection: Introspection,
    store: S,
    state: Arc<RwLock<ConnectionState>>,
    connection: C,
    event_loop: E,
    events: async_channel::Sender<DeviceEvent>,
}

impl<C, S, E> DeviceConnection<C, S, E>
where
    C: Connection,
    S: PropertyStore,
    E: EventLoop,
{
    pub(crate) fn new(
        client_id: ClientId<String>,
        introspection: Introspection,
        store: S,
        state: Arc<RwLock<ConnectionState>>,
        connection: C,
        event_loop: E,
        events: async_channel::Sender<DeviceEvent>,
    ) -> Self {
        Self {
            client_id,
            introspection,
            store,
            state,
            connection,
            event_loop,
            events,
        }
    }

    /// Drives the transport's event loop until the channel of [`DeviceEvent`]s is closed (every
    /// [`DeviceClient`] and every receiver were dropped) or a fatal transport error occurs.
    pub async fn handle_events(mut self) -> Result<(), Error> {
        loop {
            if self.events.is_closed() {
                return Ok(());
            }

            let event = match self.event_loop.poll().await {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "transport event loop error, treating as link down");
                    self.set_state(ConnectionState::Disconnected);
                    let _ = self.events.send(DeviceEvent::Disconnected).await;
                    continue;
                }
            };

            if let Err(err) = self.handle_event(event).await {
                error!(error = %err, "error handling transport event");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap() = state;
    }

    async fn handle_event(&mut self, event: TransportEvent) -> Result<(), Error> {
        match event {
            TransportEvent::LinkUp { session_present } => self.on_link_up(session_present).await,
            TransportEvent::LinkDown { reason } => {
                debug!(reason, "link down");
                self.set_state(ConnectionState::Disconnected);
                let _ = self.events.send(DeviceEvent::Disconnected).await;
                Ok(())
            }
            TransportEvent::Message { topic, payload } => self.on_message(&topic, &payload).await,
        }
    }

    /// The connection handshake (§4.4): subscribe to server-owned interfaces and the
    /// purge-properties control topic, publish introspection, send the empty-cache control
    /// message, then resync device-owned properties. `on_connected` only fires once every step
    /// completes.
    async fn on_link_up(&mut self, session_present: bool) -> Result<(), Error> {
        self.set_state(ConnectionState::Connecting);

        if session_present {
            debug!("session resumed, skipping handshake burst");
        } else {
            self.subscribe_server_interfaces().await?;
            self.send_introspection().await?;
            self.send_empty_cache().await?;
            self.resync_device_properties().await?;
        }

        self.set_state(ConnectionState::Connected);
        let _ = self.events.send(DeviceEvent::Connected).await;
        Ok(())
    }

    async fn subscribe_server_interfaces(&self) -> Result<(), Error> {
        let purge_topic = format!("{}/control/consumer/properties", self.client_id);
        self.connection
            .subscribe(&purge_topic)
            .await
            .map_err(Error::store)?;

        for interface in self.introspection.all_server_owned() {
            let topic = format!("{}/{}/#", self.client_id, interface.name());
            self.connection.subscribe(&topic).await.map_err(Error::store)?;
        }

        Ok(())
    }

    async fn send_introspection(&self) -> Result<(), Error> {
        let introspection = self.introspection.to_introspection_string();
        trace!(introspection, "sending introspection");
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

    async fn send_empty_cache(&self) -> Result<(), Error> {
        let topic = format!("{}/control/emptyCache", self.client_id);
        self.connection
            .publish(&topic, b"1".to_vec(), 2, false)
            .await
            .map_err(Error::store)
    }

    /// §4.7: republishes every device-owned property currently in the store whose interface is
    /// still part of introspection, and the producer properties control message listing them, so
    /// the server's view stays correct after a session loss. Rows whose interface was removed
    /// while the device was offline are deleted rather than republished (§4.4 step 4).
    async fn resync_device_properties(&self) -> Result<(), Error> {
        let stored_props = self
            .store
            .load_by_ownership(Ownership::Device)
            .await
            .map_err(Error::store)?;

        let mut device_props = Vec::with_capacity(stored_props.len());
        for prop in stored_props {
            if self.introspection.get(&prop.interface).is_some() {
                device_props.push(prop);
            } else {
                trace!(
                    interface = prop.interface,
                    path = prop.path,
                    "deleting property of an interface no longer in introspection"
                );
                self.store
                    .delete(&prop.interface, &prop.path)
                    .await
                    .map_err(Error::store)?;
            }
        }

        for prop in &device_props {
            let topic = format!("{}/{}{}", self.client_id, prop.interface, prop.path);
            let bytes = payload::encode_individual(&prop.value, None)?;
            self.connection
                .publish(&topic, bytes, 2, true)
                .await
                .map_err(Error::store)?;
        }

        let entries: Vec<String> = device_props
            .iter()
            .map(|p| format!("{}{}", p.interface, p.path))
            .collect();
        let bytes = payload::encode_properties_list(&entries)?;
        let topic = format!("{}/control/producer/properties", self.client_id);
        self.connection
            .publish(&topic, bytes, 2, false)
            .await
            .map_err(Error::store)
    }

    async fn on_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        let parsed = ParsedTopic::try_parse(self.client_id.as_ref(), topic)?;

        match parsed {
            ParsedTopic::PurgeProperties => self.purge_server_properties(payload).await,
            ParsedTopic::InterfacePath { interface, path } => {
                self.on_interface_message(interface, path, payload).await
            }
        }
    }

    /// §4.6: validates the inbound message before surfacing it — unknown interface, server-owned
    /// mismatch, malformed path, and type mismatch are all logged at `warn` and dropped rather
    /// than propagated, matching the teacher's "never let the server crash the device" posture.
    async fn on_interface_message(
        &mut self,
        interface_name: &str,
        path: &str,
        payload: &[u8],
    ) -> Result<(), Error> {
        let Some(interface) = self.introspection.get(interface_name) else {
            warn!(interface_name, "dropping message for unknown interface");
            return Ok(());
        };

        if !interface.is_server_owned() {
            warn!(interface_name, "dropping message for non server-owned interface");
            return Ok(());
        }

        if let Err(err) = interface.validate_path(path, std::iter::empty()) {
            warn!(interface_name, path, error = %err, "dropping message with invalid path");
            return Ok(());
        }

        match &interface {
            Interface::DatastreamObject(_) => self.on_object_message(&interface, path, payload).await,
            _ => self.on_individual_message(&interface, path, payload).await,
        }
    }

    async fn on_individual_message(
        &mut self,
        interface: &Interface,
        path: &str,
        payload: &[u8],
    ) -> Result<(), Error> {
        let Some(mapping_type) = interface.mapping_type(path) else {
            warn!(interface = interface.name(), path, "no mapping at path");
            return Ok(());
        };

        let decoded = match payload::decode_individual(payload, mapping_type) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(interface = interface.name(), path, error = %err, "dropping malformed payload");
                return Ok(());
            }
        };

        if interface.is_property() {
            match &decoded {
                Some(d) => {
                    self.store
                        .store(
                            interface.name(),
                            interface.version_major(),
                            path,
                            Ownership::Server,
                            &d.value,
                        )
                        .await
                        .map_err(Error::store)?;
                }
                None => {
                    if !interface.is_property_endpoint_resettable(path) {
                        warn!(interface = interface.name(), path, "unset on non-resettable property");
                        return Ok(());
                    }
                    self.store
                        .delete(interface.name(), path)
                        .await
                        .map_err(Error::store)?;
                }
            }
        }

        let _ = self
            .events
            .send(DeviceEvent::Individual {
                interface: interface.name().to_string(),
                path: path.to_string(),
                data: decoded.map(|d| d.value),
            })
            .await;

        Ok(())
    }

    async fn on_object_message(
        &mut self,
        interface: &Interface,
        path: &str,
        payload: &[u8],
    ) -> Result<(), Error> {
        let interface_for_closure = interface.clone();
        let decoded = match payload::decode_object(payload, |key| {
            interface_for_closure.mapping_type(&format!("{path}/{key}"))
        }) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(interface = interface.name(), path, error = %err, "dropping malformed object payload");
                return Ok(());
            }
        };

        let Some(decoded) = decoded else {
            warn!(interface = interface.name(), path, "object payload can't be unset");
            return Ok(());
        };

        let _ = self
            .events
            .send(DeviceEvent::Object {
                interface: interface.name().to_string(),
                path: path.to_string(),
                data: decoded.value,
            })
            .await;

        Ok(())
    }

    async fn purge_server_properties(&mut self, payload: &[u8]) -> Result<(), Error> {
        let keep: std::collections::HashSet<(String, String)> =
            payload::decode_properties_list(payload)?.into_iter().collect();

        let stored = self
            .store
            .load_by_ownership(Ownership::Server)
            .await
            .map_err(Error::store)?;

        for prop in stored {
            if !keep.contains(&(prop.interface.clone(), prop.path.clone())) {
                debug!(interface = prop.interface, path = prop.path, "purging stale server property");
                self.store
                    .delete(&prop.interface, &prop.path)
                    .await
                    .map_err(Error::store)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use astarte_interfaces::Interface;

    use super::*;
    use crate::store::MemoryStore;

    const SERVER_DATASTREAM: &str = r#"{
        "interface_name": "org.astarte-platform.rust.examples.Server",
        "version_major": 0,
        "version_minor": 1,
        "type": "datastream",
        "ownership": "server",
        "mappings": [
            { "endpoint": "/value", "type": "integer" }
        ]
    }"#;

    /// Records every call in order so the handshake burst's exact sequencing can be asserted,
    /// the same testable property the teacher's mockall-based client expectations assert, adapted
    /// to the async-trait-in-trait `Connection`/`EventLoop` shape (mockall can't mock those
    /// directly).
    #[derive(Debug, Default, Clone)]
    struct RecordingConnection {
        calls: std::sync::Arc<StdMutex<Vec<String>>>,
    }

    impl Connection for RecordingConnection {
        type Err = std::io::Error;

        async fn publish(&self, topic: &str, _payload: Vec<u8>, _qos: u8, _retain: bool) -> Result<(), Self::Err> {
            self.calls.lock().unwrap().push(format!("publish {topic}"));
            Ok(())
        }

        async fn subscribe(&self, topic: &str) -> Result<(), Self::Err> {
            self.calls.lock().unwrap().push(format!("subscribe {topic}"));
            Ok(())
        }

        async fn unsubscribe(&self, topic: &str) -> Result<(), Self::Err> {
            self.calls.lock().unwrap().push(format!("unsubscribe {topic}"));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), Self::Err> {
            self.calls.lock().unwrap().push("disconnect".to_string());
            Ok(())
        }
    }

    /// Yields each queued event once, then blocks forever (simulating an idle link) rather than
    /// erroring, so `handle_events`'s retry-on-error path doesn't busy-loop and starve the test
    /// task of a chance to run on the current-thread test runtime.
    struct ScriptedEventLoop {
        events: VecDeque<TransportEvent>,
    }

    impl EventLoop for ScriptedEventLoop {
        type Err = std::io::Error;

        async fn poll(&mut self) -> Result<TransportEvent, Self::Err> {
            match self.events.pop_front() {
                Some(event) => Ok(event),
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn handshake_burst_runs_before_connected_event() {
        let server = Interface::from_str(SERVER_DATASTREAM).unwrap();
        let introspection = Introspection::new([server]);
        let client_id = ClientId {
            realm: "realm".to_string(),
            device_id: "device_id".to_string(),
        };

        let connection = RecordingConnection::default();
        let calls = connection.calls.clone();
        let event_loop = ScriptedEventLoop {
            events: VecDeque::from([TransportEvent::LinkUp { session_present: false }]),
        };

        let (client, device_connection, events) = build(
            client_id,
            introspection,
            MemoryStore::new(),
            connection,
            event_loop,
        );

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        let handle = tokio::spawn(device_connection.handle_events());
        let event = events.recv().await.unwrap();
        assert_eq!(event, DeviceEvent::Connected);
        assert_eq!(client.connection_state(), ConnectionState::Connected);

        handle.abort();
        drop(events);

        let calls = calls.lock().unwrap();
        let subscribe_purge = calls
            .iter()
            .position(|c| c == "subscribe realm/device_id/control/consumer/properties")
            .expect("subscribes to purge-properties topic");
        let subscribe_server = calls
            .iter()
            .position(|c| c.starts_with("subscribe realm/device_id/org.astarte-platform"))
            .expect("subscribes to server-owned interface");
        let publish_introspection = calls
            .iter()
            .position(|c| c == "publish realm/device_id")
            .expect("publishes introspection");
        let publish_empty_cache = calls
            .iter()
            .position(|c| c == "publish realm/device_id/control/emptyCache")
            .expect("publishes empty cache");
        let publish_producer_properties = calls
            .iter()
            .position(|c| c == "publish realm/device_id/control/producer/properties")
            .expect("publishes producer properties");

        assert!(subscribe_purge < publish_introspection);
        assert!(subscribe_server < publish_introspection);
        assert!(publish_introspection < publish_empty_cache);
        assert!(publish_empty_cache < publish_producer_properties);
    }
}

/// Constructs the linked [`DeviceClient`]/[`DeviceConnection`] pair sharing one introspection,
/// property store and connection state.
pub(crate) fn build<C, S, E>(
    client_id: ClientId<String>,
    introspection: Introspection,
    store: S,
    connection: C,
    event_loop: E,
) -> (DeviceClient<C, S>, DeviceConnection<C, S, E>, async_channel::Receiver<DeviceEvent>)
where
    C: Connection,
    S: PropertyStore,
    E: EventLoop,
{
    let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
    let (tx, rx) = async_channel::unbounded();

    let client = DeviceClient::new(
        client_id.clone(),
        introspection.clone(),
        store.clone(),
        Arc::clone(&state),
        connection.clone(),
    );
    let connection = DeviceConnection::new(client_id, introspection, store, state, connection, event_loop, tx);

    (client, connection, rx)
}
