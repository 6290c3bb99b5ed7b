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

//! Sends individual and object-aggregated datastream values (§4.5).

use std::collections::HashMap;

use astarte_interfaces::Interface;
use tracing::{instrument, trace};

use super::DeviceClient;
use crate::connection::Connection;
use crate::store::PropertyStore;
use crate::types::{AstarteAggregate, AstarteData, Timestamp};
use crate::{payload, Error};

/// The `HashMap<String, AstarteData>` payload of an object-aggregated send, named so call sites
/// read `send_object(iface, path, AstarteObject::from(...))` rather than a bare `HashMap`.
pub type AstarteObject = HashMap<String, AstarteData>;

impl<C, S> DeviceClient<C, S>
where
    C: Connection,
    S: PropertyStore,
{
    /// Sends an individual datastream or property value at `interface_name`/`path`.
    ///
    /// Dispatches to [`DeviceClient::send_property`] for a `properties` interface; datastream
    /// sends go straight to the transport with no store write (§4.3: only properties persist).
    #[instrument(skip(self, data), fields(interface = interface_name, path))]
    pub async fn send(
        &self,
        interface_name: &str,
        path: &str,
        data: impl Into<AstarteData>,
    ) -> Result<(), Error> {
        self.send_with_timestamp(interface_name, path, data, None)
            .await
    }

    /// Like [`DeviceClient::send`], with an explicit timestamp.
    pub async fn send_with_timestamp(
        &self,
        interface_name: &str,
        path: &str,
        data: impl Into<AstarteData>,
        timestamp: Option<Timestamp>,
    ) -> Result<(), Error> {
        let data = data.into();
        self.require_connected()?;

        let interface = self.lookup_interface(interface_name)?;

        if interface.is_property() {
            return self
                .send_property(&interface, path, data)
                .await;
        }

        if !interface.is_device_owned() {
            return Err(Error::Validation(format!(
                "{interface_name} is not device-owned"
            )));
        }
        if !matches!(interface, Interface::DatastreamIndividual(_)) {
            return Err(Error::Validation(format!(
                "{interface_name} is not an individual-aggregation datastream"
            )));
        }

        data.validate()?;
        interface.validate_path(path, std::iter::empty())?;
        interface.validate_timestamp(path, timestamp.is_some())?;

        let mapping_type = interface
            .mapping_type(path)
            .ok_or_else(|| Error::Validation(format!("no mapping at {path}")))?;
        if !data.matches_type(mapping_type) {
            return Err(Error::Validation(format!(
                "value type {} doesn't match mapping type {mapping_type}",
                data.display_type()
            )));
        }

        let bytes = payload::encode_individual(&data, timestamp)?;
        self.publish_on(&interface, path, bytes, false).await
    }

    /// Sends an object-aggregated datastream value at `interface_name`/`path`.
    #[instrument(skip(self, data), fields(interface = interface_name, path))]
    pub async fn send_object<D>(
        &self,
        interface_name: &str,
        path: &str,
        data: D,
    ) -> Result<(), Error>
    where
        D: AstarteAggregate,
    {
        self.send_object_with_timestamp(interface_name, path, data, None)
            .await
    }

    /// Like [`DeviceClient::send_object`], with an explicit timestamp.
    pub async fn send_object_with_timestamp<D>(
        &self,
        interface_name: &str,
        path: &str,
        data: D,
        timestamp: Option<Timestamp>,
    ) -> Result<(), Error>
    where
        D: AstarteAggregate,
    {
        self.require_connected()?;

        let interface = self.lookup_interface(interface_name)?;

        if !interface.is_device_owned() {
            return Err(Error::Validation(format!(
                "{interface_name} is not device-owned"
            )));
        }
        if !matches!(interface, Interface::DatastreamObject(_)) {
            return Err(Error::Validation(format!(
                "{interface_name} is not an object-aggregation datastream"
            )));
        }

        let values = data.astarte_aggregate()?;
        for value in values.values() {
            value.validate()?;
        }

        interface.validate_path(path, values.keys().map(String::as_str))?;
        interface.validate_timestamp(path, timestamp.is_some())?;

        if !interface.is_object_payload_complete(values.keys().map(String::as_str)) {
            return Err(Error::Validation(format!(
                "object payload for {interface_name}{path} is missing mappings"
            )));
        }

        for (key, value) in &values {
            let resolved = format!("{path}/{key}");
            let mapping_type = interface
                .mapping_type(&resolved)
                .ok_or_else(|| Error::Validation(format!("no mapping at {resolved}")))?;
            if !value.matches_type(mapping_type) {
                return Err(Error::Validation(format!(
                    "value type {} doesn't match mapping type {mapping_type} at {resolved}",
                    value.display_type()
                )));
            }
        }

        let bytes = payload::encode_object(&values, timestamp)?;
        self.publish_on(&interface, path, bytes, false).await
    }

    pub(crate) async fn publish_on(
        &self,
        interface: &astarte_interfaces::Interface,
        path: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), Error> {
        let topic = format!("{}/{}{}", self.client_id, interface.name(), path);
        let qos = interface.reliability(path);

        trace!(topic, qos, len = payload.len(), "publishing");
        self.connection
            .publish(&topic, payload, qos, retain)
            .await
            .map_err(Error::store)?;

        Ok(())
    }
}
