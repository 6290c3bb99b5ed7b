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

//! Sends and unsets property values (§4.5).
//!
//! Device-owned properties are written to the store *before* the transport send (Open Question
//! #1): if the process dies between the two, the next boot resyncs from the store rather than
//! silently dropping a value the server never received.

use astarte_interfaces::Interface;
use tracing::{instrument, trace};

use super::DeviceClient;
use crate::connection::Connection;
use crate::store::PropertyStore;
use crate::types::AstarteData;
use crate::Error;

impl<C, S> DeviceClient<C, S>
where
    C: Connection,
    S: PropertyStore,
{
    pub(crate) async fn send_property(
        &self,
        interface: &Interface,
        path: &str,
        data: AstarteData,
    ) -> Result<(), Error> {
        if !interface.is_device_owned() {
            return Err(Error::Validation(format!(
                "{} is not device-owned",
                interface.name()
            )));
        }

        data.validate()?;
        interface.validate_path(path, std::iter::empty())?;

        let mapping_type = interface
            .mapping_type(path)
            .ok_or_else(|| Error::Validation(format!("no mapping at {path}")))?;
        if !data.matches_type(mapping_type) {
            return Err(Error::Validation(format!(
                "value type {} doesn't match mapping type {mapping_type}",
                data.display_type()
            )));
        }

        self.store
            .store(
                interface.name(),
                interface.version_major(),
                path,
                interface.ownership(),
                &data,
            )
            .await
            .map_err(Error::store)?;
        trace!(interface = interface.name(), path, "property stored");

        let bytes = crate::payload::encode_individual(&data, None)?;
        self.publish_on(interface, path, bytes, true).await
    }

    /// Unsets the property at `interface_name`/`path`: deletes the stored row before publishing
    /// the zero-length payload, honoring the same write-then-publish ordering as
    /// [`DeviceClient::send_property`].
    #[instrument(skip(self), fields(interface = interface_name, path))]
    pub async fn unset_property(&self, interface_name: &str, path: &str) -> Result<(), Error> {
        self.require_connected()?;

        let interface = self.lookup_interface(interface_name)?;

        if !interface.is_device_owned() {
            return Err(Error::Validation(format!(
                "{interface_name} is not device-owned"
            )));
        }
        if !interface.is_property() {
            return Err(Error::Validation(format!(
                "{interface_name} is not a properties interface"
            )));
        }
        if !interface.is_property_endpoint_resettable(path) {
            return Err(Error::Validation(format!(
                "{interface_name}{path} does not allow unset"
            )));
        }

        interface.validate_path(path, std::iter::empty())?;

        self.store
            .delete(interface_name, path)
            .await
            .map_err(Error::store)?;

        self.publish_on(&interface, path, Vec::new(), true).await
    }
}
