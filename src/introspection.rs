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

//! The device's introspection: a name-indexed, O(1) add/remove/get registry of [`Interface`]s
//! (§4.2), shared between the caller thread and the connection's event loop behind an `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use astarte_interfaces::Interface;
use tracing::debug;

/// Error while adding an [`Interface`] to the device introspection.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AddInterfaceError {
    /// The interface definition didn't parse/validate.
    #[error("error adding interface")]
    Interface(#[from] astarte_interfaces::Error),
    /// Couldn't read the interface file.
    #[error("couldn't read interface path {}", .path.display())]
    Io {
        /// The path that couldn't be read.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },
    /// The interface file's content was invalid.
    #[error("invalid interface file {}", .path.display())]
    InterfaceFile {
        /// The offending path.
        path: PathBuf,
        /// Why the interface couldn't be added.
        #[source]
        source: astarte_interfaces::Error,
    },
}

impl AddInterfaceError {
    pub(crate) fn add_path_context(self, path: PathBuf) -> Self {
        match self {
            AddInterfaceError::Interface(source) => AddInterfaceError::InterfaceFile { path, source },
            AddInterfaceError::Io { source, .. } => {
                debug!(new_path = %path.display(), "overwriting previous io error path");
                AddInterfaceError::Io { path, source }
            }
            AddInterfaceError::InterfaceFile { source, .. } => {
                AddInterfaceError::InterfaceFile { path, source }
            }
        }
    }
}

/// The name-indexed registry of the device's active interfaces.
///
/// Cloning is cheap: the underlying map lives behind an `Arc<RwLock<_>>` shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct Introspection {
    interfaces: Arc<RwLock<HashMap<String, Interface>>>,
}

impl Introspection {
    /// Builds a registry from an initial interface set.
    pub fn new(interfaces: impl IntoIterator<Item = Interface>) -> Self {
        let map = interfaces
            .into_iter()
            .map(|i| (i.name().to_string(), i))
            .collect();

        Self {
            interfaces: Arc::new(RwLock::new(map)),
        }
    }

    /// Returns a clone of the interface named `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Interface> {
        self.interfaces.read().unwrap().get(name).cloned()
    }

    /// Inserts `interface`, replacing any prior entry with the same name.
    ///
    /// Returns `false` without modifying the registry if an identical interface (same name *and*
    /// content) is already present, `true` if the registry changed.
    pub fn insert(&self, interface: Interface) -> bool {
        let mut map = self.interfaces.write().unwrap();

        if map.get(interface.name()) == Some(&interface) {
            return false;
        }

        map.insert(interface.name().to_string(), interface);
        true
    }

    /// Removes the interface named `name`. Returns `true` if it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.interfaces.write().unwrap().remove(name).is_some()
    }

    /// Returns every interface currently registered, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<Interface> {
        self.interfaces.read().unwrap().values().cloned().collect()
    }

    /// Returns every server-owned interface.
    #[must_use]
    pub fn all_server_owned(&self) -> Vec<Interface> {
        self.interfaces
            .read()
            .unwrap()
            .values()
            .filter(|i| i.is_server_owned())
            .cloned()
            .collect()
    }

    /// The introspection line: `"<name>:<major>:<minor>"` entries joined by `;`, covering every
    /// registered interface exactly once, in unspecified order.
    #[must_use]
    pub fn to_introspection_string(&self) -> String {
        self.interfaces
            .read()
            .unwrap()
            .values()
            .map(Interface::introspection_entry)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Read-only introspection queries, available regardless of connection state.
pub trait DeviceIntrospection {
    /// Looks up the interface named `interface_name` and invokes `f` with the result, returning
    /// whatever `f` returns. Threaded through a closure so callers never need to clone the whole
    /// registry just to read one field.
    fn get_interface<F, O>(&self, interface_name: &str, f: F) -> impl Future<Output = O> + Send
    where
        F: FnMut(Option<&Interface>) -> O + Send;
}

/// Adding/removing interfaces after construction (§4.4: permitted in `Disconnected` and
/// `Connected`, rejected with `BusyConnecting` while `Connecting`).
pub trait DynamicIntrospection {
    /// Adds `interface`. Returns `true` if the registry changed.
    fn add_interface(
        &self,
        interface: Interface,
    ) -> impl Future<Output = Result<bool, crate::Error>> + Send;

    /// Adds every interface in `interfaces`. Returns the names that were actually added.
    fn extend_interfaces<I>(
        &self,
        interfaces: I,
    ) -> impl Future<Output = Result<Vec<String>, crate::Error>> + Send
    where
        I: IntoIterator<Item = Interface> + Send;

    /// Parses and adds the interface defined in the JSON file at `file_path`.
    fn add_interface_from_file<P>(
        &self,
        file_path: P,
    ) -> impl Future<Output = Result<bool, crate::Error>> + Send
    where
        P: AsRef<Path> + Send + Sync;

    /// Parses and adds the interface defined by `json_str`.
    fn add_interface_from_str(
        &self,
        json_str: &str,
    ) -> impl Future<Output = Result<bool, crate::Error>> + Send;

    /// Removes the interface named `interface_name`. Returns `true` if it was present.
    fn remove_interface(
        &self,
        interface_name: &str,
    ) -> impl Future<Output = Result<bool, crate::Error>> + Send;

    /// Removes every interface named in `interfaces_name`. Returns the names that were present.
    fn remove_interfaces<I>(
        &self,
        interfaces_name: I,
    ) -> impl Future<Output = Result<Vec<String>, crate::Error>> + Send
    where
        I: IntoIterator<Item = String> + Send,
        I::IntoIter: Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use astarte_interfaces::Interface;

    const DEVICE_DATASTREAM: &str = r#"{
        "interface_name": "org.astarte-platform.rust.examples.Device",
        "version_major": 0,
        "version_minor": 1,
        "type": "datastream",
        "ownership": "device",
        "mappings": [
            { "endpoint": "/value", "type": "integer" }
        ]
    }"#;
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

    #[test]
    fn insert_is_idempotent_for_identical_interface() {
        let introspection = Introspection::new([]);
        let interface = Interface::from_str(DEVICE_DATASTREAM).unwrap();

        assert!(introspection.insert(interface.clone()));
        assert!(!introspection.insert(interface));
    }

    #[test]
    fn get_returns_none_for_unknown_interface() {
        let introspection = Introspection::new([]);
        assert!(introspection.get("com.example.Missing").is_none());
    }

    #[test]
    fn introspection_string_has_one_entry_per_interface() {
        let device = Interface::from_str(DEVICE_DATASTREAM).unwrap();
        let server = Interface::from_str(SERVER_DATASTREAM).unwrap();

        let introspection = Introspection::new([device.clone(), server.clone()]);
        let mut entries: Vec<_> = introspection
            .to_introspection_string()
            .split(';')
            .map(ToOwned::to_owned)
            .collect();
        entries.sort();

        let mut expected = vec![device.introspection_entry(), server.introspection_entry()];
        expected.sort();

        assert_eq!(entries, expected);
    }

    #[test]
    fn all_server_owned_filters_by_ownership() {
        let device = Interface::from_str(DEVICE_DATASTREAM).unwrap();
        let server = Interface::from_str(SERVER_DATASTREAM).unwrap();

        let introspection = Introspection::new([device, server.clone()]);
        let server_owned = introspection.all_server_owned();

        assert_eq!(server_owned.len(), 1);
        assert_eq!(server_owned[0].name(), server.name());
    }
}
