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

//! The durable property store: a key-value store keyed by `(interface, path)`, segregated by
//! ownership, surviving device restarts.

pub mod memory;
pub mod sqlite;

use std::error::Error as StdError;
use std::fmt::Debug;
use std::future::Future;

use astarte_interfaces::Ownership;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::AstarteData;

/// A property as returned by a bulk loader.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProperty {
    /// The owning interface's name.
    pub interface: String,
    /// The interface's major version at the time of storage.
    pub major: i32,
    /// The mapping path.
    pub path: String,
    /// Which side wrote this value.
    pub ownership: Ownership,
    /// The stored value.
    pub value: AstarteData,
}

/// Durable, ownership-segregated key-value storage for properties.
///
/// Every mutation must be committed before the call returns (§4.3). Implementations are shared
/// between the caller thread and the connection's event loop behind a `Clone`-cheap handle
/// (an `Arc` internally), so the trait requires `Clone + Send + Sync + 'static`.
pub trait PropertyStore: Clone + Debug + Send + Sync + 'static
where
    Self::Err: StdError + Send + Sync + 'static,
{
    /// The error returned by a failed store operation.
    type Err;

    /// Upserts `(interface, path)` with `value`.
    fn store(
        &self,
        interface: &str,
        major: i32,
        path: &str,
        ownership: Ownership,
        value: &AstarteData,
    ) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Loads the value at `(interface, path)`.
    ///
    /// If a row exists but its stored major doesn't match `major`, the row is deleted and `None`
    /// is returned (§8, major-version-mismatch property).
    fn load(
        &self,
        interface: &str,
        major: i32,
        path: &str,
    ) -> impl Future<Output = Result<Option<AstarteData>, Self::Err>> + Send;

    /// Deletes the row at `(interface, path)`, if any.
    fn delete(
        &self,
        interface: &str,
        path: &str,
    ) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Deletes every row belonging to `interface`.
    fn delete_by_interface(&self, interface: &str) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Deletes every row.
    fn clear(&self) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Returns every stored row.
    fn load_all(&self) -> impl Future<Output = Result<Vec<StoredProperty>, Self::Err>> + Send;

    /// Returns every row with the given ownership.
    fn load_by_ownership(
        &self,
        ownership: Ownership,
    ) -> impl Future<Output = Result<Vec<StoredProperty>, Self::Err>> + Send;

    /// Returns every row belonging to `interface`.
    fn load_by_interface(
        &self,
        interface: &str,
    ) -> impl Future<Output = Result<Vec<StoredProperty>, Self::Err>> + Send;
}

#[cfg(test)]
pub(crate) async fn test_property_store<S>(store: S)
where
    S: PropertyStore,
{
    let value = AstarteData::Integer(23);

    store.clear().await.unwrap();

    assert_eq!(store.load("com.test", 1, "/test").await.unwrap(), None);

    store
        .store("com.test", 1, "/test", Ownership::Device, &value)
        .await
        .unwrap();
    assert_eq!(
        store.load("com.test", 1, "/test").await.unwrap(),
        Some(value.clone())
    );

    // major version mismatch deletes the row
    assert_eq!(store.load("com.test", 2, "/test").await.unwrap(), None);
    assert_eq!(store.load("com.test", 1, "/test").await.unwrap(), None);

    // delete
    store
        .store("com.test", 1, "/test", Ownership::Device, &value)
        .await
        .unwrap();
    store.delete("com.test", "/test").await.unwrap();
    assert_eq!(store.load("com.test", 1, "/test").await.unwrap(), None);

    // bulk loaders, ownership segregation
    store
        .store("com.test1", 1, "/test1", Ownership::Device, &value)
        .await
        .unwrap();
    store
        .store("com.test2", 1, "/test2", Ownership::Server, &value)
        .await
        .unwrap();

    let mut all = store.load_all().await.unwrap();
    all.sort_unstable_by(|a, b| a.interface.cmp(&b.interface));
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].interface, "com.test1");
    assert_eq!(all[1].interface, "com.test2");

    let device = store.load_by_ownership(Ownership::Device).await.unwrap();
    assert_eq!(device.len(), 1);
    assert_eq!(device[0].interface, "com.test1");

    let server = store.load_by_ownership(Ownership::Server).await.unwrap();
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].interface, "com.test2");

    let by_iface = store.load_by_interface("com.test1").await.unwrap();
    assert_eq!(by_iface.len(), 1);

    store.delete_by_interface("com.test1").await.unwrap();
    assert!(store.load_by_interface("com.test1").await.unwrap().is_empty());

    store.clear().await.unwrap();
    assert!(store.load_all().await.unwrap().is_empty());
}
