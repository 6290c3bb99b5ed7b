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

//! An in-memory [`PropertyStore`], useful for tests and devices with no durability requirement.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use astarte_interfaces::Ownership;

use super::{PropertyStore, StoredProperty};
use crate::types::AstarteData;

#[derive(Debug, Clone, PartialEq)]
struct Row {
    major: i32,
    ownership: Ownership,
    value: AstarteData,
}

/// An in-memory, non-durable [`PropertyStore`] backed by a `HashMap` behind a mutex.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<(String, String), Row>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryStore {
    type Err = Infallible;

    async fn store(
        &self,
        interface: &str,
        major: i32,
        path: &str,
        ownership: Ownership,
        value: &AstarteData,
    ) -> Result<(), Self::Err> {
        self.rows.lock().unwrap().insert(
            (interface.to_string(), path.to_string()),
            Row {
                major,
                ownership,
                value: value.clone(),
            },
        );
        Ok(())
    }

    async fn load(
        &self,
        interface: &str,
        major: i32,
        path: &str,
    ) -> Result<Option<AstarteData>, Self::Err> {
        let key = (interface.to_string(), path.to_string());
        let mut rows = self.rows.lock().unwrap();

        let Some(row) = rows.get(&key) else {
            return Ok(None);
        };

        if row.major != major {
            rows.remove(&key);
            return Ok(None);
        }

        Ok(Some(row.value.clone()))
    }

    async fn delete(&self, interface: &str, path: &str) -> Result<(), Self::Err> {
        self.rows
            .lock()
            .unwrap()
            .remove(&(interface.to_string(), path.to_string()));
        Ok(())
    }

    async fn delete_by_interface(&self, interface: &str) -> Result<(), Self::Err> {
        self.rows.lock().unwrap().retain(|(i, _), _| i != interface);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Self::Err> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredProperty>, Self::Err> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|((interface, path), row)| StoredProperty {
                interface: interface.clone(),
                major: row.major,
                path: path.clone(),
                ownership: row.ownership,
                value: row.value.clone(),
            })
            .collect())
    }

    async fn load_by_ownership(&self, ownership: Ownership) -> Result<Vec<StoredProperty>, Self::Err> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, row)| row.ownership == ownership)
            .map(|((interface, path), row)| StoredProperty {
                interface: interface.clone(),
                major: row.major,
                path: path.clone(),
                ownership: row.ownership,
                value: row.value.clone(),
            })
            .collect())
    }

    async fn load_by_interface(&self, interface: &str) -> Result<Vec<StoredProperty>, Self::Err> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((i, _), _)| i == interface)
            .map(|((interface, path), row)| StoredProperty {
                interface: interface.clone(),
                major: row.major,
                path: path.clone(),
                ownership: row.ownership,
                value: row.value.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_property_store;

    #[tokio::test]
    async fn memory_store_conforms_to_property_store_contract() {
        test_property_store(MemoryStore::new()).await;
    }
}
