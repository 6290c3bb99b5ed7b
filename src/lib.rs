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

//! Communication and pairing primitives for an Astarte IoT device: interface schema validation
//! (`astarte-interfaces`), introspection, a durable property store, a connect/disconnect state
//! machine, and MQTT/message-hub transport adapters implementing the publish and receive
//! pipelines.

pub mod client;
pub mod connection;
pub mod device;
mod error;
pub mod introspection;
pub mod options;
pub mod pairing;
mod payload;
pub mod store;
mod topic;
pub mod types;

pub use astarte_interfaces::{Interface, MappingType, Ownership};
pub use client::{AstarteObject, ConnectionState, DeviceClient};
pub use device::{DeviceConnection, DeviceEvent};
pub use error::Error;
pub use introspection::{DeviceIntrospection, DynamicIntrospection};
pub use options::{BuilderError, DeviceBuilder};
pub use store::{MemoryStore, PropertyStore, SqliteStore};
pub use types::{AstarteAggregate, AstarteData, Timestamp};

#[cfg(feature = "derive")]
pub use astarte_device_sdk_derive::AstarteAggregate;

#[cfg(feature = "message-hub")]
pub use options::GrpcConfig;
