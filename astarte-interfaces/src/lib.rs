// This file is part of Astarte.
//
// Copyright 2025 SECO Mind Srl
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

//! The Astarte interface schema model.
//!
//! This crate parses and validates Astarte interface definitions (the JSON schema documents
//! describing what a device may publish/receive) and exposes path/payload/timestamp validation
//! and reliability lookups over the resulting immutable [`Interface`].
//!
//! It has no knowledge of the actual transport or of Astarte's typed value representation: those
//! live in `astarte-device-sdk`, which depends on this crate for the schema side of validation.

pub mod error;
pub mod interface;
pub mod mapping;
pub mod schema;

pub use error::Error;
pub use interface::{DatabaseRetention, Interface, Retention};
pub use mapping::InterfaceMapping;
pub use schema::{Aggregation, InterfaceJson, InterfaceType, Mapping, MappingType, Ownership, Reliability};
