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

//! Error types for interface parsing and validation.

use crate::mapping::endpoint::EndpointError;
use crate::mapping::path::PathError;
use crate::mapping::MappingError;
use crate::schema::SchemaError;

/// Error returned while parsing or validating an interface definition.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The interface JSON couldn't be deserialized.
    #[error("couldn't deserialize the interface JSON")]
    Json(#[from] serde_json::Error),
    /// The interface file couldn't be read.
    #[error("couldn't read interface file")]
    Io(#[from] std::io::Error),
    /// A field of the interface JSON failed a retention/expiry constraint.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A mapping-level error (duplicate/empty/too many/too short for object).
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// The endpoint of a mapping couldn't be parsed.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    /// A concrete path couldn't be parsed.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The interface name doesn't match the required reverse-domain pattern.
    #[error("invalid interface name '{0}'")]
    InvalidName(String),
    /// Both `version_major` and `version_minor` were zero.
    #[error("interface version cannot be 0.0")]
    ZeroVersion,
    /// A negative version component was supplied.
    #[error("interface version components must be non-negative")]
    NegativeVersion,
    /// `aggregation: object` was combined with `type: properties`.
    #[error("interface '{0}' is a properties interface and cannot have object aggregation")]
    ObjectAggregationOnProperties(String),
    /// The mappings of an object-aggregated interface have mismatched `reliability` and/or
    /// `explicit_timestamp`.
    #[error("all the mappings of object interface '{0}' must share the same reliability and explicit_timestamp")]
    HeterogeneousObjectMapping(String),
    /// A `properties` mapping declared a datastream-only field (`reliability`,
    /// `explicit_timestamp`, `retention`, `database_retention_policy`).
    #[error("mapping '{endpoint}' of properties interface '{interface}' cannot declare datastream-only fields")]
    DatastreamFieldOnProperty {
        /// The interface name.
        interface: String,
        /// The offending mapping's endpoint.
        endpoint: String,
    },
    /// A `datastream` mapping declared `allow_unset`, which only applies to properties.
    #[error("mapping '{endpoint}' of datastream interface '{interface}' cannot declare allow_unset")]
    AllowUnsetOnDatastream {
        /// The interface name.
        interface: String,
        /// The offending mapping's endpoint.
        endpoint: String,
    },
    /// Adding this interface would introduce a duplicate endpoint once placeholders are erased.
    #[error("endpoint '{endpoint}' of interface '{interface}' collides with another mapping")]
    CollidingEndpoint {
        /// The interface name.
        interface: String,
        /// The colliding endpoint.
        endpoint: String,
    },
}

impl Error {
    /// The interface this error concerns, when known.
    #[must_use]
    pub fn interface_name(&self) -> Option<&str> {
        match self {
            Error::ObjectAggregationOnProperties(name) | Error::HeterogeneousObjectMapping(name) => {
                Some(name)
            }
            Error::DatastreamFieldOnProperty { interface, .. }
            | Error::AllowUnsetOnDatastream { interface, .. }
            | Error::CollidingEndpoint { interface, .. } => Some(interface),
            _ => None,
        }
    }
}
