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

//! The SDK's error taxonomy (§7).

use crate::payload::PayloadError;
use crate::topic::TopicError;
use crate::types::TypeError;

/// Error returned by the Astarte device SDK.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Static violation of the interface schema (§3/§4.1).
    #[error("invalid interface schema")]
    Schema(#[from] astarte_interfaces::Error),

    /// Introspection lookup failure at publish or receive time.
    #[error("interface {0} not found in introspection")]
    InterfaceNotFound(String),

    /// Path/payload/timestamp mismatch discovered at runtime.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A publish was attempted while not in the `Connected` state.
    #[error("not connected")]
    NotConnected,

    /// An interface was added/removed while in the `Connecting` state.
    #[error("busy connecting")]
    BusyConnecting,

    /// Pairing returned `422`: the device is already registered.
    #[error("device already registered")]
    AlreadyRegistered,

    /// Pairing returned `401`/`403`.
    #[error("pairing authentication failed")]
    AuthError,

    /// Pairing returned any other non-2xx status.
    #[error("pairing API error: {status} {body}")]
    ApiError {
        /// The HTTP status code.
        status: u16,
        /// The response body, if any.
        body: String,
    },

    /// The property store returned a row with an unrepresentable ownership value.
    #[error("property store is corrupt")]
    StoreCorrupt,

    /// A link-layer failure surfaced by the transport adapter.
    #[error("transport error: {0}")]
    Transport(String),

    /// Couldn't convert to/from an Astarte type.
    #[error("couldn't convert Astarte type")]
    Types(#[from] TypeError),

    /// Couldn't encode/decode the wire payload.
    #[error("couldn't process payload")]
    Payload(#[from] PayloadError),

    /// Couldn't parse an inbound topic.
    #[error("invalid topic {}", .0.topic())]
    InvalidTopic(#[from] TopicError),

    /// The property store operation failed.
    #[error("property store operation failed")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An interface file or directory couldn't be read/parsed.
    #[error("couldn't add interface")]
    AddInterface(#[from] crate::introspection::AddInterfaceError),

    /// Builder configuration was incomplete or invalid.
    #[error("invalid device configuration")]
    Options(#[from] crate::options::BuilderError),

    /// The pairing HTTP client failed.
    #[error("pairing error")]
    Pairing(#[from] crate::pairing::PairingError),
}

impl Error {
    pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Store(Box::new(err))
    }
}
