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

//! The transport contract (§6) consumed by the device core and implemented by the MQTT and
//! gRPC/message-hub adapters.
//!
//! The core is async-native rather than thread-owning (§9's "do not leak the transport thread's
//! identity"): the adapter's publish/subscribe half is a cheap, cloneable [`Connection`] handed
//! out to every [`crate::client::DeviceClient`] clone, while its inbound half is an [`EventLoop`]
//! driven exclusively by [`crate::device::DeviceConnection`].

#[cfg(feature = "message-hub")]
pub mod grpc;
pub mod mqtt;

use std::future::Future;

/// An inbound occurrence surfaced by the transport's event loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The link came up. `session_present` mirrors the broker/peer's session-resumption signal
    /// (§4.4: a resumed session skips the handshake burst but still fires `on_connected`).
    LinkUp {
        /// Whether the peer indicated a resumable prior session.
        session_present: bool,
    },
    /// The link went down. `reason = 0` means user-requested (`disconnect()` was called).
    LinkDown {
        /// Why the link went down.
        reason: u8,
    },
    /// A message arrived on `topic`.
    Message {
        /// The full topic/route the message arrived on.
        topic: String,
        /// The raw payload bytes.
        payload: Vec<u8>,
    },
}

/// The publish/subscribe half of the transport contract: cheap to clone, safe to call
/// concurrently from any number of [`crate::client::DeviceClient`] handles.
pub trait Connection: Clone + Send + Sync + 'static {
    /// The error a publish/subscribe operation can fail with.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Publishes `payload` to `topic` at the given QoS.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: u8,
        retain: bool,
    ) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Subscribes to `topic` at QoS 2 (the only QoS the adapters use for control topics).
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Subscribes to every topic in `topics` in one round-trip, where the transport supports it.
    fn subscribe_many(&self, topics: Vec<String>) -> impl Future<Output = Result<(), Self::Err>> + Send {
        async move {
            for topic in topics {
                self.subscribe(&topic).await?;
            }
            Ok(())
        }
    }

    /// Unsubscribes from `topic`.
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Requests a cooperative teardown of the link. `disconnect()` is non-blocking; completion is
    /// signalled by a [`TransportEvent::LinkDown`] with `reason = 0` on the event loop.
    fn disconnect(&self) -> impl Future<Output = Result<(), Self::Err>> + Send;
}

/// The inbound half of the transport contract, polled exclusively by the connection's event
/// loop (never cloned, never shared: §5's "do not leak the transport thread's identity" becomes
/// "do not leak the event loop's exclusive ownership").
pub trait EventLoop: Send + 'static {
    /// The error a poll can fail with; a poll failure is itself a [`TransportEvent::LinkDown`]
    /// trigger, not a fatal error (§4.4: automatic reconnection is indefinite).
    type Err: std::error::Error + Send + Sync + 'static;

    /// Waits for and returns the next transport event.
    fn poll(&mut self) -> impl Future<Output = Result<TransportEvent, Self::Err>> + Send;
}
