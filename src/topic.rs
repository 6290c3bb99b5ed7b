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

//! Parses an inbound MQTT topic of the form `<realm>/<device_id>/<interface>/<path>` into its
//! components, or recognizes the purge-properties control topic.

use std::fmt::Display;

use tracing::trace;

/// Error returned when parsing a topic.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum TopicError {
    /// Empty topic.
    #[error("topic is empty")]
    Empty,
    /// The topic doesn't start with `<realm>/<device_id>`.
    #[error(
        "the topic should start with <realm>/<device_id> equal to {client_id}, received: {topic}"
    )]
    UnknownClientId {
        /// The expected `<realm>/<device_id>` prefix.
        client_id: String,
        /// The topic that was received.
        topic: String,
    },
    /// The topic isn't in the form `<realm>/<device_id>/<interface>/<path>`.
    #[error(
        "the topic should be in the form <realm>/<device_id>/<interface>/<path>, received: {0}"
    )]
    Malformed(String),
}

impl TopicError {
    /// Returns the offending topic string.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            TopicError::Empty => "",
            TopicError::UnknownClientId { topic, .. } => topic,
            TopicError::Malformed(topic) => topic,
        }
    }
}

/// `<realm>/<device_id>`, generic so it can be held by value (`String`) or borrowed (`&str`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientId<T> {
    /// The realm the device belongs to.
    pub realm: T,
    /// The device's base64url-encoded id.
    pub device_id: T,
}

impl<T> Display for ClientId<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.realm, self.device_id)
    }
}

impl ClientId<String> {
    /// Borrows this id's fields.
    #[must_use]
    pub fn as_ref(&self) -> ClientId<&str> {
        ClientId {
            realm: self.realm.as_str(),
            device_id: self.device_id.as_str(),
        }
    }
}

/// A topic parsed against a known client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTopic<'a> {
    /// The `control/consumer/properties` purge-list topic.
    PurgeProperties,
    /// `<interface>/<path>`.
    InterfacePath {
        /// The interface name.
        interface: &'a str,
        /// The path, always starting with `/`.
        path: &'a str,
    },
}

impl<'a> ParsedTopic<'a> {
    const PURGE_PROPERTIES_TOPIC: &'static str = "control/consumer/properties";

    /// Parses `topic` assuming it was received on a connection identified by `client_id`.
    ///
    /// Tolerates extra path segments after the purge-properties topic: they fall through to
    /// ordinary interface/path parsing rather than being rejected, since an interface name can
    /// never contain `/` (§3) and the source parser behaves this way.
    pub fn try_parse(client_id: ClientId<&str>, topic: &'a str) -> Result<Self, TopicError> {
        if topic.is_empty() {
            return Err(TopicError::Empty);
        }

        let rest = topic
            .strip_prefix(client_id.realm)
            .and_then(|s| s.strip_prefix('/'))
            .and_then(|s| s.strip_prefix(client_id.device_id))
            .ok_or_else(|| TopicError::UnknownClientId {
                client_id: client_id.to_string(),
                topic: topic.to_string(),
            })?;

        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| TopicError::Malformed(topic.to_string()))?;

        trace!(rest, "stripped client id from topic");

        if rest == Self::PURGE_PROPERTIES_TOPIC {
            return Ok(Self::PurgeProperties);
        }

        let idx = rest
            .find('/')
            .ok_or_else(|| TopicError::Malformed(topic.to_string()))?;

        let (interface, path) = rest.split_at(idx);

        if interface.is_empty() || path.is_empty() {
            return Err(TopicError::Malformed(topic.to_string()));
        }

        Ok(Self::InterfacePath { interface, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: ClientId<&'static str> = ClientId {
        realm: "test",
        device_id: "u-WraCwtK_G_fjJf63TiAw",
    };

    #[test]
    fn parses_interface_path_topic() {
        let topic = "test/u-WraCwtK_G_fjJf63TiAw/com.interface.test/led/red".to_owned();
        let ParsedTopic::InterfacePath { interface, path } =
            ParsedTopic::try_parse(CLIENT_ID, &topic).unwrap()
        else {
            panic!("wrong variant parsed");
        };

        assert_eq!(interface, "com.interface.test");
        assert_eq!(path, "/led/red");
    }

    #[test]
    fn parses_purge_properties_topic() {
        let topic = "test/u-WraCwtK_G_fjJf63TiAw/control/consumer/properties".to_owned();
        let parsed = ParsedTopic::try_parse(CLIENT_ID, &topic);

        assert!(matches!(parsed, Ok(ParsedTopic::PurgeProperties)));
    }

    #[test]
    fn tolerates_extra_segments_after_purge_properties() {
        let topic = "test/u-WraCwtK_G_fjJf63TiAw/control/consumer/properties/another".to_owned();
        let ParsedTopic::InterfacePath { interface, path } =
            ParsedTopic::try_parse(CLIENT_ID, &topic).unwrap()
        else {
            panic!("wrong variant parsed");
        };

        assert_eq!(interface, "control");
        assert_eq!(path, "/consumer/properties/another");
    }

    #[test]
    fn rejects_empty_topic() {
        let err = ParsedTopic::try_parse(CLIENT_ID, "").unwrap_err();
        assert!(matches!(err, TopicError::Empty));
    }

    #[test]
    fn rejects_unknown_client_id() {
        let topic = "test/u-WraCwtK_G_different/com.interface.test/led/red".to_owned();
        let err = ParsedTopic::try_parse(CLIENT_ID, &topic).unwrap_err();
        assert!(matches!(err, TopicError::UnknownClientId { .. }));
    }

    #[test]
    fn rejects_malformed_topic() {
        let topic = "test/u-WraCwtK_G_fjJf63TiAw/com.interface.test".to_owned();
        let err = ParsedTopic::try_parse(CLIENT_ID, &topic).unwrap_err();
        assert!(matches!(err, TopicError::Malformed(_)));
    }
}
