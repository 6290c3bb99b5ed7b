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

//! The validated, immutable [`Interface`] and its construction from the JSON schema.

use std::collections::HashSet;
use std::fmt::Display;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::Error;
use crate::mapping::collection::MappingIter;
use crate::mapping::datastream::{DatastreamIndividualMapping, DatastreamObjectMapping};
use crate::mapping::path::MappingPath;
use crate::mapping::properties::PropertiesMapping;
use crate::mapping::InterfaceMapping;
use crate::schema::{Aggregation, InterfaceJson, InterfaceType, Mapping, Ownership, Reliability};

/// Maximum number of mappings an interface may declare.
pub const MAX_INTERFACE_MAPPINGS: usize = 1024;

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9]*\.([A-Za-z0-9][A-Za-z0-9-]*\.)*)?[A-Za-z][A-Za-z0-9]*$")
            .expect("valid regex")
    })
}

/// Retention policy for datastream samples the transport cannot currently deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Discard undeliverable samples.
    Discard,
    /// Keep undeliverable samples in memory.
    Volatile {
        /// How long to keep the sample, `None` meaning forever.
        expiry: Option<Duration>,
    },
    /// Keep undeliverable samples on disk.
    Stored {
        /// How long to keep the sample, `None` meaning forever.
        expiry: Option<Duration>,
    },
}

impl Default for Retention {
    fn default() -> Self {
        Retention::Discard
    }
}

impl Retention {
    /// The expiry in seconds, for re-serialization to the JSON schema.
    #[must_use]
    pub fn as_expiry_seconds(&self) -> Option<i64> {
        match self {
            Retention::Discard => None,
            Retention::Volatile { expiry } | Retention::Stored { expiry } => {
                expiry.map(|d| d.as_secs() as i64)
            }
        }
    }
}

impl From<Retention> for crate::schema::Retention {
    fn from(value: Retention) -> Self {
        match value {
            Retention::Discard => crate::schema::Retention::Discard,
            Retention::Volatile { .. } => crate::schema::Retention::Volatile,
            Retention::Stored { .. } => crate::schema::Retention::Stored,
        }
    }
}

/// Database retention policy for datastream samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseRetention {
    /// Samples never expire from the database.
    NoTtl,
    /// Samples expire after `ttl`.
    UseTtl {
        /// Time to live.
        ttl: Duration,
    },
}

impl Default for DatabaseRetention {
    fn default() -> Self {
        DatabaseRetention::NoTtl
    }
}

impl DatabaseRetention {
    /// The ttl in seconds, for re-serialization to the JSON schema.
    #[must_use]
    pub fn as_ttl_secs(&self) -> Option<i64> {
        match self {
            DatabaseRetention::NoTtl => None,
            DatabaseRetention::UseTtl { ttl } => Some(ttl.as_secs() as i64),
        }
    }
}

impl From<DatabaseRetention> for crate::schema::DatabaseRetentionPolicy {
    fn from(value: DatabaseRetention) -> Self {
        match value {
            DatabaseRetention::NoTtl => crate::schema::DatabaseRetentionPolicy::NoTtl,
            DatabaseRetention::UseTtl { .. } => crate::schema::DatabaseRetentionPolicy::UseTtl,
        }
    }
}

/// Fields shared by every interface kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCommon {
    name: String,
    version_major: i32,
    version_minor: i32,
    ownership: Ownership,
}

impl InterfaceCommon {
    /// The interface's dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The interface's major version.
    #[must_use]
    pub fn version_major(&self) -> i32 {
        self.version_major
    }

    /// The interface's minor version.
    #[must_use]
    pub fn version_minor(&self) -> i32 {
        self.version_minor
    }

    /// The interface's ownership.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

/// A datastream interface with individual aggregation: every mapping is an independent stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastreamIndividual {
    common: InterfaceCommon,
    mappings: Vec<DatastreamIndividualMapping>,
}

/// A datastream interface with object aggregation: all mappings are sent/received atomically
/// under a shared path prefix, and share `reliability`/`explicit_timestamp`/retention settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastreamObject {
    common: InterfaceCommon,
    reliability: Reliability,
    explicit_timestamp: bool,
    retention: Retention,
    database_retention: DatabaseRetention,
    mappings: Vec<DatastreamObjectMapping>,
}

impl DatastreamObject {
    /// Shared reliability of every mapping of this interface.
    #[must_use]
    pub fn reliability(&self) -> Reliability {
        self.reliability
    }

    /// Shared explicit-timestamp requirement of every mapping of this interface.
    #[must_use]
    pub fn explicit_timestamp(&self) -> bool {
        self.explicit_timestamp
    }
}

/// A properties interface: a last-write-wins key-value namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    common: InterfaceCommon,
    mappings: Vec<PropertiesMapping>,
}

/// A validated, immutable interface definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interface {
    /// Datastream, individual aggregation.
    DatastreamIndividual(DatastreamIndividual),
    /// Datastream, object aggregation.
    DatastreamObject(DatastreamObject),
    /// Properties.
    Properties(Properties),
}

impl Interface {
    /// Parses and validates an interface from its JSON text representation.
    pub fn from_str(json: &str) -> Result<Self, Error> {
        let def: InterfaceJson<String> = serde_json::from_str(json)?;
        Self::from_definition(def)
    }

    /// Parses and validates an interface from a `.json` file on disk.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Validates a deserialized interface definition, enforcing every constraint of the schema.
    pub fn from_definition<T>(def: InterfaceJson<T>) -> Result<Self, Error>
    where
        T: AsRef<str> + Into<String> + Clone,
    {
        let name: String = def.interface_name.clone().into();

        if !name_re().is_match(&name) {
            return Err(Error::InvalidName(name));
        }

        if def.version_major < 0 || def.version_minor < 0 {
            return Err(Error::NegativeVersion);
        }

        if def.version_major == 0 && def.version_minor == 0 {
            return Err(Error::ZeroVersion);
        }

        if def.mappings.is_empty() {
            return Err(crate::mapping::MappingError::Empty.into());
        }

        if def.mappings.len() > MAX_INTERFACE_MAPPINGS {
            return Err(crate::mapping::MappingError::TooMany(def.mappings.len()).into());
        }

        let common = InterfaceCommon {
            name: name.clone(),
            version_major: def.version_major,
            version_minor: def.version_minor,
            ownership: def.ownership,
        };

        match def.interface_type {
            InterfaceType::Properties => {
                if matches!(def.aggregation, Some(Aggregation::Object)) {
                    return Err(Error::ObjectAggregationOnProperties(name));
                }

                let mappings = build_properties_mappings(&name, def.mappings)?;

                Ok(Interface::Properties(Properties { common, mappings }))
            }
            InterfaceType::Datastream => match def.aggregation.unwrap_or_default() {
                Aggregation::Individual => {
                    let mappings = build_individual_mappings(&name, def.mappings)?;

                    Ok(Interface::DatastreamIndividual(DatastreamIndividual {
                        common,
                        mappings,
                    }))
                }
                Aggregation::Object => {
                    let (reliability, explicit_timestamp, retention, database_retention, mappings) =
                        build_object_mappings(&name, def.mappings)?;

                    Ok(Interface::DatastreamObject(DatastreamObject {
                        common,
                        reliability,
                        explicit_timestamp,
                        retention,
                        database_retention,
                        mappings,
                    }))
                }
            },
        }
    }

    /// Fields shared by every interface kind.
    #[must_use]
    pub fn common(&self) -> &InterfaceCommon {
        match self {
            Interface::DatastreamIndividual(i) => &i.common,
            Interface::DatastreamObject(i) => &i.common,
            Interface::Properties(i) => &i.common,
        }
    }

    /// The interface's dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.common().name()
    }

    /// The interface's major version.
    #[must_use]
    pub fn version_major(&self) -> i32 {
        self.common().version_major()
    }

    /// The interface's minor version.
    #[must_use]
    pub fn version_minor(&self) -> i32 {
        self.common().version_minor()
    }

    /// The interface's ownership.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.common().ownership()
    }

    /// Returns `true` if this interface's data flows from device to server.
    #[must_use]
    pub fn is_device_owned(&self) -> bool {
        self.ownership().is_device()
    }

    /// Returns `true` if this interface's data flows from server to device.
    #[must_use]
    pub fn is_server_owned(&self) -> bool {
        self.ownership().is_server()
    }

    /// Returns `true` if this interface is a `properties` interface.
    #[must_use]
    pub fn is_property(&self) -> bool {
        matches!(self, Interface::Properties(_))
    }

    /// Returns `true` if this interface is object-aggregated.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Interface::DatastreamObject(_))
    }

    /// The introspection line fragment for this interface: `"<name>:<major>:<minor>"`.
    #[must_use]
    pub fn introspection_entry(&self) -> String {
        format!(
            "{}:{}:{}",
            self.name(),
            self.version_major(),
            self.version_minor()
        )
    }

    /// Iterates over all the mappings of this interface, regardless of aggregation.
    pub fn iter_mappings(&self) -> MappingIter<'_> {
        match self {
            Interface::DatastreamIndividual(i) => MappingIter::Individual(i.mappings.iter()),
            Interface::DatastreamObject(i) => MappingIter::Object(i.mappings.iter()),
            Interface::Properties(i) => MappingIter::Properties(i.mappings.iter()),
        }
    }

    /// Returns the unique mapping whose endpoint template matches `path`, if any.
    #[must_use]
    pub fn get_mapping(&self, path: &str) -> Option<&dyn InterfaceMapping> {
        self.iter_mappings().find(|m| m.endpoint().matches(path))
    }

    /// The mapping type expected at `path`, if any mapping matches it.
    #[must_use]
    pub fn mapping_type(&self, path: &str) -> Option<crate::schema::MappingType> {
        self.get_mapping(path).map(InterfaceMapping::mapping_type)
    }

    /// Validates that `path` (and, for object aggregation, every key in `keys` joined to `path`)
    /// resolves to a declared mapping.
    pub fn validate_path<'k>(
        &self,
        path: &str,
        keys: impl Iterator<Item = &'k str>,
    ) -> Result<(), Error> {
        let mapping_path = MappingPath::try_from_str(path)?;

        match self {
            Interface::DatastreamObject(_) => {
                let mut any = false;

                for key in keys {
                    any = true;
                    let resolved = mapping_path.join(key);

                    if self.get_mapping(&resolved).is_none() {
                        return Err(Error::CollidingEndpoint {
                            interface: self.name().to_string(),
                            endpoint: resolved,
                        });
                    }
                }

                if !any && self.get_mapping(path).is_none() {
                    return Err(Error::CollidingEndpoint {
                        interface: self.name().to_string(),
                        endpoint: path.to_string(),
                    });
                }

                Ok(())
            }
            _ => {
                if self.get_mapping(path).is_some() {
                    Ok(())
                } else {
                    Err(Error::CollidingEndpoint {
                        interface: self.name().to_string(),
                        endpoint: path.to_string(),
                    })
                }
            }
        }
    }

    /// For `object` aggregation, checks that `keys` covers every mapping of this interface. Only
    /// meaningful (and only called by the core) for device-owned objects, see spec §4.1.
    #[must_use]
    pub fn is_object_payload_complete<'k>(&self, keys: impl Iterator<Item = &'k str>) -> bool {
        let Interface::DatastreamObject(obj) = self else {
            return true;
        };

        let provided: HashSet<&str> = keys.collect();

        obj.mappings
            .iter()
            .all(|m| provided.contains(last_segment(&m.endpoint.to_string())))
    }

    /// Validates that a timestamp is present iff the mapping at `path` requires one.
    pub fn validate_timestamp(&self, path: &str, has_timestamp: bool) -> Result<(), Error> {
        let required = match self {
            Interface::Properties(_) => false,
            Interface::DatastreamObject(obj) => obj.explicit_timestamp,
            Interface::DatastreamIndividual(i) => i
                .mappings
                .iter()
                .find(|m| m.endpoint.matches(path))
                .map(DatastreamIndividualMapping::explicit_timestamp)
                .unwrap_or(false),
        };

        if self.is_property() || required == has_timestamp {
            return Ok(());
        }

        let reason = if required {
            "missing required explicit timestamp"
        } else {
            "unexpected timestamp"
        };

        Err(Error::CollidingEndpoint {
            interface: self.name().to_string(),
            endpoint: format!("{path} ({reason})"),
        })
    }

    /// The QoS-equivalent reliability to use when publishing at `path`: `2` for properties, the
    /// mapping's (or object's) reliability otherwise.
    #[must_use]
    pub fn reliability(&self, path: &str) -> u8 {
        match self {
            Interface::Properties(_) => 2,
            Interface::DatastreamObject(obj) => reliability_to_qos(obj.reliability),
            Interface::DatastreamIndividual(i) => i
                .mappings
                .iter()
                .find(|m| m.endpoint.matches(path))
                .map(|m| reliability_to_qos(m.reliability()))
                .unwrap_or(0),
        }
    }

    /// Returns `true` if this is a properties interface and the mapping at `path` allows unset.
    #[must_use]
    pub fn is_property_endpoint_resettable(&self, path: &str) -> bool {
        let Interface::Properties(props) = self else {
            return false;
        };

        props
            .mappings
            .iter()
            .find(|m| m.endpoint.matches(path))
            .is_some_and(PropertiesMapping::allow_unset)
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.introspection_entry())
    }
}

fn reliability_to_qos(reliability: Reliability) -> u8 {
    match reliability {
        Reliability::Unreliable => 0,
        Reliability::Guaranteed => 1,
        Reliability::Unique => 2,
    }
}

fn last_segment(endpoint: &str) -> &str {
    endpoint.rsplit('/').next().unwrap_or(endpoint)
}

fn check_no_collision(name: &str, keys: &mut HashSet<String>, endpoint_key: String) -> Result<(), Error> {
    if !keys.insert(endpoint_key.clone()) {
        return Err(Error::CollidingEndpoint {
            interface: name.to_string(),
            endpoint: endpoint_key,
        });
    }

    Ok(())
}

fn build_properties_mappings<T>(
    name: &str,
    defs: Vec<Mapping<T>>,
) -> Result<Vec<PropertiesMapping>, Error>
where
    T: AsRef<str> + Into<String>,
{
    let mut keys = HashSet::new();
    let mut mappings = Vec::with_capacity(defs.len());

    for def in defs {
        if def.reliability.is_some()
            || def.explicit_timestamp.is_some()
            || def.retention.is_some()
            || def.database_retention_policy.is_some()
        {
            return Err(Error::DatastreamFieldOnProperty {
                interface: name.to_string(),
                endpoint: def.endpoint.as_ref().to_string(),
            });
        }

        let mapping = PropertiesMapping::try_from(def)?;
        check_no_collision(name, &mut keys, mapping.endpoint.canonical_key())?;
        mappings.push(mapping);
    }

    Ok(mappings)
}

fn build_individual_mappings<T>(
    name: &str,
    defs: Vec<Mapping<T>>,
) -> Result<Vec<DatastreamIndividualMapping>, Error>
where
    T: AsRef<str> + Into<String>,
{
    let mut keys = HashSet::new();
    let mut mappings = Vec::with_capacity(defs.len());

    for def in defs {
        if def.allow_unset.is_some() {
            return Err(Error::AllowUnsetOnDatastream {
                interface: name.to_string(),
                endpoint: def.endpoint.as_ref().to_string(),
            });
        }

        let mapping = DatastreamIndividualMapping::try_from(def)?;
        check_no_collision(name, &mut keys, mapping.endpoint.canonical_key())?;
        mappings.push(mapping);
    }

    Ok(mappings)
}

#[allow(clippy::type_complexity)]
fn build_object_mappings<T>(
    name: &str,
    defs: Vec<Mapping<T>>,
) -> Result<
    (
        Reliability,
        bool,
        Retention,
        DatabaseRetention,
        Vec<DatastreamObjectMapping>,
    ),
    Error,
>
where
    T: AsRef<str> + Into<String>,
{
    let mut keys = HashSet::new();
    let mut mappings = Vec::with_capacity(defs.len());
    let mut shared: Option<(Reliability, bool, Retention, DatabaseRetention)> = None;

    for def in defs {
        if def.allow_unset.is_some() {
            return Err(Error::AllowUnsetOnDatastream {
                interface: name.to_string(),
                endpoint: def.endpoint.as_ref().to_string(),
            });
        }

        let reliability = def.reliability.unwrap_or_default();
        let explicit_timestamp = def.explicit_timestamp.unwrap_or_default();
        let retention = def.retention_with_expiry()?;
        let database_retention = def.database_retention_with_ttl()?;

        match &shared {
            None => shared = Some((reliability, explicit_timestamp, retention, database_retention)),
            Some((r, ts, ret, dbret)) => {
                if *r != reliability
                    || *ts != explicit_timestamp
                    || *ret != retention
                    || *dbret != database_retention
                {
                    return Err(Error::HeterogeneousObjectMapping(name.to_string()));
                }
            }
        }

        let mapping = DatastreamObjectMapping::try_from(def)?;
        check_no_collision(name, &mut keys, mapping.endpoint.canonical_key())?;
        mappings.push(mapping);
    }

    let (reliability, explicit_timestamp, retention, database_retention) =
        shared.unwrap_or((Reliability::default(), false, Retention::default(), DatabaseRetention::default()));

    Ok((
        reliability,
        explicit_timestamp,
        retention,
        database_retention,
        mappings,
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn individual_json() -> &'static str {
        r#"{
            "interface_name": "com.x.T",
            "version_major": 0,
            "version_minor": 1,
            "type": "datastream",
            "ownership": "device",
            "mappings": [{
                "endpoint": "/s/v",
                "type": "integer"
            }]
        }"#
    }

    #[test]
    fn zero_version_is_rejected() {
        let json = r#"{
            "interface_name": "com.x.T",
            "version_major": 0,
            "version_minor": 0,
            "type": "datastream",
            "ownership": "device",
            "mappings": [{"endpoint": "/s/v", "type": "integer"}]
        }"#;

        let err = Interface::from_str(json).unwrap_err();
        assert!(matches!(err, Error::ZeroVersion));
    }

    #[test]
    fn parses_individual_datastream() {
        let interface = Interface::from_str(individual_json()).unwrap();

        assert_eq!(interface.name(), "com.x.T");
        assert!(interface.get_mapping("/s/v").is_some());
        assert!(interface.get_mapping("/s/other").is_none());
        assert_eq!(interface.reliability("/s/v"), 0);
    }

    #[test]
    fn object_requires_two_segments() {
        let json = r#"{
            "interface_name": "com.x.Obj",
            "version_major": 1,
            "version_minor": 0,
            "type": "datastream",
            "aggregation": "object",
            "ownership": "device",
            "mappings": [{"endpoint": "/v", "type": "integer"}]
        }"#;

        let err = Interface::from_str(json).unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(crate::mapping::MappingError::TooShortForObject(_))
        ));
    }

    #[test]
    fn object_rejects_heterogeneous_mappings() {
        let json = r#"{
            "interface_name": "com.x.Obj",
            "version_major": 1,
            "version_minor": 0,
            "type": "datastream",
            "aggregation": "object",
            "ownership": "device",
            "mappings": [
                {"endpoint": "/s/x", "type": "integer", "reliability": "unreliable"},
                {"endpoint": "/s/y", "type": "integer", "reliability": "guaranteed"}
            ]
        }"#;

        let err = Interface::from_str(json).unwrap_err();
        assert!(matches!(err, Error::HeterogeneousObjectMapping(_)));
    }

    #[test]
    fn object_completeness_check() {
        let json = r#"{
            "interface_name": "com.x.Obj",
            "version_major": 1,
            "version_minor": 0,
            "type": "datastream",
            "aggregation": "object",
            "ownership": "device",
            "mappings": [
                {"endpoint": "/s/x", "type": "integer"},
                {"endpoint": "/s/y", "type": "integer"}
            ]
        }"#;

        let interface = Interface::from_str(json).unwrap();

        assert!(interface.is_object_payload_complete(["x", "y"].into_iter()));
        assert!(!interface.is_object_payload_complete(["x"].into_iter()));
    }

    #[test]
    fn allow_unset_on_datastream_is_rejected() {
        let json = r#"{
            "interface_name": "com.x.T",
            "version_major": 1,
            "version_minor": 0,
            "type": "datastream",
            "ownership": "device",
            "mappings": [{"endpoint": "/s/v", "type": "integer", "allow_unset": true}]
        }"#;

        let err = Interface::from_str(json).unwrap_err();
        assert!(matches!(err, Error::AllowUnsetOnDatastream { .. }));
    }

    #[test]
    fn allow_unset_is_parsed_for_server_owned_properties() {
        let json = r#"{
            "interface_name": "com.x.P",
            "version_major": 1,
            "version_minor": 0,
            "type": "properties",
            "ownership": "server",
            "mappings": [{"endpoint": "/a/b", "type": "boolean", "allow_unset": true}]
        }"#;

        let interface = Interface::from_str(json).unwrap();

        assert!(interface.is_server_owned());
        assert!(interface.is_property_endpoint_resettable("/a/b"));
    }
}
