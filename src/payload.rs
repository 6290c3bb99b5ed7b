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

//! Wire encoding for the MQTT transport: BSON `{v, t?}` documents for individual/object
//! datastream and property payloads, and the deflate-framed ASCII list used for the
//! producer/consumer properties control topics.

use std::collections::HashMap;
use std::io::{Read, Write};

use astarte_interfaces::MappingType;
use bson::{Binary, Bson};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::types::{AstarteData, Timestamp};

/// Error returned while encoding or decoding a wire payload.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Failed to serialize a BSON document.
    #[error("couldn't serialize BSON payload")]
    Serialize(#[from] bson::ser::Error),
    /// Failed to parse a BSON document.
    #[error("couldn't parse BSON payload")]
    Deserialize(#[from] bson::de::Error),
    /// The `v` key was missing from an inbound document.
    #[error("payload is missing the 'v' key")]
    MissingValue,
    /// The BSON value's type didn't match the mapping's declared type.
    #[error("expected a BSON value compatible with {expected}, got {got:?}")]
    TypeMismatch {
        /// The mapping type the value was checked against.
        expected: MappingType,
        /// The BSON element type actually found.
        got: bson::spec::ElementType,
    },
    /// An array contained elements of more than one BSON type.
    #[error("array payload has heterogeneous element types")]
    HeterogeneousArray,
    /// Zlib (de)compression failed.
    #[error("couldn't (de)compress payload")]
    Zlib(#[from] std::io::Error),
    /// A producer/consumer-properties entry didn't contain at least an interface name segment.
    #[error("malformed properties-list entry: {0}")]
    MalformedEntry(String),
}

/// A decoded individual/object payload: the value plus an optional explicit timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<V> {
    /// The carried value.
    pub value: V,
    /// The explicit timestamp, if the document carried a `t` key.
    pub timestamp: Option<Timestamp>,
}

fn to_bson(value: &AstarteData) -> Bson {
    match value {
        AstarteData::Double(v) => Bson::Double(*v),
        AstarteData::Integer(v) => Bson::Int32(*v),
        AstarteData::Boolean(v) => Bson::Boolean(*v),
        AstarteData::LongInteger(v) => Bson::Int64(*v),
        AstarteData::String(v) => Bson::String(v.clone()),
        AstarteData::BinaryBlob(v) => Bson::Binary(Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: v.clone(),
        }),
        AstarteData::DateTime(v) => Bson::DateTime((*v).into()),
        AstarteData::DoubleArray(vs) => Bson::Array(vs.iter().map(|v| Bson::Double(*v)).collect()),
        AstarteData::IntegerArray(vs) => Bson::Array(vs.iter().map(|v| Bson::Int32(*v)).collect()),
        AstarteData::BooleanArray(vs) => {
            Bson::Array(vs.iter().map(|v| Bson::Boolean(*v)).collect())
        }
        AstarteData::LongIntegerArray(vs) => {
            Bson::Array(vs.iter().map(|v| Bson::Int64(*v)).collect())
        }
        AstarteData::StringArray(vs) => {
            Bson::Array(vs.iter().map(|v| Bson::String(v.clone())).collect())
        }
        AstarteData::BinaryBlobArray(vs) => Bson::Array(
            vs.iter()
                .map(|v| {
                    Bson::Binary(Binary {
                        subtype: bson::spec::BinarySubtype::Generic,
                        bytes: v.clone(),
                    })
                })
                .collect(),
        ),
        AstarteData::DateTimeArray(vs) => {
            Bson::Array(vs.iter().map(|v| Bson::DateTime((*v).into())).collect())
        }
    }
}

fn from_bson(bson: Bson, expected: MappingType) -> Result<AstarteData, PayloadError> {
    let got = bson.element_type();

    let mismatch = || PayloadError::TypeMismatch { expected, got };

    match expected {
        MappingType::Double => bson.as_f64().map(AstarteData::Double).ok_or_else(mismatch),
        MappingType::Integer => bson.as_i32().map(AstarteData::Integer).ok_or_else(mismatch),
        MappingType::Boolean => bson
            .as_bool()
            .map(AstarteData::Boolean)
            .ok_or_else(mismatch),
        MappingType::LongInteger => bson
            .as_i64()
            .map(AstarteData::LongInteger)
            .ok_or_else(mismatch),
        MappingType::String => match bson {
            Bson::String(v) => Ok(AstarteData::String(v)),
            _ => Err(mismatch()),
        },
        MappingType::BinaryBlob => match bson {
            Bson::Binary(b) => Ok(AstarteData::BinaryBlob(b.bytes)),
            _ => Err(mismatch()),
        },
        MappingType::DateTime => match bson {
            Bson::DateTime(v) => Ok(AstarteData::DateTime(v.into())),
            _ => Err(mismatch()),
        },
        MappingType::DoubleArray => array_elements(bson, mismatch, |b| b.as_f64())
            .map(AstarteData::DoubleArray),
        MappingType::IntegerArray => array_elements(bson, mismatch, |b| b.as_i32())
            .map(AstarteData::IntegerArray),
        MappingType::BooleanArray => array_elements(bson, mismatch, |b| b.as_bool())
            .map(AstarteData::BooleanArray),
        MappingType::LongIntegerArray => array_elements(bson, mismatch, |b| b.as_i64())
            .map(AstarteData::LongIntegerArray),
        MappingType::StringArray => {
            let Bson::Array(items) = bson else {
                return Err(mismatch());
            };
            items
                .into_iter()
                .map(|b| match b {
                    Bson::String(v) => Ok(v),
                    _ => Err(PayloadError::HeterogeneousArray),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AstarteData::StringArray)
        }
        MappingType::BinaryBlobArray => {
            let Bson::Array(items) = bson else {
                return Err(mismatch());
            };
            items
                .into_iter()
                .map(|b| match b {
                    Bson::Binary(blob) => Ok(blob.bytes),
                    _ => Err(PayloadError::HeterogeneousArray),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AstarteData::BinaryBlobArray)
        }
        MappingType::DateTimeArray => {
            let Bson::Array(items) = bson else {
                return Err(mismatch());
            };
            items
                .into_iter()
                .map(|b| match b {
                    Bson::DateTime(v) => Ok(v.into()),
                    _ => Err(PayloadError::HeterogeneousArray),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AstarteData::DateTimeArray)
        }
    }
}

fn array_elements<T>(
    bson: Bson,
    mismatch: impl Fn() -> PayloadError,
    extract: impl Fn(&Bson) -> Option<T>,
) -> Result<Vec<T>, PayloadError> {
    let Bson::Array(items) = bson else {
        return Err(mismatch());
    };

    items
        .iter()
        .map(|b| extract(b).ok_or(PayloadError::HeterogeneousArray))
        .collect()
}

/// Encodes an individual value, with an optional explicit timestamp, into a BSON `{v, t?}`
/// document.
pub fn encode_individual(
    value: &AstarteData,
    timestamp: Option<Timestamp>,
) -> Result<Vec<u8>, PayloadError> {
    encode_document(to_bson(value), timestamp)
}

/// Encodes an object-aggregated payload into a BSON `{v: {...}, t?}` document.
pub fn encode_object(
    values: &HashMap<String, AstarteData>,
    timestamp: Option<Timestamp>,
) -> Result<Vec<u8>, PayloadError> {
    let doc: bson::Document = values.iter().map(|(k, v)| (k.clone(), to_bson(v))).collect();
    encode_document(Bson::Document(doc), timestamp)
}

fn encode_document(v: Bson, timestamp: Option<Timestamp>) -> Result<Vec<u8>, PayloadError> {
    let mut doc = bson::doc! { "v": v };
    if let Some(ts) = timestamp {
        doc.insert("t", Bson::DateTime(ts.into()));
    }

    let mut bytes = Vec::new();
    doc.to_writer(&mut bytes)?;
    Ok(bytes)
}

/// Decodes a BSON individual payload. Returns `None` for a zero-length message (unset).
pub fn decode_individual(
    bytes: &[u8],
    expected: MappingType,
) -> Result<Option<Decoded<AstarteData>>, PayloadError> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let doc = bson::Document::from_reader(bytes)?;
    decode_document(doc, |v| from_bson(v, expected)).map(Some)
}

/// Decodes a BSON object payload. Returns `None` for a zero-length message (unset, only valid
/// on a resettable endpoint).
pub fn decode_object(
    bytes: &[u8],
    expected: impl Fn(&str) -> Option<MappingType>,
) -> Result<Option<Decoded<HashMap<String, AstarteData>>>, PayloadError> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let doc = bson::Document::from_reader(bytes)?;
    decode_document(doc, |v| {
        let Bson::Document(map) = v else {
            return Err(PayloadError::TypeMismatch {
                expected: MappingType::String,
                got: v.element_type(),
            });
        };

        map.into_iter()
            .map(|(k, v)| {
                let mapping_type = expected(&k).ok_or_else(|| {
                    PayloadError::MalformedEntry(format!("unknown object key {k}"))
                })?;
                from_bson(v, mapping_type).map(|value| (k, value))
            })
            .collect()
    })
    .map(Some)
}

fn decode_document<V>(
    mut doc: bson::Document,
    decode_value: impl FnOnce(Bson) -> Result<V, PayloadError>,
) -> Result<Decoded<V>, PayloadError> {
    let v = doc.remove("v").ok_or(PayloadError::MissingValue)?;
    let timestamp = match doc.remove("t") {
        Some(Bson::DateTime(dt)) => Some(dt.into()),
        _ => None,
    };

    decode_value(v).map(|value| Decoded { value, timestamp })
}

/// Encodes the producer/consumer-properties ASCII list: `"<iface><path>"` entries joined by
/// `;`, zlib-compressed, prefixed by the 4-byte little-endian length of the *uncompressed* list.
pub fn encode_properties_list(entries: &[String]) -> Result<Vec<u8>, PayloadError> {
    let joined = entries.join(";");

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(joined.as_bytes())?;
    let compressed = encoder.finish()?;

    let mut payload = Vec::with_capacity(4 + compressed.len());
    payload.extend_from_slice(&(joined.len() as u32).to_le_bytes());
    payload.extend_from_slice(&compressed);
    Ok(payload)
}

/// Decodes a producer/consumer-properties frame back into its `(interface_name, path)` entries.
/// Tolerates an empty uncompressed payload (empty list).
pub fn decode_properties_list(bytes: &[u8]) -> Result<Vec<(String, String)>, PayloadError> {
    if bytes.len() < 4 {
        return Ok(Vec::new());
    }

    let mut decoder = ZlibDecoder::new(&bytes[4..]);
    let mut decompressed = String::new();
    decoder.read_to_string(&mut decompressed)?;

    if decompressed.is_empty() {
        return Ok(Vec::new());
    }

    decompressed
        .split(';')
        .map(|entry| {
            let mut segments = entry.split('/');
            let interface_name = segments
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PayloadError::MalformedEntry(entry.to_string()))?;
            let path = segments.fold(String::new(), |mut acc, s| {
                acc.push('/');
                acc.push_str(s);
                acc
            });
            Ok((interface_name.to_string(), path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_individual_integer() {
        let value = AstarteData::Integer(42);
        let bytes = encode_individual(&value, None).unwrap();
        let decoded = decode_individual(&bytes, MappingType::Integer)
            .unwrap()
            .unwrap();

        assert_eq!(decoded.value, value);
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn round_trips_individual_with_timestamp() {
        let ts: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let value = AstarteData::Boolean(true);
        let bytes = encode_individual(&value, Some(ts)).unwrap();
        let decoded = decode_individual(&bytes, MappingType::Boolean)
            .unwrap()
            .unwrap();

        assert_eq!(decoded.value, value);
        assert_eq!(decoded.timestamp, Some(ts));
    }

    #[test]
    fn empty_payload_decodes_to_none() {
        assert!(decode_individual(&[], MappingType::Integer).unwrap().is_none());
    }

    #[test]
    fn round_trips_object_payload() {
        let mut values = HashMap::new();
        values.insert("x".to_string(), AstarteData::Integer(1));
        values.insert("y".to_string(), AstarteData::Integer(2));

        let bytes = encode_object(&values, None).unwrap();
        let decoded = decode_object(&bytes, |_| Some(MappingType::Integer))
            .unwrap()
            .unwrap();

        assert_eq!(decoded.value, values);
    }

    #[test]
    fn properties_list_round_trips() {
        let entries = vec!["com.x.P/a/b".to_string(), "com.x.P/a/c".to_string()];
        let bytes = encode_properties_list(&entries).unwrap();
        let decoded = decode_properties_list(&bytes).unwrap();

        assert_eq!(
            decoded,
            vec![
                ("com.x.P".to_string(), "/a/b".to_string()),
                ("com.x.P".to_string(), "/a/c".to_string()),
            ]
        );
    }

    #[test]
    fn empty_properties_list_round_trips() {
        let bytes = encode_properties_list(&[]).unwrap();
        let decoded = decode_properties_list(&bytes).unwrap();
        assert!(decoded.is_empty());
    }
}
