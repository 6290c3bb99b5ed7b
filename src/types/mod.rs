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

//! The tagged union of every value an Astarte interface mapping can carry, plus the
//! [`AstarteAggregate`] trait used to turn a struct into an object-aggregation payload.

pub mod uuid;

use std::collections::HashMap;
use std::fmt::{self, Display};

use astarte_interfaces::MappingType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC instant, used for explicit timestamps and `datetime`/`datetimearray` values.
pub type Timestamp = DateTime<Utc>;

/// Error returned when converting to/from an [`AstarteData`] or validating one.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    /// The value's tag doesn't match the expected [`MappingType`].
    #[error("expected type {expected}, got {got}")]
    Mismatch {
        /// The mapping type that was expected.
        expected: MappingType,
        /// The mapping type the value actually carried.
        got: MappingType,
    },
    /// A generic conversion failure.
    #[error("conversion error: {ctx}")]
    Conversion {
        /// Context describing the failure.
        ctx: String,
    },
    /// An `integer` value was outside `[-2^31, 2^31 - 1]`.
    #[error("integer value {0} out of range for a 32-bit integer")]
    IntegerOutOfRange(i64),
    /// A `double` (or element of a `doublearray`) was NaN or infinite.
    #[error("double value must be finite, got {0}")]
    NotFinite(f64),
}

impl TypeError {
    pub(crate) fn conversion(ctx: impl Into<String>) -> Self {
        TypeError::Conversion { ctx: ctx.into() }
    }
}

/// A value carried by an Astarte interface mapping.
///
/// The `Serialize`/`Deserialize` derive gives this type a canonical, tagged binary encoding
/// (used by the property store, independent of the BSON wire encoding in `payload.rs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstarteData {
    /// `double`.
    Double(f64),
    /// `integer`, a signed 32-bit value.
    Integer(i32),
    /// `boolean`.
    Boolean(bool),
    /// `longinteger`, a signed 64-bit value.
    LongInteger(i64),
    /// `string`.
    String(String),
    /// `binaryblob`, an opaque byte string.
    BinaryBlob(Vec<u8>),
    /// `datetime`, a UTC instant.
    DateTime(Timestamp),
    /// `doublearray`.
    DoubleArray(Vec<f64>),
    /// `integerarray`.
    IntegerArray(Vec<i32>),
    /// `booleanarray`.
    BooleanArray(Vec<bool>),
    /// `longintegerarray`.
    LongIntegerArray(Vec<i64>),
    /// `stringarray`.
    StringArray(Vec<String>),
    /// `binaryblobarray`.
    BinaryBlobArray(Vec<Vec<u8>>),
    /// `datetimearray`.
    DateTimeArray(Vec<Timestamp>),
}

impl AstarteData {
    /// The [`MappingType`] tag of this value.
    #[must_use]
    pub fn display_type(&self) -> MappingType {
        match self {
            AstarteData::Double(_) => MappingType::Double,
            AstarteData::Integer(_) => MappingType::Integer,
            AstarteData::Boolean(_) => MappingType::Boolean,
            AstarteData::LongInteger(_) => MappingType::LongInteger,
            AstarteData::String(_) => MappingType::String,
            AstarteData::BinaryBlob(_) => MappingType::BinaryBlob,
            AstarteData::DateTime(_) => MappingType::DateTime,
            AstarteData::DoubleArray(_) => MappingType::DoubleArray,
            AstarteData::IntegerArray(_) => MappingType::IntegerArray,
            AstarteData::BooleanArray(_) => MappingType::BooleanArray,
            AstarteData::LongIntegerArray(_) => MappingType::LongIntegerArray,
            AstarteData::StringArray(_) => MappingType::StringArray,
            AstarteData::BinaryBlobArray(_) => MappingType::BinaryBlobArray,
            AstarteData::DateTimeArray(_) => MappingType::DateTimeArray,
        }
    }

    /// Checks the value against the type/range/finiteness rules of spec §4.1: `integer` must fit
    /// in `i32` (guaranteed by the Rust type, kept for symmetry with values built from raw
    /// wire integers), `double` (and `doublearray` elements) must be finite.
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            AstarteData::Double(v) if !v.is_finite() => Err(TypeError::NotFinite(*v)),
            AstarteData::DoubleArray(vs) => vs
                .iter()
                .find(|v| !v.is_finite())
                .map(|v| Err(TypeError::NotFinite(*v)))
                .unwrap_or(Ok(())),
            _ => Ok(()),
        }
    }

    /// Returns `true` if `self`'s tag matches `mapping_type`.
    #[must_use]
    pub fn matches_type(&self, mapping_type: MappingType) -> bool {
        self.display_type() == mapping_type
    }
}

impl Display for AstarteData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_type())
    }
}

macro_rules! from_scalar {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for AstarteData {
            fn from(value: $ty) -> Self {
                AstarteData::$variant(value.into())
            }
        }
    };
}

from_scalar!(Double, f64);
from_scalar!(Integer, i32);
from_scalar!(Boolean, bool);
from_scalar!(LongInteger, i64);
from_scalar!(String, String);
from_scalar!(BinaryBlob, Vec<u8>);
from_scalar!(DateTime, Timestamp);
from_scalar!(DoubleArray, Vec<f64>);
from_scalar!(IntegerArray, Vec<i32>);
from_scalar!(BooleanArray, Vec<bool>);
from_scalar!(LongIntegerArray, Vec<i64>);
from_scalar!(StringArray, Vec<String>);
from_scalar!(BinaryBlobArray, Vec<Vec<u8>>);
from_scalar!(DateTimeArray, Vec<Timestamp>);

impl From<&str> for AstarteData {
    fn from(value: &str) -> Self {
        AstarteData::String(value.to_string())
    }
}

macro_rules! try_from_scalar {
    ($variant:ident, $ty:ty) => {
        impl TryFrom<AstarteData> for $ty {
            type Error = TypeError;

            fn try_from(value: AstarteData) -> Result<Self, Self::Error> {
                match value {
                    AstarteData::$variant(v) => Ok(v),
                    other => Err(TypeError::Mismatch {
                        expected: MappingType::$variant,
                        got: other.display_type(),
                    }),
                }
            }
        }
    };
}

try_from_scalar!(Double, f64);
try_from_scalar!(Integer, i32);
try_from_scalar!(Boolean, bool);
try_from_scalar!(LongInteger, i64);
try_from_scalar!(String, String);
try_from_scalar!(BinaryBlob, Vec<u8>);
try_from_scalar!(DateTime, Timestamp);
try_from_scalar!(DoubleArray, Vec<f64>);
try_from_scalar!(IntegerArray, Vec<i32>);
try_from_scalar!(BooleanArray, Vec<bool>);
try_from_scalar!(LongIntegerArray, Vec<i64>);
try_from_scalar!(StringArray, Vec<String>);
try_from_scalar!(BinaryBlobArray, Vec<Vec<u8>>);
try_from_scalar!(DateTimeArray, Vec<Timestamp>);

/// Converts a struct into the `HashMap<String, AstarteData>` payload of an object-aggregated
/// interface. Implemented manually, or via `#[derive(AstarteAggregate)]`
/// (`astarte-device-sdk-derive`, feature `derive`).
pub trait AstarteAggregate {
    /// Performs the conversion.
    fn astarte_aggregate(self) -> Result<HashMap<String, AstarteData>, crate::Error>;
}

impl AstarteAggregate for HashMap<String, AstarteData> {
    fn astarte_aggregate(self) -> Result<HashMap<String, AstarteData>, crate::Error> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_double() {
        assert!(AstarteData::Double(f64::NAN).validate().is_err());
        assert!(AstarteData::Double(f64::INFINITY).validate().is_err());
        assert!(AstarteData::Double(1.5).validate().is_ok());
    }

    #[test]
    fn rejects_non_finite_double_array_element() {
        let value = AstarteData::DoubleArray(vec![1.0, f64::NAN]);
        assert!(value.validate().is_err());
    }

    #[test]
    fn display_type_matches_variant() {
        assert_eq!(AstarteData::Integer(1).display_type(), MappingType::Integer);
        assert_eq!(
            AstarteData::LongIntegerArray(vec![]).display_type(),
            MappingType::LongIntegerArray
        );
    }
}
