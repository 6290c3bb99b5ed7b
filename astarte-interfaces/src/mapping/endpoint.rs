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

//! Endpoint template parsing and path matching.
//!
//! An endpoint is a `/`-separated sequence of segments, each either a literal
//! identifier or a `%{name}` placeholder. A concrete path matches an endpoint
//! when it has the same number of segments and every literal segment is equal
//! character for character.

use std::fmt::{self, Display};
use std::sync::OnceLock;

use regex::Regex;

/// Maximum number of segments an endpoint may have.
pub const MAX_ENDPOINT_SEGMENTS: usize = 64;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Error returned when parsing an [`Endpoint`].
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EndpointError {
    /// The endpoint string was empty.
    #[error("endpoint cannot be empty")]
    Empty,
    /// The endpoint didn't start with `/`.
    #[error("endpoint must start with '/': '{0}'")]
    MissingLeadingSlash(String),
    /// The endpoint has more segments than allowed.
    #[error("endpoint '{0}' has too many segments, max is {max}", max = MAX_ENDPOINT_SEGMENTS)]
    TooManySegments(String),
    /// A segment was neither a valid identifier nor a valid `%{placeholder}`.
    #[error("invalid segment '{segment}' in endpoint '{endpoint}'")]
    InvalidSegment {
        /// The offending segment.
        segment: String,
        /// The full endpoint string.
        endpoint: String,
    },
}

/// A parsed endpoint template, e.g. `/sensor/%{id}/value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<T> {
    raw: T,
    pub(crate) segments: Vec<Segment>,
}

impl<T> Endpoint<T> {
    /// Number of segments in the endpoint.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the endpoint has no segments (never true for a valid endpoint).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` if any segment of the endpoint is a `%{placeholder}`.
    #[must_use]
    pub fn is_parametric(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)))
    }

    /// A key used to detect endpoints that would collide on some concrete path: placeholder
    /// names are erased since any two placeholders in the same position match the same set of
    /// concrete segments.
    pub(crate) fn canonical_key(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.as_str(),
                Segment::Placeholder(_) => "%",
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Returns `true` if the concrete `path` (leading `/`, segments separated by `/`) matches
    /// this endpoint template.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let Some(parts) = split_path(path) else {
            return false;
        };

        if parts.len() != self.segments.len() {
            return false;
        }

        parts
            .iter()
            .zip(&self.segments)
            .all(|(part, seg)| match seg {
                Segment::Literal(lit) => lit == part,
                Segment::Placeholder(_) => ident_re().is_match(part),
            })
    }
}

impl<T: AsRef<str>> Display for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw.as_ref())
    }
}

fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;

    if rest.is_empty() {
        return Some(Vec::new());
    }

    Some(rest.split('/').collect())
}

fn parse_segment(segment: &str, endpoint: &str) -> Result<Segment, EndpointError> {
    if let Some(name) = segment.strip_prefix("%{").and_then(|s| s.strip_suffix('}')) {
        if ident_re().is_match(name) {
            return Ok(Segment::Placeholder(name.to_string()));
        }
    } else if ident_re().is_match(segment) {
        return Ok(Segment::Literal(segment.to_string()));
    }

    Err(EndpointError::InvalidSegment {
        segment: segment.to_string(),
        endpoint: endpoint.to_string(),
    })
}

impl TryFrom<&str> for Endpoint<String> {
    type Error = EndpointError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(EndpointError::Empty);
        }

        let rest = value
            .strip_prefix('/')
            .ok_or_else(|| EndpointError::MissingLeadingSlash(value.to_string()))?;

        if rest.is_empty() {
            return Err(EndpointError::Empty);
        }

        let segments = rest
            .split('/')
            .map(|segment| parse_segment(segment, value))
            .collect::<Result<Vec<_>, _>>()?;

        if segments.len() > MAX_ENDPOINT_SEGMENTS {
            return Err(EndpointError::TooManySegments(value.to_string()));
        }

        Ok(Endpoint {
            raw: value.to_string(),
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_and_placeholder_segments() {
        let endpoint = Endpoint::try_from("/sensor/%{id}/value").unwrap();

        assert_eq!(endpoint.len(), 3);
        assert!(endpoint.is_parametric());
    }

    #[test]
    fn matches_concrete_path() {
        let endpoint = Endpoint::try_from("/sensor/%{id}/value").unwrap();

        assert!(endpoint.matches("/sensor/42/value"));
        assert!(!endpoint.matches("/sensor/42/other"));
        assert!(!endpoint.matches("/sensor/42"));
    }

    #[test]
    fn rejects_missing_leading_slash() {
        let err = Endpoint::try_from("sensor/value").unwrap_err();

        assert!(matches!(err, EndpointError::MissingLeadingSlash(_)));
    }

    #[test]
    fn rejects_invalid_segment() {
        let err = Endpoint::try_from("/sensor/%{1bad}").unwrap_err();

        assert!(matches!(err, EndpointError::InvalidSegment { .. }));
    }

    #[test]
    fn canonical_key_erases_placeholder_names() {
        let a = Endpoint::try_from("/sensor/%{a}/value").unwrap();
        let b = Endpoint::try_from("/sensor/%{b}/value").unwrap();

        assert_eq!(a.canonical_key(), b.canonical_key());
    }
}
