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

//! A concrete path, as received on the wire or passed by the caller.

use std::fmt::{self, Display};

use super::endpoint::Endpoint;

/// Error returned when parsing a concrete path.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum PathError {
    /// The path was empty.
    #[error("path cannot be empty")]
    Empty,
    /// The path didn't start with `/`.
    #[error("path must start with '/': '{0}'")]
    MissingLeadingSlash(String),
}

/// A borrowed, validated concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPath<'a> {
    raw: &'a str,
}

impl<'a> MappingPath<'a> {
    /// Parses a concrete path, checking only the generic shape (leading `/`); matching against a
    /// specific endpoint is a separate step.
    pub fn try_from_str(path: &'a str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        if !path.starts_with('/') {
            return Err(PathError::MissingLeadingSlash(path.to_string()));
        }

        Ok(Self { raw: path })
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Returns `true` if `endpoint`'s template matches this concrete path.
    #[must_use]
    pub fn matches<T>(&self, endpoint: &Endpoint<T>) -> bool {
        endpoint.matches(self.raw)
    }

    /// Joins a relative key onto this path, used to resolve object-aggregation sub-paths: `self`
    /// is the common prefix the object was published on, `suffix` a key of the payload map.
    #[must_use]
    pub fn join(&self, suffix: &str) -> String {
        let base = self.raw.trim_end_matches('/');
        let suffix = suffix.trim_start_matches('/');

        if suffix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{suffix}")
        }
    }
}

impl Display for MappingPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_common_prefix_and_key() {
        let path = MappingPath::try_from_str("/s").unwrap();

        assert_eq!(path.join("x"), "/s/x");
        assert_eq!(path.join("/x"), "/s/x");
    }

    #[test]
    fn rejects_empty_and_relative_paths() {
        assert!(matches!(
            MappingPath::try_from_str(""),
            Err(PathError::Empty)
        ));
        assert!(matches!(
            MappingPath::try_from_str("a/b"),
            Err(PathError::MissingLeadingSlash(_))
        ));
    }
}
