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

//! A uniform iterator over an interface's mappings, regardless of its aggregation kind.

use super::datastream::{DatastreamIndividualMapping, DatastreamObjectMapping};
use super::properties::PropertiesMapping;
use super::InterfaceMapping;

/// Borrowed iterator over the mappings of an [`Interface`](crate::interface::Interface).
pub enum MappingIter<'a> {
    /// Iterator over datastream individual mappings.
    Individual(std::slice::Iter<'a, DatastreamIndividualMapping>),
    /// Iterator over datastream object mappings.
    Object(std::slice::Iter<'a, DatastreamObjectMapping>),
    /// Iterator over properties mappings.
    Properties(std::slice::Iter<'a, PropertiesMapping>),
}

impl<'a> Iterator for MappingIter<'a> {
    type Item = &'a dyn InterfaceMapping;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            MappingIter::Individual(it) => it.next().map(|m| m as &dyn InterfaceMapping),
            MappingIter::Object(it) => it.next().map(|m| m as &dyn InterfaceMapping),
            MappingIter::Properties(it) => it.next().map(|m| m as &dyn InterfaceMapping),
        }
    }
}
