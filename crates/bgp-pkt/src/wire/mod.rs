// Copyright (C) 2024-present The bgpcore Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Serialize/Deserialize BGP wire protocol

pub mod deserializer;
pub mod serializer;

/// Attribute flag: optional (well-known when unset)
pub(crate) const OPTIONAL: u8 = 0b1000_0000;
/// Attribute flag: transitive
pub(crate) const TRANSITIVE: u8 = 0b0100_0000;
/// Attribute flag: the length field is two octets
pub(crate) const EXTENDED_LENGTH: u8 = 0b0001_0000;

/// Payloads longer than this need the extended length flag
pub(crate) const MAX_SHORT_ATTRIBUTE_LENGTH: usize = u8::MAX as usize;

/// Max number of ASNs in a single AS_PATH segment
pub(crate) const MAX_SEGMENT_AS_COUNT: usize = u8::MAX as usize;

/// Length of the BGP message marker
pub const BGP_MARKER_LENGTH: usize = 16;

/// Marker (16) + length (2) + type (1)
pub const BGP_HEADER_LENGTH: usize = BGP_MARKER_LENGTH + 3;

/// Largest BGP message without the extended message capability
pub const BGP_MAX_MESSAGE_LENGTH: usize = 4096;

#[cfg(test)]
mod tests;
