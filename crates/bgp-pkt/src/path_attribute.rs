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


//! The path attributes this daemon core builds, dumps and parses, see
//! [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271) Section 5.

use crate::community::Community;
use crate::intern::InternedExtCommunity;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use strum_macros::{Display, FromRepr};

/// Placeholder ASN announced in place of four-octet ASNs to speakers without
/// the four-octet capability, [RFC6793](https://datatracker.ietf.org/doc/html/rfc6793)
pub const AS_TRANS: u16 = 23456;

/// Width of the ASNs in AS_PATH and AGGREGATOR, negotiated per peer with the
/// four-octet AS capability and passed down to the codec.
#[derive(Display, Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum AsnEncoding {
    #[default]
    TwoOctet,
    FourOctet,
}

impl AsnEncoding {
    pub const fn asn_len(&self) -> usize {
        match self {
            Self::TwoOctet => 2,
            Self::FourOctet => 4,
        }
    }
}

/// ORIGIN is a well-known mandatory attribute that defines the origin of the
/// path information.
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Origin {
    #[strum(to_string = "IGP")]
    Igp = 0,
    #[strum(to_string = "EGP")]
    Egp = 1,
    #[strum(to_string = "incomplete")]
    Incomplete = 2,
}

impl From<Origin> for u8 {
    fn from(value: Origin) -> Self {
        value as u8
    }
}

/// Error type used in [`TryFrom`] for [`Origin`].
/// The value carried is the undefined value being parsed
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UndefinedOrigin(pub u8);

impl TryFrom<u8> for Origin {
    type Error = UndefinedOrigin;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match Self::from_repr(value) {
            Some(val) => Ok(val),
            None => Err(UndefinedOrigin(value)),
        }
    }
}

/// AS Path segment types, [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
/// and [RFC5065](https://datatracker.ietf.org/doc/html/rfc5065) for the
/// confederation variants.
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AsPathSegmentType {
    AsSet = 1,
    AsSequence = 2,
    AsConfedSequence = 3,
    AsConfedSet = 4,
}

impl AsPathSegmentType {
    /// Opening bracket, closing bracket and separator of the text form
    const fn delimiters(&self) -> (&'static str, &'static str, char) {
        match self {
            Self::AsSet => ("{", "}", ','),
            Self::AsSequence => ("", "", ' '),
            Self::AsConfedSequence => ("(", ")", ' '),
            Self::AsConfedSet => ("[", "]", ' '),
        }
    }
}

impl From<AsPathSegmentType> for u8 {
    fn from(value: AsPathSegmentType) -> Self {
        value as u8
    }
}

/// Error type used in [`TryFrom`] for [`AsPathSegmentType`].
/// The value carried is the undefined value being parsed
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UndefinedAsPathSegmentType(pub u8);

impl TryFrom<u8> for AsPathSegmentType {
    type Error = UndefinedAsPathSegmentType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match Self::from_repr(value) {
            Some(val) => Ok(val),
            None => Err(UndefinedAsPathSegmentType(value)),
        }
    }
}

///  Each AS path segment is represented by a triple:
/// <path segment type, path segment length, path segment value>.
///
/// ```text
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  segment type | len           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | value (2 or 4 octets per ASN) ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AsPathSegment {
    segment_type: AsPathSegmentType,
    as_numbers: Vec<u32>,
}

impl AsPathSegment {
    pub fn new(segment_type: AsPathSegmentType, as_numbers: Vec<u32>) -> Self {
        Self {
            segment_type,
            as_numbers,
        }
    }

    pub const fn segment_type(&self) -> AsPathSegmentType {
        self.segment_type
    }

    pub fn as_numbers(&self) -> &[u32] {
        &self.as_numbers
    }
}

impl std::fmt::Display for AsPathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (open, close, separator) = self.segment_type.delimiters();
        f.write_str(open)?;
        for (i, asn) in self.as_numbers.iter().enumerate() {
            if i > 0 {
                write!(f, "{separator}")?;
            }
            write!(f, "{asn}")?;
        }
        f.write_str(close)
    }
}

/// AS_PATH attribute value. Its `Display` form (`100 200 {300,400}`) is the
/// string AS-path access lists match against.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AsPath {
    segments: Vec<AsPathSegment>,
}

impl AsPath {
    pub fn new(segments: Vec<AsPathSegment>) -> Self {
        Self { segments }
    }

    /// A path made of one AS_SEQUENCE, an empty path for no ASNs
    pub fn from_sequence(as_numbers: Vec<u32>) -> Self {
        if as_numbers.is_empty() {
            return Self::default();
        }
        Self::new(vec![AsPathSegment::new(
            AsPathSegmentType::AsSequence,
            as_numbers,
        )])
    }

    pub fn segments(&self) -> &[AsPathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.as_numbers.is_empty())
    }
}

impl std::fmt::Display for AsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for segment in self.segments.iter().filter(|s| !s.as_numbers.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// AGGREGATOR attribute: the last AS and BGP speaker that formed the
/// aggregate route.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Aggregator {
    asn: u32,
    origin: Ipv4Addr,
}

impl Aggregator {
    pub const fn new(asn: u32, origin: Ipv4Addr) -> Self {
        Self { asn, origin }
    }

    pub const fn asn(&self) -> u32 {
        self.asn
    }

    pub const fn origin(&self) -> Ipv4Addr {
        self.origin
    }
}

/// The attribute set attached to a route. The wire order is fixed: origin,
/// AS path, next hop, then each optional attribute when present.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PathAttributes {
    pub origin: Origin,
    pub as_path: AsPath,
    pub next_hop: Ipv4Addr,
    pub med: Option<u32>,
    pub local_preference: Option<u32>,
    pub atomic_aggregate: bool,
    pub aggregator: Option<Aggregator>,
    pub communities: Option<Vec<Community>>,
    pub extended_communities: Option<InternedExtCommunity>,
}

impl PathAttributes {
    /// Attributes carrying only the well-known mandatory values
    pub fn new(origin: Origin, as_path: AsPath, next_hop: Ipv4Addr) -> Self {
        Self {
            origin,
            as_path,
            next_hop,
            med: None,
            local_preference: None,
            atomic_aggregate: false,
            aggregator: None,
            communities: None,
            extended_communities: None,
        }
    }
}
