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


//! Standard ([RFC1997](https://datatracker.ietf.org/doc/html/rfc1997)) and
//! extended ([RFC4360](https://datatracker.ietf.org/doc/html/rfc4360))
//! BGP communities, including the text forms used by the configuration
//! surface.

use crate::iana::{
    ExtendedCommunityEncoding, ExtendedCommunitySubType, OpaqueExtendedCommunitySubType,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Number of octets in one extended community entry
pub const EXTENDED_COMMUNITY_SIZE: usize = 8;

/// Text printed for an entry whose type or sub-type has no text form
pub const UNKNOWN_EXTENDED_COMMUNITY: &str = "Unknown";

/// Four octet values to specify a community.
///
/// See [RFC1997](https://datatracker.ietf.org/doc/html/rfc1997)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Community(u32);

impl Community {
    pub const NO_EXPORT: Community = Community(0xFFFFFF01);
    pub const NO_ADVERTISE: Community = Community(0xFFFFFF02);
    pub const NO_EXPORT_SUBCONFED: Community = Community(0xFFFFFF03);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn from_parts(asn: u16, value: u16) -> Self {
        Self(((asn as u32) << 16) | value as u32)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Community {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::NO_EXPORT => f.write_str("no-export"),
            Self::NO_ADVERTISE => f.write_str("no-advertise"),
            Self::NO_EXPORT_SUBCONFED => f.write_str("local-AS"),
            Community(0) => f.write_str("internet"),
            Community(value) => write!(f, "{}:{}", value >> 16, value & 0xFFFF),
        }
    }
}

/// Text style used when printing an [`ExtendedCommunity`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ExtCommunityFormat {
    /// Bare `ASN:NN`, as given to `set extcommunity`
    RouteMap,
    /// `rt ASN:NN` / `soo ASN:NN`, as given to `ip extcommunity-list`
    List,
    /// `RT:ASN:NN` / `SoO:ASN:NN`, as shown to operators
    Display,
}

/// Which sub-type a value without a preceding keyword is parsed as
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ExtCommunityKind {
    RouteTarget,
    SiteOfOrigin,
}

impl ExtCommunityKind {
    pub const fn sub_type(&self) -> ExtendedCommunitySubType {
        match self {
            Self::RouteTarget => ExtendedCommunitySubType::RouteTarget,
            Self::SiteOfOrigin => ExtendedCommunitySubType::RouteOrigin,
        }
    }

    const fn prefix(&self, style: ExtCommunityFormat) -> &'static str {
        match (self, style) {
            (_, ExtCommunityFormat::RouteMap) => "",
            (Self::RouteTarget, ExtCommunityFormat::List) => "rt ",
            (Self::SiteOfOrigin, ExtCommunityFormat::List) => "soo ",
            (Self::RouteTarget, ExtCommunityFormat::Display) => "RT:",
            (Self::SiteOfOrigin, ExtCommunityFormat::Display) => "SoO:",
        }
    }
}

impl TryFrom<u8> for ExtCommunityKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match ExtendedCommunitySubType::try_from(value) {
            Ok(ExtendedCommunitySubType::RouteTarget) => Ok(Self::RouteTarget),
            Ok(ExtendedCommunitySubType::RouteOrigin) => Ok(Self::SiteOfOrigin),
            Err(undefined) => Err(undefined.0),
        }
    }
}

/// One 8-octet extended community entry (the type octet, sub-type octet and
/// six octets of value). Entries order by their raw bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ExtCommunityValue([u8; EXTENDED_COMMUNITY_SIZE]);

impl ExtCommunityValue {
    pub const fn new(octets: [u8; EXTENDED_COMMUNITY_SIZE]) -> Self {
        Self(octets)
    }

    /// Two-octet AS specific entry
    pub const fn two_octet_as(sub_type: ExtendedCommunitySubType, asn: u16, value: u32) -> Self {
        let a = asn.to_be_bytes();
        let v = value.to_be_bytes();
        Self([
            ExtendedCommunityEncoding::TwoOctetAs as u8,
            sub_type as u8,
            a[0],
            a[1],
            v[0],
            v[1],
            v[2],
            v[3],
        ])
    }

    /// Four-octet AS specific entry
    pub const fn four_octet_as(sub_type: ExtendedCommunitySubType, asn: u32, value: u16) -> Self {
        let a = asn.to_be_bytes();
        let v = value.to_be_bytes();
        Self([
            ExtendedCommunityEncoding::FourOctetAs as u8,
            sub_type as u8,
            a[0],
            a[1],
            a[2],
            a[3],
            v[0],
            v[1],
        ])
    }

    /// IPv4 address specific entry
    pub const fn ipv4_address(
        sub_type: ExtendedCommunitySubType,
        address: Ipv4Addr,
        value: u16,
    ) -> Self {
        let a = address.octets();
        let v = value.to_be_bytes();
        Self([
            ExtendedCommunityEncoding::Ipv4Address as u8,
            sub_type as u8,
            a[0],
            a[1],
            a[2],
            a[3],
            v[0],
            v[1],
        ])
    }

    pub const fn octets(&self) -> &[u8; EXTENDED_COMMUNITY_SIZE] {
        &self.0
    }

    pub const fn type_octet(&self) -> u8 {
        self.0[0]
    }

    pub const fn sub_type_octet(&self) -> u8 {
        self.0[1]
    }

    /// Writes the text form of a single entry, [`UNKNOWN_EXTENDED_COMMUNITY`]
    /// when the type is not one of the printable encodings.
    fn write_text<W: Write>(&self, out: &mut W, style: ExtCommunityFormat) -> std::fmt::Result {
        let o = &self.0;
        let encoding = match ExtendedCommunityEncoding::try_from(o[0]) {
            Ok(encoding) => encoding,
            Err(_) => return out.write_str(UNKNOWN_EXTENDED_COMMUNITY),
        };
        if encoding == ExtendedCommunityEncoding::Opaque {
            return match OpaqueExtendedCommunitySubType::try_from(o[1]) {
                Ok(OpaqueExtendedCommunitySubType::Encapsulation) => {
                    write!(out, "ET:{}", u16::from_be_bytes([o[6], o[7]]))
                }
                Err(_) => out.write_str(UNKNOWN_EXTENDED_COMMUNITY),
            };
        }
        let kind = match ExtCommunityKind::try_from(o[1]) {
            Ok(kind) => kind,
            Err(_) => return out.write_str(UNKNOWN_EXTENDED_COMMUNITY),
        };
        out.write_str(kind.prefix(style))?;
        match encoding {
            ExtendedCommunityEncoding::TwoOctetAs => write!(
                out,
                "{}:{}",
                u16::from_be_bytes([o[2], o[3]]),
                u32::from_be_bytes([o[4], o[5], o[6], o[7]])
            ),
            ExtendedCommunityEncoding::FourOctetAs => write!(
                out,
                "{}:{}",
                u32::from_be_bytes([o[2], o[3], o[4], o[5]]),
                u16::from_be_bytes([o[6], o[7]])
            ),
            ExtendedCommunityEncoding::Ipv4Address => write!(
                out,
                "{}:{}",
                Ipv4Addr::new(o[2], o[3], o[4], o[5]),
                u16::from_be_bytes([o[6], o[7]])
            ),
            ExtendedCommunityEncoding::Opaque => out.write_str(UNKNOWN_EXTENDED_COMMUNITY),
        }
    }

    /// Parse an `ASN:NN` or `A.B.C.D:NN` token into an entry carrying the
    /// given sub-type. An ASN above 65535 selects the four-octet AS
    /// encoding, which leaves only two octets for the value.
    pub fn parse_value(
        token: &str,
        sub_type: ExtendedCommunitySubType,
    ) -> Result<Self, ExtCommunityTextError> {
        let malformed = || ExtCommunityTextError::MalformedValue(token.to_string());
        let (admin, assigned) = token.split_once(':').ok_or_else(malformed)?;
        if !is_decimal(assigned) {
            return Err(malformed());
        }
        if admin.contains('.') {
            let address = Ipv4Addr::from_str(admin).map_err(|_| malformed())?;
            let value = u16::from_str(assigned).map_err(|_| malformed())?;
            return Ok(Self::ipv4_address(sub_type, address, value));
        }
        if !is_decimal(admin) {
            return Err(malformed());
        }
        let asn = u32::from_str(admin).map_err(|_| malformed())?;
        match u16::try_from(asn) {
            Ok(asn) => {
                let value = u32::from_str(assigned).map_err(|_| malformed())?;
                Ok(Self::two_octet_as(sub_type, asn, value))
            }
            Err(_) => {
                let value = u16::from_str(assigned).map_err(|_| malformed())?;
                Ok(Self::four_octet_as(sub_type, asn, value))
            }
        }
    }
}

impl From<[u8; EXTENDED_COMMUNITY_SIZE]> for ExtCommunityValue {
    fn from(value: [u8; EXTENDED_COMMUNITY_SIZE]) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ExtCommunityValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_text(f, ExtCommunityFormat::Display)
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ExtendedCommunityError {
    #[error("extended community length {0} is not a multiple of {EXTENDED_COMMUNITY_SIZE}")]
    MalformedLength(usize),

    #[error("extended community entry {0} is already present")]
    Duplicate(ExtCommunityValue),

    #[error("extended community entry {0} is not present")]
    NotFound(ExtCommunityValue),
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ExtCommunityTextError {
    #[error("empty extended community list")]
    Empty,

    #[error("keyword `{0}` is not expected here")]
    UnexpectedKeyword(String),

    #[error("value `{0}` must be preceded by `rt` or `soo`")]
    MissingKeyword(String),

    #[error("keyword `{0}` is not followed by a value")]
    MissingValue(String),

    #[error("malformed extended community value `{0}`")]
    MalformedValue(String),
}

/// An extended community attribute value: a sequence of 8-octet entries.
/// Values built locally keep their entries in ascending raw-byte order,
/// values decoded from the wire keep the received order.
///
/// Values are built and edited here, and then handed to
/// [`crate::intern::ExtCommunityStore`] which makes them immutable and
/// shared.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ExtendedCommunity {
    entries: Vec<ExtCommunityValue>,
}

impl ExtendedCommunity {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from entries in any order, duplicates are collapsed
    pub fn from_entries<I: IntoIterator<Item = ExtCommunityValue>>(entries: I) -> Self {
        let mut entries: Vec<ExtCommunityValue> = entries.into_iter().collect();
        entries.sort_unstable();
        entries.dedup();
        Self { entries }
    }

    /// Build from the attribute payload as carried on the wire. Entry order
    /// and repeated entries are kept so the value encodes back to the same
    /// octets.
    pub fn from_octets(octets: &[u8]) -> Result<Self, ExtendedCommunityError> {
        if octets.len() % EXTENDED_COMMUNITY_SIZE != 0 {
            return Err(ExtendedCommunityError::MalformedLength(octets.len()));
        }
        let entries = octets
            .chunks_exact(EXTENDED_COMMUNITY_SIZE)
            .map(|chunk| {
                let mut entry = [0u8; EXTENDED_COMMUNITY_SIZE];
                entry.copy_from_slice(chunk);
                ExtCommunityValue(entry)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Entries in ascending raw-byte order without repeats
    fn sorted_entries(&self) -> Vec<ExtCommunityValue> {
        let mut entries = self.entries.clone();
        entries.sort_unstable();
        entries.dedup();
        entries
    }

    pub fn entries(&self) -> &[ExtCommunityValue] {
        &self.entries
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length in octets of the wire payload
    pub fn octets_len(&self) -> usize {
        self.entries.len() * EXTENDED_COMMUNITY_SIZE
    }

    pub fn to_octets(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|e| e.0).collect()
    }

    /// Insert keeping the entries sorted. Values decoded from the wire keep
    /// their received order, the new entry then goes before the first
    /// greater one.
    pub fn add_entry(&mut self, entry: ExtCommunityValue) -> Result<(), ExtendedCommunityError> {
        if self.contains(&entry) {
            return Err(ExtendedCommunityError::Duplicate(entry));
        }
        self.insert_sorted(entry);
        Ok(())
    }

    fn insert_sorted(&mut self, entry: ExtCommunityValue) {
        let pos = self
            .entries
            .iter()
            .position(|existing| *existing > entry)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    pub fn remove_entry(
        &mut self,
        entry: &ExtCommunityValue,
    ) -> Result<(), ExtendedCommunityError> {
        match self.entries.iter().position(|existing| existing == entry) {
            Some(pos) => {
                self.entries.remove(pos);
                Ok(())
            }
            None => Err(ExtendedCommunityError::NotFound(*entry)),
        }
    }

    pub fn contains(&self, entry: &ExtCommunityValue) -> bool {
        self.entries.contains(entry)
    }

    /// True when every entry of `other` is also in `self`, checked with a
    /// single merge pass over sorted copies of both sides.
    pub fn matches(&self, other: &ExtendedCommunity) -> bool {
        let mine = self.sorted_entries();
        let mut mine = mine.iter();
        'outer: for wanted in &other.sorted_entries() {
            for candidate in mine.by_ref() {
                match candidate.cmp(wanted) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Equal => continue 'outer,
                    std::cmp::Ordering::Greater => return false,
                }
            }
            return false;
        }
        true
    }

    /// First entry of `self` that is also carried by `other`
    pub fn intersect(&self, other: &ExtendedCommunity) -> Option<ExtCommunityValue> {
        let theirs = other.sorted_entries();
        self.entries
            .iter()
            .find(|entry| theirs.binary_search(entry).is_ok())
            .copied()
    }

    /// Text form of all entries separated by a single space. An empty value
    /// prints as the empty string.
    pub fn format_text(&self, style: ExtCommunityFormat) -> String {
        let mut out = String::with_capacity(self.entries.len() * 24);
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            // Writing into a String cannot fail
            let _ = entry.write_text(&mut out, style);
        }
        out
    }

    /// Parse a whitespace separated list of values.
    ///
    /// With `keyword_included` every value must be introduced by `rt` or
    /// `soo`. Without it, keywords are rejected and every value takes the
    /// sub-type of `kind`. Any malformed token fails the whole parse.
    pub fn parse_text(
        text: &str,
        kind: ExtCommunityKind,
        keyword_included: bool,
    ) -> Result<Self, ExtCommunityTextError> {
        let mut value = ExtendedCommunity::new();
        let mut pending_keyword: Option<(&str, ExtCommunityKind)> = None;
        for token in text.split_whitespace() {
            let keyword = match token {
                "rt" => Some(ExtCommunityKind::RouteTarget),
                "soo" => Some(ExtCommunityKind::SiteOfOrigin),
                _ => None,
            };
            match keyword {
                Some(keyword) => {
                    if !keyword_included || pending_keyword.is_some() {
                        return Err(ExtCommunityTextError::UnexpectedKeyword(token.to_string()));
                    }
                    pending_keyword = Some((token, keyword));
                }
                None => {
                    let sub_type = if keyword_included {
                        match pending_keyword.take() {
                            Some((_, keyword)) => keyword.sub_type(),
                            None => {
                                return Err(ExtCommunityTextError::MissingKeyword(
                                    token.to_string(),
                                ))
                            }
                        }
                    } else {
                        kind.sub_type()
                    };
                    let entry = ExtCommunityValue::parse_value(token, sub_type)?;
                    // Repeated values collapse into one entry
                    if !value.contains(&entry) {
                        value.insert_sorted(entry);
                    }
                }
            }
        }
        if let Some((keyword, _)) = pending_keyword {
            return Err(ExtCommunityTextError::MissingValue(keyword.to_string()));
        }
        if value.is_empty() {
            return Err(ExtCommunityTextError::Empty);
        }
        Ok(value)
    }
}

impl std::fmt::Display for ExtendedCommunity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_text(ExtCommunityFormat::Display))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(asn: u16, value: u32) -> ExtCommunityValue {
        ExtCommunityValue::two_octet_as(ExtendedCommunitySubType::RouteTarget, asn, value)
    }

    #[test]
    fn test_add_entry_keeps_order() {
        let mut value = ExtendedCommunity::new();
        for entry in [rt(300, 1), rt(100, 2), rt(100, 1), rt(200, 9)] {
            value.add_entry(entry).unwrap();
        }
        assert!(value.entries().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            value.add_entry(rt(100, 1)),
            Err(ExtendedCommunityError::Duplicate(rt(100, 1)))
        );
        value.remove_entry(&rt(200, 9)).unwrap();
        assert_eq!(
            value.remove_entry(&rt(200, 9)),
            Err(ExtendedCommunityError::NotFound(rt(200, 9)))
        );
        assert!(value.entries().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(value.size(), 3);
    }

    #[test]
    fn test_match_and_intersect() {
        let a = ExtendedCommunity::from_entries([rt(100, 1), rt(100, 2)]);
        let b = ExtendedCommunity::from_entries([rt(100, 1)]);
        let c = ExtendedCommunity::from_entries([rt(100, 3)]);
        let d = ExtendedCommunity::from_entries([rt(100, 2), rt(100, 3)]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(!a.matches(&d));
        assert!(a.matches(&ExtendedCommunity::new()));
        assert!(!ExtendedCommunity::new().matches(&b));
        assert_eq!(a.intersect(&d), Some(rt(100, 2)));
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_text_round_trip() {
        for text in ["rt 100:1", "soo 10.0.0.1:5", "rt 4200000000:7 soo 65000:4294967295"] {
            let parsed =
                ExtendedCommunity::parse_text(text, ExtCommunityKind::RouteTarget, true).unwrap();
            let printed = parsed.format_text(ExtCommunityFormat::List);
            let reparsed =
                ExtendedCommunity::parse_text(&printed, ExtCommunityKind::RouteTarget, true)
                    .unwrap();
            assert_eq!(parsed.to_octets(), reparsed.to_octets());
        }
    }

    #[test]
    fn test_format_styles() {
        let value = ExtendedCommunity::from_entries([
            rt(100, 1),
            ExtCommunityValue::ipv4_address(
                ExtendedCommunitySubType::RouteOrigin,
                Ipv4Addr::new(10, 0, 0, 1),
                5,
            ),
        ]);
        assert_eq!(value.format_text(ExtCommunityFormat::RouteMap), "100:1 10.0.0.1:5");
        assert_eq!(
            value.format_text(ExtCommunityFormat::List),
            "rt 100:1 soo 10.0.0.1:5"
        );
        assert_eq!(
            value.format_text(ExtCommunityFormat::Display),
            "RT:100:1 SoO:10.0.0.1:5"
        );
        assert_eq!(ExtendedCommunity::new().format_text(ExtCommunityFormat::Display), "");
    }

    #[test]
    fn test_format_unknown_and_opaque() {
        let value = ExtendedCommunity::from_entries([
            ExtCommunityValue::new([0x03, 0x0c, 0, 0, 0, 0, 0, 8]),
            ExtCommunityValue::new([0x00, 0x09, 0, 1, 0, 0, 0, 1]),
            ExtCommunityValue::new([0x43, 0x0c, 0, 0, 0, 0, 0, 8]),
        ]);
        assert_eq!(
            value.format_text(ExtCommunityFormat::Display),
            "Unknown ET:8 Unknown"
        );
    }

    #[test]
    fn test_parse_without_keyword() {
        let value =
            ExtendedCommunity::parse_text("100:1 100:1 1.2.3.4:9", ExtCommunityKind::SiteOfOrigin, false)
                .unwrap();
        assert_eq!(value.format_text(ExtCommunityFormat::List), "soo 100:1 soo 1.2.3.4:9");
    }

    #[test]
    fn test_parse_text_sorts_and_collapses_repeats() {
        let value = ExtendedCommunity::parse_text(
            "rt 300:1 rt 100:1 rt 300:1 rt 100:1",
            ExtCommunityKind::RouteTarget,
            true,
        )
        .unwrap();
        assert_eq!(value.entries(), &[rt(100, 1), rt(300, 1)]);
    }

    #[test]
    fn test_wire_value_edited_in_place() {
        let octets = [rt(300, 1).0, rt(100, 1).0, rt(300, 1).0].concat();
        let mut value = ExtendedCommunity::from_octets(&octets).unwrap();
        assert_eq!(value.size(), 3);
        assert_eq!(value.to_octets(), octets);
        assert!(value.matches(&ExtendedCommunity::from_entries([rt(100, 1), rt(300, 1)])));
        assert_eq!(
            value.intersect(&ExtendedCommunity::from_entries([rt(100, 1), rt(300, 1)])),
            Some(rt(300, 1))
        );
        assert_eq!(
            value.add_entry(rt(100, 1)),
            Err(ExtendedCommunityError::Duplicate(rt(100, 1)))
        );
        value.add_entry(rt(200, 1)).unwrap();
        assert_eq!(
            value.entries(),
            &[rt(200, 1), rt(300, 1), rt(100, 1), rt(300, 1)]
        );
    }

    #[test]
    fn test_parse_errors() {
        let kind = ExtCommunityKind::RouteTarget;
        assert_eq!(
            ExtendedCommunity::parse_text("", kind, true),
            Err(ExtCommunityTextError::Empty)
        );
        assert_eq!(
            ExtendedCommunity::parse_text("rt 100:1 soo", kind, true),
            Err(ExtCommunityTextError::MissingValue("soo".to_string()))
        );
        assert_eq!(
            ExtendedCommunity::parse_text("rt rt 100:1", kind, true),
            Err(ExtCommunityTextError::UnexpectedKeyword("rt".to_string()))
        );
        assert_eq!(
            ExtendedCommunity::parse_text("100:1", kind, true),
            Err(ExtCommunityTextError::MissingKeyword("100:1".to_string()))
        );
        assert_eq!(
            ExtendedCommunity::parse_text("rt 100:1", kind, false),
            Err(ExtCommunityTextError::UnexpectedKeyword("rt".to_string()))
        );
        for bad in ["100", "100:1:1", "1.2.3:4", "70000:70000", "1.2.3.4:65536", "x:1", ":1"] {
            assert_eq!(
                ExtendedCommunity::parse_text(bad, kind, false),
                Err(ExtCommunityTextError::MalformedValue(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_community_display() {
        assert_eq!(Community::from_parts(65000, 100).to_string(), "65000:100");
        assert_eq!(Community::NO_EXPORT.to_string(), "no-export");
    }
}
