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


//! Deserializer for BGP Path Attributes

use crate::{
    community::Community,
    iana::{PathAttributeType, UpdateMessageErrorSubCode},
    intern::{ExtCommunityStore, InternedExtCommunity},
    path_attribute::{
        Aggregator, AsPath, AsPathSegment, AsPathSegmentType, AsnEncoding, Origin, PathAttributes,
    },
    wire::{
        deserializer::community::{
            CommunityParsingError, ExtendedCommunityParsingError, LocatedCommunityParsingError,
        },
        EXTENDED_LENGTH, OPTIONAL,
    },
};
use bgpcore_parse_utils::{
    lift_error, parse_till_empty, parse_till_empty_with_one_input, LocatedError,
    ReadablePduWithOneInput, Span,
};
use nom::{
    bytes::complete::take,
    error::ErrorKind,
    multi::count,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};
use std::net::Ipv4Addr;

/// Session facts the attribute decoder depends on
#[derive(Debug, Copy, Clone)]
pub struct AttributeDecodeContext<'s> {
    pub asn_encoding: AsnEncoding,
    pub store: &'s ExtCommunityStore,
}

impl<'s> AttributeDecodeContext<'s> {
    pub const fn new(asn_encoding: AsnEncoding, store: &'s ExtCommunityStore) -> Self {
        Self {
            asn_encoding,
            store,
        }
    }
}

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum AsPathParsingError {
    /// Errors triggered by the nom parser, see [nom::error::ErrorKind] for
    /// additional information.
    #[error("nom error: {0:?}")]
    NomError(ErrorKind),

    #[error("undefined AS path segment type {0}")]
    UndefinedAsPathSegmentType(u8),
}

impl From<ErrorKind> for AsPathParsingError {
    fn from(kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }
}

pub type LocatedAsPathParsingError<'a> = LocatedError<'a, AsPathParsingError>;

impl<'a> ReadablePduWithOneInput<'a, AsnEncoding, LocatedAsPathParsingError<'a>>
    for AsPathSegment
{
    fn from_wire(
        buf: Span<'a>,
        encoding: AsnEncoding,
    ) -> IResult<Span<'a>, Self, LocatedAsPathParsingError<'a>> {
        let input = buf;
        let (buf, segment_type) = be_u8(buf)?;
        let segment_type = AsPathSegmentType::try_from(segment_type).map_err(|err| {
            nom::Err::Error(LocatedError::new(
                input,
                AsPathParsingError::UndefinedAsPathSegmentType(err.0),
            ))
        })?;
        let (buf, as_count) = be_u8(buf)?;
        let (buf, as_numbers) = match encoding {
            AsnEncoding::TwoOctet => {
                let (buf, asns) = count(be_u16, as_count as usize)(buf)?;
                (buf, asns.into_iter().map(u32::from).collect())
            }
            AsnEncoding::FourOctet => count(be_u32, as_count as usize)(buf)?,
        };
        Ok((buf, AsPathSegment::new(segment_type, as_numbers)))
    }
}

impl<'a> ReadablePduWithOneInput<'a, AsnEncoding, LocatedAsPathParsingError<'a>> for AsPath {
    fn from_wire(
        buf: Span<'a>,
        encoding: AsnEncoding,
    ) -> IResult<Span<'a>, Self, LocatedAsPathParsingError<'a>> {
        let (buf, segments) = parse_till_empty_with_one_input(buf, encoding)?;
        Ok((buf, AsPath::new(segments)))
    }
}

/// Path attributes parsing errors, each maps to the UPDATE error subcode
/// reported to the peer.
#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum PathAttributesParsingError {
    /// Errors triggered by the nom parser, see [nom::error::ErrorKind] for
    /// additional information.
    #[error("nom error: {0:?}")]
    NomError(ErrorKind),

    #[error("{attribute} has invalid length {len}")]
    AttributeLengthError {
        attribute: PathAttributeType,
        len: usize,
    },

    #[error("invalid ORIGIN value {0}")]
    InvalidOrigin(u8),

    #[error("malformed AS_PATH: {0}")]
    AsPathError(#[from] AsPathParsingError),

    #[error("malformed COMMUNITIES: {0}")]
    CommunityError(#[from] CommunityParsingError),

    #[error("malformed EXTENDED_COMMUNITIES: {0}")]
    ExtendedCommunityError(#[from] ExtendedCommunityParsingError),

    #[error("unrecognized well-known attribute {0}")]
    UnrecognizedWellKnownAttribute(u8),

    #[error("{0} attribute appears more than once")]
    DuplicateAttribute(PathAttributeType),

    #[error("missing well-known attribute {0}")]
    MissingWellKnownAttribute(PathAttributeType),
}

impl From<ErrorKind> for PathAttributesParsingError {
    fn from(kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }
}

impl PathAttributesParsingError {
    /// UPDATE Message Error subcode to send in the NOTIFICATION
    pub const fn update_subcode(&self) -> UpdateMessageErrorSubCode {
        match self {
            Self::NomError(_) | Self::DuplicateAttribute(_) => {
                UpdateMessageErrorSubCode::MalformedAttributeList
            }
            Self::AttributeLengthError { .. } => UpdateMessageErrorSubCode::AttributeLengthError,
            Self::InvalidOrigin(_) => UpdateMessageErrorSubCode::InvalidOriginAttribute,
            Self::AsPathError(_) => UpdateMessageErrorSubCode::MalformedAsPath,
            Self::CommunityError(_) | Self::ExtendedCommunityError(_) => {
                UpdateMessageErrorSubCode::OptionalAttributeError
            }
            Self::UnrecognizedWellKnownAttribute(_) => {
                UpdateMessageErrorSubCode::UnrecognizedWellKnownAttribute
            }
            Self::MissingWellKnownAttribute(_) => {
                UpdateMessageErrorSubCode::MissingWellKnownAttribute
            }
        }
    }
}

pub type LocatedPathAttributesParsingError<'a> = LocatedError<'a, PathAttributesParsingError>;

type AttributeResult<'a, T> = Result<T, nom::Err<LocatedPathAttributesParsingError<'a>>>;

fn error_at<'a>(
    span: Span<'a>,
    error: PathAttributesParsingError,
) -> nom::Err<LocatedPathAttributesParsingError<'a>> {
    nom::Err::Error(LocatedError::new(span, error))
}

/// Lift the located error of a nested value parser
fn lift<'a, E>(err: nom::Err<LocatedError<'a, E>>) -> nom::Err<LocatedPathAttributesParsingError<'a>>
where
    PathAttributesParsingError: From<E>,
{
    lift_error(err)
}

fn check_length<'a>(
    span: Span<'a>,
    attribute: PathAttributeType,
    value: Span<'a>,
    expected: usize,
) -> AttributeResult<'a, ()> {
    if value.len() != expected {
        return Err(error_at(
            span,
            PathAttributesParsingError::AttributeLengthError {
                attribute,
                len: value.len(),
            },
        ));
    }
    Ok(())
}

fn set_once<'a, T>(
    span: Span<'a>,
    slot: &mut Option<T>,
    attribute: PathAttributeType,
    value: T,
) -> AttributeResult<'a, ()> {
    if slot.is_some() {
        return Err(error_at(
            span,
            PathAttributesParsingError::DuplicateAttribute(attribute),
        ));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_ipv4(value: Span<'_>) -> IResult<Span<'_>, Ipv4Addr, LocatedPathAttributesParsingError<'_>> {
    let (buf, address) = be_u32(value)?;
    Ok((buf, Ipv4Addr::from(address)))
}

#[derive(Default)]
struct Collected {
    origin: Option<Origin>,
    as_path: Option<AsPath>,
    next_hop: Option<Ipv4Addr>,
    med: Option<u32>,
    local_preference: Option<u32>,
    atomic_aggregate: Option<()>,
    aggregator: Option<Aggregator>,
    communities: Option<Vec<Community>>,
    extended_communities: Option<InternedExtCommunity>,
}

/// Parses a whole attribute block. Attributes may come in any order, the
/// well-known mandatory ones must all be present. Optional attributes this
/// decoder does not model are skipped.
impl<'a, 's> ReadablePduWithOneInput<'a, AttributeDecodeContext<'s>, LocatedPathAttributesParsingError<'a>>
    for PathAttributes
{
    fn from_wire(
        buf: Span<'a>,
        ctx: AttributeDecodeContext<'s>,
    ) -> IResult<Span<'a>, Self, LocatedPathAttributesParsingError<'a>> {
        let mut collected = Collected::default();
        let mut buf = buf;
        while !buf.is_empty() {
            let attribute_input = buf;
            let (rem, flags) = be_u8(buf)?;
            let (rem, code) = be_u8(rem)?;
            let (rem, len) = if flags & EXTENDED_LENGTH == EXTENDED_LENGTH {
                let (rem, len) = be_u16(rem)?;
                (rem, len as usize)
            } else {
                let (rem, len) = be_u8(rem)?;
                (rem, len as usize)
            };
            let (rem, value) = take(len)(rem)?;
            buf = rem;

            let attribute = match PathAttributeType::try_from(code) {
                Ok(attribute) => attribute,
                Err(_) if flags & OPTIONAL == 0 => {
                    return Err(error_at(
                        attribute_input,
                        PathAttributesParsingError::UnrecognizedWellKnownAttribute(code),
                    ));
                }
                Err(_) => {
                    tracing::trace!("skipping unknown optional path attribute {code}");
                    continue;
                }
            };
            let at = attribute_input;
            match attribute {
                PathAttributeType::Origin => {
                    check_length(at, attribute, value, 1)?;
                    let origin = Origin::try_from(value[0]).map_err(|err| {
                        error_at(at, PathAttributesParsingError::InvalidOrigin(err.0))
                    })?;
                    set_once(at, &mut collected.origin, attribute, origin)?;
                }
                PathAttributeType::AsPath => {
                    let (_, as_path) =
                        AsPath::from_wire(value, ctx.asn_encoding).map_err(lift)?;
                    set_once(at, &mut collected.as_path, attribute, as_path)?;
                }
                PathAttributeType::NextHop => {
                    check_length(at, attribute, value, 4)?;
                    let (_, next_hop) = parse_ipv4(value)?;
                    set_once(at, &mut collected.next_hop, attribute, next_hop)?;
                }
                PathAttributeType::MultiExitDiscriminator => {
                    check_length(at, attribute, value, 4)?;
                    let (_, med) = be_u32(value)?;
                    set_once(at, &mut collected.med, attribute, med)?;
                }
                PathAttributeType::LocalPreference => {
                    check_length(at, attribute, value, 4)?;
                    let (_, local_preference) = be_u32(value)?;
                    set_once(at, &mut collected.local_preference, attribute, local_preference)?;
                }
                PathAttributeType::AtomicAggregate => {
                    check_length(at, attribute, value, 0)?;
                    set_once(at, &mut collected.atomic_aggregate, attribute, ())?;
                }
                PathAttributeType::Aggregator => {
                    check_length(at, attribute, value, ctx.asn_encoding.asn_len() + 4)?;
                    let (rem, asn) = match ctx.asn_encoding {
                        AsnEncoding::TwoOctet => {
                            let (rem, asn) = be_u16(value)?;
                            (rem, asn as u32)
                        }
                        AsnEncoding::FourOctet => be_u32(value)?,
                    };
                    let (_, origin) = parse_ipv4(rem)?;
                    set_once(
                        at,
                        &mut collected.aggregator,
                        attribute,
                        Aggregator::new(asn, origin),
                    )?;
                }
                PathAttributeType::Communities => {
                    if value.len() % 4 != 0 {
                        return Err(error_at(
                            at,
                            PathAttributesParsingError::AttributeLengthError {
                                attribute,
                                len: value.len(),
                            },
                        ));
                    }
                    let (_, communities) =
                        parse_till_empty::<Community, LocatedCommunityParsingError<'_>>(value)
                            .map_err(lift)?;
                    set_once(at, &mut collected.communities, attribute, communities)?;
                }
                PathAttributeType::ExtendedCommunities => {
                    let (_, extended) =
                        InternedExtCommunity::from_wire(value, ctx.store).map_err(lift)?;
                    set_once(at, &mut collected.extended_communities, attribute, extended)?;
                }
                PathAttributeType::As4Path | PathAttributeType::As4Aggregator => {
                    tracing::trace!("skipping {attribute} path attribute");
                }
            }
        }

        let origin = collected.origin.ok_or_else(|| {
            error_at(
                buf,
                PathAttributesParsingError::MissingWellKnownAttribute(PathAttributeType::Origin),
            )
        })?;
        let as_path = collected.as_path.ok_or_else(|| {
            error_at(
                buf,
                PathAttributesParsingError::MissingWellKnownAttribute(PathAttributeType::AsPath),
            )
        })?;
        let next_hop = collected.next_hop.ok_or_else(|| {
            error_at(
                buf,
                PathAttributesParsingError::MissingWellKnownAttribute(PathAttributeType::NextHop),
            )
        })?;
        Ok((
            buf,
            PathAttributes {
                origin,
                as_path,
                next_hop,
                med: collected.med,
                local_preference: collected.local_preference,
                atomic_aggregate: collected.atomic_aggregate.is_some(),
                aggregator: collected.aggregator,
                communities: collected.communities,
                extended_communities: collected.extended_communities,
            },
        ))
    }
}
