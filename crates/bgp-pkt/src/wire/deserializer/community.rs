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


//! Deserializer for communities attributes payloads

use crate::{
    community::{Community, ExtendedCommunityError},
    intern::{ExtCommunityStore, InternedExtCommunity},
};
use bgpcore_parse_utils::{LocatedError, ReadablePdu, ReadablePduWithOneInput, Span};
use nom::{error::ErrorKind, number::complete::be_u32, IResult};

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum CommunityParsingError {
    /// Errors triggered by the nom parser, see [nom::error::ErrorKind] for
    /// additional information.
    #[error("nom error: {0:?}")]
    NomError(ErrorKind),
}

impl From<ErrorKind> for CommunityParsingError {
    fn from(kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }
}

pub type LocatedCommunityParsingError<'a> = LocatedError<'a, CommunityParsingError>;

impl<'a> ReadablePdu<'a, LocatedCommunityParsingError<'a>> for Community {
    fn from_wire(buf: Span<'a>) -> IResult<Span<'a>, Self, LocatedCommunityParsingError<'a>> {
        let (buf, value) = be_u32(buf)?;
        Ok((buf, Community::new(value)))
    }
}

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum ExtendedCommunityParsingError {
    /// Errors triggered by the nom parser, see [nom::error::ErrorKind] for
    /// additional information.
    #[error("nom error: {0:?}")]
    NomError(ErrorKind),

    #[error(transparent)]
    Invalid(#[from] ExtendedCommunityError),
}

impl From<ErrorKind> for ExtendedCommunityParsingError {
    fn from(kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }
}

pub type LocatedExtendedCommunityParsingError<'a> =
    LocatedError<'a, ExtendedCommunityParsingError>;

/// Consumes the whole buffer as the attribute payload and interns the value
impl<'a, 's> ReadablePduWithOneInput<'a, &'s ExtCommunityStore, LocatedExtendedCommunityParsingError<'a>>
    for InternedExtCommunity
{
    fn from_wire(
        buf: Span<'a>,
        store: &'s ExtCommunityStore,
    ) -> IResult<Span<'a>, Self, LocatedExtendedCommunityParsingError<'a>> {
        match store.parse(buf) {
            Ok(value) => Ok((&buf[buf.len()..], value)),
            Err(err) => Err(nom::Err::Error(LocatedError::new(buf, err.into()))),
        }
    }
}
