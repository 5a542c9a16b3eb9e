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


//! Deserializer for BGP NOTIFICATION messages

use crate::{
    iana::{BgpMessageType, MessageHeaderErrorSubCode},
    notification::BgpNotification,
    wire::{BGP_HEADER_LENGTH, BGP_MARKER_LENGTH, BGP_MAX_MESSAGE_LENGTH},
};
use bgpcore_parse_utils::{LocatedError, ReadablePdu, Span};
use nom::{
    bytes::complete::take,
    error::ErrorKind,
    number::complete::{be_u16, be_u8},
    IResult,
};

/// BGP Notification Message Parsing errors
#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum BgpNotificationParsingError {
    /// Errors triggered by the nom parser, see [nom::error::ErrorKind] for
    /// additional information.
    #[error("nom error: {0:?}")]
    NomError(ErrorKind),

    #[error("message marker is not all ones")]
    ConnectionNotSynchronized,

    #[error("bad message length {0}")]
    BadMessageLength(u16),

    #[error("expected a NOTIFICATION, got message type {0}")]
    BadMessageType(u8),
}

impl From<ErrorKind> for BgpNotificationParsingError {
    fn from(kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }
}

impl BgpNotificationParsingError {
    /// Message header subcode to report back to the peer, if any
    pub const fn header_subcode(&self) -> Option<MessageHeaderErrorSubCode> {
        match self {
            Self::NomError(_) => None,
            Self::ConnectionNotSynchronized => {
                Some(MessageHeaderErrorSubCode::ConnectionNotSynchronized)
            }
            Self::BadMessageLength(_) => Some(MessageHeaderErrorSubCode::BadMessageLength),
            Self::BadMessageType(_) => Some(MessageHeaderErrorSubCode::BadMessageType),
        }
    }
}

pub type LocatedBgpNotificationParsingError<'a> = LocatedError<'a, BgpNotificationParsingError>;

/// Parses a complete NOTIFICATION message, header included
impl<'a> ReadablePdu<'a, LocatedBgpNotificationParsingError<'a>> for BgpNotification {
    fn from_wire(buf: Span<'a>) -> IResult<Span<'a>, Self, LocatedBgpNotificationParsingError<'a>> {
        let input = buf;
        let (buf, marker) = take(BGP_MARKER_LENGTH)(buf)?;
        if marker.iter().any(|octet| *octet != 0xff) {
            return Err(nom::Err::Error(LocatedError::new(
                input,
                BgpNotificationParsingError::ConnectionNotSynchronized,
            )));
        }
        let length_input = buf;
        let (buf, length) = be_u16(buf)?;
        if (length as usize) < BGP_HEADER_LENGTH + 2 || length as usize > BGP_MAX_MESSAGE_LENGTH {
            return Err(nom::Err::Error(LocatedError::new(
                length_input,
                BgpNotificationParsingError::BadMessageLength(length),
            )));
        }
        let type_input = buf;
        let (buf, message_type) = be_u8(buf)?;
        if message_type != u8::from(BgpMessageType::Notification) {
            return Err(nom::Err::Error(LocatedError::new(
                type_input,
                BgpNotificationParsingError::BadMessageType(message_type),
            )));
        }
        let (buf, code) = be_u8(buf)?;
        let (buf, subcode) = be_u8(buf)?;
        let (buf, data) = take(length as usize - BGP_HEADER_LENGTH - 2)(buf)?;
        Ok((buf, BgpNotification::new(code, subcode, data.to_vec())))
    }
}
