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


//! BGP codes registered at IANA [BGP Parameters](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml)
//! and the extended community type space of [RFC4360](https://datatracker.ietf.org/doc/html/rfc4360).

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr, IntoStaticStr};

/// Generates the `u8` conversions for an IANA enum and its `Undefined*`
/// companion carrying the unknown code.
macro_rules! iana_u8_code {
    ($name:ident, $undefined:ident) => {
        #[doc = concat!("Value is not one of [`", stringify!($name), "`], the carried value is the undefined code.")]
        #[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
        pub struct $undefined(pub u8);

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = $undefined;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match Self::from_repr(value) {
                    Some(val) => Ok(val),
                    None => Err($undefined(value)),
                }
            }
        }
    };
}

/// BGP Message types as registered in IANA [BGP Message Types](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-1)
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BgpMessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    KeepAlive = 4,
    /// [RFC2918](https://datatracker.ietf.org/doc/html/rfc2918)
    RouteRefresh = 5,
}
iana_u8_code!(BgpMessageType, UndefinedBgpMessageType);

/// BGP Path Attributes understood by this crate, see IANA [BGP Path Attributes](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-2)
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PathAttributeType {
    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    Origin = 1,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    AsPath = 2,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    NextHop = 3,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    MultiExitDiscriminator = 4,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    LocalPreference = 5,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    AtomicAggregate = 6,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    Aggregator = 7,

    /// [RFC1997](https://datatracker.ietf.org/doc/html/rfc1997)
    Communities = 8,

    /// [RFC4360](https://datatracker.ietf.org/doc/html/rfc4360)
    ExtendedCommunities = 16,

    /// [RFC6793](https://datatracker.ietf.org/doc/html/rfc6793)
    As4Path = 17,

    /// [RFC6793](https://datatracker.ietf.org/doc/html/rfc6793)
    As4Aggregator = 18,
}
iana_u8_code!(PathAttributeType, UndefinedPathAttributeType);

/// BGP Error (Notification) Codes as defined by IANA [BGP Error Codes](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-3)
///
/// The `Display` form is the operator facing text used in log lines.
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum BgpErrorNotificationCode {
    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "Message Header Error")]
    MessageHeaderError = 1,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "OPEN Message Error")]
    OpenMessageError = 2,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "UPDATE Message Error")]
    UpdateMessageError = 3,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "Hold Timer Expired")]
    HoldTimerExpired = 4,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "Finite State Machine Error")]
    FiniteStateMachineError = 5,

    /// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "Cease")]
    Cease = 6,

    /// Code point used by the dynamic capability draft
    /// [draft-ietf-idr-dynamic-cap](https://datatracker.ietf.org/doc/html/draft-ietf-idr-dynamic-cap)
    #[strum(to_string = "CAPABILITY Message Error")]
    CapabilityMessageError = 7,
}
iana_u8_code!(BgpErrorNotificationCode, UndefinedBgpErrorNotificationCode);

/// Message Header Error sub-codes for [`BgpErrorNotificationCode::MessageHeaderError`] as defined by IANA [Message Header Error subcodes](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-5)
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum MessageHeaderErrorSubCode {
    #[strum(to_string = "Connection Not Synchronized")]
    ConnectionNotSynchronized = 1,
    #[strum(to_string = "Bad Message Length")]
    BadMessageLength = 2,
    #[strum(to_string = "Bad Message Type")]
    BadMessageType = 3,
}
iana_u8_code!(MessageHeaderErrorSubCode, UndefinedMessageHeaderErrorSubCode);

/// OPEN Message Error sub-codes for [`BgpErrorNotificationCode::OpenMessageError`] as defined by IANA [OPEN Message Error subcodes](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-6)
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum OpenMessageErrorSubCode {
    #[strum(to_string = "Unsupported Version Number")]
    UnsupportedVersionNumber = 1,
    #[strum(to_string = "Bad Peer AS")]
    BadPeerAs = 2,
    #[strum(to_string = "Bad BGP Identifier")]
    BadBgpIdentifier = 3,
    #[strum(to_string = "Unsupported Optional Parameter")]
    UnsupportedOptionalParameter = 4,
    /// Deprecated by [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "Authentication Failure")]
    AuthenticationFailure = 5,
    #[strum(to_string = "Unacceptable Hold Time")]
    UnacceptableHoldTime = 6,
    /// [RFC5492](https://datatracker.ietf.org/doc/html/rfc5492)
    #[strum(to_string = "Unsupported Capability")]
    UnsupportedCapability = 7,
}
iana_u8_code!(OpenMessageErrorSubCode, UndefinedOpenMessageErrorSubCode);

/// UPDATE Message Error sub-codes for [`BgpErrorNotificationCode::UpdateMessageError`] as defined by IANA [UPDATE Message Error subcodes](https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-7)
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum UpdateMessageErrorSubCode {
    #[strum(to_string = "Malformed Attribute List")]
    MalformedAttributeList = 1,
    #[strum(to_string = "Unrecognized Well-known Attribute")]
    UnrecognizedWellKnownAttribute = 2,
    #[strum(to_string = "Missing Well-known Attribute")]
    MissingWellKnownAttribute = 3,
    #[strum(to_string = "Attribute Flags Error")]
    AttributeFlagsError = 4,
    #[strum(to_string = "Attribute Length Error")]
    AttributeLengthError = 5,
    #[strum(to_string = "Invalid ORIGIN Attribute")]
    InvalidOriginAttribute = 6,
    /// Deprecated by [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
    #[strum(to_string = "AS Routing Loop")]
    AsRoutingLoop = 7,
    #[strum(to_string = "Invalid NEXT_HOP Attribute")]
    InvalidNextHopAttribute = 8,
    #[strum(to_string = "Optional Attribute Error")]
    OptionalAttributeError = 9,
    #[strum(to_string = "Invalid Network Field")]
    InvalidNetworkField = 10,
    #[strum(to_string = "Malformed AS_PATH")]
    MalformedAsPath = 11,
}
iana_u8_code!(UpdateMessageErrorSubCode, UndefinedUpdateMessageErrorSubCode);

/// BGP Finite State Machine Error Subcodes for [`BgpErrorNotificationCode::FiniteStateMachineError`] as defined by [RFC6608](https://datatracker.ietf.org/doc/html/rfc6608)
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum FiniteStateMachineErrorSubCode {
    #[strum(to_string = "Unspecified Error")]
    UnspecifiedError = 0,
    #[strum(to_string = "Receive Unexpected Message in OpenSent State")]
    ReceiveUnexpectedMessageInOpenSentState = 1,
    #[strum(to_string = "Receive Unexpected Message in OpenConfirm State")]
    ReceiveUnexpectedMessageInOpenConfirmState = 2,
    #[strum(to_string = "Receive Unexpected Message in Established State")]
    ReceiveUnexpectedMessageInEstablishedState = 3,
}
iana_u8_code!(FiniteStateMachineErrorSubCode, UndefinedFiniteStateMachineErrorSubCode);

/// BGP Cease NOTIFICATION message subcodes for [`BgpErrorNotificationCode::Cease`] as defined by [RFC4486](https://datatracker.ietf.org/doc/html/rfc4486)
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum CeaseErrorSubCode {
    #[strum(to_string = "Maximum Number of Prefixes Reached")]
    MaximumNumberOfPrefixesReached = 1,
    #[strum(to_string = "Administratively Shutdown")]
    AdministrativeShutdown = 2,
    #[strum(to_string = "Peer Unconfigured")]
    PeerDeConfigured = 3,
    #[strum(to_string = "Administratively Reset")]
    AdministrativeReset = 4,
    #[strum(to_string = "Connection Rejected")]
    ConnectionRejected = 5,
    #[strum(to_string = "Other Configuration Change")]
    OtherConfigurationChange = 6,
    #[strum(to_string = "Connection collision resolution")]
    ConnectionCollisionResolution = 7,
    #[strum(to_string = "Out of Resource")]
    OutOfResources = 8,
}
iana_u8_code!(CeaseErrorSubCode, UndefinedCeaseErrorSubCode);

/// Sub-codes for [`BgpErrorNotificationCode::CapabilityMessageError`]
#[repr(u8)]
#[derive(
    Display, FromRepr, IntoStaticStr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize,
)]
pub enum CapabilityMessageErrorSubCode {
    #[strum(to_string = "Unspecific")]
    Unspecific = 0,
    #[strum(to_string = "Invalid Action Value")]
    InvalidActionValue = 1,
    #[strum(to_string = "Invalid Capability Length")]
    InvalidCapabilityLength = 2,
    #[strum(to_string = "Malformed Capability Value")]
    MalformedCapabilityValue = 3,
}
iana_u8_code!(CapabilityMessageErrorSubCode, UndefinedCapabilityMessageErrorSubCode);

/// High-order type octet of an extended community, the transitive variants
/// from [RFC4360](https://datatracker.ietf.org/doc/html/rfc4360) and
/// [RFC5668](https://datatracker.ietf.org/doc/html/rfc5668)
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ExtendedCommunityEncoding {
    /// Two-octet AS specific: `ASN(2):value(4)`
    TwoOctetAs = 0x00,
    /// IPv4 address specific: `address(4):value(2)`
    Ipv4Address = 0x01,
    /// Four-octet AS specific: `ASN(4):value(2)`
    FourOctetAs = 0x02,
    Opaque = 0x03,
}
iana_u8_code!(ExtendedCommunityEncoding, UndefinedExtendedCommunityEncoding);

/// Low-order sub-type octet shared by the AS and IPv4 specific encodings
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ExtendedCommunitySubType {
    RouteTarget = 0x02,
    RouteOrigin = 0x03,
}
iana_u8_code!(ExtendedCommunitySubType, UndefinedExtendedCommunitySubType);

/// Sub-types of [`ExtendedCommunityEncoding::Opaque`]
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OpaqueExtendedCommunitySubType {
    /// [RFC9012](https://datatracker.ietf.org/doc/html/rfc9012)
    Encapsulation = 0x0c,
}
iana_u8_code!(OpaqueExtendedCommunitySubType, UndefinedOpaqueExtendedCommunitySubType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_code_round_trip() {
        assert_eq!(
            BgpErrorNotificationCode::try_from(7),
            Ok(BgpErrorNotificationCode::CapabilityMessageError)
        );
        assert_eq!(u8::from(BgpErrorNotificationCode::Cease), 6);
        assert_eq!(
            BgpErrorNotificationCode::try_from(0),
            Err(UndefinedBgpErrorNotificationCode(0))
        );
    }

    #[test]
    fn test_display_text() {
        assert_eq!(
            BgpErrorNotificationCode::OpenMessageError.to_string(),
            "OPEN Message Error"
        );
        assert_eq!(
            CeaseErrorSubCode::ConnectionCollisionResolution.to_string(),
            "Connection collision resolution"
        );
        assert_eq!(
            UpdateMessageErrorSubCode::try_from(7).map(|x| x.to_string()),
            Ok("AS Routing Loop".to_string())
        );
    }
}
