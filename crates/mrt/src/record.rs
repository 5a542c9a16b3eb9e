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


//! MRT record encoding, [RFC6396](https://datatracker.ietf.org/doc/html/rfc6396)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Type              |            Subtype            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             Length                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Message... (variable)
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The length is unknown until the body is written: a placeholder is
//! reserved and patched once the record is complete.

use bgpcore_bgp_pkt::{
    path_attribute::AS_TRANS, wire::serializer::path_attribute::PathAttributesWritingError,
    AsnEncoding, PathAttributes,
};
use bgpcore_parse_utils::{LengthOverflow, LengthPatch, WritablePduWithOneInput};
use byteorder::{NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum_macros::{Display, FromRepr};

/// Length of the common header, the length field counts what follows it
pub const MRT_HEADER_LENGTH: usize = 12;

/// Status octet of TABLE_DUMP entries, always 1
const TABLE_DUMP_STATUS: u8 = 1;

/// Address family identifiers used in MRT bodies
const AFI_IPV4: u16 = 1;
const AFI_IPV6: u16 = 2;

#[repr(u16)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MrtType {
    TableDump = 12,
    Bgp4mp = 16,
}

#[repr(u16)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TableDumpSubType {
    AfiIpv4 = 1,
    AfiIpv6 = 2,
}

#[repr(u16)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Bgp4mpSubType {
    StateChange = 0,
    Message = 1,
    MessageAs4 = 4,
    StateChangeAs4 = 5,
}

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum MrtWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),

    #[error("record body of {0} octets does not fit its length field")]
    LengthOverflow(usize),

    #[error("peer address {peer} and {other} are not of the same address family")]
    AddressFamilyMismatch { peer: IpAddr, other: String },

    #[error(transparent)]
    AttributesError(#[from] PathAttributesWritingError),
}

bgpcore_parse_utils::impl_from_std_io_error!(MrtWritingError);

impl From<LengthOverflow> for MrtWritingError {
    fn from(value: LengthOverflow) -> Self {
        Self::LengthOverflow(value.0)
    }
}

/// The per session facts shared by all BGP4MP records of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    pub peer_as: u32,
    pub local_as: u32,
    pub peer_address: IpAddr,
    pub local_address: IpAddr,
    /// Interface index the session runs over, 0 when unknown
    pub if_index: u16,
    /// The peer advertised the four-octet AS capability
    pub as4: bool,
}

/// One route of a TABLE_DUMP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDumpEntry {
    pub view: u16,
    pub sequence: u16,
    pub prefix: IpNet,
    pub originated: u32,
    pub peer_address: IpAddr,
    pub peer_as: u32,
    pub attributes: PathAttributes,
}

/// An MRT record body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MrtRecord {
    TableDump(TableDumpEntry),
    /// FSM state change, states use the RFC4271 numbering (Idle = 1)
    StateChange {
        session: SessionInfo,
        old_state: u16,
        new_state: u16,
    },
    /// A raw BGP message as sent or received, header included
    Message { session: SessionInfo, message: Bytes },
}

fn write_address<T: std::io::Write>(writer: &mut T, address: &IpAddr) -> std::io::Result<()> {
    match address {
        IpAddr::V4(address) => writer.write_all(&address.octets()),
        IpAddr::V6(address) => writer.write_all(&address.octets()),
    }
}

fn write_two_octet_as<T: std::io::Write>(writer: &mut T, asn: u32) -> std::io::Result<()> {
    writer.write_u16::<NetworkEndian>(u16::try_from(asn).unwrap_or(AS_TRANS))
}

impl MrtRecord {
    pub const fn mrt_type(&self) -> MrtType {
        match self {
            Self::TableDump(_) => MrtType::TableDump,
            Self::StateChange { .. } | Self::Message { .. } => MrtType::Bgp4mp,
        }
    }

    pub fn sub_type(&self) -> u16 {
        let sub_type = match self {
            Self::TableDump(entry) => {
                return match entry.prefix {
                    IpNet::V4(_) => TableDumpSubType::AfiIpv4 as u16,
                    IpNet::V6(_) => TableDumpSubType::AfiIpv6 as u16,
                }
            }
            // State changes always carry four-octet ASNs
            Self::StateChange { .. } => Bgp4mpSubType::StateChangeAs4,
            Self::Message { session, .. } if session.as4 => Bgp4mpSubType::MessageAs4,
            Self::Message { .. } => Bgp4mpSubType::Message,
        };
        sub_type as u16
    }

    /// Encode the complete record, common header included
    pub fn encode(&self, timestamp: u32) -> Result<Vec<u8>, MrtWritingError> {
        let mut buf = Vec::with_capacity(64);
        buf.write_u32::<NetworkEndian>(timestamp)?;
        buf.write_u16::<NetworkEndian>(self.mrt_type() as u16)?;
        buf.write_u16::<NetworkEndian>(self.sub_type())?;
        let length = LengthPatch::reserve_u32(&mut buf);
        match self {
            Self::TableDump(entry) => write_table_dump(&mut buf, entry)?,
            Self::StateChange {
                session,
                old_state,
                new_state,
            } => {
                write_bgp4mp_common(&mut buf, session, true)?;
                buf.write_u16::<NetworkEndian>(*old_state)?;
                buf.write_u16::<NetworkEndian>(*new_state)?;
            }
            Self::Message { session, message } => {
                write_bgp4mp_common(&mut buf, session, session.as4)?;
                buf.extend_from_slice(message);
            }
        }
        length.patch(&mut buf)?;
        Ok(buf)
    }
}

/// TABLE_DUMP body. The format only has room for two-octet ASNs, both in
/// the peer AS field and in the attributes.
fn write_table_dump(buf: &mut Vec<u8>, entry: &TableDumpEntry) -> Result<(), MrtWritingError> {
    if entry.prefix.addr().is_ipv4() != entry.peer_address.is_ipv4() {
        return Err(MrtWritingError::AddressFamilyMismatch {
            peer: entry.peer_address,
            other: entry.prefix.to_string(),
        });
    }
    buf.write_u16::<NetworkEndian>(entry.view)?;
    buf.write_u16::<NetworkEndian>(entry.sequence)?;
    write_address(buf, &entry.prefix.addr())?;
    buf.write_u8(entry.prefix.prefix_len())?;
    buf.write_u8(TABLE_DUMP_STATUS)?;
    buf.write_u32::<NetworkEndian>(entry.originated)?;
    write_address(buf, &entry.peer_address)?;
    write_two_octet_as(buf, entry.peer_as)?;
    let attributes_length = LengthPatch::reserve_u16(buf);
    entry.attributes.write(buf, AsnEncoding::TwoOctet)?;
    attributes_length.patch(buf)?;
    Ok(())
}

/// Peer AS, local AS, interface index, AFI, peer address, local address
fn write_bgp4mp_common(
    buf: &mut Vec<u8>,
    session: &SessionInfo,
    as4: bool,
) -> Result<(), MrtWritingError> {
    if session.peer_address.is_ipv4() != session.local_address.is_ipv4() {
        return Err(MrtWritingError::AddressFamilyMismatch {
            peer: session.peer_address,
            other: session.local_address.to_string(),
        });
    }
    if as4 {
        buf.write_u32::<NetworkEndian>(session.peer_as)?;
        buf.write_u32::<NetworkEndian>(session.local_as)?;
    } else {
        write_two_octet_as(buf, session.peer_as)?;
        write_two_octet_as(buf, session.local_as)?;
    }
    buf.write_u16::<NetworkEndian>(session.if_index)?;
    let afi = if session.peer_address.is_ipv4() {
        AFI_IPV4
    } else {
        AFI_IPV6
    };
    buf.write_u16::<NetworkEndian>(afi)?;
    write_address(buf, &session.peer_address)?;
    write_address(buf, &session.local_address)?;
    Ok(())
}
