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


//! Serializer for BGP Path Attributes

use crate::{
    community::Community,
    iana::PathAttributeType,
    path_attribute::{Aggregator, AsPath, AsnEncoding, PathAttributes, AS_TRANS},
    wire::{
        serializer::community::{CommunityWritingError, ExtendedCommunityWritingError},
        EXTENDED_LENGTH, MAX_SEGMENT_AS_COUNT, MAX_SHORT_ATTRIBUTE_LENGTH, OPTIONAL, TRANSITIVE,
    },
};
use bgpcore_parse_utils::{impl_from_std_io_error, WritablePdu, WritablePduWithOneInput};
use byteorder::{NetworkEndian, WriteBytesExt};

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum AsPathWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),
}

impl_from_std_io_error!(AsPathWritingError);

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum AggregatorWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),
}

impl_from_std_io_error!(AggregatorWritingError);

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum PathAttributesWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),

    #[error("{attribute} payload of {len} octets exceeds the extended length field")]
    AttributeTooLong {
        attribute: PathAttributeType,
        len: usize,
    },

    #[error(transparent)]
    AsPathError(#[from] AsPathWritingError),

    #[error(transparent)]
    AggregatorError(#[from] AggregatorWritingError),

    #[error(transparent)]
    CommunityError(#[from] CommunityWritingError),

    #[error(transparent)]
    ExtendedCommunityError(#[from] ExtendedCommunityWritingError),
}

impl_from_std_io_error!(PathAttributesWritingError);

/// Write an ASN at the width of the session. A four-octet ASN sent to a
/// two-octet speaker is replaced with AS_TRANS.
#[inline]
pub(crate) fn write_asn<T: std::io::Write>(
    writer: &mut T,
    asn: u32,
    encoding: AsnEncoding,
) -> Result<(), std::io::Error> {
    match encoding {
        AsnEncoding::TwoOctet => {
            writer.write_u16::<NetworkEndian>(u16::try_from(asn).unwrap_or(AS_TRANS))
        }
        AsnEncoding::FourOctet => writer.write_u32::<NetworkEndian>(asn),
    }
}

/// Length of the flags, type and length fields for a payload
#[inline]
pub(crate) const fn attribute_header_len(payload_len: usize) -> usize {
    if payload_len > MAX_SHORT_ATTRIBUTE_LENGTH {
        4
    } else {
        3
    }
}

/// Write flags, type and length. The extended length flag is added when the
/// payload does not fit in one octet.
pub(crate) fn write_attribute_header<T: std::io::Write>(
    writer: &mut T,
    flags: u8,
    attribute: PathAttributeType,
    payload_len: usize,
) -> Result<(), PathAttributesWritingError> {
    if payload_len > MAX_SHORT_ATTRIBUTE_LENGTH {
        let len = u16::try_from(payload_len).map_err(|_| {
            PathAttributesWritingError::AttributeTooLong {
                attribute,
                len: payload_len,
            }
        })?;
        writer.write_u8(flags | EXTENDED_LENGTH)?;
        writer.write_u8(attribute.into())?;
        writer.write_u16::<NetworkEndian>(len)?;
    } else {
        writer.write_u8(flags)?;
        writer.write_u8(attribute.into())?;
        writer.write_u8(payload_len as u8)?;
    }
    Ok(())
}

/// Writes only the segments (the attribute payload). Segments longer than
/// 255 ASNs are split into consecutive segments of the same type.
impl WritablePduWithOneInput<AsnEncoding, AsPathWritingError> for AsPath {
    const BASE_LENGTH: usize = 0;

    fn len(&self, encoding: AsnEncoding) -> usize {
        let segments_len: usize = self
            .segments()
            .iter()
            .flat_map(|segment| segment.as_numbers().chunks(MAX_SEGMENT_AS_COUNT))
            .map(|chunk| 2 + chunk.len() * encoding.asn_len())
            .sum();
        Self::BASE_LENGTH + segments_len
    }

    fn write<T: std::io::Write>(
        &self,
        writer: &mut T,
        encoding: AsnEncoding,
    ) -> Result<(), AsPathWritingError> {
        for segment in self.segments() {
            for chunk in segment.as_numbers().chunks(MAX_SEGMENT_AS_COUNT) {
                writer.write_u8(segment.segment_type().into())?;
                writer.write_u8(chunk.len() as u8)?;
                for asn in chunk {
                    write_asn(writer, *asn, encoding)?;
                }
            }
        }
        Ok(())
    }
}

impl WritablePduWithOneInput<AsnEncoding, AggregatorWritingError> for Aggregator {
    const BASE_LENGTH: usize = 4;

    fn len(&self, encoding: AsnEncoding) -> usize {
        Self::BASE_LENGTH + encoding.asn_len()
    }

    fn write<T: std::io::Write>(
        &self,
        writer: &mut T,
        encoding: AsnEncoding,
    ) -> Result<(), AggregatorWritingError> {
        write_asn(writer, self.asn(), encoding)?;
        writer.write_all(&self.origin().octets())?;
        Ok(())
    }
}

impl PathAttributes {
    fn communities_len(&self) -> Option<usize> {
        self.communities
            .as_ref()
            .map(|communities| {
                communities
                    .iter()
                    .map(<Community as WritablePdu<CommunityWritingError>>::len)
                    .sum()
            })
    }
}

/// Encodes the attribute block: origin, AS path, next hop, then MED, local
/// preference, atomic aggregate, aggregator, communities and extended
/// communities when present.
impl WritablePduWithOneInput<AsnEncoding, PathAttributesWritingError> for PathAttributes {
    const BASE_LENGTH: usize = 0;

    fn len(&self, encoding: AsnEncoding) -> usize {
        let fixed = |payload: usize| attribute_header_len(payload) + payload;
        let as_path_len = self.as_path.len(encoding);
        let mut len = Self::BASE_LENGTH + fixed(1) + fixed(as_path_len) + fixed(4);
        if self.med.is_some() {
            len += fixed(4);
        }
        if self.local_preference.is_some() {
            len += fixed(4);
        }
        if self.atomic_aggregate {
            len += fixed(0);
        }
        if let Some(aggregator) = &self.aggregator {
            len += fixed(aggregator.len(encoding));
        }
        if let Some(communities_len) = self.communities_len() {
            len += fixed(communities_len);
        }
        if let Some(extended) = &self.extended_communities {
            len += fixed(extended.octets_len());
        }
        len
    }

    fn write<T: std::io::Write>(
        &self,
        writer: &mut T,
        encoding: AsnEncoding,
    ) -> Result<(), PathAttributesWritingError> {
        write_attribute_header(writer, TRANSITIVE, PathAttributeType::Origin, 1)?;
        writer.write_u8(self.origin.into())?;

        write_attribute_header(
            writer,
            TRANSITIVE,
            PathAttributeType::AsPath,
            self.as_path.len(encoding),
        )?;
        self.as_path.write(writer, encoding)?;

        write_attribute_header(writer, TRANSITIVE, PathAttributeType::NextHop, 4)?;
        writer.write_all(&self.next_hop.octets())?;

        if let Some(med) = self.med {
            write_attribute_header(writer, OPTIONAL, PathAttributeType::MultiExitDiscriminator, 4)?;
            writer.write_u32::<NetworkEndian>(med)?;
        }
        if let Some(local_preference) = self.local_preference {
            write_attribute_header(writer, TRANSITIVE, PathAttributeType::LocalPreference, 4)?;
            writer.write_u32::<NetworkEndian>(local_preference)?;
        }
        if self.atomic_aggregate {
            write_attribute_header(writer, TRANSITIVE, PathAttributeType::AtomicAggregate, 0)?;
        }
        if let Some(aggregator) = &self.aggregator {
            write_attribute_header(
                writer,
                OPTIONAL | TRANSITIVE,
                PathAttributeType::Aggregator,
                aggregator.len(encoding),
            )?;
            aggregator.write(writer, encoding)?;
        }
        if let (Some(communities), Some(len)) = (&self.communities, self.communities_len()) {
            write_attribute_header(
                writer,
                OPTIONAL | TRANSITIVE,
                PathAttributeType::Communities,
                len,
            )?;
            for community in communities {
                community.write(writer)?;
            }
        }
        if let Some(extended) = &self.extended_communities {
            write_attribute_header(
                writer,
                OPTIONAL | TRANSITIVE,
                PathAttributeType::ExtendedCommunities,
                extended.octets_len(),
            )?;
            extended.write(writer)?;
        }
        Ok(())
    }
}
