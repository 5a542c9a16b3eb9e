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


//! Serializer for communities attributes payloads

use crate::community::{Community, ExtendedCommunity};
use byteorder::{NetworkEndian, WriteBytesExt};
use bgpcore_parse_utils::{impl_from_std_io_error, WritablePdu};

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum CommunityWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),
}

impl_from_std_io_error!(CommunityWritingError);

impl WritablePdu<CommunityWritingError> for Community {
    const BASE_LENGTH: usize = 4;

    fn len(&self) -> usize {
        Self::BASE_LENGTH
    }

    fn write<T: std::io::Write>(&self, writer: &mut T) -> Result<(), CommunityWritingError> {
        writer.write_u32::<NetworkEndian>(self.value())?;
        Ok(())
    }
}

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum ExtendedCommunityWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),
}

impl_from_std_io_error!(ExtendedCommunityWritingError);

/// Writes the entries back to back, in their sorted order
impl WritablePdu<ExtendedCommunityWritingError> for ExtendedCommunity {
    const BASE_LENGTH: usize = 0;

    fn len(&self) -> usize {
        Self::BASE_LENGTH + self.octets_len()
    }

    fn write<T: std::io::Write>(
        &self,
        writer: &mut T,
    ) -> Result<(), ExtendedCommunityWritingError> {
        for entry in self.entries() {
            writer.write_all(entry.octets())?;
        }
        Ok(())
    }
}
