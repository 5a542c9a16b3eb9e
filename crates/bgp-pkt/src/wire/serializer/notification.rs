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


//! Serializer for BGP NOTIFICATION messages

use crate::{
    iana::BgpMessageType,
    notification::BgpNotification,
    wire::{BGP_HEADER_LENGTH, BGP_MARKER_LENGTH},
};
use bgpcore_parse_utils::{impl_from_std_io_error, WritablePdu};
use byteorder::{NetworkEndian, WriteBytesExt};

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum BgpNotificationWritingError {
    #[error("I/O error: {0}")]
    StdIOError(String),

    #[error("NOTIFICATION of {0} octets does not fit the message length field")]
    MessageTooLong(usize),
}

impl_from_std_io_error!(BgpNotificationWritingError);

/// Write the BGP message header of a NOTIFICATION followed by the error code
/// and subcode. `data_len` octets of data are expected to follow.
pub fn encode_notification_header<T: std::io::Write>(
    writer: &mut T,
    code: u8,
    subcode: u8,
    data_len: usize,
) -> Result<(), BgpNotificationWritingError> {
    let total = BGP_HEADER_LENGTH + 2 + data_len;
    let len =
        u16::try_from(total).map_err(|_| BgpNotificationWritingError::MessageTooLong(total))?;
    writer.write_all(&[0xff; BGP_MARKER_LENGTH])?;
    writer.write_u16::<NetworkEndian>(len)?;
    writer.write_u8(BgpMessageType::Notification.into())?;
    writer.write_u8(code)?;
    writer.write_u8(subcode)?;
    Ok(())
}

impl WritablePdu<BgpNotificationWritingError> for BgpNotification {
    /// header + code + subcode
    const BASE_LENGTH: usize = BGP_HEADER_LENGTH + 2;

    fn len(&self) -> usize {
        Self::BASE_LENGTH + self.data().len()
    }

    fn write<T: std::io::Write>(&self, writer: &mut T) -> Result<(), BgpNotificationWritingError> {
        encode_notification_header(writer, self.code(), self.subcode(), self.data().len())?;
        writer.write_all(self.data())?;
        Ok(())
    }
}
