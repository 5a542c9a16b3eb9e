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


//! Framing of BGP messages read from a peer stream.

use bgpcore_bgp_pkt::wire::{BGP_HEADER_LENGTH, BGP_MARKER_LENGTH, BGP_MAX_MESSAGE_LENGTH};
use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::codec::Decoder;

const MARKER: [u8; BGP_MARKER_LENGTH] = [0xff; BGP_MARKER_LENGTH];

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum BgpFramingError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("connection not synchronized, bad message marker")]
    ConnectionNotSynchronized,

    #[error("bad message length {0}")]
    BadMessageLength(u16),
}

impl From<io::Error> for BgpFramingError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

impl From<BgpFramingError> for io::Error {
    fn from(error: BgpFramingError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, error)
    }
}

/// Splits the byte stream into whole messages (header included) using the
/// 19 octet header: marker, length and type. Message bodies are left to the
/// session layer.
#[derive(Debug, Default, Copy, Clone)]
pub struct BgpFrameCodec;

impl Decoder for BgpFrameCodec {
    type Item = Bytes;
    type Error = BgpFramingError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < BGP_HEADER_LENGTH {
            return Ok(None);
        }
        if buf[..BGP_MARKER_LENGTH] != MARKER {
            return Err(BgpFramingError::ConnectionNotSynchronized);
        }
        let length = NetworkEndian::read_u16(&buf[BGP_MARKER_LENGTH..BGP_MARKER_LENGTH + 2]);
        let message_length = length as usize;
        if !(BGP_HEADER_LENGTH..=BGP_MAX_MESSAGE_LENGTH).contains(&message_length) {
            return Err(BgpFramingError::BadMessageLength(length));
        }
        if buf.len() < message_length {
            buf.reserve(message_length - buf.len());
            return Ok(None);
        }
        Ok(Some(buf.split_to(message_length).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keepalive() -> Vec<u8> {
        let mut message = MARKER.to_vec();
        message.extend_from_slice(&[0x00, 0x13, 0x04]);
        message
    }

    #[test]
    fn test_decode_split_messages() {
        let mut codec = BgpFrameCodec;
        let mut buf = BytesMut::new();
        let stream = [keepalive(), keepalive()].concat();
        buf.extend_from_slice(&stream[..10]);
        assert_eq!(codec.decode(&mut buf), Ok(None));
        buf.extend_from_slice(&stream[10..25]);
        assert_eq!(codec.decode(&mut buf), Ok(Some(Bytes::from(keepalive()))));
        assert_eq!(codec.decode(&mut buf), Ok(None));
        buf.extend_from_slice(&stream[25..]);
        assert_eq!(codec.decode(&mut buf), Ok(Some(Bytes::from(keepalive()))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let mut codec = BgpFrameCodec;
        let mut bad_marker = keepalive();
        bad_marker[3] = 0;
        assert_eq!(
            codec.decode(&mut BytesMut::from(&bad_marker[..])),
            Err(BgpFramingError::ConnectionNotSynchronized)
        );
        let mut short = keepalive();
        short[17] = 0x12;
        assert_eq!(
            codec.decode(&mut BytesMut::from(&short[..])),
            Err(BgpFramingError::BadMessageLength(18))
        );
        let mut long = keepalive();
        long[16] = 0x10;
        long[17] = 0x01;
        assert_eq!(
            codec.decode(&mut BytesMut::from(&long[..])),
            Err(BgpFramingError::BadMessageLength(4097))
        );
    }
}
