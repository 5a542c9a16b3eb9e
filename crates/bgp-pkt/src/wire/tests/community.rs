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


use crate::{
    community::*,
    iana::ExtendedCommunitySubType,
    intern::{ExtCommunityStore, InternedExtCommunity},
    wire::{
        deserializer::community::{
            CommunityParsingError, ExtendedCommunityParsingError, LocatedCommunityParsingError,
            LocatedExtendedCommunityParsingError,
        },
        serializer::community::*,
    },
};
use bgpcore_parse_utils::{
    test_helpers::{
        test_parse_error, test_parse_error_with_one_input, test_parsed_completely,
        test_parsed_completely_with_one_input, test_write,
    },
    LocatedError,
};
use nom::error::ErrorKind;

#[test]
fn test_community() -> Result<(), CommunityWritingError> {
    let good_wire = [0x00, 0xef, 0x00, 0x20];
    let bad_incomplete_wire = [0x00];

    let good = Community::new(0x00ef0020);
    let bad_incomplete = LocatedCommunityParsingError::new(
        &bad_incomplete_wire,
        CommunityParsingError::NomError(ErrorKind::Eof),
    );

    test_parsed_completely(&good_wire, &good);
    test_parse_error::<Community, LocatedCommunityParsingError<'_>>(
        &bad_incomplete_wire,
        &bad_incomplete,
    );

    test_write(&good, &good_wire)?;
    Ok(())
}

#[test]
fn test_extended_community_write_sorted() -> Result<(), ExtendedCommunityWritingError> {
    let good_wire = [
        0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01, // RT:100:1
        0x01, 0x03, 0x0a, 0x00, 0x00, 0x01, 0x00, 0x05, // SoO:10.0.0.1:5
        0x02, 0x02, 0xfa, 0x56, 0xea, 0x00, 0x00, 0x07, // RT:4200000000:7
    ];
    let good = ExtendedCommunity::from_entries([
        ExtCommunityValue::four_octet_as(ExtendedCommunitySubType::RouteTarget, 4200000000, 7),
        ExtCommunityValue::ipv4_address(
            ExtendedCommunitySubType::RouteOrigin,
            std::net::Ipv4Addr::new(10, 0, 0, 1),
            5,
        ),
        ExtCommunityValue::two_octet_as(ExtendedCommunitySubType::RouteTarget, 100, 1),
    ]);
    test_write(&good, &good_wire)?;
    assert_eq!(good.to_string(), "RT:100:1 SoO:10.0.0.1:5 RT:4200000000:7");
    Ok(())
}

#[test]
fn test_extended_community_interned_on_decode() {
    let store = ExtCommunityStore::new();
    let good_wire = [0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01];
    let expected = store.parse(&good_wire).unwrap();

    let parsed = test_parsed_completely_with_one_input(&good_wire, &store, &expected);
    assert!(InternedExtCommunity::ptr_eq(&parsed, &expected));
    assert_eq!(store.refcount(&good_wire), Some(2));
    drop(parsed);
    assert_eq!(store.refcount(&good_wire), Some(1));
}

#[test]
fn test_extended_community_malformed_length() {
    let store = ExtCommunityStore::new();
    let bad_wire = [0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00];
    let bad = LocatedError::new(
        &bad_wire[..],
        ExtendedCommunityParsingError::Invalid(ExtendedCommunityError::MalformedLength(7)),
    );
    test_parse_error_with_one_input::<
        InternedExtCommunity,
        &ExtCommunityStore,
        LocatedExtendedCommunityParsingError<'_>,
    >(&bad_wire, &store, &bad);
    assert!(store.is_empty());
}

#[test]
fn test_extended_community_wire_order_round_trip() -> Result<(), ExtendedCommunityWritingError> {
    let store = ExtCommunityStore::new();
    let good_wire = [
        0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x02, // RT:100:2
        0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01, // RT:100:1
        0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01, // RT:100:1
    ];
    let expected = store.parse(&good_wire).unwrap();
    let parsed = test_parsed_completely_with_one_input(&good_wire, &store, &expected);
    assert_eq!(parsed.size(), 3);
    test_write(&*parsed, &good_wire)?;
    Ok(())
}
