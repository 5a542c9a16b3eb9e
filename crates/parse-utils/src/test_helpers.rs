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

//! Assertions shared by the wire tests of the workspace crates

use crate::{ReadablePdu, ReadablePduWithOneInput, Span, WritablePdu, WritablePduWithOneInput};
use std::fmt::Debug;

/// Parse `input` and assert that the whole buffer was consumed and the value
/// matches `expected`.
pub fn test_parsed_completely<'a, T, E>(input: &'a [u8], expected: &T) -> T
where
    T: ReadablePdu<'a, E> + PartialEq + Debug,
    E: Debug,
{
    let parsed = <T as ReadablePdu<'a, E>>::from_wire(input);
    assert!(parsed.is_ok(), "Message failed parsing, while expecting it to pass: {parsed:?}");
    let (remaining, parsed) = parsed.unwrap();
    assert_eq!(&parsed, expected);
    assert!(remaining.is_empty(), "Not all the input is consumed: {remaining:?}");
    parsed
}

/// Same as [test_parsed_completely] for PDUs that need one external input.
pub fn test_parsed_completely_with_one_input<'a, T, I, E>(
    input: &'a [u8],
    parser_input: I,
    expected: &T,
) -> T
where
    T: ReadablePduWithOneInput<'a, I, E> + PartialEq + Debug,
    E: Debug,
{
    let parsed = <T as ReadablePduWithOneInput<'a, I, E>>::from_wire(input, parser_input);
    assert!(parsed.is_ok(), "Message failed parsing, while expecting it to pass: {parsed:?}");
    let (remaining, parsed) = parsed.unwrap();
    assert_eq!(&parsed, expected);
    assert!(remaining.is_empty(), "Not all the input is consumed: {remaining:?}");
    parsed
}

/// Parse `input` and assert the parser fails with `expected`.
pub fn test_parse_error<'a, T, E>(input: &'a [u8], expected: &E)
where
    T: ReadablePdu<'a, E> + Debug,
    E: Debug + PartialEq,
{
    let parsed: nom::IResult<Span<'a>, T, E> = <T as ReadablePdu<'a, E>>::from_wire(input);
    match parsed {
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => assert_eq!(&err, expected),
        other => panic!("Expected parsing to fail with {expected:?}, got {other:?}"),
    }
}

/// Same as [test_parse_error] for PDUs that need one external input.
pub fn test_parse_error_with_one_input<'a, T, I, E>(input: &'a [u8], parser_input: I, expected: &E)
where
    T: ReadablePduWithOneInput<'a, I, E> + Debug,
    E: Debug + PartialEq,
{
    let parsed: nom::IResult<Span<'a>, T, E> =
        <T as ReadablePduWithOneInput<'a, I, E>>::from_wire(input, parser_input);
    match parsed {
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => assert_eq!(&err, expected),
        other => panic!("Expected parsing to fail with {expected:?}, got {other:?}"),
    }
}

/// Write `input` and compare with the `expected` bytes, also checking the
/// advertised length matches what was written.
pub fn test_write<T: WritablePdu<E>, E>(input: &T, expected: &[u8]) -> Result<(), E> {
    let mut buf: Vec<u8> = vec![];
    input.write(&mut buf)?;
    assert_eq!(buf, expected);
    assert_eq!(input.len(), expected.len(), "Advertised length doesn't match");
    Ok(())
}

/// Same as [test_write] for PDUs that need one external input.
pub fn test_write_with_one_input<I: Copy, T: WritablePduWithOneInput<I, E>, E>(
    input: &T,
    writer_input: I,
    expected: &[u8],
) -> Result<(), E> {
    let mut buf: Vec<u8> = vec![];
    input.write(&mut buf, writer_input)?;
    assert_eq!(buf, expected);
    assert_eq!(
        input.len(writer_input),
        expected.len(),
        "Advertised length doesn't match"
    );
    Ok(())
}
