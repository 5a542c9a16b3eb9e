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

//! Traits and small helpers for reading and writing BGP wire structures

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

use std::fmt::{Debug, Display, Formatter};

/// Input type for all nom based parsers in the workspace
pub type Span<'a> = &'a [u8];

/// Readable Protocol Data Unit that doesn't need any external input while
/// parsing the packet.
pub trait ReadablePdu<'a, Error: Debug> {
    fn from_wire(buf: Span<'a>) -> nom::IResult<Span<'a>, Self, Error>
    where
        Self: Sized;
}

/// Readable Protocol Data Unit that needs one external input, e.g. the
/// ASN encoding width negotiated for the session.
pub trait ReadablePduWithOneInput<'a, T, Error: Debug> {
    fn from_wire(buf: Span<'a>, input: T) -> nom::IResult<Span<'a>, Self, Error>
    where
        Self: Sized;
}

/// Writable Protocol Data Unit that doesn't need any external input while
/// writing the packet.
#[allow(clippy::len_without_is_empty)]
pub trait WritablePdu<ErrorType> {
    const BASE_LENGTH: usize;

    /// The total length of the written buffer
    fn len(&self) -> usize;

    fn write<T: std::io::Write>(&self, writer: &mut T) -> Result<(), ErrorType>
    where
        Self: Sized;
}

/// Writable Protocol Data Unit whose encoding depends on one external input.
#[allow(clippy::len_without_is_empty)]
pub trait WritablePduWithOneInput<I, ErrorType> {
    const BASE_LENGTH: usize;

    /// The total length of the written buffer
    fn len(&self, input: I) -> usize;

    fn write<T: std::io::Write>(&self, writer: &mut T, input: I) -> Result<(), ErrorType>
    where
        Self: Sized;
}

/// Keep repeating the parser till the buf is empty
#[inline]
pub fn parse_till_empty<'a, T: ReadablePdu<'a, E>, E: Debug>(
    buf: Span<'a>,
) -> nom::IResult<Span<'a>, Vec<T>, E> {
    let mut buf = buf;
    let mut ret = Vec::new();
    while !buf.is_empty() {
        let (tmp, element) = T::from_wire(buf)?;
        ret.push(element);
        buf = tmp;
    }
    Ok((buf, ret))
}

/// Keep repeating the parser till the buf is empty, passing the same input
/// to every element
#[inline]
pub fn parse_till_empty_with_one_input<
    'a,
    I: Clone,
    T: ReadablePduWithOneInput<'a, I, E>,
    E: Debug,
>(
    buf: Span<'a>,
    input: I,
) -> nom::IResult<Span<'a>, Vec<T>, E> {
    let mut buf = buf;
    let mut ret = Vec::new();
    while !buf.is_empty() {
        let (tmp, element) = T::from_wire(buf, input.clone())?;
        ret.push(element);
        buf = tmp;
    }
    Ok((buf, ret))
}

/// Parsing error paired with the input at the point where it occurred. The
/// span should refer (as much as possible) to the first byte where the error
/// started.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LocatedError<'a, E> {
    span: Span<'a>,
    error: E,
}

impl<'a, E> LocatedError<'a, E> {
    pub const fn new(span: Span<'a>, error: E) -> Self {
        Self { span, error }
    }

    pub const fn span(&self) -> &Span<'a> {
        &self.span
    }

    pub const fn error(&self) -> &E {
        &self.error
    }

    pub fn into_error(self) -> E {
        self.error
    }

    /// Convert the inner error while keeping the location
    pub fn map<F, O: FnOnce(E) -> F>(self, op: O) -> LocatedError<'a, F> {
        LocatedError::new(self.span, op(self.error))
    }
}

impl<'a, E: From<nom::error::ErrorKind>> nom::error::ParseError<Span<'a>> for LocatedError<'a, E> {
    fn from_error_kind(input: Span<'a>, kind: nom::error::ErrorKind) -> Self {
        LocatedError::new(input, E::from(kind))
    }

    fn append(_input: Span<'a>, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E: Display> Display for LocatedError<'a, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} octets remaining)", self.error, self.span.len())
    }
}

/// Lift a nom error of a nested parser into the caller's located error type
#[inline]
pub fn lift_error<'a, E, F: From<E>>(
    err: nom::Err<LocatedError<'a, E>>,
) -> nom::Err<LocatedError<'a, F>> {
    err.map(|located| located.map(F::from))
}

/// Implement `From<std::io::Error>` for writing error enums that carry the
/// I/O failure as `StdIOError(String)`.
#[macro_export]
macro_rules! impl_from_std_io_error {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<std::io::Error> for $error {
                fn from(err: std::io::Error) -> Self {
                    Self::StdIOError(err.to_string())
                }
            }
        )+
    };
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum LengthWidth {
    U16,
    U32,
}

impl LengthWidth {
    const fn octets(&self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    const fn max(&self) -> usize {
        match self {
            Self::U16 => u16::MAX as usize,
            Self::U32 => u32::MAX as usize,
        }
    }
}

/// The body written after a reserved length field doesn't fit in the field
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LengthOverflow(pub usize);

impl Display for LengthOverflow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "body length {} overflows the reserved length field", self.0)
    }
}

impl std::error::Error for LengthOverflow {}

/// A length field reserved in a growing buffer and filled in once the body
/// that follows it has been written.
///
/// The patched value counts the octets written *after* the length field.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use = "a reserved length must be patched once the body is written"]
pub struct LengthPatch {
    offset: usize,
    width: LengthWidth,
}

impl LengthPatch {
    /// Reserve two zeroed octets at the end of `buf`
    pub fn reserve_u16(buf: &mut Vec<u8>) -> Self {
        Self::reserve(buf, LengthWidth::U16)
    }

    /// Reserve four zeroed octets at the end of `buf`
    pub fn reserve_u32(buf: &mut Vec<u8>) -> Self {
        Self::reserve(buf, LengthWidth::U32)
    }

    fn reserve(buf: &mut Vec<u8>, width: LengthWidth) -> Self {
        let offset = buf.len();
        buf.resize(offset + width.octets(), 0);
        Self { offset, width }
    }

    /// Offset of the reserved field inside the buffer
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Overwrite the reserved octets with the number of octets written after
    /// them. Returns the patched length.
    pub fn patch(self, buf: &mut [u8]) -> Result<usize, LengthOverflow> {
        let body_start = self.offset + self.width.octets();
        let body_len = buf.len().saturating_sub(body_start);
        if body_len > self.width.max() {
            return Err(LengthOverflow(body_len));
        }
        match self.width {
            LengthWidth::U16 => {
                buf[self.offset..body_start].copy_from_slice(&(body_len as u16).to_be_bytes())
            }
            LengthWidth::U32 => {
                buf[self.offset..body_start].copy_from_slice(&(body_len as u32).to_be_bytes())
            }
        }
        Ok(body_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_patch_u32() {
        let mut buf = vec![0xaa, 0xbb];
        let patch = LengthPatch::reserve_u32(&mut buf);
        assert_eq!(patch.offset(), 2);
        buf.extend_from_slice(&[1, 2, 3]);
        assert_eq!(patch.patch(&mut buf), Ok(3));
        assert_eq!(buf, vec![0xaa, 0xbb, 0, 0, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_length_patch_u16_empty_body() {
        let mut buf = vec![];
        let patch = LengthPatch::reserve_u16(&mut buf);
        assert_eq!(patch.patch(&mut buf), Ok(0));
        assert_eq!(buf, vec![0, 0]);
    }

    #[test]
    fn test_length_patch_overflow() {
        let mut buf = vec![];
        let patch = LengthPatch::reserve_u16(&mut buf);
        buf.resize(2 + u16::MAX as usize + 1, 0);
        assert_eq!(
            patch.patch(&mut buf),
            Err(LengthOverflow(u16::MAX as usize + 1))
        );
    }
}
