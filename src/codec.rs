//! Length-prefixed vector codecs shared by every extension and message.
//!
//! Parsers are `nom` combinators over complete input. A vector whose
//! length prefix exceeds the remaining input, or whose content does not
//! divide into whole elements, fails to parse and surfaces as a
//! `decode_error` fault.

use nom::bytes::complete::take;
use nom::error::{make_error, ErrorKind, ParseError};
use nom::number::complete::{be_u16, be_u24, be_u32, be_u8};
use nom::{Err, IResult, Parser};

use crate::buffer::Buf;
use crate::error::ProtocolFault;

/// Opaque vector with an 8-bit length prefix.
pub fn vec8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len)(input)
}

/// Opaque vector with a 16-bit length prefix.
pub fn vec16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len)(input)
}

/// Opaque vector with a 24-bit length prefix.
pub fn vec24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len)(input)
}

/// Opaque vector with a 32-bit length prefix.
pub fn vec32(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u32(input)?;
    take(len)(input)
}

/// Parse the whole of `input` as a sequence of `f`.
///
/// Leftover bytes that do not form a complete element fail the parse.
pub fn all_of<'a, O, F>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<O>>
where
    F: Parser<&'a [u8], O, nom::error::Error<&'a [u8]>>,
{
    move |mut input: &'a [u8]| {
        let mut acc = Vec::new();
        while !input.is_empty() {
            let len = input.len();
            let (rest, o) = f.parse(input)?;
            // the element parser must always consume
            if rest.len() == len {
                return Err(Err::Error(ParseError::from_error_kind(
                    input,
                    ErrorKind::Many0,
                )));
            }
            acc.push(o);
            input = rest;
        }
        Ok((input, acc))
    }
}

/// Like [`all_of`] but an empty vector is a decode error.
pub fn non_empty<'a, O, F>(f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<O>>
where
    F: Parser<&'a [u8], O, nom::error::Error<&'a [u8]>>,
{
    let mut inner = all_of(f);
    move |input: &'a [u8]| {
        if input.is_empty() {
            return Err(Err::Error(make_error(input, ErrorKind::NonEmpty)));
        }
        inner(input)
    }
}

/// Fails with `decode_error` unless the parser consumed everything.
pub fn ensure_consumed(rest: &[u8], what: &str) -> Result<(), ProtocolFault> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ProtocolFault::decode_error(format!(
            "{} trailing bytes after {}",
            rest.len(),
            what
        )))
    }
}

pub fn put_u8(out: &mut Buf, v: u8) {
    out.push(v);
}

pub fn put_u16(out: &mut Buf, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u24(out: &mut Buf, v: u32) {
    out.extend_from_slice(&v.to_be_bytes()[1..]);
}

pub fn put_u32(out: &mut Buf, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_vec8(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() <= u8::MAX as usize);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

pub fn put_vec16(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() <= u16::MAX as usize);
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

pub fn put_vec24(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() < 1 << 24);
    put_u24(out, data.len() as u32);
    out.extend_from_slice(data);
}

/// Width of a length prefix written by [`with_length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    U8,
    U16,
    U24,
}

impl Prefix {
    fn width(&self) -> usize {
        match self {
            Prefix::U8 => 1,
            Prefix::U16 => 2,
            Prefix::U24 => 3,
        }
    }
}

/// Write a length-prefixed vector whose content is produced by `f`.
///
/// The prefix is written as a placeholder and patched once `f` returns.
pub fn with_length<F>(out: &mut Buf, prefix: Prefix, f: F)
where
    F: FnOnce(&mut Buf),
{
    let at = out.len();
    let width = prefix.width();
    out.resize(at + width, 0);
    f(out);
    let len = out.len() - at - width;
    let bytes = (len as u32).to_be_bytes();
    out[at..at + width].copy_from_slice(&bytes[4 - width..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec16_exact() {
        let data = [0x00, 0x02, 0xAA, 0xBB, 0xCC];
        let (rest, v) = vec16(&data).unwrap();
        assert_eq!(v, &[0xAA, 0xBB]);
        assert_eq!(rest, &[0xCC]);
    }

    #[test]
    fn vec8_overlong_prefix_fails() {
        let data = [0x05, 0x01, 0x02];
        assert!(vec8(&data).is_err());
    }

    #[test]
    fn odd_length_u16_list_fails() {
        let data = [0x00, 0x17, 0x00];
        assert!(all_of(be_u16)(&data[..]).is_err());
        let (_, v) = all_of(be_u16)(&data[..2]).unwrap();
        assert_eq!(v, vec![0x17]);
    }

    #[test]
    fn non_empty_rejects_empty() {
        assert!(non_empty(be_u8)(&[][..]).is_err());
    }

    #[test]
    fn with_length_patches_prefix() {
        let mut out = Buf::new();
        with_length(&mut out, Prefix::U24, |o| o.extend_from_slice(&[1, 2, 3]));
        assert_eq!(&*out, &[0, 0, 3, 1, 2, 3]);

        let mut out = Buf::new();
        with_length(&mut out, Prefix::U16, |o| {
            with_length(o, Prefix::U8, |o| o.push(9));
        });
        assert_eq!(&*out, &[0, 2, 1, 9]);
    }
}
