use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{put_vec16, vec16};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

const COOKIE_LEN: usize = 32;

/// Cookie extension (RFC 8446 Section 4.2.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub cookie: Vec<u8>,
}

impl Cookie {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Cookie> {
        let (input, cookie) = vec16(input)?;
        Ok((
            input,
            Cookie {
                cookie: cookie.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_vec16(output, &self.cookie);
    }
}

fn parse_cookie(data: &[u8]) -> Result<Vec<u8>, ProtocolFault> {
    let (_, c) = all_consuming(Cookie::parse)(data)?;
    if c.cookie.is_empty() {
        return Err(ProtocolFault::decode_error("Empty cookie"));
    }
    Ok(c.cookie)
}

/// Server: a fresh cookie in the HelloRetryRequest.
pub(super) fn produce_issue(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    if !ctx.version.is_dtls() {
        return Ok(None);
    }
    let cookie = ctx.random_bytes(COOKIE_LEN)?;
    let mut out = Buf::new();
    put_vec16(&mut out, &cookie);
    ctx.cookie = Some(cookie);
    Ok(Some(out))
}

/// Client: remember the cookie to echo.
pub(super) fn load_issue(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    ctx.cookie = Some(Buf::from_slice(&parse_cookie(data)?));
    Ok(())
}

/// Client: echo the cookie in the second ClientHello.
pub(super) fn produce_echo(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let Some(cookie) = &ctx.cookie else {
        return Ok(None);
    };
    let mut out = Buf::new();
    put_vec16(&mut out, cookie);
    Ok(Some(out))
}

/// Server: the echoed cookie must be the one we issued.
pub(super) fn load_echo(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let echoed = parse_cookie(data)?;
    match &ctx.cookie {
        Some(issued) if ctx.retried && **issued == echoed[..] => Ok(()),
        Some(_) if ctx.retried => Err(ProtocolFault::illegal_parameter("Cookie mismatch")),
        _ => Err(ProtocolFault::illegal_parameter("Cookie that was never issued")),
    }
}

pub(super) fn absent_echo(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    if ctx.retried && ctx.cookie.is_some() {
        return Err(ProtocolFault::missing_extension(
            "Second ClientHello without the cookie",
        ));
    }
    Ok(())
}
