use nom::combinator::all_consuming;
use nom::IResult;

use super::ExtensionType;
use crate::buffer::Buf;
use crate::codec::{put_vec8, vec8};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

const UNCOMPRESSED: u8 = 0;

/// EC Point Formats extension (RFC 8422 Section 5.1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPointFormats {
    pub formats: Vec<u8>,
}

impl EcPointFormats {
    pub fn parse(input: &[u8]) -> IResult<&[u8], EcPointFormats> {
        let (input, formats) = vec8(input)?;
        Ok((
            input,
            EcPointFormats {
                formats: formats.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_vec8(output, &self.formats);
    }
}

fn uncompressed() -> Buf {
    let mut out = Buf::new();
    EcPointFormats {
        formats: vec![UNCOMPRESSED],
    }
    .serialize(&mut out);
    out
}

pub(super) fn produce_request(
    _: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    Ok(Some(uncompressed()))
}

pub(super) fn produce_ack(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let asked = ctx
        .extensions
        .contains(HandshakeType::ClientHello, ExtensionType::EcPointFormats);
    let ecdhe = ctx
        .suite
        .and_then(|s| s.key_exchange)
        .is_some_and(|k| k.is_ecdhe());
    Ok((asked && ecdhe).then(uncompressed))
}

pub(super) fn load(
    _: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, pf) = all_consuming(EcPointFormats::parse)(data)?;
    if !pf.formats.contains(&UNCOMPRESSED) {
        return Err(ProtocolFault::illegal_parameter(
            "ec_point_formats without uncompressed",
        ));
    }
    Ok(())
}
