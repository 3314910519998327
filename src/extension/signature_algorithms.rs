use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, vec16, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, SignatureScheme};

/// SignatureSchemeList, shared by signature_algorithms and
/// signature_algorithms_cert (RFC 8446 Section 4.2.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSchemeList {
    pub schemes: Vec<SignatureScheme>,
}

impl SignatureSchemeList {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureSchemeList> {
        let (input, list) = vec16(input)?;
        let (_, schemes) = all_consuming(non_empty(SignatureScheme::parse))(list)?;
        Ok((input, SignatureSchemeList { schemes }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U16, |o| {
            for s in &self.schemes {
                put_u16(o, s.as_u16());
            }
        });
    }
}

fn serialized(schemes: &[SignatureScheme]) -> Buf {
    let mut out = Buf::new();
    SignatureSchemeList {
        schemes: schemes.to_vec(),
    }
    .serialize(&mut out);
    out
}

pub(super) fn produce(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    Ok(Some(serialized(ctx.config.signature_schemes())))
}

pub(super) fn load(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, list) = all_consuming(SignatureSchemeList::parse)(data)?;
    ctx.peer_schemes = list.schemes;
    Ok(())
}

pub(super) fn absent(ctx: &mut HandshakeContext, message: HandshakeType) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() {
        return Err(ProtocolFault::missing_extension(format!(
            "signature_algorithms in {}",
            message
        )));
    }
    ctx.peer_schemes.clear();
    Ok(())
}

pub(super) fn produce_cert(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    Ok(ctx.config.signature_schemes_cert().map(serialized))
}

pub(super) fn load_cert(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, list) = all_consuming(SignatureSchemeList::parse)(data)?;
    ctx.peer_schemes_cert = list.schemes;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x06, // list length
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x05, 0x03, // ecdsa_secp384r1_sha384
        0x02, 0x03, // ecdsa_sha1
    ];

    #[test]
    fn parse_list() {
        let (rest, list) = SignatureSchemeList::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            list.schemes,
            vec![
                SignatureScheme::ECDSA_SECP256R1_SHA256,
                SignatureScheme::ECDSA_SECP384R1_SHA384,
                SignatureScheme::ECDSA_SHA1,
            ]
        );
        assert_eq!(&*serialized(&list.schemes), MESSAGE);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(SignatureSchemeList::parse(&[0x00, 0x00]).is_err());
    }
}
