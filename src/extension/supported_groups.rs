use nom::combinator::all_consuming;
use nom::IResult;

use super::ExtensionType;
use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, vec16, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, NamedGroup};

/// Supported Groups (previously known as EllipticCurves) extension
/// RFC 8422 Section 5.1.1, RFC 8446 Section 4.2.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedGroups {
    pub groups: Vec<NamedGroup>,
}

impl SupportedGroups {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedGroups> {
        let (input, list) = vec16(input)?;
        let (_, groups) = all_consuming(non_empty(NamedGroup::parse))(list)?;
        Ok((input, SupportedGroups { groups }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U16, |o| {
            for g in &self.groups {
                put_u16(o, g.as_u16());
            }
        });
    }
}

pub(super) fn produce(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let mut out = Buf::new();
    SupportedGroups {
        groups: ctx.config.named_groups().to_vec(),
    }
    .serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, sg) = all_consuming(SupportedGroups::parse)(data)?;
    // Unknown groups are kept. They never match a configured group.
    ctx.peer_groups = sg.groups;
    Ok(())
}

pub(super) fn absent(ctx: &mut HandshakeContext, message: HandshakeType) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() && ctx.extensions.contains(message, ExtensionType::KeyShare) {
        return Err(ProtocolFault::missing_extension(
            "key_share without supported_groups",
        ));
    }
    ctx.peer_groups.clear();
    Ok(())
}

/// The curve for a pre-1.3 ECDHE key exchange.
///
/// Our most preferred elliptic curve group the client listed. A client
/// that sent no list is assumed to support secp256r1 (RFC 4492 Section 4).
pub(crate) fn choose_ecdhe_group(ctx: &HandshakeContext) -> Option<NamedGroup> {
    let configured = ctx.config.named_groups();
    if ctx.peer_groups.is_empty() {
        return configured
            .iter()
            .copied()
            .find(|g| *g == NamedGroup::Secp256r1);
    }
    configured
        .iter()
        .copied()
        .find(|g| g.is_ecdhe() && ctx.peer_groups.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x06, // Groups length
        0x00, 0x1D, // X25519
        0x00, 0x17, // secp256r1
        0x01, 0x00, // ffdhe2048
    ];

    #[test]
    fn parse_groups() {
        let (rest, sg) = SupportedGroups::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            sg.groups,
            vec![NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Ffdhe2048]
        );

        let mut out = Buf::new();
        sg.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn odd_length_is_rejected() {
        assert!(SupportedGroups::parse(&[0x00, 0x03, 0x00, 0x1D, 0x00]).is_err());
    }
}
