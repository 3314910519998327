use nom::combinator::all_consuming;
use nom::IResult;

use super::ExtensionType;
use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, vec8, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, ProtocolVersion};

/// SupportedVersions in ClientHello (RFC 8446 Section 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedVersions {
    pub versions: Vec<ProtocolVersion>,
}

impl SupportedVersions {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedVersions> {
        let (input, list) = vec8(input)?;
        let (_, versions) = all_consuming(non_empty(ProtocolVersion::parse))(list)?;
        Ok((input, SupportedVersions { versions }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U8, |o| {
            for v in &self.versions {
                v.serialize(o);
            }
        });
    }
}

/// The client's supported_versions, read ahead of the other extensions.
pub(crate) fn peek_client_versions(
    entries: &[(ExtensionType, &[u8])],
) -> Result<Option<Vec<ProtocolVersion>>, ProtocolFault> {
    let Some((_, data)) = entries
        .iter()
        .find(|(id, _)| *id == ExtensionType::SupportedVersions)
    else {
        return Ok(None);
    };
    let (_, sv) = all_consuming(SupportedVersions::parse)(data)?;
    Ok(Some(sv.versions))
}

/// The server's selected version, read ahead of the other extensions.
pub(crate) fn peek_selected_version(
    entries: &[(ExtensionType, &[u8])],
) -> Result<Option<ProtocolVersion>, ProtocolFault> {
    let Some((_, data)) = entries
        .iter()
        .find(|(id, _)| *id == ExtensionType::SupportedVersions)
    else {
        return Ok(None);
    };
    let (_, v) = all_consuming(ProtocolVersion::parse)(data)?;
    Ok(Some(v))
}

pub(super) fn produce_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let mut out = Buf::new();
    SupportedVersions {
        versions: ctx.active_versions.clone(),
    }
    .serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    // The version was picked from this list before loading.
    let (_, sv) = all_consuming(SupportedVersions::parse)(data)?;
    if !sv.versions.contains(&ctx.version) {
        return Err(ProtocolFault::internal_error(
            "Negotiated version not in supported_versions",
        ));
    }
    Ok(())
}

pub(super) fn produce_selected(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let mut out = Buf::new();
    put_u16(&mut out, ctx.version.as_u16());
    Ok(Some(out))
}

pub(super) fn load_selected(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, v) = all_consuming(ProtocolVersion::parse)(data)?;
    if v != ctx.version {
        return Err(ProtocolFault::illegal_parameter(format!(
            "{} selects {} after {}",
            message, v, ctx.version
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x04, // list length
        0x03, 0x04, // TLS 1.3
        0x03, 0x03, // TLS 1.2
    ];

    #[test]
    fn parse_list() {
        let (rest, sv) = SupportedVersions::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            sv.versions,
            vec![ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2]
        );

        let mut out = Buf::new();
        sv.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn odd_list_is_rejected() {
        assert!(SupportedVersions::parse(&[0x03, 0x03, 0x04, 0x03]).is_err());
        assert!(SupportedVersions::parse(&[0x00]).is_err());
    }

    #[test]
    fn peek() {
        let entries = [
            (ExtensionType::ServerName, &[][..]),
            (ExtensionType::SupportedVersions, MESSAGE),
        ];
        let v = peek_client_versions(&entries).unwrap().unwrap();
        assert_eq!(v[0], ProtocolVersion::TLS1_3);
        assert!(peek_selected_version(&entries[..1]).unwrap().is_none());

        let selected = [(ExtensionType::SupportedVersions, &[0xFE, 0xFC][..])];
        assert_eq!(
            peek_selected_version(&selected).unwrap(),
            Some(ProtocolVersion::DTLS1_3)
        );
    }
}
