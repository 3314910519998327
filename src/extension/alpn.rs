use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{non_empty, put_vec8, vec16, vec8, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

/// ProtocolNameList (RFC 7301 Section 3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolNameList {
    pub names: Vec<Vec<u8>>,
}

impl ProtocolNameList {
    fn parse_name(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
        let (input, name) = vec8(input)?;
        if name.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            )));
        }
        Ok((input, name.to_vec()))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolNameList> {
        let (input, list) = vec16(input)?;
        let (_, names) = all_consuming(non_empty(Self::parse_name))(list)?;
        Ok((input, ProtocolNameList { names }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U16, |o| {
            for n in &self.names {
                put_vec8(o, n);
            }
        });
    }
}

pub(super) fn produce_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let protocols = ctx.config.alpn_protocols();
    if protocols.is_empty() {
        return Ok(None);
    }
    let mut out = Buf::new();
    ProtocolNameList {
        names: protocols.to_vec(),
    }
    .serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, list) = all_consuming(ProtocolNameList::parse)(data)?;
    ctx.peer_alpn = list.names;
    Ok(())
}

/// Pick the protocol by server preference.
pub(super) fn select(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    let ours = ctx.config.alpn_protocols();
    if ours.is_empty() {
        return Ok(());
    }
    let Some(chosen) = ours.iter().find(|p| ctx.peer_alpn.contains(p)) else {
        return Err(ProtocolFault::no_application_protocol(
            "No common application protocol",
        ));
    };
    debug!("Selected ALPN {}", String::from_utf8_lossy(chosen));
    ctx.handshake_session.alpn = Some(chosen.clone());
    Ok(())
}

pub(super) fn produce_selected(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let Some(chosen) = &ctx.handshake_session.alpn else {
        return Ok(None);
    };
    let mut out = Buf::new();
    ProtocolNameList {
        names: vec![chosen.clone()],
    }
    .serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_selected(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, list) = all_consuming(ProtocolNameList::parse)(data)?;
    let [chosen] = &list.names[..] else {
        return Err(ProtocolFault::illegal_parameter(
            "Server must select exactly one protocol",
        ));
    };
    if !ctx.config.alpn_protocols().contains(chosen) {
        return Err(ProtocolFault::illegal_parameter(
            "Server selected a protocol we did not offer",
        ));
    }
    ctx.handshake_session.alpn = Some(chosen.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x0C, // list length
        0x02, b'h', b'2', // h2
        0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1', // http/1.1
    ];

    #[test]
    fn parse_names() {
        let (rest, list) = ProtocolNameList::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(list.names, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);

        let mut out = Buf::new();
        list.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(ProtocolNameList::parse(&[0x00, 0x01, 0x00]).is_err());
    }
}
