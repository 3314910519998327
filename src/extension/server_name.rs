use nom::combinator::all_consuming;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{non_empty, put_u8, put_vec16, vec16, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

const HOST_NAME: u8 = 0;

/// ServerName extension (RFC 6066 Section 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNameList {
    pub names: Vec<(u8, Vec<u8>)>,
}

impl ServerNameList {
    fn parse_entry(input: &[u8]) -> IResult<&[u8], (u8, Vec<u8>)> {
        let (input, name_type) = be_u8(input)?;
        let (input, name) = vec16(input)?;
        Ok((input, (name_type, name.to_vec())))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerNameList> {
        let (input, list) = vec16(input)?;
        let (_, names) = all_consuming(non_empty(Self::parse_entry))(list)?;
        Ok((input, ServerNameList { names }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U16, |o| {
            for (t, name) in &self.names {
                put_u8(o, *t);
                put_vec16(o, name);
            }
        });
    }

    pub fn host_name(&self) -> Option<&[u8]> {
        self.names
            .iter()
            .find(|(t, _)| *t == HOST_NAME)
            .map(|(_, n)| &n[..])
    }
}

pub(super) fn produce_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let Some(name) = ctx.config.server_name() else {
        return Ok(None);
    };
    ctx.handshake_session.server_name = Some(name.to_string());

    let mut out = Buf::new();
    ServerNameList {
        names: vec![(HOST_NAME, name.as_bytes().to_vec())],
    }
    .serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, list) = all_consuming(ServerNameList::parse)(data)?;

    for (i, (t, _)) in list.names.iter().enumerate() {
        if list.names[..i].iter().any(|(u, _)| u == t) {
            return Err(ProtocolFault::illegal_parameter(format!(
                "Duplicate server name type {}",
                t
            )));
        }
    }

    if let Some(host) = list.host_name() {
        let host = std::str::from_utf8(host)
            .map_err(|_| ProtocolFault::illegal_parameter("Server name is not ASCII"))?;
        if host.is_empty() || !host.is_ascii() {
            return Err(ProtocolFault::illegal_parameter("Bad server name"));
        }
        debug!("Client asks for {}", host);
        ctx.handshake_session.server_name = Some(host.to_string());
    }
    Ok(())
}

pub(super) fn produce_ack(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let asked = ctx
        .extensions
        .contains(HandshakeType::ClientHello, super::ExtensionType::ServerName);
    // A resumed session keeps the name it was established with.
    let resumed = ctx.resuming.is_some() && !ctx.is_tls13();
    Ok((asked && !resumed && ctx.handshake_session.server_name.is_some()).then(Buf::new))
}

pub(super) fn load_ack(
    _: &mut HandshakeContext,
    message: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    if !data.is_empty() {
        return Err(ProtocolFault::decode_error(format!(
            "server_name in {} must be empty",
            message
        )));
    }
    Ok(())
}
