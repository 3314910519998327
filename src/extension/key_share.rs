use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{all_of, put_u16, put_vec16, vec16, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::crypto::ActiveKeyExchange;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, NamedGroup};

/// KeyShareEntry (RFC 8446 Section 4.2.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    pub fn parse(input: &[u8]) -> IResult<&[u8], KeyShareEntry> {
        let (input, group) = NamedGroup::parse(input)?;
        let (input, key_exchange) = vec16(input)?;
        if key_exchange.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            )));
        }
        Ok((
            input,
            KeyShareEntry {
                group,
                key_exchange: key_exchange.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_u16(output, self.group.as_u16());
        put_vec16(output, &self.key_exchange);
    }
}

/// KeyShareClientHello. May legitimately be empty.
pub fn parse_client_shares(input: &[u8]) -> IResult<&[u8], Vec<KeyShareEntry>> {
    let (input, list) = vec16(input)?;
    let (_, entries) = all_consuming(all_of(KeyShareEntry::parse))(list)?;
    Ok((input, entries))
}

fn start(
    ctx: &HandshakeContext,
    group: NamedGroup,
) -> Result<Box<dyn ActiveKeyExchange>, ProtocolFault> {
    let kx = ctx.provider.kx_group(group).ok_or_else(|| {
        ProtocolFault::internal_error(format!("No key exchange for {:?}", group))
    })?;
    kx.start_exchange(Buf::new())
        .map_err(ProtocolFault::internal_error)
}

/// Groups we can actually do, in preference order.
fn usable_groups(ctx: &HandshakeContext) -> impl Iterator<Item = NamedGroup> + '_ {
    ctx.config
        .named_groups()
        .iter()
        .copied()
        .filter(|g| ctx.provider.kx_group(*g).is_some())
}

pub(super) fn produce_client(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    if let Some(group) = ctx.retry_group.take() {
        ctx.key_shares = vec![start(ctx, group)?];
    } else if ctx.key_shares.is_empty() {
        let Some(group) = usable_groups(ctx).next() else {
            return Err(ProtocolFault::internal_error("No usable key exchange group"));
        };
        ctx.key_shares = vec![start(ctx, group)?];
    }

    let mut out = Buf::new();
    with_length(&mut out, Prefix::U16, |o| {
        for kx in &ctx.key_shares {
            KeyShareEntry {
                group: kx.group(),
                key_exchange: kx.pub_key().to_vec(),
            }
            .serialize(o);
        }
    });
    Ok(Some(out))
}

pub(super) fn load_client(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, entries) = all_consuming(parse_client_shares)(data)?;

    let mut shares: Vec<(NamedGroup, Buf)> = Vec::with_capacity(entries.len());
    for e in entries {
        if shares.iter().any(|(g, _)| *g == e.group) {
            return Err(ProtocolFault::illegal_parameter(format!(
                "Duplicate key share for {:?}",
                e.group
            )));
        }
        if !ctx.peer_groups.contains(&e.group) {
            return Err(ProtocolFault::illegal_parameter(format!(
                "Key share for {:?} not in supported_groups",
                e.group
            )));
        }
        shares.push((e.group, Buf::from_slice(&e.key_exchange)));
    }
    ctx.peer_shares = shares;
    Ok(())
}

/// Server: pick the group, or ask for another with a HelloRetryRequest.
pub(super) fn select(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    if !ctx.is_tls13() {
        return Ok(());
    }

    let shared = usable_groups(ctx).find(|g| ctx.peer_shares.iter().any(|(p, _)| p == g));

    if ctx.retried {
        let wanted = ctx.retry_group.take();
        if shared.is_none() || wanted.is_some_and(|w| !ctx.peer_shares.iter().any(|(p, _)| *p == w)) {
            return Err(ProtocolFault::illegal_parameter(
                "Second ClientHello without the requested key share",
            ));
        }
        ctx.selected_group = wanted.or(shared);
        return Ok(());
    }

    if let Some(group) = shared {
        debug!("Selected key share {:?}", group);
        ctx.selected_group = Some(group);
        return Ok(());
    }

    let Some(group) = usable_groups(ctx).find(|g| ctx.peer_groups.contains(g)) else {
        return Err(ProtocolFault::handshake_failure("No common key exchange group"));
    };
    debug!("No usable key share, retry with {:?}", group);
    ctx.retry_group = Some(group);
    Ok(())
}

pub(super) fn absent_client(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() && !ctx.peer_groups.is_empty() {
        return Err(ProtocolFault::missing_extension(
            "supported_groups without key_share",
        ));
    }
    ctx.peer_shares.clear();
    Ok(())
}

pub(super) fn absent_client_trade(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() {
        // psk_ke, the only way to do without, is not offered
        return Err(ProtocolFault::handshake_failure("No key share"));
    }
    Ok(())
}

pub(super) fn produce_server(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let group = ctx
        .selected_group
        .ok_or_else(|| ProtocolFault::internal_error("No key share selected"))?;
    let peer = ctx
        .peer_shares
        .iter()
        .find(|(g, _)| *g == group)
        .map(|(_, k)| k.clone())
        .ok_or_else(|| ProtocolFault::internal_error("Selected group without peer share"))?;

    let kx = start(ctx, group)?;
    let entry = KeyShareEntry {
        group,
        key_exchange: kx.pub_key().to_vec(),
    };

    let mut secret = Buf::new();
    kx.complete(&peer, &mut secret)
        .map_err(|e| ProtocolFault::illegal_parameter(format!("Bad key share: {}", e)))?;
    ctx.shared_secret = Some(secret);

    let mut out = Buf::new();
    entry.serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_server(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, entry) = all_consuming(KeyShareEntry::parse)(data)?;

    let Some(pos) = ctx.key_shares.iter().position(|k| k.group() == entry.group) else {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Server key share for {:?} we did not offer",
            entry.group
        )));
    };
    let kx = ctx.key_shares.remove(pos);
    ctx.key_shares.clear();

    let mut secret = Buf::new();
    kx.complete(&entry.key_exchange, &mut secret)
        .map_err(|e| ProtocolFault::illegal_parameter(format!("Bad key share: {}", e)))?;
    ctx.selected_group = Some(entry.group);
    ctx.shared_secret = Some(secret);
    Ok(())
}

pub(super) fn absent_server(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    ctx.key_shares.clear();
    Err(ProtocolFault::missing_extension("ServerHello without key_share"))
}

pub(super) fn produce_retry(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let group = ctx
        .retry_group
        .ok_or_else(|| ProtocolFault::internal_error("HelloRetryRequest without group"))?;
    let mut out = Buf::new();
    put_u16(&mut out, group.as_u16());
    Ok(Some(out))
}

pub(super) fn load_retry(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, group) = all_consuming(NamedGroup::parse)(data)?;
    if !usable_groups(ctx).any(|g| g == group) {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Retry with {:?} we did not offer",
            group
        )));
    }
    if ctx.key_shares.iter().any(|k| k.group() == group) {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Retry with {:?} we already sent",
            group
        )));
    }
    ctx.retry_group = Some(group);
    Ok(())
}
