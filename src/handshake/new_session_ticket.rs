// NewSessionTicket (RFC 8446 Section 4.6.1)
//
// struct {
//     uint32 ticket_lifetime;
//     uint32 ticket_age_add;
//     opaque ticket_nonce<0..255>;
//     opaque ticket<1..2^16-1>;
//     Extension extensions<0..2^16-2>;
// } NewSessionTicket;
//
// Sent by the server after the handshake. The ticket is an opaque
// identity for a session cache entry holding the PSK derived from the
// resumption master secret and the nonce.

use std::time::Duration;

use nom::combinator::all_consuming;
use nom::number::complete::be_u32;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{put_u32, put_vec16, put_vec8, vec16, vec8};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::session::{HandshakeSession, Session};
use crate::types::HandshakeType;

/// Longest ticket lifetime a server may announce.
const MAX_TICKET_LIFETIME: Duration = Duration::from_secs(7 * 24 * 3600);

const IDENTITY_LEN: usize = 32;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NewSessionTicket<'a> {
    pub lifetime: u32,
    pub age_add: u32,
    pub nonce: &'a [u8],
    pub ticket: &'a [u8],
    pub extensions: &'a [u8],
}

impl<'a> NewSessionTicket<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], NewSessionTicket<'a>> {
        let (input, lifetime) = be_u32(input)?;
        let (input, age_add) = be_u32(input)?;
        let (input, nonce) = vec8(input)?;
        let (input, ticket) = vec16(input)?;
        let (input, extensions) = vec16(input)?;
        Ok((
            input,
            NewSessionTicket {
                lifetime,
                age_add,
                nonce,
                ticket,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_u32(output, self.lifetime);
        put_u32(output, self.age_add);
        put_vec8(output, self.nonce);
        put_vec16(output, self.ticket);
        put_vec16(output, self.extensions);
    }
}

/// PSK of the ticket with `nonce` issued from `session`.
fn ticket_psk(
    ctx: &HandshakeContext,
    session: &Session,
    nonce: &[u8],
) -> Result<Buf, ProtocolFault> {
    let ks = ctx
        .key_schedule
        .as_ref()
        .ok_or_else(|| ProtocolFault::internal_error("No key schedule"))?;
    ks.resumption_psk(session.master_secret(), nonce)
        .map_err(ProtocolFault::internal_error)
}

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    if ctx.tickets_to_send == 0 || !ctx.is_tls13() {
        return Ok(None);
    }
    let Some(session) = ctx.session.clone() else {
        return Ok(None);
    };
    if !session.is_rejoinable() {
        debug!("Session not rejoinable, no tickets");
        ctx.tickets_to_send = 0;
        return Ok(None);
    }

    let cache = ctx.config.session_cache().clone();
    let lifetime = cache.lifetime().min(MAX_TICKET_LIFETIME);

    let mut age_add = [0u8; 4];
    age_add.copy_from_slice(&ctx.random_bytes(4)?);
    let age_add = u32::from_be_bytes(age_add);
    let nonce = session.next_ticket_nonce().to_be_bytes();
    let identity = ctx.random_bytes(IDENTITY_LEN)?;

    let psk = ticket_psk(ctx, &session, &nonce)?;
    let child = HandshakeSession::ticket_of(&session, psk, identity.clone(), age_add, lifetime)
        .finish()
        .ok_or_else(|| ProtocolFault::internal_error("Ticket without cipher suite"))?;
    session.add_child(&child);
    cache.put_by_ticket(&identity, child);
    ctx.tickets_to_send -= 1;

    let mut body = Buf::new();
    NewSessionTicket {
        lifetime: lifetime.as_secs() as u32,
        age_add,
        nonce: &nonce,
        ticket: &identity,
        extensions: &[],
    }
    .serialize(&mut body);
    Ok(Some(body))
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if ctx.tickets_to_send > 0 {
        ctx.producers.push(HandshakeType::NewSessionTicket);
    }
    Ok(())
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    if !ctx.is_tls13() {
        return Err(ProtocolFault::unexpected_message(
            "NewSessionTicket before TLS 1.3",
        ));
    }
    let (_, nst) = all_consuming(NewSessionTicket::parse)(body)?;
    if nst.ticket.is_empty() {
        return Err(ProtocolFault::decode_error("Empty ticket"));
    }

    let lifetime = Duration::from_secs(nst.lifetime as u64);
    if lifetime > MAX_TICKET_LIFETIME {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Ticket lifetime {}s",
            nst.lifetime
        )));
    }
    if lifetime.is_zero() {
        debug!("Discarding ticket with zero lifetime");
        return Ok(());
    }

    let Some(session) = ctx.session.clone() else {
        return Err(ProtocolFault::unexpected_message(
            "NewSessionTicket before the handshake completed",
        ));
    };
    let psk = ticket_psk(ctx, &session, nst.nonce)?;
    let child = HandshakeSession::ticket_of(
        &session,
        psk,
        Buf::from_slice(nst.ticket),
        nst.age_add,
        lifetime,
    )
    .finish()
    .ok_or_else(|| ProtocolFault::internal_error("Ticket without cipher suite"))?;
    session.add_child(&child);

    debug!("Received ticket, lifetime {}s", nst.lifetime);
    ctx.config
        .session_cache()
        .put_by_peer(&ctx.peer_name(), child);
    Ok(())
}

pub(super) fn consumed(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    // Any number of tickets may follow.
    ctx.consumers.push(HandshakeType::NewSessionTicket);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x00, 0x1C, 0x20, // lifetime 7200
        0x01, 0x02, 0x03, 0x04, // age_add
        0x01, 0x00, // nonce
        0x00, 0x02, 0xAA, 0xBB, // ticket
        0x00, 0x00, // extensions
    ];

    #[test]
    fn parse() {
        let (rest, nst) = NewSessionTicket::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(nst.lifetime, 7200);
        assert_eq!(nst.age_add, 0x01020304);
        assert_eq!(nst.nonce, &[0x00]);
        assert_eq!(nst.ticket, &[0xAA, 0xBB]);

        let mut out = Buf::new();
        nst.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn truncated() {
        assert!(NewSessionTicket::parse(&MESSAGE[..12]).is_err());
    }
}
