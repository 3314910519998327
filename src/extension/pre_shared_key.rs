use std::sync::Arc;
use std::time::Instant;

use nom::combinator::all_consuming;
use nom::number::complete::{be_u16, be_u32};
use nom::IResult;

use super::psk_key_exchange_modes::allows_resumption;
use super::ExtensionType;
use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, put_u32, put_vec16, put_vec8, vec16, vec8, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::resumption;
use crate::types::HandshakeType;

/// OfferedPsks (RFC 8446 Section 4.2.11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OfferedPsks {
    /// Identity and obfuscated ticket age.
    pub identities: Vec<(Buf, u32)>,
    pub binders: Vec<Buf>,
}

impl OfferedPsks {
    fn parse_identity(input: &[u8]) -> IResult<&[u8], (Buf, u32)> {
        let (input, identity) = vec16(input)?;
        let (input, age) = be_u32(input)?;
        Ok((input, (Buf::from_slice(identity), age)))
    }

    fn parse_binder(input: &[u8]) -> IResult<&[u8], Buf> {
        let (input, binder) = vec8(input)?;
        Ok((input, Buf::from_slice(binder)))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], OfferedPsks> {
        let (input, identities) = vec16(input)?;
        let (_, identities) = all_consuming(non_empty(Self::parse_identity))(identities)?;
        let (input, binders) = vec16(input)?;
        let (_, binders) = all_consuming(non_empty(Self::parse_binder))(binders)?;
        Ok((
            input,
            OfferedPsks {
                identities,
                binders,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        with_length(output, Prefix::U16, |o| {
            for (identity, age) in &self.identities {
                put_vec16(o, identity);
                put_u32(o, *age);
            }
        });
        with_length(output, Prefix::U16, |o| {
            for b in &self.binders {
                put_vec8(o, b);
            }
        });
    }

    /// Length of the serialized binders list, its own length included.
    pub fn binders_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }
}

/// Client: offer the ticket picked when the ClientHello was started.
///
/// The binder is zeros here. The ClientHello patches it once the rest of
/// the message is known.
pub(super) fn produce_offer(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let (Some(session), Some(identity)) = (&ctx.resuming, &ctx.psk_identity) else {
        return Ok(None);
    };
    if !session.version().uses_tls13_key_schedule() {
        return Ok(None);
    }

    let offer = OfferedPsks {
        identities: vec![(identity.clone(), session.obfuscated_ticket_age(Instant::now()))],
        binders: vec![Buf::from_slice(&vec![0; session.suite().hash.output_len()])],
    };
    let mut out = Buf::new();
    offer.serialize(&mut out);
    ctx.offered_psks = Some(offer);
    Ok(Some(out))
}

/// Server: parse the offer. Selection happens on trade.
pub(super) fn load_offer(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    if !ctx.extensions.contains(message, ExtensionType::PskKeyExchangeModes) {
        return Err(ProtocolFault::missing_extension(
            "pre_shared_key without psk_key_exchange_modes",
        ));
    }
    if !ctx.extensions.contains(message, ExtensionType::SignatureAlgorithms) {
        return Err(ProtocolFault::missing_extension(
            "pre_shared_key without signature_algorithms",
        ));
    }

    let (_, offer) = all_consuming(OfferedPsks::parse)(data)?;
    if offer.identities.len() != offer.binders.len() {
        return Err(ProtocolFault::illegal_parameter(
            "PSK identity and binder counts differ",
        ));
    }
    ctx.offered_psks = Some(offer);
    Ok(())
}

/// Server: take the first identity that passes the gates and binds.
pub(super) fn select(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    let Some(offer) = ctx.offered_psks.take() else {
        return Ok(());
    };
    if ctx.retry_group.is_some() {
        trace!("PSK selection deferred to the second ClientHello");
        return Ok(());
    }
    if !allows_resumption(ctx) {
        debug!("Client does not do psk_dhe_ke");
        return Ok(());
    }

    let binders_len = offer.binders_len();
    let tail = resumption::truncated_client_hello(&ctx.client_hello, binders_len)
        .ok_or_else(|| ProtocolFault::decode_error("Binders longer than ClientHello"))?;
    let cache = ctx.config.session_cache().clone();

    for (i, ((identity, _age), binder)) in offer.identities.iter().zip(&offer.binders).enumerate() {
        let Some(candidate) = cache.get_by_ticket(identity) else {
            trace!("Unknown PSK identity {}", i);
            continue;
        };
        if let Err(gate) = resumption::check_gates(ctx, &candidate) {
            debug!("PSK identity {} fails the {} gate", i, gate);
            continue;
        }
        if candidate.psk().is_none() {
            continue;
        }
        // Another handshake may have used the ticket since the lookup.
        let Some(session) = cache
            .take_by_ticket(identity)
            .filter(|s| Arc::ptr_eq(s, &candidate))
        else {
            debug!("PSK identity {} already used", i);
            continue;
        };
        let Some(psk) = session.psk() else {
            continue;
        };

        resumption::validate_binder(
            &ctx.provider,
            session.suite().hash,
            ctx.version,
            psk,
            &ctx.transcript,
            &tail,
            binder,
        )?;

        debug!("Accepted PSK identity {}", i);
        ctx.handshake_session.resume_from(&session);
        ctx.psk_index = Some(i as u16);
        ctx.resuming = Some(session);
        return Ok(());
    }
    Ok(())
}

pub(super) fn produce_selected(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let Some(index) = ctx.psk_index else {
        return Ok(None);
    };
    let mut out = Buf::new();
    put_u16(&mut out, index);
    Ok(Some(out))
}

pub(super) fn load_selected(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, index) = all_consuming(be_u16)(data)?;
    if index != 0 {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Selected PSK identity {} out of range",
            index
        )));
    }
    let Some(session) = &ctx.resuming else {
        return Err(ProtocolFault::internal_error("PSK selected without session"));
    };
    if Some(session.suite().hash) != ctx.suite.map(|s| s.hash) {
        return Err(ProtocolFault::illegal_parameter(
            "Cipher suite hash differs from the PSK",
        ));
    }
    ctx.handshake_session.resume_from(session);
    ctx.psk_index = Some(index);
    Ok(())
}

/// Client: the server declined the PSK, this is a full handshake.
pub(super) fn absent_selected(ctx: &mut HandshakeContext, _: HandshakeType) -> Result<(), ProtocolFault> {
    if ctx.resuming.take().is_some() {
        debug!("Server declined the PSK");
    }
    ctx.psk_index = None;
    Ok(())
}
