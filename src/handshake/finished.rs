// Finished (RFC 5246 Section 7.4.9, RFC 8446 Section 4.4.4)
//
// Each side proves it saw the same transcript. In TLS 1.3 the server
// Finished moves both sides to the application secrets and the client
// Finished closes the handshake. Before 1.3 the second Finished closes
// it, which is the server's in a full handshake and the client's in an
// abbreviated one.

use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::crypto::{KeyScheduleScheme, VerifyDataInput};
use crate::error::ProtocolFault;
use crate::extension;
use crate::handshake::{Direction, DriverState, Epoch};
use crate::types::HandshakeType;

fn scheme(ctx: &HandshakeContext) -> Result<KeyScheduleScheme, ProtocolFault> {
    KeyScheduleScheme::for_version(ctx.version).ok_or_else(|| {
        ProtocolFault::internal_error(format!("No Finished for {}", ctx.version))
    })
}

fn input(ctx: &HandshakeContext) -> Result<VerifyDataInput<'_>, ProtocolFault> {
    Ok(VerifyDataInput {
        provider: &ctx.provider,
        version: ctx.version,
        hash: ctx.hash()?,
        role: ctx.role,
        transcript: &ctx.transcript,
        master_secret: &ctx.master_secret,
        client_base_key: &ctx.client_hs_secret,
        server_base_key: &ctx.server_hs_secret,
    })
}

/// Whether our Finished is the first of the two, before 1.3.
fn we_are_first(ctx: &HandshakeContext) -> bool {
    ctx.is_client() != ctx.resuming.is_some()
}

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let verify_data = scheme(ctx)?.create_verify_data(&input(ctx)?, false)?;
    Ok(Some(verify_data))
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if !ctx.is_tls13() {
        if we_are_first(ctx) {
            ctx.consumers.push(HandshakeType::ChangeCipherSpec);
            return Ok(());
        }
        return complete_legacy(ctx);
    }

    if ctx.is_client() {
        let secret = ctx.client_ap_secret.clone();
        ctx.push_tls13_keys(Direction::Write, Epoch::Application, &secret)?;
        complete_tls13(ctx)?;
        // Tickets may arrive any time after.
        ctx.consumers.push(HandshakeType::NewSessionTicket);
        return Ok(());
    }

    // Server Finished: application secrets over ClientHello..server Finished.
    derive_application(ctx)?;
    let secret = ctx.server_ap_secret.clone();
    ctx.push_tls13_keys(Direction::Write, Epoch::Application, &secret)?;

    let next = if ctx.cert_requested {
        HandshakeType::Certificate
    } else {
        HandshakeType::Finished
    };
    ctx.consumers.push(next);
    ctx.state = DriverState::KeyScheduleTransition;
    Ok(())
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    scheme(ctx)?.validate(&input(ctx)?, body)?;
    trace!("Peer Finished verified");
    Ok(())
}

pub(super) fn consumed(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if !ctx.is_tls13() {
        if we_are_first(ctx) {
            return complete_legacy(ctx);
        }
        ctx.producers.extend(&[
            HandshakeType::ChangeCipherSpec,
            HandshakeType::Finished,
        ]);
        return Ok(());
    }

    if ctx.is_client() {
        derive_application(ctx)?;
        let secret = ctx.server_ap_secret.clone();
        ctx.push_tls13_keys(Direction::Read, Epoch::Application, &secret)?;
        // Certificate and CertificateVerify skip themselves unless asked.
        ctx.producers.extend(&[
            HandshakeType::Certificate,
            HandshakeType::CertificateVerify,
            HandshakeType::Finished,
        ]);
        ctx.state = DriverState::KeyScheduleTransition;
        return Ok(());
    }

    let secret = ctx.client_ap_secret.clone();
    ctx.push_tls13_keys(Direction::Read, Epoch::Application, &secret)?;
    complete_tls13(ctx)?;

    let tickets = ctx.config.session_tickets();
    if tickets > 0 && extension::allows_resumption(ctx) {
        ctx.tickets_to_send = tickets;
        ctx.producers.push(HandshakeType::NewSessionTicket);
    }
    Ok(())
}

fn derive_application(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let th = ctx.transcript_hash()?;
    let ks = ctx
        .key_schedule
        .as_mut()
        .ok_or_else(|| ProtocolFault::internal_error("No key schedule"))?;
    let (client, server) = ks
        .derive_application(&th)
        .map_err(ProtocolFault::internal_error)?;
    ctx.client_ap_secret = client;
    ctx.server_ap_secret = server;
    Ok(())
}

/// Finish a 1.3 session. Its master secret is the resumption master
/// secret that tickets are derived from.
fn complete_tls13(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let th = ctx.transcript_hash()?;
    let ks = ctx
        .key_schedule
        .as_ref()
        .ok_or_else(|| ProtocolFault::internal_error("No key schedule"))?;
    ctx.handshake_session.master_secret = ks
        .resumption_master(&th)
        .map_err(ProtocolFault::internal_error)?;

    let session = ctx.finish_session()?;
    if let Some(ticket) = &ctx.resuming {
        ticket.add_child(&session);
    }
    ctx.complete(session);
    Ok(())
}

/// Finish a pre-1.3 session and make a new one resumable.
fn complete_legacy(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if let Some(resumed) = ctx.resuming.clone() {
        ctx.complete(resumed);
        return Ok(());
    }

    ctx.handshake_session.master_secret = ctx.master_secret.clone();
    let session = ctx.finish_session()?;

    let cache = ctx.config.session_cache().clone();
    if ctx.is_client() {
        cache.put_by_peer(&ctx.peer_name(), session.clone());
    } else if !session.id().is_empty() {
        cache.put_by_id(session.clone());
    }
    ctx.complete(session);
    Ok(())
}
