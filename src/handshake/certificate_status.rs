// CertificateStatus (RFC 6066 Section 8)
//
// Before 1.3 the stapled OCSP response travels in its own message right
// after the server Certificate, and only if the ServerHello acknowledged
// status_request.

use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::error::{CertificateError, ProtocolFault};
use crate::extension;

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    if ctx.is_tls13() || ctx.resuming.is_some() || !extension::will_staple(ctx) {
        return Ok(None);
    }
    let Some(response) = ctx.config.ocsp_response() else {
        return Ok(None);
    };
    let mut body = Buf::new();
    extension::serialize_status(response, &mut body);
    ctx.handshake_session.ocsp_responses = vec![Buf::from_slice(response)];
    Ok(Some(body))
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    if !ctx.ocsp_requested {
        return Err(ProtocolFault::unexpected_message(
            "CertificateStatus without status_request",
        ));
    }
    let response = extension::parse_status(body)?;
    let Some(end_entity) = ctx.handshake_session.peer_chain.first() else {
        return Err(ProtocolFault::unexpected_message("CertificateStatus without certificate"));
    };

    match ctx.config.trust().check_status_response(end_entity, response) {
        Ok(()) => {}
        Err(e @ CertificateError::BadStatusResponse(_)) => return Err(e.into()),
        Err(e) => {
            warn!("Ignoring OCSP response: {}", e);
            return Ok(());
        }
    }
    ctx.handshake_session.ocsp_responses = vec![Buf::from_slice(response)];
    Ok(())
}
