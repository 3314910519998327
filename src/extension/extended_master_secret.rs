use super::ExtensionType;
use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

// RFC 7627. The extension carries no data in either direction.

pub(super) fn produce_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    Ok(ctx.config.with_extended_master_secret().then(Buf::new))
}

pub(super) fn produce_ack(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    Ok(ctx.ems.then(Buf::new))
}

pub(super) fn load(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    if !data.is_empty() {
        return Err(ProtocolFault::decode_error(format!(
            "extended_master_secret in {} must be empty",
            message
        )));
    }
    if message == HandshakeType::ClientHello {
        ctx.peer_ems = true;
    }
    Ok(())
}

/// Server side, extension present or not.
pub(super) fn trade_request(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
) -> Result<(), ProtocolFault> {
    ctx.peer_ems = ctx.extensions.contains(message, ExtensionType::ExtendedMasterSecret);

    if let Some(session) = &ctx.resuming {
        if session.extended_master_secret() && !ctx.peer_ems {
            // RFC 7627 Section 5.3
            return Err(ProtocolFault::handshake_failure(
                "Resuming an extended master secret session without the extension",
            ));
        }
        if !session.extended_master_secret() && ctx.peer_ems {
            debug!("Not resuming a session without extended master secret");
            ctx.resuming = None;
        }
    }

    ctx.ems = ctx.peer_ems && ctx.config.with_extended_master_secret();
    Ok(())
}

/// Client side, extension present or not.
pub(super) fn trade_ack(ctx: &mut HandshakeContext, message: HandshakeType) -> Result<(), ProtocolFault> {
    ctx.ems = ctx.extensions.contains(message, ExtensionType::ExtendedMasterSecret);

    if let Some(session) = &ctx.resuming {
        if session.extended_master_secret() != ctx.ems {
            return Err(ProtocolFault::handshake_failure(
                "Extended master secret changed on resumption",
            ));
        }
    }
    Ok(())
}
