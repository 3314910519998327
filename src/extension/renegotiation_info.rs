use crate::buffer::Buf;
use crate::codec::put_vec8;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

/// TLS_EMPTY_RENEGOTIATION_INFO_SCSV (RFC 5746 Section 3.3).
pub(crate) const EMPTY_RENEGOTIATION_INFO_SCSV: u16 = 0x00FF;

// Renegotiation is never done, so renegotiated_connection is always empty.
const EMPTY: &[u8] = &[0x00];

pub(super) fn produce(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    if message == HandshakeType::ServerHello && !ctx.secure_renegotiation {
        return Ok(None);
    }
    let mut out = Buf::new();
    put_vec8(&mut out, &[]);
    Ok(Some(out))
}

pub(super) fn load(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    if data != EMPTY {
        return Err(ProtocolFault::handshake_failure(
            "Non-empty renegotiation_info on an initial handshake",
        ));
    }
    ctx.secure_renegotiation = true;
    Ok(())
}

/// The client signalled secure renegotiation through the SCSV.
pub(crate) fn accept_scsv(ctx: &mut HandshakeContext) {
    if ctx.peer_suites.contains(&EMPTY_RENEGOTIATION_INFO_SCSV) {
        trace!("Client sent renegotiation SCSV");
        ctx.secure_renegotiation = true;
    }
}
