use nom::combinator::all_consuming;

use crate::buffer::Buf;
use crate::codec::{put_vec8, vec8};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

/// psk_dhe_ke, the only mode we do (RFC 8446 Section 4.2.9).
pub(crate) const PSK_DHE_KE: u8 = 1;

pub(super) fn produce(
    _: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let mut out = Buf::new();
    put_vec8(&mut out, &[PSK_DHE_KE]);
    Ok(Some(out))
}

pub(super) fn load(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, modes) = all_consuming(vec8)(data)?;
    if modes.is_empty() {
        return Err(ProtocolFault::decode_error("Empty psk_key_exchange_modes"));
    }
    ctx.psk_modes = modes.to_vec();
    Ok(())
}

/// Whether the client can use tickets we issue.
pub(crate) fn allows_resumption(ctx: &HandshakeContext) -> bool {
    ctx.psk_modes.contains(&PSK_DHE_KE)
}
