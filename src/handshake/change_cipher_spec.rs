// ChangeCipherSpec (RFC 5246 Section 7.1)
//
// Not a handshake message, but it sits in the flight before Finished and
// switches one direction to the negotiated keys. TLS 1.3 ignores it.

use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::handshake::{Direction, DriverState};
use crate::types::HandshakeType;

pub(super) fn produce(_: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    // The driver writes the single 0x01 byte.
    Ok(Some(Buf::new()))
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    ctx.push_key_block(Direction::Write)?;
    ctx.state = DriverState::KeyScheduleTransition;
    Ok(())
}

pub(super) fn consume(ctx: &mut HandshakeContext, _: &[u8]) -> Result<(), ProtocolFault> {
    if ctx.master_secret.is_empty() {
        return Err(ProtocolFault::unexpected_message(
            "change_cipher_spec before key exchange",
        ));
    }
    ctx.push_key_block(Direction::Read)?;
    ctx.consumers.push(HandshakeType::Finished);
    Ok(())
}
