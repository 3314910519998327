// ServerHelloDone (RFC 5246 Section 7.4.5)
//
// Ends the server's first flight before 1.3. The client answers with its
// whole flight:
//
// Certificate*
// ClientKeyExchange
// CertificateVerify*
// [ChangeCipherSpec]
// Finished

use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

pub(super) fn produce(_: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    Ok(Some(Buf::new()))
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let next = if ctx.cert_requested {
        HandshakeType::Certificate
    } else {
        HandshakeType::ClientKeyExchange
    };
    ctx.consumers.push(next);
    Ok(())
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    if !body.is_empty() {
        return Err(ProtocolFault::decode_error("ServerHelloDone with a body"));
    }
    // Certificate and CertificateVerify skip themselves when not needed.
    ctx.producers.extend(&[
        HandshakeType::Certificate,
        HandshakeType::ClientKeyExchange,
        HandshakeType::CertificateVerify,
        HandshakeType::ChangeCipherSpec,
        HandshakeType::Finished,
    ]);
    Ok(())
}
