// EncryptedExtensions (RFC 8446 Section 4.3.1)
//
// The first message under the handshake keys. It carries the extensions
// that do not shape the key exchange. A PSK handshake goes straight to the
// Finished after it.

use nom::combinator::all_consuming;

use crate::buffer::Buf;
use crate::codec::{put_vec16, vec16};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::extension;
use crate::types::HandshakeType;

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let extensions = extension::produce(ctx, HandshakeType::EncryptedExtensions)?;
    let mut body = Buf::new();
    put_vec16(&mut body, &extensions);
    Ok(Some(body))
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let (_, block) = all_consuming(vec16)(body)?;
    let entries = extension::parse_block(block)?;
    extension::consume_on_load(ctx, HandshakeType::EncryptedExtensions, &entries)?;
    extension::consume_on_trade(ctx, HandshakeType::EncryptedExtensions)?;

    if ctx.psk_index.is_some() {
        ctx.consumers.push(HandshakeType::Finished);
    } else {
        ctx.consumers.extend(&[HandshakeType::CertificateRequest, HandshakeType::Certificate]);
    }
    Ok(())
}
