// CertificateVerify (RFC 5246 Section 7.4.8, RFC 8446 Section 4.4.3)
//
// Proves possession of the key of the Certificate just sent. TLS 1.3
// signs a padded context string and the transcript hash. Earlier versions
// sign the handshake messages themselves.

use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{put_u16, put_vec16, vec16};
use crate::context::HandshakeContext;
use crate::crypto::SigningKey;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, ProtocolVersion, Role, SignatureScheme};

const SERVER_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
const CLIENT_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

/// Versions that carry the signature scheme on the wire.
pub(super) fn has_scheme(version: ProtocolVersion) -> bool {
    version.rank() >= ProtocolVersion::TLS1_2.rank()
}

/// A scheme and signature, the scheme missing before 1.2.
pub(super) fn parse_signature(
    input: &[u8],
    version: ProtocolVersion,
) -> IResult<&[u8], (Option<SignatureScheme>, &[u8])> {
    let (input, scheme) = if has_scheme(version) {
        let (input, s) = SignatureScheme::parse(input)?;
        (input, Some(s))
    } else {
        (input, None)
    };
    let (input, signature) = vec16(input)?;
    Ok((input, (scheme, signature)))
}

pub(super) fn serialize_signature(
    output: &mut Buf,
    version: ProtocolVersion,
    scheme: SignatureScheme,
    signature: &[u8],
) {
    if has_scheme(version) {
        put_u16(output, scheme.as_u16());
    }
    put_vec16(output, signature);
}

/// The scheme we sign with. Before 1.2 an ECDSA key signs SHA-1 digests.
pub(super) fn local_scheme(
    ctx: &HandshakeContext,
    key: &dyn SigningKey,
) -> Result<SignatureScheme, ProtocolFault> {
    if !has_scheme(ctx.version) {
        return Ok(SignatureScheme::ECDSA_SHA1);
    }
    ctx.choose_scheme(key)
        .ok_or_else(|| ProtocolFault::handshake_failure("No common signature scheme"))
}

/// The scheme the peer signed with, which must be one we offered.
pub(super) fn peer_scheme(
    ctx: &HandshakeContext,
    scheme: Option<SignatureScheme>,
) -> Result<SignatureScheme, ProtocolFault> {
    let Some(scheme) = scheme else {
        return Ok(SignatureScheme::ECDSA_SHA1);
    };
    if !scheme.is_usable_for(ctx.version) || !ctx.config.signature_schemes().contains(&scheme) {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Peer signs with {:?}",
            scheme
        )));
    }
    Ok(scheme)
}

/// What the certificate owner `signer` signs.
fn signed_content(ctx: &HandshakeContext, signer: Role) -> Result<Buf, ProtocolFault> {
    let mut out = Buf::new();
    if ctx.is_tls13() {
        out.resize(64, 0x20);
        out.extend_from_slice(match signer {
            Role::Server => SERVER_CONTEXT,
            Role::Client => CLIENT_CONTEXT,
        });
        out.push(0);
        out.extend_from_slice(&ctx.transcript_hash()?);
    } else {
        ctx.transcript.render(ctx.version, &mut out);
    }
    Ok(out)
}

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let Some(key) = ctx.handshake_session.local_key.clone() else {
        trace!("No certificate sent, no CertificateVerify");
        return Ok(None);
    };
    let scheme = local_scheme(ctx, &*key)?;
    let content = signed_content(ctx, ctx.role)?;

    let Some(signature) = ctx.sign(&key, scheme, &content)? else {
        return Ok(None);
    };

    let mut body = Buf::new();
    serialize_signature(&mut body, ctx.version, scheme, &signature);
    Ok(Some(body))
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let version = ctx.version;
    let (_, (scheme, signature)) = all_consuming(|i| parse_signature(i, version))(body)?;
    let scheme = peer_scheme(ctx, scheme)?;
    let content = signed_content(ctx, ctx.role.peer())?;

    if !ctx.verify(scheme, &content, signature)? {
        return Ok(());
    }
    debug!("Peer CertificateVerify with {:?}", scheme);

    let next = if ctx.is_tls13() {
        HandshakeType::Finished
    } else {
        HandshakeType::ChangeCipherSpec
    };
    ctx.consumers.push(next);
    Ok(())
}
