// ServerKeyExchange and ClientKeyExchange for ECDHE (RFC 8422 Section 5.4
// and 5.7)
//
// ServerKeyExchange = ServerECDHParams signature
// ServerECDHParams  = curve_type(3) namedcurve(u16) point<1..2^8-1>
//
// The server signs ClientHello.random + ServerHello.random + params. The
// ClientKeyExchange carries the client point, after which both sides hold
// the pre-master secret and derive the master secret.

use nom::combinator::all_consuming;
use nom::number::complete::be_u8;
use nom::IResult;

use super::certificate_verify::{local_scheme, parse_signature, peer_scheme, serialize_signature};
use crate::buffer::Buf;
use crate::codec::{put_u16, put_u8, put_vec8, vec8};
use crate::context::HandshakeContext;
use crate::crypto::prf;
use crate::error::ProtocolFault;
use crate::types::{HandshakeType, NamedGroup};

const NAMED_CURVE: u8 = 3;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct EcdhParams<'a> {
    pub group: NamedGroup,
    pub point: &'a [u8],
}

impl<'a> EcdhParams<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], EcdhParams<'a>> {
        let (input, curve_type) = be_u8(input)?;
        if curve_type != NAMED_CURVE {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        let (input, group) = NamedGroup::parse(input)?;
        let (input, point) = vec8(input)?;
        Ok((input, EcdhParams { group, point }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_u8(output, NAMED_CURVE);
        put_u16(output, self.group.as_u16());
        put_vec8(output, self.point);
    }
}

/// cr + sr + params
fn signed_params(ctx: &HandshakeContext, params: &[u8]) -> Buf {
    let mut out = Buf::with_capacity(64 + params.len());
    ctx.client_random.serialize(&mut out);
    ctx.server_random.serialize(&mut out);
    out.extend_from_slice(params);
    out
}

fn start_exchange(ctx: &mut HandshakeContext, group: NamedGroup) -> Result<(), ProtocolFault> {
    let kx = ctx
        .provider
        .kx_group(group)
        .ok_or_else(|| ProtocolFault::internal_error(format!("No key exchange for {:?}", group)))?
        .start_exchange(Buf::new())
        .map_err(ProtocolFault::internal_error)?;
    ctx.key_shares = vec![kx];
    Ok(())
}

/// Complete our key exchange with the peer point into the pre-master secret.
fn complete_exchange(ctx: &mut HandshakeContext, point: &[u8]) -> Result<(), ProtocolFault> {
    let kx = ctx
        .key_shares
        .pop()
        .ok_or_else(|| ProtocolFault::internal_error("No key exchange in progress"))?;
    let mut secret = Buf::new();
    kx.complete(point, &mut secret)
        .map_err(|e| ProtocolFault::illegal_parameter(format!("Bad ECDH point: {}", e)))?;
    ctx.shared_secret = Some(secret);
    Ok(())
}

/// Master secret from the pre-master secret. With extended_master_secret
/// the transcript must end with the ClientKeyExchange.
fn derive_master_secret(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let hash = ctx.hash()?;
    let pms = ctx
        .shared_secret
        .take()
        .ok_or_else(|| ProtocolFault::internal_error("No pre-master secret"))?;

    let master = if ctx.ems {
        let session_hash = prf::session_hash(&ctx.provider, &ctx.transcript, ctx.version, hash)
            .map_err(ProtocolFault::internal_error)?;
        prf::extended_master_secret(&ctx.provider, ctx.version, hash, &pms, &session_hash)
    } else {
        prf::master_secret(
            &ctx.provider,
            ctx.version,
            hash,
            &pms,
            &ctx.client_random.0,
            &ctx.server_random.0,
        )
    }
    .map_err(ProtocolFault::internal_error)?;

    trace!("Master secret derived (extended: {})", ctx.ems);
    ctx.handshake_session.master_secret = master.clone();
    ctx.master_secret = master;
    Ok(())
}

// ============================================================================
// ServerKeyExchange
// ============================================================================

pub(super) fn produce_server(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let group = ctx
        .selected_group
        .ok_or_else(|| ProtocolFault::internal_error("No ECDHE group"))?;
    let key = ctx
        .config
        .credentials()
        .map(|c| c.key.clone())
        .ok_or_else(|| ProtocolFault::internal_error("Server without credentials"))?;

    // Produced again after a delegated signature, keep the first key.
    if ctx.key_shares.is_empty() {
        start_exchange(ctx, group)?;
    }
    let Some(kx) = ctx.key_shares.first() else {
        return Err(ProtocolFault::internal_error("No key exchange in progress"));
    };

    let mut params = Buf::new();
    EcdhParams {
        group,
        point: kx.pub_key(),
    }
    .serialize(&mut params);

    let scheme = local_scheme(ctx, &*key)?;
    let content = signed_params(ctx, &params);
    let Some(signature) = ctx.sign(&key, scheme, &content)? else {
        return Ok(None);
    };

    let mut body = params;
    serialize_signature(&mut body, ctx.version, scheme, &signature);
    Ok(Some(body))
}

pub(super) fn consume_server(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let version = ctx.version;
    let (rest, params) = EcdhParams::parse(body)?;
    let params_len = body.len() - rest.len();
    let (_, (scheme, signature)) = all_consuming(|i| parse_signature(i, version))(rest)?;

    let offered = ctx.config.named_groups().contains(&params.group)
        && params.group.is_ecdhe()
        && ctx.provider.kx_group(params.group).is_some();
    if !offered {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Server selects {:?}",
            params.group
        )));
    }
    if params.point.is_empty() {
        return Err(ProtocolFault::decode_error("Empty ECDH point"));
    }

    let scheme = peer_scheme(ctx, scheme)?;
    let content = signed_params(ctx, &body[..params_len]);
    if !ctx.verify(scheme, &content, signature)? {
        return Ok(());
    }

    debug!("Server key exchange on {:?}", params.group);
    ctx.selected_group = Some(params.group);
    ctx.peer_shares = vec![(params.group, Buf::from_slice(params.point))];
    ctx.consumers.extend(&[
        HandshakeType::CertificateRequest,
        HandshakeType::ServerHelloDone,
    ]);
    Ok(())
}

// ============================================================================
// ClientKeyExchange
// ============================================================================

pub(super) fn produce_client(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let (group, point) = ctx
        .peer_shares
        .first()
        .cloned()
        .ok_or_else(|| ProtocolFault::internal_error("No server key exchange"))?;

    start_exchange(ctx, group)?;
    let mut body = Buf::new();
    if let Some(kx) = ctx.key_shares.first() {
        put_vec8(&mut body, kx.pub_key());
    }
    complete_exchange(ctx, &point)?;
    Ok(Some(body))
}

pub(super) fn produced_client(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    derive_master_secret(ctx)
}

pub(super) fn consume_client(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let (_, point) = all_consuming(vec8)(body)?;
    if point.is_empty() {
        return Err(ProtocolFault::decode_error("Empty ECDH point"));
    }
    complete_exchange(ctx, point)
}

pub(super) fn consumed_client(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    derive_master_secret(ctx)?;

    // A client that sent a certificate proves it next.
    let next = if ctx.peer_public_key.is_some() {
        HandshakeType::CertificateVerify
    } else {
        HandshakeType::ChangeCipherSpec
    };
    ctx.consumers.push(next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &[u8] = &[
        0x03, // named_curve
        0x00, 0x17, // secp256r1
        0x03, 0x04, 0xAA, 0xBB, // point
    ];

    #[test]
    fn parse_params() {
        let (rest, p) = EcdhParams::parse(PARAMS).unwrap();
        assert!(rest.is_empty());
        assert_eq!(p.group, NamedGroup::Secp256r1);
        assert_eq!(p.point, &[0x04, 0xAA, 0xBB]);

        let mut out = Buf::new();
        p.serialize(&mut out);
        assert_eq!(&*out, PARAMS);
    }

    #[test]
    fn explicit_curves_are_rejected() {
        let mut m = PARAMS.to_vec();
        m[0] = 0x01;
        assert!(EcdhParams::parse(&m).is_err());
    }
}
