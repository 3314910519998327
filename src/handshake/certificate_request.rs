// CertificateRequest (RFC 5246 Section 7.4.4, RFC 8446 Section 4.3.2)
//
// TLS 1.3 moves the signature schemes into extensions. Before 1.2 there
// is no scheme list at all.

use nom::combinator::all_consuming;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, put_vec16, put_vec8, vec16, vec8, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::extension;
use crate::types::{HandshakeType, ProtocolVersion, SignatureScheme};

/// ClientCertificateType ecdsa_sign (RFC 8422 Section 5.5).
const ECDSA_SIGN: u8 = 64;

/// The pre-1.3 form.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct LegacyCertificateRequest<'a> {
    pub certificate_types: Vec<u8>,
    /// Empty before 1.2.
    pub schemes: Vec<SignatureScheme>,
    pub authorities: &'a [u8],
}

fn has_scheme_list(version: ProtocolVersion) -> bool {
    version.rank() >= ProtocolVersion::TLS1_2.rank()
}

impl<'a> LegacyCertificateRequest<'a> {
    pub fn parse(
        input: &'a [u8],
        version: ProtocolVersion,
    ) -> IResult<&'a [u8], LegacyCertificateRequest<'a>> {
        let (input, types) = vec8(input)?;
        let (_, certificate_types) = all_consuming(non_empty(be_u8))(types)?;
        let (input, schemes) = if has_scheme_list(version) {
            let (input, list) = vec16(input)?;
            let (_, schemes) = all_consuming(non_empty(SignatureScheme::parse))(list)?;
            (input, schemes)
        } else {
            (input, Vec::new())
        };
        let (input, authorities) = vec16(input)?;
        Ok((
            input,
            LegacyCertificateRequest {
                certificate_types,
                schemes,
                authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf, version: ProtocolVersion) {
        put_vec8(output, &self.certificate_types);
        if has_scheme_list(version) {
            with_length(output, Prefix::U16, |o| {
                for s in &self.schemes {
                    put_u16(o, s.as_u16());
                }
            });
        }
        put_vec16(output, self.authorities);
    }
}

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    ctx.cert_requested = true;
    let mut body = Buf::new();

    if ctx.is_tls13() {
        // certificate_request_context is empty during the handshake
        put_vec8(&mut body, &[]);
        let extensions = extension::produce(ctx, HandshakeType::CertificateRequest)?;
        put_vec16(&mut body, &extensions);
        return Ok(Some(body));
    }

    let version = ctx.version;
    let request = LegacyCertificateRequest {
        certificate_types: vec![ECDSA_SIGN],
        schemes: ctx
            .config
            .signature_schemes()
            .iter()
            .copied()
            .filter(|s| s.is_usable_for(version))
            .collect(),
        authorities: &[],
    };
    request.serialize(&mut body, version);
    Ok(Some(body))
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() {
        let (rest, context) = vec8(body)?;
        let (_, block) = all_consuming(vec16)(rest)?;
        if !context.is_empty() {
            return Err(ProtocolFault::illegal_parameter(
                "Non-empty certificate_request_context",
            ));
        }
        let entries = extension::parse_block(block)?;
        extension::consume_on_load(ctx, HandshakeType::CertificateRequest, &entries)?;
        extension::consume_on_trade(ctx, HandshakeType::CertificateRequest)?;
    } else {
        let version = ctx.version;
        let (_, request) = all_consuming(|i| LegacyCertificateRequest::parse(i, version))(body)?;
        if !request.certificate_types.contains(&ECDSA_SIGN) {
            debug!("Server does not take ECDSA client certificates");
        }
        ctx.peer_schemes = request.schemes;
    }

    debug!("Server requests a client certificate");
    ctx.cert_requested = true;
    Ok(())
}
