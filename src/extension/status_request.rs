use nom::combinator::all_consuming;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{ensure_consumed, put_u8, put_vec24, vec16, vec24};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

pub(crate) const STATUS_TYPE_OCSP: u8 = 1;

/// CertificateStatusRequest (RFC 6066 Section 8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStatusRequest {
    pub status_type: u8,
    /// For OCSP: responder_id_list and request_extensions, unparsed.
    pub request: Vec<u8>,
}

impl CertificateStatusRequest {
    pub fn ocsp() -> Self {
        CertificateStatusRequest {
            status_type: STATUS_TYPE_OCSP,
            request: vec![0x00, 0x00, 0x00, 0x00],
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateStatusRequest> {
        let (input, status_type) = be_u8(input)?;
        if status_type != STATUS_TYPE_OCSP {
            return Ok((
                &input[input.len()..],
                CertificateStatusRequest {
                    status_type,
                    request: input.to_vec(),
                },
            ));
        }
        let start = input;
        let (input, _responder_ids) = vec16(input)?;
        let (input, _extensions) = vec16(input)?;
        let request = start[..start.len() - input.len()].to_vec();
        Ok((
            input,
            CertificateStatusRequest {
                status_type,
                request,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        put_u8(output, self.status_type);
        output.extend_from_slice(&self.request);
    }
}

pub(super) fn produce_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    if !ctx.config.with_status_request() {
        return Ok(None);
    }
    let mut out = Buf::new();
    CertificateStatusRequest::ocsp().serialize(&mut out);
    Ok(Some(out))
}

pub(super) fn load_request(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    let (_, req) = all_consuming(CertificateStatusRequest::parse)(data)?;
    if req.status_type == STATUS_TYPE_OCSP {
        ctx.ocsp_requested = true;
    } else {
        trace!("Ignoring status_type {}", req.status_type);
    }
    Ok(())
}

/// Whether a server will staple.
pub(crate) fn will_staple(ctx: &HandshakeContext) -> bool {
    ctx.ocsp_requested && ctx.config.ocsp_response().is_some()
}

pub(super) fn produce_ack(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
) -> Result<Option<Buf>, ProtocolFault> {
    let resumed = ctx.resuming.is_some();
    Ok((will_staple(ctx) && !resumed).then(Buf::new))
}

pub(super) fn load_ack(
    ctx: &mut HandshakeContext,
    _: HandshakeType,
    data: &[u8],
) -> Result<(), ProtocolFault> {
    if !data.is_empty() {
        return Err(ProtocolFault::decode_error(
            "status_request in ServerHello must be empty",
        ));
    }
    ctx.ocsp_requested = true;
    Ok(())
}

/// CertificateStatus body: status_type and an OCSP response.
pub(crate) fn serialize_status(response: &[u8], output: &mut Buf) {
    put_u8(output, STATUS_TYPE_OCSP);
    put_vec24(output, response);
}

/// Parse a CertificateStatus body into the OCSP response.
pub(crate) fn parse_status(input: &[u8]) -> Result<&[u8], ProtocolFault> {
    let (rest, status_type) = be_u8(input)?;
    if status_type != STATUS_TYPE_OCSP {
        return Err(ProtocolFault::illegal_parameter(format!(
            "Unsupported status_type {}",
            status_type
        )));
    }
    let (rest, response) = vec24(rest)?;
    ensure_consumed(rest, "CertificateStatus")?;
    if response.is_empty() {
        return Err(ProtocolFault::decode_error("Empty OCSP response"));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x01, // ocsp
        0x00, 0x00, // responder_id_list
        0x00, 0x00, // request_extensions
    ];

    #[test]
    fn ocsp_request() {
        let (rest, req) = CertificateStatusRequest::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(req, CertificateStatusRequest::ocsp());

        let mut out = Buf::new();
        req.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn status_body() {
        let mut out = Buf::new();
        serialize_status(&[0xAA, 0xBB], &mut out);
        assert_eq!(&*out, &[0x01, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
        assert_eq!(parse_status(&out).unwrap(), &[0xAA, 0xBB]);
        assert!(parse_status(&[0x02, 0x00, 0x00, 0x00]).is_err());
    }
}
