// Certificate (RFC 5246 Section 7.4.2, RFC 8446 Section 4.4.2)
//
// Carries the sender's chain, end-entity first. Entries are handed to the
// trust collaborator exactly as they are on the wire. In TLS 1.3 every
// entry has its own extensions, the first one may staple an OCSP response.
//
// A client asked for a certificate may send an empty list.

use nom::combinator::all_consuming;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{all_of, put_u16, put_vec16, put_vec24, put_vec8, vec16, vec24, vec8, with_length, Prefix};
use crate::config::ClientAuth;
use crate::context::HandshakeContext;
use crate::crypto::CertificateTrust;
use crate::error::{CertificateError, ProtocolFault};
use crate::extension::{self, ExtensionType};
use crate::suite::KeyExchange;
use crate::types::{HandshakeType, SignatureAlgorithm};

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CertificateEntry<'a> {
    pub data: &'a [u8],
    /// Extension block without its length. TLS 1.3 only.
    pub extensions: &'a [u8],
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CertificateMessage<'a> {
    /// certificate_request_context, TLS 1.3 only.
    pub context: &'a [u8],
    pub entries: Vec<CertificateEntry<'a>>,
}

impl<'a> CertificateMessage<'a> {
    pub fn parse(input: &'a [u8], tls13: bool) -> IResult<&'a [u8], CertificateMessage<'a>> {
        let (input, context) = if tls13 { vec8(input)? } else { (input, &input[..0]) };
        let (input, list) = vec24(input)?;
        let entry = |i: &'a [u8]| -> IResult<&'a [u8], CertificateEntry<'a>> {
            let (i, data) = vec24(i)?;
            if data.is_empty() {
                return Err(nom::Err::Error(nom::error::Error::new(
                    i,
                    nom::error::ErrorKind::LengthValue,
                )));
            }
            let (i, extensions) = if tls13 { vec16(i)? } else { (i, &i[..0]) };
            Ok((i, CertificateEntry { data, extensions }))
        };
        let (_, entries) = all_consuming(all_of(entry))(list)?;
        Ok((input, CertificateMessage { context, entries }))
    }

    pub fn serialize(&self, output: &mut Buf, tls13: bool) {
        if tls13 {
            put_vec8(output, self.context);
        }
        with_length(output, Prefix::U24, |o| {
            for e in &self.entries {
                put_vec24(o, e.data);
                if tls13 {
                    put_vec16(o, e.extensions);
                }
            }
        });
    }
}

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let tls13 = ctx.is_tls13();

    let credentials = if ctx.is_client() {
        if !ctx.cert_requested {
            return Ok(None);
        }
        // Nothing the server accepts means an empty chain.
        ctx.config
            .credentials()
            .filter(|c| ctx.choose_scheme(&*c.key).is_some())
            .cloned()
    } else {
        let c = ctx
            .config
            .credentials()
            .cloned()
            .ok_or_else(|| ProtocolFault::internal_error("Server without credentials"))?;
        Some(c)
    };

    let mut status = Buf::new();
    let staple = !ctx.is_client() && tls13 && extension::will_staple(ctx);
    if staple {
        if let Some(response) = ctx.config.ocsp_response() {
            put_u16(&mut status, ExtensionType::StatusRequest.as_u16());
            let mut body = Buf::new();
            extension::serialize_status(response, &mut body);
            put_vec16(&mut status, &body);
            ctx.handshake_session.ocsp_responses = vec![Buf::from_slice(response)];
        }
    }

    let chain: Vec<Buf> = credentials.as_ref().map(|c| c.chain.clone()).unwrap_or_default();
    let entries = chain
        .iter()
        .enumerate()
        .map(|(i, data)| CertificateEntry {
            data,
            extensions: if i == 0 { &status } else { &[] },
        })
        .collect();
    let message = CertificateMessage {
        context: &[],
        entries,
    };
    let mut body = Buf::new();
    message.serialize(&mut body, tls13);

    if chain.is_empty() {
        debug!("Sending an empty certificate chain");
    }
    ctx.handshake_session.local_chain = chain;
    ctx.handshake_session.local_key = credentials.map(|c| c.key);
    Ok(Some(body))
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let tls13 = ctx.is_tls13();
    let (_, message) = all_consuming(|i| CertificateMessage::parse(i, tls13))(body)?;
    if !message.context.is_empty() {
        return Err(ProtocolFault::illegal_parameter(
            "Non-empty certificate_request_context",
        ));
    }

    if message.entries.is_empty() {
        return empty_chain(ctx);
    }

    let chain: Vec<Buf> = message.entries.iter().map(|e| Buf::from_slice(e.data)).collect();
    let trust = ctx.config.trust().clone();

    let auth_type = if !ctx.is_client() {
        "CLIENT"
    } else if tls13 {
        "TLS13"
    } else {
        ctx.suite()?
            .key_exchange
            .map(|k| k.auth_type())
            .unwrap_or("UNKNOWN")
    };
    trust.check_peer_trusted(&chain, auth_type, &ctx.peer_context())?;

    let public_key = trust.public_key(&chain[0])?;
    if ctx.is_client() && !tls13 {
        let suite = ctx.suite()?;
        let expected = match suite.key_exchange {
            Some(KeyExchange::EcdheEcdsa) => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::RSA,
        };
        if public_key.algorithm != expected {
            return Err(ProtocolFault::bad_certificate(format!(
                "{:?} key for {}",
                public_key.algorithm, suite.name
            )));
        }
    }

    if tls13 {
        for (i, entry) in message.entries.iter().enumerate() {
            load_entry_extensions(ctx, &*trust, i, entry)?;
        }
    }

    debug!("Peer certificate chain of {} accepted", chain.len());
    ctx.peer_public_key = Some(public_key);
    ctx.handshake_session.peer_chain = chain;

    if ctx.is_client() && !tls13 {
        ctx.consumers.extend(&[
            HandshakeType::CertificateStatus,
            HandshakeType::ServerKeyExchange,
        ]);
    } else if tls13 {
        ctx.consumers.push(HandshakeType::CertificateVerify);
    } else {
        // The CertificateVerify follows the ClientKeyExchange.
        ctx.consumers.push(HandshakeType::ClientKeyExchange);
    }
    Ok(())
}

fn empty_chain(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if ctx.is_client() {
        return Err(ProtocolFault::decode_error("Empty server certificate chain"));
    }
    if ctx.config.client_auth() == ClientAuth::Required {
        return Err(if ctx.is_tls13() {
            ProtocolFault::certificate_required("Empty client certificate chain")
        } else {
            ProtocolFault::bad_certificate("Empty client certificate chain")
        });
    }
    debug!("Client sent no certificate");
    let next = if ctx.is_tls13() {
        HandshakeType::Finished
    } else {
        HandshakeType::ClientKeyExchange
    };
    ctx.consumers.push(next);
    Ok(())
}

/// Extensions of one TLS 1.3 certificate entry. Only a stapled OCSP
/// response on the end-entity entry is understood.
fn load_entry_extensions(
    ctx: &mut HandshakeContext,
    trust: &dyn CertificateTrust,
    index: usize,
    entry: &CertificateEntry<'_>,
) -> Result<(), ProtocolFault> {
    for (id, data) in extension::parse_block(entry.extensions)? {
        let asked = ctx.is_client() && ctx.extensions.contains(HandshakeType::ClientHello, id);
        if id != ExtensionType::StatusRequest || index != 0 || !asked {
            return Err(ProtocolFault::unsupported_extension(format!(
                "{:?} in certificate entry {}",
                id, index
            )));
        }

        let response = extension::parse_status(data)?;
        match trust.check_status_response(entry.data, response) {
            Ok(()) => {}
            Err(e @ CertificateError::BadStatusResponse(_)) => return Err(e.into()),
            Err(e) => {
                warn!("Ignoring OCSP response: {}", e);
                continue;
            }
        }
        ctx.handshake_session.ocsp_responses = vec![Buf::from_slice(response)];
    }
    Ok(())
}
