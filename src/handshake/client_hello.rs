// ClientHello (RFC 5246 Section 7.4.1.2, RFC 8446 Section 4.1.2)
//
// Client                                            Server
//
// ClientHello          -------->
//                      <--------       HelloRetryRequest (1.3)
// ClientHello          -------->
//                      <--------             ServerHello
//
// The server decides everything here: version, suite, key exchange group
// and whether a session is resumed. Its whole first flight is queued at
// the end of consume.

use nom::combinator::all_consuming;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{non_empty, put_u16, put_vec16, put_vec8, vec16, vec8, with_length, Prefix};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::extension::{self, ExtensionType};
use crate::resumption;
use crate::suite::KeyExchange;
use crate::types::{HandshakeType, ProtocolVersion, Random, SessionId, SignatureAlgorithm};

const NULL_COMPRESSION: u8 = 0;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ClientHello<'a> {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    /// DTLS only.
    pub cookie: &'a [u8],
    pub cipher_suites: Vec<u16>,
    pub compression_methods: &'a [u8],
    /// The extension block without its length.
    pub extensions: &'a [u8],
}

impl<'a> ClientHello<'a> {
    pub fn parse(input: &'a [u8], dtls: bool) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = if dtls { vec8(input)? } else { (input, &input[..0]) };
        let (input, suites) = vec16(input)?;
        let (_, cipher_suites) = all_consuming(non_empty(be_u16))(suites)?;
        let (input, compression_methods) = vec8(input)?;
        // Extensions may be missing altogether before 1.3.
        let (input, extensions) = if input.is_empty() {
            (input, &input[..0])
        } else {
            vec16(input)?
        };
        Ok((
            input,
            ClientHello {
                legacy_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf, dtls: bool) {
        self.legacy_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        if dtls {
            put_vec8(output, self.cookie);
        }
        with_length(output, Prefix::U16, |o| {
            for id in &self.cipher_suites {
                put_u16(o, *id);
            }
        });
        put_vec8(output, self.compression_methods);
        put_vec16(output, self.extensions);
    }
}

// ============================================================================
// Client
// ============================================================================

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    if !ctx.retried {
        find_session(ctx);
    }

    let max = ctx
        .active_versions
        .first()
        .copied()
        .ok_or_else(|| ProtocolFault::internal_error("No protocol version enabled"))?;

    let cipher_suites: Vec<u16> = ctx
        .config
        .cipher_suites()
        .iter()
        .filter(|s| s.has_key_exchange_handler())
        .filter(|s| ctx.active_versions.iter().any(|v| s.is_available(*v)))
        .map(|s| s.id)
        .collect();
    if cipher_suites.is_empty() {
        return Err(ProtocolFault::internal_error("No cipher suite for the enabled versions"));
    }

    let extensions = extension::produce(ctx, HandshakeType::ClientHello)?;

    let hello = ClientHello {
        legacy_version: max.legacy_wire_version(),
        random: ctx.client_random,
        session_id: ctx.legacy_session_id.clone(),
        cookie: &[],
        cipher_suites,
        compression_methods: &[NULL_COMPRESSION],
        extensions: &extensions,
    };
    let mut body = Buf::new();
    hello.serialize(&mut body, ctx.config.is_dtls());

    patch_binders(ctx, &mut body)?;
    Ok(Some(body))
}

/// Pick a cached session for the server we talk to.
fn find_session(ctx: &mut HandshakeContext) {
    let cache = ctx.config.session_cache().clone();
    let Some(session) = cache.get_by_peer(&ctx.peer_name()) else {
        return;
    };
    if let Err(gate) = resumption::check_gates(ctx, &session) {
        debug!("Cached session fails the {} gate", gate);
        return;
    }

    if session.version().uses_tls13_key_schedule() {
        // Tickets are single use.
        let Some(identity) = session.take_psk_identity() else {
            return;
        };
        cache.remove(&session);
        ctx.psk_identity = Some(identity);
    } else {
        ctx.legacy_session_id = session.id().clone();
    }
    debug!("Offering to resume a {} session", session.version());
    ctx.resuming = Some(session);
}

/// Fill in the PSK binders over the exact bytes of `body`.
fn patch_binders(ctx: &HandshakeContext, body: &mut Buf) -> Result<(), ProtocolFault> {
    let (Some(offer), Some(session)) = (&ctx.offered_psks, &ctx.resuming) else {
        return Ok(());
    };
    let Some(psk) = session.psk() else {
        return Ok(());
    };

    let binders_len = offer.binders_len();
    let tail = resumption::truncated_client_hello(body, binders_len)
        .ok_or_else(|| ProtocolFault::internal_error("ClientHello shorter than its binders"))?;
    let binder = resumption::compute_binder(
        &ctx.provider,
        session.suite().hash,
        session.version(),
        psk,
        &ctx.transcript,
        &tail,
    )
    .map_err(ProtocolFault::internal_error)?;

    // binders<33..2^16-1> holding one binder<32..255>
    if binder.len() + 3 != binders_len {
        return Err(ProtocolFault::internal_error("Binder length mismatch"));
    }
    let start = body.len() - binder.len();
    body[start..].copy_from_slice(&binder);
    Ok(())
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if ctx.offers_tls13() && !ctx.retried {
        ctx.consumers.push(HandshakeType::HelloRetryRequest);
    }
    ctx.consumers.push(HandshakeType::ServerHello);
    Ok(())
}

// ============================================================================
// Server
// ============================================================================

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let dtls = ctx.config.is_dtls();
    let (_, hello) = all_consuming(|i| ClientHello::parse(i, dtls))(body)?;

    if ctx.retried && (hello.random != ctx.client_random || hello.session_id != ctx.legacy_session_id)
    {
        return Err(ProtocolFault::illegal_parameter(
            "Second ClientHello does not match the first",
        ));
    }
    if !hello.compression_methods.contains(&NULL_COMPRESSION) {
        return Err(ProtocolFault::illegal_parameter("No null compression"));
    }

    ctx.client_hello = Buf::from_slice(body);
    ctx.client_random = hello.random;
    ctx.legacy_session_id = hello.session_id.clone();
    ctx.peer_suites = hello.cipher_suites.clone();

    let entries = extension::parse_block(hello.extensions)?;

    let version = choose_version(ctx, &hello, &entries)?;
    if ctx.retried && version != ctx.version {
        return Err(ProtocolFault::illegal_parameter(
            "Second ClientHello negotiates another version",
        ));
    }
    if version.uses_tls13_key_schedule() && !hello.cookie.is_empty() {
        return Err(ProtocolFault::illegal_parameter("Non-empty legacy_cookie"));
    }
    ctx.version = version;
    debug!("Negotiated {}", version);

    extension::consume_on_load(ctx, HandshakeType::ClientHello, &entries)?;

    let previous = ctx.suite;
    choose_suite(ctx)?;
    if ctx.retried && previous != ctx.suite {
        return Err(ProtocolFault::illegal_parameter(
            "Second ClientHello negotiates another cipher suite",
        ));
    }

    if !ctx.is_tls13() {
        resume_by_id(ctx);
    }
    extension::accept_scsv(ctx);
    extension::consume_on_trade(ctx, HandshakeType::ClientHello)?;

    if ctx.retry_group.is_some() {
        ctx.producers.push(HandshakeType::HelloRetryRequest);
        return Ok(());
    }

    queue_server_flight(ctx);
    Ok(())
}

fn choose_version(
    ctx: &HandshakeContext,
    hello: &ClientHello<'_>,
    entries: &[(ExtensionType, &[u8])],
) -> Result<ProtocolVersion, ProtocolFault> {
    if let Some(offered) = extension::peek_client_versions(entries)? {
        return ctx
            .active_versions
            .iter()
            .copied()
            .find(|v| offered.contains(v))
            .ok_or_else(|| ProtocolFault::protocol_version("No common protocol version"));
    }

    // A legacy_version above anything we know caps at 1.2.
    let ceiling = if hello.legacy_version.is_known() {
        hello.legacy_version.rank()
    } else {
        ProtocolVersion::TLS1_2.rank()
    };
    ctx.active_versions
        .iter()
        .copied()
        .find(|v| !v.uses_tls13_key_schedule() && v.rank() <= ceiling)
        .ok_or_else(|| {
            ProtocolFault::protocol_version(format!(
                "Client version {} not supported",
                hello.legacy_version
            ))
        })
}

/// Server preference order. Before 1.3 the suite key exchange must match
/// our credentials and an ECDHE group must be shared.
fn choose_suite(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let version = ctx.version;
    let algorithm = ctx.config.credentials().map(|c| c.key.algorithm());
    let ecdhe_group = extension::choose_ecdhe_group(ctx);

    let suite = ctx.config.cipher_suites().iter().copied().find(|s| {
        if !ctx.peer_suites.contains(&s.id) || !s.is_negotiable() || !s.is_available(version) {
            return false;
        }
        if !s.has_key_exchange_handler() {
            return false;
        }
        match s.key_exchange {
            None => true,
            Some(KeyExchange::EcdheEcdsa) => {
                ecdhe_group.is_some() && algorithm == Some(SignatureAlgorithm::ECDSA)
            }
            Some(KeyExchange::EcdheRsa) => {
                ecdhe_group.is_some() && algorithm == Some(SignatureAlgorithm::RSA)
            }
            Some(_) => false,
        }
    });

    let Some(suite) = suite else {
        return Err(ProtocolFault::handshake_failure("No common cipher suite"));
    };
    debug!("Selected cipher suite {}", suite.name);
    ctx.suite = Some(suite);
    if !suite.is_tls13() {
        ctx.selected_group = ecdhe_group;
    }
    Ok(())
}

/// Resume a pre-1.3 session by the id the client sent.
fn resume_by_id(ctx: &mut HandshakeContext) {
    if ctx.legacy_session_id.is_empty() {
        return;
    }
    let cache = ctx.config.session_cache().clone();
    let Some(session) = cache.get_by_id(ctx.legacy_session_id.as_slice()) else {
        trace!("Unknown session id");
        return;
    };
    if let Err(gate) = resumption::check_gates(ctx, &session) {
        debug!("Session fails the {} gate", gate);
        return;
    }
    debug!("Resuming session with {}", session.suite().name);
    ctx.suite = Some(session.suite());
    ctx.master_secret = Buf::from_slice(session.master_secret());
    ctx.handshake_session.resume_from(&session);
    ctx.handshake_session.id = session.id().clone();
    ctx.resuming = Some(session);
}

fn queue_server_flight(ctx: &mut HandshakeContext) {
    use HandshakeType::*;

    let resumed = ctx.resuming.is_some();
    let wants_cert = ctx.config.client_auth() != crate::config::ClientAuth::None;

    let flight: &[HandshakeType] = match (ctx.is_tls13(), resumed, wants_cert) {
        (true, true, _) => &[ServerHello, EncryptedExtensions, Finished],
        (true, false, true) => &[
            ServerHello,
            EncryptedExtensions,
            CertificateRequest,
            Certificate,
            CertificateVerify,
            Finished,
        ],
        (true, false, false) => &[
            ServerHello,
            EncryptedExtensions,
            Certificate,
            CertificateVerify,
            Finished,
        ],
        (false, true, _) => &[ServerHello, ChangeCipherSpec, Finished],
        (false, false, true) => &[
            ServerHello,
            Certificate,
            CertificateStatus,
            ServerKeyExchange,
            CertificateRequest,
            ServerHelloDone,
        ],
        (false, false, false) => &[
            ServerHello,
            Certificate,
            CertificateStatus,
            ServerKeyExchange,
            ServerHelloDone,
        ],
    };
    ctx.producers.extend(flight);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::crypto::HandshakeHash;
    use crate::types::Role;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // legacy_version
        0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, 0x01, 0x01, // random
        0x00, // session_id
        0x00, 0x04, 0x13, 0x01, 0xC0, 0x2B, // cipher_suites
        0x01, 0x00, // compression_methods
        0x00, 0x04, // extensions length
        0x00, 0x17, 0x00, 0x00, // extended_master_secret
    ];

    #[test]
    fn parse_and_serialize() {
        let (rest, hello) = ClientHello::parse(MESSAGE, false).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hello.legacy_version, ProtocolVersion::TLS1_2);
        assert_eq!(hello.cipher_suites, vec![0x1301, 0xC02B]);
        assert_eq!(hello.compression_methods, &[0]);
        assert_eq!(hello.extensions, &[0x00, 0x17, 0x00, 0x00]);

        let mut out = Buf::new();
        hello.serialize(&mut out, false);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn extensions_may_be_missing() {
        let short = &MESSAGE[..MESSAGE.len() - 6];
        let (rest, hello) = ClientHello::parse(short, false).unwrap();
        assert!(rest.is_empty());
        assert!(hello.extensions.is_empty());
    }

    #[test]
    fn empty_suites_are_rejected() {
        let mut m = MESSAGE[..35].to_vec();
        m.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
        assert!(ClientHello::parse(&m, false).is_err());
    }

    #[test]
    fn binder_matches_recomputation_from_the_wire() {
        let _ = env_logger::try_init();

        let config = Arc::new(Config::builder().server_name("example.com").build().unwrap());
        let session = crate::resumption::tests::session(ProtocolVersion::TLS1_3, 0x1301);
        config.session_cache().put_by_peer("example.com", session.clone());

        let mut ctx = HandshakeContext::new(config, Role::Client).unwrap();
        let body = produce(&mut ctx).unwrap().unwrap();
        assert!(ctx.resuming.is_some());

        let binders_len = ctx.offered_psks.as_ref().unwrap().binders_len();
        let tail = resumption::truncated_client_hello(&body, binders_len).unwrap();
        let expected = resumption::compute_binder(
            &ctx.provider,
            session.suite().hash,
            ProtocolVersion::TLS1_3,
            session.psk().unwrap(),
            &HandshakeHash::new(),
            &tail,
        )
        .unwrap();
        assert_eq!(&body[body.len() - expected.len()..], &*expected);

        // The server view of the same bytes.
        let (_, hello) = ClientHello::parse(&body, false).unwrap();
        let entries = extension::parse_block(hello.extensions).unwrap();
        assert_eq!(entries.last().unwrap().0, ExtensionType::PreSharedKey);
    }
}
