// ServerHello and HelloRetryRequest (RFC 5246 Section 7.4.1.3,
// RFC 8446 Sections 4.1.3 and 4.1.4)
//
// Client                                            Server
//
// ClientHello          -------->
//                      <--------       HelloRetryRequest
// ClientHello          -------->
//                      <--------             ServerHello
//                                    {EncryptedExtensions}
//
// A HelloRetryRequest is a ServerHello with a special random. Both sides
// fold the first ClientHello into a message_hash before it enters the
// transcript. In TLS 1.3 the handshake secrets are derived right after the
// ServerHello.

use nom::combinator::all_consuming;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::codec::{put_u16, put_u8, put_vec16, vec16};
use crate::context::HandshakeContext;
use crate::crypto::KeySchedule;
use crate::error::ProtocolFault;
use crate::extension;
use crate::handshake::{Direction, DriverState, Epoch};
use crate::suite::{lookup_by_id, CipherSuiteDescriptor};
use crate::types::{HandshakeType, ProtocolVersion, Random, SessionId};

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ServerHello<'a> {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: u16,
    pub compression_method: u8,
    pub extensions: &'a [u8],
}

impl<'a> ServerHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = be_u16(input)?;
        let (input, compression_method) = be_u8(input)?;
        let (input, extensions) = if input.is_empty() {
            (input, &input[..0])
        } else {
            vec16(input)?
        };
        Ok((
            input,
            ServerHello {
                legacy_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.legacy_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        put_u16(output, self.cipher_suite);
        put_u8(output, self.compression_method);
        if !self.extensions.is_empty() {
            put_vec16(output, self.extensions);
        }
    }
}

/// Derive the 1.3 handshake traffic secrets over ClientHello..ServerHello.
fn derive_handshake_secrets(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    let hash = ctx.hash()?;
    let psk = match (ctx.psk_index, &ctx.resuming) {
        (Some(_), Some(s)) => s.psk().map(Buf::from_slice),
        _ => None,
    };
    let shared = ctx
        .shared_secret
        .take()
        .ok_or_else(|| ProtocolFault::internal_error("No key exchange secret"))?;
    let th = ctx.transcript_hash()?;

    let mut ks = KeySchedule::new(&ctx.provider, hash, ctx.version, psk.as_deref())
        .map_err(ProtocolFault::internal_error)?;
    let (client, server) = ks
        .derive_handshake(&shared, &th)
        .map_err(ProtocolFault::internal_error)?;
    ctx.key_schedule = Some(ks);

    let (ours, theirs) = if ctx.is_client() {
        (client.clone(), server.clone())
    } else {
        (server.clone(), client.clone())
    };
    ctx.client_hs_secret = client;
    ctx.server_hs_secret = server;

    ctx.push_tls13_keys(Direction::Write, Epoch::Handshake, &ours)?;
    ctx.push_tls13_keys(Direction::Read, Epoch::Handshake, &theirs)?;
    ctx.state = DriverState::ExtensionExchange;
    Ok(())
}

// ============================================================================
// HelloRetryRequest
// ============================================================================

pub(super) fn produce_retry(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let suite = ctx.suite()?;
    ctx.transcript
        .replace_with_message_hash(ctx.provider.hash_provider, suite.hash, ctx.version)
        .map_err(ProtocolFault::internal_error)?;

    let extensions = extension::produce(ctx, HandshakeType::HelloRetryRequest)?;
    let hello = ServerHello {
        legacy_version: ctx.version.legacy_wire_version(),
        random: Random::hello_retry(),
        session_id: ctx.legacy_session_id.clone(),
        cipher_suite: suite.id,
        compression_method: 0,
        extensions: &extensions,
    };
    let mut body = Buf::new();
    hello.serialize(&mut body);
    Ok(Some(body))
}

pub(super) fn produced_retry(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    ctx.retried = true;
    // The first ClientHello is off the queue by now.
    ctx.consumers.push(HandshakeType::ClientHello);
    Ok(())
}

pub(super) fn consume_retry(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let (_, hello) = all_consuming(ServerHello::parse)(body)?;
    let entries = extension::parse_block(hello.extensions)?;

    let version = extension::peek_selected_version(&entries)?.ok_or_else(|| {
        ProtocolFault::missing_extension("HelloRetryRequest without supported_versions")
    })?;
    if !version.uses_tls13_key_schedule() || !ctx.active_versions.contains(&version) {
        return Err(ProtocolFault::illegal_parameter(format!(
            "HelloRetryRequest selects {}",
            version
        )));
    }
    ctx.version = version;

    let suite = offered_suite(ctx, hello.cipher_suite)?;
    ctx.suite = Some(suite);
    check_echo(ctx, &hello)?;

    extension::consume_on_load(ctx, HandshakeType::HelloRetryRequest, &entries)?;
    extension::consume_on_trade(ctx, HandshakeType::HelloRetryRequest)?;
    if ctx.retry_group.is_none() && ctx.cookie.is_none() {
        return Err(ProtocolFault::illegal_parameter(
            "HelloRetryRequest that changes nothing",
        ));
    }

    if let Some(s) = &ctx.resuming {
        if s.suite().hash != suite.hash {
            debug!("Dropping PSK for a suite with another hash");
            ctx.resuming = None;
            ctx.psk_identity = None;
            ctx.offered_psks = None;
        }
    }

    ctx.transcript
        .replace_with_message_hash(ctx.provider.hash_provider, suite.hash, version)
        .map_err(ProtocolFault::internal_error)?;
    Ok(())
}

pub(super) fn consumed_retry(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    ctx.retried = true;
    ctx.producers.push(HandshakeType::ClientHello);
    Ok(())
}

// ============================================================================
// ServerHello
// ============================================================================

pub(super) fn produce(ctx: &mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault> {
    let suite = ctx.suite()?;

    let max = ctx.active_versions.first().copied().unwrap_or(ctx.version);
    if max.rank() > ctx.version.rank() && max.rank() >= ProtocolVersion::TLS1_2.rank() {
        ctx.server_random.mark_downgrade(ctx.version);
    }

    let session_id = if ctx.is_tls13() {
        ctx.legacy_session_id.clone()
    } else {
        if ctx.handshake_session.id.is_empty() {
            let id = ctx.random_bytes(32)?;
            ctx.handshake_session.id = SessionId::try_new(&id)
                .ok_or_else(|| ProtocolFault::internal_error("Bad session id"))?;
        }
        ctx.handshake_session.id.clone()
    };

    let extensions = extension::produce(ctx, HandshakeType::ServerHello)?;
    let hello = ServerHello {
        legacy_version: ctx.version.legacy_wire_version(),
        random: ctx.server_random,
        session_id,
        cipher_suite: suite.id,
        compression_method: 0,
        extensions: &extensions,
    };
    let mut body = Buf::new();
    hello.serialize(&mut body);
    Ok(Some(body))
}

pub(super) fn produced(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() {
        derive_handshake_secrets(ctx)?;
    }
    Ok(())
}

pub(super) fn consume(ctx: &mut HandshakeContext, body: &[u8]) -> Result<(), ProtocolFault> {
    let (_, hello) = all_consuming(ServerHello::parse)(body)?;
    let entries = extension::parse_block(hello.extensions)?;

    let version = match extension::peek_selected_version(&entries)? {
        Some(v) if v.uses_tls13_key_schedule() && ctx.active_versions.contains(&v) => v,
        Some(v) => {
            return Err(ProtocolFault::illegal_parameter(format!(
                "supported_versions selects {}",
                v
            )))
        }
        None => {
            let v = hello.legacy_version;
            if v.uses_tls13_key_schedule() || !ctx.active_versions.contains(&v) {
                return Err(ProtocolFault::protocol_version(format!(
                    "Server selects {}",
                    v
                )));
            }
            v
        }
    };
    if ctx.retried && version != ctx.version {
        return Err(ProtocolFault::illegal_parameter(
            "ServerHello version differs from HelloRetryRequest",
        ));
    }
    ctx.version = version;
    ctx.server_random = hello.random;
    debug!("Negotiated {}", version);

    let max = ctx.active_versions.first().copied().unwrap_or(version);
    if !ctx.is_tls13() && max.rank() > version.rank() && hello.random.has_downgrade_marker() {
        return Err(ProtocolFault::illegal_parameter("Downgrade sentinel in ServerHello"));
    }

    let suite = offered_suite(ctx, hello.cipher_suite)?;
    if ctx.retried && ctx.suite != Some(suite) {
        return Err(ProtocolFault::illegal_parameter(
            "ServerHello suite differs from HelloRetryRequest",
        ));
    }
    ctx.suite = Some(suite);

    if ctx.is_tls13() {
        check_echo(ctx, &hello)?;
    } else {
        if hello.compression_method != 0 {
            return Err(ProtocolFault::illegal_parameter("Compression selected"));
        }
        accept_session_id(ctx, &hello)?;
    }

    extension::consume_on_load(ctx, HandshakeType::ServerHello, &entries)?;
    extension::consume_on_trade(ctx, HandshakeType::ServerHello)?;

    let next = match (ctx.is_tls13(), ctx.resuming.is_some()) {
        (true, _) => HandshakeType::EncryptedExtensions,
        (false, true) => HandshakeType::ChangeCipherSpec,
        (false, false) => HandshakeType::Certificate,
    };
    ctx.consumers.push(next);
    Ok(())
}

pub(super) fn consumed(ctx: &mut HandshakeContext) -> Result<(), ProtocolFault> {
    if ctx.is_tls13() {
        derive_handshake_secrets(ctx)?;
    }
    Ok(())
}

/// A suite we offered and that works with the negotiated version.
fn offered_suite(
    ctx: &HandshakeContext,
    id: u16,
) -> Result<&'static CipherSuiteDescriptor, ProtocolFault> {
    let offered = ctx.config.cipher_suites().iter().any(|s| s.id == id);
    match lookup_by_id(id) {
        Some(s) if offered && s.is_negotiable() && s.is_available(ctx.version) => Ok(s),
        _ => Err(ProtocolFault::illegal_parameter(format!(
            "Server selects cipher suite 0x{:04X}",
            id
        ))),
    }
}

/// TLS 1.3 echoes the legacy session id and does no compression.
fn check_echo(ctx: &HandshakeContext, hello: &ServerHello<'_>) -> Result<(), ProtocolFault> {
    if hello.session_id != ctx.legacy_session_id {
        return Err(ProtocolFault::illegal_parameter("legacy_session_id not echoed"));
    }
    if hello.compression_method != 0 {
        return Err(ProtocolFault::illegal_parameter("Compression selected"));
    }
    Ok(())
}

/// Before 1.3, the server resumes by echoing the session id we sent.
fn accept_session_id(ctx: &mut HandshakeContext, hello: &ServerHello<'_>) -> Result<(), ProtocolFault> {
    let resumed = match &ctx.resuming {
        Some(s) if !s.version().uses_tls13_key_schedule() => {
            !hello.session_id.is_empty() && hello.session_id == *s.id()
        }
        _ => false,
    };

    if !resumed {
        if ctx.resuming.take().is_some() {
            debug!("Server declined resumption");
        }
        ctx.handshake_session.id = hello.session_id.clone();
        return Ok(());
    }

    let Some(session) = ctx.resuming.clone() else {
        return Ok(());
    };
    if session.version() != ctx.version || Some(session.suite()) != ctx.suite {
        return Err(ProtocolFault::illegal_parameter(
            "Resumed session with another version or suite",
        ));
    }
    debug!("Server resumes the session");
    ctx.master_secret = Buf::from_slice(session.master_secret());
    ctx.handshake_session.resume_from(&session);
    ctx.handshake_session.id = session.id().clone();
    Ok(())
}
