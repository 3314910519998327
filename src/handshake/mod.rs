//! Handshake flight driver.
//!
//! The driver owns the [`HandshakeContext`] and two ordered queues of
//! message types: the producers (what we send next) and the consumers
//! (what we accept next). Every message type has a handler with up to four
//! hooks:
//!
//! - `produce`: build the message body, `None` to skip it
//! - `produced`: runs after the message went into the transcript
//! - `consume`: act on a received body
//! - `consumed`: runs after the message went into the transcript
//!
//! Hooks push the next expected messages onto the queues. Optional
//! messages are queued ahead of a mandatory one, so receiving the mandatory
//! one drops the optional ones the peer chose not to send.
//!
//! The driver does no record protection. It hands out handshake messages
//! in [`Outgoing`] and traffic keys in [`KeyChange`], and takes whole
//! handshake messages in [`Handshaker::unwrap`].

mod certificate;
mod certificate_request;
mod certificate_status;
mod certificate_verify;
mod change_cipher_spec;
mod client_hello;
mod encrypted_extensions;
mod finished;
mod key_exchange;
mod new_session_ticket;
mod server_hello;
mod server_hello_done;

use std::sync::Arc;

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u24, be_u8};

use crate::buffer::Buf;
use crate::codec::{put_u16, put_u24, put_u8};
use crate::config::Config;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::session::Session;
use crate::suite::CipherSuiteDescriptor;
use crate::task::{DelegatedTask, TaskResult};
use crate::types::{HandshakeType, ProtocolVersion, Role, HRR_RANDOM};
use crate::Error;

// ============================================================================
// Public types
// ============================================================================

/// What the handshake needs from the caller next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Call [`Handshaker::wrap`].
    NeedWrap,
    /// Call [`Handshaker::unwrap`] with the next message from the peer.
    NeedUnwrap,
    /// Run the [`Handshaker::delegated_task`] and hand the result to
    /// [`Handshaker::complete_task`].
    NeedTask,
    /// The handshake completed.
    Finished,
    /// No handshake in progress, or it was aborted.
    NotHandshaking,
}

/// Record content type of an [`Outgoing`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Handshake,
    ChangeCipherSpec,
}

/// A message for the record layer.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub kind: ContentKind,
    /// Handshake header and body, or the change_cipher_spec byte.
    pub data: Buf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Epoch {
    /// TLS 1.3 handshake traffic.
    Handshake,
    Application,
}

/// New traffic keys for one direction.
///
/// Takes effect for the records following the message that produced it.
#[derive(Clone)]
pub struct KeyChange {
    pub direction: Direction,
    pub epoch: Epoch,
    /// The TLS 1.3 traffic secret, for key updates.
    pub traffic_secret: Option<Buf>,
    /// Empty for AEAD suites.
    pub mac_key: Buf,
    pub key: Buf,
    pub iv: Buf,
}

impl std::fmt::Debug for KeyChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChange")
            .field("direction", &self.direction)
            .field("epoch", &self.epoch)
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

/// Where the handshake is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Hellos, up to the version and suite.
    Negotiating,
    /// TLS 1.3 encrypted extensions and authentication.
    ExtensionExchange,
    /// Application secrets derived, the last flight outstanding.
    KeyScheduleTransition,
    Finished,
    Aborted,
}

// ============================================================================
// Handlers
// ============================================================================

type ProduceMsg = fn(&mut HandshakeContext) -> Result<Option<Buf>, ProtocolFault>;
type ConsumeMsg = fn(&mut HandshakeContext, &[u8]) -> Result<(), ProtocolFault>;
type AfterMsg = fn(&mut HandshakeContext) -> Result<(), ProtocolFault>;

struct MessageHandler {
    msg: HandshakeType,
    produce: ProduceMsg,
    produced: Option<AfterMsg>,
    consume: ConsumeMsg,
    consumed: Option<AfterMsg>,
}

#[rustfmt::skip]
static HANDLERS: &[MessageHandler] = &[
    MessageHandler { msg: HandshakeType::ClientHello,
        produce: client_hello::produce, produced: Some(client_hello::produced),
        consume: client_hello::consume, consumed: None },
    MessageHandler { msg: HandshakeType::HelloRetryRequest,
        produce: server_hello::produce_retry, produced: Some(server_hello::produced_retry),
        consume: server_hello::consume_retry, consumed: Some(server_hello::consumed_retry) },
    MessageHandler { msg: HandshakeType::ServerHello,
        produce: server_hello::produce, produced: Some(server_hello::produced),
        consume: server_hello::consume, consumed: Some(server_hello::consumed) },
    MessageHandler { msg: HandshakeType::EncryptedExtensions,
        produce: encrypted_extensions::produce, produced: None,
        consume: encrypted_extensions::consume, consumed: None },
    MessageHandler { msg: HandshakeType::Certificate,
        produce: certificate::produce, produced: None,
        consume: certificate::consume, consumed: None },
    MessageHandler { msg: HandshakeType::CertificateStatus,
        produce: certificate_status::produce, produced: None,
        consume: certificate_status::consume, consumed: None },
    MessageHandler { msg: HandshakeType::ServerKeyExchange,
        produce: key_exchange::produce_server, produced: None,
        consume: key_exchange::consume_server, consumed: None },
    MessageHandler { msg: HandshakeType::CertificateRequest,
        produce: certificate_request::produce, produced: None,
        consume: certificate_request::consume, consumed: None },
    MessageHandler { msg: HandshakeType::ServerHelloDone,
        produce: server_hello_done::produce, produced: Some(server_hello_done::produced),
        consume: server_hello_done::consume, consumed: None },
    MessageHandler { msg: HandshakeType::ClientKeyExchange,
        produce: key_exchange::produce_client, produced: Some(key_exchange::produced_client),
        consume: key_exchange::consume_client, consumed: Some(key_exchange::consumed_client) },
    MessageHandler { msg: HandshakeType::CertificateVerify,
        produce: certificate_verify::produce, produced: None,
        consume: certificate_verify::consume, consumed: None },
    MessageHandler { msg: HandshakeType::ChangeCipherSpec,
        produce: change_cipher_spec::produce, produced: Some(change_cipher_spec::produced),
        consume: change_cipher_spec::consume, consumed: None },
    MessageHandler { msg: HandshakeType::Finished,
        produce: finished::produce, produced: Some(finished::produced),
        consume: finished::consume, consumed: Some(finished::consumed) },
    MessageHandler { msg: HandshakeType::NewSessionTicket,
        produce: new_session_ticket::produce, produced: Some(new_session_ticket::produced),
        consume: new_session_ticket::consume, consumed: Some(new_session_ticket::consumed) },
];

fn handler(msg: HandshakeType) -> Result<&'static MessageHandler, ProtocolFault> {
    HANDLERS
        .iter()
        .find(|h| h.msg == msg)
        .ok_or_else(|| ProtocolFault::unexpected_message(format!("No handler for {}", msg)))
}

/// Messages that stay out of the transcript.
fn is_transcribed(msg: HandshakeType) -> bool {
    !matches!(
        msg,
        HandshakeType::ChangeCipherSpec | HandshakeType::NewSessionTicket
    )
}

// ============================================================================
// Framing
// ============================================================================

const CHANGE_CIPHER_SPEC: u8 = 1;

/// Handshake header and body. DTLS headers carry the message_seq and an
/// unfragmented fragment range.
fn frame(dtls: bool, msg: HandshakeType, seq: u16, body: &[u8]) -> Buf {
    let mut out = Buf::with_capacity(body.len() + 12);
    put_u8(&mut out, msg.as_u8());
    put_u24(&mut out, body.len() as u32);
    if dtls {
        put_u16(&mut out, seq);
        put_u24(&mut out, 0);
        put_u24(&mut out, body.len() as u32);
    }
    out.extend_from_slice(body);
    out
}

struct Framed<'a> {
    msg_type: u8,
    seq: u16,
    body: &'a [u8],
    rest: &'a [u8],
}

fn parse_frame(input: &[u8], dtls: bool) -> Result<Framed<'_>, ProtocolFault> {
    let (rest, msg_type) = be_u8(input)?;
    let (rest, len) = be_u24(rest)?;
    let (rest, seq) = if dtls {
        let (rest, seq) = be_u16(rest)?;
        let (rest, offset) = be_u24(rest)?;
        let (rest, fragment_len) = be_u24(rest)?;
        if offset != 0 || fragment_len != len {
            return Err(ProtocolFault::decode_error("Fragmented handshake message"));
        }
        (rest, seq)
    } else {
        (rest, 0)
    };
    let (rest, body) = take(len as usize)(rest)?;
    Ok(Framed {
        msg_type,
        seq,
        body,
        rest,
    })
}

/// Map a received type byte to the message it is.
fn message_type(msg_type: u8, body: &[u8]) -> HandshakeType {
    let t = HandshakeType::from_u8(msg_type);
    // legacy_version(2) then random(32)
    if t == HandshakeType::ServerHello && body.len() >= 34 && body[2..34] == HRR_RANDOM {
        return HandshakeType::HelloRetryRequest;
    }
    t
}

/// A received message whose consumption waits on a delegated task.
struct Suspended {
    msg: HandshakeType,
    seq: u16,
    body: Buf,
    /// Messages received after it in the same call.
    rest: Buf,
}

// ============================================================================
// Handshaker
// ============================================================================

/// One side of a TLS/DTLS handshake.
pub struct Handshaker {
    ctx: HandshakeContext,
    suspended: Option<Suspended>,
}

impl Handshaker {
    /// Start a client handshake. The first call is [`wrap`](Self::wrap).
    pub fn client(config: Arc<Config>) -> Result<Self, Error> {
        let mut ctx = HandshakeContext::new(config, Role::Client)?;
        ctx.producers.push(HandshakeType::ClientHello);
        Ok(Handshaker {
            ctx,
            suspended: None,
        })
    }

    /// Start a server handshake. The first call is [`unwrap`](Self::unwrap).
    pub fn server(config: Arc<Config>) -> Result<Self, Error> {
        if config.credentials().is_none() {
            return Err(Error::Config("A server needs credentials".to_string()));
        }
        let mut ctx = HandshakeContext::new(config, Role::Server)?;
        ctx.consumers.push(HandshakeType::ClientHello);
        Ok(Handshaker {
            ctx,
            suspended: None,
        })
    }

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    pub fn state(&self) -> DriverState {
        self.ctx.state
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        let ctx = &self.ctx;
        if ctx.state == DriverState::Aborted {
            HandshakeStatus::NotHandshaking
        } else if ctx.tasks.is_pending() {
            HandshakeStatus::NeedTask
        } else if !ctx.producers.is_empty() {
            HandshakeStatus::NeedWrap
        } else if ctx.state == DriverState::Finished {
            HandshakeStatus::Finished
        } else if !ctx.consumers.is_empty() {
            HandshakeStatus::NeedUnwrap
        } else {
            HandshakeStatus::NotHandshaking
        }
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.ctx.state == DriverState::Aborted {
            return Err(Error::Aborted);
        }
        if self.ctx.tasks.is_pending() {
            return Err(Error::TaskPending);
        }
        Ok(())
    }

    fn abort(&mut self, fault: ProtocolFault) -> Error {
        warn!("{:?} handshake aborted: {}", self.ctx.role, fault);
        self.ctx.state = DriverState::Aborted;
        self.ctx.producers.clear();
        self.ctx.consumers.clear();
        self.suspended = None;
        Error::Fault(fault)
    }

    /// Produce the next outgoing message.
    ///
    /// `Ok(None)` when there is nothing to send, or when producing the
    /// next message waits on a delegated task.
    pub fn wrap(&mut self) -> Result<Option<Outgoing>, Error> {
        self.check_usable()?;
        match self.produce_next() {
            Ok(out) => Ok(out),
            Err(f) => Err(self.abort(f)),
        }
    }

    fn produce_next(&mut self) -> Result<Option<Outgoing>, ProtocolFault> {
        let ctx = &mut self.ctx;
        loop {
            let Some(msg) = ctx.producers.first() else {
                return Ok(None);
            };
            let h = handler(msg)?;

            let Some(body) = (h.produce)(ctx)? else {
                if ctx.tasks.is_pending() {
                    return Ok(None);
                }
                trace!("Skipping {}", msg);
                ctx.producers.remove(msg);
                continue;
            };
            ctx.producers.remove(msg);

            let out = if msg == HandshakeType::ChangeCipherSpec {
                let mut data = Buf::new();
                put_u8(&mut data, CHANGE_CIPHER_SPEC);
                Outgoing {
                    kind: ContentKind::ChangeCipherSpec,
                    data,
                }
            } else {
                let seq = ctx.send_seq;
                ctx.send_seq = ctx.send_seq.wrapping_add(1);
                if is_transcribed(msg) {
                    ctx.transcript.update(msg, seq, &body);
                }
                Outgoing {
                    kind: ContentKind::Handshake,
                    data: frame(ctx.config.is_dtls(), msg, seq, &body),
                }
            };
            debug!("Produced {} ({} bytes)", msg, out.data.len());

            if let Some(produced) = h.produced {
                produced(ctx)?;
            }
            return Ok(Some(out));
        }
    }

    /// Take in one or more handshake messages, or a change_cipher_spec.
    ///
    /// Handshake messages must be whole. Fragments are reassembled by the
    /// record layer.
    pub fn unwrap(&mut self, kind: ContentKind, data: &[u8]) -> Result<(), Error> {
        self.check_usable()?;
        let r = match kind {
            ContentKind::ChangeCipherSpec => self.consume_change_cipher_spec(data),
            ContentKind::Handshake => self.consume_all(data),
        };
        r.map_err(|f| self.abort(f))
    }

    fn consume_change_cipher_spec(&mut self, data: &[u8]) -> Result<(), ProtocolFault> {
        if data != [CHANGE_CIPHER_SPEC] {
            return Err(ProtocolFault::decode_error("Bad change_cipher_spec"));
        }
        if self.ctx.is_tls13() {
            trace!("Ignoring change_cipher_spec");
            return Ok(());
        }
        self.consume(HandshakeType::ChangeCipherSpec, 0, data)
    }

    fn consume_all(&mut self, data: &[u8]) -> Result<(), ProtocolFault> {
        let dtls = self.ctx.config.is_dtls();
        let mut input = data;
        while !input.is_empty() {
            let framed = parse_frame(input, dtls)?;
            let msg = message_type(framed.msg_type, framed.body);
            self.consume(msg, framed.seq, framed.body)?;
            input = framed.rest;

            if self.ctx.tasks.is_pending() {
                if let Some(s) = &mut self.suspended {
                    s.rest = Buf::from_slice(input);
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn consume(&mut self, msg: HandshakeType, seq: u16, body: &[u8]) -> Result<(), ProtocolFault> {
        let ctx = &mut self.ctx;
        if !ctx.consumers.contains(msg) {
            return Err(ProtocolFault::unexpected_message(format!(
                "Unexpected {} ({:?})",
                msg, ctx.state
            )));
        }
        // take_through would skip it as optional.
        if msg == HandshakeType::Finished && ctx.consumers.contains(HandshakeType::CertificateVerify) {
            return Err(ProtocolFault::unexpected_message(
                "Finished before CertificateVerify",
            ));
        }
        let h = handler(msg)?;
        debug!("Consuming {} ({} bytes)", msg, body.len());

        (h.consume)(ctx, body)?;

        if ctx.tasks.is_pending() {
            trace!("{} waits on a delegated task", msg);
            self.suspended = Some(Suspended {
                msg,
                seq,
                body: Buf::from_slice(body),
                rest: Buf::new(),
            });
            return Ok(());
        }

        ctx.consumers.take_through(msg);
        if is_transcribed(msg) {
            ctx.transcript.update(msg, seq, body);
        }
        if let Some(consumed) = h.consumed {
            consumed(ctx)?;
        }
        Ok(())
    }

    /// The task the handshake waits on, handed out once.
    pub fn delegated_task(&mut self) -> Option<DelegatedTask> {
        self.ctx.tasks.take()
    }

    /// Hand back the result of the delegated task.
    ///
    /// A received message that waited on the task is consumed now, along
    /// with anything that arrived after it. A failed task fails the
    /// handshake here.
    pub fn complete_task(&mut self, result: TaskResult) -> Result<(), Error> {
        if self.ctx.state == DriverState::Aborted {
            return Err(Error::Aborted);
        }
        if !self.ctx.tasks.complete(result) {
            return Err(Error::Crypto("No delegated task pending".to_string()));
        }
        let Some(s) = self.suspended.take() else {
            // The producer picks the result up on the next wrap.
            return Ok(());
        };
        let r = self.resume(s);
        r.map_err(|f| self.abort(f))
    }

    fn resume(&mut self, s: Suspended) -> Result<(), ProtocolFault> {
        self.consume(s.msg, s.seq, &s.body)?;
        if self.ctx.tasks.is_pending() {
            if let Some(again) = &mut self.suspended {
                again.rest = s.rest;
            }
            return Ok(());
        }
        self.consume_all(&s.rest)
    }

    /// Next traffic key change for the record layer.
    pub fn poll_key_change(&mut self) -> Option<KeyChange> {
        self.ctx.key_changes.pop_front()
    }

    /// The established session, once finished.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.ctx.session.as_ref()
    }

    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.ctx.version.is_known().then_some(self.ctx.version)
    }

    pub fn negotiated_suite(&self) -> Option<&'static CipherSuiteDescriptor> {
        self.ctx.suite
    }

    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match &self.ctx.session {
            Some(s) => s.alpn(),
            None => self.ctx.handshake_session.alpn.as_deref(),
        }
    }
}

impl std::fmt::Debug for Handshaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshaker")
            .field("role", &self.ctx.role)
            .field("state", &self.ctx.state)
            .field("version", &self.ctx.version)
            .field("status", &self.handshake_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtls_frame_layout() {
        let f = frame(true, HandshakeType::Finished, 3, &[0xAA, 0xBB]);
        assert_eq!(
            &*f,
            &[0x14, 0x00, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB]
        );
        let p = parse_frame(&f, true).unwrap();
        assert_eq!(p.msg_type, 0x14);
        assert_eq!(p.seq, 3);
        assert_eq!(p.body, &[0xAA, 0xBB]);
        assert!(p.rest.is_empty());
    }

    #[test]
    fn fragment_is_decode_error() {
        let mut f = frame(true, HandshakeType::Finished, 0, &[0xAA, 0xBB]).into_vec();
        // fragment_length 1
        f[11] = 0x01;
        let err = parse_frame(&f, true).err().unwrap();
        assert_eq!(err.alert, crate::alert::Alert::DecodeError);
    }

    #[test]
    fn hello_retry_request_is_recognized() {
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&HRR_RANDOM);
        assert_eq!(message_type(2, &body), HandshakeType::HelloRetryRequest);
        body[5] ^= 1;
        assert_eq!(message_type(2, &body), HandshakeType::ServerHello);
    }

    #[test]
    fn finished_never_skips_certificate_verify() {
        let _ = env_logger::try_init();

        let key = crate::certificate::CertifiedKey::generate(
            &crate::crypto::rust_crypto::default_provider(),
            crate::types::NamedGroup::Secp256r1,
        )
        .unwrap();
        let config = Arc::new(Config::builder().credentials(key).build().unwrap());
        let mut hs = Handshaker::server(config).unwrap();
        hs.ctx.consumers.clear();
        hs.ctx
            .consumers
            .extend(&[HandshakeType::CertificateVerify, HandshakeType::Finished]);

        let err = hs.consume(HandshakeType::Finished, 0, &[0; 12]).unwrap_err();
        assert_eq!(err.alert, crate::alert::Alert::UnexpectedMessage);
        assert!(hs.ctx.consumers.contains(HandshakeType::CertificateVerify));
    }

    #[test]
    fn every_handler_is_unique() {
        for (i, h) in HANDLERS.iter().enumerate() {
            assert!(!HANDLERS[..i].iter().any(|o| o.msg == h.msg), "{}", h.msg);
        }
    }
}
