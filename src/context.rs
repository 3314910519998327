//! State shared by every handshake message and extension handler.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::Buf;
use crate::config::Config;
use crate::crypto::{ActiveKeyExchange, CryptoProvider, HandshakeHash, KeyBlock, KeySchedule};
use crate::crypto::{PeerContext, PeerPublicKey, SigningKey};
use crate::error::ProtocolFault;
use crate::extension::{ExtensionDescriptor, ExtensionStore, OfferedPsks};
use crate::flight::WorkQueue;
use crate::handshake::{Direction, DriverState, Epoch, KeyChange};
use crate::session::{HandshakeSession, Session};
use crate::suite::CipherSuiteDescriptor;
use crate::task::{DelegatedTask, TaskResult, TaskSlot};
use crate::types::{HandshakeType, HashAlgorithm, NamedGroup, ProtocolVersion, Random, Role};
use crate::types::{SessionId, SignatureScheme};
use crate::Error;

/// Everything one handshake knows.
///
/// Owned by the [`Handshaker`](crate::Handshaker) and only ever touched
/// through `&mut`. Handlers read and write the fields directly.
pub(crate) struct HandshakeContext {
    pub config: Arc<Config>,
    pub provider: CryptoProvider,
    pub role: Role,
    pub state: DriverState,

    // Negotiation
    /// Versions still in play, strongest first.
    pub active_versions: Vec<ProtocolVersion>,
    /// Negotiated version, `Unknown` until decided.
    pub version: ProtocolVersion,
    pub suite: Option<&'static CipherSuiteDescriptor>,
    pub client_random: Random,
    pub server_random: Random,
    /// legacy_session_id of the ClientHello.
    pub legacy_session_id: SessionId,
    /// Suite ids offered by the client.
    pub peer_suites: Vec<u16>,
    pub transcript: HandshakeHash,
    pub extensions: ExtensionStore,
    /// Body of the ClientHello being consumed, for binder validation.
    pub client_hello: Buf,

    // Key exchange
    pub peer_groups: Vec<NamedGroup>,
    pub peer_shares: Vec<(NamedGroup, Buf)>,
    /// Our ephemeral key exchanges, at most one per group.
    pub key_shares: Vec<Box<dyn ActiveKeyExchange>>,
    pub selected_group: Option<NamedGroup>,
    /// Group asked for in a HelloRetryRequest.
    pub retry_group: Option<NamedGroup>,
    /// A HelloRetryRequest was exchanged.
    pub retried: bool,
    pub cookie: Option<Buf>,
    pub shared_secret: Option<Buf>,

    // Authentication
    pub peer_schemes: Vec<SignatureScheme>,
    pub peer_schemes_cert: Vec<SignatureScheme>,
    pub peer_public_key: Option<PeerPublicKey>,
    pub cert_requested: bool,
    pub ocsp_requested: bool,
    pub peer_alpn: Vec<Vec<u8>>,
    /// The client offered extended_master_secret.
    pub peer_ems: bool,
    pub ems: bool,
    pub secure_renegotiation: bool,

    // Resumption
    pub resuming: Option<Arc<Session>>,
    /// PSK identity offered by a client.
    pub psk_identity: Option<Buf>,
    /// PSKs offered in the ClientHello being consumed.
    pub offered_psks: Option<OfferedPsks>,
    pub psk_modes: Vec<u8>,
    /// Index of the accepted PSK identity.
    pub psk_index: Option<u16>,

    // Secrets
    pub key_schedule: Option<KeySchedule>,
    pub client_hs_secret: Buf,
    pub server_hs_secret: Buf,
    pub client_ap_secret: Buf,
    pub server_ap_secret: Buf,
    /// Pre-1.3 master secret.
    pub master_secret: Buf,
    pub key_block: Option<KeyBlock>,

    pub handshake_session: HandshakeSession,
    pub session: Option<Arc<Session>>,

    pub producers: WorkQueue,
    pub consumers: WorkQueue,
    pub tasks: TaskSlot,
    pub key_changes: VecDeque<KeyChange>,
    /// DTLS message_seq of the next message we send.
    pub send_seq: u16,
    pub tickets_to_send: usize,
}

impl HandshakeContext {
    pub fn new(config: Arc<Config>, role: Role) -> Result<Self, Error> {
        let provider = config.crypto_provider().clone();

        let mut active_versions = config.protocol_versions().to_vec();
        active_versions.sort_by_key(|v| std::cmp::Reverse(v.rank()));

        let mut own = [0u8; 32];
        provider.secure_random.fill(&mut own).map_err(Error::Crypto)?;

        let mut handshake_session = HandshakeSession::new();
        handshake_session.endpoint_identification =
            config.endpoint_identification().map(|s| s.to_string());
        handshake_session.local_schemes = config.signature_schemes().to_vec();

        let (client_random, server_random) = match role {
            Role::Client => (Random::new(own), Random::default()),
            Role::Server => (Random::default(), Random::new(own)),
        };

        Ok(HandshakeContext {
            config,
            provider,
            role,
            state: DriverState::Negotiating,
            active_versions,
            version: ProtocolVersion::default(),
            suite: None,
            client_random,
            server_random,
            legacy_session_id: SessionId::empty(),
            peer_suites: Vec::new(),
            transcript: HandshakeHash::new(),
            extensions: ExtensionStore::default(),
            client_hello: Buf::new(),
            peer_groups: Vec::new(),
            peer_shares: Vec::new(),
            key_shares: Vec::new(),
            selected_group: None,
            retry_group: None,
            retried: false,
            cookie: None,
            shared_secret: None,
            peer_schemes: Vec::new(),
            peer_schemes_cert: Vec::new(),
            peer_public_key: None,
            cert_requested: false,
            ocsp_requested: false,
            peer_alpn: Vec::new(),
            peer_ems: false,
            ems: false,
            secure_renegotiation: false,
            resuming: None,
            psk_identity: None,
            offered_psks: None,
            psk_modes: Vec::new(),
            psk_index: None,
            key_schedule: None,
            client_hs_secret: Buf::new(),
            server_hs_secret: Buf::new(),
            client_ap_secret: Buf::new(),
            server_ap_secret: Buf::new(),
            master_secret: Buf::new(),
            key_block: None,
            handshake_session,
            session: None,
            producers: WorkQueue::new("producers"),
            consumers: WorkQueue::new("consumers"),
            tasks: TaskSlot::default(),
            key_changes: VecDeque::new(),
            send_seq: 0,
            tickets_to_send: 0,
        })
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    /// Whether the negotiated version runs the TLS 1.3 handshake.
    pub fn is_tls13(&self) -> bool {
        self.version.uses_tls13_key_schedule()
    }

    /// Whether any version still in play runs the TLS 1.3 handshake.
    pub fn offers_tls13(&self) -> bool {
        self.active_versions
            .iter()
            .any(|v| v.uses_tls13_key_schedule())
    }

    pub fn suite(&self) -> Result<&'static CipherSuiteDescriptor, ProtocolFault> {
        self.suite
            .ok_or_else(|| ProtocolFault::internal_error("No cipher suite negotiated"))
    }

    /// The suite PRF/HKDF hash.
    pub fn hash(&self) -> Result<HashAlgorithm, ProtocolFault> {
        Ok(self.suite()?.hash)
    }

    /// Whether `d` is in play for `message`.
    ///
    /// A client producing its ClientHello does not know the version yet and
    /// considers every version it offers. Everything else is judged by the
    /// negotiated version.
    pub fn is_applicable(&self, d: &ExtensionDescriptor, message: HandshakeType) -> bool {
        if message == HandshakeType::ClientHello && self.is_client() {
            self.active_versions.iter().any(|v| d.applies_to(*v))
        } else {
            d.applies_to(self.version)
        }
    }

    pub fn random_bytes(&self, len: usize) -> Result<Buf, ProtocolFault> {
        self.provider
            .random_bytes(len)
            .map_err(ProtocolFault::internal_error)
    }

    /// Hash of the transcript so far with the suite hash.
    pub fn transcript_hash(&self) -> Result<Buf, ProtocolFault> {
        self.transcript
            .digest(self.provider.hash_provider, self.hash()?, self.version)
            .map_err(ProtocolFault::internal_error)
    }

    /// What the trust collaborator gets to know about this connection.
    pub fn peer_context(&self) -> PeerContext<'_> {
        PeerContext {
            role: self.role,
            version: self.version,
            server_name: self.handshake_session.server_name.as_deref(),
            endpoint_identification: self.config.endpoint_identification(),
        }
    }

    /// Cache key of a client's sessions.
    pub fn peer_name(&self) -> String {
        self.config.server_name().unwrap_or_default().to_string()
    }

    /// Our most preferred scheme for `key` that the peer accepts.
    ///
    /// A peer that sent no preferences gets the first scheme of the key
    /// usable with the negotiated version.
    pub fn choose_scheme(&self, key: &dyn SigningKey) -> Option<SignatureScheme> {
        key.schemes().iter().copied().find(|s| {
            s.is_usable_for(self.version)
                && self.config.signature_schemes().contains(s)
                && (self.peer_schemes.is_empty() || self.peer_schemes.contains(s))
        })
    }

    /// Sign `message`, inline or through a delegated task.
    ///
    /// `Ok(None)` means the handshake is suspended on a task. The caller
    /// returns and is invoked again with the same state once the task
    /// completed, and then gets the signature.
    pub fn sign(
        &mut self,
        key: &Arc<dyn SigningKey>,
        scheme: SignatureScheme,
        message: &[u8],
    ) -> Result<Option<Buf>, ProtocolFault> {
        if let Some(result) = self.tasks.take_result() {
            return match result {
                TaskResult::Signed(Ok(sig)) => Ok(Some(sig)),
                TaskResult::Signed(Err(e)) => Err(ProtocolFault::internal_error(e)),
                TaskResult::Panicked(e) => Err(ProtocolFault::internal_error(e)),
                TaskResult::Verified(_) => Err(ProtocolFault::internal_error(
                    "Verification result where a signature was expected",
                )),
            };
        }

        if self.config.delegate_tasks() {
            self.tasks.queue(DelegatedTask::Sign {
                key: key.clone(),
                scheme,
                message: Buf::from_slice(message),
            });
            return Ok(None);
        }

        let mut out = Buf::new();
        key.sign(scheme, message, &mut out)
            .map_err(ProtocolFault::internal_error)?;
        Ok(Some(out))
    }

    /// Verify a peer signature, inline or through a delegated task.
    ///
    /// `Ok(false)` means the handshake is suspended on a task. A bad
    /// signature is a `decrypt_error`.
    pub fn verify(
        &mut self,
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProtocolFault> {
        let outcome = if let Some(result) = self.tasks.take_result() {
            match result {
                TaskResult::Verified(r) => r,
                TaskResult::Panicked(e) => return Err(ProtocolFault::internal_error(e)),
                TaskResult::Signed(_) => {
                    return Err(ProtocolFault::internal_error(
                        "Signature where a verification result was expected",
                    ))
                }
            }
        } else {
            let public_key = self
                .peer_public_key
                .as_ref()
                .ok_or_else(|| ProtocolFault::unexpected_message("No peer public key"))?;

            if self.config.delegate_tasks() {
                self.tasks.queue(DelegatedTask::Verify {
                    verifier: self.provider.signature_verification,
                    public_key: public_key.key.clone(),
                    scheme,
                    message: Buf::from_slice(message),
                    signature: Buf::from_slice(signature),
                });
                return Ok(false);
            }

            self.provider.signature_verification.verify_signature(
                &public_key.key,
                message,
                signature,
                scheme,
            )
        };

        outcome.map_err(|e| ProtocolFault::decrypt_error(format!("Bad signature: {}", e)))?;
        Ok(true)
    }

    /// Queue traffic keys of a 1.3 traffic secret for the record layer.
    pub fn push_tls13_keys(
        &mut self,
        direction: Direction,
        epoch: Epoch,
        traffic_secret: &[u8],
    ) -> Result<(), ProtocolFault> {
        let suite = self.suite()?;
        let ks = self
            .key_schedule
            .as_ref()
            .ok_or_else(|| ProtocolFault::internal_error("No key schedule"))?;
        let (key, iv) = ks
            .traffic_keys(traffic_secret, suite.key_len(), suite.iv_len(self.version))
            .map_err(ProtocolFault::internal_error)?;

        trace!("Key change {:?} {:?}", direction, epoch);
        self.key_changes.push_back(KeyChange {
            direction,
            epoch,
            traffic_secret: Some(Buf::from_slice(traffic_secret)),
            mac_key: Buf::new(),
            key,
            iv,
        });
        Ok(())
    }

    /// Queue one direction of the pre-1.3 key block for the record layer.
    pub fn push_key_block(&mut self, direction: Direction) -> Result<(), ProtocolFault> {
        if self.key_block.is_none() {
            let suite = self.suite()?;
            let kb = crate::crypto::prf::key_block(
                &self.provider,
                self.version,
                suite.hash,
                &self.master_secret,
                &self.client_random.0,
                &self.server_random.0,
                suite.mac_key_len(),
                suite.key_len(),
                suite.iv_len(self.version),
            )
            .map_err(ProtocolFault::internal_error)?;
            self.key_block = Some(kb);
        }
        let Some(kb) = &self.key_block else {
            return Err(ProtocolFault::internal_error("No key block"));
        };

        let writer = match direction {
            Direction::Write => self.role,
            Direction::Read => self.role.peer(),
        };
        let (mac_key, key, iv) = match writer {
            Role::Client => (&kb.client_mac_key, &kb.client_key, &kb.client_iv),
            Role::Server => (&kb.server_mac_key, &kb.server_key, &kb.server_iv),
        };

        trace!("Key change {:?} {:?}", direction, Epoch::Application);
        let change = KeyChange {
            direction,
            epoch: Epoch::Application,
            traffic_secret: None,
            mac_key: mac_key.clone(),
            key: key.clone(),
            iv: iv.clone(),
        };
        self.key_changes.push_back(change);
        Ok(())
    }

    /// Complete the handshake with `session`.
    pub fn complete(&mut self, session: Arc<Session>) {
        info!(
            "{:?} handshake complete: {} {}{}",
            self.role,
            self.version,
            session.suite().name,
            if self.resuming.is_some() { " (resumed)" } else { "" }
        );
        self.session = Some(session);
        self.state = DriverState::Finished;
    }

    /// Finish the session collected during the handshake.
    pub fn finish_session(&mut self) -> Result<Arc<Session>, ProtocolFault> {
        let mut s = std::mem::replace(&mut self.handshake_session, HandshakeSession::new());
        s.version = self.version;
        s.suite = self.suite;
        s.extended_master_secret = self.ems;
        s.peer_schemes = self.peer_schemes.clone();
        s.finish()
            .ok_or_else(|| ProtocolFault::internal_error("Session without cipher suite"))
    }
}
