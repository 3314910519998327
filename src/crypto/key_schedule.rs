//! TLS 1.3 key schedule (RFC 8446 Section 7.1).
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "res binder", "") = binder_key
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", ClientHello...ServerHello)
//!              +-----> Derive-Secret(., "s hs traffic", ClientHello...ServerHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "res master", ClientHello...client Finished)
//! ```
//!
//! Without a PSK the early secret is extracted from a string of zeros.
//! DTLS 1.3 labels carry the `dtls13` prefix instead of `tls13 `.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HashProvider, HkdfProvider};
use crate::types::{HashAlgorithm, ProtocolVersion};

/// Where the schedule currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Early,
    Handshake,
    Master,
}

/// TLS 1.3 key schedule.
///
/// Tracks the current stage secret. Traffic secrets are returned to the
/// caller, not kept.
pub struct KeySchedule {
    hkdf: &'static dyn HkdfProvider,
    hasher: &'static dyn HashProvider,
    hash: HashAlgorithm,
    prefix: &'static [u8],
    stage: Stage,
    /// Early, handshake or master secret depending on `stage`.
    secret: Buf,
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchedule")
            .field("hash", &self.hash)
            .field("stage", &self.stage)
            .finish()
    }
}

impl KeySchedule {
    /// Start a schedule, optionally seeded with a PSK.
    pub fn new(
        provider: &CryptoProvider,
        hash: HashAlgorithm,
        version: ProtocolVersion,
        psk: Option<&[u8]>,
    ) -> Result<Self, String> {
        let zeros = vec![0u8; hash.output_len()];
        let ikm = psk.unwrap_or(&zeros);

        let mut early = Buf::new();
        provider
            .hkdf_provider
            .hkdf_extract(hash, &zeros, ikm, &mut early)?;

        Ok(KeySchedule {
            hkdf: provider.hkdf_provider,
            hasher: provider.hash_provider,
            hash,
            prefix: version.hkdf_label_prefix(),
            stage: Stage::Early,
            secret: early,
        })
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// HKDF-Expand-Label with this schedule's hash and label prefix.
    pub fn expand_label(
        &self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Buf, String> {
        let mut out = Buf::new();
        self.hkdf
            .hkdf_expand_label(self.hash, self.prefix, secret, label, context, &mut out, len)?;
        Ok(out)
    }

    fn empty_hash(&self) -> Result<Buf, String> {
        let ctx = self.hasher.create_hash(self.hash)?;
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        Ok(out)
    }

    fn derived(&self) -> Result<Buf, String> {
        let empty = self.empty_hash()?;
        self.expand_label(&self.secret, b"derived", &empty, self.hash.output_len())
    }

    /// binder_key = Derive-Secret(Early Secret, "res binder", "")
    pub fn binder_key(&self) -> Result<Buf, String> {
        if self.stage != Stage::Early {
            return Err("Binder key after early stage".to_string());
        }
        let empty = self.empty_hash()?;
        self.expand_label(&self.secret, b"res binder", &empty, self.hash.output_len())
    }

    /// Mix in the (EC)DHE secret.
    ///
    /// Returns `(client_handshake_traffic_secret, server_handshake_traffic_secret)`.
    pub fn derive_handshake(
        &mut self,
        shared_secret: &[u8],
        transcript_hash: &[u8],
    ) -> Result<(Buf, Buf), String> {
        if self.stage != Stage::Early {
            return Err("Handshake secret derived twice".to_string());
        }
        let salt = self.derived()?;
        let mut hs = Buf::new();
        self.hkdf
            .hkdf_extract(self.hash, &salt, shared_secret, &mut hs)?;
        self.secret = hs;
        self.stage = Stage::Handshake;

        let len = self.hash.output_len();
        let client = self.expand_label(&self.secret, b"c hs traffic", transcript_hash, len)?;
        let server = self.expand_label(&self.secret, b"s hs traffic", transcript_hash, len)?;
        Ok((client, server))
    }

    /// Move to the master secret.
    ///
    /// Returns `(client_application_traffic_secret_0, server_application_traffic_secret_0)`.
    pub fn derive_application(&mut self, transcript_hash: &[u8]) -> Result<(Buf, Buf), String> {
        if self.stage != Stage::Handshake {
            return Err("Master secret out of order".to_string());
        }
        let salt = self.derived()?;
        let zeros = vec![0u8; self.hash.output_len()];
        let mut master = Buf::new();
        self.hkdf
            .hkdf_extract(self.hash, &salt, &zeros, &mut master)?;
        self.secret = master;
        self.stage = Stage::Master;

        let len = self.hash.output_len();
        let client = self.expand_label(&self.secret, b"c ap traffic", transcript_hash, len)?;
        let server = self.expand_label(&self.secret, b"s ap traffic", transcript_hash, len)?;
        Ok((client, server))
    }

    /// resumption_master_secret over ClientHello...client Finished.
    pub fn resumption_master(&self, transcript_hash: &[u8]) -> Result<Buf, String> {
        if self.stage != Stage::Master {
            return Err("Resumption secret before master secret".to_string());
        }
        self.expand_label(
            &self.secret,
            b"res master",
            transcript_hash,
            self.hash.output_len(),
        )
    }

    /// Record protection key and IV for a traffic secret.
    pub fn traffic_keys(
        &self,
        traffic_secret: &[u8],
        key_len: usize,
        iv_len: usize,
    ) -> Result<(Buf, Buf), String> {
        let key = self.expand_label(traffic_secret, b"key", &[], key_len)?;
        let iv = self.expand_label(traffic_secret, b"iv", &[], iv_len)?;
        Ok((key, iv))
    }

    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    pub fn finished_key(&self, base_key: &[u8]) -> Result<Buf, String> {
        self.expand_label(base_key, b"finished", &[], self.hash.output_len())
    }

    /// PSK for a ticket issued with `nonce`.
    pub fn resumption_psk(&self, resumption_master: &[u8], nonce: &[u8]) -> Result<Buf, String> {
        self.expand_label(
            resumption_master,
            b"resumption",
            nonce,
            self.hash.output_len(),
        )
    }
}
