//! Cryptographic capability traits consumed by the handshake core.
//!
//! The handshake never implements primitive math. Everything it needs is
//! reached through the traits in this module, bundled in a
//! [`CryptoProvider`] of static trait objects.
//!
//! # Overview
//!
//! - **Hash Provider** ([`HashProvider`]): factory for incremental hash contexts
//! - **HMAC Provider** ([`HmacProvider`]): one-shot HMAC over any supported hash
//! - **HKDF Provider** ([`HkdfProvider`]): extract, expand and the TLS 1.3 label form
//! - **PRF Provider** ([`PrfProvider`]): the TLS 1.2 PRF and the legacy MD5/SHA-1 PRF
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): factory for ephemeral shares
//! - **Key Provider** ([`KeyProvider`]): load or generate signing keys
//! - **Signature Verification** ([`SignatureVerifier`]): verify with a peer public key
//! - **Secure Random** ([`SecureRandom`]): randoms, session ids and tickets
//!
//! Certificate trust is not part of the provider. It is configured per
//! connection through [`CertificateTrust`], because trust anchors are
//! deployment specific while the primitives are not.
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.
//! Delegated tasks run provider code under `catch_unwind`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::Buf;
use crate::error::CertificateError;
use crate::types::{HashAlgorithm, NamedGroup, ProtocolVersion, Role, SignatureAlgorithm};
use crate::types::SignatureScheme;

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
///
/// This trait is automatically implemented for all types that satisfy the bounds.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// Signing key for generating digital signatures.
///
/// Keys are shared between the configuration, running handshakes and
/// delegated tasks, so signing takes `&self`.
pub trait SigningKey: CryptoSafe {
    /// Sign `data` with `scheme`, writing the wire form of the signature to `out`.
    fn sign(&self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Signature algorithm of this key.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Schemes this key can sign with, most preferred first.
    fn schemes(&self) -> &'static [SignatureScheme];

    /// Encoded public key matching this private key.
    fn public_key(&self) -> &[u8];

    /// Whether the key material is still accessible.
    ///
    /// Hardware backed keys may disappear. Sessions authenticated with an
    /// unusable key are not resumed.
    fn is_usable(&self) -> bool {
        true
    }
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Get the public key for this exchange.
    fn pub_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Get the named group for this exchange.
    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory Traits
// ============================================================================

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating ephemeral keypair.
    /// The provided `buf` will be used to store the public key.
    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification with an encoded peer public key.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify `signature` over `data` made with `scheme`.
    fn verify_signature(
        &self,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String>;

    /// Whether `scheme` can be verified at all.
    fn supports(&self, scheme: SignatureScheme) -> bool;
}

/// Private key loader and generator (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;

    /// Generate a fresh signing key on the curve of `group`.
    fn generate_key(&self, group: NamedGroup) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;
}

/// PRF (Pseudo-Random Function) for key derivation before TLS 1.3.
pub trait PrfProvider: CryptoSafe {
    /// TLS 1.2 PRF: PRF(secret, label, seed) writing output to `out`.
    /// Uses `scratch` for temporary concatenation of label+seed.
    #[allow(clippy::too_many_arguments)]
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
        hash: HashAlgorithm,
    ) -> Result<(), String>;

    /// TLS 1.0/1.1 PRF: P_MD5 over one half of the secret XOR P_SHA1 over
    /// the other half.
    fn prf_tls10(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
    ) -> Result<(), String>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC with `hash` over `data`, writing the tag to `out`.
    fn hmac(&self, hash: HashAlgorithm, key: &[u8], data: &[u8], out: &mut Buf)
        -> Result<(), String>;
}

/// HKDF provider for TLS 1.3 key derivation (RFC 5869).
pub trait HkdfProvider: CryptoSafe {
    /// HKDF-Extract: Extract a pseudorandom key from input keying material.
    /// PRK = HKDF-Extract(salt, IKM)
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// HKDF-Expand: Expand a pseudorandom key to the desired length.
    /// OKM = HKDF-Expand(PRK, info, L)
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;

    /// HKDF-Expand-Label (RFC 8446 Section 7.1, RFC 9147 Section 5.9).
    ///
    /// `prefix` is `"tls13 "` for TLS and `"dtls13"` for DTLS.
    ///
    /// ```text
    /// HkdfLabel = struct {
    ///     uint16 length;
    ///     opaque label<7..255> = prefix + Label;
    ///     opaque context<0..255> = Context;
    /// }
    /// ```
    #[allow(clippy::too_many_arguments)]
    fn hkdf_expand_label(
        &self,
        hash: HashAlgorithm,
        prefix: &[u8],
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        let full_label_len = prefix.len() + label.len();

        if full_label_len > 255 {
            return Err("Label too long for HKDF-Expand-Label".to_string());
        }
        if context.len() > 255 {
            return Err("Context too long for HKDF-Expand-Label".to_string());
        }
        if output_len > 65535 {
            return Err("Output length too large for HKDF-Expand-Label".to_string());
        }

        let mut info = Vec::with_capacity(4 + full_label_len + context.len());
        info.extend_from_slice(&(output_len as u16).to_be_bytes());
        info.push(full_label_len as u8);
        info.extend_from_slice(prefix);
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        self.hkdf_expand(hash, secret, &info, out, output_len)
    }
}

// ============================================================================
// Certificate Trust
// ============================================================================

/// What the trust collaborator may know about the connection.
#[derive(Debug, Clone, Copy)]
pub struct PeerContext<'a> {
    /// Our role. A client checks a server chain and vice versa.
    pub role: Role,
    pub version: ProtocolVersion,
    /// Host name the client asked for, if any.
    pub server_name: Option<&'a str>,
    /// Endpoint identification algorithm configured for the connection.
    pub endpoint_identification: Option<&'a str>,
}

/// A public key taken from a peer's end-entity certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPublicKey {
    pub algorithm: SignatureAlgorithm,
    /// Curve of an EC key.
    pub group: Option<NamedGroup>,
    /// Encoded key handed to the [`SignatureVerifier`].
    pub key: Buf,
}

/// Certificate chain evaluation.
///
/// Parsing certificate structures and path validation are not done by the
/// handshake core. The trust collaborator receives each certificate entry
/// exactly as it was carried on the wire.
pub trait CertificateTrust: CryptoSafe {
    /// Decide whether the peer chain is trusted for `auth_type`
    /// (for example `"ECDHE_ECDSA"`, or `"TLS13"` for TLS 1.3).
    fn check_peer_trusted(
        &self,
        chain: &[Buf],
        auth_type: &str,
        peer: &PeerContext<'_>,
    ) -> Result<(), CertificateError>;

    /// Extract the public key from an end-entity certificate entry.
    fn public_key(&self, end_entity: &[u8]) -> Result<PeerPublicKey, CertificateError>;

    /// Check a stapled OCSP response for the end-entity certificate.
    ///
    /// [`CertificateError::BadStatusResponse`] aborts the handshake. Any
    /// other error means the response could not be understood and is
    /// ignored.
    fn check_status_response(
        &self,
        _end_entity: &[u8],
        _response: &[u8],
    ) -> Result<(), CertificateError> {
        Ok(())
    }
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the handshake.
///
/// The provider uses static trait object references (`&'static dyn Trait`)
/// so it is cheap to clone into every configuration.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported key exchange groups, most preferred first.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification with peer public keys.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Key provider for loading and generating private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for the handshake transcript.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for binders and TLS 1.3 Finished.
    pub hmac_provider: &'static dyn HmacProvider,

    /// PRF for key derivation before TLS 1.3.
    pub prf_provider: &'static dyn PrfProvider,

    /// HKDF provider for the TLS 1.3 key schedule.
    pub hkdf_provider: &'static dyn HkdfProvider,
}

/// Static storage for the default crypto provider.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no
    /// explicit provider is set.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Find the key exchange group for `group`.
    pub fn kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().find(|g| g.name() == group).copied()
    }

    /// Hash `data` in one go.
    pub fn digest(&self, hash: HashAlgorithm, data: &[u8]) -> Result<Buf, String> {
        let mut ctx = self.hash_provider.create_hash(hash)?;
        ctx.update(data);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        Ok(out)
    }

    /// Fill a fresh buffer of `len` random bytes.
    pub fn random_bytes(&self, len: usize) -> Result<Buf, String> {
        let mut out = Buf::new();
        out.resize(len, 0);
        self.secure_random.fill(&mut out)?;
        Ok(out)
    }

    /// Check that the provider covers what the handshake needs.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.kx_groups.is_empty() {
            return Err("No key exchange groups".to_string());
        }
        for hash in [HashAlgorithm::SHA256, HashAlgorithm::SHA384] {
            self.hash_provider.create_hash(hash)?;
        }
        Ok(())
    }
}
