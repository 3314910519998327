//! RustCrypto cryptographic provider implementation.
//!
//! A pure Rust backend built from crates of the
//! [RustCrypto](https://github.com/RustCrypto) organization.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use tlshake::Config;
//! use tlshake::crypto::rust_crypto;
//!
//! let config = Config::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! # let _ = Arc::new(config);
//! ```

mod hash;
mod hkdf;
mod hmac;
mod kx_group;
mod prf;
mod random;
mod sign;
mod trust;

pub use trust::PinnedKeyTrust;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Key Exchange Groups
///
/// - `x25519`
/// - `secp256r1` (P-256, NIST Curve)
/// - `secp384r1` (P-384, NIST Curve)
///
/// # Supported Signature Schemes
///
/// - `ecdsa_secp256r1_sha256`, `ecdsa_secp384r1_sha384`
/// - `ecdsa_sha1` for TLS 1.0 and 1.1
///
/// # Supported Hash Algorithms
///
/// MD5 and SHA-1 (legacy PRF and Finished only), SHA-256, SHA-384, SHA-512.
///
/// # Key Formats
///
/// The key provider loads PKCS#8 DER keys and raw big-endian scalars.
///
/// # Random Number Generation
///
/// Uses `OsRng` from the `rand` crate.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        prf_provider: &prf::PRF_PROVIDER,
        hkdf_provider: &hkdf::HKDF_PROVIDER,
    }
}
