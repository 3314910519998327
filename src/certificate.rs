//! Local credentials: a certificate chain with its signing key.
//!
//! The handshake treats certificate entries as opaque bytes. The helpers
//! here build raw public key credentials (RFC 7250 style), where the single
//! chain entry is the encoded public key itself. These pair with
//! [`PinnedKeyTrust`](crate::crypto::PinnedKeyTrust) on the other side.

use std::fmt;
use std::sync::Arc;

use crate::buffer::Buf;
use crate::crypto::{CryptoProvider, SigningKey};
use crate::types::NamedGroup;
use crate::Error;

/// A certificate chain and the private key of its end-entity certificate.
#[derive(Clone)]
pub struct CertifiedKey {
    /// Certificate entries, end-entity first.
    pub chain: Vec<Buf>,
    pub key: Arc<dyn SigningKey>,
}

impl CertifiedKey {
    pub fn new(chain: Vec<Buf>, key: Arc<dyn SigningKey>) -> Result<Self, Error> {
        if chain.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(CertifiedKey { chain, key })
    }

    /// Generate a fresh key on the curve of `group` with a raw public key chain.
    pub fn generate(provider: &CryptoProvider, group: NamedGroup) -> Result<Self, Error> {
        let key = provider
            .key_provider
            .generate_key(group)
            .map_err(Error::Crypto)?;
        Ok(Self::raw(key.into()))
    }

    /// Load a DER private key and pair it with a raw public key chain.
    pub fn from_private_key(provider: &CryptoProvider, key_der: &[u8]) -> Result<Self, Error> {
        let key = provider
            .key_provider
            .load_private_key(key_der)
            .map_err(Error::Crypto)?;
        Ok(Self::raw(key.into()))
    }

    fn raw(key: Arc<dyn SigningKey>) -> Self {
        CertifiedKey {
            chain: vec![Buf::from_slice(key.public_key())],
            key,
        }
    }

    pub fn end_entity(&self) -> &[u8] {
        &self.chain[0]
    }
}

impl fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("chain", &self.chain.len())
            .field("algorithm", &self.key.algorithm())
            .finish()
    }
}
