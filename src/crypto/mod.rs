//! Cryptographic capabilities and the derivations built on them.
//!
//! [`provider`] defines the capability traits. Everything else here is
//! handshake logic over those traits: the transcript, the pre-1.3 PRF
//! derivations, the TLS 1.3 key schedule and Finished verify_data.

pub mod provider;
pub mod rust_crypto;

mod finished;
mod key_schedule;
pub(crate) mod prf;
mod transcript;

pub use provider::{ActiveKeyExchange, CryptoProvider, CryptoSafe, HashContext, HashProvider};
pub use provider::{CertificateTrust, PeerContext, PeerPublicKey};
pub use provider::{HkdfProvider, HmacProvider, KeyProvider, PrfProvider};
pub use provider::{SecureRandom, SignatureVerifier, SigningKey, SupportedKxGroup};
pub use rust_crypto::PinnedKeyTrust;
pub use transcript::HandshakeHash;

pub(crate) use finished::{KeyScheduleScheme, VerifyDataInput};
pub(crate) use key_schedule::KeySchedule;
pub use prf::KeyBlock;

// Re-export shared types for provider trait implementations
pub use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureScheme};
