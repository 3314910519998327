//! Finished verify_data for every key schedule generation.

use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::prf;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::transcript::HandshakeHash;
use crate::error::ProtocolFault;
use crate::types::{HashAlgorithm, ProtocolVersion, Role};

const SSL3_PAD1: u8 = 0x36;
const SSL3_PAD2: u8 = 0x5c;

/// Which Finished construction a protocol version uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheduleScheme {
    Ssl30,
    Tls10,
    Tls12,
    Tls13,
}

impl KeyScheduleScheme {
    pub fn for_version(version: ProtocolVersion) -> Option<Self> {
        match version.legacy_equivalent() {
            ProtocolVersion::SSL3_0 => Some(KeyScheduleScheme::Ssl30),
            ProtocolVersion::TLS1_0 | ProtocolVersion::TLS1_1 => Some(KeyScheduleScheme::Tls10),
            ProtocolVersion::TLS1_2 => Some(KeyScheduleScheme::Tls12),
            ProtocolVersion::TLS1_3 => Some(KeyScheduleScheme::Tls13),
            _ => None,
        }
    }

    /// Length of verify_data. `hash` is the suite hash.
    pub fn verify_data_len(&self, hash: HashAlgorithm) -> usize {
        match self {
            KeyScheduleScheme::Ssl30 => 36,
            KeyScheduleScheme::Tls10 | KeyScheduleScheme::Tls12 => 12,
            KeyScheduleScheme::Tls13 => hash.output_len(),
        }
    }

    /// Compute verify_data.
    ///
    /// When producing, the sender is our own role. When validating a
    /// received Finished, the sender is the peer.
    pub fn create_verify_data(
        &self,
        input: &VerifyDataInput<'_>,
        is_validation: bool,
    ) -> Result<Buf, ProtocolFault> {
        let sender = if is_validation {
            input.role.peer()
        } else {
            input.role
        };

        let r = match self {
            KeyScheduleScheme::Ssl30 => ssl3_verify_data(input, sender),
            KeyScheduleScheme::Tls10 => tls10_verify_data(input, sender),
            KeyScheduleScheme::Tls12 => tls12_verify_data(input, sender),
            KeyScheduleScheme::Tls13 => tls13_verify_data(input, sender),
        };
        r.map_err(ProtocolFault::internal_error)
    }

    /// Check a received verify_data.
    pub fn validate(&self, input: &VerifyDataInput<'_>, received: &[u8]) -> Result<(), ProtocolFault> {
        let expected = self.create_verify_data(input, true)?;
        if received.len() != expected.len() {
            return Err(ProtocolFault::decode_error(format!(
                "Finished verify_data length {} (expected {})",
                received.len(),
                expected.len()
            )));
        }
        if !bool::from(expected.ct_eq(received)) {
            return Err(ProtocolFault::decrypt_error("Finished verify_data mismatch"));
        }
        Ok(())
    }
}

/// Everything verify_data is computed from.
pub struct VerifyDataInput<'a> {
    pub provider: &'a CryptoProvider,
    pub version: ProtocolVersion,
    /// The suite PRF/HKDF hash.
    pub hash: HashAlgorithm,
    pub role: Role,
    /// Messages up to, but not including, the Finished in question.
    pub transcript: &'a HandshakeHash,
    /// Master secret before TLS 1.3.
    pub master_secret: &'a [u8],
    /// TLS 1.3 handshake traffic secrets, the Finished base keys.
    pub client_base_key: &'a [u8],
    pub server_base_key: &'a [u8],
}

fn ssl3_verify_data(input: &VerifyDataInput<'_>, sender: Role) -> Result<Buf, String> {
    let sender_bytes: &[u8] = match sender {
        Role::Client => b"CLNT",
        Role::Server => b"SRVR",
    };
    let mut rendered = Buf::new();
    input.transcript.render(input.version, &mut rendered);

    let mut out = Buf::with_capacity(36);
    for (hash, pad_len) in [(HashAlgorithm::MD5, 48), (HashAlgorithm::SHA1, 40)] {
        let hasher = input.provider.hash_provider;

        let mut inner = hasher.create_hash(hash)?;
        inner.update(&rendered);
        inner.update(sender_bytes);
        inner.update(input.master_secret);
        inner.update(&vec![SSL3_PAD1; pad_len]);
        let mut inner_digest = Buf::new();
        inner.clone_and_finalize(&mut inner_digest);

        let mut outer = hasher.create_hash(hash)?;
        outer.update(input.master_secret);
        outer.update(&vec![SSL3_PAD2; pad_len]);
        outer.update(&inner_digest);
        let mut digest = Buf::new();
        outer.clone_and_finalize(&mut digest);
        out.extend_from_slice(&digest);
    }
    Ok(out)
}

fn finished_label(sender: Role) -> &'static str {
    match sender {
        Role::Client => "client finished",
        Role::Server => "server finished",
    }
}

fn tls10_verify_data(input: &VerifyDataInput<'_>, sender: Role) -> Result<Buf, String> {
    let seed = prf::session_hash(input.provider, input.transcript, input.version, input.hash)?;
    prf::prf(
        input.provider,
        input.version,
        input.hash,
        input.master_secret,
        finished_label(sender),
        &seed,
        12,
    )
}

fn tls12_verify_data(input: &VerifyDataInput<'_>, sender: Role) -> Result<Buf, String> {
    let seed = input
        .transcript
        .digest(input.provider.hash_provider, input.hash, input.version)?;
    prf::prf(
        input.provider,
        input.version,
        input.hash,
        input.master_secret,
        finished_label(sender),
        &seed,
        12,
    )
}

fn tls13_verify_data(input: &VerifyDataInput<'_>, sender: Role) -> Result<Buf, String> {
    let base_key = match sender {
        Role::Client => input.client_base_key,
        Role::Server => input.server_base_key,
    };
    if base_key.is_empty() {
        return Err("No handshake traffic secret".to_string());
    }
    let ks = KeySchedule::new(input.provider, input.hash, input.version, None)?;
    let finished_key = ks.finished_key(base_key)?;
    let transcript_hash = input
        .transcript
        .digest(input.provider.hash_provider, input.hash, input.version)?;
    let mut out = Buf::new();
    input
        .provider
        .hmac_provider
        .hmac(input.hash, &finished_key, &transcript_hash, &mut out)?;
    Ok(out)
}
