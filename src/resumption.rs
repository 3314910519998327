//! PSK binders and the resumption gates.
//!
//! A TLS 1.3 ClientHello offering a PSK carries one binder per identity.
//! The binder is an HMAC keyed from the PSK over the transcript up to and
//! including the ClientHello, truncated before the binders list:
//!
//! ```text
//! binder_key   = Derive-Secret(Early Secret(psk), "res binder", "")
//! finished_key = HKDF-Expand-Label(binder_key, "finished", "", Hash.length)
//! binder       = HMAC(finished_key, Hash(prior transcript || truncated ClientHello))
//! ```
//!
//! Both sides compute it over the exact bytes that are on the wire, never a
//! re-serialization.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::codec::put_u24;
use crate::config::ClientAuth;
use crate::context::HandshakeContext;
use crate::crypto::{CryptoProvider, HandshakeHash, KeySchedule};
use crate::error::ProtocolFault;
use crate::session::Session;
use crate::types::{HandshakeType, HashAlgorithm, ProtocolVersion};

/// The rendered ClientHello up to, not including, the binders list.
///
/// `body` is the full ClientHello body. `binders_len` includes the 2 byte
/// length of the list. The handshake header keeps the full body length.
pub(crate) fn truncated_client_hello(body: &[u8], binders_len: usize) -> Option<Buf> {
    let cut = body.len().checked_sub(binders_len)?;
    let mut out = Buf::with_capacity(4 + cut);
    out.push(HandshakeType::ClientHello.as_u8());
    put_u24(&mut out, body.len() as u32);
    out.extend_from_slice(&body[..cut]);
    Some(out)
}

/// Compute the binder of `psk` over `transcript` followed by `tail`.
pub(crate) fn compute_binder(
    provider: &CryptoProvider,
    hash: HashAlgorithm,
    version: ProtocolVersion,
    psk: &[u8],
    transcript: &HandshakeHash,
    tail: &[u8],
) -> Result<Buf, String> {
    let ks = KeySchedule::new(provider, hash, version, Some(psk))?;
    let binder_key = ks.binder_key()?;
    let finished_key = ks.finished_key(&binder_key)?;
    let digest = transcript.digest_with(provider.hash_provider, hash, version, tail)?;

    let mut out = Buf::new();
    provider
        .hmac_provider
        .hmac(hash, &finished_key, &digest, &mut out)?;
    Ok(out)
}

/// Check a received binder in constant time.
pub(crate) fn validate_binder(
    provider: &CryptoProvider,
    hash: HashAlgorithm,
    version: ProtocolVersion,
    psk: &[u8],
    transcript: &HandshakeHash,
    tail: &[u8],
    received: &[u8],
) -> Result<(), ProtocolFault> {
    let expected = compute_binder(provider, hash, version, psk, transcript, tail)
        .map_err(ProtocolFault::internal_error)?;
    if expected.len() != received.len() || !bool::from(expected.ct_eq(received)) {
        return Err(ProtocolFault::illegal_parameter("PSK binder mismatch"));
    }
    Ok(())
}

/// Whether `session` may be resumed on this handshake.
///
/// These are silent disqualifications: the session is just not used. The
/// error names the gate that failed.
pub(crate) fn check_gates(ctx: &HandshakeContext, session: &Arc<Session>) -> Result<(), &'static str> {
    let version = session.version();
    let version_ok = if ctx.is_client() {
        ctx.active_versions.contains(&version)
    } else {
        version == ctx.version
    };
    if !version_ok {
        return Err("version");
    }

    if !ctx.is_client() && ctx.config.client_auth() == ClientAuth::Required {
        if !session.has_peer_principal() {
            return Err("client authentication");
        }
        let ours = ctx.config.signature_schemes();
        if !session.local_schemes().iter().all(|s| ours.contains(s)) {
            return Err("signature schemes");
        }
    }

    if session.endpoint_identification() != ctx.config.endpoint_identification() {
        return Err("endpoint identification");
    }

    let suite = session.suite();
    let enabled = ctx.config.cipher_suites().iter().any(|s| s.id == suite.id);
    if !suite.is_negotiable() || !enabled || !suite.is_available(version) {
        return Err("cipher suite");
    }
    if !ctx.is_client() {
        if !ctx.peer_suites.contains(&suite.id) {
            return Err("cipher suite");
        }
        // 1.3 may resume under another suite with the same hash.
        if version.uses_tls13_key_schedule() && ctx.suite.map(|s| s.hash) != Some(suite.hash) {
            return Err("cipher suite");
        }
    }

    Ok(())
}
