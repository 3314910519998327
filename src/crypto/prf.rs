//! Secret derivation before TLS 1.3.
//!
//! Master secret and key block expansion for SSL 3.0, TLS 1.0/1.1 (and
//! DTLS 1.0) and TLS 1.2 (and DTLS 1.2). Primitive PRF math comes from the
//! [`PrfProvider`](crate::crypto::PrfProvider); SSL 3.0 builds its own
//! MD5/SHA-1 construction from the hash provider.

use crate::buffer::Buf;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::transcript::HandshakeHash;
use crate::types::{HashAlgorithm, ProtocolVersion};

/// Length of every pre-1.3 master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// PRF(secret, label, seed) for the PRF family of `version`.
///
/// `hash` is the suite PRF hash and only matters from TLS 1.2 on.
pub fn prf(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    len: usize,
) -> Result<Buf, String> {
    let mut out = Buf::new();
    let mut scratch = Buf::new();
    match version.legacy_equivalent() {
        ProtocolVersion::TLS1_2 => {
            provider
                .prf_provider
                .prf_tls12(secret, label, seed, &mut out, len, &mut scratch, hash)?;
        }
        ProtocolVersion::TLS1_0 | ProtocolVersion::TLS1_1 => {
            provider
                .prf_provider
                .prf_tls10(secret, label, seed, &mut out, len, &mut scratch)?;
        }
        v => return Err(format!("No PRF for {}", v)),
    }
    Ok(out)
}

/// The session hash for the extended master secret (RFC 7627).
///
/// TLS 1.2 hashes with the suite hash. Earlier versions use MD5 || SHA-1.
pub fn session_hash(
    provider: &CryptoProvider,
    transcript: &HandshakeHash,
    version: ProtocolVersion,
    hash: HashAlgorithm,
) -> Result<Buf, String> {
    if version.legacy_equivalent() == ProtocolVersion::TLS1_2 {
        return transcript.digest(provider.hash_provider, hash, version);
    }
    let mut out = transcript.digest(provider.hash_provider, HashAlgorithm::MD5, version)?;
    let sha = transcript.digest(provider.hash_provider, HashAlgorithm::SHA1, version)?;
    out.extend_from_slice(&sha);
    Ok(out)
}

/// master_secret = PRF(pre_master_secret, "master secret",
///                     ClientHello.random + ServerHello.random)[0..47]
pub fn master_secret(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Buf, String> {
    if version == ProtocolVersion::SSL3_0 {
        return ssl3_expand(
            provider,
            pre_master_secret,
            client_random,
            server_random,
            MASTER_SECRET_LEN,
        );
    }
    let mut seed = Buf::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(
        provider,
        version,
        hash,
        pre_master_secret,
        "master secret",
        &seed,
        MASTER_SECRET_LEN,
    )
}

/// master_secret = PRF(pre_master_secret, "extended master secret",
///                     session_hash)[0..47]
pub fn extended_master_secret(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Buf, String> {
    prf(
        provider,
        version,
        hash,
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
    )
}

/// Keys handed to the record layer before TLS 1.3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBlock {
    pub client_mac_key: Buf,
    pub server_mac_key: Buf,
    pub client_key: Buf,
    pub server_key: Buf,
    pub client_iv: Buf,
    pub server_iv: Buf,
}

/// Expand the master secret into a [`KeyBlock`].
///
/// ```text
/// key_block = PRF(master_secret, "key expansion",
///                 server_random + client_random)
/// ```
#[allow(clippy::too_many_arguments)]
pub fn key_block(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    mac_len: usize,
    key_len: usize,
    iv_len: usize,
) -> Result<KeyBlock, String> {
    let total = 2 * (mac_len + key_len + iv_len);

    let block = if version == ProtocolVersion::SSL3_0 {
        // Note the reversed random order compared to the master secret.
        ssl3_expand(provider, master_secret, server_random, client_random, total)?
    } else {
        let mut seed = Buf::with_capacity(64);
        seed.extend_from_slice(server_random);
        seed.extend_from_slice(client_random);
        prf(provider, version, hash, master_secret, "key expansion", &seed, total)?
    };

    let mut at = 0;
    let mut take = |n: usize| {
        let b = Buf::from_slice(&block[at..at + n]);
        at += n;
        b
    };

    Ok(KeyBlock {
        client_mac_key: take(mac_len),
        server_mac_key: take(mac_len),
        client_key: take(key_len),
        server_key: take(key_len),
        client_iv: take(iv_len),
        server_iv: take(iv_len),
    })
}

/// The SSL 3.0 expansion used both for the master secret and the key block.
///
/// ```text
/// out = MD5(secret + SHA1("A"   + secret + r1 + r2)) +
///       MD5(secret + SHA1("BB"  + secret + r1 + r2)) +
///       MD5(secret + SHA1("CCC" + secret + r1 + r2)) + ...
/// ```
fn ssl3_expand(
    provider: &CryptoProvider,
    secret: &[u8],
    r1: &[u8],
    r2: &[u8],
    len: usize,
) -> Result<Buf, String> {
    let mut out = Buf::with_capacity(len + 16);
    let mut round = 0u8;

    while out.len() < len {
        round += 1;
        if round > 26 {
            return Err("SSLv3 expansion too long".to_string());
        }
        let salt = vec![b'A' + round - 1; round as usize];

        let mut sha = provider.hash_provider.create_hash(HashAlgorithm::SHA1)?;
        sha.update(&salt);
        sha.update(secret);
        sha.update(r1);
        sha.update(r2);
        let mut inner = Buf::new();
        sha.clone_and_finalize(&mut inner);

        let mut md5 = provider.hash_provider.create_hash(HashAlgorithm::MD5)?;
        md5.update(secret);
        md5.update(&inner);
        let mut block = Buf::new();
        md5.clone_and_finalize(&mut block);
        out.extend_from_slice(&block);
    }

    out.truncate(len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::types::HandshakeType;

    #[test]
    fn master_secret_is_48_bytes_for_every_family() {
        let p = default_provider();
        let pms = [0x03u8; 48];
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];
        for v in [
            ProtocolVersion::SSL3_0,
            ProtocolVersion::TLS1_0,
            ProtocolVersion::DTLS1_0,
            ProtocolVersion::TLS1_2,
        ] {
            let ms = master_secret(&p, v, HashAlgorithm::SHA256, &pms, &cr, &sr).unwrap();
            assert_eq!(ms.len(), MASTER_SECRET_LEN, "{}", v);
        }
    }

    #[test]
    fn ssl3_and_tls10_differ() {
        let p = default_provider();
        let pms = [0x03u8; 48];
        let a = master_secret(&p, ProtocolVersion::SSL3_0, HashAlgorithm::SHA256, &pms, &[1; 32], &[2; 32]).unwrap();
        let b = master_secret(&p, ProtocolVersion::TLS1_0, HashAlgorithm::SHA256, &pms, &[1; 32], &[2; 32]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_block_split() {
        let p = default_provider();
        let kb = key_block(
            &p,
            ProtocolVersion::TLS1_2,
            HashAlgorithm::SHA256,
            &[0x44; 48],
            &[1; 32],
            &[2; 32],
            20,
            16,
            4,
        )
        .unwrap();
        assert_eq!(kb.client_mac_key.len(), 20);
        assert_eq!(kb.server_key.len(), 16);
        assert_eq!(kb.server_iv.len(), 4);
        assert_ne!(kb.client_key, kb.server_key);
    }

    #[test]
    fn legacy_session_hash_concatenates_md5_sha1() {
        let p = default_provider();
        let mut t = HandshakeHash::new();
        t.update(HandshakeType::ClientHello, 0, b"hello");
        let h = session_hash(&p, &t, ProtocolVersion::TLS1_1, HashAlgorithm::SHA256).unwrap();
        assert_eq!(h.len(), 36);
        let h = session_hash(&p, &t, ProtocolVersion::TLS1_2, HashAlgorithm::SHA384).unwrap();
        assert_eq!(h.len(), 48);
    }

    #[test]
    fn ssl3_has_no_prf() {
        let p = default_provider();
        assert!(prf(&p, ProtocolVersion::SSL3_0, HashAlgorithm::SHA256, b"s", "l", b"", 12).is_err());
    }
}
