//! Handshake transcript.
//!
//! The transcript records every handshake message as (type, sequence,
//! body) and renders the hashed form on demand. This matters for datagram
//! handshakes: DTLS 1.0/1.2 hash the full 12 byte handshake header while
//! DTLS 1.3 hashes the TLS style 4 byte header, and a client that offers
//! both only learns which one applies from the ServerHello.
//!
//! Hash algorithms are not fixed up front either. TLS 1.0/1.1 need MD5 and
//! SHA-1 digests, TLS 1.2 and 1.3 the suite hash.

use crate::buffer::Buf;
use crate::crypto::provider::HashProvider;
use crate::types::{HandshakeType, HashAlgorithm, ProtocolVersion};

#[derive(Clone)]
struct Entry {
    msg_type: u8,
    seq: u16,
    body: Buf,
}

/// Running handshake transcript.
#[derive(Clone, Default)]
pub struct HandshakeHash {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for HandshakeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeHash")
            .field("messages", &self.entries.len())
            .finish()
    }
}

fn uses_dtls_header(version: ProtocolVersion) -> bool {
    matches!(version, ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2)
}

impl HandshakeHash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one handshake message.
    pub fn update(&mut self, msg_type: HandshakeType, seq: u16, body: &[u8]) {
        self.entries.push(Entry {
            msg_type: msg_type.as_u8(),
            seq,
            body: Buf::from_slice(body),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the hashed byte form for `version`.
    pub fn render(&self, version: ProtocolVersion, out: &mut Buf) {
        for e in &self.entries {
            render_entry(e, version, out);
        }
    }

    /// Hash of the transcript.
    pub fn digest(
        &self,
        provider: &dyn HashProvider,
        hash: HashAlgorithm,
        version: ProtocolVersion,
    ) -> Result<Buf, String> {
        self.digest_with(provider, hash, version, &[])
    }

    /// Hash of the transcript followed by `tail`.
    ///
    /// `tail` is raw bytes already in rendered form, such as a partial
    /// ClientHello for a PSK binder.
    pub fn digest_with(
        &self,
        provider: &dyn HashProvider,
        hash: HashAlgorithm,
        version: ProtocolVersion,
        tail: &[u8],
    ) -> Result<Buf, String> {
        let mut ctx = provider.create_hash(hash)?;
        let mut scratch = Buf::new();
        for e in &self.entries {
            scratch.clear();
            render_entry(e, version, &mut scratch);
            ctx.update(&scratch);
        }
        ctx.update(tail);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        Ok(out)
    }

    /// Replace the transcript with a synthetic message_hash message.
    ///
    /// Used on HelloRetryRequest (RFC 8446 Section 4.4.1): the first
    /// ClientHello is replaced by `message_hash(254) 00 00 Hash.length
    /// Hash(ClientHello1)`.
    pub fn replace_with_message_hash(
        &mut self,
        provider: &dyn HashProvider,
        hash: HashAlgorithm,
        version: ProtocolVersion,
    ) -> Result<(), String> {
        let digest = self.digest(provider, hash, version)?;
        self.entries.clear();
        self.update(HandshakeType::MessageHash, 0, &digest);
        Ok(())
    }
}

fn render_entry(e: &Entry, version: ProtocolVersion, out: &mut Buf) {
    let len = (e.body.len() as u32).to_be_bytes();
    out.push(e.msg_type);
    out.extend_from_slice(&len[1..]);
    if uses_dtls_header(version) {
        // message_seq, fragment_offset = 0, fragment_length = length
        out.extend_from_slice(&e.seq.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&len[1..]);
    }
    out.extend_from_slice(&e.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    #[test]
    fn header_form_follows_version() {
        let mut t = HandshakeHash::new();
        t.update(HandshakeType::ClientHello, 3, &[0xAA, 0xBB]);

        let mut tls = Buf::new();
        t.render(ProtocolVersion::DTLS1_3, &mut tls);
        assert_eq!(&*tls, &[1, 0, 0, 2, 0xAA, 0xBB]);

        let mut dtls = Buf::new();
        t.render(ProtocolVersion::DTLS1_2, &mut dtls);
        assert_eq!(
            &*dtls,
            &[1, 0, 0, 2, 0, 3, 0, 0, 0, 0, 0, 2, 0xAA, 0xBB]
        );
    }

    #[test]
    fn digest_with_tail_equals_full_digest() {
        let p = default_provider();
        let mut t = HandshakeHash::new();
        t.update(HandshakeType::ClientHello, 0, b"hello");
        let mut full = t.clone();
        full.update(HandshakeType::ServerHello, 0, b"world");

        let tail = [2, 0, 0, 5, b'w', b'o', b'r', b'l', b'd'];
        let a = t
            .digest_with(p.hash_provider, HashAlgorithm::SHA256, ProtocolVersion::TLS1_3, &tail)
            .unwrap();
        let b = full
            .digest(p.hash_provider, HashAlgorithm::SHA256, ProtocolVersion::TLS1_3)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn message_hash_replacement() {
        let p = default_provider();
        let mut t = HandshakeHash::new();
        t.update(HandshakeType::ClientHello, 0, b"first hello");
        let ch_hash = t
            .digest(p.hash_provider, HashAlgorithm::SHA256, ProtocolVersion::TLS1_3)
            .unwrap();
        let before = t.clone();

        t.replace_with_message_hash(p.hash_provider, HashAlgorithm::SHA256, ProtocolVersion::TLS1_3)
            .unwrap();
        let mut rendered = Buf::new();
        t.render(ProtocolVersion::TLS1_3, &mut rendered);
        assert_eq!(&rendered[..4], &[254, 0, 0, 32]);
        assert_eq!(&rendered[4..], &ch_hash[..]);
        assert_eq!(before.len(), 1);
        assert_eq!(t.len(), 1);
    }
}
