//! Bulk cipher and MAC properties, and record expansion arithmetic.

use crate::types::ProtocolVersion;

/// How a bulk cipher protects a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherType {
    Null,
    Stream,
    Block,
    Aead,
}

/// Bulk encryption algorithms known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BulkCipher {
    Null,
    Rc4_40,
    Rc2_40,
    Des_40,
    Rc4_128,
    Des,
    TripleDes,
    Idea,
    Aes128,
    Aes256,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl BulkCipher {
    pub fn name(&self) -> &'static str {
        match self {
            BulkCipher::Null => "NULL",
            BulkCipher::Rc4_40 => "RC4_40",
            BulkCipher::Rc2_40 => "RC2_40",
            BulkCipher::Des_40 => "DES_40",
            BulkCipher::Rc4_128 => "RC4_128",
            BulkCipher::Des => "DES",
            BulkCipher::TripleDes => "3DES",
            BulkCipher::Idea => "IDEA",
            BulkCipher::Aes128 => "AES_128",
            BulkCipher::Aes256 => "AES_256",
            BulkCipher::Aes128Gcm => "AES_128_GCM",
            BulkCipher::Aes256Gcm => "AES_256_GCM",
            BulkCipher::ChaCha20Poly1305 => "CHACHA20_POLY1305",
        }
    }

    pub fn cipher_type(&self) -> CipherType {
        match self {
            BulkCipher::Null => CipherType::Null,
            BulkCipher::Rc4_40 | BulkCipher::Rc4_128 => CipherType::Stream,
            BulkCipher::Rc2_40
            | BulkCipher::Des_40
            | BulkCipher::Des
            | BulkCipher::TripleDes
            | BulkCipher::Idea
            | BulkCipher::Aes128
            | BulkCipher::Aes256 => CipherType::Block,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305 => {
                CipherType::Aead
            }
        }
    }

    /// Key bytes taken from the key block.
    pub fn key_size(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Rc4_40 | BulkCipher::Rc2_40 | BulkCipher::Des_40 => 5,
            BulkCipher::Rc4_128 | BulkCipher::Idea | BulkCipher::Aes128 => 16,
            BulkCipher::Des => 8,
            BulkCipher::TripleDes => 24,
            BulkCipher::Aes256 => 32,
            BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305 => 32,
        }
    }

    /// Key size after export expansion.
    pub fn expanded_key_size(&self) -> usize {
        match self {
            BulkCipher::Rc4_40 | BulkCipher::Rc2_40 => 16,
            BulkCipher::Des_40 => 8,
            _ => self.key_size(),
        }
    }

    /// Full IV (or AEAD nonce) size.
    pub fn iv_size(&self) -> usize {
        match self {
            BulkCipher::Null | BulkCipher::Rc4_40 | BulkCipher::Rc4_128 => 0,
            BulkCipher::Rc2_40
            | BulkCipher::Des_40
            | BulkCipher::Des
            | BulkCipher::TripleDes
            | BulkCipher::Idea => 8,
            BulkCipher::Aes128 | BulkCipher::Aes256 => 16,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305 => 12,
        }
    }

    /// Implicit part of an AEAD nonce taken from the TLS 1.2 key block.
    pub fn fixed_iv_size(&self) -> usize {
        match self {
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
            BulkCipher::ChaCha20Poly1305 => 12,
            _ => 0,
        }
    }

    pub fn block_size(&self) -> usize {
        match self.cipher_type() {
            CipherType::Block => self.iv_size(),
            _ => 0,
        }
    }

    pub fn tag_size(&self) -> usize {
        match self.cipher_type() {
            CipherType::Aead => 16,
            _ => 0,
        }
    }

    pub fn is_exportable(&self) -> bool {
        matches!(
            self,
            BulkCipher::Rc4_40 | BulkCipher::Rc2_40 | BulkCipher::Des_40
        )
    }

    /// Explicit nonce bytes carried in each AEAD record.
    ///
    /// Only the 1.2 generation carries one. From 1.3 on the nonce is fully
    /// derived from the sequence number.
    pub fn record_iv_size(&self, version: ProtocolVersion) -> usize {
        if self.cipher_type() != CipherType::Aead || version.uses_tls13_key_schedule() {
            return 0;
        }
        self.iv_size() - self.fixed_iv_size()
    }
}

/// Record MAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    Null,
    Md5,
    Sha1,
    Sha256,
    Sha384,
}

impl MacAlgorithm {
    pub fn size(&self) -> usize {
        match self {
            MacAlgorithm::Null => 0,
            MacAlgorithm::Md5 => 16,
            MacAlgorithm::Sha1 => 20,
            MacAlgorithm::Sha256 => 32,
            MacAlgorithm::Sha384 => 48,
        }
    }
}

/// Record header size for a version.
///
/// TLS records have a 5 byte header, DTLS 1.0/1.2 add epoch and sequence
/// number for 13 bytes. DTLS 1.3 ciphertext uses the unified header with a
/// 16-bit sequence number and explicit length.
pub fn header_size(version: ProtocolVersion) -> usize {
    match version {
        ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 => 13,
        _ => 5,
    }
}

/// Size of the protected record carrying `fragment` plaintext bytes.
pub fn packet_size(
    bulk: BulkCipher,
    mac: MacAlgorithm,
    version: ProtocolVersion,
    fragment: usize,
) -> usize {
    let header = header_size(version);
    match bulk.cipher_type() {
        CipherType::Null | CipherType::Stream => fragment + header + mac.size(),
        CipherType::Block => {
            let block = bulk.block_size();
            // mac + one byte of padding length, rounded up to whole blocks
            let mut padded = fragment + mac.size() + 1;
            if padded % block != 0 {
                padded += block - (padded % block);
            }
            if version.has_explicit_iv() {
                padded += block;
            }
            header + padded
        }
        CipherType::Aead => {
            let mut size = fragment + header + bulk.record_iv_size(version) + bulk.tag_size();
            if version.uses_tls13_key_schedule() {
                // inner content type
                size += 1;
            }
            size
        }
    }
}

/// Largest plaintext fragment whose protected record fits in `packet` bytes.
pub fn fragment_size(
    bulk: BulkCipher,
    mac: MacAlgorithm,
    version: ProtocolVersion,
    packet: usize,
) -> usize {
    let header = header_size(version);
    match bulk.cipher_type() {
        CipherType::Null | CipherType::Stream => {
            packet.saturating_sub(header).saturating_sub(mac.size())
        }
        CipherType::Block => {
            let block = bulk.block_size();
            let mut frag = packet.saturating_sub(header);
            if version.has_explicit_iv() {
                frag = frag.saturating_sub(block);
            }
            frag -= frag % block;
            frag.saturating_sub(1).saturating_sub(mac.size())
        }
        CipherType::Aead => {
            let mut frag = packet
                .saturating_sub(header)
                .saturating_sub(bulk.record_iv_size(version))
                .saturating_sub(bulk.tag_size());
            if version.uses_tls13_key_schedule() {
                frag = frag.saturating_sub(1);
            }
            frag
        }
    }
}
