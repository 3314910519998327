//! Declarative cipher suite table.
//!
//! Declaration order is preference order.

use super::bulk::{BulkCipher, MacAlgorithm};
use super::{CipherSuiteDescriptor, KeyExchange};
use crate::types::HashAlgorithm;
use crate::types::ProtocolVersion::{self, *};

const TLS13: &[ProtocolVersion] = &[TLS1_3, DTLS1_3];
const TLS12: &[ProtocolVersion] = &[TLS1_2, DTLS1_2];
// ECC suites exist from TLS 1.0 (RFC 4492)
const TO_12_ECC: &[ProtocolVersion] = &[TLS1_2, TLS1_1, TLS1_0, DTLS1_2, DTLS1_0];
const TO_12: &[ProtocolVersion] = &[TLS1_2, TLS1_1, TLS1_0, SSL3_0, DTLS1_2, DTLS1_0];
const NONE: &[ProtocolVersion] = &[];

macro_rules! suite {
    (
        $id:expr, $name:expr, $aliases:expr, $default:expr, $kx:expr,
        $bulk:expr, $mac:expr, $hash:expr, $versions:expr
    ) => {
        CipherSuiteDescriptor {
            id: $id,
            name: $name,
            aliases: $aliases,
            default_enabled: $default,
            key_exchange: $kx,
            bulk_cipher: $bulk,
            mac: $mac,
            hash: $hash,
            versions: $versions,
        }
    };
}

use BulkCipher as B;
use HashAlgorithm::{SHA256, SHA384};
use KeyExchange as K;
use MacAlgorithm as M;

pub(super) static SUITES: &[CipherSuiteDescriptor] = &[
    // TLS 1.3
    suite!(0x1301, "TLS_AES_128_GCM_SHA256", &[], true, None, B::Aes128Gcm, M::Null, SHA256, TLS13),
    suite!(0x1302, "TLS_AES_256_GCM_SHA384", &[], true, None, B::Aes256Gcm, M::Null, SHA384, TLS13),
    suite!(0x1303, "TLS_CHACHA20_POLY1305_SHA256", &[], true, None, B::ChaCha20Poly1305, M::Null, SHA256, TLS13),

    // AEAD with forward secrecy
    suite!(0xC02C, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", &[], true, Some(K::EcdheEcdsa), B::Aes256Gcm, M::Null, SHA384, TLS12),
    suite!(0xC030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", &[], true, Some(K::EcdheRsa), B::Aes256Gcm, M::Null, SHA384, TLS12),
    suite!(0xCCA9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", &[], true, Some(K::EcdheEcdsa), B::ChaCha20Poly1305, M::Null, SHA256, TLS12),
    suite!(0xCCA8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", &[], true, Some(K::EcdheRsa), B::ChaCha20Poly1305, M::Null, SHA256, TLS12),
    suite!(0xC02B, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", &[], true, Some(K::EcdheEcdsa), B::Aes128Gcm, M::Null, SHA256, TLS12),
    suite!(0xC02F, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", &[], true, Some(K::EcdheRsa), B::Aes128Gcm, M::Null, SHA256, TLS12),
    suite!(0x009F, "TLS_DHE_RSA_WITH_AES_256_GCM_SHA384", &[], false, Some(K::DheRsa), B::Aes256Gcm, M::Null, SHA384, TLS12),
    suite!(0xCCAA, "TLS_DHE_RSA_WITH_CHACHA20_POLY1305_SHA256", &[], false, Some(K::DheRsa), B::ChaCha20Poly1305, M::Null, SHA256, TLS12),
    suite!(0x009E, "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256", &[], false, Some(K::DheRsa), B::Aes128Gcm, M::Null, SHA256, TLS12),

    // CBC with forward secrecy, TLS 1.2 MACs
    suite!(0xC024, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384", &[], true, Some(K::EcdheEcdsa), B::Aes256, M::Sha384, SHA384, TLS12),
    suite!(0xC028, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384", &[], true, Some(K::EcdheRsa), B::Aes256, M::Sha384, SHA384, TLS12),
    suite!(0xC023, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", &[], true, Some(K::EcdheEcdsa), B::Aes128, M::Sha256, SHA256, TLS12),
    suite!(0xC027, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", &[], true, Some(K::EcdheRsa), B::Aes128, M::Sha256, SHA256, TLS12),
    suite!(0x006B, "TLS_DHE_RSA_WITH_AES_256_CBC_SHA256", &[], false, Some(K::DheRsa), B::Aes256, M::Sha256, SHA256, TLS12),
    suite!(0x0067, "TLS_DHE_RSA_WITH_AES_128_CBC_SHA256", &[], false, Some(K::DheRsa), B::Aes128, M::Sha256, SHA256, TLS12),

    // CBC with forward secrecy, SHA-1 MAC
    suite!(0xC00A, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", &[], true, Some(K::EcdheEcdsa), B::Aes256, M::Sha1, SHA256, TO_12_ECC),
    suite!(0xC014, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", &[], true, Some(K::EcdheRsa), B::Aes256, M::Sha1, SHA256, TO_12_ECC),
    suite!(0xC009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", &[], true, Some(K::EcdheEcdsa), B::Aes128, M::Sha1, SHA256, TO_12_ECC),
    suite!(0xC013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", &[], true, Some(K::EcdheRsa), B::Aes128, M::Sha1, SHA256, TO_12_ECC),
    suite!(0x0039, "TLS_DHE_RSA_WITH_AES_256_CBC_SHA", &[], false, Some(K::DheRsa), B::Aes256, M::Sha1, SHA256, TO_12),
    suite!(0x0033, "TLS_DHE_RSA_WITH_AES_128_CBC_SHA", &[], false, Some(K::DheRsa), B::Aes128, M::Sha1, SHA256, TO_12),

    // RSA key transport, no forward secrecy
    suite!(0x009D, "TLS_RSA_WITH_AES_256_GCM_SHA384", &[], false, Some(K::Rsa), B::Aes256Gcm, M::Null, SHA384, TLS12),
    suite!(0x009C, "TLS_RSA_WITH_AES_128_GCM_SHA256", &[], false, Some(K::Rsa), B::Aes128Gcm, M::Null, SHA256, TLS12),
    suite!(0x003D, "TLS_RSA_WITH_AES_256_CBC_SHA256", &[], false, Some(K::Rsa), B::Aes256, M::Sha256, SHA256, TLS12),
    suite!(0x003C, "TLS_RSA_WITH_AES_128_CBC_SHA256", &[], false, Some(K::Rsa), B::Aes128, M::Sha256, SHA256, TLS12),
    suite!(0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", &[], false, Some(K::Rsa), B::Aes256, M::Sha1, SHA256, TO_12),
    suite!(0x002F, "TLS_RSA_WITH_AES_128_CBC_SHA", &[], false, Some(K::Rsa), B::Aes128, M::Sha1, SHA256, TO_12),
    suite!(0xC008, "TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA", &[], false, Some(K::EcdheEcdsa), B::TripleDes, M::Sha1, SHA256, TO_12_ECC),
    suite!(0x000A, "SSL_RSA_WITH_3DES_EDE_CBC_SHA", &["TLS_RSA_WITH_3DES_EDE_CBC_SHA"], false, Some(K::Rsa), B::TripleDes, M::Sha1, SHA256, TO_12),

    // Signalling value (RFC 5746)
    suite!(0x00FF, "TLS_EMPTY_RENEGOTIATION_INFO_SCSV", &[], false, Some(K::Scsv), B::Null, M::Null, SHA256, TO_12),

    // No encryption
    suite!(0xC006, "TLS_ECDHE_ECDSA_WITH_NULL_SHA", &[], false, Some(K::EcdheEcdsa), B::Null, M::Sha1, SHA256, TO_12_ECC),
    suite!(0x003B, "TLS_RSA_WITH_NULL_SHA256", &[], false, Some(K::Rsa), B::Null, M::Sha256, SHA256, TLS12),
    suite!(0x0002, "SSL_RSA_WITH_NULL_SHA", &["TLS_RSA_WITH_NULL_SHA"], false, Some(K::Rsa), B::Null, M::Sha1, SHA256, TO_12),
    suite!(0x0001, "SSL_RSA_WITH_NULL_MD5", &["TLS_RSA_WITH_NULL_MD5"], false, Some(K::Rsa), B::Null, M::Md5, SHA256, TO_12),

    // Known but unusable
    suite!(0xC007, "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA", &[], false, Some(K::EcdheEcdsa), B::Rc4_128, M::Sha1, SHA256, NONE),
    suite!(0x0005, "SSL_RSA_WITH_RC4_128_SHA", &["TLS_RSA_WITH_RC4_128_SHA"], false, Some(K::Rsa), B::Rc4_128, M::Sha1, SHA256, NONE),
    suite!(0x0004, "SSL_RSA_WITH_RC4_128_MD5", &["TLS_RSA_WITH_RC4_128_MD5"], false, Some(K::Rsa), B::Rc4_128, M::Md5, SHA256, NONE),
    suite!(0x0009, "SSL_RSA_WITH_DES_CBC_SHA", &["TLS_RSA_WITH_DES_CBC_SHA"], false, Some(K::Rsa), B::Des, M::Sha1, SHA256, NONE),
    suite!(0x0007, "TLS_RSA_WITH_IDEA_CBC_SHA", &[], false, Some(K::Rsa), B::Idea, M::Sha1, SHA256, NONE),
    suite!(0x0003, "SSL_RSA_EXPORT_WITH_RC4_40_MD5", &["TLS_RSA_EXPORT_WITH_RC4_40_MD5"], false, Some(K::RsaExport), B::Rc4_40, M::Md5, SHA256, NONE),
    suite!(0x0006, "SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5", &["TLS_RSA_EXPORT_WITH_RC2_CBC_40_MD5"], false, Some(K::RsaExport), B::Rc2_40, M::Md5, SHA256, NONE),
    suite!(0x0008, "SSL_RSA_EXPORT_WITH_DES40_CBC_SHA", &["TLS_RSA_EXPORT_WITH_DES40_CBC_SHA"], false, Some(K::RsaExport), B::Des_40, M::Sha1, SHA256, NONE),
];
