//! Protocol identifiers shared by every part of the handshake.
//!
//! These types represent wire-level protocol elements that are common to
//! the stream (SSL/TLS) and datagram (DTLS) families.

use std::fmt;

use nom::bytes::complete::take;
use nom::error::{make_error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use crate::buffer::Buf;

// ============================================================================
// Role
// ============================================================================

/// Which side of the handshake we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

// ============================================================================
// Protocol Version
// ============================================================================

/// Protocol versions across the stream and datagram families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ProtocolVersion {
    SSL3_0,
    TLS1_0,
    TLS1_1,
    TLS1_2,
    TLS1_3,
    DTLS1_0,
    DTLS1_2,
    DTLS1_3,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0300 => ProtocolVersion::SSL3_0,
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            0x0303 => ProtocolVersion::TLS1_2,
            0x0304 => ProtocolVersion::TLS1_3,
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            0xFEFC => ProtocolVersion::DTLS1_3,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::SSL3_0 => 0x0300,
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::TLS1_2 => 0x0303,
            ProtocolVersion::TLS1_3 => 0x0304,
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::DTLS1_3 => 0xFEFC,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Whether this is a datagram (DTLS) version.
    pub fn is_dtls(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 | ProtocolVersion::DTLS1_3
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ProtocolVersion::Unknown(_))
    }

    /// The stream version whose rules this version follows.
    ///
    /// DTLS 1.0 is based on TLS 1.1, DTLS 1.2 on TLS 1.2 and DTLS 1.3 on TLS 1.3.
    pub fn legacy_equivalent(&self) -> ProtocolVersion {
        match self {
            ProtocolVersion::DTLS1_0 => ProtocolVersion::TLS1_1,
            ProtocolVersion::DTLS1_2 => ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_3 => ProtocolVersion::TLS1_3,
            v => *v,
        }
    }

    /// Strength within a family. Higher is newer. Unknown versions rank 0.
    pub fn rank(&self) -> u8 {
        match self.legacy_equivalent() {
            ProtocolVersion::SSL3_0 => 1,
            ProtocolVersion::TLS1_0 => 2,
            ProtocolVersion::TLS1_1 => 3,
            ProtocolVersion::TLS1_2 => 4,
            ProtocolVersion::TLS1_3 => 5,
            _ => 0,
        }
    }

    pub fn uses_tls13_key_schedule(&self) -> bool {
        self.legacy_equivalent() == ProtocolVersion::TLS1_3
    }

    /// TLS 1.1 and later carry an explicit IV in block cipher records.
    pub fn has_explicit_iv(&self) -> bool {
        self.rank() >= ProtocolVersion::TLS1_1.rank()
    }

    /// Version written in the legacy version fields of hello messages.
    ///
    /// Versions from 1.3 on negotiate through supported_versions and cap
    /// the legacy field at 1.2.
    pub fn legacy_wire_version(&self) -> ProtocolVersion {
        match self {
            ProtocolVersion::TLS1_3 => ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_3 => ProtocolVersion::DTLS1_2,
            v => *v,
        }
    }

    /// The HKDF-Expand-Label prefix.
    pub fn hkdf_label_prefix(&self) -> &'static [u8] {
        if self.is_dtls() {
            b"dtls13"
        } else {
            b"tls13 "
        }
    }

    /// Whether `self` and `other` belong to the same family.
    pub fn same_family(&self, other: &ProtocolVersion) -> bool {
        self.is_dtls() == other.is_dtls()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::SSL3_0 => write!(f, "SSLv3"),
            ProtocolVersion::TLS1_0 => write!(f, "TLSv1"),
            ProtocolVersion::TLS1_1 => write!(f, "TLSv1.1"),
            ProtocolVersion::TLS1_2 => write!(f, "TLSv1.2"),
            ProtocolVersion::TLS1_3 => write!(f, "TLSv1.3"),
            ProtocolVersion::DTLS1_0 => write!(f, "DTLSv1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLSv1.2"),
            ProtocolVersion::DTLS1_3 => write!(f, "DTLSv1.3"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}

// ============================================================================
// Hash Algorithms
// ============================================================================

/// Hash algorithms (RFC 5246 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    None,
    MD5,
    SHA1,
    SHA224,
    SHA256,
    SHA384,
    SHA512,
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::MD5,
            2 => HashAlgorithm::SHA1,
            3 => HashAlgorithm::SHA224,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA224 => 3,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            HashAlgorithm::None | HashAlgorithm::Unknown(_) => 0,
        }
    }
}

// ============================================================================
// Named Groups
// ============================================================================

/// Key exchange groups (RFC 8422, RFC 8446).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    X448,
    Ffdhe2048,
    Ffdhe3072,
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0017 => NamedGroup::Secp256r1,
            0x0018 => NamedGroup::Secp384r1,
            0x0019 => NamedGroup::Secp521r1,
            0x001D => NamedGroup::X25519,
            0x001E => NamedGroup::X448,
            0x0100 => NamedGroup::Ffdhe2048,
            0x0101 => NamedGroup::Ffdhe3072,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::Secp521r1 => 0x0019,
            NamedGroup::X25519 => 0x001D,
            NamedGroup::X448 => 0x001E,
            NamedGroup::Ffdhe2048 => 0x0100,
            NamedGroup::Ffdhe3072 => 0x0101,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }

    /// Elliptic curve groups (usable by the ECDHE key exchanges before 1.3).
    pub fn is_ecdhe(&self) -> bool {
        matches!(
            self,
            NamedGroup::Secp256r1
                | NamedGroup::Secp384r1
                | NamedGroup::Secp521r1
                | NamedGroup::X25519
                | NamedGroup::X448
        )
    }
}

// ============================================================================
// Signature Algorithms
// ============================================================================

/// The signature primitive, without the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SignatureAlgorithm {
    Anonymous,
    RSA,
    DSA,
    ECDSA,
    ED25519,
    Unknown(u8),
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

// ============================================================================
// Signature Schemes
// ============================================================================

/// Signature schemes (RFC 8446 numbering, which extends the RFC 5246
/// hash/signature pairs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SignatureScheme {
    ECDSA_SECP256R1_SHA256,
    ECDSA_SECP384R1_SHA384,
    ECDSA_SECP521R1_SHA512,
    ECDSA_SHA1,
    ED25519,
    RSA_PSS_RSAE_SHA256,
    RSA_PSS_RSAE_SHA384,
    RSA_PSS_RSAE_SHA512,
    RSA_PKCS1_SHA256,
    RSA_PKCS1_SHA384,
    RSA_PKCS1_SHA512,
    RSA_PKCS1_SHA1,
    Unknown(u16),
}

impl SignatureScheme {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0403 => SignatureScheme::ECDSA_SECP256R1_SHA256,
            0x0503 => SignatureScheme::ECDSA_SECP384R1_SHA384,
            0x0603 => SignatureScheme::ECDSA_SECP521R1_SHA512,
            0x0203 => SignatureScheme::ECDSA_SHA1,
            0x0807 => SignatureScheme::ED25519,
            0x0804 => SignatureScheme::RSA_PSS_RSAE_SHA256,
            0x0805 => SignatureScheme::RSA_PSS_RSAE_SHA384,
            0x0806 => SignatureScheme::RSA_PSS_RSAE_SHA512,
            0x0401 => SignatureScheme::RSA_PKCS1_SHA256,
            0x0501 => SignatureScheme::RSA_PKCS1_SHA384,
            0x0601 => SignatureScheme::RSA_PKCS1_SHA512,
            0x0201 => SignatureScheme::RSA_PKCS1_SHA1,
            _ => SignatureScheme::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => 0x0403,
            SignatureScheme::ECDSA_SECP384R1_SHA384 => 0x0503,
            SignatureScheme::ECDSA_SECP521R1_SHA512 => 0x0603,
            SignatureScheme::ECDSA_SHA1 => 0x0203,
            SignatureScheme::ED25519 => 0x0807,
            SignatureScheme::RSA_PSS_RSAE_SHA256 => 0x0804,
            SignatureScheme::RSA_PSS_RSAE_SHA384 => 0x0805,
            SignatureScheme::RSA_PSS_RSAE_SHA512 => 0x0806,
            SignatureScheme::RSA_PKCS1_SHA256 => 0x0401,
            SignatureScheme::RSA_PKCS1_SHA384 => 0x0501,
            SignatureScheme::RSA_PKCS1_SHA512 => 0x0601,
            SignatureScheme::RSA_PKCS1_SHA1 => 0x0201,
            SignatureScheme::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureScheme> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureScheme::from_u16(value)))
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PKCS1_SHA256 => HashAlgorithm::SHA256,
            SignatureScheme::ECDSA_SECP384R1_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PKCS1_SHA384 => HashAlgorithm::SHA384,
            SignatureScheme::ECDSA_SECP521R1_SHA512
            | SignatureScheme::RSA_PSS_RSAE_SHA512
            | SignatureScheme::RSA_PKCS1_SHA512 => HashAlgorithm::SHA512,
            SignatureScheme::ECDSA_SHA1 | SignatureScheme::RSA_PKCS1_SHA1 => HashAlgorithm::SHA1,
            SignatureScheme::ED25519 => HashAlgorithm::None,
            SignatureScheme::Unknown(_) => HashAlgorithm::Unknown(0),
        }
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256
            | SignatureScheme::ECDSA_SECP384R1_SHA384
            | SignatureScheme::ECDSA_SECP521R1_SHA512
            | SignatureScheme::ECDSA_SHA1 => SignatureAlgorithm::ECDSA,
            SignatureScheme::ED25519 => SignatureAlgorithm::ED25519,
            SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA512
            | SignatureScheme::RSA_PKCS1_SHA256
            | SignatureScheme::RSA_PKCS1_SHA384
            | SignatureScheme::RSA_PKCS1_SHA512
            | SignatureScheme::RSA_PKCS1_SHA1 => SignatureAlgorithm::RSA,
            SignatureScheme::Unknown(_) => SignatureAlgorithm::Unknown(0),
        }
    }

    /// The curve an ECDSA scheme is bound to in TLS 1.3, if any.
    pub fn ecdsa_group(&self) -> Option<NamedGroup> {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => Some(NamedGroup::Secp256r1),
            SignatureScheme::ECDSA_SECP384R1_SHA384 => Some(NamedGroup::Secp384r1),
            SignatureScheme::ECDSA_SECP521R1_SHA512 => Some(NamedGroup::Secp521r1),
            _ => None,
        }
    }

    /// Whether the scheme may be used to sign in a handshake of `version`.
    ///
    /// TLS 1.3 forbids SHA-1 and PKCS#1 v1.5 in CertificateVerify.
    pub fn is_usable_for(&self, version: ProtocolVersion) -> bool {
        if version.uses_tls13_key_schedule() {
            !matches!(
                self,
                SignatureScheme::ECDSA_SHA1
                    | SignatureScheme::RSA_PKCS1_SHA1
                    | SignatureScheme::RSA_PKCS1_SHA256
                    | SignatureScheme::RSA_PKCS1_SHA384
                    | SignatureScheme::RSA_PKCS1_SHA512
                    | SignatureScheme::Unknown(_)
            )
        } else {
            !matches!(self, SignatureScheme::Unknown(_))
        }
    }
}

// ============================================================================
// Handshake Type
// ============================================================================

/// Handshake message types.
///
/// `HelloRetryRequest` shares ServerHello's wire id and is told apart by
/// its random. `ChangeCipherSpec` is not a handshake message at all; it
/// exists so the work queues can order it among the handshake messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    NewSessionTicket,
    EncryptedExtensions,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    CertificateStatus,
    KeyUpdate,
    MessageHash,
    ChangeCipherSpec,
    Unknown(u8),
}

impl HandshakeType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            4 => HandshakeType::NewSessionTicket,
            8 => HandshakeType::EncryptedExtensions,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            22 => HandshakeType::CertificateStatus,
            24 => HandshakeType::KeyUpdate,
            254 => HandshakeType::MessageHash,
            _ => HandshakeType::Unknown(value),
        }
    }

    /// Wire id. The ChangeCipherSpec pseudo-type has none and maps to 0xFF.
    pub fn as_u8(&self) -> u8 {
        match self {
            HandshakeType::HelloRequest => 0,
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello | HandshakeType::HelloRetryRequest => 2,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::ServerKeyExchange => 12,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::ServerHelloDone => 14,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::ClientKeyExchange => 16,
            HandshakeType::Finished => 20,
            HandshakeType::CertificateStatus => 22,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::MessageHash => 254,
            HandshakeType::ChangeCipherSpec => 0xFF,
            HandshakeType::Unknown(value) => *value,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandshakeType::HelloRequest => "hello_request",
            HandshakeType::ClientHello => "client_hello",
            HandshakeType::ServerHello => "server_hello",
            HandshakeType::HelloRetryRequest => "hello_retry_request",
            HandshakeType::NewSessionTicket => "new_session_ticket",
            HandshakeType::EncryptedExtensions => "encrypted_extensions",
            HandshakeType::Certificate => "certificate",
            HandshakeType::ServerKeyExchange => "server_key_exchange",
            HandshakeType::CertificateRequest => "certificate_request",
            HandshakeType::ServerHelloDone => "server_hello_done",
            HandshakeType::CertificateVerify => "certificate_verify",
            HandshakeType::ClientKeyExchange => "client_key_exchange",
            HandshakeType::Finished => "finished",
            HandshakeType::CertificateStatus => "certificate_status",
            HandshakeType::KeyUpdate => "key_update",
            HandshakeType::MessageHash => "message_hash",
            HandshakeType::ChangeCipherSpec => "change_cipher_spec",
            HandshakeType::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for HandshakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Random
// ============================================================================

/// The special ServerHello random that marks a HelloRetryRequest
/// (SHA-256 of "HelloRetryRequest").
pub const HRR_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

const DOWNGRADE_PREFIX: [u8; 7] = *b"DOWNGRD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub fn new(bytes: [u8; 32]) -> Self {
        Random(bytes)
    }

    pub fn hello_retry() -> Self {
        Random(HRR_RANDOM)
    }

    pub fn is_hello_retry(&self) -> bool {
        self.0 == HRR_RANDOM
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = take(32usize)(input)?;
        let mut r = [0u8; 32];
        r.copy_from_slice(bytes);
        Ok((input, Random(r)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.0);
    }

    /// Stamp the RFC 8446 downgrade sentinel into the last 8 bytes.
    ///
    /// `negotiated` is the version the server actually picked while it
    /// supports 1.3.
    pub fn mark_downgrade(&mut self, negotiated: ProtocolVersion) {
        let last = if negotiated.legacy_equivalent() == ProtocolVersion::TLS1_2 {
            0x01
        } else {
            0x00
        };
        self.0[24..31].copy_from_slice(&DOWNGRADE_PREFIX);
        self.0[31] = last;
    }

    /// Whether the last 8 bytes carry a downgrade sentinel.
    pub fn has_downgrade_marker(&self) -> bool {
        self.0[24..31] == DOWNGRADE_PREFIX && (self.0[31] == 0x00 || self.0[31] == 0x01)
    }
}

// ============================================================================
// Session Id
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionId(ArrayVec<[u8; 32]>);

impl SessionId {
    pub fn empty() -> Self {
        SessionId(ArrayVec::new())
    }

    /// Create from bytes. Returns `None` if longer than 32 bytes.
    pub fn try_new(data: &[u8]) -> Option<Self> {
        if data.len() > 32 {
            return None;
        }
        let mut v = ArrayVec::new();
        v.extend_from_slice(data);
        Some(SessionId(v))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SessionId> {
        let (rest, len) = be_u8(input)?;
        if len > 32 {
            return Err(Err::Failure(make_error(input, ErrorKind::LengthValue)));
        }
        let (rest, data) = take(len)(rest)?;
        let mut v = ArrayVec::new();
        v.extend_from_slice(data);
        Ok((rest, SessionId(v)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.0.len() as u8);
        output.extend_from_slice(&self.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ranks_across_families() {
        assert!(ProtocolVersion::TLS1_3.rank() > ProtocolVersion::TLS1_2.rank());
        assert_eq!(
            ProtocolVersion::DTLS1_2.rank(),
            ProtocolVersion::TLS1_2.rank()
        );
        assert!(ProtocolVersion::DTLS1_3.uses_tls13_key_schedule());
        assert!(!ProtocolVersion::DTLS1_0.uses_tls13_key_schedule());
        assert_eq!(ProtocolVersion::from_u16(0xFEFC), ProtocolVersion::DTLS1_3);
        assert_eq!(ProtocolVersion::DTLS1_3.hkdf_label_prefix(), b"dtls13");
        assert_eq!(ProtocolVersion::TLS1_3.hkdf_label_prefix(), b"tls13 ");
    }

    #[test]
    fn hello_retry_shares_server_hello_id() {
        assert_eq!(HandshakeType::HelloRetryRequest.as_u8(), 2);
        assert_eq!(HandshakeType::from_u8(2), HandshakeType::ServerHello);
    }

    #[test]
    fn downgrade_marker() {
        let mut r = Random([0x11; 32]);
        assert!(!r.has_downgrade_marker());
        r.mark_downgrade(ProtocolVersion::TLS1_2);
        assert!(r.has_downgrade_marker());
        assert_eq!(&r.0[24..], b"DOWNGRD\x01");
        r.mark_downgrade(ProtocolVersion::TLS1_0);
        assert_eq!(r.0[31], 0x00);
    }

    #[test]
    fn session_id_rejects_long() {
        let mut data = vec![33u8];
        data.extend_from_slice(&[0u8; 33]);
        assert!(SessionId::parse(&data).is_err());

        let data = [2u8, 0xAB, 0xCD];
        let (rest, id) = SessionId::parse(&data).unwrap();
        assert!(rest.is_empty());
        assert_eq!(id.as_slice(), &[0xAB, 0xCD]);
    }
}
