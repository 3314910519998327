//! Cipher suite registry.
//!
//! The registry is a static table of every suite this crate can name,
//! with its algorithm bindings. It is indexed once on first use into:
//!
//! - **by id**: wire value to descriptor
//! - **by name**: standard name and legacy aliases (`SSL_` vs `TLS_`)
//! - **negotiable**: suites with at least one protocol version, in
//!   preference order
//! - **default enabled**: the negotiable suites offered when nothing is
//!   configured
//!
//! A suite with an empty version set is known (it can be looked up and
//! printed) but is never negotiable.
//!
//! The registry also owns the record expansion arithmetic, which depends
//! only on the suite's bulk cipher and MAC and the protocol version.

mod bulk;
mod table;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::types::{HashAlgorithm, ProtocolVersion};
use crate::Error;

pub use bulk::{BulkCipher, CipherType, MacAlgorithm};

/// Key exchange and authentication of a pre-1.3 suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    Rsa,
    RsaExport,
    DheRsa,
    EcdheEcdsa,
    EcdheRsa,
    /// Renegotiation info signalling value, never negotiated.
    Scsv,
}

impl KeyExchange {
    pub fn is_ecdhe(&self) -> bool {
        matches!(self, KeyExchange::EcdheEcdsa | KeyExchange::EcdheRsa)
    }

    /// Name passed to the trust collaborator as the authentication type.
    pub fn auth_type(&self) -> &'static str {
        match self {
            KeyExchange::Rsa => "RSA",
            KeyExchange::RsaExport => "RSA_EXPORT",
            KeyExchange::DheRsa => "DHE_RSA",
            KeyExchange::EcdheEcdsa => "ECDHE_ECDSA",
            KeyExchange::EcdheRsa => "ECDHE_RSA",
            KeyExchange::Scsv => "SCSV",
        }
    }
}

/// Immutable description of one cipher suite.
#[derive(Debug, PartialEq, Eq)]
pub struct CipherSuiteDescriptor {
    pub id: u16,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub default_enabled: bool,
    /// `None` for TLS 1.3 suites, which negotiate key exchange separately.
    pub key_exchange: Option<KeyExchange>,
    pub bulk_cipher: BulkCipher,
    pub mac: MacAlgorithm,
    /// PRF hash for 1.2, HKDF hash for 1.3.
    pub hash: HashAlgorithm,
    pub versions: &'static [ProtocolVersion],
}

impl CipherSuiteDescriptor {
    /// Whether this suite may be negotiated at all.
    pub fn is_negotiable(&self) -> bool {
        !self.versions.is_empty() && self.key_exchange != Some(KeyExchange::Scsv)
    }

    /// Whether this suite may be used with `version`.
    pub fn is_available(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn is_tls13(&self) -> bool {
        self.key_exchange.is_none()
    }

    /// Whether the handshake can run this suite's key exchange. Only
    /// ECDHE is implemented before 1.3.
    pub fn has_key_exchange_handler(&self) -> bool {
        self.key_exchange.map_or(true, |k| k.is_ecdhe())
    }

    pub fn is_exportable(&self) -> bool {
        self.bulk_cipher.is_exportable() || self.key_exchange == Some(KeyExchange::RsaExport)
    }

    /// Size of the record carrying `fragment` plaintext bytes.
    pub fn calc_packet_size(&self, fragment: usize, version: ProtocolVersion) -> usize {
        bulk::packet_size(self.bulk_cipher, self.mac, version, fragment)
    }

    /// Largest plaintext fragment that fits in a record of `packet` bytes.
    pub fn calc_fragment_size(&self, packet: usize, version: ProtocolVersion) -> usize {
        bulk::fragment_size(self.bulk_cipher, self.mac, version, packet)
    }

    /// Traffic key length for the 1.3 key schedule, and the write key
    /// length taken from the 1.2 key block.
    pub fn key_len(&self) -> usize {
        self.bulk_cipher.key_size()
    }

    /// IV length handed to the record layer.
    ///
    /// 1.3 derives the full nonce. Before 1.3 the key block carries the
    /// fixed AEAD part or, for CBC in SSL 3.0 and TLS 1.0, the whole IV.
    pub fn iv_len(&self, version: ProtocolVersion) -> usize {
        if version.uses_tls13_key_schedule() {
            return self.bulk_cipher.iv_size();
        }
        match self.bulk_cipher.cipher_type() {
            CipherType::Aead => self.bulk_cipher.fixed_iv_size(),
            CipherType::Block if !version.has_explicit_iv() => self.bulk_cipher.iv_size(),
            _ => 0,
        }
    }

    pub fn mac_key_len(&self) -> usize {
        self.mac.size()
    }
}

impl fmt::Display for CipherSuiteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:04X})", self.name, self.id)
    }
}

struct Registry {
    by_id: HashMap<u16, &'static CipherSuiteDescriptor>,
    by_name: HashMap<&'static str, &'static CipherSuiteDescriptor>,
    negotiable: Vec<&'static CipherSuiteDescriptor>,
    defaults: Vec<&'static CipherSuiteDescriptor>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut by_id = HashMap::new();
    let mut by_name = HashMap::new();
    let mut negotiable = Vec::new();
    let mut defaults = Vec::new();

    for s in table::SUITES {
        by_id.insert(s.id, s);
        by_name.insert(s.name, s);
        for alias in s.aliases {
            by_name.insert(*alias, s);
        }
        if s.is_negotiable() {
            negotiable.push(s);
            if s.default_enabled {
                defaults.push(s);
            }
        }
    }

    Registry {
        by_id,
        by_name,
        negotiable,
        defaults,
    }
});

pub fn lookup_by_id(id: u16) -> Option<&'static CipherSuiteDescriptor> {
    REGISTRY.by_id.get(&id).copied()
}

/// Look up by standard name or legacy alias.
pub fn lookup_by_name(name: &str) -> Option<&'static CipherSuiteDescriptor> {
    REGISTRY.by_name.get(name).copied()
}

/// All negotiable suites in preference order.
pub fn negotiable_suites() -> &'static [&'static CipherSuiteDescriptor] {
    &REGISTRY.negotiable
}

/// Suites enabled when none are configured, in preference order.
pub fn default_suites() -> &'static [&'static CipherSuiteDescriptor] {
    &REGISTRY.defaults
}

/// Resolve configured suite names.
///
/// Fails with [`Error::EmptyInput`] on an empty list and with
/// [`Error::UnsupportedCipherSuite`] for a name that is unknown or not
/// negotiable. The signalling value is accepted. The order of `names` is kept.
pub fn validate_requested_names<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<&'static CipherSuiteDescriptor>, Error> {
    if names.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut out: Vec<&'static CipherSuiteDescriptor> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(Error::EmptyInput);
        }
        let suite = lookup_by_name(name)
            .filter(|s| !s.versions.is_empty())
            .ok_or_else(|| Error::UnsupportedCipherSuite(name.to_string()))?;
        if !out.iter().any(|s| s.id == suite.id) {
            out.push(suite);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tls13_suite() {
        let s = lookup_by_id(0x1301).unwrap();
        assert_eq!(s.name, "TLS_AES_128_GCM_SHA256");
        assert_eq!(s.hash, HashAlgorithm::SHA256);
        assert_eq!(s.key_exchange, None);
        assert!(s.is_available(ProtocolVersion::TLS1_3));
        assert!(!s.is_available(ProtocolVersion::TLS1_2));
    }

    #[test]
    fn bogus_name_is_unsupported() {
        let r = validate_requested_names(&["BOGUS_SUITE"]);
        assert!(matches!(r, Err(Error::UnsupportedCipherSuite(n)) if n == "BOGUS_SUITE"));
    }

    #[test]
    fn empty_input() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            validate_requested_names(&empty),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn unusable_suite_is_rejected_by_name() {
        assert!(lookup_by_name("SSL_RSA_WITH_RC4_128_SHA").is_some());
        assert!(matches!(
            validate_requested_names(&["SSL_RSA_WITH_RC4_128_SHA"]),
            Err(Error::UnsupportedCipherSuite(_))
        ));
        assert!(!negotiable_suites().iter().any(|s| s.id == 0x0005));
    }

    #[test]
    fn alias_resolves_to_same_suite() {
        let a = lookup_by_name("SSL_RSA_WITH_3DES_EDE_CBC_SHA").unwrap();
        let b = lookup_by_name("TLS_RSA_WITH_3DES_EDE_CBC_SHA").unwrap();
        assert_eq!(a.id, b.id);
        let v = validate_requested_names(&["TLS_RSA_WITH_3DES_EDE_CBC_SHA"]).unwrap();
        assert_eq!(v[0].name, "SSL_RSA_WITH_3DES_EDE_CBC_SHA");
    }

    #[test]
    fn defaults_are_negotiable_and_ordered() {
        let d = default_suites();
        assert_eq!(d[0].id, 0x1301);
        assert!(d.iter().all(|s| s.is_negotiable() && s.default_enabled));
        assert!(d.iter().all(|s| s.has_key_exchange_handler()));
        let n = negotiable_suites();
        let pos = |id| n.iter().position(|s| s.id == id).unwrap();
        assert!(pos(0xC02C) < pos(0xC009));
        assert!(!n.iter().any(|s| s.key_exchange == Some(KeyExchange::Scsv)));
    }

    #[test]
    fn packet_size_inverse_law() {
        let versions = [
            ProtocolVersion::SSL3_0,
            ProtocolVersion::TLS1_0,
            ProtocolVersion::TLS1_1,
            ProtocolVersion::TLS1_2,
            ProtocolVersion::TLS1_3,
            ProtocolVersion::DTLS1_0,
            ProtocolVersion::DTLS1_2,
            ProtocolVersion::DTLS1_3,
        ];
        for s in table::SUITES {
            for v in versions {
                let mut last_packet = 0;
                let mut last_frag = 0;
                for f in (0..2100).step_by(7) {
                    let p = s.calc_packet_size(f, v);
                    let back = s.calc_fragment_size(p, v);
                    assert!(back >= f, "{} {} f={} p={} back={}", s, v, f, p, back);
                    assert!(p >= last_packet);
                    last_packet = p;
                    let frag = s.calc_fragment_size(f, v);
                    assert!(frag >= last_frag);
                    last_frag = frag;
                }
            }
        }
    }

    #[test]
    fn iv_len_by_version() {
        let gcm = lookup_by_id(0xC02B).unwrap();
        assert_eq!(gcm.iv_len(ProtocolVersion::TLS1_2), 4);
        let cbc = lookup_by_id(0xC009).unwrap();
        assert_eq!(cbc.iv_len(ProtocolVersion::TLS1_0), 16);
        assert_eq!(cbc.iv_len(ProtocolVersion::TLS1_2), 0);
        let t13 = lookup_by_id(0x1303).unwrap();
        assert_eq!(t13.iv_len(ProtocolVersion::TLS1_3), 12);
    }
}
