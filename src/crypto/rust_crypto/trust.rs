//! Raw public key trust store.
//!
//! Certificate entries are taken to be bare uncompressed SEC1 points
//! (RFC 7250 style raw public keys with the SubjectPublicKeyInfo wrapper
//! stripped). A peer is trusted when its end-entity key is pinned, or
//! when the store accepts any well-formed key.

use std::collections::HashSet;

use crate::buffer::Buf;
use crate::crypto::provider::{CertificateTrust, PeerContext, PeerPublicKey};
use crate::error::CertificateError;
use crate::types::{NamedGroup, SignatureAlgorithm};

/// Trusts pinned raw EC public keys.
#[derive(Debug, Default)]
pub struct PinnedKeyTrust {
    pins: HashSet<Vec<u8>>,
    accept_any: bool,
}

impl PinnedKeyTrust {
    /// Trust exactly the given keys.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        PinnedKeyTrust {
            pins: keys.into_iter().map(|k| k.as_ref().to_vec()).collect(),
            accept_any: false,
        }
    }

    /// Trust any well-formed key.
    pub fn accept_any() -> Self {
        PinnedKeyTrust {
            pins: HashSet::new(),
            accept_any: true,
        }
    }

    pub fn pin(&mut self, key: &[u8]) {
        self.pins.insert(key.to_vec());
    }
}

fn ec_group(key: &[u8]) -> Option<NamedGroup> {
    if key.first() != Some(&0x04) {
        return None;
    }
    match key.len() {
        65 => Some(NamedGroup::Secp256r1),
        97 => Some(NamedGroup::Secp384r1),
        _ => None,
    }
}

impl CertificateTrust for PinnedKeyTrust {
    fn check_peer_trusted(
        &self,
        chain: &[Buf],
        auth_type: &str,
        _peer: &PeerContext<'_>,
    ) -> Result<(), CertificateError> {
        let end_entity = chain
            .first()
            .ok_or_else(|| CertificateError::BadCertificate("Empty chain".to_string()))?;

        if ec_group(end_entity).is_none() {
            return Err(CertificateError::Unsupported(format!(
                "Not a raw EC public key ({} bytes)",
                end_entity.len()
            )));
        }
        if auth_type.contains("RSA") {
            return Err(CertificateError::Unsupported(format!(
                "EC key cannot serve {}",
                auth_type
            )));
        }

        if self.accept_any || self.pins.contains(&end_entity[..]) {
            Ok(())
        } else {
            Err(CertificateError::Untrusted("Key is not pinned".to_string()))
        }
    }

    fn public_key(&self, end_entity: &[u8]) -> Result<PeerPublicKey, CertificateError> {
        let group = ec_group(end_entity).ok_or_else(|| {
            CertificateError::Unsupported("Not a raw EC public key".to_string())
        })?;
        Ok(PeerPublicKey {
            algorithm: SignatureAlgorithm::ECDSA,
            group: Some(group),
            key: Buf::from_slice(end_entity),
        })
    }

    fn check_status_response(
        &self,
        _end_entity: &[u8],
        response: &[u8],
    ) -> Result<(), CertificateError> {
        // An OCSPResponse is a DER SEQUENCE
        if response.first() != Some(&0x30) {
            return Err(CertificateError::BadCertificate(
                "Unparseable OCSP response".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProtocolVersion, Role};

    fn peer() -> PeerContext<'static> {
        PeerContext {
            role: Role::Client,
            version: ProtocolVersion::TLS1_3,
            server_name: None,
            endpoint_identification: None,
        }
    }

    #[test]
    fn pinned_key_is_trusted() {
        let mut key = vec![0x04];
        key.extend_from_slice(&[7u8; 64]);
        let trust = PinnedKeyTrust::new([&key]);
        let chain = vec![Buf::from_slice(&key)];
        trust.check_peer_trusted(&chain, "TLS13", &peer()).unwrap();

        let mut other = key.clone();
        other[10] = 0;
        let chain = vec![Buf::from_slice(&other)];
        assert!(matches!(
            trust.check_peer_trusted(&chain, "TLS13", &peer()),
            Err(CertificateError::Untrusted(_))
        ));
    }

    #[test]
    fn empty_chain_is_bad() {
        let trust = PinnedKeyTrust::accept_any();
        assert!(matches!(
            trust.check_peer_trusted(&[], "ECDHE_ECDSA", &peer()),
            Err(CertificateError::BadCertificate(_))
        ));
    }

    #[test]
    fn public_key_group_from_length() {
        let trust = PinnedKeyTrust::accept_any();
        let mut key = vec![0x04];
        key.extend_from_slice(&[1u8; 96]);
        let pk = trust.public_key(&key).unwrap();
        assert_eq!(pk.group, Some(NamedGroup::Secp384r1));
        assert!(trust.public_key(&[0x04, 1, 2]).is_err());
    }

    #[test]
    fn status_response_must_be_der() {
        let trust = PinnedKeyTrust::accept_any();
        trust.check_status_response(&[], &[0x30, 0x00]).unwrap();
        assert!(matches!(
            trust.check_status_response(&[], &[0x01]),
            Err(CertificateError::BadCertificate(_))
        ));
    }
}
