//! Key exchange group implementations using RustCrypto.

use p256::{ecdh::EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret as X25519Secret, PublicKey as X25519PublicKey};

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// ECDHE key exchange implementation.
enum EcdhKeyExchange {
    P256 {
        secret: EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
    X25519 {
        secret: X25519Secret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyExchange")
            .field("group", &self.group())
            .field("public_key_len", &self.pub_key().len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyExchange {
    fn new(group: NamedGroup, mut buf: Buf) -> Result<Self, String> {
        buf.clear();
        match group {
            NamedGroup::Secp256r1 => {
                let secret = EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P256PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P256 {
                    secret,
                    public_key: buf,
                })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P384PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P384 {
                    secret,
                    public_key: buf,
                })
            }
            NamedGroup::X25519 => {
                let secret = X25519Secret::random_from_rng(OsRng);
                buf.extend_from_slice(X25519PublicKey::from(&secret).as_bytes());
                Ok(EcdhKeyExchange::X25519 {
                    secret,
                    public_key: buf,
                })
            }
            _ => Err(format!("Unsupported group: {:?}", group)),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
            EcdhKeyExchange::X25519 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::X25519 { secret, .. } => {
                let bytes: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key length".to_string())?;
                let shared_secret = secret.diffie_hellman(&X25519PublicKey::from(bytes));
                if !shared_secret.was_contributory() {
                    return Err("X25519 shared secret is all zero".to_string());
                }
                out.extend_from_slice(shared_secret.as_bytes());
            }
        }
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
            EcdhKeyExchange::X25519 { .. } => NamedGroup::X25519,
        }
    }
}

/// One supported group.
#[derive(Debug)]
struct Group(NamedGroup);

impl SupportedKxGroup for Group {
    fn name(&self) -> NamedGroup {
        self.0
    }

    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(self.0, buf)?))
    }
}

static KX_GROUP_X25519: Group = Group(NamedGroup::X25519);
static KX_GROUP_P256: Group = Group(NamedGroup::Secp256r1);
static KX_GROUP_P384: Group = Group(NamedGroup::Secp384r1);

/// All supported key exchange groups, most preferred first.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree() {
        for group in ALL_KX_GROUPS {
            let a = group.start_exchange(Buf::new()).unwrap();
            let b = group.start_exchange(Buf::new()).unwrap();
            let a_pub = a.pub_key().to_vec();
            let b_pub = b.pub_key().to_vec();

            let mut s1 = Buf::new();
            let mut s2 = Buf::new();
            a.complete(&b_pub, &mut s1).unwrap();
            b.complete(&a_pub, &mut s2).unwrap();
            assert_eq!(s1, s2, "{:?}", group.name());
            assert!(!s1.is_empty());
        }
    }

    #[test]
    fn rejects_garbage_peer_key() {
        let a = KX_GROUP_P256.start_exchange(Buf::new()).unwrap();
        let mut out = Buf::new();
        assert!(a.complete(&[4, 1, 2, 3], &mut out).is_err());

        let x = KX_GROUP_X25519.start_exchange(Buf::new()).unwrap();
        assert!(x.complete(&[0u8; 31], &mut out).is_err());
    }
}
