//! ECDSA signing, verification and key loading using RustCrypto.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey as SigningKeyTrait};
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureScheme};

const P256_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::ECDSA_SECP256R1_SHA256,
    SignatureScheme::ECDSA_SHA1,
];
const P384_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::ECDSA_SECP384R1_SHA384,
    SignatureScheme::ECDSA_SHA1,
];

fn prehash(scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>, String> {
    let hash = match scheme.hash_algorithm() {
        HashAlgorithm::SHA1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::SHA256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::SHA384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::SHA512 => Sha512::digest(data).to_vec(),
        h => return Err(format!("Unsupported signature hash: {:?}", h)),
    };
    Ok(hash)
}

/// ECDSA signing key implementation.
enum EcdsaSigningKey {
    P256 {
        key: p256::ecdsa::SigningKey,
        public_key: Buf,
    },
    P384 {
        key: p384::ecdsa::SigningKey,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdsaSigningKey::P256 { .. } => f.debug_tuple("EcdsaSigningKey::P256").finish(),
            EcdsaSigningKey::P384 { .. } => f.debug_tuple("EcdsaSigningKey::P384").finish(),
        }
    }
}

impl EcdsaSigningKey {
    fn from_p256(key: p256::ecdsa::SigningKey) -> Self {
        let public_key = Buf::from_slice(&p256::PublicKey::from(key.verifying_key()).to_sec1_bytes());
        EcdsaSigningKey::P256 { key, public_key }
    }

    fn from_p384(key: p384::ecdsa::SigningKey) -> Self {
        let public_key = Buf::from_slice(&p384::PublicKey::from(key.verifying_key()).to_sec1_bytes());
        EcdsaSigningKey::P384 { key, public_key }
    }
}

impl SigningKeyTrait for EcdsaSigningKey {
    fn sign(&self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String> {
        if !self.schemes().contains(&scheme) {
            return Err(format!("Key cannot sign with {:?}", scheme));
        }
        let hash = prehash(scheme, data)?;

        out.clear();
        match self {
            EcdsaSigningKey::P256 { key, .. } => {
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            EcdsaSigningKey::P384 { key, .. } => {
                let signature: p384::ecdsa::Signature = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
        }
        Ok(())
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::ECDSA
    }

    fn schemes(&self) -> &'static [SignatureScheme] {
        match self {
            EcdsaSigningKey::P256 { .. } => P256_SCHEMES,
            EcdsaSigningKey::P384 { .. } => P384_SCHEMES,
        }
    }

    fn public_key(&self) -> &[u8] {
        match self {
            EcdsaSigningKey::P256 { public_key, .. } => public_key,
            EcdsaSigningKey::P384 { public_key, .. } => public_key,
        }
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKeyTrait>, String> {
        // PKCS#8 DER first (most common)
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::from_p256(key)));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::from_p384(key)));
        }

        // Raw big-endian scalar
        match key_der.len() {
            32 => {
                let key = p256::ecdsa::SigningKey::from_slice(key_der)
                    .map_err(|_| "Invalid P-256 scalar".to_string())?;
                Ok(Box::new(EcdsaSigningKey::from_p256(key)))
            }
            48 => {
                let key = p384::ecdsa::SigningKey::from_slice(key_der)
                    .map_err(|_| "Invalid P-384 scalar".to_string())?;
                Ok(Box::new(EcdsaSigningKey::from_p384(key)))
            }
            _ => Err("Failed to parse private key in any supported format".to_string()),
        }
    }

    fn generate_key(&self, group: NamedGroup) -> Result<Box<dyn SigningKeyTrait>, String> {
        match group {
            NamedGroup::Secp256r1 => Ok(Box::new(EcdsaSigningKey::from_p256(
                p256::ecdsa::SigningKey::random(&mut OsRng),
            ))),
            NamedGroup::Secp384r1 => Ok(Box::new(EcdsaSigningKey::from_p384(
                p384::ecdsa::SigningKey::random(&mut OsRng),
            ))),
            _ => Err(format!("Cannot generate a signing key for {:?}", group)),
        }
    }
}

/// Signature verifier implementation.
///
/// Public keys are uncompressed SEC1 points. The curve follows from the
/// point length.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String> {
        if scheme.signature_algorithm() != SignatureAlgorithm::ECDSA {
            return Err(format!("Unsupported signature scheme: {:?}", scheme));
        }

        let group = match public_key.len() {
            65 => NamedGroup::Secp256r1,
            97 => NamedGroup::Secp384r1,
            n => return Err(format!("Unsupported EC public key length: {}", n)),
        };
        // TLS 1.3 binds the curve to the scheme
        if let Some(bound) = scheme.ecdsa_group() {
            if bound != group {
                return Err(format!("{:?} used with a {:?} key", scheme, group));
            }
        }

        let hash = prehash(scheme, data)?;

        match group {
            NamedGroup::Secp256r1 => {
                let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                verifying_key
                    .verify_prehash(&hash, &sig)
                    .map_err(|_| format!("ECDSA signature verification failed for {:?}", scheme))
            }
            _ => {
                let verifying_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let sig = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                verifying_key
                    .verify_prehash(&hash, &sig)
                    .map_err(|_| format!("ECDSA signature verification failed for {:?}", scheme))
            }
        }
    }

    fn supports(&self, scheme: SignatureScheme) -> bool {
        matches!(
            scheme,
            SignatureScheme::ECDSA_SECP256R1_SHA256
                | SignatureScheme::ECDSA_SECP384R1_SHA384
                | SignatureScheme::ECDSA_SHA1
        )
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_p256() {
        let key = KEY_PROVIDER.generate_key(NamedGroup::Secp256r1).unwrap();
        assert_eq!(key.public_key().len(), 65);

        let mut sig = Buf::new();
        let scheme = SignatureScheme::ECDSA_SECP256R1_SHA256;
        key.sign(scheme, b"transcript", &mut sig).unwrap();
        SIGNATURE_VERIFIER
            .verify_signature(key.public_key(), b"transcript", &sig, scheme)
            .unwrap();
        assert!(SIGNATURE_VERIFIER
            .verify_signature(key.public_key(), b"tampered", &sig, scheme)
            .is_err());
    }

    #[test]
    fn scheme_must_match_curve() {
        let key = KEY_PROVIDER.generate_key(NamedGroup::Secp384r1).unwrap();
        let mut sig = Buf::new();
        assert!(key
            .sign(SignatureScheme::ECDSA_SECP256R1_SHA256, b"x", &mut sig)
            .is_err());
        key.sign(SignatureScheme::ECDSA_SECP384R1_SHA384, b"x", &mut sig)
            .unwrap();
        assert!(SIGNATURE_VERIFIER
            .verify_signature(
                key.public_key(),
                b"x",
                &sig,
                SignatureScheme::ECDSA_SECP256R1_SHA256
            )
            .is_err());
    }

    #[test]
    fn load_raw_scalar() {
        let mut scalar = [0u8; 32];
        scalar[31] = 7;
        let key = KEY_PROVIDER.load_private_key(&scalar).unwrap();
        assert_eq!(key.schemes()[0], SignatureScheme::ECDSA_SECP256R1_SHA256);
        assert!(KEY_PROVIDER.load_private_key(&[1, 2, 3]).is_err());
    }
}
