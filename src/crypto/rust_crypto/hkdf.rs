//! HKDF implementation using RustCrypto crates for TLS 1.3 key derivation.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HkdfProvider;
use crate::types::HashAlgorithm;

/// HKDF provider implementation using RustCrypto.
#[derive(Debug)]
pub(super) struct RustCryptoHkdfProvider;

impl HkdfProvider for RustCryptoHkdfProvider {
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();
        let salt = if salt.is_empty() { None } else { Some(salt) };

        match hash {
            HashAlgorithm::SHA256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            HashAlgorithm::SHA384 => {
                let (prk, _) = Hkdf::<Sha384>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            _ => return Err(format!("Unsupported hash for HKDF: {:?}", hash)),
        }

        Ok(())
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        out.clear();
        out.resize(output_len, 0);

        match hash {
            HashAlgorithm::SHA256 => {
                let hk =
                    Hkdf::<Sha256>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out)
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            HashAlgorithm::SHA384 => {
                let hk =
                    Hkdf::<Sha384>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out)
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            _ => return Err(format!("Unsupported hash for HKDF: {:?}", hash)),
        }

        Ok(())
    }
}

/// Static instance of the HKDF provider.
pub(super) static HKDF_PROVIDER: RustCryptoHkdfProvider = RustCryptoHkdfProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc8448_early_secret() {
        // RFC 8448 simple 1-RTT: early secret from a zero PSK.
        let mut out = Buf::new();
        HKDF_PROVIDER
            .hkdf_extract(HashAlgorithm::SHA256, &[], &[0u8; 32], &mut out)
            .unwrap();
        assert_eq!(&out[..8], &[0x33, 0xad, 0x0a, 0x1c, 0x60, 0x7e, 0xc0, 0x3b]);
    }

    #[test]
    fn rfc8448_derived_secret() {
        let mut early = Buf::new();
        HKDF_PROVIDER
            .hkdf_extract(HashAlgorithm::SHA256, &[], &[0u8; 32], &mut early)
            .unwrap();
        // SHA-256 of the empty string
        let empty_hash = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        let mut derived = Buf::new();
        HKDF_PROVIDER
            .hkdf_expand_label(
                HashAlgorithm::SHA256,
                b"tls13 ",
                &early,
                b"derived",
                &empty_hash,
                &mut derived,
                32,
            )
            .unwrap();
        assert_eq!(&derived[..8], &[0x6f, 0x26, 0x15, 0xa1, 0x08, 0xc7, 0x02, 0xc5]);
    }

    #[test]
    fn label_length_limits() {
        let mut out = Buf::new();
        let long = [b'x'; 250];
        let r = HKDF_PROVIDER.hkdf_expand_label(
            HashAlgorithm::SHA256,
            b"tls13 ",
            &[0u8; 32],
            &long,
            &[],
            &mut out,
            32,
        );
        assert!(r.is_err());
    }
}
