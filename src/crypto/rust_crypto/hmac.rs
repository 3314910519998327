//! HMAC and the TLS P_hash expansion using RustCrypto.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

/// HMAC over the concatenation of `parts`.
pub(super) fn hmac_parts(
    hash: HashAlgorithm,
    key: &[u8],
    parts: &[&[u8]],
    out: &mut Buf,
) -> Result<(), String> {
    macro_rules! run {
        ($d:ty) => {{
            let mut mac = <Hmac<$d> as Mac>::new_from_slice(key)
                .map_err(|_| "Invalid HMAC key length".to_string())?;
            for p in parts {
                mac.update(p);
            }
            out.clear();
            out.extend_from_slice(&mac.finalize().into_bytes());
        }};
    }

    match hash {
        HashAlgorithm::MD5 => run!(Md5),
        HashAlgorithm::SHA1 => run!(Sha1),
        HashAlgorithm::SHA256 => run!(Sha256),
        HashAlgorithm::SHA384 => run!(Sha384),
        HashAlgorithm::SHA512 => run!(Sha512),
        _ => return Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
    }
    Ok(())
}

/// P_hash from RFC 5246 Section 5.
///
/// ```text
/// P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                        HMAC_hash(secret, A(2) + seed) + ...
/// A(0) = seed
/// A(i) = HMAC_hash(secret, A(i-1))
/// ```
pub(super) fn p_hash(
    hash: HashAlgorithm,
    secret: &[u8],
    full_seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    out.clear();

    let mut a = Buf::new();
    hmac_parts(hash, secret, &[full_seed], &mut a)?;

    let mut block = Buf::new();
    while out.len() < output_len {
        hmac_parts(hash, secret, &[&a[..], full_seed], &mut block)?;

        let remaining = output_len - out.len();
        let to_copy = remaining.min(block.len());
        out.extend_from_slice(&block[..to_copy]);

        if out.len() < output_len {
            let prev = a.clone();
            hmac_parts(hash, secret, &[&prev[..]], &mut a)?;
        }
    }

    Ok(())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        hmac_parts(hash, key, &[data], out)
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_case_2() {
        let mut out = Buf::new();
        HMAC_PROVIDER
            .hmac(
                HashAlgorithm::SHA256,
                b"Jefe",
                b"what do ya want for nothing?",
                &mut out,
            )
            .unwrap();
        assert_eq!(
            &out[..8],
            &[0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e]
        );
    }

    #[test]
    fn p_hash_is_prefix_stable() {
        let mut short = Buf::new();
        let mut long = Buf::new();
        p_hash(HashAlgorithm::SHA256, b"secret", b"seed", &mut short, 20).unwrap();
        p_hash(HashAlgorithm::SHA256, b"secret", b"seed", &mut long, 100).unwrap();
        assert_eq!(short.len(), 20);
        assert_eq!(long.len(), 100);
        assert_eq!(&long[..20], &short[..]);
    }
}
