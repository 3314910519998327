//! TLS PRFs using RustCrypto.

use crate::buffer::Buf;
use crate::crypto::provider::PrfProvider;
use crate::types::HashAlgorithm;

use super::hmac::p_hash;

/// PRF provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoPrfProvider;

impl PrfProvider for RustCryptoPrfProvider {
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
        hash: HashAlgorithm,
    ) -> Result<(), String> {
        if !label.is_ascii() {
            return Err("PRF label must be ASCII".to_string());
        }

        // full_seed = label + seed
        scratch.clear();
        scratch.extend_from_slice(label.as_bytes());
        scratch.extend_from_slice(seed);

        p_hash(hash, secret, scratch, out, output_len)
    }

    fn prf_tls10(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
    ) -> Result<(), String> {
        if !label.is_ascii() {
            return Err("PRF label must be ASCII".to_string());
        }

        scratch.clear();
        scratch.extend_from_slice(label.as_bytes());
        scratch.extend_from_slice(seed);

        // The halves overlap by one byte when the secret length is odd.
        let half = secret.len().div_ceil(2);
        let s1 = &secret[..half];
        let s2 = &secret[secret.len() - half..];

        let mut md5_out = Buf::new();
        p_hash(HashAlgorithm::MD5, s1, scratch, &mut md5_out, output_len)?;
        p_hash(HashAlgorithm::SHA1, s2, scratch, out, output_len)?;

        for (o, m) in out.iter_mut().zip(md5_out.iter()) {
            *o ^= m;
        }
        Ok(())
    }
}

/// Static instance of the PRF provider.
pub(super) static PRF_PROVIDER: RustCryptoPrfProvider = RustCryptoPrfProvider;
