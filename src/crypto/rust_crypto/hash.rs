//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Clone)]
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl std::fmt::Debug for RustCryptoHashContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RustCryptoHashContext::Md5(_) => "Md5",
            RustCryptoHashContext::Sha1(_) => "Sha1",
            RustCryptoHashContext::Sha256(_) => "Sha256",
            RustCryptoHashContext::Sha384(_) => "Sha384",
            RustCryptoHashContext::Sha512(_) => "Sha512",
        };
        f.debug_tuple("RustCryptoHashContext").field(&name).finish()
    }
}

fn finalize_into<D: Digest + Clone>(ctx: &D, out: &mut Buf) {
    let digest = ctx.clone().finalize();
    out.clear();
    out.extend_from_slice(&digest);
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => Digest::update(ctx, data),
            RustCryptoHashContext::Sha1(ctx) => Digest::update(ctx, data),
            RustCryptoHashContext::Sha256(ctx) => Digest::update(ctx, data),
            RustCryptoHashContext::Sha384(ctx) => Digest::update(ctx, data),
            RustCryptoHashContext::Sha512(ctx) => Digest::update(ctx, data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        match self {
            RustCryptoHashContext::Md5(ctx) => finalize_into(ctx, out),
            RustCryptoHashContext::Sha1(ctx) => finalize_into(ctx, out),
            RustCryptoHashContext::Sha256(ctx) => finalize_into(ctx, out),
            RustCryptoHashContext::Sha384(ctx) => finalize_into(ctx, out),
            RustCryptoHashContext::Sha512(ctx) => finalize_into(ctx, out),
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String> {
        let ctx = match algorithm {
            HashAlgorithm::MD5 => RustCryptoHashContext::Md5(Md5::new()),
            HashAlgorithm::SHA1 => RustCryptoHashContext::Sha1(Sha1::new()),
            HashAlgorithm::SHA256 => RustCryptoHashContext::Sha256(Sha256::new()),
            HashAlgorithm::SHA384 => RustCryptoHashContext::Sha384(Sha384::new()),
            HashAlgorithm::SHA512 => RustCryptoHashContext::Sha512(Sha512::new()),
            _ => return Err(format!("Unsupported hash algorithm: {:?}", algorithm)),
        };
        Ok(Box::new(ctx))
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty() {
        let mut ctx = HASH_PROVIDER.create_hash(HashAlgorithm::SHA256).unwrap();
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        assert_eq!(out[..4], [0xe3, 0xb0, 0xc4, 0x42]);

        // context keeps going after a clone_and_finalize
        ctx.update(b"abc");
        ctx.clone_and_finalize(&mut out);
        assert_eq!(out[..4], [0xba, 0x78, 0x16, 0xbf]);
    }

    #[test]
    fn legacy_hashes_have_expected_lengths() {
        for (alg, len) in [(HashAlgorithm::MD5, 16), (HashAlgorithm::SHA1, 20)] {
            let ctx = HASH_PROVIDER.create_hash(alg).unwrap();
            let mut out = Buf::new();
            ctx.clone_and_finalize(&mut out);
            assert_eq!(out.len(), len);
        }
        assert!(HASH_PROVIDER.create_hash(HashAlgorithm::SHA224).is_err());
    }
}
