//! Decrypting reader: the download-side counterpart to [`EncryptingEntity`]
//! (C7). CTR mode is symmetric (the same keystream both encrypts and
//! decrypts) so a ranged GET can be decrypted in place at any offset via
//! [`ctr_resume_offset`]; GCM has no such resume point, so a GCM object is
//! read and tag-verified in full before any plaintext is released.
//!
//! §4.6 and §4.7 describe only an encrypting entity, but a store that can
//! encrypt on the way up must also decrypt on the way down — this is
//! composed from the same `ctr`/`aes-gcm` primitives [`EncryptingEntity`]
//! already uses.

use crate::crypto::catalog::{ctr_resume_offset, CipherId, CipherSpec};
use crate::error::{ClientError, Result};
use aes::{Aes128, Aes256};
use aes_gcm::aead::{Aead, KeyInit as AeadKeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::Read;

type Aes128CtrCipher = ctr::Ctr128BE<Aes128>;
type Aes256CtrCipher = ctr::Ctr128BE<Aes256>;

enum CtrCipher {
    Aes128(Aes128CtrCipher),
    Aes256(Aes256CtrCipher),
}

impl CtrCipher {
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        match self {
            CtrCipher::Aes128(c) => c.apply_keystream(buf),
            CtrCipher::Aes256(c) => c.apply_keystream(buf),
        }
    }

    fn seek(&mut self, pos: u64) {
        match self {
            CtrCipher::Aes128(c) => c.seek(pos),
            CtrCipher::Aes256(c) => c.seek(pos),
        }
    }
}

/// Decrypts a CTR-mode ciphertext stream starting at an arbitrary plaintext
/// offset. The HMAC trailer is not verified here — callers in Mandatory
/// authentication mode must separately compare it against the value
/// produced by digesting the full ciphertext, which requires reading the
/// whole object (random access and full authentication are in tension for
/// encrypt-then-MAC; §7 leaves the choice to the caller's authentication
/// mode).
pub struct CtrDecryptingReader<R> {
    inner: R,
    cipher: CtrCipher,
    skip_within_block: usize,
}

impl<R: Read> CtrDecryptingReader<R> {
    /// `inner` must already be positioned at `ctr_resume_offset(spec,
    /// plaintext_offset).block_aligned_ciphertext_offset` in the
    /// ciphertext stream.
    pub fn new(inner: R, spec: &CipherSpec, key: &[u8], iv: &[u8], plaintext_offset: u64) -> Result<Self> {
        let resume = ctr_resume_offset(spec, plaintext_offset)?;
        let mut cipher = match spec.id {
            CipherId::Aes128CtrNoPadding => CtrCipher::Aes128(
                Aes128CtrCipher::new_from_slices(key, iv)
                    .map_err(|e| ClientError::crypto(format!("ctr cipher setup failed: {e}")))?,
            ),
            CipherId::Aes256CtrNoPadding => CtrCipher::Aes256(
                Aes256CtrCipher::new_from_slices(key, iv)
                    .map_err(|e| ClientError::crypto(format!("ctr cipher setup failed: {e}")))?,
            ),
            _ => return Err(ClientError::crypto("CtrDecryptingReader requires a CTR cipher id")),
        };
        cipher.seek(resume.block_aligned_ciphertext_offset);
        Ok(Self {
            inner,
            cipher,
            skip_within_block: resume.skip_within_block,
        })
    }
}

impl<R: Read> Read for CtrDecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Ok(0);
        }
        self.cipher.apply_keystream(&mut buf[..n]);
        if self.skip_within_block > 0 {
            let skip = self.skip_within_block.min(n);
            buf.copy_within(skip..n, 0);
            self.skip_within_block -= skip;
            return Ok(n - skip);
        }
        Ok(n)
    }
}

/// Decrypt a complete GCM-mode ciphertext (including its trailing tag),
/// verifying authenticity as a side effect of decryption. There is no
/// streaming or random-access variant — AEAD tags only verify once the
/// whole ciphertext is present.
pub fn gcm_decrypt_whole(spec: &CipherSpec, key: &[u8], iv: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(iv);
    match spec.id {
        CipherId::Aes128GcmNoPadding => {
            let cipher =
                Aes128Gcm::new_from_slice(key).map_err(|e| ClientError::crypto(format!("gcm key setup failed: {e}")))?;
            cipher
                .decrypt(nonce, ciphertext_and_tag)
                .map_err(|_| ClientError::crypto("gcm authentication failed: ciphertext or tag does not match"))
        }
        CipherId::Aes256GcmNoPadding => {
            let cipher =
                Aes256Gcm::new_from_slice(key).map_err(|e| ClientError::crypto(format!("gcm key setup failed: {e}")))?;
            cipher
                .decrypt(nonce, ciphertext_and_tag)
                .map_err(|_| ClientError::crypto("gcm authentication failed: ciphertext or tag does not match"))
        }
        _ => Err(ClientError::crypto("gcm_decrypt_whole requires a GCM cipher id")),
    }
}

/// Verify the encrypt-then-MAC trailer [`EncryptingEntity`] attaches to a
/// non-AEAD ciphertext: HMAC-SHA256 over `iv || ciphertext`, hex-encoded.
/// Mirrors the running digest [`EncryptingEntity::finalize`] produces.
pub fn verify_ctr_hmac(key: &[u8], iv: &[u8], ciphertext: &[u8], expected_hex: &str) -> Result<()> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|e| ClientError::crypto(format!("hmac key setup failed: {e}")))?;
    mac.update(iv);
    mac.update(ciphertext);
    let computed = hex::encode(mac.finalize().into_bytes());
    if computed != expected_hex {
        return Err(ClientError::crypto("hmac verification failed: ciphertext may have been tampered with"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::catalog::lookup;
    use crate::crypto::encrypting_entity::EncryptingEntity;
    use std::io::Cursor;

    #[test]
    fn ctr_decrypt_from_zero_matches_plaintext() {
        let spec = lookup(CipherId::Aes256CtrNoPadding);
        let key = vec![5u8; spec.key_len];
        let iv = vec![9u8; spec.iv_len];
        let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();

        let mut entity = EncryptingEntity::new(spec, key.clone(), iv.clone(), Some(plaintext.len() as u64)).unwrap();
        let ciphertext = entity.encrypt_chunk(&plaintext);
        entity.finalize().unwrap();

        let mut reader = CtrDecryptingReader::new(Cursor::new(ciphertext), &spec, &key, &iv, 0).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn ctr_decrypt_resumes_mid_block() {
        let spec = lookup(CipherId::Aes128CtrNoPadding);
        let key = vec![3u8; spec.key_len];
        let iv = vec![1u8; spec.iv_len];
        let plaintext = vec![77u8; 64];

        let mut entity = EncryptingEntity::new(spec, key.clone(), iv.clone(), Some(64)).unwrap();
        let ciphertext = entity.encrypt_chunk(&plaintext);
        entity.finalize().unwrap();

        let offset = 40u64;
        let resume = ctr_resume_offset(&spec, offset).unwrap();
        let tail = &ciphertext[resume.block_aligned_ciphertext_offset as usize..];
        let mut reader = CtrDecryptingReader::new(Cursor::new(tail.to_vec()), &spec, &key, &iv, offset).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, plaintext[offset as usize..]);
    }

    #[test]
    fn gcm_roundtrip_and_tamper_detection() {
        let spec = lookup(CipherId::Aes256GcmNoPadding);
        let key = vec![2u8; spec.key_len];
        let iv = vec![4u8; spec.iv_len];
        let plaintext = b"top secret payload".to_vec();

        let mut entity = EncryptingEntity::new(spec, key.clone(), iv.clone(), Some(plaintext.len() as u64)).unwrap();
        entity.encrypt_chunk(&plaintext);
        let output = entity.finalize().unwrap();

        let decrypted = gcm_decrypt_whole(&spec, &key, &iv, &output.trailing_sink_bytes).unwrap();
        assert_eq!(decrypted, plaintext);

        let mut tampered = output.trailing_sink_bytes.clone();
        tampered[0] ^= 0xFF;
        assert!(gcm_decrypt_whole(&spec, &key, &iv, &tampered).is_err());
    }
}
