//! Encrypting entity (C7): streams plaintext through a cipher, producing
//! ciphertext plus either an AEAD tag or an encrypt-then-MAC trailer.
//!
//! CTR mode streams incrementally and supports being called once per MPU
//! part, sharing counter state across calls — this is the mode exercised
//! by the encrypted-MPU scenario in §8. GCM's simple `Aead::encrypt`
//! API needs the whole plaintext at once, so GCM mode buffers internally
//! and only produces output at [`EncryptingEntity::finalize`]; it is used
//! for single-request (non-MPU) encrypted PUTs. This split is recorded in
//! DESIGN.md.

use crate::crypto::catalog::{CipherId, CipherSpec};
use crate::error::{ClientError, Result};
use aes::{Aes128, Aes256};
use aes_gcm::aead::{Aead, KeyInit as AeadKeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

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

enum Engine {
    Ctr {
        cipher: CtrCipher,
        mac: Hmac<Sha256>,
    },
    Gcm {
        buffer: Vec<u8>,
    },
}

/// Generate a fresh, cryptographically random IV/nonce sized for `spec`.
pub fn generate_iv(spec: &CipherSpec) -> Vec<u8> {
    let mut iv = vec![0u8; spec.iv_len];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Output of a completed encryption: the IV used, the total plaintext
/// bytes consumed, an HMAC for non-AEAD ciphers (hex, for the
/// `m-encrypt-hmac` metadata header), and any ciphertext bytes that still
/// need to reach the sink (the HMAC trailer for CTR, or the entire
/// ciphertext for GCM, which cannot stream incrementally).
pub struct EncryptionOutput {
    pub iv: Vec<u8>,
    pub plaintext_len: u64,
    pub hmac_hex: Option<String>,
    pub trailing_sink_bytes: Vec<u8>,
}

/// Streams a plaintext source through a cipher, accumulating either an
/// AEAD tag (GCM) or an HMAC trailer (CTR, encrypt-then-MAC) to be
/// attached at [`finalize`](Self::finalize).
pub struct EncryptingEntity {
    spec: CipherSpec,
    iv: Vec<u8>,
    key: Vec<u8>,
    engine: Engine,
    plaintext_len: u64,
    declared_len: Option<u64>,
}

impl EncryptingEntity {
    pub fn new(spec: CipherSpec, key: Vec<u8>, iv: Vec<u8>, declared_len: Option<u64>) -> Result<Self> {
        if key.len() != spec.key_len {
            return Err(ClientError::crypto(format!(
                "key length {} does not match {} (expects {})",
                key.len(),
                spec.id.canonical_name(),
                spec.key_len
            )));
        }
        if iv.len() != spec.iv_len {
            return Err(ClientError::crypto(format!(
                "iv length {} does not match {} (expects {})",
                iv.len(),
                spec.id.canonical_name(),
                spec.iv_len
            )));
        }

        let engine = match spec.id {
            CipherId::Aes128CtrNoPadding => {
                let cipher = Aes128CtrCipher::new_from_slices(&key, &iv)
                    .map_err(|e| ClientError::crypto(format!("ctr cipher setup failed: {e}")))?;
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key)
                    .map_err(|e| ClientError::crypto(format!("hmac key setup failed: {e}")))?;
                mac.update(&iv);
                Engine::Ctr {
                    cipher: CtrCipher::Aes128(cipher),
                    mac,
                }
            }
            CipherId::Aes256CtrNoPadding => {
                let cipher = Aes256CtrCipher::new_from_slices(&key, &iv)
                    .map_err(|e| ClientError::crypto(format!("ctr cipher setup failed: {e}")))?;
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key)
                    .map_err(|e| ClientError::crypto(format!("hmac key setup failed: {e}")))?;
                mac.update(&iv);
                Engine::Ctr {
                    cipher: CtrCipher::Aes256(cipher),
                    mac,
                }
            }
            CipherId::Aes128GcmNoPadding | CipherId::Aes256GcmNoPadding => Engine::Gcm { buffer: Vec::new() },
        };

        Ok(Self {
            spec,
            iv,
            key,
            engine,
            plaintext_len: 0,
            declared_len,
        })
    }

    /// Resume a CTR-mode engine at a given plaintext block offset, for
    /// continuing encryption on a later MPU part with the same IV/key.
    /// Fails for AEAD ciphers, which have no resume point.
    pub fn seek_blocks(&mut self, counter_blocks_advanced: u64) -> Result<()> {
        match &mut self.engine {
            Engine::Ctr { cipher, .. } => {
                cipher.seek(counter_blocks_advanced * self.spec.block_size as u64);
                Ok(())
            }
            Engine::Gcm { .. } => Err(ClientError::crypto("GCM mode has no mid-stream resume point")),
        }
    }

    /// Encrypt one chunk of plaintext. For CTR mode, returns ciphertext
    /// bytes ready to write to the current sink immediately. For GCM mode,
    /// buffers internally and returns an empty vector — GCM's output only
    /// appears at [`finalize`](Self::finalize).
    pub fn encrypt_chunk(&mut self, plaintext: &[u8]) -> Vec<u8> {
        self.plaintext_len += plaintext.len() as u64;
        match &mut self.engine {
            Engine::Ctr { cipher, mac } => {
                let mut buf = plaintext.to_vec();
                cipher.apply_keystream(&mut buf);
                mac.update(&buf);
                buf
            }
            Engine::Gcm { buffer } => {
                buffer.extend_from_slice(plaintext);
                Vec::new()
            }
        }
    }

    /// Finalize the entity: validates the declared plaintext length (if
    /// any) was met exactly, and produces the trailer/ciphertext the
    /// caller still needs to write to the sink.
    pub fn finalize(mut self) -> Result<EncryptionOutput> {
        if let Some(declared) = self.declared_len {
            if declared != self.plaintext_len {
                return Err(ClientError::io(
                    format!(
                        "encrypting entity consumed {} plaintext bytes, expected {declared}",
                        self.plaintext_len
                    ),
                    false,
                )
                .with_context("cipher", self.spec.id.canonical_name()));
            }
        }

        match self.engine {
            Engine::Ctr { mac, .. } => {
                let tag = mac.finalize().into_bytes().to_vec();
                Ok(EncryptionOutput {
                    iv: self.iv,
                    plaintext_len: self.plaintext_len,
                    hmac_hex: Some(hex::encode(&tag)),
                    trailing_sink_bytes: tag,
                })
            }
            Engine::Gcm { buffer } => {
                let nonce = Nonce::from_slice(&self.iv);
                let ciphertext = match self.spec.id {
                    CipherId::Aes128GcmNoPadding => {
                        let cipher = Aes128Gcm::new_from_slice(&self.key)
                            .map_err(|e| ClientError::crypto(format!("gcm key setup failed: {e}")))?;
                        cipher
                            .encrypt(nonce, buffer.as_slice())
                            .map_err(|e| ClientError::crypto(format!("gcm encryption failed: {e}")))?
                    }
                    CipherId::Aes256GcmNoPadding => {
                        let cipher = Aes256Gcm::new_from_slice(&self.key)
                            .map_err(|e| ClientError::crypto(format!("gcm key setup failed: {e}")))?;
                        cipher
                            .encrypt(nonce, buffer.as_slice())
                            .map_err(|e| ClientError::crypto(format!("gcm encryption failed: {e}")))?
                    }
                    _ => unreachable!("GCM engine only built for GCM cipher ids"),
                };
                Ok(EncryptionOutput {
                    iv: self.iv,
                    plaintext_len: self.plaintext_len,
                    hmac_hex: None,
                    trailing_sink_bytes: ciphertext,
                })
            }
        }
    }
}
