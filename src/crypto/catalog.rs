//! Cipher catalog (C6): registry of supported cipher identifiers and
//! their layout parameters.
//!
//! Built directly from §4.6's contract, structured the way a `meta_keys`
//! module collects related constants into one lookup table.

use crate::error::{ClientError, Result};

/// Canonical cipher identifiers this catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    Aes128CtrNoPadding,
    Aes256CtrNoPadding,
    Aes128GcmNoPadding,
    Aes256GcmNoPadding,
}

impl CipherId {
    pub fn canonical_name(self) -> &'static str {
        match self {
            CipherId::Aes128CtrNoPadding => "AES128/CTR/NoPadding",
            CipherId::Aes256CtrNoPadding => "AES256/CTR/NoPadding",
            CipherId::Aes128GcmNoPadding => "AES128/GCM/NoPadding",
            CipherId::Aes256GcmNoPadding => "AES256/GCM/NoPadding",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        CIPHER_CATALOG
            .iter()
            .find(|spec| spec.id.canonical_name() == name)
            .map(|spec| spec.id)
            .ok_or_else(|| ClientError::crypto(format!("unsupported cipher: {name}")))
    }

    pub fn is_aead(self) -> bool {
        matches!(self, CipherId::Aes128GcmNoPadding | CipherId::Aes256GcmNoPadding)
    }
}

/// Layout parameters for one cipher identifier.
#[derive(Debug, Clone, Copy)]
pub struct CipherSpec {
    pub id: CipherId,
    pub key_len: usize,
    pub block_size: usize,
    pub iv_len: usize,
    /// AEAD tag length (GCM) or HMAC trailer length (encrypt-then-MAC).
    pub tag_or_mac_len: usize,
    pub aead: bool,
    /// Generous but finite bound: CTR-mode counter overflow, GCM's
    /// 2^39-256 bit plaintext limit expressed in bytes.
    pub max_plaintext_len: u64,
}

pub const CIPHER_CATALOG: &[CipherSpec] = &[
    CipherSpec {
        id: CipherId::Aes128CtrNoPadding,
        key_len: 16,
        block_size: 16,
        iv_len: 16,
        tag_or_mac_len: 32, // HMAC-SHA256
        aead: false,
        max_plaintext_len: u64::MAX,
    },
    CipherSpec {
        id: CipherId::Aes256CtrNoPadding,
        key_len: 32,
        block_size: 16,
        iv_len: 16,
        tag_or_mac_len: 32,
        aead: false,
        max_plaintext_len: u64::MAX,
    },
    CipherSpec {
        id: CipherId::Aes128GcmNoPadding,
        key_len: 16,
        block_size: 16,
        iv_len: 12,
        tag_or_mac_len: 16,
        aead: true,
        max_plaintext_len: (1u64 << 36) - 32,
    },
    CipherSpec {
        id: CipherId::Aes256GcmNoPadding,
        key_len: 32,
        block_size: 16,
        iv_len: 12,
        tag_or_mac_len: 16,
        aead: true,
        max_plaintext_len: (1u64 << 36) - 32,
    },
];

pub fn lookup(id: CipherId) -> CipherSpec {
    *CIPHER_CATALOG
        .iter()
        .find(|spec| spec.id == id)
        .expect("CIPHER_CATALOG covers every CipherId variant")
}

/// How far into the ciphertext (block-aligned) a CTR-mode reader must seek,
/// and how many leading bytes of that block to discard, to land exactly on
/// plaintext offset `plaintext_offset`. GCM has no equivalent resume point —
/// callers must always decrypt from the start.
pub struct CtrResumeOffset {
    pub block_aligned_ciphertext_offset: u64,
    pub skip_within_block: usize,
    pub counter_blocks_advanced: u64,
}

pub fn ctr_resume_offset(spec: &CipherSpec, plaintext_offset: u64) -> Result<CtrResumeOffset> {
    if spec.aead {
        return Err(ClientError::crypto("AEAD ciphers do not support random-access resume"));
    }
    let block_size = spec.block_size as u64;
    let counter_blocks_advanced = plaintext_offset / block_size;
    let skip_within_block = (plaintext_offset % block_size) as usize;
    Ok(CtrResumeOffset {
        block_aligned_ciphertext_offset: counter_blocks_advanced * block_size,
        skip_within_block,
        counter_blocks_advanced,
    })
}
