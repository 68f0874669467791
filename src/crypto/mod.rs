//! Client-side encryption: the cipher catalog (C6), the streaming
//! encrypting entity (C7), and its download-side decrypting counterpart.

pub mod catalog;
pub mod decrypting_reader;
pub mod encrypting_entity;

pub use catalog::{ctr_resume_offset, CipherId, CipherSpec, CIPHER_CATALOG};
pub use decrypting_reader::{gcm_decrypt_whole, CtrDecryptingReader};
pub use encrypting_entity::{EncryptingEntity, EncryptionOutput};
