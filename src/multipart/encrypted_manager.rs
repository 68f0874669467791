//! Encrypted MPU manager (C10): overlays the server-side MPU manager with
//! a per-upload [`EncryptingEntity`], feeding its output through a
//! [`MultipartOutputStream`] so every part but the last lands on a
//! cipher-block boundary. The first part's ciphertext carries the IV as
//! a leading block, so the object body is self-describing without
//! requiring the IV header to be read first.
//!
//! No unencrypted multipart store encrypts on its own; built from §4.10's
//! state-machine text and composed from C7/C8/C9, following the same
//! "hold a context per in-flight operation" shape as a `MultipartStore`'s
//! internal upload map.

use crate::crypto::catalog::{lookup, CipherId};
use crate::crypto::encrypting_entity::{generate_iv, EncryptingEntity};
use crate::error::{ClientError, Result};
use crate::io::MultipartOutputStream;
use crate::multipart::manager::{MultipartManager, MAX_PART_NUMBER, MIN_PART_SIZE};
use crate::multipart::types::{PartRef, ServerSideMultipartUpload};
use crate::object::UserMetadata;
use crate::path::ObjectPath;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// CSE metadata header names, exact strings per §6.
pub mod header_names {
    pub const KEY_ID: &str = "m-encrypt-key-id";
    pub const CIPHER: &str = "m-encrypt-cipher";
    pub const IV: &str = "m-encrypt-iv";
    pub const PLAINTEXT_CONTENT_LENGTH: &str = "m-encrypt-plaintext-content-length";
    pub const AEAD_TAG_LENGTH: &str = "m-encrypt-aead-tag-length";
    pub const HMAC: &str = "m-encrypt-hmac";
}

struct EncryptionSession {
    cipher_id: CipherId,
    iv: Vec<u8>,
    key_id: String,
    output_stream: MultipartOutputStream,
    entity: EncryptingEntity,
    next_part_number: u32,
}

/// Overlays [`MultipartManager`] with transparent client-side encryption.
/// One [`EncryptionSession`] is held per in-flight upload, keyed by upload
/// id; parts for a given upload must be driven from a single thread in
/// ascending order (§5's concurrency model forbids parallel part
/// encryption of the same object, since it would race on shared cipher
/// state).
pub struct EncryptedMultipartManager {
    base: Arc<MultipartManager>,
    sessions: Mutex<HashMap<Uuid, EncryptionSession>>,
}

impl EncryptedMultipartManager {
    pub fn new(base: Arc<MultipartManager>) -> Self {
        Self {
            base,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin an encrypted multipart upload. Generates a fresh IV, records
    /// the cipher metadata headers that are knowable up front, and
    /// delegates to the base manager's `initiate`.
    pub fn initiate(
        &self,
        object_path: &ObjectPath,
        cipher_id: CipherId,
        key: Vec<u8>,
        key_id: &str,
        mut headers: BTreeMap<String, String>,
        metadata: &UserMetadata,
    ) -> Result<ServerSideMultipartUpload> {
        let spec = lookup(cipher_id);
        if key.len() != spec.key_len {
            return Err(ClientError::crypto(format!(
                "key length {} does not match {}",
                key.len(),
                cipher_id.canonical_name()
            )));
        }
        let iv = generate_iv(&spec);

        headers.insert(header_names::KEY_ID.to_string(), key_id.to_string());
        headers.insert(header_names::CIPHER.to_string(), cipher_id.canonical_name().to_string());
        headers.insert(header_names::IV.to_string(), hex::encode(&iv));

        let upload = self.base.initiate(object_path, headers, metadata)?;

        let entity = EncryptingEntity::new(spec, key, iv.clone(), None)?;
        let session = EncryptionSession {
            cipher_id,
            iv,
            key_id: key_id.to_string(),
            output_stream: MultipartOutputStream::new(spec.block_size),
            entity,
            next_part_number: 1,
        };
        self.sessions.lock().insert(upload.id, session);

        info!(upload_id = %upload.id, cipher = cipher_id.canonical_name(), "encrypted multipart upload initiated");
        Ok(upload)
    }

    /// Encrypt and upload one plaintext part. The actual HTTP part body
    /// may be shorter than `plaintext` — the non-block-aligned tail is
    /// buffered and prefixed onto the next part instead, per C8. The very
    /// first part additionally carries the IV as a block-sized prefix
    /// ahead of its ciphertext, per §4.10 — unlike a single-request PUT
    /// (C7), an MPU object's IV travels in the object body itself, not
    /// only in its metadata headers.
    pub fn upload_part(&self, upload: &ServerSideMultipartUpload, part_number: u32, plaintext: Vec<u8>, is_last: bool) -> Result<Option<PartRef>> {
        if !is_last && (plaintext.len() as u64) < MIN_PART_SIZE {
            return Err(ClientError::multipart(format!(
                "plaintext part {part_number} is {} bytes, below the {MIN_PART_SIZE}-byte minimum",
                plaintext.len()
            )));
        }

        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&upload.id)
            .ok_or_else(|| ClientError::multipart("upload_part called on an unknown or already-finished upload"))?;

        if part_number != session.next_part_number {
            return Err(ClientError::multipart(format!(
                "parts must be encrypted in ascending order: expected part {}, got {part_number}",
                session.next_part_number
            )));
        }

        let mut ciphertext = session.entity.encrypt_chunk(&plaintext);
        if part_number == 1 {
            let mut prefixed = session.iv.clone();
            prefixed.extend_from_slice(&ciphertext);
            ciphertext = prefixed;
        }

        let handle = SharedVecSink::default();
        session.output_stream.set_next(Box::new(handle.clone()));
        session.output_stream.write(&ciphertext)?;
        session.output_stream.flush_buffer()?;
        let emitted = handle.take();
        session.next_part_number += 1;

        if emitted.is_empty() {
            return Ok(None);
        }
        let part = self.base.upload_part(upload, part_number, emitted, is_last)?;
        Ok(Some(part))
    }

    /// Finalize encryption: emits the remaining buffered ciphertext plus
    /// the AEAD tag or HMAC trailer as one synthetic last part, commits
    /// the upload, and returns the CSE metadata headers the caller should
    /// apply to the finished object (plaintext length and either the tag
    /// length or the HMAC value — these are only known once encryption is
    /// complete, so unlike the headers set at `initiate`, the wire
    /// protocol shown gives no mechanism to attach them before commit).
    pub fn complete(&self, upload: &ServerSideMultipartUpload, mut parts: Vec<PartRef>) -> Result<BTreeMap<String, String>> {
        let mut sessions = self.sessions.lock();
        let mut session = sessions
            .remove(&upload.id)
            .ok_or_else(|| ClientError::multipart("complete called on an unknown or already-finished upload"))?;
        drop(sessions);

        let spec = lookup(session.cipher_id);
        let tail_part_number = session.next_part_number;
        if tail_part_number > MAX_PART_NUMBER {
            return Err(ClientError::multipart(format!(
                "synthetic trailer part would exceed the {MAX_PART_NUMBER}-part limit"
            )));
        }

        let output = session.entity.finalize()?;

        let handle = SharedVecSink::default();
        session.output_stream.set_next(Box::new(handle.clone()));
        session.output_stream.write(&output.trailing_sink_bytes)?;
        session.output_stream.flush_final()?;
        let tail_bytes = handle.take();

        if !tail_bytes.is_empty() {
            let tail_part = self.base.upload_part(upload, tail_part_number, tail_bytes, true)?;
            parts.push(tail_part);
        }

        self.base.complete(upload, parts)?;

        let mut metadata_headers = BTreeMap::new();
        metadata_headers.insert(header_names::KEY_ID.to_string(), session.key_id.clone());
        metadata_headers.insert(header_names::CIPHER.to_string(), session.cipher_id.canonical_name().to_string());
        metadata_headers.insert(header_names::IV.to_string(), hex::encode(&session.iv));
        metadata_headers.insert(header_names::PLAINTEXT_CONTENT_LENGTH.to_string(), output.plaintext_len.to_string());
        if spec.aead {
            metadata_headers.insert(header_names::AEAD_TAG_LENGTH.to_string(), spec.tag_or_mac_len.to_string());
        } else if let Some(hmac_hex) = output.hmac_hex {
            metadata_headers.insert(header_names::HMAC.to_string(), hmac_hex);
        }

        info!(upload_id = %upload.id, plaintext_len = output.plaintext_len, "encrypted multipart upload completed");
        Ok(metadata_headers)
    }

    pub fn abort(&self, upload: &ServerSideMultipartUpload) -> Result<()> {
        self.sessions.lock().remove(&upload.id);
        self.base.abort(upload)
    }
}

/// An in-memory sink for [`MultipartOutputStream`], shared between the
/// handle handed to the stream (as a boxed trait object) and the handle
/// kept here to read the accumulated bytes back out once the stream has
/// finished writing to it.
#[derive(Default, Clone)]
struct SharedVecSink(Arc<Mutex<Vec<u8>>>);

impl SharedVecSink {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock())
    }
}

impl std::io::Write for SharedVecSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
