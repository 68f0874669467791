//! Top-level client facade: wires the signer, connection policy, HTTP
//! helper, MPU managers, and range reader together behind the verb-level
//! API a caller actually drives.
//!
//! Modeled on a `StorageBackend` trait as the shape a single facade
//! exposes over many collaborators, generalized from an internal storage
//! abstraction to a signed HTTP client; `Client::close` and the
//! account-scoped `uploads`/`stor` home paths follow §5 and §6.

use crate::config::{AuthenticationMode, ClientConfig, KeySource};
use crate::crypto::catalog::{lookup, CipherId};
use crate::crypto::decrypting_reader::{gcm_decrypt_whole, verify_ctr_hmac, CtrDecryptingReader};
use crate::crypto::encrypting_entity::{generate_iv, EncryptingEntity};
use crate::error::{ClientError, Result};
use crate::http::{ConnectionPolicy, HttpHelper, HttpResponse, HttpSigner};
use crate::io::RangeSeekableReader;
use crate::multipart::{header_names, EncryptedMultipartManager, MultipartManager, MultipartState, PartRef, ServerSideMultipartUpload};
use crate::object::{DataSource, ObjectRef, PutRequest, UserMetadata, USER_METADATA_PREFIX};
use crate::path::ObjectPath;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// The top-level client. Cheap to clone (everything behind it is already
/// `Arc`-shared); `close` invalidates the shared connection pool for every
/// clone at once.
#[derive(Clone)]
pub struct Client {
    http: Arc<HttpHelper>,
    multipart: Arc<MultipartManager>,
    encrypted_multipart: Arc<EncryptedMultipartManager>,
    config: ClientConfig,
    closed: Arc<AtomicBool>,
}

impl Client {
    /// Build a client from already-resolved parts, bypassing [`ClientConfig`]
    /// entirely — used when the caller assembles the signer and policy itself.
    pub fn new(base_url: reqwest::Url, account: &str, signer: HttpSigner, policy: ConnectionPolicy, config: ClientConfig) -> Result<Self> {
        let http = Arc::new(HttpHelper::new(base_url, signer, policy)?);
        let uploads_home = ObjectPath::parse(&format!("/{account}/stor"))
            .map_err(|e| ClientError::io(format!("invalid account name {account}: {e}"), false))?;
        let multipart = Arc::new(MultipartManager::new(http.clone(), uploads_home));
        let encrypted_multipart = Arc::new(EncryptedMultipartManager::new(multipart.clone()));
        Ok(Self {
            http,
            multipart,
            encrypted_multipart,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Build a client entirely from [`ClientConfig`] — loads the signing
    /// key, builds the connection policy, and wires the MPU managers.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let base_url = reqwest::Url::parse(&config.endpoint_url)
            .map_err(|e| ClientError::io(format!("invalid endpoint_url: {e}"), false))?;
        let signer = match &config.key_source {
            KeySource::Path { key_path } => {
                HttpSigner::from_key_path(key_path, &config.key_fingerprint, &config.account, config.key_passphrase.as_deref())?
            }
            KeySource::InMemory { key_bytes_base64 } => {
                use base64::engine::general_purpose::STANDARD;
                use base64::Engine as _;
                let bytes = STANDARD
                    .decode(key_bytes_base64)
                    .map_err(|e| ClientError::crypto(format!("key_bytes_base64 is not valid base64: {e}")))?;
                HttpSigner::from_pem_bytes(&bytes, &config.key_fingerprint, &config.account, config.key_passphrase.as_deref())?
            }
        };
        let policy = ConnectionPolicy {
            max_connections: config.max_connections,
            connect_timeout: Duration::from_secs(4),
            socket_timeout: Duration::from_secs(config.socket_timeout_secs),
            max_retries: config.retry_count,
        };
        let account = config.account.clone();
        Self::new(base_url, &account, signer, policy, config)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::io("client has been closed", false));
        }
        Ok(())
    }

    /// Shuts down the shared connection pool and invalidates every
    /// outstanding range reader and clone of this client, per §5.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    // === Object verbs (§4.4, §4.11) ===

    #[instrument(skip(self), fields(path = %path))]
    pub fn head(&self, path: &ObjectPath) -> Result<ObjectRef> {
        self.ensure_open()?;
        let response = self.http.head(&path.encode())?;
        if !response.is_success() {
            return Err(ClientError::http_response(response.status, "head failed").with_context("path", path.as_str()));
        }
        Ok(object_ref_from_response(path.clone(), &response))
    }

    /// Open a read-only, lazily-connected byte channel over the object.
    /// Returns raw bytes as stored — for a CSE object that means
    /// ciphertext; use [`get_decrypted`](Self::get_decrypted) to transparently decrypt.
    pub fn get(&self, path: &ObjectPath) -> Result<RangeSeekableReader> {
        self.ensure_open()?;
        Ok(RangeSeekableReader::new(self.http.clone(), path.encode(), 0))
    }

    #[instrument(skip(self), fields(path = %path))]
    pub fn delete(&self, path: &ObjectPath) -> Result<()> {
        self.ensure_open()?;
        let response = self.http.delete(&path.encode())?;
        if !response.is_success() && response.status != 404 {
            return Err(ClientError::http_response(response.status, "delete failed").with_context("path", path.as_str()));
        }
        Ok(())
    }

    pub fn post(&self, path: &ObjectPath, json_body: &[u8]) -> Result<HttpResponse> {
        self.ensure_open()?;
        self.http.post_json(&path.encode(), json_body)
    }

    /// PUT a single-shot object. When client-side encryption is enabled in
    /// configuration, the body is transparently encrypted before it leaves
    /// the client and the CSE metadata headers from §6 are attached —
    /// scoped to this single request, not MPU (see DESIGN.md for why GCM
    /// mode can only be used here and not across MPU parts).
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub fn put(&self, request: PutRequest) -> Result<ObjectRef> {
        self.ensure_open()?;
        let PutRequest {
            path,
            source,
            content_type,
            metadata,
            location,
        } = request;
        let plaintext = read_data_source(source)?;

        let mut extra_headers: Vec<(String, String)> = metadata.to_headers();
        if let Some(loc) = &location {
            extra_headers.push(("Location".to_string(), loc.clone()));
        }

        let (body, resolved_content_type) = if self.config.encryption.enabled && location.is_none() {
            let (ciphertext, cse_headers, ct) = self.encrypt_for_put(plaintext, content_type)?;
            extra_headers.extend(cse_headers);
            (ciphertext, ct)
        } else {
            (plaintext, content_type)
        };

        let header_refs: Vec<(&str, String)> = extra_headers.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let response = self.http.put_with_digest(&path.encode(), body, resolved_content_type.as_deref(), &header_refs)?;
        Ok(object_ref_from_response(path, &response))
    }

    fn encrypt_for_put(&self, plaintext: Vec<u8>, content_type: Option<String>) -> Result<(Vec<u8>, Vec<(String, String)>, Option<String>)> {
        let spec_id = CipherId::parse(&self.config.encryption.algorithm)?;
        let spec = lookup(spec_id);
        let key = self.encryption_key()?;
        let key_id = self
            .config
            .encryption
            .key_id
            .clone()
            .ok_or_else(|| ClientError::crypto("encryption enabled but no encryption_key_id configured"))?;
        let iv = generate_iv(&spec);

        let mut entity = EncryptingEntity::new(spec, key, iv.clone(), Some(plaintext.len() as u64))?;
        let mut ciphertext = entity.encrypt_chunk(&plaintext);
        let output = entity.finalize()?;
        ciphertext.extend_from_slice(&output.trailing_sink_bytes);

        let mut headers = vec![
            (header_names::KEY_ID.to_string(), key_id),
            (header_names::CIPHER.to_string(), spec_id.canonical_name().to_string()),
            (header_names::IV.to_string(), hex::encode(&iv)),
            (header_names::PLAINTEXT_CONTENT_LENGTH.to_string(), output.plaintext_len.to_string()),
        ];
        if spec.aead {
            headers.push((header_names::AEAD_TAG_LENGTH.to_string(), spec.tag_or_mac_len.to_string()));
        } else if let Some(hmac_hex) = output.hmac_hex {
            headers.push((header_names::HMAC.to_string(), hmac_hex));
        }

        Ok((ciphertext, headers, content_type.or_else(|| Some("application/octet-stream".to_string()))))
    }

    fn encryption_key(&self) -> Result<Vec<u8>> {
        let source = self
            .config
            .encryption
            .key_source
            .as_ref()
            .ok_or_else(|| ClientError::crypto("encryption enabled but no encryption key source configured"))?;
        load_key_bytes(source)
    }

    pub fn put_directory(&self, path: ObjectPath) -> Result<ObjectRef> {
        self.put(PutRequest::directory(path))
    }

    pub fn put_snaplink(&self, path: ObjectPath, target: &ObjectPath) -> Result<ObjectRef> {
        self.put(PutRequest::snaplink(path, target))
    }

    /// Download and transparently decrypt a CSE object in full, verifying
    /// the encrypt-then-MAC trailer (CTR) or AEAD tag (GCM) per the
    /// configured [`AuthenticationMode`].
    #[instrument(skip(self), fields(path = %path))]
    pub fn get_decrypted(&self, path: &ObjectPath) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let head = self.head(path)?;
        let (spec, key, iv, iv_prefix_len) = self.cse_params(&head.headers.extra, path)?;

        let response = self.http.get(&path.encode())?;
        if !response.is_success() {
            return Err(ClientError::http_response(response.status, "get failed").with_context("path", path.as_str()));
        }
        if response.body.len() < iv_prefix_len {
            return Err(ClientError::crypto("object body shorter than its embedded iv prefix").with_context("path", path.as_str()));
        }
        let body = &response.body[iv_prefix_len..];

        if spec.aead {
            return gcm_decrypt_whole(&spec, &key, &iv, body);
        }

        let hmac_hex = head.headers.extra.get(header_names::HMAC);
        if body.len() < spec.tag_or_mac_len {
            return Err(ClientError::crypto("object body shorter than the expected hmac trailer"));
        }
        let (ciphertext, trailer) = body.split_at(body.len() - spec.tag_or_mac_len);
        match (self.config.encryption.authentication_mode, hmac_hex) {
            (_, Some(expected)) => verify_ctr_hmac(&key, &iv, ciphertext, expected)?,
            (AuthenticationMode::Mandatory, None) => {
                return Err(ClientError::crypto("Mandatory authentication mode requires m-encrypt-hmac but object has none").with_context("path", path.as_str()));
            }
            (AuthenticationMode::Optional, None) => {
                warn!(path = %path, "downloading CSE object with no hmac trailer under Optional authentication mode");
            }
        }

        let mut reader = CtrDecryptingReader::new(Cursor::new(ciphertext.to_vec()), &spec, &key, &iv, 0)?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).map_err(|e| ClientError::io(e.to_string(), false))?;
        Ok(out)
    }

    /// Decrypt a byte range `[start, start+len)` of a CTR-mode CSE object
    /// without downloading the whole thing. AEAD ciphers have no
    /// random-access resume point (see [`crate::crypto::catalog::ctr_resume_offset`])
    /// and are rejected.
    #[instrument(skip(self), fields(path = %path, start, len))]
    pub fn get_decrypted_range(&self, path: &ObjectPath, start: u64, len: u64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let head = self.head(path)?;
        let (spec, key, iv, iv_prefix_len) = self.cse_params(&head.headers.extra, path)?;
        if spec.aead {
            return Err(ClientError::crypto("AEAD ciphers do not support ranged decryption").with_context("path", path.as_str()));
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let resume = crate::crypto::catalog::ctr_resume_offset(&spec, start)?;
        let ciphertext_start = resume.block_aligned_ciphertext_offset + iv_prefix_len as u64;
        let end_inclusive = ciphertext_start + resume.skip_within_block as u64 + len - 1;
        let response = self.http.get_range(&path.encode(), ciphertext_start, Some(end_inclusive))?;
        if !response.is_success() {
            return Err(ClientError::http_response(response.status, "ranged get failed").with_context("path", path.as_str()));
        }

        let mut reader = CtrDecryptingReader::new(Cursor::new(response.body), &spec, &key, &iv, start)?;
        let mut out = vec![0u8; len as usize];
        reader.read_exact(&mut out).map_err(|e| ClientError::io(e.to_string(), false))?;
        Ok(out)
    }

    /// Resolve CSE parameters from an object's HEAD headers, plus how many
    /// leading bytes of the body are an embedded IV rather than
    /// ciphertext. An MPU-produced object (C10) carries the IV as a
    /// block-sized prefix ahead of its ciphertext; a single-request PUT
    /// (C7) never does. Both layouts carry identical `m-encrypt-*`
    /// headers, so the two are told apart by comparing the object's total
    /// size against `plaintext-length + tag-or-mac-length` (no prefix)
    /// versus `iv-length + plaintext-length + tag-or-mac-length` (prefixed).
    fn cse_params(&self, headers: &BTreeMap<String, String>, path: &ObjectPath) -> Result<(crate::crypto::CipherSpec, Vec<u8>, Vec<u8>, usize)> {
        let cipher_name = headers
            .get(header_names::CIPHER)
            .ok_or_else(|| ClientError::crypto("object has no CSE metadata").with_context("path", path.as_str()))?;
        let spec_id = CipherId::parse(cipher_name)?;
        let spec = lookup(spec_id);

        let key_id_header = headers.get(header_names::KEY_ID).cloned().unwrap_or_default();
        if let Some(configured_id) = &self.config.encryption.key_id {
            if configured_id != &key_id_header {
                return Err(ClientError::crypto("object was encrypted with a different key id")
                    .with_context("expected", configured_id.clone())
                    .with_context("actual", key_id_header));
            }
        }

        let iv_hex = headers.get(header_names::IV).ok_or_else(|| ClientError::crypto("missing m-encrypt-iv header"))?;
        let iv = hex::decode(iv_hex).map_err(|e| ClientError::crypto(format!("malformed iv: {e}")))?;
        let key = self.encryption_key()?;

        let iv_prefix_len = if spec.aead {
            0
        } else {
            let total_len: Option<u64> = headers.get("content-length").and_then(|v| v.parse().ok());
            let plaintext_len: Option<u64> = headers.get(header_names::PLAINTEXT_CONTENT_LENGTH).and_then(|v| v.parse().ok());
            match (total_len, plaintext_len) {
                (Some(total), Some(plain)) if total == plain + spec.iv_len as u64 + spec.tag_or_mac_len as u64 => spec.iv_len,
                _ => 0,
            }
        };

        Ok((spec, key, iv, iv_prefix_len))
    }

    // === Server-side multipart upload (C9) ===

    pub fn initiate_multipart_upload(&self, path: &ObjectPath, headers: BTreeMap<String, String>, metadata: &UserMetadata) -> Result<ServerSideMultipartUpload> {
        self.ensure_open()?;
        self.multipart.initiate(path, headers, metadata)
    }

    pub fn upload_part(&self, upload: &ServerSideMultipartUpload, part_number: u32, bytes: Vec<u8>, is_last: bool) -> Result<PartRef> {
        self.ensure_open()?;
        self.multipart.upload_part(upload, part_number, bytes, is_last)
    }

    pub fn list_parts(&self, upload: &ServerSideMultipartUpload) -> Result<Vec<PartRef>> {
        self.multipart.list_parts(upload)
    }

    pub fn get_multipart_status(&self, upload: &ServerSideMultipartUpload) -> Result<MultipartState> {
        self.multipart.get_status(upload)
    }

    pub fn abort_multipart_upload(&self, upload: &ServerSideMultipartUpload) -> Result<()> {
        self.multipart.abort(upload)
    }

    pub fn complete_multipart_upload(&self, upload: &ServerSideMultipartUpload, parts: Vec<PartRef>) -> Result<()> {
        self.multipart.complete(upload, parts)
    }

    pub fn validate_sequential_part_numbers(&self, upload: &ServerSideMultipartUpload) -> Result<Vec<PartRef>> {
        self.multipart.validate_sequential_part_numbers(upload)
    }

    pub fn wait_for_multipart_completion(
        &self,
        upload: &ServerSideMultipartUpload,
        interval: Duration,
        max_polls: u32,
        on_timeout: impl FnOnce() -> Result<MultipartState>,
    ) -> Result<MultipartState> {
        self.multipart.wait_for_completion(upload, interval, max_polls, on_timeout)
    }

    pub fn list_in_progress_uploads(&self) -> Result<Vec<ServerSideMultipartUpload>> {
        self.multipart.list_in_progress()
    }

    // === Encrypted multipart upload (C10) ===

    pub fn initiate_encrypted_multipart_upload(
        &self,
        path: &ObjectPath,
        cipher_id: CipherId,
        key: Vec<u8>,
        key_id: &str,
        headers: BTreeMap<String, String>,
        metadata: &UserMetadata,
    ) -> Result<ServerSideMultipartUpload> {
        self.ensure_open()?;
        self.encrypted_multipart.initiate(path, cipher_id, key, key_id, headers, metadata)
    }

    pub fn upload_encrypted_part(&self, upload: &ServerSideMultipartUpload, part_number: u32, plaintext: Vec<u8>, is_last: bool) -> Result<Option<PartRef>> {
        self.ensure_open()?;
        self.encrypted_multipart.upload_part(upload, part_number, plaintext, is_last)
    }

    pub fn complete_encrypted_multipart_upload(&self, upload: &ServerSideMultipartUpload, parts: Vec<PartRef>) -> Result<BTreeMap<String, String>> {
        self.encrypted_multipart.complete(upload, parts)
    }

    pub fn abort_encrypted_multipart_upload(&self, upload: &ServerSideMultipartUpload) -> Result<()> {
        self.encrypted_multipart.abort(upload)
    }
}

fn object_ref_from_response(path: ObjectPath, response: &HttpResponse) -> ObjectRef {
    let mut obj = ObjectRef::new(path);
    obj.headers.content_type = response.header("content-type").map(|s| s.to_string());
    obj.headers.content_length = response.header("content-length").and_then(|v| v.parse().ok());
    obj.headers.etag = response.header("etag").map(|s| s.trim_matches('"').to_string());
    obj.headers.content_md5 = response.header("content-md5").map(|s| s.to_string());
    for (k, v) in &response.headers {
        obj.headers.extra.insert(k.clone(), v.clone());
    }
    obj.metadata = UserMetadata::from_headers(
        response
            .headers
            .iter()
            .filter(|(k, _)| k.starts_with(USER_METADATA_PREFIX) && !k.starts_with("m-encrypt-"))
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
    obj
}

fn read_data_source(source: DataSource) -> Result<Vec<u8>> {
    match source {
        DataSource::Bytes(b) => Ok(b),
        DataSource::String(s) => Ok(s.into_bytes()),
        DataSource::File(p) => std::fs::read(&p).map_err(|e| ClientError::io(format!("failed to read {}: {e}", p.display()), false)),
        DataSource::Stream(mut r) => {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf).map_err(|e| ClientError::io(e.to_string(), false))?;
            Ok(buf)
        }
    }
}

fn load_key_bytes(source: &KeySource) -> Result<Vec<u8>> {
    match source {
        KeySource::Path { key_path } => std::fs::read(key_path).map_err(|e| ClientError::crypto(format!("failed to read encryption key file {}: {e}", key_path.display()))),
        KeySource::InMemory { key_bytes_base64 } => {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine as _;
            STANDARD
                .decode(key_bytes_base64)
                .map_err(|e| ClientError::crypto(format!("encryption key_bytes_base64 is not valid base64: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncryptionConfig;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::RsaPrivateKey;

    fn test_config(url: &str, encryption: EncryptionConfig) -> ClientConfig {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF).unwrap();
        ClientConfig {
            endpoint_url: url.to_string(),
            account: "u".to_string(),
            key_fingerprint: "ab:cd:12:34:56:78:90:ab:cd:ef:01:23:45:67:89:ab".to_string(),
            key_source: KeySource::InMemory {
                key_bytes_base64: {
                    use base64::engine::general_purpose::STANDARD;
                    use base64::Engine as _;
                    STANDARD.encode(pem.as_bytes())
                },
            },
            key_passphrase: None,
            retry_count: 1,
            max_connections: 4,
            socket_timeout_secs: 5,
            validate_uploads: true,
            encryption,
        }
    }

    #[test]
    fn put_and_head_round_trip_without_encryption() {
        let mut server = mockito::Server::new();
        let _put = server
            .mock("PUT", "/u/stor/obj")
            .with_status(204)
            .with_header("etag", "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"")
            .create();
        let _head = server
            .mock("HEAD", "/u/stor/obj")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_header("content-length", "11")
            .create();

        let client = Client::from_config(test_config(&server.url(), EncryptionConfig::default())).unwrap();
        let path = ObjectPath::parse("/u/stor/obj").unwrap();
        let put_result = client.put(PutRequest::new(path.clone(), DataSource::Bytes(b"hello world".to_vec())));
        assert!(put_result.is_ok());

        let head_result = client.head(&path).unwrap();
        assert_eq!(head_result.headers.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn put_with_encryption_attaches_cse_headers() {
        let mut server = mockito::Server::new();
        let _put = server
            .mock("PUT", "/u/stor/secret")
            .with_status(204)
            .with_header("etag", "\"ignored\"")
            .create();

        let encryption = EncryptionConfig {
            enabled: true,
            algorithm: "AES256/CTR/NoPadding".to_string(),
            authentication_mode: AuthenticationMode::Mandatory,
            permit_unencrypted_downloads: false,
            key_id: Some("key-1".to_string()),
            key_source: Some(KeySource::InMemory {
                key_bytes_base64: {
                    use base64::engine::general_purpose::STANDARD;
                    use base64::Engine as _;
                    STANDARD.encode([7u8; 32])
                },
            }),
        };
        let client = Client::from_config(test_config(&server.url(), encryption)).unwrap();
        let path = ObjectPath::parse("/u/stor/secret").unwrap();
        let result = client.put(PutRequest::new(path, DataSource::Bytes(b"top secret".to_vec())));
        assert!(result.is_ok());
    }

    #[test]
    fn get_decrypted_round_trips_ctr_object() {
        let mut server = mockito::Server::new();
        let key = vec![9u8; 32];
        let spec = lookup(CipherId::Aes256CtrNoPadding);
        let iv = generate_iv(&spec);
        let plaintext = b"confidential payload".to_vec();
        let mut entity = EncryptingEntity::new(spec, key.clone(), iv.clone(), Some(plaintext.len() as u64)).unwrap();
        let mut ciphertext = entity.encrypt_chunk(&plaintext);
        let output = entity.finalize().unwrap();
        ciphertext.extend_from_slice(&output.trailing_sink_bytes);

        let _head = server
            .mock("HEAD", "/u/stor/secret")
            .with_status(200)
            .with_header(header_names::CIPHER, "AES256/CTR/NoPadding")
            .with_header(header_names::KEY_ID, "key-1")
            .with_header(header_names::IV, &hex::encode(&iv))
            .with_header(header_names::HMAC, &output.hmac_hex.clone().unwrap())
            .create();
        let _get = server.mock("GET", "/u/stor/secret").with_status(200).with_body(ciphertext).create();

        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        let encryption = EncryptionConfig {
            enabled: true,
            algorithm: "AES256/CTR/NoPadding".to_string(),
            authentication_mode: AuthenticationMode::Mandatory,
            permit_unencrypted_downloads: false,
            key_id: Some("key-1".to_string()),
            key_source: Some(KeySource::InMemory {
                key_bytes_base64: STANDARD.encode(&key),
            }),
        };
        let client = Client::from_config(test_config(&server.url(), encryption)).unwrap();
        let path = ObjectPath::parse("/u/stor/secret").unwrap();
        let decrypted = client.get_decrypted(&path).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn closed_client_rejects_further_requests() {
        let server = mockito::Server::new();
        let client = Client::from_config(test_config(&server.url(), EncryptionConfig::default())).unwrap();
        client.close();
        let path = ObjectPath::parse("/u/stor/x").unwrap();
        assert!(client.head(&path).is_err());
    }
}
