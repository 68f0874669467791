//! End-to-end scenarios driven through the public [`Client`] facade,
//! covering the MPU happy path and the encrypted-MPU-plus-ranged-GET
//! scenario that no single module's unit tests exercise start to finish.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use stratum_client::config::{AuthenticationMode, EncryptionConfig, KeySource};
use stratum_client::crypto::{CipherId, CIPHER_CATALOG};
use stratum_client::{Client, ClientConfig, ObjectPath, UserMetadata};
use uuid::Uuid;

fn test_rsa_pem_base64() -> String {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let pem = key.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF).unwrap();
    STANDARD.encode(pem.as_bytes())
}

fn test_config(url: &str, encryption: EncryptionConfig) -> ClientConfig {
    ClientConfig {
        endpoint_url: url.to_string(),
        account: "u".to_string(),
        key_fingerprint: "ab:cd:12:34:56:78:90:ab:cd:ef:01:23:45:67:89:ab".to_string(),
        key_source: KeySource::InMemory {
            key_bytes_base64: test_rsa_pem_base64(),
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
fn mpu_happy_path_round_trips_through_the_public_client() {
    let mut server = mockito::Server::new();
    let client = Client::from_config(test_config(&server.url(), EncryptionConfig::default())).unwrap();

    let upload_id = Uuid::new_v4();
    let parts_directory = format!("/u/stor/uploads/{}/{}", &upload_id.to_string()[..1], upload_id);
    let _initiate = server
        .mock("POST", "/u/stor/uploads")
        .with_status(201)
        .with_body(serde_json::json!({ "id": upload_id, "partsDirectory": parts_directory }).to_string())
        .create();

    let part1 = vec![0xABu8; 5 * 1024 * 1024];
    let part2 = vec![0xCDu8; 5 * 1024 * 1024];
    let _put1 = server
        .mock("PUT", format!("{parts_directory}/1").as_str())
        .with_status(204)
        .with_header("etag", "\"part-1\"")
        .create();
    let _put2 = server
        .mock("PUT", format!("{parts_directory}/2").as_str())
        .with_status(204)
        .with_header("etag", "\"part-2\"")
        .create();
    let _commit = server
        .mock("POST", format!("{parts_directory}/commit").as_str())
        .match_body(mockito::Matcher::Json(serde_json::json!({ "parts": ["part-1", "part-2"] })))
        .with_status(204)
        .create();
    let _list_in_progress = server.mock("GET", "/u/stor/uploads").with_status(200).with_body("").create();

    let path = ObjectPath::parse("/u/stor/obj").unwrap();
    let upload = client.initiate_multipart_upload(&path, Default::default(), &UserMetadata::new()).unwrap();
    let p1 = client.upload_part(&upload, 1, part1, false).unwrap();
    let p2 = client.upload_part(&upload, 2, part2, true).unwrap();
    client.complete_multipart_upload(&upload, vec![p1, p2]).unwrap();

    let in_progress = client.list_in_progress_uploads().unwrap();
    assert!(in_progress.is_empty());
}

#[test]
fn encrypted_mpu_then_ranged_get_decrypts_correctly() {
    let mut server = mockito::Server::new();
    let encryption = EncryptionConfig {
        enabled: true,
        algorithm: "AES256/CTR/NoPadding".to_string(),
        authentication_mode: AuthenticationMode::Mandatory,
        permit_unencrypted_downloads: false,
        key_id: Some("key-1".to_string()),
        key_source: Some(KeySource::InMemory {
            key_bytes_base64: STANDARD.encode([11u8; 32]),
        }),
    };
    let client = Client::from_config(test_config(&server.url(), encryption.clone())).unwrap();

    let upload_id = Uuid::new_v4();
    let parts_directory = format!("/u/stor/uploads/{}/{}", &upload_id.to_string()[..1], upload_id);
    let _initiate = server
        .mock("POST", "/u/stor/uploads")
        .with_status(201)
        .with_body(serde_json::json!({ "id": upload_id, "partsDirectory": parts_directory }).to_string())
        .create();
    let _put1 = server
        .mock("PUT", format!("{parts_directory}/1").as_str())
        .with_status(204)
        .with_header("etag", "\"part-1\"")
        .create();
    let _put2 = server
        .mock("PUT", format!("{parts_directory}/2").as_str())
        .with_status(204)
        .with_header("etag", "\"part-2\"")
        .create();
    let _put_tail = server
        .mock("PUT", format!("{parts_directory}/3").as_str())
        .with_status(204)
        .with_header("etag", "\"part-3\"")
        .create();
    let _commit = server.mock("POST", format!("{parts_directory}/commit").as_str()).with_status(204).create();

    let path = ObjectPath::parse("/u/stor/secret").unwrap();
    let key = load_key_for_test();
    let upload = client
        .initiate_encrypted_multipart_upload(&path, CipherId::Aes256CtrNoPadding, key, "key-1", Default::default(), &UserMetadata::new())
        .unwrap();

    let plaintext_part1 = vec![0x11u8; 5 * 1024 * 1024];
    let plaintext_part2 = vec![0x22u8; 5 * 1024 * 1024];
    let p1 = client.upload_encrypted_part(&upload, 1, plaintext_part1.clone(), false).unwrap().unwrap();
    let p2 = client.upload_encrypted_part(&upload, 2, plaintext_part2.clone(), true).unwrap().unwrap();
    let cse_headers = client.complete_encrypted_multipart_upload(&upload, vec![p1, p2]).unwrap();

    assert_eq!(cse_headers.get("m-encrypt-cipher").map(String::as_str), Some("AES256/CTR/NoPadding"));
    assert_eq!(cse_headers.get("m-encrypt-plaintext-content-length").map(String::as_str), Some("10485760"));
    assert!(cse_headers.contains_key("m-encrypt-hmac"));

    // Now simulate the assembled object: HEAD returns the CSE headers,
    // ranged GET returns the matching ciphertext window.
    let full_plaintext: Vec<u8> = plaintext_part1.iter().chain(plaintext_part2.iter()).copied().collect();
    let spec = CIPHER_CATALOG.iter().find(|s| s.id == CipherId::Aes256CtrNoPadding).unwrap();
    let iv = hex::decode(cse_headers.get("m-encrypt-iv").unwrap()).unwrap();
    let key_for_encrypt = load_key_for_test();
    let mut entity = stratum_client::crypto::EncryptingEntity::new(*spec, key_for_encrypt, iv.clone(), Some(full_plaintext.len() as u64)).unwrap();
    let ciphertext = entity.encrypt_chunk(&full_plaintext);
    entity.finalize().unwrap();

    // The assembled object's body carries the IV as a leading block ahead
    // of part 1's ciphertext (§4.10), so its total size is iv + plaintext
    // + hmac, distinguishing it from a single-request PUT's layout.
    let total_len = spec.iv_len as u64 + full_plaintext.len() as u64 + spec.tag_or_mac_len as u64;
    let _head = server
        .mock("HEAD", "/u/stor/secret")
        .with_status(200)
        .with_header("m-encrypt-cipher", cse_headers.get("m-encrypt-cipher").unwrap())
        .with_header("m-encrypt-key-id", cse_headers.get("m-encrypt-key-id").unwrap())
        .with_header("m-encrypt-iv", cse_headers.get("m-encrypt-iv").unwrap())
        .with_header("m-encrypt-hmac", cse_headers.get("m-encrypt-hmac").unwrap())
        .with_header("m-encrypt-plaintext-content-length", cse_headers.get("m-encrypt-plaintext-content-length").unwrap())
        .with_header("content-length", total_len.to_string().as_str())
        .create();

    let start = 7 * 1024 * 1024u64;
    let len = 1024u64;
    let resume = stratum_client::crypto::ctr_resume_offset(spec, start).unwrap();
    let end_inclusive = resume.block_aligned_ciphertext_offset + resume.skip_within_block as u64 + len - 1;
    let window = &ciphertext[resume.block_aligned_ciphertext_offset as usize..=end_inclusive as usize];
    let _get_range = server
        .mock("GET", "/u/stor/secret")
        .match_header("range", mockito::Matcher::Any)
        .with_status(206)
        .with_body(window.to_vec())
        .create();

    let decrypted = client.get_decrypted_range(&path, start, len).unwrap();
    assert_eq!(decrypted, full_plaintext[start as usize..(start + len) as usize]);
}

fn load_key_for_test() -> Vec<u8> {
    vec![11u8; 32]
}
