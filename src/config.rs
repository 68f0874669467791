//! Client configuration (C13): the §6 "Configuration inputs" collaborator,
//! loaded from a TOML file, then environment variables, then defaults.
//!
//! Modeled on a `Config`/`from_file`/`from_env`/`load()` cascade,
//! generalized from a server's listen/backend settings to the client's
//! endpoint/signing/CSE settings, keeping the same serde default-function
//! and environment-variable-cascade idiom under this crate's own
//! `STRATUM_CLIENT_*` prefix.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the signing private key comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum KeySource {
    Path { key_path: PathBuf },
    InMemory { key_bytes_base64: String },
}

/// CSE authentication strictness on download, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMode {
    Optional,
    Mandatory,
}

/// Client-side encryption settings, per §6 and §9a's C13.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_encryption_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_authentication_mode")]
    pub authentication_mode: AuthenticationMode,
    #[serde(default)]
    pub permit_unencrypted_downloads: bool,
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub key_source: Option<KeySource>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: default_encryption_algorithm(),
            authentication_mode: default_authentication_mode(),
            permit_unencrypted_downloads: false,
            key_id: None,
            key_source: None,
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint_url: String,
    pub account: String,
    pub key_fingerprint: String,
    pub key_source: KeySource,
    #[serde(default)]
    pub key_passphrase: Option<String>,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,
    #[serde(default = "default_validate_uploads")]
    pub validate_uploads: bool,

    #[serde(default)]
    pub encryption: EncryptionConfig,
}

fn default_retry_count() -> u32 {
    3
}

fn default_max_connections() -> usize {
    24
}

fn default_socket_timeout_secs() -> u64 {
    60
}

fn default_validate_uploads() -> bool {
    true
}

fn default_encryption_algorithm() -> String {
    "AES256/CTR/NoPadding".to_string()
}

fn default_authentication_mode() -> AuthenticationMode {
    AuthenticationMode::Mandatory
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: ClientConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from `STRATUM_CLIENT_*` environment variables.
    /// Fails if the mandatory fields (endpoint, account, key fingerprint,
    /// key path) are not all present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint_url = require_env("STRATUM_CLIENT_URL")?;
        let account = require_env("STRATUM_CLIENT_ACCOUNT")?;
        let key_fingerprint = require_env("STRATUM_CLIENT_KEY_ID")?;
        let key_path = require_env("STRATUM_CLIENT_KEY_PATH")?;

        let mut config = Self {
            endpoint_url,
            account,
            key_fingerprint,
            key_source: KeySource::Path {
                key_path: PathBuf::from(key_path),
            },
            key_passphrase: std::env::var("STRATUM_CLIENT_KEY_PASSPHRASE").ok(),
            retry_count: default_retry_count(),
            max_connections: default_max_connections(),
            socket_timeout_secs: default_socket_timeout_secs(),
            validate_uploads: default_validate_uploads(),
            encryption: EncryptionConfig::default(),
        };

        if let Ok(count) = std::env::var("STRATUM_CLIENT_RETRY_COUNT") {
            if let Ok(parsed) = count.parse() {
                config.retry_count = parsed;
            }
        }
        if let Ok(max) = std::env::var("STRATUM_CLIENT_MAX_CONNECTIONS") {
            if let Ok(parsed) = max.parse() {
                config.max_connections = parsed;
            }
        }
        if let Ok(timeout) = std::env::var("STRATUM_CLIENT_SOCKET_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse() {
                config.socket_timeout_secs = parsed;
            }
        }
        if let Ok(flag) = std::env::var("STRATUM_CLIENT_VALIDATE_UPLOADS") {
            config.validate_uploads = flag == "true" || flag == "1";
        }
        if let Ok(flag) = std::env::var("STRATUM_CLIENT_ENCRYPTION_ENABLED") {
            config.encryption.enabled = flag == "true" || flag == "1";
        }
        if let Ok(algorithm) = std::env::var("STRATUM_CLIENT_ENCRYPTION_ALGORITHM") {
            config.encryption.algorithm = algorithm;
        }
        if let Ok(key_id) = std::env::var("STRATUM_CLIENT_ENCRYPTION_KEY_ID") {
            config.encryption.key_id = Some(key_id);
        }

        Ok(config)
    }

    /// Load configuration from an explicit file path (`STRATUM_CLIENT_CONFIG`),
    /// then default file locations, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("STRATUM_CLIENT_CONFIG") {
            if let Ok(config) = Self::from_file(&path) {
                return Ok(config);
            }
        }

        for path in &["stratum-client.toml", "/etc/stratum-client/config.toml"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return Ok(config);
                }
            }
        }

        Self::from_env()
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingRequired(name.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
}
