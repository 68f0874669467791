//! Error taxonomy for the client.
//!
//! Every error kind carries a context map of key/value annotations rather than
//! mutating a shared exception in place (see DESIGN.md — "Exception annotation").
//! Secrets (key bytes, passphrases) are never placed in the context map.

use std::collections::BTreeMap;
use std::fmt;

/// Context annotations attached to an error: request/response metadata,
/// object path, and other non-secret diagnostic fields.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    fields: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-destructive: returns a new context with the field added.
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return Ok(());
        }
        write!(f, " [")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "]")
    }
}

/// The five error kinds named by the error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Signing/keying failure: missing or unreadable key, unsupported
    /// algorithm, malformed fingerprint, passphrase failure.
    #[error("crypto error: {message}{context}")]
    Crypto {
        message: String,
        context: ErrorContext,
    },

    /// Non-success HTTP status, or a status that does not match the
    /// caller's expectation.
    #[error("http response error: {status} {reason}{context}")]
    HttpResponse {
        status: u16,
        reason: String,
        request_id: Option<String>,
        body_snippet: Option<String>,
        context: ErrorContext,
    },

    /// Server-computed MD5 did not match the client's digest.
    #[error("checksum mismatch: client={client_md5} server={server_md5}{context}")]
    Checksum {
        client_md5: String,
        server_md5: String,
        context: ErrorContext,
    },

    /// MPU protocol violation: malformed JSON, missing field, illegal
    /// state transition, part-number validation failure.
    #[error("multipart error: {message}{context}")]
    Multipart {
        message: String,
        context: ErrorContext,
    },

    /// Transport-level failure (connect, read, write, TLS).
    #[error("io error: {message}{context}")]
    Io {
        message: String,
        retriable: bool,
        context: ErrorContext,
    },
}

impl ClientError {
    pub fn crypto(message: impl Into<String>) -> Self {
        ClientError::Crypto {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn multipart(message: impl Into<String>) -> Self {
        ClientError::Multipart {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn io(message: impl Into<String>, retriable: bool) -> Self {
        ClientError::Io {
            message: message.into(),
            retriable,
            context: ErrorContext::new(),
        }
    }

    pub fn http_response(status: u16, reason: impl Into<String>) -> Self {
        ClientError::HttpResponse {
            status,
            reason: reason.into(),
            request_id: None,
            body_snippet: None,
            context: ErrorContext::new(),
        }
    }

    pub fn checksum(client_md5: impl Into<String>, server_md5: impl Into<String>) -> Self {
        ClientError::Checksum {
            client_md5: client_md5.into(),
            server_md5: server_md5.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attach a context field, non-destructively (returns a new value).
    pub fn with_context(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        match self {
            ClientError::Crypto { message, context } => ClientError::Crypto {
                message,
                context: context.with(key, value),
            },
            ClientError::HttpResponse {
                status,
                reason,
                request_id,
                body_snippet,
                context,
            } => ClientError::HttpResponse {
                status,
                reason,
                request_id,
                body_snippet,
                context: context.with(key, value),
            },
            ClientError::Checksum {
                client_md5,
                server_md5,
                context,
            } => ClientError::Checksum {
                client_md5,
                server_md5,
                context: context.with(key, value),
            },
            ClientError::Multipart { message, context } => ClientError::Multipart {
                message,
                context: context.with(key, value),
            },
            ClientError::Io {
                message,
                retriable,
                context,
            } => ClientError::Io {
                message,
                retriable,
                context: context.with(key, value),
            },
        }
    }

    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        match self {
            ClientError::HttpResponse {
                status,
                reason,
                body_snippet,
                context,
                ..
            } => ClientError::HttpResponse {
                status,
                reason,
                request_id: Some(request_id.into()),
                body_snippet,
                context,
            },
            other => other,
        }
    }

    pub fn with_body_snippet(self, snippet: impl Into<String>) -> Self {
        match self {
            ClientError::HttpResponse {
                status,
                reason,
                request_id,
                context,
                ..
            } => ClientError::HttpResponse {
                status,
                reason,
                request_id,
                body_snippet: Some(snippet.into()),
                context,
            },
            other => other,
        }
    }

    /// Whether this error is classified as retriable per the connection policy (§4.2).
    pub fn is_retriable(&self) -> bool {
        matches!(self, ClientError::Io { retriable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_non_destructive() {
        let base = ErrorContext::new().with("a", "1");
        let extended = base.clone().with("b", "2");
        assert_eq!(base.get("b"), None);
        assert_eq!(extended.get("a"), Some("1"));
        assert_eq!(extended.get("b"), Some("2"));
    }

    #[test]
    fn io_error_retriable_flag() {
        let retriable = ClientError::io("connection reset", true);
        let fatal = ClientError::io("unknown host", false);
        assert!(retriable.is_retriable());
        assert!(!fatal.is_retriable());
        assert!(!ClientError::crypto("bad key").is_retriable());
    }

    #[test]
    fn display_includes_context() {
        let err = ClientError::checksum("00", "deadbeef").with_context("path", "/u/stor/x");
        let msg = err.to_string();
        assert!(msg.contains("00"));
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("path=/u/stor/x"));
    }
}
