//! Object path parsing, validation and percent-encoding.
//!
//! Paths are forward-slash separated, always begin with `/`, and have each
//! non-empty segment percent-encoded independently (the separator itself is
//! never encoded). Modeled on an `ObjectKey` segment validation pattern,
//! generalized from a bucket/key pair to a single absolute path.

use std::fmt;

/// Errors raised when validating a caller-supplied object path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '/': {0}")]
    MissingLeadingSlash(String),
    #[error("path segment must not contain NUL bytes: {0}")]
    NulByte(String),
    #[error("path must not contain '..' segments: {0}")]
    ParentTraversal(String),
}

/// An absolute object path in the store's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate a path, eliding empty segments (per the data model's
    /// "empty segments are elided" invariant).
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if !raw.starts_with('/') {
            return Err(PathError::MissingLeadingSlash(raw.to_string()));
        }
        if raw.contains('\0') {
            return Err(PathError::NulByte(raw.to_string()));
        }
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "..") {
            return Err(PathError::ParentTraversal(raw.to_string()));
        }
        let canonical = format!("/{}", segments.join("/"));
        Ok(ObjectPath(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn parent(&self) -> Option<ObjectPath> {
        let segs: Vec<&str> = self.segments().collect();
        if segs.len() <= 1 {
            return None;
        }
        Some(ObjectPath(format!("/{}", segs[..segs.len() - 1].join("/"))))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Join a child segment onto this path (used for `uploads/<first-hex>/<uuid>`).
    pub fn join(&self, child: &str) -> ObjectPath {
        if self.0 == "/" {
            ObjectPath(format!("/{child}"))
        } else {
            ObjectPath(format!("{}/{}", self.0, child))
        }
    }

    /// Percent-encode each non-empty segment independently and rejoin with `/`.
    pub fn encode(&self) -> String {
        encode_path(&self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split on `/`, URL-encode each non-empty segment as UTF-8, rejoin with `/`.
///
/// Testable property: `decode(encode(p)) == p` and `encode(p)` contains no
/// character outside unreserved + `/`.
pub fn encode_path(raw: &str) -> String {
    raw.split('/')
        .map(|segment| {
            if segment.is_empty() {
                String::new()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_path`] — percent-decode each segment.
pub fn decode_path(encoded: &str) -> String {
    encoded
        .split('/')
        .map(|segment| urlencoding::decode(segment).map(|c| c.into_owned()).unwrap_or_else(|_| segment.to_string()))
        .collect::<Vec<_>>()
        .join("/")
}
