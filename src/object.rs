//! Object model (C11): object references, HTTP headers and user metadata,
//! with the invariants from §3 ("Object reference") and §4.11.
//!
//! Modeled on the `FileMetadata`/`ObjectKey` pair, generalized from a
//! bucket+prefix+filename scheme to the store's single absolute-path
//! namespace.

use crate::path::ObjectPath;
use std::collections::BTreeMap;

/// Content-type sentinel denoting a directory object.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/json; type=directory";

/// Content-type sentinel denoting a snaplink object.
pub const SNAPLINK_CONTENT_TYPE: &str = "application/json; type=link";

/// Reserved prefix for user metadata header names.
pub const USER_METADATA_PREFIX: &str = "m-";

/// One data source for a PUT. Exactly one variant is ever attached to a
/// [`PutRequest`] — the data model's "exactly one data source permitted per
/// PUT" invariant is enforced by construction, since [`PutRequest::new`]
/// takes a single `DataSource` rather than separate optional fields.
pub enum DataSource {
    Bytes(Vec<u8>),
    File(std::path::PathBuf),
    String(String),
    Stream(Box<dyn std::io::Read + Send>),
}

impl DataSource {
    /// Known length up front, if cheaply knowable (bytes/string/file size).
    /// Streams report `None` — their length is unknown until fully read.
    pub fn known_length(&self) -> Option<u64> {
        match self {
            DataSource::Bytes(b) => Some(b.len() as u64),
            DataSource::String(s) => Some(s.len() as u64),
            DataSource::File(p) => std::fs::metadata(p).ok().map(|m| m.len()),
            DataSource::Stream(_) => None,
        }
    }
}

/// Case-insensitive user metadata map. Keys are normalized to lower-case
/// internally and exposed without the reserved `m-` prefix; the HTTP layer
/// adds/strips the prefix when talking to the wire.
#[derive(Debug, Clone, Default)]
pub struct UserMetadata {
    entries: BTreeMap<String, String>,
}

impl UserMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_ascii_lowercase()).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `m-<key>` HTTP header name/value pairs.
    pub fn to_headers(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (format!("{USER_METADATA_PREFIX}{k}"), v.clone()))
            .collect()
    }

    /// Parse back from `m-<key>` HTTP header name/value pairs, ignoring any
    /// header not carrying the reserved prefix.
    pub fn from_headers<'a>(headers: impl Iterator<Item = (&'a str, &'a str)>) -> Self {
        let mut meta = Self::new();
        for (name, value) in headers {
            if let Some(key) = name.strip_prefix(USER_METADATA_PREFIX) {
                meta.insert(key, value);
            }
        }
        meta
    }
}

/// HTTP headers relevant to an object: content-type, content-length, etag, md5.
/// Arbitrary additional headers are carried in `extra`.
#[derive(Debug, Clone, Default)]
pub struct ObjectHeaders {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub content_md5: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl ObjectHeaders {
    pub fn is_directory(&self) -> bool {
        self.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }

    pub fn is_snaplink(&self) -> bool {
        self.content_type.as_deref() == Some(SNAPLINK_CONTENT_TYPE)
    }
}

/// A reference to an object in the store — the essential attributes from §3.
#[derive(Debug, Clone)]
pub struct ObjectRef {
    pub path: ObjectPath,
    pub headers: ObjectHeaders,
    pub metadata: UserMetadata,
}

impl ObjectRef {
    pub fn new(path: ObjectPath) -> Self {
        Self {
            path,
            headers: ObjectHeaders::default(),
            metadata: UserMetadata::new(),
        }
    }
}

/// A PUT request: target path plus exactly one data source, optional headers
/// and metadata. Directory creation and snaplink creation are represented as
/// specialized constructors that set the correct content-type and (for
/// snaplinks) the `Location` header, per §4.11.
pub struct PutRequest {
    pub path: ObjectPath,
    pub source: DataSource,
    pub content_type: Option<String>,
    pub metadata: UserMetadata,
    /// `Location` header — only meaningful for snaplinks.
    pub location: Option<String>,
}

impl PutRequest {
    pub fn new(path: ObjectPath, source: DataSource) -> Self {
        Self {
            path,
            source,
            content_type: None,
            metadata: UserMetadata::new(),
            location: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: UserMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// A directory PUT: no body, sentinel content-type.
    pub fn directory(path: ObjectPath) -> Self {
        Self {
            path,
            source: DataSource::Bytes(Vec::new()),
            content_type: Some(DIRECTORY_CONTENT_TYPE.to_string()),
            metadata: UserMetadata::new(),
            location: None,
        }
    }

    /// A snaplink PUT: no body, sentinel content-type, `Location` names the target.
    pub fn snaplink(path: ObjectPath, target: &ObjectPath) -> Self {
        Self {
            path,
            source: DataSource::Bytes(Vec::new()),
            content_type: Some(SNAPLINK_CONTENT_TYPE.to_string()),
            metadata: UserMetadata::new(),
            location: Some(target.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_metadata_roundtrips_through_headers() {
        let mut meta = UserMetadata::new();
        meta.insert("Team", "storage");
        let headers = meta.to_headers();
        assert_eq!(headers, vec![("m-team".to_string(), "storage".to_string())]);

        let parsed = UserMetadata::from_headers(headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert_eq!(parsed.get("team"), Some("storage"));
        assert_eq!(parsed.get("TEAM"), Some("storage"));
    }

    #[test]
    fn directory_put_sets_sentinel_content_type() {
        let path = ObjectPath::parse("/u/stor/dir").unwrap();
        let req = PutRequest::directory(path);
        assert_eq!(req.content_type.as_deref(), Some(DIRECTORY_CONTENT_TYPE));
    }

    #[test]
    fn snaplink_put_sets_location() {
        let path = ObjectPath::parse("/u/stor/link").unwrap();
        let target = ObjectPath::parse("/u/stor/original").unwrap();
        let req = PutRequest::snaplink(path, &target);
        assert_eq!(req.content_type.as_deref(), Some(SNAPLINK_CONTENT_TYPE));
        assert_eq!(req.location.as_deref(), Some("/u/stor/original"));
    }

    #[test]
    fn known_length_reports_for_bytes_and_string() {
        assert_eq!(DataSource::Bytes(vec![0; 10]).known_length(), Some(10));
        assert_eq!(DataSource::String("hello".into()).known_length(), Some(5));
        assert_eq!(DataSource::Stream(Box::new(std::io::empty())).known_length(), None);
    }
}
