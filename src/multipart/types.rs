//! Wire types and state machine for the server-side multipart upload
//! protocol (C9).
//!
//! Modeled on a JSON-body multipart type (`MultipartUpload`, ETag
//! composition) and a `FileMetadata`/`StorageInfo` serde-tagged enum
//! pattern, adapted to the custom `uploads`/`partsDirectory` wire
//! protocol instead of S3 XML MPU.

use crate::path::ObjectPath;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a server-side multipart upload, per §3's state
/// machine: `CREATED -> FINALIZING(COMMIT|ABORT) -> {COMPLETED, ABORTED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartState {
    Created,
    Committing,
    Aborting,
    Completed,
    Aborted,
    /// The server's response could not be classified into a known state.
    Unknown,
}

/// An in-progress (or since-finalized) server-side multipart upload.
#[derive(Debug, Clone)]
pub struct ServerSideMultipartUpload {
    pub id: Uuid,
    pub object_path: ObjectPath,
    pub parts_directory: ObjectPath,
}

impl ServerSideMultipartUpload {
    /// Build the parts-directory path from an uploads home and upload id,
    /// per §3: `<home>/uploads/<first-hex-char>/<uuid>`.
    pub fn parts_directory_for(uploads_home: &ObjectPath, id: Uuid) -> ObjectPath {
        let id_str = id.to_string();
        let first_hex = &id_str[..1];
        uploads_home.join("uploads").join(first_hex).join(&id_str)
    }
}

/// A completed part: the part number and the entity tag the store
/// assigned it, consumed by `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InitiateRequestBody {
    #[serde(rename = "objectPath")]
    pub object_path: String,
    pub headers: std::collections::BTreeMap<String, String>,
    pub metadata: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InitiateResponseBody {
    pub id: Uuid,
    #[serde(rename = "partsDirectory")]
    pub parts_directory: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommitRequestBody {
    pub parts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateResponseBody {
    pub state: String,
    #[serde(rename = "type")]
    pub finalizing_type: Option<String>,
    #[serde(rename = "objectPath")]
    pub object_path: Option<String>,
}

impl StateResponseBody {
    pub(crate) fn to_state(&self) -> MultipartState {
        match self.state.as_str() {
            "CREATED" => MultipartState::Created,
            "FINALIZING" => match self.finalizing_type.as_deref() {
                Some("COMMIT") => MultipartState::Committing,
                Some("ABORT") => MultipartState::Aborting,
                _ => MultipartState::Unknown,
            },
            "COMPLETED" => MultipartState::Completed,
            "ABORTED" => MultipartState::Aborted,
            _ => MultipartState::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartListingEntry {
    pub name: String,
    pub etag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadListingEntry {
    pub id: Uuid,
    #[serde(rename = "objectPath")]
    pub object_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_directory_uses_first_hex_char() {
        let home = ObjectPath::parse("/u/stor").unwrap();
        let id = Uuid::parse_str("ffeeddcc-bbaa-9988-7766-554433221100").unwrap();
        let dir = ServerSideMultipartUpload::parts_directory_for(&home, id);
        assert_eq!(dir.as_str(), format!("/u/stor/uploads/f/{id}"));
    }

    #[test]
    fn state_response_maps_finalizing_commit() {
        let body = StateResponseBody {
            state: "FINALIZING".to_string(),
            finalizing_type: Some("COMMIT".to_string()),
            object_path: None,
        };
        assert_eq!(body.to_state(), MultipartState::Committing);
    }

    #[test]
    fn state_response_maps_unknown_for_unrecognized_state() {
        let body = StateResponseBody {
            state: "WEIRD".to_string(),
            finalizing_type: None,
            object_path: None,
        };
        assert_eq!(body.to_state(), MultipartState::Unknown);
    }
}
