//! Server-side MPU manager (C9): initiate / upload-part / list / status /
//! abort / complete against the `<home>/uploads` wire protocol.
//!
//! Modeled on a `MultipartStore`'s state-machine shape
//! (create/upload_part/complete/abort/list) and its part-number and
//! ETag-composition validation, reimplemented here as an HTTP client
//! driving a remote store instead of an in-process map.

use crate::error::{ClientError, Result};
use crate::http::HttpHelper;
use crate::multipart::types::{
    CommitRequestBody, InitiateRequestBody, InitiateResponseBody, MultipartState, PartListingEntry, PartRef,
    ServerSideMultipartUpload, StateResponseBody, UploadListingEntry,
};
use crate::object::UserMetadata;
use crate::path::ObjectPath;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Minimum size, in bytes, of any part except possibly the last, per §3.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of parts permitted in one upload, per §3.
pub const MAX_PART_NUMBER: u32 = 10_000;

pub struct MultipartManager {
    http: Arc<HttpHelper>,
    uploads_home: ObjectPath,
}

impl MultipartManager {
    pub fn new(http: Arc<HttpHelper>, uploads_home: ObjectPath) -> Self {
        Self { http, uploads_home }
    }

    #[instrument(skip(self, headers, metadata), fields(path = %object_path))]
    pub fn initiate(
        &self,
        object_path: &ObjectPath,
        headers: BTreeMap<String, String>,
        metadata: &UserMetadata,
    ) -> Result<ServerSideMultipartUpload> {
        let body = InitiateRequestBody {
            object_path: object_path.as_str().to_string(),
            headers,
            metadata: metadata.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        };
        let json = serde_json::to_vec(&body).map_err(|e| ClientError::multipart(format!("failed to encode initiate body: {e}")))?;

        let request_path = format!("{}/uploads", self.uploads_home.as_str());
        let response = self.http.post_json(&request_path, &json)?;
        if response.status != 201 {
            return Err(self.status_error("initiate", &request_path, response.status, &response.body));
        }

        let parsed: InitiateResponseBody = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::multipart(format!("malformed initiate response: {e}")).with_context("path", request_path.clone()))?;

        info!(upload_id = %parsed.id, path = %object_path, "multipart upload initiated");
        Ok(ServerSideMultipartUpload {
            id: parsed.id,
            object_path: object_path.clone(),
            parts_directory: ObjectPath::parse(&parsed.parts_directory)
                .map_err(|e| ClientError::multipart(format!("server returned invalid partsDirectory: {e}")))?,
        })
    }

    #[instrument(skip(self, bytes), fields(upload_id = %upload.id, part_number))]
    pub fn upload_part(&self, upload: &ServerSideMultipartUpload, part_number: u32, bytes: Vec<u8>, is_last: bool) -> Result<PartRef> {
        if part_number == 0 || part_number > MAX_PART_NUMBER {
            return Err(ClientError::multipart(format!(
                "part number {part_number} out of range [1, {MAX_PART_NUMBER}]"
            )));
        }
        if !is_last && (bytes.len() as u64) < MIN_PART_SIZE {
            return Err(ClientError::multipart(format!(
                "part {part_number} is {} bytes, below the {MIN_PART_SIZE}-byte minimum for non-final parts",
                bytes.len()
            )));
        }

        let request_path = format!("{}/{part_number}", upload.parts_directory.as_str());
        debug!(part_number, bytes = bytes.len(), "uploading part");
        let response = self.http.put_with_digest(&request_path, bytes, None, &[])?;
        if response.status != 204 && response.status != 200 {
            return Err(self.status_error("uploadPart", &request_path, response.status, &response.body));
        }
        let etag = response
            .header("etag")
            .ok_or_else(|| ClientError::multipart("part response missing ETag").with_context("path", request_path.clone()))?
            .trim_matches('"')
            .to_string();

        Ok(PartRef { part_number, etag })
    }

    #[instrument(skip(self), fields(upload_id = %upload.id))]
    pub fn list_parts(&self, upload: &ServerSideMultipartUpload) -> Result<Vec<PartRef>> {
        let response = self.http.get(upload.parts_directory.as_str())?;
        if !response.is_success() {
            return Err(self.status_error("listParts", upload.parts_directory.as_str(), response.status, &response.body));
        }
        parse_ndjson::<PartListingEntry>(&response.body)?
            .into_iter()
            .filter(|entry| entry.name != "state")
            .map(|entry| {
                let part_number: u32 = entry
                    .name
                    .parse()
                    .map_err(|_| ClientError::multipart(format!("non-numeric part entry name: {}", entry.name)))?;
                let etag = entry
                    .etag
                    .ok_or_else(|| ClientError::multipart(format!("part {part_number} listing missing etag")))?;
                Ok(PartRef { part_number, etag })
            })
            .collect()
    }

    #[instrument(skip(self), fields(upload_id = %upload.id, part_number))]
    pub fn get_part(&self, upload: &ServerSideMultipartUpload, part_number: u32) -> Result<Option<PartRef>> {
        let request_path = format!("{}/{part_number}", upload.parts_directory.as_str());
        let response = self.http.head(&request_path)?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(self.status_error("getPart", &request_path, response.status, &response.body));
        }
        let etag = response
            .header("etag")
            .ok_or_else(|| ClientError::multipart("part HEAD response missing ETag"))?
            .trim_matches('"')
            .to_string();
        Ok(Some(PartRef { part_number, etag }))
    }

    #[instrument(skip(self), fields(upload_id = %upload.id))]
    pub fn get_status(&self, upload: &ServerSideMultipartUpload) -> Result<MultipartState> {
        let request_path = format!("{}/state", upload.parts_directory.as_str());
        let response = self.http.get(&request_path)?;
        if !response.is_success() {
            return Err(self.status_error("getStatus", &request_path, response.status, &response.body));
        }
        let parsed: StateResponseBody = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::multipart(format!("malformed state response: {e}")))?;
        Ok(parsed.to_state())
    }

    #[instrument(skip(self), fields(upload_id = %upload.id))]
    pub fn abort(&self, upload: &ServerSideMultipartUpload) -> Result<()> {
        let request_path = format!("{}/abort", upload.parts_directory.as_str());
        let response = self.http.post_json(&request_path, b"{}")?;
        if response.status != 204 && response.status != 404 {
            return Err(self.status_error("abort", &request_path, response.status, &response.body));
        }
        info!(upload_id = %upload.id, "multipart upload aborted");
        Ok(())
    }

    #[instrument(skip(self, parts), fields(upload_id = %upload.id))]
    pub fn complete(&self, upload: &ServerSideMultipartUpload, mut parts: Vec<PartRef>) -> Result<()> {
        parts.sort_by_key(|p| p.part_number);
        let body = CommitRequestBody {
            parts: parts.iter().map(|p| p.etag.clone()).collect(),
        };
        let json = serde_json::to_vec(&body).map_err(|e| ClientError::multipart(format!("failed to encode commit body: {e}")))?;
        let request_path = format!("{}/commit", upload.parts_directory.as_str());
        let response = self.http.post_json(&request_path, &json)?;
        if response.status != 204 {
            return Err(self.status_error("complete", &request_path, response.status, &response.body));
        }
        info!(upload_id = %upload.id, parts = parts.len(), "multipart upload committed");
        Ok(())
    }

    /// Collect uploaded parts, sort by number, and fail on a gap or
    /// duplicate — per §4.9's `validateThatThereAreSequentialPartNumbers`.
    pub fn validate_sequential_part_numbers(&self, upload: &ServerSideMultipartUpload) -> Result<Vec<PartRef>> {
        let mut parts = self.list_parts(upload)?;
        parts.sort_by_key(|p| p.part_number);
        for window in parts.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            if a.part_number == b.part_number {
                return Err(ClientError::multipart(format!("duplicate part number {}", a.part_number)));
            }
            if b.part_number != a.part_number + 1 {
                return Err(ClientError::multipart(format!(
                    "gap in part numbers between {} and {}",
                    a.part_number, b.part_number
                )));
            }
        }
        Ok(parts)
    }

    /// Poll `get_status` until it reaches a terminal state or `max_polls`
    /// is exhausted, sleeping `interval` between attempts. On exhaustion,
    /// invokes `on_timeout` and returns its result.
    pub fn wait_for_completion(
        &self,
        upload: &ServerSideMultipartUpload,
        interval: Duration,
        max_polls: u32,
        on_timeout: impl FnOnce() -> Result<MultipartState>,
    ) -> Result<MultipartState> {
        for attempt in 0..max_polls {
            let state = self.get_status(upload)?;
            if matches!(state, MultipartState::Completed | MultipartState::Aborted) {
                return Ok(state);
            }
            debug!(attempt, ?state, "multipart upload still finalizing");
            if attempt + 1 < max_polls {
                std::thread::sleep(interval);
            }
        }
        warn!(upload_id = %upload.id, max_polls, "timed out waiting for multipart upload completion");
        on_timeout()
    }

    /// Lazily enumerate in-progress uploads under the account's uploads
    /// home directory, distinct from [`list_parts`](Self::list_parts)
    /// which lists one upload's parts.
    pub fn list_in_progress(&self) -> Result<Vec<ServerSideMultipartUpload>> {
        let request_path = format!("{}/uploads", self.uploads_home.as_str());
        let response = self.http.get(&request_path)?;
        if !response.is_success() {
            return Err(self.status_error("listInProgress", &request_path, response.status, &response.body));
        }
        parse_ndjson::<UploadListingEntry>(&response.body)?
            .into_iter()
            .map(|entry| {
                let object_path = ObjectPath::parse(&entry.object_path)
                    .map_err(|e| ClientError::multipart(format!("invalid objectPath in listing: {e}")))?;
                let parts_directory = ServerSideMultipartUpload::parts_directory_for(&self.uploads_home, entry.id);
                Ok(ServerSideMultipartUpload {
                    id: entry.id,
                    object_path,
                    parts_directory,
                })
            })
            .collect()
    }

    fn status_error(&self, operation: &str, path: &str, status: u16, body: &[u8]) -> ClientError {
        let snippet: String = String::from_utf8_lossy(body).chars().take(512).collect();
        ClientError::multipart(format!("{operation} failed"))
            .with_context("path", path)
            .with_context("status", status)
            .with_context("body", snippet)
    }
}

fn parse_ndjson<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<Vec<T>> {
    let text = std::str::from_utf8(body).map_err(|e| ClientError::multipart(format!("listing body is not UTF-8: {e}")))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| ClientError::multipart(format!("malformed listing line: {e}"))))
        .collect()
}
