//! Verb-level HTTP helper (C4): issues signed GET/HEAD/PUT/POST/DELETE
//! requests through the connection policy's retry loop, and validates PUT
//! responses against the client's own MD5 digest.
//!
//! Modeled on a handler dispatch's request/response shape, and on a
//! status-to-error mapping for how a non-2xx response becomes a
//! [`ClientError`].

use crate::error::{ClientError, Result};
use crate::http::connection::{with_retry, ConnectionPolicy, RetryOutcome};
use crate::http::digest::DigestingReader;
use crate::http::signer::{httpdate, HttpSigner, RequestTarget};
use reqwest::blocking::Client;
use reqwest::Method;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::io::Read;

/// A completed HTTP response: status, headers, and body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wires the signer, a blocking reqwest client, and the retry policy
/// together behind a small set of verb methods.
pub struct HttpHelper {
    client: Client,
    signer: HttpSigner,
    policy: ConnectionPolicy,
    base_url: reqwest::Url,
    host: String,
}

impl HttpHelper {
    pub fn new(base_url: reqwest::Url, signer: HttpSigner, policy: ConnectionPolicy) -> Result<Self> {
        let client = policy.build_http_client()?;
        let host = base_url
            .host_str()
            .ok_or_else(|| ClientError::io("base url has no host", false))?
            .to_string();
        Ok(Self {
            client,
            signer,
            policy,
            base_url,
            host,
        })
    }

    fn full_url(&self, path_and_query: &str) -> Result<reqwest::Url> {
        self.base_url
            .join(path_and_query)
            .map_err(|e| ClientError::io(format!("invalid request path {path_and_query}: {e}"), false))
    }

    /// Issue one signed request, honoring the retry policy. `body` is
    /// re-supplied to each attempt as a closure, since a retried request
    /// must re-read its body from the start.
    fn execute(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(&str, String)],
    ) -> Result<HttpResponse> {
        let url = self.full_url(path_and_query)?;

        let outcome = with_retry(&self.policy, |_attempt| {
            let date = httpdate(chrono::Utc::now());
            let target = RequestTarget {
                method: method.as_str(),
                path_and_query,
                host: &self.host,
            };
            let authorization = self.signer.sign_at(&target, &date)?;

            let mut req = self
                .client
                .request(method.clone(), url.clone())
                .header("Date", &date)
                .header("Authorization", &authorization)
                .header("Host", &self.host);
            for (name, value) in extra_headers {
                req = req.header(*name, value);
            }
            if let Some(bytes) = &body {
                req = req.body(bytes.clone());
            }

            let response = req
                .send()
                .map_err(|e| ClientError::io(e.to_string(), self.policy.is_retriable_transport_error(&e)))?;

            let status = response.status().as_u16();
            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            let request_id = headers.get("x-request-id").cloned();
            let body_bytes = response
                .bytes()
                .map_err(|e| ClientError::io(e.to_string(), false))?
                .to_vec();

            if !(200..300).contains(&status) && self.policy.is_retriable_status(status) {
                return Err(ClientError::http_response(status, "retriable status")
                    .with_request_id(request_id.clone().unwrap_or_default())
                    .into_retriable_io());
            }

            let mut response = HttpResponse {
                status,
                headers,
                body: body_bytes,
            };
            if let Some(id) = request_id {
                response.headers.entry("x-request-id".to_string()).or_insert(id);
            }
            Ok(response)
        });

        match outcome {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::ExhaustedRetries { last_error, .. } => Err(last_error),
        }
    }

    pub fn get(&self, path_and_query: &str) -> Result<HttpResponse> {
        self.execute(Method::GET, path_and_query, None, &[])
    }

    pub fn get_range(&self, path_and_query: &str, start: u64, end_inclusive: Option<u64>) -> Result<HttpResponse> {
        let range = match end_inclusive {
            Some(end) => format!("bytes={start}-{end}"),
            None => format!("bytes={start}-"),
        };
        self.execute(Method::GET, path_and_query, None, &[("Range", range)])
    }

    /// Issue one signed ranged GET and hand back the live
    /// `reqwest::blocking::Response` instead of buffering its body, for
    /// callers (the range-seekable reader) that stream rather than
    /// materialize the whole object. Unlike [`Self::execute`], this makes
    /// no retry attempt — retrying would mean re-issuing the request after
    /// the caller may already have consumed part of the stream, which
    /// [`crate::io::RangeSeekableReader`] instead treats as a plain IO
    /// failure on the blocked thread, per §5.
    pub fn get_range_streaming(&self, path_and_query: &str, start: u64, end_inclusive: Option<u64>) -> Result<reqwest::blocking::Response> {
        let range = match end_inclusive {
            Some(end) => format!("bytes={start}-{end}"),
            None => format!("bytes={start}-"),
        };
        let url = self.full_url(path_and_query)?;
        let date = httpdate(chrono::Utc::now());
        let target = RequestTarget {
            method: "GET",
            path_and_query,
            host: &self.host,
        };
        let authorization = self.signer.sign_at(&target, &date)?;

        self.client
            .get(url)
            .header("Date", &date)
            .header("Authorization", &authorization)
            .header("Host", &self.host)
            .header("Range", range)
            .send()
            .map_err(|e| ClientError::io(e.to_string(), self.policy.is_retriable_transport_error(&e)))
    }

    pub fn head(&self, path_and_query: &str) -> Result<HttpResponse> {
        self.execute(Method::HEAD, path_and_query, None, &[])
    }

    pub fn delete(&self, path_and_query: &str) -> Result<HttpResponse> {
        self.execute(Method::DELETE, path_and_query, None, &[])
    }

    pub fn post_json(&self, path_and_query: &str, json_body: &[u8]) -> Result<HttpResponse> {
        self.execute(
            Method::POST,
            path_and_query,
            Some(json_body.to_vec()),
            &[("Content-Type", "application/json".to_string())],
        )
    }

    /// PUT a body, validating the server's `Computed-MD5` response header
    /// against the client's own MD5 digest of the bytes sent, per §4.3's
    /// checksum contract. Returns [`ClientError::Checksum`] on mismatch
    /// without retrying — a checksum mismatch means the bytes the server
    /// stored differ from what was sent, and resending identical bytes
    /// would reproduce the same result if the divergence is on the wire,
    /// or silently succeed if it isn't; either way it's surfaced to the
    /// caller rather than retried blindly. Also applies §4.4's generic
    /// status policy (any code ≥ 400 fails) before either check.
    pub fn put_with_digest(
        &self,
        path_and_query: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
        extra_headers: &[(&str, String)],
    ) -> Result<HttpResponse> {
        let mut digesting = DigestingReader::new(Cursor::new(&body));
        let mut sink = Vec::new();
        digesting.read_to_end(&mut sink).map_err(|e| ClientError::io(e.to_string(), false))?;
        let client_md5 = digesting.digest_hex();

        let mut headers: Vec<(&str, String)> = extra_headers.to_vec();
        if let Some(ct) = content_type {
            headers.push(("Content-Type", ct.to_string()));
        }
        headers.push(("Content-MD5", digesting.digest_base64()));

        let response = self.execute(Method::PUT, path_and_query, Some(body), &headers)?;

        if !response.is_success() {
            return Err(ClientError::http_response(response.status, "put failed").with_context("path", path_and_query));
        }

        if let Some(server_md5) = response.header("Computed-MD5") {
            if server_md5 != client_md5 {
                return Err(ClientError::checksum(client_md5, server_md5.to_string())
                    .with_context("path", path_and_query));
            }
        }

        Ok(response)
    }
}

impl ClientError {
    /// Reclassify an [`ClientError::HttpResponse`] as a retriable transport
    /// error for the purposes of [`with_retry`]; used for 5xx/429/408
    /// responses that the retry loop should treat the same as a dropped
    /// connection.
    fn into_retriable_io(self) -> ClientError {
        match self {
            ClientError::HttpResponse { status, reason, .. } => {
                ClientError::io(format!("{status} {reason}"), true)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::signer::HttpSigner;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::RsaPrivateKey;

    fn test_signer() -> HttpSigner {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF).unwrap();
        HttpSigner::from_pem_bytes(
            pem.as_bytes(),
            "ab:cd:12:34:56:78:90:ab:cd:ef:01:23:45:67:89:ab",
            "u",
            None,
        )
        .unwrap()
    }

    #[test]
    fn get_against_mock_server_returns_body() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/u/stor/x")
            .with_status(200)
            .with_body("hello")
            .create();

        let base = reqwest::Url::parse(&server.url()).unwrap();
        let helper = HttpHelper::new(base, test_signer(), ConnectionPolicy::default()).unwrap();
        let resp = helper.get("/u/stor/x").unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn put_with_digest_detects_checksum_mismatch() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("PUT", "/u/stor/x")
            .with_status(200)
            .with_header("Computed-MD5", "deadbeefdeadbeefdeadbeefdeadbeef")
            .create();

        let base = reqwest::Url::parse(&server.url()).unwrap();
        let helper = HttpHelper::new(base, test_signer(), ConnectionPolicy::default()).unwrap();
        let result = helper.put_with_digest("/u/stor/x", b"hello world".to_vec(), None, &[]);
        assert!(matches!(result, Err(ClientError::Checksum { .. })));
    }

    #[test]
    fn put_with_digest_accepts_matching_computed_md5() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("PUT", "/u/stor/x")
            .with_status(200)
            .with_header("Computed-MD5", "5eb63bbbe01eeed093cb22bb8f5acdc3")
            .create();

        let base = reqwest::Url::parse(&server.url()).unwrap();
        let helper = HttpHelper::new(base, test_signer(), ConnectionPolicy::default()).unwrap();
        let result = helper.put_with_digest("/u/stor/x", b"hello world".to_vec(), None, &[]);
        assert!(result.is_ok());
    }

    #[test]
    fn put_with_digest_fails_on_server_error_status() {
        let mut server = mockito::Server::new();
        let _m = server.mock("PUT", "/u/stor/x").with_status(500).create();

        let base = reqwest::Url::parse(&server.url()).unwrap();
        let policy = ConnectionPolicy { max_retries: 0, ..ConnectionPolicy::default() };
        let helper = HttpHelper::new(base, test_signer(), policy).unwrap();
        let result = helper.put_with_digest("/u/stor/x", b"hello world".to_vec(), None, &[]);
        assert!(result.is_err());
    }
}
