//! Client library for a signed-request, multipart-upload,
//! client-side-encrypted object store.
//!
//! The [`client::Client`] facade wires together request signing
//! ([`http::HttpSigner`]), pooled retrying transport ([`http::HttpHelper`]),
//! server-side multipart upload ([`multipart`]), and client-side encryption
//! ([`crypto`]) behind a small set of object verbs.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod io;
pub mod multipart;
pub mod object;
pub mod path;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use object::{DataSource, ObjectRef, PutRequest, UserMetadata};
pub use path::ObjectPath;
