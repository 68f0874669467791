//! Server-side multipart upload protocol: the unencrypted manager (C9)
//! and its client-side-encryption overlay (C10).

mod encrypted_manager;
mod manager;
mod types;

pub use encrypted_manager::{header_names, EncryptedMultipartManager};
pub use manager::{MultipartManager, MAX_PART_NUMBER, MIN_PART_SIZE};
pub use types::{MultipartState, PartRef, ServerSideMultipartUpload};
