//! HTTP transport layer: signing (C1), connection pooling and retry (C2),
//! digesting entities (C3), and the verb-level request helper (C4).

mod connection;
mod digest;
mod helper;
mod signer;

pub use connection::{ConnectionPolicy, RetryOutcome};
pub use digest::DigestingReader;
pub use helper::{HttpHelper, HttpResponse};
pub use signer::{httpdate, HttpSigner, RequestTarget, SignedHeaders};
