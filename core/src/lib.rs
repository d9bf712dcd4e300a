//! Core components for talking to a partition/row keyed table service.
//!
//! This crate provides the building blocks shared by the tablestore service
//! crates: the error taxonomy, the pluggable runtime [`Context`], request
//! signing and a retrying [`Transport`].
//!
//! ## Overview
//!
//! The crate is built around several key concepts:
//!
//! - **Context**: A container that holds implementations for HTTP sending and environment access
//! - **Traits**: Abstract interfaces for credential loading (`ProvideCredential`) and request signing (`SignRequest`)
//! - **Signer**: Coordinates credential loading and request signing
//! - **Transport**: Signs, sends and retries requests under a [`RetryPolicy`]
//!
//! ## Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use http::request::Parts;
//! use tablestore_core::{Context, Error, ProvideCredential, Result, SignRequest, Signer, SigningCredential};
//!
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     key: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self) -> bool {
//!         !self.key.is_empty()
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyLoader;
//!
//! #[async_trait]
//! impl ProvideCredential for MyLoader {
//!     type Credential = MyCredential;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
//!         Ok(Some(MyCredential {
//!             key: "my-key".to_string(),
//!         }))
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyBuilder;
//!
//! #[async_trait]
//! impl SignRequest for MyBuilder {
//!     type Credential = MyCredential;
//!
//!     async fn sign_request(
//!         &self,
//!         _ctx: &Context,
//!         req: &mut Parts,
//!         cred: Option<&Self::Credential>,
//!     ) -> Result<()> {
//!         let cred = cred.ok_or_else(|| Error::auth_config("missing credential"))?;
//!         req.headers.insert("authorization", cred.key.parse()?);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let signer = Signer::new(Context::new(), MyLoader, MyBuilder);
//!
//! let mut parts = http::Request::get("https://example.com/Tables")
//!     .body(())?
//!     .into_parts()
//!     .0;
//! signer.sign(&mut parts).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Traits
//!
//! - [`HttpSend`]: For sending HTTP requests
//! - [`Env`]: For environment variable access
//! - [`ProvideCredential`]: For loading credentials from various sources
//! - [`SignRequest`]: For signing requests the way a service expects
//! - [`SigningCredential`]: For validating credentials
//! - [`ClassifyResponse`]: For turning failed responses into errors
//!
//! ## Utilities
//!
//! - [`hash`]: Base64 and HMAC helpers
//! - [`time`]: Time formatting and parsing
//! - [`utils`]: Redaction of secrets in logs

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod request;
pub use request::{SigningRequest, QUERY_ENCODE_SET};
mod chain;
pub use chain::ProvideCredentialChain;
mod signer;
pub use signer::Signer;

mod retry;
pub use retry::{BackoffStrategy, RetryPolicy};
mod transport;
pub use transport::{
    kind_for_status, ClassifyResponse, StatusClassifier, Transport, TransportRequest,
};

mod error;
pub use error::{is_retryable_status, Error, ErrorKind, Result};
