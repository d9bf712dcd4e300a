//! Send signed requests with retries.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use log::{debug, warn};
use tokio::time::Instant;

use crate::utils::redact_uri;
use crate::{Context, Error, ErrorKind, Result, RetryPolicy, Signer, SigningCredential};

/// A request ready to be signed and sent, possibly more than once.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Full request uri, scheme and authority included.
    pub uri: Uri,
    /// Headers set before signing.
    pub headers: HeaderMap,
    /// Request body, shared between attempts.
    pub body: Bytes,
    /// Whether sending the request twice has the same effect as sending it once.
    pub idempotent: bool,
}

impl TransportRequest {
    /// Create a request without body.
    ///
    /// `GET`, `HEAD`, `PUT` and `DELETE` start out idempotent, anything else does not.
    pub fn new(method: Method, uri: Uri) -> Self {
        let idempotent = matches!(
            method,
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE
        );
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            idempotent,
        }
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Override whether the request may be resent after a response level failure.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    fn to_http(&self) -> Result<http::request::Parts> {
        let (mut parts, _) = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(())?
            .into_parts();
        parts.headers = self.headers.clone();
        Ok(parts)
    }
}

/// ClassifyResponse turns a non-2xx response into an [`Error`].
///
/// Services plug their own implementation in to read error codes out of the
/// response body; [`StatusClassifier`] only looks at the status.
pub trait ClassifyResponse: Debug + Send + Sync + 'static {
    /// Build the error for a response whose status is not a success.
    fn classify(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error;
}

/// Classify responses by status alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl ClassifyResponse for StatusClassifier {
    fn classify(&self, status: StatusCode, _: &HeaderMap, body: &[u8]) -> Error {
        let message = String::from_utf8_lossy(body);
        let message = if message.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            message.into_owned()
        };
        Error::new(kind_for_status(status), message).with_status(status)
    }
}

/// Map a non-success status to the error kind it is reported as.
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::PRECONDITION_FAILED => ErrorKind::PreconditionFailed,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => ErrorKind::Throttled,
        _ => ErrorKind::ServiceError,
    }
}

/// Transport signs every attempt of a request, sends it through the
/// [`Context`] and retries according to its [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct Transport<K: SigningCredential> {
    ctx: Context,
    signer: Signer<K>,
    policy: RetryPolicy,
    classifier: Arc<dyn ClassifyResponse>,
}

impl<K: SigningCredential> Transport<K> {
    /// Create a transport with the default retry policy.
    pub fn new(ctx: Context, signer: Signer<K>) -> Self {
        Self {
            ctx,
            signer,
            policy: RetryPolicy::default(),
            classifier: Arc::new(StatusClassifier),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the response classifier.
    pub fn with_classifier(mut self, classifier: impl ClassifyResponse) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send the request and return the first successful response.
    ///
    /// Local errors such as a failed signature are returned at once. Failures
    /// the policy refuses to retry are returned as they are; running out of
    /// attempts or time wraps the last failure in [`ErrorKind::RetryExhausted`].
    pub async fn send(&self, req: &TransportRequest) -> Result<http::Response<Bytes>> {
        let deadline = self.policy.operation_timeout.map(|d| Instant::now() + d);
        let uri = redact_uri(&req.uri.to_string());

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                "sending {} {uri} (attempt {attempt}/{})",
                req.method, self.policy.max_attempts
            );

            let err = match self.send_once(req, deadline).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };

            if !RetryPolicy::is_retryable(req.idempotent, &err) {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(Error::retry_exhausted(attempt, err));
            }

            let delay = self.policy.delay_for_attempt(attempt - 1);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return Err(Error::retry_exhausted(attempt, err));
                }
            }

            warn!(
                "{} {uri} failed on attempt {attempt}, retrying in {delay:?}: {err}",
                req.method
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        req: &TransportRequest,
        deadline: Option<Instant>,
    ) -> Result<http::Response<Bytes>> {
        let timeout = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(Error::network("operation deadline reached"));
                }
                left.min(self.policy.attempt_timeout)
            }
            None => self.policy.attempt_timeout,
        };

        let mut parts = req.to_http()?;
        self.signer.sign(&mut parts).await?;
        let signed = http::Request::from_parts(parts, req.body.clone());

        let resp = match tokio::time::timeout(timeout, self.ctx.http_send(signed)).await {
            Ok(resp) => resp?,
            Err(_) => {
                return Err(Error::network(format!(
                    "attempt timed out after {timeout:?}"
                )))
            }
        };

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        Err(self
            .classifier
            .classify(status, resp.headers(), resp.body()))
    }
}
