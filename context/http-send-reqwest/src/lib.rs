//! [`HttpSend`] implementation backed by [`reqwest`].
//!
//! ```no_run
//! use tablestore_core::Context;
//! use tablestore_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use log::debug;
use reqwest::{Client, Request};
use tablestore_core::{Error, HttpSend, Result};

/// Send requests with a shared [`reqwest::Client`].
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(|err| {
            Error::request_invalid("request cannot be converted for reqwest").with_source(err)
        })?;

        let resp = self.client.execute(req).await.map_err(map_reqwest_error)?;
        let resp: http::Response<_> = resp.into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(map_reqwest_error)?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    // A failed connect means the server never saw the request.
    if err.is_connect() {
        debug!("connect failed: {err}");
        return Error::not_sent("failed to connect").with_source(err);
    }

    let message = if err.is_timeout() {
        "request timed out"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else {
        "failed to send request"
    };
    Error::network(message).with_source(err)
}
