use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tablestore_core::{kind_for_status, ClassifyResponse, Error, ErrorKind};

const X_MS_ERROR_CODE: &str = "x-ms-error-code";

/// Error body returned by the table service.
///
/// ```json
/// {"odata.error":{"code":"EntityAlreadyExists","message":{"lang":"en-US","value":"The specified entity already exists."}}}
/// ```
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    code: String,
    message: ODataMessage,
}

#[derive(Debug, Deserialize)]
struct ODataMessage {
    value: String,
}

/// Classify table service responses, reading the `odata.error` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableErrorClassifier;

impl ClassifyResponse for TableErrorClassifier {
    fn classify(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
        let (code, message) = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(body) => (Some(body.error.code), body.error.message.value),
            Err(_) => {
                let code = headers
                    .get(X_MS_ERROR_CODE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let text = String::from_utf8_lossy(body).trim().to_string();
                let message = if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string()
                } else {
                    text
                };
                (code, message)
            }
        };

        let kind = match (status, code.as_deref()) {
            (StatusCode::CONFLICT, Some("TableAlreadyExists")) => ErrorKind::AlreadyExists,
            _ => kind_for_status(status),
        };

        let err = Error::new(kind, message).with_status(status);
        match code {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}
