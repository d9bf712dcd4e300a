use crate::constants::*;
use crate::Credential;
use async_trait::async_trait;
use http::request::Parts;
use http::{header, HeaderName, HeaderValue};
use log::debug;
use tablestore_core::hash::{base64_decode, base64_hmac_sha256};
use tablestore_core::time::{format_http_date, now, DateTime};
use tablestore_core::{Context, Error, Result, SignRequest, SigningRequest};

/// Flavour of the shared key authorization header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SharedKeyFlavor {
    /// `SharedKey`: verb, content headers, date and resource are signed.
    #[default]
    SharedKey,
    /// `SharedKeyLite`: only the date and resource are signed.
    SharedKeyLite,
}

/// RequestSigner that implements Shared Key authorization for the Table service.
///
/// - [Authorize with Shared Key](https://learn.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#table-service-shared-key-authorization)
#[derive(Debug, Default)]
pub struct RequestSigner {
    flavor: SharedKeyFlavor,
    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer using the `SharedKey` flavour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another flavour of shared key.
    pub fn with_flavor(mut self, flavor: SharedKeyFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Err(Error::auth_config(
                "no credential found for the table service",
            ));
        };

        let mut ctx = SigningRequest::build(req)?;
        let date = format_http_date(self.time.unwrap_or_else(now));
        ctx.headers
            .insert(HeaderName::from_static(X_MS_DATE), date.parse()?);

        match cred {
            Credential::SasToken { token } => {
                ctx.query_append(token);
            }
            Credential::SharedKey {
                account_name,
                account_key,
            } => {
                if account_name.is_empty() {
                    return Err(Error::auth_config("account name is empty"));
                }
                let key = base64_decode(account_key).map_err(|e| {
                    Error::auth_config("account key is not valid base64").with_source(e)
                })?;

                let string_to_sign = string_to_sign(&ctx, self.flavor, account_name, &date)?;
                debug!("string to sign: {}", string_to_sign.escape_debug());
                let signature = base64_hmac_sha256(&key, string_to_sign.as_bytes());

                let scheme = match self.flavor {
                    SharedKeyFlavor::SharedKey => "SharedKey",
                    SharedKeyFlavor::SharedKeyLite => "SharedKeyLite",
                };
                ctx.headers.insert(header::AUTHORIZATION, {
                    let mut value: HeaderValue =
                        format!("{scheme} {account_name}:{signature}").parse()?;
                    value.set_sensitive(true);
                    value
                });
            }
        }

        ctx.apply(req)
    }
}

/// Construct string to sign
///
/// ## Format
///
/// ```text
/// SharedKey:
///     VERB + "\n" +
///     Content-MD5 + "\n" +
///     Content-Type + "\n" +
///     Date + "\n" +
///     CanonicalizedResource;
///
/// SharedKeyLite:
///     Date + "\n" +
///     CanonicalizedResource;
/// ```
///
/// `Date` is the `x-ms-date` value stamped on the request.
fn string_to_sign(
    ctx: &SigningRequest,
    flavor: SharedKeyFlavor,
    account_name: &str,
    date: &str,
) -> Result<String> {
    let resource = canonicalized_resource(ctx, account_name);

    Ok(match flavor {
        SharedKeyFlavor::SharedKey => format!(
            "{}\n{}\n{}\n{date}\n{resource}",
            ctx.method.as_str(),
            ctx.header_get_or_default(&HeaderName::from_static(CONTENT_MD5))?,
            ctx.header_get_or_default(&header::CONTENT_TYPE)?,
        ),
        SharedKeyFlavor::SharedKeyLite => format!("{date}\n{resource}"),
    })
}

/// `/{account}{path}`, plus the `comp` query parameter when present.
fn canonicalized_resource(ctx: &SigningRequest, account_name: &str) -> String {
    match ctx.query_get("comp") {
        Some(comp) => format!("/{account_name}{}?comp={comp}", ctx.path),
        None => format!("/{account_name}{}", ctx.path),
    }
}
