use std::fmt::{self, Display};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method, Response, Uri};
use log::debug;
use percent_encoding::utf8_percent_encode;
use serde::{Deserialize, Serialize};
use tablestore_core::{
    Context, Error, ErrorKind, ProvideCredential, ProvideCredentialChain, Result, RetryPolicy,
    Signer, Transport, TransportRequest, QUERY_ENCODE_SET,
};

use crate::constants::*;
use crate::pager::{paginate, Continuation, Page, ResultStream};
use crate::provide_credential::DefaultCredentialProvider;
use crate::{Config, Credential, RequestSigner, TableErrorClassifier, TableServiceContext};

/// A reference to a table, by name.
///
/// Creating one performs no I/O; it only checks the name is one the service
/// accepts: 3 to 63 ASCII letters or digits, starting with a letter, and not
/// the reserved `tables`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    name: String,
}

impl Table {
    /// Validate `name` and build a reference to it.
    pub fn new(name: &str) -> Result<Self> {
        if !(3..=63).contains(&name.len()) {
            return Err(Error::request_invalid(format!(
                "table name {name:?} must be 3 to 63 characters long"
            )));
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(Error::request_invalid(format!(
                "table name {name:?} must start with a letter"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::request_invalid(format!(
                "table name {name:?} must only contain letters and digits"
            )));
        }
        if name.eq_ignore_ascii_case("tables") {
            return Err(Error::request_invalid("table name \"tables\" is reserved"));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        format!("/Tables('{}')", self.name)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Serialize)]
struct CreateTableBody<'a> {
    #[serde(rename = "TableName")]
    table_name: &'a str,
}

#[derive(Deserialize)]
struct TableListBody {
    value: Vec<TableListItem>,
}

#[derive(Deserialize)]
struct TableListItem {
    #[serde(rename = "TableName")]
    table_name: String,
}

/// Builder for [`TableClient`].
#[derive(Debug)]
pub struct TableClientBuilder {
    ctx: Context,
    config: Config,
    provider: ProvideCredentialChain<Credential>,
    signer: RequestSigner,
    policy: RetryPolicy,
}

impl TableClientBuilder {
    /// Load credentials from `provider` instead of the config and environment.
    ///
    /// Calling it more than once builds a chain tried in call order.
    pub fn credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.provider = self.provider.push(provider);
        self
    }

    /// Replace the request signer, to pick another shared key flavour.
    pub fn request_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Replace the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the client.
    ///
    /// Fails if no endpoint can be resolved from the config or if it is not
    /// an absolute uri.
    pub fn build(self) -> Result<TableClient> {
        let endpoint = self.config.resolve_endpoint()?;
        let uri: Uri = endpoint.parse().map_err(|e| {
            Error::config_invalid(format!("endpoint {endpoint:?} is not a valid uri"))
                .with_source(e)
        })?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(Error::config_invalid(format!(
                "endpoint {endpoint:?} must be an absolute uri"
            )));
        }

        let provider = if self.provider.is_empty() {
            ProvideCredentialChain::new().push(DefaultCredentialProvider::with_config(self.config))
        } else {
            self.provider
        };

        let signer = Signer::new(self.ctx.clone(), provider, self.signer);
        let transport = Transport::new(self.ctx, signer)
            .with_retry_policy(self.policy)
            .with_classifier(TableErrorClassifier);

        debug!("table client created for endpoint {endpoint}");
        Ok(TableClient {
            inner: Arc::new(Inner {
                endpoint,
                transport,
            }),
        })
    }
}

#[derive(Debug)]
struct Inner {
    endpoint: String,
    transport: Transport<Credential>,
}

/// TableClient manages the tables of one storage account.
///
/// Clones share the same transport and credential cache.
#[derive(Debug, Clone)]
pub struct TableClient {
    inner: Arc<Inner>,
}

impl TableClient {
    /// Create a client with the default credential chain and retry policy.
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        Self::builder(ctx, config).build()
    }

    /// Start building a client.
    pub fn builder(ctx: Context, config: Config) -> TableClientBuilder {
        TableClientBuilder {
            ctx,
            config,
            provider: ProvideCredentialChain::new(),
            signer: RequestSigner::new(),
            policy: RetryPolicy::default(),
        }
    }

    /// Endpoint requests are sent to, without trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Get a reference to a table. No request is sent.
    pub fn table(&self, name: &str) -> Result<Table> {
        Table::new(name)
    }

    /// Get a context to work with the entities of `table`.
    pub fn get_service_context(&self, table: &Table) -> TableServiceContext {
        TableServiceContext::new(self.clone(), table.clone())
    }

    /// Check whether a table exists.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let table = Table::new(name)?;
        let req = self.request(Method::GET, &table.path(), &[])?;
        match self.send(req).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Create a table, failing with [`ErrorKind::AlreadyExists`] if it exists.
    pub async fn create_table(&self, name: &str) -> Result<Table> {
        let table = Table::new(name)?;
        let body = serde_json::to_vec(&CreateTableBody {
            table_name: table.name(),
        })
        .map_err(|e| Error::unexpected("failed to serialize table").with_source(e))?;

        let req = self
            .request(Method::POST, "/Tables", &[])?
            .with_header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))
            .with_header(
                HeaderName::from_static(PREFER),
                HeaderValue::from_static(RETURN_NO_CONTENT),
            )
            .with_body(body);
        self.send(req).await?;

        debug!("table {table} created");
        Ok(table)
    }

    /// Create a table unless it already exists.
    pub async fn create_table_if_not_exists(&self, name: &str) -> Result<Table> {
        match self.create_table(name).await {
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Table::new(name),
            res => res,
        }
    }

    /// Delete a table. Deleting a missing table succeeds.
    pub async fn delete_table(&self, name: &str) -> Result<()> {
        let table = Table::new(name)?;
        let req = self.request(Method::DELETE, &table.path(), &[])?;
        match self.send(req).await {
            Ok(_) => {
                debug!("table {table} deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// List every table of the account, fetching pages as the stream is polled.
    pub fn list_tables(&self) -> ResultStream<Table> {
        let this = self.clone();
        paginate(move |continuation| {
            let this = this.clone();
            async move { this.list_tables_page(continuation.as_ref()).await }
        })
    }

    /// Fetch one page of tables, starting at `continuation`.
    pub async fn list_tables_page(
        &self,
        continuation: Option<&Continuation>,
    ) -> Result<Page<Table>> {
        let query = continuation
            .map(|c| c.query_pairs().to_vec())
            .unwrap_or_default();
        let req = self.request(Method::GET, "/Tables", &query)?;
        let resp = self.send(req).await?;

        let continuation = Continuation::from_headers(
            resp.headers(),
            &[(X_MS_CONTINUATION_NEXT_TABLE_NAME, NEXT_TABLE_NAME)],
        );
        let body: TableListBody = serde_json::from_slice(resp.body())
            .map_err(|e| Error::decode("table listing is not valid json").with_source(e))?;
        let items = body
            .value
            .into_iter()
            .map(|t| Table { name: t.table_name })
            .collect();

        Ok(Page {
            items,
            continuation,
        })
    }

    /// Build a request to `path` under the endpoint with the table service headers set.
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
    ) -> Result<TransportRequest> {
        let mut uri = format!("{}{}", self.inner.endpoint, path);
        for (i, (k, v)) in query.iter().enumerate() {
            uri.push(if i == 0 { '?' } else { '&' });
            uri.extend(utf8_percent_encode(k, QUERY_ENCODE_SET));
            uri.push('=');
            uri.extend(utf8_percent_encode(v, QUERY_ENCODE_SET));
        }

        Ok(TransportRequest::new(method, uri.parse()?)
            .with_header(ACCEPT, HeaderValue::from_static(ACCEPT_JSON))
            .with_header(
                HeaderName::from_static(X_MS_VERSION),
                HeaderValue::from_static(TABLE_SERVICE_VERSION),
            )
            .with_header(
                HeaderName::from_static(DATA_SERVICE_VERSION),
                HeaderValue::from_static(DATA_SERVICE_VERSION_VALUE),
            )
            .with_header(
                HeaderName::from_static(MAX_DATA_SERVICE_VERSION),
                HeaderValue::from_static(MAX_DATA_SERVICE_VERSION_VALUE),
            ))
    }

    pub(crate) async fn send(&self, req: TransportRequest) -> Result<Response<Bytes>> {
        self.inner.transport.send(&req).await
    }
}
