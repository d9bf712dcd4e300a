use std::fmt::{Debug, Formatter};

use tablestore_core::utils::Redact;
use tablestore_core::{Context, Error, Result};

use crate::connection_string;
use crate::constants::*;

/// Config carries all the configuration for the table service.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Table service endpoint, e.g. `https://account.table.core.windows.net`.
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZURE_TABLE_ENDPOINT`
    /// - `https://{account_name}.table.core.windows.net` otherwise
    pub endpoint: Option<String>,
    /// `account_name` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZURE_STORAGE_ACCOUNT_NAME`
    pub account_name: Option<String>,
    /// `account_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZURE_STORAGE_ACCOUNT_KEY`
    pub account_key: Option<String>,
    /// `sas_token` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZURE_STORAGE_SAS_TOKEN`
    pub sas_token: Option<String>,
    /// Talk to the local storage emulator with its well-known account.
    ///
    /// - env value: `AZURE_STORAGE_USE_EMULATOR`
    pub use_emulator: bool,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("account_name", &self.account_name)
            .field("account_key", &Redact::from(&self.account_key))
            .field("sas_token", &Redact::from(&self.sas_token))
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

impl Config {
    /// Config of the local storage emulator.
    pub fn emulator() -> Self {
        Self {
            endpoint: Some(format!("{EMULATOR_TABLE_URI}/{EMULATOR_ACCOUNT_NAME}")),
            account_name: Some(EMULATOR_ACCOUNT_NAME.to_string()),
            account_key: Some(EMULATOR_ACCOUNT_KEY.to_string()),
            sas_token: None,
            use_emulator: true,
        }
    }

    /// Load config from env.
    ///
    /// `AZURE_STORAGE_CONNECTION_STRING` is read first; the dedicated
    /// variables then override what it set. Fields already set on `self`
    /// win over both.
    pub fn from_env(self, ctx: &Context) -> Result<Self> {
        let mut config = match ctx.env_var(AZURE_STORAGE_CONNECTION_STRING) {
            Some(v) => Self::try_from_connection_string(&v)?,
            None => Self::default(),
        };

        if let Some(v) = ctx.env_var(AZURE_STORAGE_USE_EMULATOR) {
            if parse_bool(AZURE_STORAGE_USE_EMULATOR, &v)? {
                config = Self::emulator();
            }
        }
        if let Some(v) = ctx.env_var(AZURE_TABLE_ENDPOINT) {
            config.endpoint = Some(v);
        }
        if let Some(v) = ctx.env_var(AZURE_STORAGE_ACCOUNT_NAME) {
            config.account_name = Some(v);
        }
        if let Some(v) = ctx.env_var(AZURE_STORAGE_ACCOUNT_KEY) {
            config.account_key = Some(v);
        }
        if let Some(v) = ctx.env_var(AZURE_STORAGE_SAS_TOKEN) {
            config.sas_token = Some(v);
        }

        Ok(Self {
            endpoint: self.endpoint.or(config.endpoint),
            account_name: self.account_name.or(config.account_name),
            account_key: self.account_key.or(config.account_key),
            sas_token: self.sas_token.or(config.sas_token),
            use_emulator: self.use_emulator || config.use_emulator,
        })
    }

    /// Parses an [Azure connection string][1] into a configuration object.
    ///
    /// The connection string doesn't have to specify all required parameters
    /// because the user is still allowed to set them later directly on the object.
    ///
    /// An example of a connection string looks like:
    ///
    /// ```txt
    /// DefaultEndpointsProtocol=https;
    /// AccountName=mystorageaccount;
    /// AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;
    /// EndpointSuffix=core.windows.net
    /// ```
    ///
    /// [1]: https://learn.microsoft.com/en-us/azure/storage/common/storage-configure-connection-string
    pub fn try_from_connection_string(conn_str: &str) -> Result<Self> {
        connection_string::parse(conn_str)
    }

    /// The endpoint every table request is sent to, without trailing slash.
    pub fn resolve_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        if self.use_emulator {
            return Ok(format!("{EMULATOR_TABLE_URI}/{EMULATOR_ACCOUNT_NAME}"));
        }
        match &self.account_name {
            Some(name) if !name.is_empty() => Ok(format!("https://{name}.table.core.windows.net")),
            _ => Err(Error::config_invalid(
                "either endpoint or account_name must be set",
            )),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" | "" => Ok(false),
        _ => Err(Error::config_invalid(format!(
            "{key} must be a boolean, got {value:?}"
        ))),
    }
}
