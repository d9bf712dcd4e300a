use async_trait::async_trait;
use tablestore_core::{Context, ProvideCredential, Result};

use super::config::credential_from_config;
use crate::credential::Credential;
use crate::Config;

/// EnvCredentialProvider loads the credential from environment variables.
///
/// It reads the same variables as [`Config::from_env`]: the connection
/// string, the account name and key, the SAS token and the emulator flag.
#[derive(Clone, Debug, Default)]
pub struct EnvCredentialProvider {}

impl EnvCredentialProvider {
    /// Create a new env provider.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let config = Config::default().from_env(ctx)?;
        Ok(credential_from_config(&config))
    }
}
