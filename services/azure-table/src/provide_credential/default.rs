use async_trait::async_trait;
use tablestore_core::{Context, ProvideCredential, ProvideCredentialChain, Result};

use crate::provide_credential::{ConfigCredentialProvider, EnvCredentialProvider};
use crate::{Config, Credential};

/// Default provider that tries multiple credential sources in order.
///
/// 1. Configuration (account key, SAS token, emulator flag), when given
/// 2. Environment variables
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: ProvideCredentialChain<Credential>,
}

impl Default for DefaultCredentialProvider {
    fn default() -> Self {
        Self {
            chain: ProvideCredentialChain::new().push(EnvCredentialProvider::new()),
        }
    }
}

impl DefaultCredentialProvider {
    /// Create a provider reading the environment only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that reads `config` before the environment.
    pub fn with_config(config: Config) -> Self {
        Self {
            chain: ProvideCredentialChain::new()
                .push(ConfigCredentialProvider::new(config))
                .push(EnvCredentialProvider::new()),
        }
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}
