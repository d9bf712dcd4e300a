use async_trait::async_trait;
use tablestore_core::{Context, ProvideCredential, Result};

use crate::{Config, Credential};

/// ConfigCredentialProvider reads the credential out of a [`Config`].
///
/// An account name with its key wins over a SAS token; the emulator flag
/// alone yields the development account.
#[derive(Clone, Debug, Default)]
pub struct ConfigCredentialProvider {
    config: Config,
}

impl ConfigCredentialProvider {
    /// Create a provider reading `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProvideCredential for ConfigCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(credential_from_config(&self.config))
    }
}

pub(crate) fn credential_from_config(config: &Config) -> Option<Credential> {
    if let (Some(name), Some(key)) = (&config.account_name, &config.account_key) {
        if !name.is_empty() && !key.is_empty() {
            return Some(Credential::with_shared_key(name, key));
        }
    }

    if let Some(token) = config.sas_token.as_deref().filter(|v| !v.is_empty()) {
        return Some(Credential::with_sas_token(token));
    }

    if config.use_emulator {
        return Some(Credential::emulator());
    }

    None
}
