use std::collections::HashMap;

use tablestore_core::{Error, Result};

use crate::constants::{EMULATOR_ACCOUNT_KEY, EMULATOR_ACCOUNT_NAME, EMULATOR_TABLE_URI};
use crate::Config;

/// Parses an [Azure connection string][1] into a table service [`Config`].
///
/// [1]: https://learn.microsoft.com/en-us/azure/storage/common/storage-configure-connection-string
pub(crate) fn parse(conn_str: &str) -> Result<Config> {
    let key_values = parse_into_key_values(conn_str)?;

    if key_values.get("UseDevelopmentStorage").map(String::as_str) == Some("true") {
        let account_name = key_values
            .get("AccountName")
            .cloned()
            .unwrap_or_else(|| EMULATOR_ACCOUNT_NAME.to_string());
        let account_key = key_values
            .get("AccountKey")
            .cloned()
            .unwrap_or_else(|| EMULATOR_ACCOUNT_KEY.to_string());
        let proxy_uri = key_values
            .get("DevelopmentStorageProxyUri")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| EMULATOR_TABLE_URI.to_string());

        return Ok(Config {
            endpoint: Some(format!("{proxy_uri}/{account_name}")),
            account_name: Some(account_name),
            account_key: Some(account_key),
            use_emulator: true,
            ..Default::default()
        });
    }

    let mut config = Config {
        account_name: key_values.get("AccountName").cloned(),
        endpoint: collect_endpoint(&key_values)?,
        ..Default::default()
    };

    // A SAS token wins over the account key when both are present.
    if let Some(token) = key_values.get("SharedAccessSignature") {
        config.sas_token = Some(token.clone());
    } else if config.account_name.is_some() {
        config.account_key = key_values.get("AccountKey").cloned();
    }

    Ok(config)
}

fn parse_into_key_values(conn_str: &str) -> Result<HashMap<String, String>> {
    conn_str
        .trim()
        .replace('\n', "")
        .split(';')
        .filter(|field| !field.trim().is_empty())
        .map(|field| {
            let (key, value) = field.trim().split_once('=').ok_or_else(|| {
                Error::config_invalid(format!(
                    "invalid connection string, expected '=' in field: {field}"
                ))
            })?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Reads `TableEndpoint`, or builds the endpoint from the account and suffix.
///
/// Users can still set an endpoint later, so a missing one is not an error.
fn collect_endpoint(key_values: &HashMap<String, String>) -> Result<Option<String>> {
    if let Some(endpoint) = key_values.get("TableEndpoint") {
        return Ok(Some(endpoint.clone()));
    }

    let (Some(account_name), Some(endpoint_suffix)) = (
        key_values.get("AccountName"),
        key_values.get("EndpointSuffix"),
    ) else {
        return Ok(None);
    };

    let protocol = key_values
        .get("DefaultEndpointsProtocol")
        .map(String::as_str)
        .unwrap_or("https");
    if protocol != "http" && protocol != "https" {
        return Err(Error::config_invalid(format!(
            "invalid DefaultEndpointsProtocol: {protocol}"
        )));
    }

    Ok(Some(format!(
        "{protocol}://{account_name}.table.{endpoint_suffix}"
    )))
}
