use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

// Headers used in the table service, lowercase as `HeaderName` stores them.
pub const X_MS_DATE: &str = "x-ms-date";
pub const X_MS_VERSION: &str = "x-ms-version";
pub const DATA_SERVICE_VERSION: &str = "dataserviceversion";
pub const MAX_DATA_SERVICE_VERSION: &str = "maxdataserviceversion";
pub const PREFER: &str = "prefer";
pub const CONTENT_MD5: &str = "content-md5";

pub const X_MS_CONTINUATION_NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
pub const X_MS_CONTINUATION_NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";
pub const X_MS_CONTINUATION_NEXT_TABLE_NAME: &str = "x-ms-continuation-nexttablename";

// Header values.
pub const TABLE_SERVICE_VERSION: &str = "2019-02-02";
pub const DATA_SERVICE_VERSION_VALUE: &str = "3.0";
pub const MAX_DATA_SERVICE_VERSION_VALUE: &str = "3.0;NetFx";
pub const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const RETURN_NO_CONTENT: &str = "return-no-content";

// Query keys used for continuation.
pub const NEXT_PARTITION_KEY: &str = "NextPartitionKey";
pub const NEXT_ROW_KEY: &str = "NextRowKey";
pub const NEXT_TABLE_NAME: &str = "NextTableName";

// Env values used in the table service.
pub const AZURE_STORAGE_ACCOUNT_NAME: &str = "AZURE_STORAGE_ACCOUNT_NAME";
pub const AZURE_STORAGE_ACCOUNT_KEY: &str = "AZURE_STORAGE_ACCOUNT_KEY";
pub const AZURE_STORAGE_SAS_TOKEN: &str = "AZURE_STORAGE_SAS_TOKEN";
pub const AZURE_TABLE_ENDPOINT: &str = "AZURE_TABLE_ENDPOINT";
pub const AZURE_STORAGE_USE_EMULATOR: &str = "AZURE_STORAGE_USE_EMULATOR";
pub const AZURE_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";

// Storage emulator defaults.
pub const EMULATOR_ACCOUNT_NAME: &str = "devstoreaccount1";
pub const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
pub const EMULATOR_TABLE_URI: &str = "http://127.0.0.1:10002";

/// Characters escaped inside a key literal of an entity path.
///
/// Matches what the service expects inside `PartitionKey='...'`; the quote
/// itself is doubled before encoding.
pub static KEY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'\'');
