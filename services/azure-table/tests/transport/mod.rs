use chrono::{TimeZone, Utc};
use http::Method;
use pretty_assertions::assert_eq;
use tablestore_azure_table::{
    Config, Entity, RequestSigner, SharedKeyFlavor, StaticCredentialProvider, TableClient,
};
use tablestore_core::{Context, ErrorKind, RetryPolicy};

use crate::fake::{FakeTableService, ACCOUNT, ACCOUNT_KEY};
use crate::init_table;

#[tokio::test]
async fn test_retry_after_throttling() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let before = service.request_count();

    service.fail_next(&[503, 503]);
    let found: Option<Entity> = devices.get_entity("site-1", "thermo-1").await.unwrap();
    assert_eq!(found, None);
    assert_eq!(service.request_count() - before, 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let before = service.request_count();

    service.fail_next(&[503, 500, 503]);
    let err = devices
        .get_entity::<Entity>("site-1", "thermo-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    let last = err.last_error().expect("last error must be kept");
    assert_eq!(last.kind(), ErrorKind::Throttled);
    assert_eq!(last.code(), Some("ServerBusy"));
    assert_eq!(service.request_count() - before, 3);
}

#[tokio::test]
async fn test_insert_is_not_retried_after_response() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let before = service.request_count();

    service.fail_next(&[503]);
    let err = devices
        .insert_entity(&Entity::new("site-1", "thermo-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Throttled);
    assert_eq!(service.request_count() - before, 1);
    assert_eq!(service.entity_count("devices"), 0);
}

#[tokio::test]
async fn test_conditional_writes_are_retried() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    devices
        .insert_entity(&Entity::new("site-1", "thermo-1").with("Reading", 1.0))
        .await
        .unwrap();

    service.fail_next(&[500]);
    devices
        .merge_entity(&Entity::new("site-1", "thermo-1").with("Reading", 2.0))
        .await
        .unwrap();

    let merges = service
        .requests()
        .into_iter()
        .filter(|r| r.method.as_str() == "MERGE")
        .count();
    assert_eq!(merges, 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let before = service.request_count();

    service.fail_next(&[400]);
    let err = devices
        .get_entity::<Entity>("site-1", "thermo-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceError);
    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
    assert_eq!(service.request_count() - before, 1);
}

#[tokio::test]
async fn test_wrong_key_is_rejected_by_service() {
    let service = FakeTableService::new();
    let ctx = Context::new().with_http_send(service.clone());
    let client = TableClient::builder(ctx, Config::emulator())
        .credential_provider(StaticCredentialProvider::new_shared_key(
            ACCOUNT,
            "d3Jvbmcga2V5IGZvciB0aGUgZGV2IGFjY291bnQ=",
        ))
        .retry_policy(RetryPolicy::immediate(3))
        .build()
        .unwrap();

    let err = client.create_table("devices").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceError);
    assert_eq!(err.code(), Some("AuthenticationFailed"));
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn test_missing_credential_fails_before_sending() {
    let service = FakeTableService::new();
    let ctx = Context::new().with_http_send(service.clone());
    let config = Config {
        endpoint: Some(format!("http://127.0.0.1:10002/{ACCOUNT}")),
        ..Default::default()
    };
    let client = TableClient::new(ctx, config).unwrap();

    let err = client.table_exists("devices").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthConfigError);
    assert_eq!(service.request_count(), 0);
}

#[tokio::test]
async fn test_sas_token_is_sent_as_query() {
    let service = FakeTableService::new();
    let ctx = Context::new().with_http_send(service.clone());
    let client = TableClient::builder(ctx, Config::emulator())
        .credential_provider(StaticCredentialProvider::new_sas_token(
            "sv=2019-02-02&tn=devices&sp=raud&sig=c2lnbmF0dXJl",
        ))
        .build()
        .unwrap();

    assert!(!client.table_exists("devices").await.unwrap());

    let sent = service.requests().pop().unwrap();
    assert!(!sent.headers.contains_key("authorization"));
    assert_eq!(
        sent.query,
        vec![
            ("sv".to_string(), "2019-02-02".to_string()),
            ("tn".to_string(), "devices".to_string()),
            ("sp".to_string(), "raud".to_string()),
            ("sig".to_string(), "c2lnbmF0dXJl".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_signature_is_deterministic() {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let service = FakeTableService::new();
    let ctx = Context::new().with_http_send(service.clone());
    let client = TableClient::builder(ctx, Config::emulator())
        .credential_provider(StaticCredentialProvider::new_shared_key(ACCOUNT, ACCOUNT_KEY))
        .request_signer(RequestSigner::new().with_time(at))
        .build()
        .unwrap();

    client.table_exists("devices").await.unwrap();
    client.table_exists("devices").await.unwrap();

    let sent = service.requests();
    assert_eq!(sent[0].method, Method::GET);
    assert_eq!(sent[0].headers["x-ms-date"], "Mon, 01 Jan 2024 00:00:00 GMT");
    assert_eq!(
        sent[0].headers["authorization"],
        sent[1].headers["authorization"]
    );
}

#[tokio::test]
async fn test_shared_key_lite_flavor_header() {
    let service = FakeTableService::new();
    let ctx = Context::new().with_http_send(service.clone());
    let client = TableClient::builder(ctx, Config::emulator())
        .request_signer(RequestSigner::new().with_flavor(SharedKeyFlavor::SharedKeyLite))
        .build()
        .unwrap();

    // The in-memory service only verifies the full shared key scheme.
    let err = client.table_exists("devices").await.unwrap_err();
    assert_eq!(err.code(), Some("AuthenticationFailed"));
    let auth = service.requests().pop().unwrap().headers["authorization"].clone();
    assert!(auth.to_str().unwrap().starts_with("SharedKeyLite devstoreaccount1:"));
}
