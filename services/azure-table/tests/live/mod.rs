use std::env;

use anyhow::Result;
use futures::TryStreamExt;
use log::warn;
use tablestore_azure_table::{Config, Entity, TableClient, TableServiceContext};
use tablestore_core::{Context, OsEnv};
use tablestore_http_send_reqwest::ReqwestHttpSend;

/// Connect to the account described by the environment, usually the local
/// emulator, when `TABLESTORE_AZURE_TABLE_TEST=on`.
fn init_client() -> Option<TableClient> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("TABLESTORE_AZURE_TABLE_TEST").unwrap_or_default() != "on" {
        return None;
    }

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let config = Config::default()
        .from_env(&ctx)
        .expect("table config must be loadable from env");
    Some(TableClient::new(ctx, config).expect("table client must be buildable"))
}

async fn fresh_table(client: &TableClient, name: &str) -> Result<TableServiceContext> {
    let table = client.create_table_if_not_exists(name).await?;
    let ctx = client.get_service_context(&table);
    ctx.clear().await?;
    Ok(ctx)
}

#[tokio::test]
async fn test_live_entity_round_trip() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("TABLESTORE_AZURE_TABLE_TEST is not set, skipped");
        return Ok(());
    };
    let devices = fresh_table(&client, "tablestorelive").await?;

    let entity = Entity::new("site-1", "thermo-1")
        .with("Name", "hall thermometer")
        .with("Reading", 21.5)
        .with("Total", 1i64 << 40);
    devices.insert_entity(&entity).await?;

    let got: Entity = devices
        .get_entity("site-1", "thermo-1")
        .await?
        .expect("inserted entity must be readable");
    assert_eq!(got.get_f64("Reading")?, 21.5);
    assert_eq!(got.get_i64("Total")?, 1i64 << 40);

    devices
        .merge_entity(&Entity::new("site-1", "thermo-1").with("Reading", 22.0))
        .await?;
    let all: Vec<Entity> = devices
        .retrieve_entities_by_key("site-1", None)
        .try_collect()
        .await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get_f64("Reading")?, 22.0);

    devices.delete_entity("site-1", "thermo-1").await?;
    devices.delete_entity("site-1", "thermo-1").await?;
    Ok(())
}

#[tokio::test]
async fn test_live_table_listing() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("TABLESTORE_AZURE_TABLE_TEST is not set, skipped");
        return Ok(());
    };
    fresh_table(&client, "tablestorelisting").await?;

    let names: Vec<String> = client
        .list_tables()
        .map_ok(|t| t.name().to_string())
        .try_collect()
        .await?;
    assert!(names.iter().any(|n| n == "tablestorelisting"));
    Ok(())
}
