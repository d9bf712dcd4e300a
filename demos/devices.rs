use anyhow::Result;
use futures::TryStreamExt;
use tablestore_azure_table::{
    Config, EdmType, Entity, Filter, Query, Schema, TableClient, TableEntity,
};
use tablestore_core::{Context, OsEnv};
use tablestore_http_send_reqwest::ReqwestHttpSend;

/// A sensor registered at a site.
#[derive(Debug, Clone)]
struct Device {
    site: String,
    id: String,
    model: String,
    temperature: f64,
}

impl TableEntity for Device {
    fn schema() -> Schema {
        Schema::dynamic()
            .field("Model", EdmType::String)
            .field("Temperature", EdmType::Double)
    }

    fn to_entity(&self) -> tablestore_core::Result<Entity> {
        Ok(Entity::new(&self.site, &self.id)
            .with("Model", self.model.as_str())
            .with("Temperature", self.temperature))
    }

    fn from_entity(entity: Entity) -> tablestore_core::Result<Self> {
        Ok(Self {
            model: entity.get_str("Model")?.to_string(),
            temperature: entity.get_f64("Temperature")?,
            site: entity.partition_key,
            id: entity.row_key,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);

    // Falls back to the local emulator when nothing is configured.
    let config = Config::default().from_env(&ctx)?;
    let config = if config.account_name.is_none() && config.endpoint.is_none() {
        Config::emulator()
    } else {
        config
    };
    let client = TableClient::new(ctx, config)?;
    println!("Using table endpoint {}", client.endpoint());

    let table = client.create_table_if_not_exists("devices").await?;
    let devices = client.get_service_context(&table);

    for (id, model, temperature) in [("thermo-1", "TH-100", 21.5), ("thermo-2", "TH-200", 19.0)] {
        let device = Device {
            site: "site-1".to_string(),
            id: id.to_string(),
            model: model.to_string(),
            temperature,
        };
        let etag = devices.insert_entity(&device).await?;
        println!("Inserted {id} with etag {etag}");
    }

    let mut warm: Device = devices
        .get_entity("site-1", "thermo-1")
        .await?
        .ok_or_else(|| anyhow::anyhow!("thermo-1 was just inserted"))?;
    warm.temperature = 24.0;
    devices.update_entity(&warm).await?;
    println!("Updated {} to {}", warm.id, warm.temperature);

    let at_site: Vec<Device> = devices
        .retrieve_entities_by_key("site-1", None)
        .try_collect()
        .await?;
    for device in &at_site {
        println!("{}/{}: {} at {}", device.site, device.id, device.model, device.temperature);
    }

    let hot: Vec<Device> = devices
        .query(Query::new().filter(Filter::partition_key("site-1").and(Filter::gt("Temperature", 20.0))))
        .try_collect()
        .await?;
    println!("{} device(s) above 20 degrees", hot.len());

    client.delete_table(table.name()).await?;
    println!("Deleted table {table}");

    Ok(())
}
