use chrono::{Duration, TimeZone, Utc};
use http::header::IF_MATCH;
use pretty_assertions::assert_eq;
use tablestore_azure_table::{
    DeleteOptions, EdmType, Entity, Schema, TableEntity, UpdateOptions, Uuid,
};
use tablestore_core::{ErrorKind, Result};

use crate::fake::FakeTableService;
use crate::init_table;

#[derive(Debug, Clone, PartialEq)]
struct Device {
    site: String,
    id: String,
    name: String,
    reading: f64,
    online: bool,
}

impl TableEntity for Device {
    fn schema() -> Schema {
        Schema::dynamic()
            .field("Name", EdmType::String)
            .field("Reading", EdmType::Double)
            .optional("Online", EdmType::Boolean)
    }

    fn to_entity(&self) -> Result<Entity> {
        Ok(Entity::new(&self.site, &self.id)
            .with("Name", self.name.as_str())
            .with("Reading", self.reading)
            .with("Online", self.online))
    }

    fn from_entity(entity: Entity) -> Result<Self> {
        Ok(Self {
            name: entity.get_str("Name")?.to_string(),
            reading: entity.get_f64("Reading")?,
            online: entity.get_bool("Online").unwrap_or(false),
            site: entity.partition_key,
            id: entity.row_key,
        })
    }
}

fn thermo() -> Device {
    Device {
        site: "site-1".to_string(),
        id: "thermo-1".to_string(),
        name: "hall thermometer".to_string(),
        reading: 21.5,
        online: true,
    }
}

/// Drop the fields the service assigns so entities can be compared.
fn without_system(mut e: Entity) -> Entity {
    e.timestamp = None;
    e.etag = None;
    e
}

#[tokio::test]
async fn test_insert_then_get_round_trips_every_type() {
    let (_, devices) = init_table(FakeTableService::new()).await;

    let installed = Utc.with_ymd_and_hms(2023, 7, 14, 8, 30, 0).unwrap()
        + Duration::microseconds(123_456);
    let entity = Entity::new("site-1", "thermo-1")
        .with("Name", "hall thermometer")
        .with("Count", 3)
        .with("TotalReadings", 1i64 << 40)
        .with("Reading", 2.0)
        .with("Online", true)
        .with("Installed", installed)
        .with("Firmware", vec![0u8, 1, 254, 255])
        .with(
            "DeviceId",
            Uuid::parse_str("C9DA6455-213D-42C9-9A79-3E9149A57833").unwrap(),
        );

    let etag = devices.insert_entity(&entity).await.unwrap();

    let got: Entity = devices
        .get_entity("site-1", "thermo-1")
        .await
        .unwrap()
        .expect("entity must exist");
    assert_eq!(got.etag.as_deref(), Some(etag.as_str()));
    assert!(got.timestamp.is_some());
    assert_eq!(without_system(got), entity);
}

#[tokio::test]
async fn test_insert_sends_entity_without_content_echo() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    devices.insert_entity(&thermo()).await.unwrap();

    let insert = service.requests().pop().unwrap();
    assert_eq!(insert.path, "/devstoreaccount1/devices");
    assert_eq!(insert.headers["prefer"], "return-no-content");
    assert_eq!(insert.headers["content-type"], "application/json");
    assert_eq!(insert.headers["accept"], "application/json;odata=minimalmetadata");
    assert!(insert.headers["authorization"]
        .to_str()
        .unwrap()
        .starts_with("SharedKey devstoreaccount1:"));
}

#[tokio::test]
async fn test_insert_existing_entity_conflicts() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    devices.insert_entity(&thermo()).await.unwrap();
    let before = service.request_count();

    let err = devices.insert_entity(&thermo()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.code(), Some("EntityAlreadyExists"));
    assert_eq!(service.request_count(), before + 1);
}

#[tokio::test]
async fn test_typed_entity() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    devices.insert_entity(&thermo()).await.unwrap();

    let got: Option<Device> = devices.get_entity("site-1", "thermo-1").await.unwrap();
    assert_eq!(got, Some(thermo()));

    let missing: Option<Device> = devices.get_entity("site-1", "nope").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_typed_entity_rejects_mismatched_record() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    devices
        .insert_entity(
            &Entity::new("site-1", "thermo-1")
                .with("Name", "hall thermometer")
                .with("Reading", "hot"),
        )
        .await
        .unwrap();

    let err = devices
        .get_entity::<Device>("site-1", "thermo-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);

    devices
        .insert_entity(&Entity::new("site-1", "thermo-2").with("Reading", 1.5))
        .await
        .unwrap();
    let err = devices
        .get_entity::<Device>("site-1", "thermo-2")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
    assert!(err.message().contains("Name"));
}

#[tokio::test]
async fn test_update_is_visible_on_next_read() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    let first = devices.insert_entity(&thermo()).await.unwrap();

    let mut device = thermo();
    device.reading = 23.25;
    let second = devices.update_entity(&device).await.unwrap();
    assert_ne!(first, second);

    let got: Device = devices
        .get_entity("site-1", "thermo-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.reading, 23.25);
}

#[tokio::test]
async fn test_update_replaces_and_merge_keeps_properties() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    devices
        .insert_entity(
            &Entity::new("site-1", "thermo-1")
                .with("Name", "hall thermometer")
                .with("Reading", 21.5),
        )
        .await
        .unwrap();

    devices
        .merge_entity(&Entity::new("site-1", "thermo-1").with("Online", true))
        .await
        .unwrap();
    let got: Entity = devices.get_entity("site-1", "thermo-1").await.unwrap().unwrap();
    assert_eq!(got.get_str("Name").unwrap(), "hall thermometer");
    assert_eq!(got.get_f64("Reading").unwrap(), 21.5);
    assert!(got.get_bool("Online").unwrap());

    devices
        .update_entity(&Entity::new("site-1", "thermo-1").with("Online", false))
        .await
        .unwrap();
    let got: Entity = devices.get_entity("site-1", "thermo-1").await.unwrap().unwrap();
    assert_eq!(got.len(), 1);
    assert!(!got.get_bool("Online").unwrap());
}

#[tokio::test]
async fn test_update_missing_entity_fails() {
    let (_, devices) = init_table(FakeTableService::new()).await;

    let err = devices.update_entity(&thermo()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = devices.merge_entity(&thermo()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_conditional_update() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let etag = devices.insert_entity(&thermo()).await.unwrap();

    let mut device = thermo();
    device.reading = 30.0;
    let fresh = devices
        .update_entity_with(&device, &UpdateOptions::new().if_match(&etag))
        .await
        .unwrap();
    assert_eq!(service.requests().pop().unwrap().headers[IF_MATCH], etag.as_str());

    // The first etag is stale now.
    let err = devices
        .merge_entity_with(&device, &UpdateOptions::new().if_match(&etag))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    devices
        .merge_entity_with(&device, &UpdateOptions::new().if_match(&fresh))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_entity() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let etag = devices.insert_entity(&thermo()).await.unwrap();

    let err = devices
        .delete_entity_with("site-1", "thermo-1", &DeleteOptions::new().if_match("W/\"0\""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(service.entity_count("devices"), 1);

    devices
        .delete_entity_with("site-1", "thermo-1", &DeleteOptions::new().if_match(etag))
        .await
        .unwrap();
    assert_eq!(service.entity_count("devices"), 0);

    // Deleting again is fine unless asked to be strict.
    devices.delete_entity("site-1", "thermo-1").await.unwrap();
    let err = devices
        .delete_entity_with("site-1", "thermo-1", &DeleteOptions::new().strict(true))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_keys_are_escaped_in_paths() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    let entity = Entity::new("O'Brien's site", "a+b=c").with("Name", "odd keys");

    devices.insert_entity(&entity).await.unwrap();
    let got: Entity = devices
        .get_entity("O'Brien's site", "a+b=c")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(without_system(got), entity);

    let lookup = service.requests().pop().unwrap();
    assert_eq!(
        lookup.path,
        "/devstoreaccount1/devices(PartitionKey='O''Brien''s%20site',RowKey='a%2Bb%3Dc')"
    );

    devices.delete_entity("O'Brien's site", "a+b=c").await.unwrap();
    assert_eq!(service.entity_count("devices"), 0);
}

#[tokio::test]
async fn test_entity_in_missing_table() {
    let (_, client) = crate::init();
    let table = client.table("ghosts").unwrap();
    let ghosts = client.get_service_context(&table);

    let err = ghosts.insert_entity(&thermo()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.code(), Some("TableNotFound"));
}
