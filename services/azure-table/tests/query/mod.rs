use futures::{StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use tablestore_azure_table::{Entity, Filter, Query, TableServiceContext};

use crate::fake::FakeTableService;
use crate::init_table;

/// Insert `n` readings per site, in an order unrelated to their row keys.
async fn seed(devices: &TableServiceContext, sites: &[&str], n: usize) {
    for site in sites {
        for i in (0..n).rev() {
            devices
                .insert_entity(
                    &Entity::new(*site, format!("reading-{i:03}"))
                        .with("Value", i as f64)
                        .with("Even", i % 2 == 0),
                )
                .await
                .unwrap();
        }
    }
}

fn keys(entities: &[Entity]) -> Vec<(String, String)> {
    entities
        .iter()
        .map(|e| (e.partition_key.clone(), e.row_key.clone()))
        .collect()
}

#[tokio::test]
async fn test_partition_scan_is_sorted_by_row_key() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    seed(&devices, &["site-1", "site-2"], 12).await;

    let got: Vec<Entity> = devices
        .retrieve_entities_by_key("site-1", None)
        .try_collect()
        .await
        .unwrap();

    let row_keys: Vec<_> = got.iter().map(|e| e.row_key.as_str()).collect();
    let mut sorted = row_keys.clone();
    sorted.sort();
    assert_eq!(row_keys.len(), 12);
    assert_eq!(row_keys, sorted);
    assert!(got.iter().all(|e| e.partition_key == "site-1"));
}

#[tokio::test]
async fn test_paginated_scan_matches_single_page() {
    let (_, all_at_once) = init_table(FakeTableService::new()).await;
    let (service, paged) = init_table(FakeTableService::new().with_page_size(5)).await;
    seed(&all_at_once, &["site-1", "site-2", "site-3"], 7).await;
    seed(&paged, &["site-1", "site-2", "site-3"], 7).await;
    let before = service.request_count();

    let expected: Vec<Entity> = all_at_once.query(Query::new()).try_collect().await.unwrap();
    let got: Vec<Entity> = paged.query(Query::new()).try_collect().await.unwrap();

    assert_eq!(got.len(), 21);
    assert_eq!(keys(&got), keys(&expected));

    let pages = &service.requests()[before..];
    assert_eq!(pages.len(), 5);
    assert_eq!(
        pages[1].query,
        vec![
            ("NextPartitionKey".to_string(), "site-1".to_string()),
            ("NextRowKey".to_string(), "reading-005".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_page_size_and_continuation() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    seed(&devices, &["site-1"], 5).await;

    let query = Query::new().top(2);
    let first = devices.query_page::<Entity>(&query, None).await.unwrap();
    assert_eq!(first.items.len(), 2);
    let continuation = first.continuation.expect("more pages must follow");

    let rest: Vec<Entity> = {
        let mut items = Vec::new();
        let mut next = Some(continuation);
        while let Some(c) = next {
            let page = devices.query_page::<Entity>(&query, Some(&c)).await.unwrap();
            items.extend(page.items);
            next = page.continuation;
        }
        items
    };
    assert_eq!(rest.len(), 3);
    assert_eq!(rest[0].row_key, "reading-002");
}

#[tokio::test]
async fn test_point_lookup() {
    let (_, devices) = init_table(FakeTableService::new()).await;
    seed(&devices, &["site-1"], 3).await;

    let found: Vec<Entity> = devices
        .retrieve_entities_by_key("site-1", Some("reading-001"))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(keys(&found), vec![("site-1".to_string(), "reading-001".to_string())]);

    let missing: Vec<Entity> = devices
        .retrieve_entities_by_key("site-1", Some("reading-999"))
        .try_collect()
        .await
        .unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_filter_and_select() {
    let (service, devices) = init_table(FakeTableService::new()).await;
    seed(&devices, &["site-1", "site-2"], 6).await;

    let query = Query::new()
        .filter(
            Filter::partition_key("site-2")
                .and(Filter::ge("Value", 2.0))
                .and(!Filter::eq("Even", true)),
        )
        .select(["Value"]);
    let got: Vec<Entity> = devices.query(query).try_collect().await.unwrap();

    assert_eq!(
        got.iter().map(|e| e.row_key.as_str()).collect::<Vec<_>>(),
        vec!["reading-003", "reading-005"]
    );
    assert!(got.iter().all(|e| e.get("Even").is_none()));
    assert_eq!(got[0].get_f64("Value").unwrap(), 3.0);

    let sent = service.requests().pop().unwrap();
    assert_eq!(
        sent.query,
        vec![
            (
                "$filter".to_string(),
                "((PartitionKey eq 'site-2') and (Value ge 2.0)) and (not (Even eq true))"
                    .to_string()
            ),
            ("$select".to_string(), "Value".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_dropping_stream_stops_paging() {
    let (service, devices) = init_table(FakeTableService::new().with_page_size(2)).await;
    seed(&devices, &["site-1"], 10).await;
    let before = service.request_count();

    let mut stream = devices.query::<Entity>(Query::new());
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.row_key, "reading-000");
    let _ = stream.next().await;
    let _ = stream.next().await;
    drop(stream);

    assert_eq!(service.request_count() - before, 2);
}

#[tokio::test]
async fn test_clear_deletes_every_entity() {
    let (service, devices) = init_table(FakeTableService::new().with_page_size(4)).await;
    seed(&devices, &["site-1", "site-2"], 5).await;
    assert_eq!(service.entity_count("devices"), 10);

    assert_eq!(devices.clear().await.unwrap(), 10);
    assert_eq!(service.entity_count("devices"), 0);
    assert_eq!(devices.clear().await.unwrap(), 0);
}
