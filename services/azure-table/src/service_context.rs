use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use http::header::{CONTENT_TYPE, ETAG, IF_MATCH};
use http::{HeaderName, HeaderValue, Method, Response};
use log::debug;
use percent_encoding::utf8_percent_encode;
use serde::Deserialize;
use tablestore_core::{Error, Result};

use crate::codec::{self, WireRecord};
use crate::constants::*;
use crate::pager::{paginate, Continuation, Page, ResultStream};
use crate::{Entity, Filter, Query, Table, TableClient, TableEntity};

/// Options of [`TableServiceContext::update_entity_with`] and
/// [`TableServiceContext::merge_entity_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    if_match: Option<String>,
}

impl UpdateOptions {
    /// Unconditional update of an existing entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only update if the stored entity still has this etag.
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }
}

/// Options of [`TableServiceContext::delete_entity_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    if_match: Option<String>,
    strict: bool,
}

impl DeleteOptions {
    /// Unconditional delete that ignores missing entities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only delete if the stored entity still has this etag.
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    /// Fail with `NotFound` when the entity does not exist.
    ///
    /// A delete retried after a lost response also reports `NotFound`.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[derive(Deserialize)]
struct QueryBody {
    value: Vec<WireRecord>,
}

/// TableServiceContext reads and writes the entities of one table.
///
/// Every call sends its request right away; there is no pending change set.
#[derive(Debug, Clone)]
pub struct TableServiceContext {
    client: TableClient,
    table: Table,
}

impl TableServiceContext {
    pub(crate) fn new(client: TableClient, table: Table) -> Self {
        Self { client, table }
    }

    /// The table this context works on.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Insert a new entity and return its etag.
    ///
    /// Fails with `Conflict` if an entity with the same keys exists.
    pub async fn insert_entity<T: TableEntity>(&self, entity: &T) -> Result<String> {
        let (_, body) = encode_body(entity)?;
        let req = self
            .client
            .request(Method::POST, &format!("/{}", self.table.name()), &[])?
            .with_header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))
            .with_header(
                HeaderName::from_static(PREFER),
                HeaderValue::from_static(RETURN_NO_CONTENT),
            )
            .with_body(body);

        let resp = self.client.send(req).await?;
        etag_of(&resp)
    }

    /// Replace an existing entity and return its new etag.
    pub async fn update_entity<T: TableEntity>(&self, entity: &T) -> Result<String> {
        self.update_entity_with(entity, &UpdateOptions::default())
            .await
    }

    /// Replace an existing entity, optionally only if its etag matches.
    ///
    /// Fails with `NotFound` if the entity does not exist, and with
    /// `PreconditionFailed` if the etag does not match.
    pub async fn update_entity_with<T: TableEntity>(
        &self,
        entity: &T,
        options: &UpdateOptions,
    ) -> Result<String> {
        self.write(Method::PUT, entity, options).await
    }

    /// Update the given properties of an existing entity, keeping the others.
    pub async fn merge_entity<T: TableEntity>(&self, entity: &T) -> Result<String> {
        self.merge_entity_with(entity, &UpdateOptions::default())
            .await
    }

    /// Merge into an existing entity, optionally only if its etag matches.
    pub async fn merge_entity_with<T: TableEntity>(
        &self,
        entity: &T,
        options: &UpdateOptions,
    ) -> Result<String> {
        let merge = Method::from_bytes(b"MERGE")
            .map_err(|e| Error::unexpected("invalid MERGE method").with_source(e))?;
        self.write(merge, entity, options).await
    }

    async fn write<T: TableEntity>(
        &self,
        method: Method,
        entity: &T,
        options: &UpdateOptions,
    ) -> Result<String> {
        let (entity, body) = encode_body(entity)?;
        let if_match = options.if_match.as_deref().unwrap_or("*");

        // Always conditional, so replaying a write never creates the entity.
        let req = self
            .client
            .request(
                method,
                &self.entity_path(&entity.partition_key, &entity.row_key),
                &[],
            )?
            .with_header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))
            .with_header(IF_MATCH, HeaderValue::from_str(if_match)?)
            .with_body(body)
            .with_idempotent(true);

        let resp = self.client.send(req).await?;
        etag_of(&resp)
    }

    /// Delete an entity. Deleting a missing entity succeeds.
    pub async fn delete_entity(&self, partition_key: &str, row_key: &str) -> Result<()> {
        self.delete_entity_with(partition_key, row_key, &DeleteOptions::default())
            .await
    }

    /// Delete an entity, optionally conditioned on its etag or failing when it is missing.
    pub async fn delete_entity_with(
        &self,
        partition_key: &str,
        row_key: &str,
        options: &DeleteOptions,
    ) -> Result<()> {
        codec::validate_key("PartitionKey", partition_key)?;
        codec::validate_key("RowKey", row_key)?;

        let if_match = options.if_match.as_deref().unwrap_or("*");
        let req = self
            .client
            .request(Method::DELETE, &self.entity_path(partition_key, row_key), &[])?
            .with_header(IF_MATCH, HeaderValue::from_str(if_match)?);

        match self.client.send(req).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() && !options.strict => {
                debug!("entity ({partition_key}, {row_key}) already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Read one entity by its keys, `None` if it does not exist.
    pub async fn get_entity<T: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>> {
        codec::validate_key("PartitionKey", partition_key)?;
        codec::validate_key("RowKey", row_key)?;

        let req = self.client.request(
            Method::GET,
            &self.entity_path(partition_key, row_key),
            &[],
        )?;
        let resp = match self.client.send(req).await {
            Ok(resp) => resp,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        let record: WireRecord = serde_json::from_slice(resp.body())
            .map_err(|e| Error::decode("entity is not a json object").with_source(e))?;
        let mut entity = codec::decode(record, &T::schema())?;
        if entity.etag.is_none() {
            entity.etag = etag_of(&resp).ok();
        }
        T::from_entity(entity).map(Some)
    }

    /// Retrieve entities by key.
    ///
    /// With a row key this is a point lookup yielding zero or one entity.
    /// Without, every entity of the partition is returned in row key order.
    pub fn retrieve_entities_by_key<T>(
        &self,
        partition_key: &str,
        row_key: Option<&str>,
    ) -> ResultStream<T>
    where
        T: TableEntity + Send + 'static,
    {
        let Some(row_key) = row_key else {
            return self.query(Query::new().filter(Filter::partition_key(partition_key)));
        };

        let this = self.clone();
        let (pk, rk) = (partition_key.to_string(), row_key.to_string());
        stream::once(async move { this.get_entity::<T>(&pk, &rk).await })
            .map_ok(|found| stream::iter(found.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Run a query, fetching continuation pages as the stream is polled.
    pub fn query<T>(&self, query: Query) -> ResultStream<T>
    where
        T: TableEntity + Send + 'static,
    {
        let this = self.clone();
        paginate(move |continuation| {
            let this = this.clone();
            let query = query.clone();
            async move { this.query_page::<T>(&query, continuation.as_ref()).await }
        })
    }

    /// Fetch one page of a query, starting at `continuation`.
    pub async fn query_page<T: TableEntity>(
        &self,
        query: &Query,
        continuation: Option<&Continuation>,
    ) -> Result<Page<T>> {
        let mut pairs = query.query_pairs()?;
        if let Some(continuation) = continuation {
            pairs.extend_from_slice(continuation.query_pairs());
        }

        let req = self
            .client
            .request(Method::GET, &format!("/{}()", self.table.name()), &pairs)?;
        let resp = self.client.send(req).await?;

        let continuation = Continuation::from_headers(
            resp.headers(),
            &[
                (X_MS_CONTINUATION_NEXT_PARTITION_KEY, NEXT_PARTITION_KEY),
                (X_MS_CONTINUATION_NEXT_ROW_KEY, NEXT_ROW_KEY),
            ],
        );
        let body: QueryBody = serde_json::from_slice(resp.body())
            .map_err(|e| Error::decode("query result is not valid json").with_source(e))?;

        let schema = T::schema();
        let items = body
            .value
            .into_iter()
            .map(|record| codec::decode(record, &schema).and_then(T::from_entity))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "query on {} returned {} entities, more: {}",
            self.table,
            items.len(),
            continuation.is_some()
        );

        Ok(Page {
            items,
            continuation,
        })
    }

    /// Delete every entity of the table, one request each, returning how many were deleted.
    pub async fn clear(&self) -> Result<u64> {
        let mut entities =
            self.query::<Entity>(Query::new().select(["PartitionKey", "RowKey"]));

        let mut deleted = 0;
        while let Some(entity) = entities.try_next().await? {
            self.delete_entity(&entity.partition_key, &entity.row_key)
                .await?;
            deleted += 1;
        }

        debug!("cleared {deleted} entities from {}", self.table);
        Ok(deleted)
    }

    fn entity_path(&self, partition_key: &str, row_key: &str) -> String {
        format!(
            "/{}(PartitionKey='{}',RowKey='{}')",
            self.table.name(),
            encode_key(partition_key),
            encode_key(row_key)
        )
    }
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(&key.replace('\'', "''"), &KEY_ENCODE_SET).to_string()
}

fn encode_body<T: TableEntity>(entity: &T) -> Result<(Entity, Bytes)> {
    let entity = entity.to_entity()?;
    let record = codec::encode(&entity)?;
    let body = serde_json::to_vec(&record)
        .map_err(|e| Error::unexpected("failed to serialize entity").with_source(e))?;
    Ok((entity, body.into()))
}

fn etag_of(resp: &Response<Bytes>) -> Result<String> {
    let etag = resp
        .headers()
        .get(ETAG)
        .ok_or_else(|| Error::unexpected("response has no etag"))?;
    Ok(etag.to_str()?.to_string())
}
