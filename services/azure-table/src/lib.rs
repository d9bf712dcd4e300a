//! Azure Table Storage client
//!
//! This crate provides typed access to the Azure Table service:
//! - Entity codec between [`Entity`] and the service's JSON records
//! - Shared Key and SAS token authentication
//! - Table management through [`TableClient`]
//! - Entity reads, writes and queries through [`TableServiceContext`]
//!
//! Every request is signed and retried by the [`tablestore_core::Transport`].
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use tablestore_azure_table::{Config, Entity, TableClient};
//! use tablestore_core::{Context, OsEnv, Result};
//! use tablestore_http_send_reqwest::ReqwestHttpSend;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!
//!     let config = Config::default().from_env(&ctx)?;
//!     let client = TableClient::new(ctx, config)?;
//!
//!     let table = client.create_table_if_not_exists("devices").await?;
//!     let devices = client.get_service_context(&table);
//!
//!     devices
//!         .insert_entity(&Entity::new("site-1", "thermo-1").with("Reading", 21.5))
//!         .await?;
//!
//!     let found: Vec<Entity> = devices
//!         .retrieve_entities_by_key("site-1", None)
//!         .try_collect()
//!         .await?;
//!     println!("{found:?}");
//!
//!     Ok(())
//! }
//! ```

mod constants;

mod config;
pub use config::Config;

mod connection_string;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;
pub use sign_request::{RequestSigner, SharedKeyFlavor};

mod value;
pub use uuid::Uuid;
pub use value::{EdmType, Value};

mod schema;
pub use schema::{Field, Schema};

mod entity;
pub use entity::{Entity, TableEntity};

pub mod codec;

mod error;
pub use error::TableErrorClassifier;

mod query;
pub use query::{Filter, Query, MAX_PAGE_SIZE};

mod pager;
pub use pager::{Continuation, Page, ResultStream};

mod client;
pub use client::{Table, TableClient, TableClientBuilder};

mod service_context;
pub use service_context::{DeleteOptions, TableServiceContext, UpdateOptions};
