use std::collections::BTreeMap;

use tablestore_core::time::DateTime;
use tablestore_core::{Error, Result};

use uuid::Uuid;

use crate::{EdmType, Schema, Value};

/// A record stored in a table.
///
/// `partition_key` and `row_key` identify the entity within its table.
/// `timestamp` and `etag` are assigned by the service; the etag is what
/// conditional updates and deletes are checked against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    /// Partition key.
    pub partition_key: String,
    /// Row key, unique within the partition.
    pub row_key: String,
    /// Last modification time, set by the service.
    pub timestamp: Option<DateTime>,
    /// Version of the entity, set by the service.
    pub etag: Option<String>,
    properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an entity without properties.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Default::default()
        }
    }

    /// Set a property, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set the etag, builder style.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Set a property, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Remove a property.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Get a property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Iterate over properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties, keys and system fields excluded.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the entity has no property.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn property(&self, name: &str) -> Result<&Value> {
        self.properties
            .get(name)
            .ok_or_else(|| Error::decode(format!("property {name} is missing")))
    }

    /// Read a string property.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.property(name)? {
            Value::String(v) => Ok(v),
            v => Err(mismatch(name, EdmType::String, v)),
        }
    }

    /// Read a 32-bit integer property.
    pub fn get_i32(&self, name: &str) -> Result<i32> {
        match self.property(name)? {
            Value::Int32(v) => Ok(*v),
            v => Err(mismatch(name, EdmType::Int32, v)),
        }
    }

    /// Read a 64-bit integer property; 32-bit values are widened.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.property(name)? {
            Value::Int64(v) => Ok(*v),
            Value::Int32(v) => Ok(i64::from(*v)),
            v => Err(mismatch(name, EdmType::Int64, v)),
        }
    }

    /// Read a double property.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        match self.property(name)? {
            Value::Double(v) => Ok(*v),
            v => Err(mismatch(name, EdmType::Double, v)),
        }
    }

    /// Read a boolean property.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.property(name)? {
            Value::Boolean(v) => Ok(*v),
            v => Err(mismatch(name, EdmType::Boolean, v)),
        }
    }

    /// Read a timestamp property.
    pub fn get_datetime(&self, name: &str) -> Result<DateTime> {
        match self.property(name)? {
            Value::DateTime(v) => Ok(*v),
            v => Err(mismatch(name, EdmType::DateTime, v)),
        }
    }

    /// Read a binary property.
    pub fn get_binary(&self, name: &str) -> Result<&[u8]> {
        match self.property(name)? {
            Value::Binary(v) => Ok(v),
            v => Err(mismatch(name, EdmType::Binary, v)),
        }
    }

    /// Read a guid property.
    pub fn get_guid(&self, name: &str) -> Result<&Uuid> {
        match self.property(name)? {
            Value::Guid(v) => Ok(v),
            v => Err(mismatch(name, EdmType::Guid, v)),
        }
    }
}

fn mismatch(name: &str, expected: EdmType, actual: &Value) -> Error {
    Error::decode(format!(
        "property {name} is {}, not {expected}",
        actual.edm_type()
    ))
}

/// TableEntity maps a typed record to and from an [`Entity`].
///
/// ```
/// use tablestore_azure_table::{EdmType, Entity, Schema, TableEntity};
/// use tablestore_core::Result;
///
/// struct Device {
///     site: String,
///     id: String,
///     temperature: f64,
/// }
///
/// impl TableEntity for Device {
///     fn schema() -> Schema {
///         Schema::dynamic().field("Temperature", EdmType::Double)
///     }
///
///     fn to_entity(&self) -> Result<Entity> {
///         Ok(Entity::new(&self.site, &self.id).with("Temperature", self.temperature))
///     }
///
///     fn from_entity(entity: Entity) -> Result<Self> {
///         Ok(Self {
///             temperature: entity.get_f64("Temperature")?,
///             site: entity.partition_key,
///             id: entity.row_key,
///         })
///     }
/// }
/// ```
pub trait TableEntity: Sized {
    /// Schema used to decode records into this type.
    fn schema() -> Schema {
        Schema::dynamic()
    }

    /// Build the entity to write.
    fn to_entity(&self) -> Result<Entity>;

    /// Build the value from a decoded entity.
    fn from_entity(entity: Entity) -> Result<Self>;
}

impl TableEntity for Entity {
    fn to_entity(&self) -> Result<Entity> {
        Ok(self.clone())
    }

    fn from_entity(entity: Entity) -> Result<Self> {
        Ok(entity)
    }
}
