//! Entity codec: maps [`Entity`] to and from the JSON records the table
//! service reads and writes.
//!
//! Every non-string property is written with an explicit
//! `Name@odata.type` annotation. When reading, the annotation wins, then the
//! type declared by the [`Schema`], then the JSON type of the value.

use std::collections::HashMap;

use chrono::{SecondsFormat, Timelike};
use serde_json::{Map, Number, Value as Json};
use tablestore_core::hash::{base64_decode, base64_encode};
use tablestore_core::time::{parse_rfc3339, DateTime};
use tablestore_core::{Error, Result};

use uuid::Uuid;

use crate::{EdmType, Entity, Schema, Value};

/// A JSON object as sent to or received from the service.
pub type WireRecord = Map<String, Json>;

const PARTITION_KEY: &str = "PartitionKey";
const ROW_KEY: &str = "RowKey";
const TIMESTAMP: &str = "Timestamp";
const ODATA_ETAG: &str = "odata.etag";
const ODATA_TYPE_SUFFIX: &str = "@odata.type";

const MAX_KEY_BYTES: usize = 1024;
const MAX_STRING_CHARS: usize = 32 * 1024;
const MAX_BINARY_BYTES: usize = 64 * 1024;
const MAX_PROPERTY_NAME_CHARS: usize = 255;
/// 255 properties per entity, minus the three system properties.
const MAX_CUSTOM_PROPERTIES: usize = 252;

/// Encode an entity into its wire record.
///
/// The timestamp is written when present; the etag never is, it travels in
/// the `If-Match` header.
pub fn encode(entity: &Entity) -> Result<WireRecord> {
    validate_key(PARTITION_KEY, &entity.partition_key)?;
    validate_key(ROW_KEY, &entity.row_key)?;
    if entity.len() > MAX_CUSTOM_PROPERTIES {
        return Err(Error::schema(format!(
            "entity has {} properties, at most {MAX_CUSTOM_PROPERTIES} are allowed",
            entity.len()
        )));
    }

    let mut record = WireRecord::new();
    record.insert(PARTITION_KEY.to_string(), Json::String(entity.partition_key.clone()));
    record.insert(ROW_KEY.to_string(), Json::String(entity.row_key.clone()));
    if let Some(ts) = entity.timestamp {
        insert_tagged(&mut record, TIMESTAMP, EdmType::DateTime, Json::String(format_datetime(ts)));
    }

    for (name, value) in entity.properties() {
        validate_property_name(name)?;

        let json = match value {
            Value::String(v) => {
                if v.chars().count() > MAX_STRING_CHARS {
                    return Err(Error::schema(format!(
                        "property {name} exceeds {MAX_STRING_CHARS} characters"
                    )));
                }
                record.insert(name.to_string(), Json::String(v.clone()));
                continue;
            }
            Value::Int32(v) => Json::from(*v),
            // Int64 goes as a string, JSON numbers lose precision past 2^53.
            Value::Int64(v) => Json::String(v.to_string()),
            Value::Double(v) => match Number::from_f64(*v) {
                Some(n) => Json::Number(n),
                None if v.is_nan() => Json::String("NaN".to_string()),
                None if *v > 0.0 => Json::String("Infinity".to_string()),
                None => Json::String("-Infinity".to_string()),
            },
            Value::Boolean(v) => Json::Bool(*v),
            Value::DateTime(v) => Json::String(format_datetime(*v)),
            Value::Binary(v) => {
                if v.len() > MAX_BINARY_BYTES {
                    return Err(Error::schema(format!(
                        "property {name} exceeds {MAX_BINARY_BYTES} bytes"
                    )));
                }
                Json::String(base64_encode(v))
            }
            Value::Guid(v) => Json::String(v.hyphenated().to_string()),
        };
        insert_tagged(&mut record, name, value.edm_type(), json);
    }

    Ok(record)
}

fn insert_tagged(record: &mut WireRecord, name: &str, ty: EdmType, json: Json) {
    record.insert(name.to_string(), json);
    record.insert(
        format!("{name}{ODATA_TYPE_SUFFIX}"),
        Json::String(ty.as_str().to_string()),
    );
}

/// Decode a wire record into an entity shaped by `schema`.
pub fn decode(mut record: WireRecord, schema: &Schema) -> Result<Entity> {
    let partition_key = take_key(&mut record, PARTITION_KEY)?;
    let row_key = take_key(&mut record, ROW_KEY)?;
    let mut entity = Entity::new(partition_key, row_key);

    entity.etag = match record.remove(ODATA_ETAG) {
        Some(Json::String(v)) => Some(v),
        Some(v) => return Err(Error::decode(format!("odata.etag must be a string, got {v}"))),
        None => None,
    };

    // Collect type annotations first, they may appear after the value.
    let tag_keys: Vec<String> = record
        .keys()
        .filter(|k| k.ends_with(ODATA_TYPE_SUFFIX))
        .cloned()
        .collect();
    let mut tag_of = HashMap::with_capacity(tag_keys.len());
    for key in tag_keys {
        let name = &key[..key.len() - ODATA_TYPE_SUFFIX.len()];
        let Some(Json::String(tag)) = record.remove(&key) else {
            return Err(Error::decode(format!("type annotation of {name} must be a string")));
        };
        tag_of.insert(name.to_string(), tag.parse::<EdmType>()?);
    }

    for (name, json) in record {
        // Other annotations and metadata, e.g. `odata.metadata`.
        if name.starts_with("odata.") || name.contains('@') || json.is_null() {
            continue;
        }

        if name == TIMESTAMP {
            entity.timestamp = Some(read_datetime(&name, &json)?);
            continue;
        }

        let tagged = tag_of.get(&name).copied();
        let declared = schema.get(&name).map(|f| f.edm_type);
        let ty = match (tagged, declared) {
            (Some(tagged), Some(declared)) if !compatible(tagged, declared) => {
                return Err(Error::decode(format!(
                    "property {name} is tagged {tagged} but declared {declared}"
                )));
            }
            (_, Some(declared)) => Some(declared),
            (Some(tagged), None) => Some(tagged),
            (None, None) => None,
        };

        let value = match ty {
            Some(ty) => read_value(&name, &json, ty)?,
            None => infer_value(&name, &json)?,
        };
        entity.insert(name, value);
    }

    for name in schema.required() {
        if entity.get(name).is_none() {
            return Err(Error::decode(format!("required property {name} is missing")));
        }
    }

    Ok(entity)
}

/// A tag may be narrower than the declared type when widening is lossless.
fn compatible(tagged: EdmType, declared: EdmType) -> bool {
    tagged == declared || (tagged == EdmType::Int32 && declared == EdmType::Int64)
}

fn take_key(record: &mut WireRecord, key: &str) -> Result<String> {
    match record.remove(key) {
        Some(Json::String(v)) => Ok(v),
        Some(v) => Err(Error::decode(format!("{key} must be a string, got {v}"))),
        None => Err(Error::decode(format!("{key} is missing"))),
    }
}

fn read_value(name: &str, json: &Json, ty: EdmType) -> Result<Value> {
    let bad = || Error::decode(format!("property {name} cannot be read as {ty}: {json}"));

    Ok(match ty {
        EdmType::String => Value::String(json.as_str().ok_or_else(bad)?.to_string()),
        EdmType::Int32 => {
            let v = json.as_i64().ok_or_else(bad)?;
            Value::Int32(i32::try_from(v).map_err(|_| bad())?)
        }
        EdmType::Int64 => match json {
            Json::String(s) => Value::Int64(s.parse().map_err(|_| bad())?),
            Json::Number(n) => Value::Int64(n.as_i64().ok_or_else(bad)?),
            _ => return Err(bad()),
        },
        EdmType::Double => match json {
            Json::Number(n) => Value::Double(n.as_f64().ok_or_else(bad)?),
            Json::String(s) => Value::Double(match s.as_str() {
                "NaN" => f64::NAN,
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                s => s.parse().map_err(|_| bad())?,
            }),
            _ => return Err(bad()),
        },
        EdmType::Boolean => Value::Boolean(json.as_bool().ok_or_else(bad)?),
        EdmType::DateTime => Value::DateTime(read_datetime(name, json)?),
        EdmType::Binary => {
            let s = json.as_str().ok_or_else(bad)?;
            Value::Binary(base64_decode(s).map_err(|_| bad())?)
        }
        EdmType::Guid => {
            let s = json.as_str().ok_or_else(bad)?;
            Value::Guid(Uuid::parse_str(s).map_err(|e| {
                Error::decode(format!("property {name} is not a valid guid")).with_source(e)
            })?)
        }
    })
}

fn infer_value(name: &str, json: &Json) -> Result<Value> {
    Ok(match json {
        Json::String(v) => Value::String(v.clone()),
        Json::Bool(v) => Value::Boolean(*v),
        Json::Number(n) => match n.as_i64() {
            Some(v) => match i32::try_from(v) {
                Ok(v) => Value::Int32(v),
                Err(_) => Value::Int64(v),
            },
            None => Value::Double(
                n.as_f64()
                    .ok_or_else(|| Error::decode(format!("property {name} is not a number")))?,
            ),
        },
        _ => {
            return Err(Error::decode(format!(
                "property {name} has unsupported value {json}"
            )))
        }
    })
}

fn read_datetime(name: &str, json: &Json) -> Result<DateTime> {
    let s = json
        .as_str()
        .ok_or_else(|| Error::decode(format!("property {name} must be a datetime string")))?;
    parse_rfc3339(s)
}

/// Format with the 7 fractional digits the service uses; its clock ticks every 100 ns.
pub(crate) fn format_datetime(t: DateTime) -> String {
    let ticks = (t.nanosecond() % 1_000_000_000) / 100;
    match t.with_nanosecond(ticks * 100) {
        Some(t) if ticks > 0 => format!("{}.{ticks:07}Z", t.format("%Y-%m-%dT%H:%M:%S")),
        _ => t.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Check that a partition or row key can be stored.
pub fn validate_key(field: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::schema(format!("{field} is missing")));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(Error::schema(format!("{field} exceeds {MAX_KEY_BYTES} bytes")));
    }
    if let Some(c) = key
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(Error::schema(format!(
            "{field} contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

/// Check that a property name is a valid identifier and not reserved.
pub fn validate_property_name(name: &str) -> Result<()> {
    if matches!(name, PARTITION_KEY | ROW_KEY | TIMESTAMP) {
        return Err(Error::schema(format!("property name {name} is reserved")));
    }

    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || name.chars().count() > MAX_PROPERTY_NAME_CHARS {
        return Err(Error::schema(format!("property name {name:?} is invalid")));
    }
    Ok(())
}
