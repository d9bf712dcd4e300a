use std::fmt::{self, Display};
use std::ops::Not;

use tablestore_core::{Error, Result};

use crate::codec::format_datetime;
use crate::value::Value;

/// An OData filter expression.
///
/// Literals are quoted and escaped according to their type, so values coming
/// from users can be used safely.
///
/// ```
/// use tablestore_azure_table::Filter;
///
/// let f = Filter::partition_key("site-1").and(Filter::ge("Reading", 20.5));
/// assert_eq!(f.to_string(), "(PartitionKey eq 'site-1') and (Reading ge 20.5)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter(String);

impl Filter {
    fn compare(name: &str, op: &str, value: impl Into<Value>) -> Self {
        Filter(format!("{name} {op} {}", literal(&value.into())))
    }

    /// `name eq value`
    pub fn eq(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "eq", value)
    }

    /// `name ne value`
    pub fn ne(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "ne", value)
    }

    /// `name gt value`
    pub fn gt(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "gt", value)
    }

    /// `name ge value`
    pub fn ge(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "ge", value)
    }

    /// `name lt value`
    pub fn lt(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "lt", value)
    }

    /// `name le value`
    pub fn le(name: &str, value: impl Into<Value>) -> Self {
        Self::compare(name, "le", value)
    }

    /// `PartitionKey eq pk`
    pub fn partition_key(pk: &str) -> Self {
        Self::eq("PartitionKey", pk)
    }

    /// `RowKey eq rk`
    pub fn row_key(rk: &str) -> Self {
        Self::eq("RowKey", rk)
    }

    /// Both filters hold.
    pub fn and(self, other: Filter) -> Self {
        Filter(format!("({}) and ({})", self.0, other.0))
    }

    /// Either filter holds.
    pub fn or(self, other: Filter) -> Self {
        Filter(format!("({}) or ({})", self.0, other.0))
    }

    /// Use an expression as is. Nothing is escaped.
    pub fn raw(expr: impl Into<String>) -> Self {
        Filter(expr.into())
    }

    /// The expression sent as `$filter`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Self::Output {
        Filter(format!("not ({})", self.0))
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(v) => format!("'{}'", v.replace('\'', "''")),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => format!("{v}L"),
        Value::Double(v) if v.is_nan() => "NaN".to_string(),
        Value::Double(v) if v.is_infinite() => {
            if *v > 0.0 { "INF" } else { "-INF" }.to_string()
        }
        Value::Double(v) => format!("{v:?}"),
        Value::Boolean(v) => v.to_string(),
        Value::DateTime(v) => format!("datetime'{}'", format_datetime(*v)),
        Value::Binary(v) => format!("X'{}'", hex::encode(v)),
        Value::Guid(v) => format!("guid'{}'", v.hyphenated()),
    }
}

/// Maximum page size the service accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A server side filtered scan of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filter: Option<Filter>,
    select: Vec<String>,
    top: Option<u32>,
}

impl Query {
    /// A query returning every entity of the table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only return entities matching `filter`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Only return these properties. Keys and system properties are always returned.
    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = names.into_iter().map(Into::into).collect();
        self
    }

    /// Ask for at most `n` entities per page, `1..=1000`.
    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    /// The filter, if any.
    pub fn filter_expr(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub(crate) fn query_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(filter) = &self.filter {
            pairs.push(("$filter".to_string(), filter.0.clone()));
        }
        if !self.select.is_empty() {
            pairs.push(("$select".to_string(), self.select.join(",")));
        }
        if let Some(top) = self.top {
            if top == 0 || top > MAX_PAGE_SIZE {
                return Err(Error::request_invalid(format!(
                    "page size must be within 1..={MAX_PAGE_SIZE}, got {top}"
                )));
            }
            pairs.push(("$top".to_string(), top.to_string()));
        }
        Ok(pairs)
    }
}
