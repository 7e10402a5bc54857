use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
}

impl SqlValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            Self::Text(value) => value.trim().parse::<i64>().ok(),
            Self::Null | Self::Double(_) => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::UInt(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok(),
            Self::Null => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    entries: Vec<(String, SqlValue)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: SqlValue) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.entries.into_iter().map(|(_, value)| value).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataAccessError {
    #[error("cannot reach database: {0}")]
    Connectivity(String),
    #[error("statement failed: {0}")]
    Statement(String),
}

// One call, one pooled connection, one statement. The connection is
// released before returning on every path.
#[async_trait]
pub trait DataBackend {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DataAccessError>;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DataAccessError>;

    async fn ping(&self) -> Result<(), DataAccessError>;
}

#[cfg(test)]
mod tests {
    use super::{Record, SqlValue};

    #[test]
    fn record_preserves_order_and_replaces_in_place() {
        let mut record = Record::new()
            .with("nama", "Andi")
            .with("email", "a@x.com")
            .with("no_hp", "0811");
        record.insert("email", SqlValue::text("b@x.com"));

        assert_eq!(record.columns().collect::<Vec<_>>(), ["nama", "email", "no_hp"]);
        assert_eq!(record.get("email"), Some(&SqlValue::text("b@x.com")));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn values_display_as_grid_text() {
        assert_eq!(SqlValue::Null.to_string(), "");
        assert_eq!(SqlValue::Int(-3).to_string(), "-3");
        assert_eq!(SqlValue::text("cash").to_string(), "cash");
        assert_eq!(SqlValue::Double(12.5).to_string(), "12.5");
    }

    #[test]
    fn numeric_views_parse_driver_text() {
        assert_eq!(SqlValue::text(" 42 ").as_i64(), Some(42));
        assert_eq!(SqlValue::UInt(7).as_i64(), Some(7));
        assert_eq!(SqlValue::text("15000.50").as_f64(), Some(15000.5));
        assert_eq!(SqlValue::Null.as_f64(), None);
    }
}
