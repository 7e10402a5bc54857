use thiserror::Error;

use crate::data_access::{DataAccessError, DataBackend, Record, SqlValue};
use crate::sql::TableDef;

const PRIMARY_KEY_MARKER: &str = "PRI";
const AUTO_INCREMENT_MARKER: &str = "auto_increment";

const DESCRIBE_COLUMNS_SQL: &str = "SELECT COLUMN_NAME AS column_name, \
     COLUMN_TYPE AS column_type, IS_NULLABLE AS is_nullable, \
     COLUMN_KEY AS column_key, EXTRA AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub is_primary_key: bool,
    pub is_auto_generated: bool,
    pub nullable: bool,
    pub declared_type: String,
}

impl ColumnInfo {
    #[must_use]
    pub fn from_catalog(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        is_nullable: &str,
        key: &str,
        extra: &str,
    ) -> Self {
        Self {
            name: name.into(),
            is_primary_key: key == PRIMARY_KEY_MARKER,
            is_auto_generated: extra.contains(AUTO_INCREMENT_MARKER),
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            declared_type: declared_type.into(),
        }
    }

    fn from_record(record: &Record) -> Self {
        Self::from_catalog(
            text_field(record, "column_name"),
            text_field(record, "column_type"),
            &text_field(record, "is_nullable"),
            &text_field(record, "column_key"),
            &text_field(record, "extra"),
        )
    }
}

fn text_field(record: &Record, name: &str) -> String {
    record
        .get(name)
        .map(ToString::to_string)
        .unwrap_or_default()
}

// Composite keys are not supported; the first key column wins.
#[must_use]
pub fn primary_key(columns: &[ColumnInfo]) -> Option<&ColumnInfo> {
    columns.iter().find(|column| column.is_primary_key)
}

#[must_use]
pub fn editable_columns(columns: &[ColumnInfo]) -> Vec<&ColumnInfo> {
    columns
        .iter()
        .filter(|column| !column.is_auto_generated)
        .collect()
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("catalog lookup failed: {0}")]
    Backend(#[source] DataAccessError),
}

#[derive(Debug)]
pub struct SchemaIntrospector<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: DataBackend + ?Sized> SchemaIntrospector<'a, B> {
    #[must_use]
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
        let result = self
            .backend
            .query(DESCRIBE_COLUMNS_SQL, &[SqlValue::text(table)])
            .await
            .map_err(SchemaError::Backend)?;

        Ok(result.records.iter().map(ColumnInfo::from_record).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaIssue {
    #[error("table `{table}` is missing from the database")]
    MissingTable { table: String },
    #[error("column `{table}`.`{column}` is missing from the database")]
    MissingColumn { table: String, column: String },
    #[error("table `{table}` is keyed on {found:?}, expected `{expected}`")]
    PrimaryKeyMismatch {
        table: String,
        expected: String,
        found: Option<String>,
    },
    #[error("table `{table}` has a composite primary key {columns:?}; using the first column")]
    CompositePrimaryKey { table: String, columns: Vec<String> },
    #[error("column `{table}`.`{column}` has no form field")]
    UncoveredColumn { table: String, column: String },
}

#[must_use]
pub fn verify_table(
    def: &TableDef,
    primary_key_name: &str,
    form_fields: &[&str],
    catalog: &[ColumnInfo],
) -> Vec<SchemaIssue> {
    let table = def.name.to_string();
    if catalog.is_empty() {
        return vec![SchemaIssue::MissingTable { table }];
    }

    let mut issues = Vec::new();
    for column in def.columns {
        if !catalog.iter().any(|info| info.name == *column) {
            issues.push(SchemaIssue::MissingColumn {
                table: table.clone(),
                column: (*column).to_string(),
            });
        }
    }

    let key_columns = catalog
        .iter()
        .filter(|column| column.is_primary_key)
        .map(|column| column.name.clone())
        .collect::<Vec<_>>();
    if key_columns.len() > 1 {
        issues.push(SchemaIssue::CompositePrimaryKey {
            table: table.clone(),
            columns: key_columns,
        });
    }

    let found = primary_key(catalog).map(|column| column.name.clone());
    if found.as_deref() != Some(primary_key_name) {
        issues.push(SchemaIssue::PrimaryKeyMismatch {
            table: table.clone(),
            expected: primary_key_name.to_string(),
            found,
        });
    }

    for column in editable_columns(catalog) {
        if column.name != primary_key_name && !form_fields.contains(&column.name.as_str()) {
            issues.push(SchemaIssue::UncoveredColumn {
                table: table.clone(),
                column: column.name.clone(),
            });
        }
    }

    issues
}
