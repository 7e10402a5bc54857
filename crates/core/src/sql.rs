use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlGenerationError {
    #[error("table `{0}` is not part of the known schema")]
    UnknownTable(String),
    #[error("column `{column}` is not part of table `{table}`")]
    UnknownColumn { table: String, column: String },
    #[error("statement needs at least one column")]
    EmptyColumnList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

// Values always travel as bound parameters; only names obtained here are
// interpolated.
#[derive(Debug, Clone, Copy)]
pub struct KnownSchema {
    tables: &'static [TableDef],
}

impl KnownSchema {
    #[must_use]
    pub const fn new(tables: &'static [TableDef]) -> Self {
        Self { tables }
    }

    #[must_use]
    pub fn tables(&self) -> &'static [TableDef] {
        self.tables
    }

    pub fn table(&self, name: &str) -> Result<TableIdent, SqlGenerationError> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .map(|def| TableIdent { def: *def })
            .ok_or_else(|| SqlGenerationError::UnknownTable(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableIdent {
    def: TableDef,
}

impl TableIdent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn column(&self, name: &str) -> Result<ColumnIdent, SqlGenerationError> {
        self.def
            .columns
            .iter()
            .copied()
            .find(|column| *column == name)
            .map(|column| ColumnIdent { name: column })
            .ok_or_else(|| SqlGenerationError::UnknownColumn {
                table: self.def.name.to_string(),
                column: name.to_string(),
            })
    }

    pub fn columns<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<ColumnIdent>, SqlGenerationError> {
        names.into_iter().map(|name| self.column(name)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIdent {
    name: &'static str,
}

impl ColumnIdent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn column_list(columns: &[ColumnIdent]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub fn insert_sql(
    table: &TableIdent,
    columns: &[ColumnIdent],
) -> Result<String, SqlGenerationError> {
    if columns.is_empty() {
        return Err(SqlGenerationError::EmptyColumnList);
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table.name()),
        column_list(columns),
        placeholders(columns.len())
    ))
}

// Parameters bind in `columns` order followed by the key value.
pub fn update_sql(
    table: &TableIdent,
    columns: &[ColumnIdent],
    key: &ColumnIdent,
) -> Result<String, SqlGenerationError> {
    if columns.is_empty() {
        return Err(SqlGenerationError::EmptyColumnList);
    }

    let assignments = columns
        .iter()
        .map(|column| format!("{} = ?", quote_identifier(column.name())))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_identifier(table.name()),
        assignments,
        quote_identifier(key.name())
    ))
}

#[must_use]
pub fn delete_sql(table: &TableIdent, key: &ColumnIdent) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_identifier(table.name()),
        quote_identifier(key.name())
    )
}

pub fn select_by_key_sql(
    table: &TableIdent,
    columns: &[ColumnIdent],
    key: &ColumnIdent,
) -> Result<String, SqlGenerationError> {
    if columns.is_empty() {
        return Err(SqlGenerationError::EmptyColumnList);
    }

    Ok(format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list(columns),
        quote_identifier(table.name()),
        quote_identifier(key.name())
    ))
}
