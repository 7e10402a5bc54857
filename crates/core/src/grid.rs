use crate::data_access::{ResultSet, SqlValue};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    headers: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl Grid {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { headers, rows }
    }

    #[must_use]
    pub fn from_result(result: ResultSet) -> Self {
        if result.records.is_empty() {
            return Self::empty();
        }

        let rows = result
            .records
            .iter()
            .map(|record| {
                result
                    .columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(SqlValue::Null))
                    .collect()
            })
            .collect();

        Self {
            headers: result.columns,
            rows,
        }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[SqlValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn cell_text(&self, row: usize, column: usize) -> String {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    // CRUD views put the primary key first.
    #[must_use]
    pub fn key_of(&self, row: usize) -> Option<&SqlValue> {
        self.rows.get(row).and_then(|values| values.first())
    }

    #[must_use]
    pub fn contains_key(&self, key: &SqlValue) -> bool {
        self.rows
            .iter()
            .any(|values| values.first().is_some_and(|first| same_key(first, key)))
    }

    #[must_use]
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|values| values.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[must_use]
    pub fn visible_rows(&self, start: usize, limit: usize) -> Vec<&[SqlValue]> {
        if limit == 0 || start >= self.rows.len() {
            return Vec::new();
        }

        let end = (start + limit).min(self.rows.len());
        self.rows[start..end].iter().map(Vec::as_slice).collect()
    }
}

// Integer keys read back as text still match their integer form.
#[must_use]
pub fn same_key(left: &SqlValue, right: &SqlValue) -> bool {
    match (left.as_i64(), right.as_i64()) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::{same_key, Grid};
    use crate::data_access::{Record, ResultSet, SqlValue};

    fn sample_result() -> ResultSet {
        ResultSet::new(
            vec!["user_id".to_string(), "nama".to_string()],
            vec![
                Record::new().with("user_id", 2_i64).with("nama", "Budi"),
                Record::new().with("user_id", 1_i64).with("nama", "Andi"),
            ],
        )
    }

    #[test]
    fn follows_result_column_order() {
        let grid = Grid::from_result(sample_result());

        assert_eq!(grid.headers(), ["user_id", "nama"]);
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.cell_text(0, 1), "Budi");
        assert_eq!(grid.key_of(1), Some(&SqlValue::Int(1)));
    }

    #[test]
    fn empty_result_has_no_columns() {
        let grid = Grid::from_result(ResultSet::new(vec!["user_id".to_string()], Vec::new()));

        assert_eq!(grid.row_count(), 0);
        assert_eq!(grid.column_count(), 0);
    }

    #[test]
    fn visible_rows_returns_requested_window() {
        let grid = Grid::new(
            vec!["id".to_string()],
            (1..=4).map(|id| vec![SqlValue::Int(id)]).collect(),
        );

        let rows = grid.visible_rows(1, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], [SqlValue::Int(2)]);
        assert!(grid.visible_rows(9, 2).is_empty());
    }

    #[test]
    fn keys_match_across_text_and_integer_forms() {
        let grid = Grid::from_result(sample_result());

        assert!(grid.contains_key(&SqlValue::text("2")));
        assert!(!grid.contains_key(&SqlValue::Int(3)));
        assert!(same_key(&SqlValue::UInt(5), &SqlValue::Int(5)));
    }
}
