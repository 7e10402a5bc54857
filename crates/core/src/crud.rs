use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data_access::{DataAccessError, DataBackend, SqlValue};
use crate::form::{FieldDescriptor, ForeignKeyOptions, FormError, RecordForm};
use crate::grid::Grid;
use crate::sql::{
    delete_sql, insert_sql, select_by_key_sql, update_sql, ColumnIdent, KnownSchema,
    SqlGenerationError, TableIdent,
};

// The view query must select the primary key as its first column.
#[derive(Debug, Clone, Copy)]
pub struct CrudPageConfig {
    pub title: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub view_query: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl CrudPageConfig {
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogIntent {
    Add,
    Edit { key: SqlValue },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PageMode {
    #[default]
    Idle,
    Dialog {
        intent: DialogIntent,
        form: RecordForm,
    },
    ConfirmDelete {
        key: SqlValue,
    },
}

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("select a row first")]
    NoSelection,
    #[error("no dialog is open")]
    NoDialog,
    #[error("row {key} no longer exists")]
    RowNotFound { key: String },
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Data(#[from] DataAccessError),
    #[error(transparent)]
    Sql(#[from] SqlGenerationError),
    #[error("the row was {action}, but the list could not be refreshed: {source}")]
    StaleAfterWrite {
        action: &'static str,
        #[source]
        source: Box<CrudError>,
    },
}

impl CrudError {
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::NoSelection)
    }
}

#[derive(Debug, Clone)]
pub struct CrudPage {
    config: CrudPageConfig,
    schema: KnownSchema,
    grid: Grid,
    selected: Option<usize>,
    options: ForeignKeyOptions,
    mode: PageMode,
}

impl CrudPage {
    #[must_use]
    pub fn new(config: CrudPageConfig, schema: KnownSchema) -> Self {
        Self {
            config,
            schema,
            grid: Grid::empty(),
            selected: None,
            options: ForeignKeyOptions::default(),
            mode: PageMode::Idle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrudPageConfig {
        &self.config
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        self.config.title
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn mode(&self) -> &PageMode {
        &self.mode
    }

    pub fn form_mut(&mut self) -> Option<&mut RecordForm> {
        match &mut self.mode {
            PageMode::Dialog { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|index| *index < self.grid.row_count());
    }

    pub fn select_next(&mut self) {
        let rows = self.grid.row_count();
        if rows == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) => (index + 1).min(rows - 1),
            None => 0,
        });
    }

    pub fn select_previous(&mut self) {
        if self.grid.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |index| index.saturating_sub(1)));
    }

    #[must_use]
    pub fn selected_key(&self) -> Option<&SqlValue> {
        self.selected.and_then(|index| self.grid.key_of(index))
    }

    fn target(&self) -> Result<(TableIdent, ColumnIdent), SqlGenerationError> {
        let table = self.schema.table(self.config.table)?;
        let key = table.column(self.config.primary_key)?;
        Ok((table, key))
    }

    async fn refresh_options<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<(), CrudError> {
        self.options = ForeignKeyOptions::load(self.config.fields, backend).await?;
        Ok(())
    }

    pub async fn reload<B: DataBackend + ?Sized>(&mut self, backend: &B) -> Result<(), CrudError> {
        self.refresh_options(backend).await?;
        let result = backend.query(self.config.view_query, &[]).await?;
        self.grid = Grid::from_result(result);
        self.select(self.selected.map(|index| {
            index.min(self.grid.row_count().saturating_sub(1))
        }));
        debug!(page = self.config.title, rows = self.grid.row_count(), "page reloaded");
        Ok(())
    }

    pub async fn begin_add<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<(), CrudError> {
        self.refresh_options(backend).await?;
        let form = RecordForm::open(
            format!("Add {}", self.config.title),
            self.config.fields,
            &self.options,
            None,
        );
        self.mode = PageMode::Dialog {
            intent: DialogIntent::Add,
            form,
        };
        Ok(())
    }

    pub async fn begin_edit<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<(), CrudError> {
        let key = self.selected_key().cloned().ok_or(CrudError::NoSelection)?;
        self.refresh_options(backend).await?;

        let (table, key_column) = self.target()?;
        let columns = table.columns(self.config.field_names())?;
        let sql = select_by_key_sql(&table, &columns, &key_column)?;
        let result = backend.query(&sql, std::slice::from_ref(&key)).await?;
        let record = result
            .records
            .into_iter()
            .next()
            .ok_or_else(|| CrudError::RowNotFound {
                key: key.to_string(),
            })?;

        let form = RecordForm::open(
            format!("Edit {} #{key}", self.config.title),
            self.config.fields,
            &self.options,
            Some(&record),
        );
        self.mode = PageMode::Dialog {
            intent: DialogIntent::Edit { key },
            form,
        };
        Ok(())
    }

    pub fn begin_delete(&mut self) -> Result<(), CrudError> {
        let key = self.selected_key().cloned().ok_or(CrudError::NoSelection)?;
        self.mode = PageMode::ConfirmDelete { key };
        Ok(())
    }

    // A failed statement leaves the dialog open with its input intact.
    pub async fn submit_dialog<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<u64, CrudError> {
        let (intent, record) = match &self.mode {
            PageMode::Dialog { intent, form } => (intent.clone(), form.submit()?),
            _ => return Err(CrudError::NoDialog),
        };

        let (table, key_column) = self.target()?;
        let columns = table.columns(record.columns())?;
        let mut params = record.into_values();
        let affected = match &intent {
            DialogIntent::Add => {
                let sql = insert_sql(&table, &columns)?;
                backend.execute(&sql, &params).await?
            }
            DialogIntent::Edit { key } => {
                let sql = update_sql(&table, &columns, &key_column)?;
                params.push(key.clone());
                backend.execute(&sql, &params).await?
            }
        };
        info!(
            table = table.name(),
            edit = matches!(intent, DialogIntent::Edit { .. }),
            affected,
            "record saved"
        );

        self.mode = PageMode::Idle;
        let action = match intent {
            DialogIntent::Add => "saved",
            DialogIntent::Edit { .. } => "updated",
        };
        self.reload_after_write(backend, action).await?;
        Ok(affected)
    }

    async fn reload_after_write<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
        action: &'static str,
    ) -> Result<(), CrudError> {
        let page = self.config.title;
        self.reload(backend).await.map_err(|source| {
            warn!(page, action, error = %source, "reload after write failed");
            CrudError::StaleAfterWrite {
                action,
                source: Box::new(source),
            }
        })
    }

    pub fn cancel_dialog(&mut self) {
        self.mode = PageMode::Idle;
    }

    pub async fn answer_delete<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
        confirmed: bool,
    ) -> Result<Option<u64>, CrudError> {
        let key = match std::mem::take(&mut self.mode) {
            PageMode::ConfirmDelete { key } => key,
            other => {
                self.mode = other;
                return Err(CrudError::NoDialog);
            }
        };
        if !confirmed {
            return Ok(None);
        }

        let (table, key_column) = self.target()?;
        let sql = delete_sql(&table, &key_column);
        let affected = backend.execute(&sql, std::slice::from_ref(&key)).await?;
        info!(table = table.name(), key = %key, affected, "record deleted");

        self.reload_after_write(backend, "deleted").await?;
        Ok(Some(affected))
    }
}
