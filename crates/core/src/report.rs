use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::data_access::{DataAccessError, DataBackend};
use crate::grid::Grid;

const DEFAULT_EXPORT_EXTENSION: &str = "pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDefinition {
    pub title: &'static str,
    pub query: &'static str,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report `{title}` has no rows to export")]
    EmptyReport { title: String },
    #[error(transparent)]
    Data(#[from] DataAccessError),
}

impl ReportError {
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::EmptyReport { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportDocument {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = Vec::with_capacity(self.rows.len() + 6);
        html.push(format!("<h2>{}</h2>", escape_html(&self.title)));
        html.push("<table border='1' cellspacing='0' cellpadding='4'>".to_string());
        html.push(table_row("th", &self.headers));
        for row in &self.rows {
            html.push(table_row("td", row));
        }
        html.push("</table>".to_string());
        html.join("\n")
    }
}

fn table_row(tag: &str, cells: &[String]) -> String {
    let cells = cells
        .iter()
        .map(|cell| format!("<{tag}>{}</{tag}>", escape_html(cell)))
        .collect::<String>();
    format!("<tr>{cells}</tr>")
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[derive(Debug, Clone)]
pub struct ReportTab {
    definition: ReportDefinition,
    grid: Grid,
}

impl ReportTab {
    #[must_use]
    pub fn new(definition: ReportDefinition) -> Self {
        Self {
            definition,
            grid: Grid::empty(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        self.definition.title
    }

    #[must_use]
    pub fn definition(&self) -> ReportDefinition {
        self.definition
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    // On failure the previous grid is kept.
    pub async fn load<B: DataBackend + ?Sized>(&mut self, backend: &B) -> Result<(), ReportError> {
        let result = backend.query(self.definition.query, &[]).await?;
        self.grid = Grid::from_result(result);
        debug!(
            report = self.definition.title,
            rows = self.grid.row_count(),
            "report loaded"
        );
        Ok(())
    }

    pub fn document(&self) -> Result<ReportDocument, ReportError> {
        if self.grid.is_empty() {
            return Err(ReportError::EmptyReport {
                title: self.definition.title.to_string(),
            });
        }

        Ok(ReportDocument {
            title: self.definition.title.to_string(),
            headers: self.grid.headers().to_vec(),
            rows: self.grid.text_rows(),
        })
    }

    #[must_use]
    pub fn default_export_path(&self, export_dir: &Path) -> PathBuf {
        let file_name = self
            .definition
            .title
            .chars()
            .map(|ch| if matches!(ch, '/' | '\\' | ':') { '_' } else { ch })
            .collect::<String>();
        export_dir.join(format!("{file_name}.{DEFAULT_EXPORT_EXTENSION}"))
    }
}

#[derive(Debug, Clone)]
pub struct ReportDashboard {
    tabs: Vec<ReportTab>,
    active: usize,
}

impl ReportDashboard {
    #[must_use]
    pub fn new(definitions: &[ReportDefinition]) -> Self {
        Self {
            tabs: definitions.iter().copied().map(ReportTab::new).collect(),
            active: 0,
        }
    }

    #[must_use]
    pub fn tabs(&self) -> &[ReportTab] {
        &self.tabs
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&ReportTab> {
        self.tabs.get(self.active)
    }

    pub fn select(&mut self, index: usize) {
        if index < self.tabs.len() {
            self.active = index;
        }
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + 1) % self.tabs.len();
        }
    }

    pub fn previous_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    pub async fn refresh_active<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<(), ReportError> {
        match self.tabs.get_mut(self.active) {
            Some(tab) => tab.load(backend).await,
            None => Ok(()),
        }
    }

    pub async fn refresh_all<B: DataBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Vec<(&'static str, ReportError)> {
        let mut failures = Vec::new();
        for tab in &mut self.tabs {
            if let Err(err) = tab.load(backend).await {
                warn!(report = tab.title(), error = %err, "report refresh failed");
                failures.push((tab.title(), err));
            }
        }
        failures
    }
}
