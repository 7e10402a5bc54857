use std::fmt;

use tracing::{info, warn};

use crate::crud::{CrudError, CrudPage};
use crate::data_access::DataBackend;
use crate::pages::{
    ADMIN_PAGE, DRIVERS_PAGE, ORDERS_PAGE, PAYMENTS_PAGE, REPORTS, SCHEMA, USERS_PAGE,
};
use crate::report::{ReportDashboard, ReportError};
use crate::schema::{verify_table, SchemaError, SchemaIntrospector, SchemaIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Users,
    Drivers,
    Admin,
    Orders,
    Payments,
    Report,
}

impl Section {
    pub const ALL: [Self; 6] = [
        Self::Users,
        Self::Drivers,
        Self::Admin,
        Self::Orders,
        Self::Payments,
        Self::Report,
    ];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Drivers => "Drivers",
            Self::Admin => "Admin",
            Self::Orders => "Orders",
            Self::Payments => "Payments",
            Self::Report => "Report",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Users => 0,
            Self::Drivers => 1,
            Self::Admin => 2,
            Self::Orders => 3,
            Self::Payments => 4,
            Self::Report => 5,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CrudError> for Notice {
    fn from(err: CrudError) -> Self {
        if err.is_informational() {
            Self::info(err.to_string())
        } else {
            Self::error(err.to_string())
        }
    }
}

impl From<ReportError> for Notice {
    fn from(err: ReportError) -> Self {
        if err.is_informational() {
            Self::info(err.to_string())
        } else {
            Self::error(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConsole {
    section: Section,
    pages: Vec<CrudPage>,
    reports: ReportDashboard,
}

impl Default for AdminConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminConsole {
    #[must_use]
    pub fn new() -> Self {
        let pages = [USERS_PAGE, DRIVERS_PAGE, ADMIN_PAGE, ORDERS_PAGE, PAYMENTS_PAGE]
            .into_iter()
            .map(|config| CrudPage::new(config, SCHEMA))
            .collect();

        Self {
            section: Section::Report,
            pages,
            reports: ReportDashboard::new(REPORTS),
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn pages(&self) -> &[CrudPage] {
        &self.pages
    }

    #[must_use]
    pub fn page(&self, section: Section) -> Option<&CrudPage> {
        self.pages.get(section.index())
    }

    pub fn page_mut(&mut self, section: Section) -> Option<&mut CrudPage> {
        self.pages.get_mut(section.index())
    }

    pub fn active_page_mut(&mut self) -> Option<&mut CrudPage> {
        self.page_mut(self.section)
    }

    #[must_use]
    pub fn reports(&self) -> &ReportDashboard {
        &self.reports
    }

    pub fn reports_mut(&mut self) -> &mut ReportDashboard {
        &mut self.reports
    }

    // Failures are collected into one notice so the console still opens.
    pub async fn start<B: DataBackend + ?Sized>(&mut self, backend: &B) -> Option<Notice> {
        let mut failures = Vec::new();
        for page in &mut self.pages {
            if let Err(err) = page.reload(backend).await {
                warn!(page = page.title(), error = %err, "page load failed");
                failures.push(format!("{}: {err}", page.title()));
            }
        }
        for (title, err) in self.reports.refresh_all(backend).await {
            failures.push(format!("{title}: {err}"));
        }
        failure_notice("Some data could not be loaded", &failures)
    }

    pub async fn navigate<B: DataBackend + ?Sized>(
        &mut self,
        section: Section,
        backend: &B,
    ) -> Option<Notice> {
        self.section = section;
        if section != Section::Report {
            return None;
        }

        let failures = self
            .reports
            .refresh_all(backend)
            .await
            .into_iter()
            .map(|(title, err)| format!("{title}: {err}"))
            .collect::<Vec<_>>();
        failure_notice("Some reports could not be loaded", &failures)
    }

    pub async fn verify_schema<B: DataBackend + ?Sized>(
        &self,
        backend: &B,
    ) -> Result<Vec<SchemaIssue>, SchemaError> {
        let introspector = SchemaIntrospector::new(backend);
        let mut issues = Vec::new();
        for page in &self.pages {
            let config = page.config();
            let Some(def) = SCHEMA.tables().iter().find(|def| def.name == config.table) else {
                continue;
            };
            let catalog = introspector.describe(config.table).await?;
            issues.extend(verify_table(
                def,
                config.primary_key,
                &config.field_names(),
                &catalog,
            ));
        }

        for issue in &issues {
            warn!(%issue, "schema drift");
        }
        info!(issues = issues.len(), "schema verified");
        Ok(issues)
    }
}

fn failure_notice(heading: &str, failures: &[String]) -> Option<Notice> {
    if failures.is_empty() {
        return None;
    }
    Some(Notice::error(format!("{heading}:\n{}", failures.join("\n"))))
}
