use async_trait::async_trait;

use crate::db::{AppendOutcome, Database};
use crate::error::{LeadIntakeError, Result};
use crate::models::{EditTarget, HeaderStatus, Lead, NewLead};
use crate::schema::Column;

/// Storage seam for the lead sheet.
///
/// Rows are addressed by sheet row number (header is row 1).
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn ensure_headers(&self) -> Result<HeaderStatus>;
    async fn find_by_phone_key(&self, phone_key: &str) -> Result<Option<Lead>>;
    async fn append_lead(&self, lead: NewLead) -> Result<AppendOutcome>;
    async fn find_lead(&self, target: &EditTarget) -> Result<Option<Lead>>;
    async fn update_cell(&self, row_number: usize, column: Column, value: &str) -> Result<()>;
    async fn last_row(&self) -> Result<usize>;
    async fn get_property(&self, key: &str) -> Result<Option<String>>;
    async fn set_property(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed repository; blocking calls run on the blocking pool
#[derive(Clone)]
pub struct SqliteLeadRepository {
    database: Database,
}

impl SqliteLeadRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let database = self.database.clone();
        tokio::task::spawn_blocking(move || f(&database))
            .await
            .map_err(LeadIntakeError::from)?
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    async fn ensure_headers(&self) -> Result<HeaderStatus> {
        self.run(Database::ensure_headers).await
    }

    async fn find_by_phone_key(&self, phone_key: &str) -> Result<Option<Lead>> {
        let phone_key = phone_key.to_string();
        self.run(move |db| db.find_by_phone_key(&phone_key)).await
    }

    async fn append_lead(&self, lead: NewLead) -> Result<AppendOutcome> {
        self.run(move |db| db.append_lead(&lead)).await
    }

    async fn find_lead(&self, target: &EditTarget) -> Result<Option<Lead>> {
        let target = target.clone();
        self.run(move |db| match target {
            EditTarget::LeadId(lead_id) => db.get_lead(&lead_id),
            EditTarget::Row(row) => db.get_lead_by_row(row),
        })
        .await
    }

    async fn update_cell(&self, row_number: usize, column: Column, value: &str) -> Result<()> {
        let value = value.to_string();
        self.run(move |db| db.update_cell(row_number, column, &value)).await
    }

    async fn last_row(&self) -> Result<usize> {
        self.run(Database::last_row).await
    }

    async fn get_property(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |db| db.get_property(&key)).await
    }

    async fn set_property(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |db| db.set_property(&key, &value)).await
    }
}
