use std::fs;
use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{LeadIntakeError, Result};
use crate::models::{HeaderStatus, Lead, NewLead};
use crate::schema::{leads, properties, sheet_headers, Column, SHEET_HEADERS};

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Result of appending a lead row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Row written at this sheet row number
    Inserted(usize),
    /// Another row already holds the same phone key
    Duplicate,
}

/// Database manager for handling connections and operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        let path = path.strip_prefix("//").unwrap_or(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LeadIntakeError::Other(format!("Failed to create database directory {}: {e}", parent.display()))
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
        Self::from_manager(manager, max_connections)
    }

    /// Single-connection in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_manager(SqliteConnectionManager::memory(), 1)
    }

    fn from_manager(manager: SqliteConnectionManager, max_connections: u32) -> Result<Self> {
        let pool = Pool::builder().max_size(max_connections).build(manager)?;

        // Run migrations
        let conn = pool.get()?;
        Self::run_migrations(&conn)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2026-01-10-000000_create_leads/up.sql"))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Make sure the header row exists and matches the expected titles
    pub fn ensure_headers(&self) -> Result<HeaderStatus> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Vec<String> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM {} ORDER BY {} ASC",
                sheet_headers::TITLE,
                sheet_headers::TABLE,
                sheet_headers::POSITION
            ))?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let status = if current.is_empty() {
            HeaderStatus::Created
        } else if current.iter().map(String::as_str).eq(SHEET_HEADERS.iter().copied()) {
            HeaderStatus::Matched
        } else {
            HeaderStatus::Rewritten
        };

        if status != HeaderStatus::Matched {
            tx.execute(&format!("DELETE FROM {}", sheet_headers::TABLE), [])?;
            for column in Column::ALL {
                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                        sheet_headers::TABLE,
                        sheet_headers::POSITION,
                        sheet_headers::TITLE
                    ),
                    params![column.position() as i64, column.header()],
                )?;
            }
        }

        tx.commit()?;
        Ok(status)
    }

    /// Header titles in column order
    pub fn headers(&self) -> Result<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {} ASC",
            sheet_headers::TITLE,
            sheet_headers::TABLE,
            sheet_headers::POSITION
        ))?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Overwrite the header row, used when repairing a hand-edited sheet
    pub fn write_headers(&self, titles: &[&str]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", sheet_headers::TABLE), [])?;
        for (i, title) in titles.iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                    sheet_headers::TABLE,
                    sheet_headers::POSITION,
                    sheet_headers::TITLE
                ),
                params![(i + 1) as i64, title],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Append a lead row unless its phone key is already taken
    pub fn append_lead(&self, lead: &NewLead) -> Result<AppendOutcome> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next_row: i64 = tx.query_row(
            &format!("SELECT COALESCE(MAX({}), 1) + 1 FROM {}", leads::ROW_NUMBER, leads::TABLE),
            [],
            |row| row.get(0),
        )?;

        let inserted = tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                leads::TABLE,
                leads::ROW_NUMBER,
                leads::LEAD_ID,
                leads::DATE_TIME,
                leads::NAME,
                leads::PHONE,
                leads::PHONE_KEY,
                leads::SYMPTOMS,
                leads::CAMPAIGN_NAME,
                leads::LEAD_STATUS,
                leads::CONVERSION_SENT,
                leads::GCLID,
                leads::FBCLID,
                leads::REMARKS
            ),
            params![
                next_row,
                lead.lead_id,
                lead.timestamp,
                lead.name,
                lead.phone,
                lead.phone_key,
                lead.symptoms,
                lead.campaign_name,
                lead.lead_status,
                lead.conversion_sent,
                lead.gclid,
                lead.fbclid,
                lead.remarks
            ],
        );

        match inserted {
            Ok(_) => {
                tx.commit()?;
                debug!(row = next_row, lead_id = %lead.lead_id, "Lead row appended");
                Ok(AppendOutcome::Inserted(next_row as usize))
            },
            Err(e) if is_unique_violation(&e) => {
                info!(lead_id = %lead.lead_id, "Phone key already present, row not appended");
                Ok(AppendOutcome::Duplicate)
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Find the lead holding a normalized phone key
    pub fn find_by_phone_key(&self, phone_key: &str) -> Result<Option<Lead>> {
        let conn = self.get_connection()?;
        let lead = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE {} = ?", leads::TABLE, leads::PHONE_KEY),
                params![phone_key],
                map_lead,
            )
            .optional()?;
        Ok(lead)
    }

    /// Get a lead by its Lead ID (first row if the id repeats)
    pub fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        let conn = self.get_connection()?;
        let lead = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ? ORDER BY {} ASC LIMIT 1",
                    leads::TABLE,
                    leads::LEAD_ID,
                    leads::ROW_NUMBER
                ),
                params![lead_id],
                map_lead,
            )
            .optional()?;
        Ok(lead)
    }

    /// Get a lead by sheet row number
    pub fn get_lead_by_row(&self, row_number: usize) -> Result<Option<Lead>> {
        let conn = self.get_connection()?;
        let lead = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE {} = ?", leads::TABLE, leads::ROW_NUMBER),
                params![row_number as i64],
                map_lead,
            )
            .optional()?;
        Ok(lead)
    }

    /// All leads in row order
    pub fn list_leads(&self) -> Result<Vec<Lead>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY {} ASC", leads::TABLE, leads::ROW_NUMBER))?;
        let rows = stmt.query_map([], map_lead)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Overwrite one cell of a lead row.
    ///
    /// Phone edits also refresh the dedup key; a collision is rejected.
    pub fn update_cell(&self, row_number: usize, column: Column, value: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let result = if column == Column::Phone {
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
                    leads::TABLE,
                    leads::PHONE,
                    leads::PHONE_KEY,
                    leads::ROW_NUMBER
                ),
                params![value, crate::utils::phone_key(value), row_number as i64],
            )
        } else {
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ? WHERE {} = ?",
                    leads::TABLE,
                    column.db_column(),
                    leads::ROW_NUMBER
                ),
                params![value, row_number as i64],
            )
        };

        match result {
            Ok(0) => Err(LeadIntakeError::LeadNotFound(format!("row {row_number}"))),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(LeadIntakeError::InvalidRequest(format!(
                "phone {value} already belongs to another lead"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Last used sheet row: 0 for an empty sheet, 1 when only the header exists
    pub fn last_row(&self) -> Result<usize> {
        let conn = self.get_connection()?;
        let last: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE((SELECT MAX({}) FROM {}), (SELECT CASE WHEN COUNT(*) > 0 THEN 1 ELSE 0 END FROM {}))",
                leads::ROW_NUMBER,
                leads::TABLE,
                sheet_headers::TABLE
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(last as usize)
    }

    /// Number of stored leads
    pub fn lead_count(&self) -> Result<usize> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", leads::TABLE), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Read a persisted property
    pub fn get_property(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_connection()?;
        let value = conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE {} = ?", properties::VALUE, properties::TABLE, properties::KEY),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a persisted property
    pub fn set_property(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} ({k}, {v}) VALUES (?, ?) ON CONFLICT({k}) DO UPDATE SET {v} = excluded.{v}",
                table = properties::TABLE,
                k = properties::KEY,
                v = properties::VALUE
            ),
            params![key, value],
        )?;
        Ok(())
    }
}

/// Map a database row to a Lead
fn map_lead(row: &Row) -> rusqlite::Result<Lead> {
    let row_number: i64 = row.get(leads::ROW_NUMBER)?;
    Ok(Lead {
        row_number: row_number as usize,
        lead_id: row.get(leads::LEAD_ID)?,
        timestamp: row.get(leads::DATE_TIME)?,
        name: row.get(leads::NAME)?,
        phone: row.get(leads::PHONE)?,
        symptoms: row.get(leads::SYMPTOMS)?,
        campaign_name: row.get(leads::CAMPAIGN_NAME)?,
        lead_status: row.get(leads::LEAD_STATUS)?,
        conversion_sent: row.get(leads::CONVERSION_SENT)?,
        gclid: row.get(leads::GCLID)?,
        fbclid: row.get(leads::FBCLID)?,
        remarks: row.get(leads::REMARKS)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}
