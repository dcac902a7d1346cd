//! Sheet and database schema definitions
//!
//! The lead sheet has a fixed 11-column header. This module names those
//! columns once, both as header titles and as SQLite column names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header titles, in sheet order
pub const SHEET_HEADERS: [&str; 11] = [
    "Lead ID",
    "Date & Time",
    "Name",
    "Phone Number",
    "Symptoms",
    "Campaign Name",
    "Lead Status",
    "Conversion Sent",
    "gclid",
    "fbclid",
    "Remarks",
];

/// One column of the lead sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Column {
    LeadId,
    DateTime,
    Name,
    Phone,
    Symptoms,
    CampaignName,
    LeadStatus,
    ConversionSent,
    Gclid,
    Fbclid,
    Remarks,
}

impl Column {
    /// All columns in sheet order
    pub const ALL: [Column; 11] = [
        Column::LeadId,
        Column::DateTime,
        Column::Name,
        Column::Phone,
        Column::Symptoms,
        Column::CampaignName,
        Column::LeadStatus,
        Column::ConversionSent,
        Column::Gclid,
        Column::Fbclid,
        Column::Remarks,
    ];

    /// 1-based position in the sheet
    #[must_use]
    pub const fn position(self) -> usize {
        self as usize + 1
    }

    /// Title shown in the header row
    #[must_use]
    pub const fn header(self) -> &'static str {
        SHEET_HEADERS[self as usize]
    }

    /// SQLite column name
    #[must_use]
    pub const fn db_column(self) -> &'static str {
        match self {
            Self::LeadId => leads::LEAD_ID,
            Self::DateTime => leads::DATE_TIME,
            Self::Name => leads::NAME,
            Self::Phone => leads::PHONE,
            Self::Symptoms => leads::SYMPTOMS,
            Self::CampaignName => leads::CAMPAIGN_NAME,
            Self::LeadStatus => leads::LEAD_STATUS,
            Self::ConversionSent => leads::CONVERSION_SENT,
            Self::Gclid => leads::GCLID,
            Self::Fbclid => leads::FBCLID,
            Self::Remarks => leads::REMARKS,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = String;

    /// Accepts a header title, a snake_case field name or a camelCase field name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Column::ALL
            .into_iter()
            .find(|c| {
                c.header().eq_ignore_ascii_case(wanted)
                    || c.db_column().eq_ignore_ascii_case(wanted)
                    || c.db_column().replace('_', "").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unknown column: {wanted}"))
    }
}

impl TryFrom<String> for Column {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Column> for String {
    fn from(column: Column) -> Self {
        column.header().to_string()
    }
}

/// Leads table schema
pub mod leads {
    /// Table name
    pub const TABLE: &str = "leads";
    /// Sheet row number (header is row 1)
    pub const ROW_NUMBER: &str = "row_number";
    pub const LEAD_ID: &str = "lead_id";
    pub const DATE_TIME: &str = "date_time";
    pub const NAME: &str = "name";
    pub const PHONE: &str = "phone";
    /// Digits-only phone, NULL when shorter than the dedup threshold
    pub const PHONE_KEY: &str = "phone_key";
    pub const SYMPTOMS: &str = "symptoms";
    pub const CAMPAIGN_NAME: &str = "campaign_name";
    pub const LEAD_STATUS: &str = "lead_status";
    pub const CONVERSION_SENT: &str = "conversion_sent";
    pub const GCLID: &str = "gclid";
    pub const FBCLID: &str = "fbclid";
    pub const REMARKS: &str = "remarks";
}

/// Header row schema
pub mod sheet_headers {
    /// Table name
    pub const TABLE: &str = "sheet_headers";
    /// 1-based column position
    pub const POSITION: &str = "position";
    pub const TITLE: &str = "title";
}

/// Key-value properties (persisted trigger state)
pub mod properties {
    /// Table name
    pub const TABLE: &str = "properties";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}
