//! Data models for lead handling and storage
//!
//! This module contains the data structures used throughout the service:
//! submitted payloads, stored lead rows, webhook envelopes and sheet edits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::Column;

/// Status value that triggers an offline conversion
pub const STATUS_QUALIFIED: &str = "Qualified";
/// Status given to new leads when none is supplied
pub const STATUS_NEW: &str = "New";
/// Campaign given to new leads when none is supplied
pub const DEFAULT_CAMPAIGN: &str = "ChatBot Campaign";
/// Conversion Sent cell values
pub const CONVERSION_SENT_YES: &str = "Yes";
pub const CONVERSION_SENT_NO: &str = "No";

/// Fields a client may post to the webhook.
///
/// Values arrive as arbitrary JSON scalars (a phone is often a number), so
/// each field keeps the raw value and is stringified on read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadSubmission {
    pub lead_id: Option<Value>,
    pub name: Option<Value>,
    pub phone: Option<Value>,
    pub symptoms: Option<Value>,
    pub campaign_name: Option<Value>,
    pub lead_status: Option<Value>,
    /// Accepted for compatibility, never stored: new rows always start unsent
    pub conversion_sent: Option<Value>,
    pub gclid: Option<Value>,
    pub fbclid: Option<Value>,
    pub remarks: Option<Value>,
    /// Accepted from the landing page, not verified here
    pub recaptcha_token: Option<Value>,
}

impl LeadSubmission {
    /// Build a submission from a decoded JSON object or form parameters
    pub fn from_map(map: Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(map))
    }

    /// String form of a raw field, `None` for absent or null
    #[must_use]
    pub fn text(value: Option<&Value>) -> Option<String> {
        match value? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A lead row ready to be appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub lead_id: String,
    pub timestamp: String,
    pub name: String,
    pub phone: String,
    /// Normalized dedup key, absent for short or missing phones
    #[serde(skip)]
    pub phone_key: Option<String>,
    pub symptoms: String,
    pub campaign_name: String,
    pub lead_status: String,
    pub conversion_sent: String,
    pub gclid: String,
    pub fbclid: String,
    pub remarks: String,
}

/// A stored lead row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Sheet row number; the header occupies row 1
    pub row_number: usize,
    pub lead_id: String,
    pub timestamp: String,
    pub name: String,
    pub phone: String,
    pub symptoms: String,
    pub campaign_name: String,
    pub lead_status: String,
    pub conversion_sent: String,
    pub gclid: String,
    pub fbclid: String,
    pub remarks: String,
}

impl Lead {
    /// Value of a single cell
    #[must_use]
    pub fn cell(&self, column: Column) -> &str {
        match column {
            Column::LeadId => &self.lead_id,
            Column::DateTime => &self.timestamp,
            Column::Name => &self.name,
            Column::Phone => &self.phone,
            Column::Symptoms => &self.symptoms,
            Column::CampaignName => &self.campaign_name,
            Column::LeadStatus => &self.lead_status,
            Column::ConversionSent => &self.conversion_sent,
            Column::Gclid => &self.gclid,
            Column::Fbclid => &self.fbclid,
            Column::Remarks => &self.remarks,
        }
    }

    /// Conversion state derived from the Conversion Sent cell
    #[must_use]
    pub fn conversion_state(&self) -> ConversionState {
        ConversionState::from_cell(&self.conversion_sent)
    }
}

/// Whether an offline conversion has been reported for a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    Unsent,
    Sent,
}

impl ConversionState {
    /// Only the literal "Yes" counts as sent
    #[must_use]
    pub fn from_cell(value: &str) -> Self {
        if value == CONVERSION_SENT_YES {
            Self::Sent
        } else {
            Self::Unsent
        }
    }
}

/// What happened to the header row before a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStatus {
    /// No header existed; it was written
    Created,
    /// Existing header already matched
    Matched,
    /// Existing header differed and was rewritten
    Rewritten,
}

/// JSON envelope returned by the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl WebhookResponse {
    pub fn saved() -> Self {
        Self {
            success: true,
            message: Some("Data saved successfully".to_string()),
            error: None,
            duplicate: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            success: true,
            message: Some("Your details have already been received. We'll be in touch shortly.".to_string()),
            error: None,
            duplicate: Some(true),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            duplicate: None,
        }
    }
}

/// Row addressed by an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditTarget {
    LeadId(String),
    /// Sheet row number; row 1 is the header
    Row(usize),
}

/// A manual change to one cell of the lead sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetEdit {
    pub target: EditTarget,
    pub column: Column,
    pub value: String,
}
