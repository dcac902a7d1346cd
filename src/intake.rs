//! Lead intake webhook logic.
//!
//! Turns a raw request into a stored lead row: resolve the body, normalize
//! fields, check the phone key, append, then notify by email.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{NotificationConfig, SheetConfig};
use crate::db::AppendOutcome;
use crate::error::{LeadIntakeError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{
    HeaderStatus, LeadSubmission, NewLead, WebhookResponse, CONVERSION_SENT_NO, DEFAULT_CAMPAIGN, STATUS_NEW,
};
use crate::notifier::{self, Mailer};
use crate::repository::LeadRepository;
use crate::utils::{format_sheet_timestamp, generate_lead_id, phone_key};
use crate::validation::InputValidator;

/// Decode a webhook request into a submission.
///
/// A non-empty body is read as a JSON object first and, failing that, as
/// form-encoded pairs merged with the query string. Unknown keys are ignored,
/// so an unreadable body still yields an all-default lead. An empty body
/// falls back to the query string alone.
pub fn parse_submission(body: &[u8], query: &HashMap<String, String>) -> Result<LeadSubmission> {
    let has_body = body.iter().any(|b| !b.is_ascii_whitespace());

    if has_body {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => return Ok(LeadSubmission::from_map(map)?),
            Ok(_) => warn!("Request body is JSON but not an object; trying form parameters"),
            Err(e) => warn!(error = %e, "Request body is not JSON; trying form parameters"),
        }

        let mut params: Map<String, Value> = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            params.extend(pairs.into_iter().map(|(k, v)| (k, Value::String(v))));
        }
        return Ok(LeadSubmission::from_map(params)?);
    }

    if !query.is_empty() {
        let params = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        return Ok(LeadSubmission::from_map(params)?);
    }

    Err(LeadIntakeError::InvalidRequest("No request body".to_string()))
}

/// Build the row for a submission received at `now`
#[must_use]
pub fn build_lead(submission: &LeadSubmission, now: DateTime<Utc>, offset: FixedOffset) -> NewLead {
    let field = |value: &Option<Value>| InputValidator::field_or_sentinel(LeadSubmission::text(value.as_ref()).as_deref());
    let or_default = |value: String, default: &str| {
        if InputValidator::is_present(&value) {
            value
        } else {
            default.to_string()
        }
    };

    let supplied_id = field(&submission.lead_id);
    let lead_id = if !InputValidator::is_present(&supplied_id) {
        generate_lead_id(now)
    } else if let Err(e) = InputValidator::validate_lead_id(&supplied_id) {
        warn!(error = %e, "Ignoring supplied lead id");
        generate_lead_id(now)
    } else {
        supplied_id
    };

    let phone = field(&submission.phone);

    NewLead {
        lead_id,
        timestamp: format_sheet_timestamp(&now, offset),
        name: field(&submission.name),
        phone_key: phone_key(&phone),
        phone,
        symptoms: field(&submission.symptoms),
        campaign_name: or_default(field(&submission.campaign_name), DEFAULT_CAMPAIGN),
        lead_status: or_default(field(&submission.lead_status), STATUS_NEW),
        conversion_sent: CONVERSION_SENT_NO.to_string(),
        gclid: field(&submission.gclid),
        fbclid: field(&submission.fbclid),
        remarks: field(&submission.remarks),
    }
}

/// The webhook service
pub struct LeadIntake {
    repository: Arc<dyn LeadRepository>,
    mailer: Arc<dyn Mailer>,
    sheet: SheetConfig,
    offset: FixedOffset,
    notifications: NotificationConfig,
    metrics: MetricsCollector,
}

impl LeadIntake {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        mailer: Arc<dyn Mailer>,
        sheet: SheetConfig,
        notifications: NotificationConfig,
    ) -> anyhow::Result<Self> {
        let offset = sheet.offset()?;
        Ok(Self {
            repository,
            mailer,
            sheet,
            offset,
            notifications,
            metrics: MetricsCollector::default(),
        })
    }

    /// Handle a raw webhook request; never fails, errors become the failure envelope
    pub async fn handle_request(&self, body: &[u8], query: &HashMap<String, String>) -> WebhookResponse {
        match parse_submission(body, query) {
            Ok(submission) => self.handle_submission(submission).await,
            Err(e) => {
                warn!(error = %e, "Rejected webhook request");
                self.metrics.record_error("invalid_request", "intake");
                match e {
                    LeadIntakeError::InvalidRequest(message) => WebhookResponse::failure(message),
                    other => WebhookResponse::failure(other.to_string()),
                }
            },
        }
    }

    /// Store a decoded submission and report the outcome envelope
    #[instrument(name = "lead_intake", skip_all)]
    pub async fn handle_submission(&self, submission: LeadSubmission) -> WebhookResponse {
        let started = Instant::now();
        let (response, outcome) = match self.process(submission).await {
            Ok(response) if response.duplicate == Some(true) => (response, "duplicate"),
            Ok(response) => (response, "saved"),
            Err(e) => {
                error!(error = %e, "Error in lead intake");
                (WebhookResponse::failure(e.to_string()), "error")
            },
        };
        self.metrics.record_intake(outcome, started.elapsed());
        response
    }

    async fn process(&self, submission: LeadSubmission) -> Result<WebhookResponse> {
        match self.repository.ensure_headers().await? {
            HeaderStatus::Created => info!(sheet = %self.sheet.name, "Header row created"),
            HeaderStatus::Rewritten => warn!(sheet = %self.sheet.name, "Header row did not match; regenerated"),
            HeaderStatus::Matched => {},
        }

        let lead = build_lead(&submission, Utc::now(), self.offset);
        debug!(lead_id = %lead.lead_id, "Received lead");

        if let Some(key) = &lead.phone_key {
            if self.repository.find_by_phone_key(key).await?.is_some() {
                info!(lead_id = %lead.lead_id, "Duplicate lead skipped (phone already in sheet)");
                return Ok(WebhookResponse::duplicate());
            }
        }

        match self.repository.append_lead(lead.clone()).await? {
            AppendOutcome::Duplicate => {
                info!(lead_id = %lead.lead_id, "Duplicate lead skipped (concurrent submission)");
                return Ok(WebhookResponse::duplicate());
            },
            AppendOutcome::Inserted(row) => {
                info!(row, lead_id = %lead.lead_id, "Data saved successfully");
            },
        }

        self.notify(&lead).await;
        Ok(WebhookResponse::saved())
    }

    async fn notify(&self, lead: &NewLead) {
        let recipients = self.notifications.recipient_list();
        if recipients.is_empty() {
            info!("Email skipped: notification recipients not set or invalid");
            return;
        }
        let message = notifier::new_lead_email(lead, recipients, &self.notifications.subject_prefix, &self.sheet.link);
        let delivered = notifier::deliver(self.mailer.as_ref(), &message).await;
        self.metrics.record_notification("new_lead", delivered);
    }
}
