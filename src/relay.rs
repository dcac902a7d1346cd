//! Status-change relay: reports qualified leads to the ad platforms.
//!
//! A lead moves from `Unsent` to `Sent` when its status is edited to
//! "Qualified" and at least one provider accepts the conversion. If every
//! provider fails the row stays `Unsent`, so the next qualifying edit retries.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::conversions::{ConversionRequest, ConversionUploader, UploadOutcome};
use crate::error::{LeadIntakeError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{ConversionState, EditTarget, Lead, SheetEdit, CONVERSION_SENT_YES, STATUS_QUALIFIED};
use crate::repository::LeadRepository;
use crate::schema::Column;
use crate::utils::parse_sheet_timestamp;
use crate::validation::InputValidator;

/// What an edit led to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelayOutcome {
    /// Nothing to relay for this edit
    Ignored { reason: String },
    /// Uploads were attempted for the row
    Relayed {
        row_number: usize,
        google_ads: UploadOutcome,
        meta: UploadOutcome,
        conversion_state: ConversionState,
    },
}

/// Applies sheet edits and fires offline conversions
pub struct StatusRelay {
    repository: Arc<dyn LeadRepository>,
    google_ads: Arc<dyn ConversionUploader>,
    meta: Arc<dyn ConversionUploader>,
    offset: FixedOffset,
    metrics: MetricsCollector,
}

impl StatusRelay {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        google_ads: Arc<dyn ConversionUploader>,
        meta: Arc<dyn ConversionUploader>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            repository,
            google_ads,
            meta,
            offset,
            metrics: MetricsCollector::default(),
        }
    }

    /// Apply an edit, then relay if it qualified the lead
    #[instrument(name = "status_relay_edit", skip_all, fields(column = %edit.column))]
    pub async fn on_edit(&self, edit: SheetEdit) -> Result<RelayOutcome> {
        if edit.target == EditTarget::Row(1) {
            return Ok(ignored("header row edited"));
        }

        let lead = self
            .repository
            .find_lead(&edit.target)
            .await?
            .ok_or_else(|| LeadIntakeError::LeadNotFound(describe(&edit.target)))?;

        self.repository
            .update_cell(lead.row_number, edit.column, &edit.value)
            .await?;

        if edit.column != Column::LeadStatus {
            return Ok(ignored("column is not Lead Status"));
        }

        // Read back the row as stored after the edit
        let lead = self
            .repository
            .find_lead(&EditTarget::Row(lead.row_number))
            .await?
            .ok_or_else(|| LeadIntakeError::LeadNotFound(describe(&edit.target)))?;

        if lead.lead_status != STATUS_QUALIFIED {
            return Ok(ignored("status is not Qualified"));
        }
        if lead.conversion_state() == ConversionState::Sent {
            return Ok(ignored("conversion already sent"));
        }

        info!(row = lead.row_number, "Lead Status changed to Qualified");
        self.send_offline_conversion(&lead).await
    }

    /// Trigger entry point: errors are logged and reported as `None`
    pub async fn handle_edit(&self, edit: SheetEdit) -> Option<RelayOutcome> {
        match self.on_edit(edit).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(error = %e, "Error in status relay");
                self.metrics.record_error("relay", "edit");
                None
            },
        }
    }

    /// Upload to each provider with a click id and mark the row if either succeeds
    pub async fn send_offline_conversion(&self, lead: &Lead) -> Result<RelayOutcome> {
        info!(lead_id = %lead.lead_id, "Sending offline conversion");

        let conversion_time = parse_sheet_timestamp(&lead.timestamp, self.offset).unwrap_or_else(|| {
            warn!(timestamp = %lead.timestamp, "Unparseable lead timestamp; using current time");
            Utc::now().with_timezone(&self.offset)
        });

        let google_ads = self
            .upload_if_clicked(self.google_ads.as_ref(), lead, &lead.gclid, conversion_time, "no gclid")
            .await;
        let meta = self
            .upload_if_clicked(self.meta.as_ref(), lead, &lead.fbclid, conversion_time, "no fbclid")
            .await;

        let conversion_state = if google_ads.is_sent() || meta.is_sent() {
            self.repository
                .update_cell(lead.row_number, Column::ConversionSent, CONVERSION_SENT_YES)
                .await?;
            self.metrics.record_conversion_marked();
            ConversionState::Sent
        } else {
            lead.conversion_state()
        };

        Ok(RelayOutcome::Relayed {
            row_number: lead.row_number,
            google_ads,
            meta,
            conversion_state,
        })
    }

    async fn upload_if_clicked(
        &self,
        uploader: &dyn ConversionUploader,
        lead: &Lead,
        click_id: &str,
        conversion_time: chrono::DateTime<FixedOffset>,
        missing: &str,
    ) -> UploadOutcome {
        if !InputValidator::is_present(click_id) {
            return UploadOutcome::Skipped(missing.to_string());
        }
        let request = ConversionRequest {
            lead_id: lead.lead_id.clone(),
            click_id: click_id.trim().to_string(),
            conversion_time,
            phone: Some(lead.phone.clone()),
            email: None,
        };
        let outcome = uploader.upload(&request).await;
        self.metrics.record_conversion_upload(uploader.provider(), &outcome);
        outcome
    }
}

fn ignored(reason: &str) -> RelayOutcome {
    RelayOutcome::Ignored {
        reason: reason.to_string(),
    }
}

fn describe(target: &EditTarget) -> String {
    match target {
        EditTarget::LeadId(id) => id.clone(),
        EditTarget::Row(row) => format!("row {row}"),
    }
}
