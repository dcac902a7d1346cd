use anyhow::Result;
use metrics::{counter, histogram};
use std::time::Duration;

use crate::conversions::UploadOutcome;

/// Metrics collection and management
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    // Intake metrics
    pub leads_received_total: &'static str,
    pub leads_saved_total: &'static str,
    pub leads_duplicate_total: &'static str,
    pub intake_duration: &'static str,

    // Notification metrics
    pub notifications_total: &'static str,

    // Conversion metrics
    pub conversion_uploads_total: &'static str,
    pub conversions_marked_sent_total: &'static str,

    // Error metrics
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            leads_received_total: "lead_intake_leads_received_total",
            leads_saved_total: "lead_intake_leads_saved_total",
            leads_duplicate_total: "lead_intake_leads_duplicate_total",
            intake_duration: "lead_intake_intake_duration_seconds",

            notifications_total: "lead_intake_notifications_total",

            conversion_uploads_total: "lead_intake_conversion_uploads_total",
            conversions_marked_sent_total: "lead_intake_conversions_marked_sent_total",

            errors_total: "lead_intake_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Initialize metrics collection
    pub fn init() -> Result<()> {
        // No exporter is wired yet; install the no-op recorder so macros are cheap
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {}", e))?;

        Ok(())
    }

    /// Record the outcome of one webhook submission
    pub fn record_intake(&self, outcome: &str, duration: Duration) {
        counter!(self.leads_received_total).increment(1);
        match outcome {
            "saved" => counter!(self.leads_saved_total).increment(1),
            "duplicate" => counter!(self.leads_duplicate_total).increment(1),
            _ => self.record_error("intake", outcome),
        }
        histogram!(self.intake_duration, "outcome" => outcome.to_string()).record(duration.as_secs_f64());
    }

    /// Record a notification attempt
    pub fn record_notification(&self, kind: &str, delivered: bool) {
        counter!(
            self.notifications_total,
            "kind" => kind.to_string(),
            "status" => if delivered { "delivered" } else { "failed" }
        )
        .increment(1);
    }

    /// Record one provider upload
    pub fn record_conversion_upload(&self, provider: &str, outcome: &UploadOutcome) {
        counter!(
            self.conversion_uploads_total,
            "provider" => provider.to_string(),
            "outcome" => outcome.label()
        )
        .increment(1);
    }

    /// Record a row transitioning to Conversion Sent = Yes
    pub fn record_conversion_marked(&self) {
        counter!(self.conversions_marked_sent_total).increment(1);
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &str, operation: &str) {
        counter!(
            self.errors_total,
            "type" => error_type.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }
}
