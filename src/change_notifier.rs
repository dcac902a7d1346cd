use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::config::{NotificationConfig, SheetConfig};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::notifier::{self, Mailer};
use crate::repository::LeadRepository;

/// Result of one row-count comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeCheck {
    pub previous_rows: usize,
    pub current_rows: usize,
    pub notified: bool,
}

/// Emails a notice whenever the sheet grows.
///
/// Only the row count is compared, so it cannot tell which row was added.
pub struct ChangeNotifier {
    repository: Arc<dyn LeadRepository>,
    mailer: Arc<dyn Mailer>,
    sheet: SheetConfig,
    notifications: NotificationConfig,
    metrics: MetricsCollector,
}

impl ChangeNotifier {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        mailer: Arc<dyn Mailer>,
        sheet: SheetConfig,
        notifications: NotificationConfig,
    ) -> Self {
        Self {
            repository,
            mailer,
            sheet,
            notifications,
            metrics: MetricsCollector::default(),
        }
    }

    fn property_key(&self) -> String {
        format!("lastRowCount_{}", self.sheet.name)
    }

    /// Compare the current last row with the persisted count and notify on growth
    pub async fn check(&self) -> Result<ChangeCheck> {
        let current_rows = self.repository.last_row().await?;
        let key = self.property_key();
        let previous_rows = self
            .repository
            .get_property(&key)
            .await?
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut notified = false;
        if current_rows > previous_rows {
            info!(previous_rows, current_rows, "Sheet grew; sending change notice");
            let message = notifier::change_notice_email(
                self.notifications.recipient_list(),
                &self.notifications.subject_prefix,
                &self.sheet.link,
            );
            notified = notifier::deliver(self.mailer.as_ref(), &message).await;
            self.metrics.record_notification("sheet_change", notified);
        }

        self.repository.set_property(&key, &current_rows.to_string()).await?;

        Ok(ChangeCheck {
            previous_rows,
            current_rows,
            notified,
        })
    }

    /// Trigger entry point: errors are logged, never propagated
    pub async fn on_change(&self) -> Option<ChangeCheck> {
        match self.check().await {
            Ok(check) => Some(check),
            Err(e) => {
                error!(error = %e, "Error in change notifier");
                self.metrics.record_error("change_notifier", "check");
                None
            },
        }
    }

    /// Poll for changes until the task is dropped
    pub async fn run_poll(self: Arc<Self>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.on_change().await;
        }
    }
}
