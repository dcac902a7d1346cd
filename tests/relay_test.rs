use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::FixedOffset;
use lead_intake::config::AppConfig;
use lead_intake::conversions::{
    ConversionRequest, ConversionUploader, GoogleAdsUploader, MetaUploader, UploadOutcome,
};
use lead_intake::db::Database;
use lead_intake::intake::LeadIntake;
use lead_intake::models::{ConversionState, EditTarget, SheetEdit};
use lead_intake::notifier::LogMailer;
use lead_intake::relay::{RelayOutcome, StatusRelay};
use lead_intake::repository::{LeadRepository, SqliteLeadRepository};
use lead_intake::schema::Column;

/// Uploader that always answers the same way and counts calls
struct FixedUploader {
    provider: &'static str,
    outcome: UploadOutcome,
    calls: AtomicUsize,
    last_click_id: std::sync::Mutex<Option<String>>,
}

impl FixedUploader {
    fn new(provider: &'static str, outcome: UploadOutcome) -> Arc<Self> {
        Arc::new(Self {
            provider,
            outcome,
            calls: AtomicUsize::new(0),
            last_click_id: std::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl ConversionUploader for FixedUploader {
    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn upload(&self, request: &ConversionRequest) -> UploadOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_click_id.lock().unwrap() = Some(request.click_id.clone());
        self.outcome.clone()
    }
}

fn dubai() -> FixedOffset {
    FixedOffset::east_opt(4 * 3600).unwrap()
}

async fn seed(db: &Database, body: &str) {
    let config = AppConfig::default();
    let intake = LeadIntake::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        Arc::new(LogMailer),
        config.sheet,
        config.notifications,
    )
    .unwrap();
    assert!(intake.handle_request(body.as_bytes(), &HashMap::new()).await.success);
}

fn qualify(lead_id: &str) -> SheetEdit {
    SheetEdit {
        target: EditTarget::LeadId(lead_id.to_string()),
        column: Column::LeadStatus,
        value: "Qualified".to_string(),
    }
}

#[tokio::test]
async fn test_unconfigured_providers_leave_conversion_unsent() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, r#"{"leadId":"L-1","name":"Sara","phone":"+971501234567","gclid":"g-1"}"#).await;

    let config = AppConfig::default();
    let client = reqwest::Client::new();
    let relay = StatusRelay::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        Arc::new(GoogleAdsUploader::new(client.clone(), config.google_ads)),
        Arc::new(MetaUploader::new(client, config.meta)),
        dubai(),
    );

    let outcome = relay.on_edit(qualify("L-1")).await.unwrap();
    assert_eq!(
        outcome,
        RelayOutcome::Relayed {
            row_number: 2,
            google_ads: UploadOutcome::Skipped("Google Ads credentials not configured".to_string()),
            meta: UploadOutcome::Skipped("no fbclid".to_string()),
            conversion_state: ConversionState::Unsent,
        }
    );

    let lead = db.get_lead("L-1").unwrap().unwrap();
    assert_eq!(lead.lead_status, "Qualified");
    assert_eq!(lead.conversion_sent, "No");
}

#[tokio::test]
async fn test_successful_upload_marks_sent_once() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, r#"{"leadId":"L-1","phone":"+971501234567","gclid":" g-1 ","fbclid":"fb-1"}"#).await;

    let google = FixedUploader::new("google_ads", UploadOutcome::Sent);
    let meta = FixedUploader::new("meta", UploadOutcome::Failed("HTTP 500".to_string()));
    let relay = StatusRelay::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        google.clone(),
        meta.clone(),
        dubai(),
    );

    let first = relay.on_edit(qualify("L-1")).await.unwrap();
    assert!(matches!(
        first,
        RelayOutcome::Relayed {
            conversion_state: ConversionState::Sent,
            ..
        }
    ));
    assert_eq!(db.get_lead("L-1").unwrap().unwrap().conversion_sent, "Yes");
    assert_eq!(google.last_click_id.lock().unwrap().as_deref(), Some("g-1"));

    // Re-qualifying an already reported lead does not upload again
    let second = relay.on_edit(qualify("L-1")).await.unwrap();
    assert!(matches!(second, RelayOutcome::Ignored { .. }));
    assert_eq!(google.calls.load(Ordering::SeqCst), 1);
    assert_eq!(meta.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_uploads_retry_on_next_qualifying_edit() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, r#"{"leadId":"L-1","phone":"+971501234567","fbclid":"fb-1"}"#).await;

    let google = FixedUploader::new("google_ads", UploadOutcome::Sent);
    let meta = FixedUploader::new("meta", UploadOutcome::Failed("timeout".to_string()));
    let relay = StatusRelay::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        google.clone(),
        meta.clone(),
        dubai(),
    );

    relay.on_edit(qualify("L-1")).await.unwrap();
    relay.on_edit(qualify("L-1")).await.unwrap();

    assert_eq!(google.calls.load(Ordering::SeqCst), 0);
    assert_eq!(meta.calls.load(Ordering::SeqCst), 2);
    assert_eq!(db.get_lead("L-1").unwrap().unwrap().conversion_sent, "No");
}

#[tokio::test]
async fn test_non_qualified_status_does_not_upload() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, r#"{"leadId":"L-1","phone":"+971501234567","gclid":"g-1"}"#).await;

    let google = FixedUploader::new("google_ads", UploadOutcome::Sent);
    let relay = StatusRelay::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        google.clone(),
        FixedUploader::new("meta", UploadOutcome::Sent),
        dubai(),
    );

    let edit = SheetEdit {
        value: "Contacted".to_string(),
        ..qualify("L-1")
    };
    assert!(matches!(relay.on_edit(edit).await.unwrap(), RelayOutcome::Ignored { .. }));
    assert_eq!(google.calls.load(Ordering::SeqCst), 0);

    let repository = SqliteLeadRepository::new(db.clone());
    let lead = repository
        .find_lead(&EditTarget::LeadId("L-1".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.lead_status, "Contacted");
}

#[tokio::test]
async fn test_status_edit_by_row_number() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, r#"{"leadId":"L-1","phone":"+971501234567","gclid":"g-1"}"#).await;

    let relay = StatusRelay::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        FixedUploader::new("google_ads", UploadOutcome::Sent),
        FixedUploader::new("meta", UploadOutcome::Sent),
        dubai(),
    );

    let edit = SheetEdit {
        target: EditTarget::Row(2),
        ..qualify("unused")
    };
    assert!(relay.handle_edit(edit).await.is_some());
    assert_eq!(db.get_lead("L-1").unwrap().unwrap().conversion_sent, "Yes");
}
