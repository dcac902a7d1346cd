use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lead_intake::config::AppConfig;
use lead_intake::db::Database;
use lead_intake::error::{LeadIntakeError, Result};
use lead_intake::intake::LeadIntake;
use lead_intake::notifier::{EmailMessage, Mailer};
use lead_intake::repository::SqliteLeadRepository;
use lead_intake::schema::SHEET_HEADERS;
use regex::Regex;
use tempfile::tempdir;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<()> {
        Err(LeadIntakeError::Mail("relay down".to_string()))
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.notifications.recipients = "ops@example.com".to_string();
    config.sheet.link = "https://sheets.example.com/leads".to_string();
    config
}

fn intake_with(db: &Database, mailer: Arc<dyn Mailer>) -> LeadIntake {
    let config = config();
    let repository = Arc::new(SqliteLeadRepository::new(db.clone()));
    LeadIntake::new(repository, mailer, config.sheet, config.notifications).unwrap()
}

async fn post(intake: &LeadIntake, body: &str) -> lead_intake::WebhookResponse {
    intake.handle_request(body.as_bytes(), &HashMap::new()).await
}

#[tokio::test]
async fn test_first_submission_saved_and_notified() {
    let db = Database::open_in_memory().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let intake = intake_with(&db, mailer.clone());

    let response = post(&intake, r#"{"name":"Sara","phone":"+971501234567","symptoms":"fever"}"#).await;
    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("Data saved successfully"));
    assert_eq!(response.duplicate, None);

    assert_eq!(db.headers().unwrap(), SHEET_HEADERS.to_vec());
    let leads = db.list_leads().unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].row_number, 2);
    assert_eq!(leads[0].lead_status, "New");
    assert_eq!(leads[0].conversion_sent, "No");
    assert_eq!(leads[0].campaign_name, "ChatBot Campaign");
    assert_eq!(leads[0].gclid, "-");

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ops@example.com".to_string()]);
    assert_eq!(sent[0].subject, "City Doctor - New ChatBot Lead: Sara");
    assert!(sent[0].html.contains("https://sheets.example.com/leads"));
}

#[tokio::test]
async fn test_same_phone_is_duplicate() {
    let db = Database::open_in_memory().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let intake = intake_with(&db, mailer.clone());

    assert!(post(&intake, r#"{"name":"Sara","phone":"+971 50 123 4567"}"#).await.success);
    let second = post(&intake, r#"{"name":"Sara again","phone":"971-50-123-4567"}"#).await;

    assert!(second.success);
    assert_eq!(second.duplicate, Some(true));
    assert_eq!(
        second.message.as_deref(),
        Some("Your details have already been received. We'll be in touch shortly.")
    );
    assert_eq!(db.lead_count().unwrap(), 1);
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_short_phones_are_not_deduplicated() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    assert_eq!(post(&intake, r#"{"name":"A","phone":"12345"}"#).await.duplicate, None);
    assert_eq!(post(&intake, r#"{"name":"B","phone":"12345"}"#).await.duplicate, None);
    assert_eq!(post(&intake, r#"{"name":"C"}"#).await.duplicate, None);
    assert_eq!(db.lead_count().unwrap(), 3);
}

#[tokio::test]
async fn test_generated_lead_id_and_sentinels() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    assert!(post(&intake, r#"{"phone":971501234567}"#).await.success);

    let lead = db.list_leads().unwrap().remove(0);
    assert!(Regex::new(r"^LEAD-\d+-[A-Z0-9]{5}$").unwrap().is_match(&lead.lead_id));
    assert_eq!(lead.phone, "971501234567");
    assert_eq!(lead.name, "-");
    assert_eq!(lead.symptoms, "-");
    assert_eq!(lead.fbclid, "-");
    assert_eq!(lead.remarks, "-");
    assert!(Regex::new(r"^\d{2}/\d{2}/\d{4}, \d{2}:\d{2}:\d{2} [AP]M$").unwrap().is_match(&lead.timestamp));
}

#[tokio::test]
async fn test_supplied_values_are_kept() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    let body = r#"{"leadId":"TEST-1","name":"Omar","phone":"0501112223","campaignName":"Summer",
        "leadStatus":"Contacted","conversionSent":"Yes","gclid":"g-1","fbclid":"fb-1","remarks":"call back",
        "recaptchaToken":"tok"}"#;
    assert!(post(&intake, body).await.success);

    let lead = db.get_lead("TEST-1").unwrap().unwrap();
    assert_eq!(lead.campaign_name, "Summer");
    assert_eq!(lead.lead_status, "Contacted");
    assert_eq!(lead.conversion_sent, "No");
    assert_eq!(lead.gclid, "g-1");
    assert_eq!(lead.fbclid, "fb-1");
    assert_eq!(lead.remarks, "call back");
}

#[tokio::test]
async fn test_form_and_query_submissions() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    let form = intake
        .handle_request(b"name=Sara&phone=%2B971501234567", &HashMap::new())
        .await;
    assert!(form.success);

    let query = HashMap::from([
        ("name".to_string(), "Omar".to_string()),
        ("phone".to_string(), "+971509999999".to_string()),
    ]);
    assert!(intake.handle_request(b"", &query).await.success);

    assert_eq!(db.lead_count().unwrap(), 2);
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    let empty = post(&intake, "").await;
    assert!(!empty.success);
    assert_eq!(empty.error.as_deref(), Some("No request body"));
    assert_eq!(db.lead_count().unwrap(), 0);
}

#[tokio::test]
async fn test_unreadable_bodies_store_default_rows() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));
    let id_pattern = Regex::new(r"^LEAD-\d+-[A-Z0-9]{5}$").unwrap();

    for body in ["{not json", r#""hello""#, "foo=bar", "{}"] {
        let response = post(&intake, body).await;
        assert!(response.success, "body {body:?} was rejected");
        assert_eq!(response.message.as_deref(), Some("Data saved successfully"));
    }

    let leads = db.list_leads().unwrap();
    assert_eq!(leads.len(), 4);
    for lead in leads {
        assert!(id_pattern.is_match(&lead.lead_id));
        assert_eq!(lead.name, "-");
        assert_eq!(lead.phone, "-");
        assert_eq!(lead.lead_status, "New");
        assert_eq!(lead.campaign_name, "ChatBot Campaign");
    }
}

#[tokio::test]
async fn test_mismatched_header_is_regenerated() {
    let db = Database::open_in_memory().unwrap();
    db.write_headers(&["Lead ID", "Timestamp", "Who"]).unwrap();
    let intake = intake_with(&db, Arc::new(RecordingMailer::default()));

    assert!(post(&intake, r#"{"name":"Sara","phone":"+971501234567"}"#).await.success);
    assert_eq!(db.headers().unwrap(), SHEET_HEADERS.to_vec());
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_intake() {
    let db = Database::open_in_memory().unwrap();
    let intake = intake_with(&db, Arc::new(FailingMailer));

    let response = post(&intake, r#"{"name":"Sara","phone":"+971501234567"}"#).await;
    assert!(response.success);
    assert_eq!(db.lead_count().unwrap(), 1);
}

#[tokio::test]
async fn test_no_recipients_skips_email() {
    let db = Database::open_in_memory().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let mut config = config();
    config.notifications.recipients = "not-an-address".to_string();
    let intake = LeadIntake::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        mailer.clone(),
        config.sheet,
        config.notifications,
    )
    .unwrap();

    assert!(post(&intake, r#"{"name":"Sara","phone":"+971501234567"}"#).await.success);
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_phone_saves_once() {
    let temp_dir = tempdir().unwrap();
    let db_url = temp_dir.path().join("leads.db").display().to_string();
    let db = Database::new(&db_url, 4).unwrap();
    let intake = Arc::new(intake_with(&db, Arc::new(RecordingMailer::default())));

    let mut handles = Vec::new();
    for i in 0..8 {
        let intake = intake.clone();
        handles.push(tokio::spawn(async move {
            let body = format!(r#"{{"name":"Caller {i}","phone":"+971 50 123 4567"}}"#);
            intake.handle_request(body.as_bytes(), &HashMap::new()).await
        }));
    }

    let mut saved = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.success);
        if response.duplicate.is_none() {
            saved += 1;
        }
    }
    assert_eq!(saved, 1);
    assert_eq!(db.lead_count().unwrap(), 1);
}
