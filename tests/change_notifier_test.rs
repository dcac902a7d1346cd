use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lead_intake::change_notifier::{ChangeCheck, ChangeNotifier};
use lead_intake::config::AppConfig;
use lead_intake::db::Database;
use lead_intake::error::Result;
use lead_intake::models::NewLead;
use lead_intake::notifier::{EmailMessage, Mailer};
use lead_intake::repository::SqliteLeadRepository;
use lead_intake::utils::phone_key;

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

fn lead(lead_id: &str, phone: &str) -> NewLead {
    NewLead {
        lead_id: lead_id.to_string(),
        timestamp: "03/14/2026, 09:05:07 PM".to_string(),
        name: "Sara".to_string(),
        phone: phone.to_string(),
        phone_key: phone_key(phone),
        symptoms: "-".to_string(),
        campaign_name: "ChatBot Campaign".to_string(),
        lead_status: "New".to_string(),
        conversion_sent: "No".to_string(),
        gclid: "-".to_string(),
        fbclid: "-".to_string(),
        remarks: "-".to_string(),
    }
}

fn notifier(db: &Database, mailer: Arc<RecordingMailer>, recipients: &str) -> ChangeNotifier {
    let mut config = AppConfig::default();
    config.notifications.recipients = recipients.to_string();
    config.sheet.link = "https://sheets.example.com/leads".to_string();
    ChangeNotifier::new(
        Arc::new(SqliteLeadRepository::new(db.clone())),
        mailer,
        config.sheet,
        config.notifications,
    )
}

#[tokio::test]
async fn test_notifies_only_when_rows_grow() {
    let db = Database::open_in_memory().unwrap();
    db.ensure_headers().unwrap();
    db.set_property("lastRowCount_ChatBot", "1").unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = notifier(&db, mailer.clone(), "ops@example.com");

    assert_eq!(
        notifier.check().await.unwrap(),
        ChangeCheck {
            previous_rows: 1,
            current_rows: 1,
            notified: false
        }
    );

    db.append_lead(&lead("A", "+971501234567")).unwrap();
    assert_eq!(
        notifier.check().await.unwrap(),
        ChangeCheck {
            previous_rows: 1,
            current_rows: 2,
            notified: true
        }
    );
    assert_eq!(db.get_property("lastRowCount_ChatBot").unwrap().as_deref(), Some("2"));

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "City Doctor - New ChatBot Lead");
    assert!(sent[0].html.contains("https://sheets.example.com/leads"));
}

#[tokio::test]
async fn test_first_check_treats_missing_count_as_zero() {
    let db = Database::open_in_memory().unwrap();
    db.ensure_headers().unwrap();
    db.append_lead(&lead("A", "+971501234567")).unwrap();
    let notifier = notifier(&db, Arc::new(RecordingMailer::default()), "ops@example.com");

    let check = notifier.on_change().await.unwrap();
    assert_eq!(check.previous_rows, 0);
    assert_eq!(check.current_rows, 2);
    assert!(check.notified);
}

#[tokio::test]
async fn test_count_persisted_without_recipients() {
    let db = Database::open_in_memory().unwrap();
    db.ensure_headers().unwrap();
    db.append_lead(&lead("A", "+971501234567")).unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = notifier(&db, mailer.clone(), "");

    let check = notifier.check().await.unwrap();
    assert!(!check.notified);
    assert!(mailer.sent.lock().unwrap().is_empty());
    assert_eq!(db.get_property("lastRowCount_ChatBot").unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn test_shrinking_sheet_resets_baseline() {
    let db = Database::open_in_memory().unwrap();
    db.ensure_headers().unwrap();
    db.set_property("lastRowCount_ChatBot", "10").unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = notifier(&db, mailer.clone(), "ops@example.com");

    let check = notifier.check().await.unwrap();
    assert!(!check.notified);
    assert_eq!(db.get_property("lastRowCount_ChatBot").unwrap().as_deref(), Some("1"));
    assert!(mailer.sent.lock().unwrap().is_empty());
}
