//! Outbound email notifications.
//!
//! Delivery goes through a [`Mailer`]. [`HttpMailer`] posts the message to a
//! transactional mail relay; [`LogMailer`] only logs, and is used when no
//! relay endpoint is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::error::{LeadIntakeError, Result};
use crate::models::NewLead;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Email delivery seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Posts messages as JSON to a mail relay endpoint
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMailer {
    pub fn new(client: Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(LeadIntakeError::Mail(format!("mail relay returned {}", response.status())));
        }
        Ok(())
    }
}

/// Logs messages instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(to = ?message.to, subject = %message.subject, "Mail relay not configured; notification logged only");
        Ok(())
    }
}

/// Pick the mailer for the given configuration
pub fn mailer_from_config(client: Client, config: &NotificationConfig) -> Box<dyn Mailer> {
    if config.mail_endpoint.trim().is_empty() {
        Box::new(LogMailer)
    } else {
        Box::new(HttpMailer::new(
            client,
            config.mail_endpoint.trim(),
            Some(config.mail_token.clone()),
        ))
    }
}

/// Compose the per-lead notification sent by the webhook
#[must_use]
pub fn new_lead_email(lead: &NewLead, recipients: Vec<String>, subject_prefix: &str, sheet_link: &str) -> EmailMessage {
    let html = format!(
        "<h2>New ChatBot Lead - {prefix}</h2>\
         <p>A new lead has been submitted through the chatbot.</p>\
         <hr>\
         <p><strong>Name:</strong> {name}</p>\
         <p><strong>Phone:</strong> {phone}</p>\
         <p><strong>Symptoms:</strong> {symptoms}</p>\
         <p><strong>Campaign:</strong> {campaign}</p>\
         <p><strong>Date &amp; Time:</strong> {timestamp}</p>\
         <hr>\
         <p><a href=\"{link}\" style=\"background-color: #006FAC; color: white; padding: 10px 20px; \
         text-decoration: none; border-radius: 5px;\">View in Google Sheet</a></p>",
        prefix = escape_html(subject_prefix),
        name = escape_html(&lead.name),
        phone = escape_html(&lead.phone),
        symptoms = escape_html(&lead.symptoms),
        campaign = escape_html(&lead.campaign_name),
        timestamp = escape_html(&lead.timestamp),
        link = escape_html(sheet_link),
    );
    let text = format!(
        "New ChatBot Lead - {subject_prefix}\n\nName: {}\nPhone: {}\nSymptoms: {}\n\nView: {sheet_link}",
        lead.name, lead.phone, lead.symptoms
    );

    EmailMessage {
        to: recipients,
        subject: format!("{subject_prefix} - New ChatBot Lead: {}", lead.name),
        html,
        text: Some(text),
    }
}

/// Compose the row-count change notice
#[must_use]
pub fn change_notice_email(recipients: Vec<String>, subject_prefix: &str, sheet_link: &str) -> EmailMessage {
    EmailMessage {
        to: recipients,
        subject: format!("{subject_prefix} - New ChatBot Lead"),
        html: format!(
            "A new lead has been added. View it here: <a href=\"{}\">{} Leads</a>",
            escape_html(sheet_link),
            escape_html(subject_prefix)
        ),
        text: None,
    }
}

/// Best-effort delivery: failures are logged and reported as `false`
pub async fn deliver(mailer: &dyn Mailer, message: &EmailMessage) -> bool {
    if message.to.is_empty() {
        info!("Email skipped: no valid recipients configured");
        return false;
    }
    match mailer.send(message).await {
        Ok(()) => {
            info!(to = ?message.to, "Email notification sent");
            true
        },
        Err(e) => {
            warn!(error = %e, "Email notification failed");
            false
        },
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
