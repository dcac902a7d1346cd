use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{ConversionRequest, ConversionUploader, UploadOutcome};
use crate::config::MetaConfig;
use crate::error::Result;

/// Sends server events through the Meta Conversions API
#[derive(Clone)]
pub struct MetaUploader {
    client: Client,
    config: MetaConfig,
}

#[derive(Debug, Serialize)]
struct EventsRequest<'a> {
    data: Vec<ServerEvent<'a>>,
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct ServerEvent<'a> {
    event_name: &'a str,
    event_time: i64,
    action_source: &'static str,
    user_data: UserData<'a>,
}

#[derive(Debug, Default, Serialize)]
struct UserData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    fbc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ph: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    em: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events_received: i64,
}

impl MetaUploader {
    pub fn new(client: Client, config: MetaConfig) -> Self {
        Self { client, config }
    }

    fn build_payload<'a>(&'a self, request: &'a ConversionRequest) -> EventsRequest<'a> {
        let user_data = UserData {
            fbc: Some(request.click_id.as_str()).filter(|c| !c.trim().is_empty() && *c != "-"),
            ph: request.hashed_phone().map(|h| vec![h]),
            em: request.hashed_email().map(|h| vec![h]),
        };

        EventsRequest {
            data: vec![ServerEvent {
                event_name: &self.config.event_name,
                event_time: request.conversion_time.timestamp(),
                action_source: "other",
                user_data,
            }],
            access_token: &self.config.access_token,
        }
    }

    async fn send(&self, request: &ConversionRequest) -> Result<EventsResponse> {
        let url = format!("{}/{}/events", self.config.api_base.trim_end_matches('/'), self.config.pixel_id);
        let response = self
            .client
            .post(url)
            .json(&self.build_payload(request))
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ConversionUploader for MetaUploader {
    fn provider(&self) -> &'static str {
        "meta"
    }

    #[instrument(name = "meta_upload", skip_all, fields(lead_id = %request.lead_id))]
    async fn upload(&self, request: &ConversionRequest) -> UploadOutcome {
        if !self.config.is_configured() {
            info!("Meta credentials not configured");
            return UploadOutcome::Skipped("Meta credentials not configured".to_string());
        }

        match self.send(request).await {
            Ok(response) if response.events_received > 0 => {
                info!(events_received = response.events_received, "Meta conversion sent");
                UploadOutcome::Sent
            },
            Ok(_) => {
                warn!("Meta response reported no events received");
                UploadOutcome::Failed("no events received".to_string())
            },
            Err(e) => {
                warn!(error = %e, "Meta API error");
                UploadOutcome::Failed(e.to_string())
            },
        }
    }
}
