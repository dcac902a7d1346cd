use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{format_conversion_time, ConversionRequest, ConversionUploader, UploadOutcome};
use crate::config::GoogleAdsConfig;
use crate::error::Result;

/// Uploads click conversions through the Google Ads API
#[derive(Clone)]
pub struct GoogleAdsUploader {
    client: Client,
    config: GoogleAdsConfig,
}

#[derive(Debug, Serialize)]
struct UploadClickConversionsRequest<'a> {
    conversions: Vec<ClickConversion<'a>>,
    partial_failure: bool,
}

#[derive(Debug, Serialize)]
struct ClickConversion<'a> {
    gclid: &'a str,
    conversion_action: &'a str,
    conversion_date_time: String,
    conversion_value: f64,
    currency_code: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    user_identifiers: Vec<UserIdentifier>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum UserIdentifier {
    HashedPhoneNumber(String),
    HashedEmail(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

impl GoogleAdsUploader {
    pub fn new(client: Client, config: GoogleAdsConfig) -> Self {
        Self { client, config }
    }

    /// Exchange the refresh token for a fresh access token (not cached)
    async fn access_token(&self) -> Result<Option<String>> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response: TokenResponse = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;
        Ok(response.access_token.filter(|t| !t.is_empty()))
    }

    fn build_payload<'a>(&'a self, request: &'a ConversionRequest) -> UploadClickConversionsRequest<'a> {
        let mut user_identifiers = Vec::new();
        if let Some(phone) = request.hashed_phone() {
            user_identifiers.push(UserIdentifier::HashedPhoneNumber(phone));
        }
        if let Some(email) = request.hashed_email() {
            user_identifiers.push(UserIdentifier::HashedEmail(email));
        }

        UploadClickConversionsRequest {
            conversions: vec![ClickConversion {
                gclid: &request.click_id,
                conversion_action: &self.config.conversion_action,
                conversion_date_time: format_conversion_time(&request.conversion_time),
                conversion_value: self.config.conversion_value,
                currency_code: &self.config.currency_code,
                user_identifiers,
            }],
            partial_failure: true,
        }
    }

    async fn send(&self, request: &ConversionRequest, access_token: &str) -> Result<UploadResponse> {
        let url = format!(
            "{}/customers/{}:uploadClickConversions",
            self.config.api_base.trim_end_matches('/'),
            self.config.customer_id
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header("developer-token", &self.config.developer_token)
            .json(&self.build_payload(request))
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ConversionUploader for GoogleAdsUploader {
    fn provider(&self) -> &'static str {
        "google_ads"
    }

    #[instrument(name = "google_ads_upload", skip_all, fields(lead_id = %request.lead_id))]
    async fn upload(&self, request: &ConversionRequest) -> UploadOutcome {
        if !self.config.is_configured() {
            info!("Google Ads credentials not configured");
            return UploadOutcome::Skipped("Google Ads credentials not configured".to_string());
        }
        if !self.config.has_oauth_credentials() {
            info!("Google Ads OAuth credentials not configured");
            return UploadOutcome::Skipped("Google Ads OAuth credentials not configured".to_string());
        }

        let access_token = match self.access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("Token endpoint returned no access_token");
                return UploadOutcome::Failed("token response missing access_token".to_string());
            },
            Err(e) => {
                warn!(error = %e, "Error getting Google Ads access token");
                return UploadOutcome::Failed(format!("access token request failed: {e}"));
            },
        };

        match self.send(request, &access_token).await {
            Ok(response) if !response.results.is_empty() => {
                info!("Google Ads conversion sent");
                UploadOutcome::Sent
            },
            Ok(_) => {
                warn!("Google Ads response contained no results");
                UploadOutcome::Failed("response contained no results".to_string())
            },
            Err(e) => {
                warn!(error = %e, "Google Ads API error");
                UploadOutcome::Failed(e.to_string())
            },
        }
    }
}
