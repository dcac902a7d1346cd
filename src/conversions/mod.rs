//! Offline conversion uploads to ad platforms.
//!
//! Each provider is a [`ConversionUploader`]. Uploads never return errors:
//! every failure is folded into an [`UploadOutcome`] so the relay can decide
//! what to record without aborting the other provider.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::utils::{normalize_phone, sha256_hex};
use crate::validation::InputValidator;

pub mod google_ads;
pub mod meta;

pub use google_ads::GoogleAdsUploader;
pub use meta::MetaUploader;

/// Everything a provider needs to report one qualified lead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub lead_id: String,
    /// gclid or fbclid, depending on the provider
    pub click_id: String,
    pub conversion_time: DateTime<FixedOffset>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ConversionRequest {
    /// SHA-256 of the phone digits, when a phone is present
    #[must_use]
    pub fn hashed_phone(&self) -> Option<String> {
        self.phone
            .as_deref()
            .filter(|p| InputValidator::is_present(p))
            .map(|p| sha256_hex(&normalize_phone(p)))
    }

    /// SHA-256 of the trimmed, lower-cased email, when present
    #[must_use]
    pub fn hashed_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .filter(|e| InputValidator::is_present(e))
            .map(|e| sha256_hex(&e.trim().to_lowercase()))
    }
}

/// Result of one provider upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Provider accepted the conversion
    Sent,
    /// Upload not attempted (missing credentials or click id)
    Skipped(String),
    /// Upload attempted and rejected, or the call failed
    Failed(String),
}

impl UploadOutcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Short label for logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// One ad platform that accepts offline conversions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversionUploader: Send + Sync {
    /// Stable provider name used in logs and metrics
    fn provider(&self) -> &'static str;

    async fn upload(&self, request: &ConversionRequest) -> UploadOutcome;
}

/// `YYYY-MM-DD HH:MM:SS±HH:MM` in the timestamp's own offset
#[must_use]
pub fn format_conversion_time(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}
