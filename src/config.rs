use anyhow::Result;
use chrono::FixedOffset;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sheet: SheetConfig,
    pub notifications: NotificationConfig,
    pub google_ads: GoogleAdsConfig,
    pub meta: MetaConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    pub name: String,
    pub link: String,
    /// Offset applied to lead timestamps, e.g. "+04:00"
    pub utc_offset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Comma-separated recipient addresses
    pub recipients: String,
    pub subject_prefix: String,
    /// Mail relay endpoint; empty means log-only delivery
    pub mail_endpoint: String,
    pub mail_token: String,
    /// Interval for the change notifier poll; 0 disables it
    pub change_poll_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAdsConfig {
    pub customer_id: String,
    pub conversion_action: String,
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base: String,
    pub token_url: String,
    pub currency_code: String,
    pub conversion_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub pixel_id: String,
    pub access_token: String,
    pub api_base: String,
    pub event_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:8080".to_string(),
                max_body_bytes: 64 * 1024,
                service_name: "City Doctor ChatBot".to_string(),
            },
            database: DatabaseConfig {
                url: "data/leads.db".to_string(),
                max_connections: 10,
            },
            sheet: SheetConfig {
                name: "ChatBot".to_string(),
                link: String::new(),
                utc_offset: "+04:00".to_string(),
            },
            notifications: NotificationConfig {
                recipients: String::new(),
                subject_prefix: "City Doctor".to_string(),
                mail_endpoint: String::new(),
                mail_token: String::new(),
                change_poll_secs: 0,
            },
            google_ads: GoogleAdsConfig {
                customer_id: String::new(),
                conversion_action: String::new(),
                developer_token: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                refresh_token: String::new(),
                api_base: "https://googleads.googleapis.com/v16".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                currency_code: "AED".to_string(),
                conversion_value: 1.0,
            },
            meta: MetaConfig {
                pixel_id: String::new(),
                access_token: String::new(),
                api_base: "https://graph.facebook.com/v19.0".to_string(),
                event_name: "QualifiedLead".to_string(),
            },
            http: HttpConfig { timeout_secs: 30 },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration, optionally layering an explicit file on top of the defaults
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(
                Config::try_from(&AppConfig::default())
                    .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?,
            )
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("LEAD_INTAKE").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid bind_addr {}: {}", self.server.bind_addr, e))?;
        if self.server.max_body_bytes == 0 {
            return Err(anyhow::anyhow!("max_body_bytes must be greater than 0"));
        }

        // Validate database config
        InputValidator::validate_database_url(&self.database.url)?;
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be greater than 0"));
        }

        // Validate sheet config
        if self.sheet.name.trim().is_empty() {
            return Err(anyhow::anyhow!("sheet name cannot be empty"));
        }
        self.sheet.offset()?;

        if self.http.timeout_secs == 0 {
            return Err(anyhow::anyhow!("timeout_secs must be greater than 0"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

impl SheetConfig {
    /// Parse the configured `±HH:MM` offset
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

impl NotificationConfig {
    /// Recipients that look like deliverable addresses
    pub fn recipient_list(&self) -> Vec<String> {
        self.recipients
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .filter(|r| match InputValidator::validate_email(r) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(recipient = %r, error = %e, "Ignoring invalid notification recipient");
                    false
                },
            })
            .map(ToString::to_string)
            .collect()
    }
}

impl GoogleAdsConfig {
    /// Customer, conversion action and developer token are all set
    pub fn is_configured(&self) -> bool {
        !self.customer_id.is_empty() && !self.conversion_action.is_empty() && !self.developer_token.is_empty()
    }

    /// OAuth client credentials and refresh token are all set
    pub fn has_oauth_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.refresh_token.is_empty()
    }
}

impl MetaConfig {
    pub fn is_configured(&self) -> bool {
        !self.pixel_id.is_empty() && !self.access_token.is_empty()
    }
}

/// Parse a `±HH:MM` string into a fixed offset
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let offset: FixedOffset = raw
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid utc_offset {raw:?}: expected ±HH:MM ({e})"))?;
    if offset.local_minus_utc().abs() > 14 * 3600 {
        return Err(anyhow::anyhow!("Invalid utc_offset {raw:?}: out of range"));
    }
    Ok(offset)
}
