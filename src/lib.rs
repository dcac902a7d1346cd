//! Lead Intake - Webhook, Deduplication and Conversion Relay
//!
//! A Rust service that receives lead submissions from landing pages and
//! chat widgets, stores them in a sheet-shaped SQLite table, and reports
//! qualified leads back to the ad platforms.
//!
//! # Features
//!
//! - JSON, form-encoded and query-string submissions
//! - Phone-based deduplication backed by a unique index
//! - Email notification on new leads and on sheet growth
//! - Google Ads and Meta offline conversion uploads
//! - Layered configuration and structured logging

/// Sheet-growth notifications
pub mod change_notifier;
/// Configuration management
pub mod config;
/// Offline conversion uploaders
pub mod conversions;
/// Database operations and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Webhook request handling
pub mod intake;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Email composition and delivery
pub mod notifier;
/// Status-change relay
pub mod relay;
/// Repository pattern for data access
pub mod repository;
/// Database schema definitions
pub mod schema;
/// HTTP routing and server startup
pub mod server;
/// Phone, id and timestamp helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use config::AppConfig;
pub use db::Database;
pub use error::{LeadIntakeError, Result};
pub use intake::LeadIntake;
pub use models::{Lead, LeadSubmission, NewLead, SheetEdit, WebhookResponse};
pub use relay::StatusRelay;
pub use repository::{LeadRepository, SqliteLeadRepository};
