use anyhow::{anyhow, Result};

/// Sentinel stored for absent optional fields
pub const EMPTY_SENTINEL: &str = "-";

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate email format
    pub fn validate_email(email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(anyhow!("Email cannot be empty"));
        }

        if email.len() > 254 {
            return Err(anyhow!("Email too long (max 254 characters)"));
        }

        // An address must have something before the @
        match email.find('@') {
            None => return Err(anyhow!("Email must contain @ symbol")),
            Some(0) => return Err(anyhow!("Email local part invalid")),
            Some(_) => {},
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(anyhow!("Email must have exactly one @ symbol"));
        }

        let local_part = parts[0];
        let domain_part = parts[1];

        if local_part.len() > 64 {
            return Err(anyhow!("Email local part invalid"));
        }

        if domain_part.is_empty() || !domain_part.contains('.') {
            return Err(anyhow!("Email domain invalid"));
        }

        Ok(())
    }

    /// Validate a lead id supplied by a client
    pub fn validate_lead_id(lead_id: &str) -> Result<()> {
        if lead_id.trim().is_empty() {
            return Err(anyhow!("Lead ID cannot be empty"));
        }

        if lead_id.len() > 100 {
            return Err(anyhow!("Lead ID too long (max 100 characters)"));
        }

        if lead_id.contains('\0') || lead_id.contains('\r') || lead_id.contains('\n') {
            return Err(anyhow!("Lead ID contains invalid characters"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Normalize an optional submitted field to its stored form.
    ///
    /// Absent, empty and whitespace-only values become [`EMPTY_SENTINEL`].
    #[must_use]
    pub fn field_or_sentinel(value: Option<&str>) -> String {
        match value.map(Self::sanitize_text) {
            Some(s) if !s.is_empty() => s,
            _ => EMPTY_SENTINEL.to_string(),
        }
    }

    /// True when a stored cell carries a real value rather than the sentinel
    #[must_use]
    pub fn is_present(value: &str) -> bool {
        let trimmed = value.trim();
        !trimmed.is_empty() && trimmed != EMPTY_SENTINEL
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Database URL too long"));
        }

        Ok(())
    }
}
