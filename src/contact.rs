// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact form validation and dispatch.
//!
//! Implements the business side of the contact endpoint:
//! - Required field presence (name, email, message)
//! - Length limits
//! - Email shape check
//! - Honeypot field rejection
//!
//! Delivery goes through the [`Mailer`] trait so the email provider stays
//! outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SUBJECT_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_MESSAGE_LEN: usize = 10;
pub const MAX_MESSAGE_LEN: usize = 5000;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Message must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Submission rejected")]
    HoneypotFilled,
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Submission is valid
    Valid,
    /// Submission is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }
}

/// Contact form payload as submitted by the site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Hidden field; humans leave it empty
    #[serde(default)]
    pub website: Option<String>,
}

/// A validated message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub client_ip: String,
    pub received_at: DateTime<Utc>,
}

impl ContactMessage {
    /// Build a message from a form that passed [`ContactValidator::validate`].
    pub fn from_form(form: &ContactForm, client_ip: &str) -> Self {
        let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();
        Self {
            name: trimmed(&form.name),
            email: trimmed(&form.email),
            subject: form
                .subject
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            message: trimmed(&form.message),
            client_ip: client_ip.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// Contact form validator.
#[derive(Debug, Clone, Default)]
pub struct ContactValidator;

impl ContactValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a complete contact submission.
    pub fn validate(&self, form: &ContactForm) -> ValidationResult {
        if form.website.as_deref().is_some_and(|w| !w.trim().is_empty()) {
            debug!("Honeypot field filled");
            return ValidationResult::Invalid(ValidationError::HoneypotFilled);
        }

        let name = match required(&form.name, "name") {
            Ok(name) => name,
            Err(e) => return ValidationResult::Invalid(e),
        };
        if name.chars().count() > MAX_NAME_LEN {
            return ValidationResult::Invalid(ValidationError::TooLong {
                field: "name",
                max: MAX_NAME_LEN,
            });
        }

        let email = match required(&form.email, "email") {
            Ok(email) => email,
            Err(e) => return ValidationResult::Invalid(e),
        };
        if !is_plausible_email(email) {
            debug!("Invalid email address");
            return ValidationResult::Invalid(ValidationError::InvalidEmail);
        }

        if let Some(subject) = form.subject.as_deref() {
            if subject.trim().chars().count() > MAX_SUBJECT_LEN {
                return ValidationResult::Invalid(ValidationError::TooLong {
                    field: "subject",
                    max: MAX_SUBJECT_LEN,
                });
            }
        }

        let message = match required(&form.message, "message") {
            Ok(message) => message,
            Err(e) => return ValidationResult::Invalid(e),
        };
        let len = message.chars().count();
        if len < MIN_MESSAGE_LEN {
            return ValidationResult::Invalid(ValidationError::TooShort {
                min: MIN_MESSAGE_LEN,
            });
        }
        if len > MAX_MESSAGE_LEN {
            return ValidationResult::Invalid(ValidationError::TooLong {
                field: "message",
                max: MAX_MESSAGE_LEN,
            });
        }

        ValidationResult::Valid
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => {
            debug!(field, "Missing contact field");
            Err(ValidationError::MissingField(field))
        }
    }
}

/// Shape check only; deliverability is the mail provider's problem.
fn is_plausible_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport unavailable: {0}")]
    Transport(String),

    #[error("Mail rejected by provider: {0}")]
    Rejected(String),
}

/// Delivers validated contact messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &ContactMessage) -> Result<(), MailError>;
}

/// Mailer that records deliveries in the service log.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &ContactMessage) -> Result<(), MailError> {
        info!(
            from = %message.email,
            subject = ?message.subject,
            client_ip = %message.client_ip,
            length = message.message.len(),
            "Contact message dispatched"
        );
        Ok(())
    }
}
