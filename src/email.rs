//! Email dispatch via a webhook relay.
//!
//! The relay receives `{ email, subject, body }` and owns actual delivery.
//! Two modes:
//! 1. POST to the configured webhook URL
//! 2. Disabled (no URL configured; log only)
//!
//! Lifecycle operations treat every send as best-effort: failures are
//! logged at the call site and never fail the operation that triggered
//! the email.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::LicenseKey;

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// The relay webhook accepted the payload
    Sent,
    /// No webhook URL configured; nothing was sent
    Disabled,
}

/// Payload POSTed to the relay webhook.
#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    email: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Clone)]
pub struct EmailService {
    /// Relay webhook URL (from ENV); None disables email entirely
    webhook_url: Option<String>,
    /// Advertised sender, included in rendered footers
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(webhook_url: Option<String>, from_email: String) -> Self {
        Self {
            webhook_url,
            from_email,
            http_client: Client::new(),
        }
    }

    /// POST a fully-rendered email to the relay. One attempt, no retries.
    pub async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<EmailSendResult> {
        let Some(ref url) = self.webhook_url else {
            tracing::debug!(to = %to, "email relay not configured, skipping send");
            return Ok(EmailSendResult::Disabled);
        };

        let response = self
            .http_client
            .post(url)
            .json(&RelayPayload {
                email: to,
                subject,
                body: html_body,
            })
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Email(format!(
                "relay webhook returned {}",
                response.status()
            )));
        }

        tracing::info!(to = %to, subject = %subject, "email relayed");
        Ok(EmailSendResult::Sent)
    }

    /// Send, downgrading any failure to a log line. Used by lifecycle
    /// operations whose success was already determined by the primary write.
    pub async fn send_best_effort(&self, to: &str, subject: &str, html_body: &str) {
        if let Err(e) = self.send(to, subject, html_body).await {
            tracing::warn!(to = %to, "best-effort email failed: {e}");
        }
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }
}

fn enabled_features_line(key: &LicenseKey) -> String {
    let labels = key.features.enabled_labels();
    if labels.is_empty() {
        "None".to_string()
    } else {
        labels.join(", ")
    }
}

fn expiry_line(key: &LicenseKey) -> String {
    match key.expires_at {
        Some(ts) => format_date(ts),
        None => "Never (Subscribed)".to_string(),
    }
}

/// Render the trial/welcome email for a single key.
pub fn trial_key_email(key: &LicenseKey) -> (String, String) {
    let subject = "Your license key is here".to_string();
    let greeting = match key.full_name {
        Some(ref name) => format!("Hello {name},"),
        None => "Hello,".to_string(),
    };
    let trial_note = if key.is_trial {
        "<p><strong>Note:</strong> this is a trial license key. If you need to \
         extend your trial or have any questions, contact our sales team.</p>"
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h1>Your license key is ready</h1>
  <p>{greeting}</p>
  <p>Thank you for your interest! Your license key:</p>
  <p><code style="display: block; background: #f5f5f5; padding: 15px; font-size: 18px; font-weight: bold;">{key}</code></p>
  <h3>{kind} details</h3>
  <ul>
    <li><strong>Key type:</strong> {key_type}</li>
    <li><strong>Valid until:</strong> {expiry}</li>
    <li><strong>Enabled features:</strong> {features}</li>
  </ul>
  <h3>Activation</h3>
  <p>Add the key to your instance configuration:</p>
  <code style="display: block; background: #f5f5f5; padding: 10px;">LICENSE_KEY={key}</code>
  <p>then restart the instance.</p>
  {trial_note}
</body>
</html>"#,
        greeting = greeting,
        key = key.key,
        kind = if key.is_trial { "Trial" } else { "License" },
        key_type = key.key_type.as_ref().to_uppercase(),
        expiry = expiry_line(key),
        features = enabled_features_line(key),
        trial_note = trial_note,
    );

    (subject, html)
}

/// Render the deal-closed email carrying both the development and the
/// production key.
pub fn deal_closed_email(
    development: &LicenseKey,
    production: &LicenseKey,
    active_flows: i64,
) -> (String, String) {
    let subject = "Welcome aboard - your production license".to_string();
    let greeting = match production.full_name {
        Some(ref name) => format!("Hello {name},"),
        None => "Hello,".to_string(),
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h1>Welcome aboard!</h1>
  <p>{greeting}</p>
  <p>Your deal is closed and your keys are ready.</p>
  <h3>Production key (live use)</h3>
  <p><code style="display: block; background: #f5f5f5; padding: 15px; font-weight: bold;">{production}</code></p>
  <h3>Development key (pre-production and testing)</h3>
  <p><code style="display: block; background: #f5f5f5; padding: 15px; font-weight: bold;">{development}</code></p>
  <ul>
    <li><strong>Active flows limit:</strong> {active_flows}</li>
    <li><strong>Validity:</strong> no expiry</li>
    <li><strong>Enabled features:</strong> {features}</li>
  </ul>
</body>
</html>"#,
        greeting = greeting,
        production = production.key,
        development = development.key,
        active_flows = active_flows,
        features = enabled_features_line(production),
    );

    (subject, html)
}
