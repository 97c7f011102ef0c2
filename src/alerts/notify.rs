//! Notification delivery
//!
//! The relay server owns all provider credentials (Twilio, WhatsApp Cloud
//! API, Gmail); this side only posts to its HTTP surface. The `Notifier`
//! trait is the seam that lets the sweep and report tools run against a fake
//! in tests, or against a log-only stub when no relay is configured.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::models::{Caregiver, NotificationType};

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay rejected the send: {0}")]
    Rejected(String),

    #[error("Caregiver {0} has no contact address for their channel")]
    NoContact(String),
}

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a missed-dose alert to one caregiver
    async fn send_alert(
        &self,
        caregiver: &Caregiver,
        medicine_name: &str,
        dosage: &str,
        scheduled_time: &str,
    ) -> Result<(), NotifyError>;

    /// Send a longer report (weekly adherence) to one caregiver
    async fn send_report(
        &self,
        caregiver: &Caregiver,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

/// HTTP client for the notification relay
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Build from MEDTRACK_RELAY_URL, if set
    pub fn from_env() -> Option<Self> {
        std::env::var("MEDTRACK_RELAY_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .map(Self::new)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), NotifyError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, detail)));
        }
        Ok(())
    }
}

fn alert_message(medicine_name: &str, dosage: &str, scheduled_time: &str) -> String {
    format!(
        "Medication reminder: {} ({}) scheduled for {} has not been taken yet.",
        medicine_name, dosage, scheduled_time
    )
}

#[async_trait]
impl Notifier for RelayClient {
    async fn send_alert(
        &self,
        caregiver: &Caregiver,
        medicine_name: &str,
        dosage: &str,
        scheduled_time: &str,
    ) -> Result<(), NotifyError> {
        let contact = caregiver
            .contact()
            .ok_or_else(|| NotifyError::NoContact(caregiver.name.clone()))?;
        let message = alert_message(medicine_name, dosage, scheduled_time);

        match caregiver.notification_type {
            NotificationType::Email => {
                self.post(
                    "/api/send-email",
                    json!({
                        "to": contact,
                        "subject": format!("Missed medication: {}", medicine_name),
                        "text": message,
                    }),
                )
                .await
            }
            NotificationType::Sms | NotificationType::Whatsapp => {
                self.post(
                    "/api/send-notification",
                    json!({
                        "to": contact,
                        "message": message,
                        "channel": caregiver.notification_type.as_str(),
                    }),
                )
                .await
            }
        }
    }

    async fn send_report(
        &self,
        caregiver: &Caregiver,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let contact = caregiver
            .contact()
            .ok_or_else(|| NotifyError::NoContact(caregiver.name.clone()))?;

        match caregiver.notification_type {
            NotificationType::Email => {
                self.post(
                    "/api/send-email",
                    json!({ "to": contact, "subject": subject, "text": body }),
                )
                .await
            }
            NotificationType::Sms | NotificationType::Whatsapp => {
                self.post(
                    "/api/send-notification",
                    json!({
                        "to": contact,
                        "message": format!("{}\n\n{}", subject, body),
                        "channel": caregiver.notification_type.as_str(),
                    }),
                )
                .await
            }
        }
    }
}

/// Stand-in notifier for when no relay is configured: logs the would-be send
/// and reports success, so the sweep still records alerts and misses.
pub struct LogOnlyNotifier;

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send_alert(
        &self,
        caregiver: &Caregiver,
        medicine_name: &str,
        dosage: &str,
        scheduled_time: &str,
    ) -> Result<(), NotifyError> {
        info!(
            caregiver = %caregiver.name,
            medicine = %medicine_name,
            "alert (relay disabled): {}",
            alert_message(medicine_name, dosage, scheduled_time)
        );
        Ok(())
    }

    async fn send_report(
        &self,
        caregiver: &Caregiver,
        subject: &str,
        _body: &str,
    ) -> Result<(), NotifyError> {
        info!(caregiver = %caregiver.name, subject = %subject, "report (relay disabled)");
        Ok(())
    }
}
