use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.resend.com";

/// One message as the provider API expects it. A `scheduled_at` asks the
/// provider to hold the message until then.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Returns the provider-assigned message id.
    async fn send(&self, email: &OutboundEmail) -> Result<String>;

    /// Cancels a scheduled message that has not left yet.
    async fn cancel(&self, provider_email_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
    name: Option<String>,
}

/// Client for the Resend transactional email API.
pub struct ResendClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ResendClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, DEFAULT_API_BASE, Duration::from_secs(30))
    }

    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn error_from(response: reqwest::Response) -> Error {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ProviderErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.name))
            .unwrap_or(text);
        Error::EmailProvider(format!("{}: {}", status.as_u16(), detail))
    }
}

#[async_trait]
impl EmailProvider for ResendClient {
    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| Error::EmailProvider(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::EmailProvider(format!("unexpected response: {}", e)))?;
        Ok(body.id)
    }

    async fn cancel(&self, provider_email_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/emails/{}/cancel", self.base_url, provider_email_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::EmailProvider(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

/// Provider that never leaves the process. Messages land in an outbox that
/// can be inspected; used for local runs and tests.
#[derive(Default)]
pub struct DryRunProvider {
    outbox: Mutex<Vec<(String, OutboundEmail)>>,
    cancelled: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    fail_cancels: AtomicBool,
}

impl DryRunProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> Vec<(String, OutboundEmail)> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Makes subsequent sends fail, to exercise upstream error paths.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailProvider for DryRunProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::EmailProvider("dry-run send failure".into()));
        }
        let id = format!("dry-run-{}", Uuid::new_v4());
        info!(
            email_id = %id,
            to = ?email.to,
            subject = %email.subject,
            scheduled_at = ?email.scheduled_at,
            "dry-run email accepted"
        );
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push((id.clone(), email.clone()));
        }
        Ok(id)
    }

    async fn cancel(&self, provider_email_id: &str) -> Result<()> {
        if self.fail_cancels.load(Ordering::SeqCst) {
            warn!(email_id = %provider_email_id, "dry-run cancel failure");
            return Err(Error::EmailProvider("dry-run cancel failure".into()));
        }
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(provider_email_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_sends_omit_schedule_fields() {
        let email = OutboundEmail {
            from: "CFP <cfp@example.com>".into(),
            to: vec!["ada@example.com".into()],
            reply_to: None,
            subject: "Hello".into(),
            html: "<p>Hi</p>".into(),
            scheduled_at: None,
        };
        let json = serde_json::to_value(&email).unwrap();
        assert!(json.get("scheduled_at").is_none());
        assert!(json.get("reply_to").is_none());
        assert_eq!(json["to"][0], "ada@example.com");
    }

    #[tokio::test]
    async fn dry_run_records_and_can_fail() {
        let provider = DryRunProvider::new();
        let email = OutboundEmail {
            from: "cfp@example.com".into(),
            to: vec!["ada@example.com".into()],
            reply_to: None,
            subject: "s".into(),
            html: "h".into(),
            scheduled_at: None,
        };
        let id = provider.send(&email).await.unwrap();
        provider.cancel(&id).await.unwrap();
        assert_eq!(provider.outbox().len(), 1);
        assert_eq!(provider.cancelled(), vec![id]);

        provider.set_fail_sends(true);
        assert!(provider.send(&email).await.is_err());
        assert_eq!(provider.outbox().len(), 1);
    }
}
