//! Transactional email as a consumed capability.
//!
//! The engine only knows "deliver this template to this address and tell me
//! whether it worked". `Sender::Disabled` keeps local and CI environments
//! honest: it logs the skip and reports success so dispatch accounting stays
//! exercised without a provider account.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    VitalAlert,
    EmergencyAlert,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VitalAlert => "vital_alert",
            Self::EmergencyAlert => "emergency_alert",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub template: EmailTemplate,
    pub to: String,
    pub subject: String,
    pub fields: Value,
}

#[derive(Debug, Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub String);

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// Provider-API sender over plain HTTP: POST the rendered request to the
/// configured endpoint with a bearer key.
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailSender {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, from_address: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from_address,
        }
    }
}

pub enum Sender {
    Disabled,
    Http(HttpEmailSender),
}

#[async_trait]
impl EmailSender for Sender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        match self {
            Sender::Disabled => {
                tracing::warn!(
                    to = %email.to,
                    subject = %email.subject,
                    template = email.template.as_str(),
                    "skipping email (sender disabled)"
                );
                Ok(())
            }
            Sender::Http(http) => {
                let body = serde_json::json!({
                    "from": http.from_address,
                    "to": email.to,
                    "subject": email.subject,
                    "template": email.template.as_str(),
                    "fields": email.fields,
                });
                let response = http
                    .client
                    .post(&http.api_url)
                    .bearer_auth(&http.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|err| EmailError(err.to_string()))?;

                if response.status().is_success() {
                    tracing::debug!(to = %email.to, "email accepted by provider");
                    Ok(())
                } else {
                    Err(EmailError(format!(
                        "provider returned {}",
                        response.status()
                    )))
                }
            }
        }
    }
}
