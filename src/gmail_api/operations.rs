use crate::error::{Error, Result};
use crate::types::{EncodedEnvelope, SentReceipt};
use async_trait::async_trait;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Gmail's alias for the account the token belongs to.
pub const ME: &str = "me";

// Define a trait for the send call to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_message(&self, user_id: &str, envelope: &EncodedEnvelope)
        -> Result<SentReceipt>;
}

/// HTTP client bound to one bearer token for the Gmail API.
pub struct AuthorizedClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl AuthorizedClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Send email using Gmail API
#[async_trait]
impl MailTransport for AuthorizedClient {
    async fn send_message(
        &self,
        user_id: &str,
        envelope: &EncodedEnvelope,
    ) -> Result<SentReceipt> {
        let send_url = format!(
            "{}/gmail/v1/users/{}/messages/send",
            self.base_url, user_id
        );

        let response = self
            .client
            .post(&send_url)
            .bearer_auth(&self.token)
            .json(envelope)
            .send()
            .await
            .map_err(|e| Error::send(e.to_string()))?;

        if response.status().is_success() {
            let receipt: SentReceipt = response
                .json()
                .await
                .map_err(|e| Error::send(format!("unexpected response: {}", e)))?;
            tracing::info!(message_id = %receipt.id, "Email sent via Gmail API");
            Ok(receipt)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(Error::send(format!("{}: {}", status, error_text)))
        }
    }
}
