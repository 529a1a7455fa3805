//! Messaging gateway seam and the Twilio REST implementation used in
//! production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Rejected(String),

    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected gateway response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Submits one message and returns the gateway-assigned message id.
    async fn submit(&self, from: &str, body: &str, to: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: String,
}

pub struct TwilioGateway {
    client: Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
}

impl TwilioGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            api_base: config.api_base.clone(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl MessagingGateway for TwilioGateway {
    async fn submit(&self, from: &str, body: &str, to: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            let message: MessageResource = serde_json::from_str(&text)?;
            debug!(sid = %message.sid, "gateway accepted message");
            return Ok(message.sid);
        }

        let reason = match serde_json::from_str::<ApiError>(&text) {
            Ok(ApiError {
                code: Some(code),
                message,
            }) => format!("{message} (code {code})"),
            Ok(ApiError { message, .. }) => message,
            Err(_) => format!("gateway returned {status}"),
        };
        Err(GatewayError::Rejected(reason))
    }
}
