//! Discord HTTP API client.

use async_trait::async_trait;
use lucie_domain::ChannelId;
use reqwest::{header::AUTHORIZATION, Client};
use std::time::Duration;

use super::model::CreateMessage;
use crate::infrastructure::ports::{ChatError, ChatPort};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends replies through `POST /channels/{id}/messages`.
#[derive(Clone)]
pub struct DiscordRest {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordRest {
    pub fn new(api_base: &str, token: &str) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Request(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl ChatPort for DiscordRest {
    async fn send_message(&self, channel_id: &ChannelId, content: &str) -> Result<(), ChatError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .json(&CreateMessage { content })
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), channel = %channel_id, "Message rejected");
            return Err(ChatError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(channel = %channel_id, "Message sent");
        Ok(())
    }
}
