use crate::core::membership::{MembershipError, NotificationSink, RemoteService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

pub const DEFAULT_USERNAME: &str = "Checkout Monitor Bot";
pub const DEFAULT_ICON_EMOJI: &str = ":key:";

/// Slack answers 200 for most failures and reports them in the body.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackResponse {
    fn into_result(self) -> Result<(), MembershipError> {
        if self.ok {
            Ok(())
        } else {
            Err(MembershipError::remote(
                RemoteService::Notification,
                self.error.unwrap_or_else(|| "unknown Slack error".to_string()),
            ))
        }
    }
}

/// Posts alerts to one Slack channel under a fixed bot name and icon.
pub struct SlackNotifier {
    client: Client,
    api_url: String,
    token: String,
    channel_id: String,
    username: String,
    icon_emoji: String,
}

impl SlackNotifier {
    pub fn new(client: Client, token: String, channel_id: String) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            token,
            channel_id,
            username: DEFAULT_USERNAME.to_string(),
            icon_emoji: DEFAULT_ICON_EMOJI.to_string(),
        }
    }

    pub fn with_identity(mut self, username: String, icon_emoji: String) -> Self {
        self.username = username;
        self.icon_emoji = icon_emoji;
        self
    }

    /// Sends to another Web API root instead of `https://slack.com/api`.
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    fn payload(&self, message: &str) -> serde_json::Value {
        json!({
            "channel": self.channel_id,
            "text": message,
            "username": self.username,
            "icon_emoji": self.icon_emoji,
        })
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<(), MembershipError> {
        let remote =
            |e: reqwest::Error| MembershipError::remote(RemoteService::Notification, e.to_string());

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(remote)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MembershipError::remote(
                RemoteService::Notification,
                format!("Slack API error: {} - {}", status, text),
            ));
        }

        let body: SlackResponse = response.json().await.map_err(remote)?;
        body.into_result()?;

        tracing::debug!("Sent Slack alert to {}", self.channel_id);
        Ok(())
    }
}
