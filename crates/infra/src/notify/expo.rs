use async_trait::async_trait;
use serde_json::json;

use super::{NotificationGateway, NotifyError};

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo push gateway — the transport the mobile client registers tokens for.
#[derive(Debug, Clone)]
pub struct ExpoPushGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushGateway {
    pub fn new() -> Self {
        Self::with_endpoint(EXPO_PUSH_URL)
    }

    /// Point at a different endpoint (tests, self-hosted relay).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for ExpoPushGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for ExpoPushGateway {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "to": token,
            "sound": "default",
            "title": title,
            "body": body,
            "data": data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {text}")));
        }

        Ok(())
    }
}
