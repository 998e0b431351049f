//! Outbound push notifications.
//!
//! The booking pipeline treats notification as a post-commit side effect:
//! committed first, then sent from a spawned task whose failure is logged
//! and swallowed. Nothing here can roll a booking back.

mod expo;
mod recording;

pub use expo::ExpoPushGateway;
pub use recording::{RecordingGateway, SentPush};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Push delivery error. Logged, never propagated to booking callers.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("push transport failure: {0}")]
    Transport(String),

    #[error("push endpoint rejected the message: {0}")]
    Rejected(String),
}

/// Delivery seam for push messages to a single device token.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// A push message prepared inside a transaction, sent after commit.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Fire-and-forget delivery on a spawned task (lossy; no backpressure on the
/// booking pipeline).
pub fn spawn_best_effort(gateway: Arc<dyn NotificationGateway>, message: PushMessage) {
    tokio::spawn(async move {
        if let Err(e) = gateway
            .send(&message.token, &message.title, &message.body, message.data)
            .await
        {
            tracing::warn!(error = %e, title = %message.title, "push notification failed");
        }
    });
}
