use std::sync::Mutex;

use async_trait::async_trait;

use super::{NotificationGateway, NotifyError};

/// A push captured by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPush {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// Recording gateway for tests/dev: captures every push instead of sending.
///
/// With `failing`, it still records but reports delivery failure, which lets
/// tests assert that notification failures never surface to booking callers.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentPush>>,
    failing: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().expect("gateway lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        _data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("gateway lock poisoned")
            .push(SentPush {
                token: token.to_string(),
                title: title.to_string(),
                body: body.to_string(),
            });

        if self.failing {
            return Err(NotifyError::Transport("simulated delivery failure".into()));
        }
        Ok(())
    }
}
