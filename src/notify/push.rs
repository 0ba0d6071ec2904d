use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::message::Channel;
use crate::models::user::User;
use crate::notify::{ChannelSender, Notification, NotifyError};

/// Posts notifications to an external push delivery service.
#[derive(Clone)]
pub struct HttpPushSender {
    endpoint: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    user_id: String,
    title: &'a str,
    body: &'a str,
}

impl HttpPushSender {
    pub fn new(endpoint: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl ChannelSender for HttpPushSender {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, recipient: &User, notification: &Notification) -> Result<(), NotifyError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(NotifyError::NotConfigured(Channel::Push))?;

        let mut request = self.client.post(endpoint).json(&PushPayload {
            user_id: recipient.id.to_string(),
            title: &notification.title,
            body: &notification.body,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "push service returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
