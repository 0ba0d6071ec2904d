//! Outbound notification channels used by the messaging fan-out.

pub mod placeholder;
pub mod push;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::message::Channel;
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{0} channel is not configured")]
    NotConfigured(Channel),

    #[error("recipient has no {0}")]
    MissingAddress(&'static str),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Content of one outbound notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &User, notification: &Notification) -> Result<(), NotifyError>;
}

