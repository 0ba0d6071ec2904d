//! SMS and email integration points. No provider is wired in yet; a delivery
//! is logged once the recipient has a usable address.

use async_trait::async_trait;
use tracing::info;

use crate::models::message::Channel;
use crate::models::user::User;
use crate::notify::{ChannelSender, Notification, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct SmsSender;

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, recipient: &User, notification: &Notification) -> Result<(), NotifyError> {
        if recipient.phone.trim().is_empty() {
            return Err(NotifyError::MissingAddress("phone number"));
        }

        info!(user_id = %recipient.id, title = %notification.title, "sms queued");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailSender;

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &User, notification: &Notification) -> Result<(), NotifyError> {
        let has_email = recipient
            .email
            .as_deref()
            .is_some_and(|email| email.contains('@'));
        if !has_email {
            return Err(NotifyError::MissingAddress("email address"));
        }

        info!(user_id = %recipient.id, title = %notification.title, "email queued");
        Ok(())
    }
}
