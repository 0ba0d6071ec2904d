use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::merchant::Merchant;
use crate::models::message::{
    Channel, ChannelOutcome, FanoutReport, Message, RecipientOutcome, RecipientSelector,
};
use crate::models::user::User;
use crate::notify::{ChannelSender, Notification};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastDraft {
    pub title: String,
    pub body: String,
    pub channels: Vec<Channel>,
    pub recipients: RecipientSelector,
}

fn selects(selector: &RecipientSelector, merchant: &Merchant) -> bool {
    match selector {
        RecipientSelector::All => true,
        RecipientSelector::Verified => merchant.is_verified,
        RecipientSelector::Unverified => !merchant.is_verified,
        RecipientSelector::ByType { merchant_type } => merchant.merchant_type == *merchant_type,
        RecipientSelector::Specific { merchant_ids } => merchant_ids.contains(&merchant.id),
    }
}

/// Manager accounts of every selected merchant, each user once.
pub fn resolve_recipients(state: &AppState, selector: &RecipientSelector) -> Vec<User> {
    let manager_ids: BTreeSet<Uuid> = state
        .merchants
        .iter()
        .filter(|entry| selects(selector, entry.value()))
        .flat_map(|entry| entry.manager_ids.clone())
        .collect();

    manager_ids
        .into_iter()
        .filter_map(|id| state.users.get(&id).map(|user| user.value().clone()))
        .collect()
}

type Route = (Channel, Option<Arc<dyn ChannelSender>>);

async fn deliver(user: &User, routes: &[Route], notification: &Notification) -> RecipientOutcome {
    let attempts = routes.iter().map(|(channel, sender)| async move {
        let result = match sender {
            Some(sender) => sender.send(user, notification).await.map_err(|err| err.to_string()),
            None => Err(format!("{channel} channel is not configured")),
        };
        ChannelOutcome {
            channel: *channel,
            delivered: result.is_ok(),
            error: result.err(),
        }
    });

    let channels = join_all(attempts).await;
    RecipientOutcome {
        user_id: user.id,
        sent: channels.iter().any(|outcome| outcome.delivered),
        channels,
    }
}

fn undelivered(user_id: Uuid, channels: &[Channel], reason: &str) -> RecipientOutcome {
    RecipientOutcome {
        user_id,
        sent: false,
        channels: channels
            .iter()
            .map(|channel| ChannelOutcome {
                channel: *channel,
                delivered: false,
                error: Some(reason.to_string()),
            })
            .collect(),
    }
}

/// Sends to every recipient as its own task, at most `concurrency` at a time.
/// Each task tries all selected channels; outcomes keep recipient order.
pub async fn fan_out(
    senders: &[Arc<dyn ChannelSender>],
    channels: &[Channel],
    recipients: Vec<User>,
    notification: Notification,
    concurrency: usize,
) -> Vec<RecipientOutcome> {
    let routes: Arc<Vec<Route>> = Arc::new(
        channels
            .iter()
            .map(|channel| {
                let sender = senders.iter().find(|s| s.channel() == *channel).cloned();
                (*channel, sender)
            })
            .collect(),
    );
    let notification = Arc::new(notification);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let tasks: Vec<_> = recipients
        .into_iter()
        .map(|user| {
            let user_id = user.id;
            let routes = routes.clone();
            let notification = notification.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        let channels: Vec<Channel> = routes.iter().map(|(c, _)| *c).collect();
                        return undelivered(user.id, &channels, &err.to_string());
                    }
                };
                deliver(&user, &routes, &notification).await
            });
            (user_id, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(tasks.len());
    for (user_id, handle) in tasks {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                error!(user_id = %user_id, error = %err, "delivery task failed");
                outcomes.push(undelivered(user_id, channels, "delivery task failed"));
            }
        }
    }

    outcomes
}

/// A recipient counts as sent when any one channel delivered.
pub fn summarize(recipients: Vec<RecipientOutcome>) -> FanoutReport {
    let mut report = FanoutReport {
        total: recipients.len(),
        ..FanoutReport::default()
    };

    for recipient in &recipients {
        if recipient.sent {
            report.sent += 1;
        }
        for outcome in &recipient.channels {
            let tally = report.per_channel.entry(outcome.channel).or_default();
            if outcome.delivered {
                tally.sent += 1;
            } else {
                tally.failed += 1;
            }
        }
    }

    report.failed = report.total - report.sent;
    report.recipients = recipients;
    report
}

pub async fn broadcast(
    state: &AppState,
    sender: &User,
    draft: BroadcastDraft,
) -> Result<Message, AppError> {
    if draft.title.trim().is_empty() || draft.body.trim().is_empty() {
        return Err(AppError::BadRequest("title and body are required".to_string()));
    }

    let mut channels = draft.channels.clone();
    channels.sort();
    channels.dedup();
    if channels.is_empty() {
        return Err(AppError::BadRequest("select at least one channel".to_string()));
    }

    let recipients = resolve_recipients(state, &draft.recipients);
    let notification = Notification {
        title: draft.title.clone(),
        body: draft.body.clone(),
    };

    let started = Instant::now();
    let outcomes = fan_out(
        &state.services.senders,
        &channels,
        recipients,
        notification,
        state.config.fanout_concurrency,
    )
    .await;
    let report = summarize(outcomes);

    let outcome_label = if report.failed == 0 { "complete" } else { "partial" };
    state
        .metrics
        .fanout_duration_seconds
        .with_label_values(&[outcome_label])
        .observe(started.elapsed().as_secs_f64());
    for (channel, tally) in &report.per_channel {
        let channel = channel.to_string();
        state
            .metrics
            .fanout_deliveries_total
            .with_label_values(&[channel.as_str(), "sent"])
            .inc_by(tally.sent as u64);
        state
            .metrics
            .fanout_deliveries_total
            .with_label_values(&[channel.as_str(), "failed"])
            .inc_by(tally.failed as u64);
    }

    let message = Message {
        id: Uuid::new_v4(),
        title: draft.title,
        body: draft.body,
        channels,
        recipients: draft.recipients,
        report,
        sent_by: sender.id,
        sent_at: Utc::now(),
    };
    state.messages.insert(message.id, message.clone());

    info!(
        message_id = %message.id,
        total = message.report.total,
        sent = message.report.sent,
        failed = message.report.failed,
        "broadcast finished"
    );

    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{fan_out, summarize};
    use crate::models::message::Channel;
    use crate::models::user::User;
    use crate::notify::{ChannelSender, Notification, NotifyError};

    struct Scripted {
        channel: Channel,
        fails_for: Vec<String>,
    }

    #[async_trait]
    impl ChannelSender for Scripted {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(&self, recipient: &User, _notification: &Notification) -> Result<(), NotifyError> {
            if self.fails_for.contains(&recipient.name) {
                Err(NotifyError::Delivery("rejected".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn user(name: &str) -> User {
        User::new(name.to_string(), "+237600000000".to_string(), None)
    }

    fn notification() -> Notification {
        Notification {
            title: "Hello".to_string(),
            body: "World".to_string(),
        }
    }

    #[tokio::test]
    async fn any_successful_channel_marks_recipient_sent() {
        let senders: Vec<Arc<dyn ChannelSender>> = vec![
            Arc::new(Scripted {
                channel: Channel::Push,
                fails_for: vec!["ana".to_string(), "ben".to_string()],
            }),
            Arc::new(Scripted {
                channel: Channel::Sms,
                fails_for: vec!["ben".to_string()],
            }),
        ];
        let recipients = vec![user("ana"), user("ben"), user("cleo")];

        let outcomes = fan_out(
            &senders,
            &[Channel::Push, Channel::Sms],
            recipients,
            notification(),
            2,
        )
        .await;
        let report = summarize(outcomes);

        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.recipients[1].sent);

        let push = report.per_channel[&Channel::Push];
        assert_eq!((push.sent, push.failed), (1, 2));
        let sms = report.per_channel[&Channel::Sms];
        assert_eq!((sms.sent, sms.failed), (2, 1));
    }

    #[tokio::test]
    async fn channel_without_sender_counts_as_failure() {
        let senders: Vec<Arc<dyn ChannelSender>> = vec![Arc::new(Scripted {
            channel: Channel::Sms,
            fails_for: Vec::new(),
        })];

        let outcomes = fan_out(&senders, &[Channel::Email], vec![user("dan")], notification(), 1).await;
        let report = summarize(outcomes);

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.recipients[0].channels[0].error.as_deref(),
            Some("EMAIL channel is not configured")
        );
    }

    #[tokio::test]
    async fn no_recipients_yields_empty_report() {
        let report = summarize(fan_out(&[], &[Channel::Push], Vec::new(), notification(), 4).await);

        assert_eq!(report.total, 0);
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 0);
        assert!(report.per_channel.is_empty());
    }
}
