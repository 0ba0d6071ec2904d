use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::merchant::MerchantType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Push,
    Sms,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Push => "PUSH",
            Channel::Sms => "SMS",
            Channel::Email => "EMAIL",
        };
        f.write_str(name)
    }
}

/// Which merchants' managers receive a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientSelector {
    All,
    Verified,
    Unverified,
    ByType { merchant_type: MerchantType },
    Specific { merchant_ids: Vec<Uuid> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub delivered: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub user_id: Uuid,
    pub sent: bool,
    pub channels: Vec<ChannelOutcome>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelTally {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanoutReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub per_channel: BTreeMap<Channel, ChannelTally>,
    pub recipients: Vec<RecipientOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub channels: Vec<Channel>,
    pub recipients: RecipientSelector,
    pub report: FanoutReport,
    pub sent_by: Uuid,
    pub sent_at: DateTime<Utc>,
}
