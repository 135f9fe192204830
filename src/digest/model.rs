use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a conversation unit was collected and what shape it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    DirectMessage,
    DirectMessageThread,
    MentionChannel,
    MentionThread,
    GroupMention,
    FollowedChannel,
    FollowedUserChannel,
    FollowedUserThread,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::DirectMessageThread => "direct_message_thread",
            Self::MentionChannel => "mention_channel",
            Self::MentionThread => "mention_thread",
            Self::GroupMention => "group_mention",
            Self::FollowedChannel => "followed_channel",
            Self::FollowedUserChannel => "followed_user_channel",
            Self::FollowedUserThread => "followed_user_thread",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as the platform returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub author_id: String,
    pub text: String,
    pub timestamp: String,
    pub is_bot: bool,
    pub thread_id: Option<String>,
}

impl RawMessage {
    /// Bot-authored and blank messages never reach a summary.
    pub fn is_summarizable(&self) -> bool {
        !self.is_bot && !self.text.trim().is_empty()
    }
}

/// A search match: the message plus the channel it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub channel_id: String,
    pub message: RawMessage,
}

/// One thread or one channel window, summarized as a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationUnit {
    pub kind: UnitKind,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub attributed_user_id: String,
    pub messages: Vec<RawMessage>,
}

impl ConversationUnit {
    pub fn is_thread(&self) -> bool {
        self.thread_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

impl Priority {
    /// Fixed visual marker shown next to a topic.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Low => ":large_green_circle: Low",
            Self::Medium => ":large_yellow_circle: Medium",
            Self::High => ":red_circle: High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLink {
    pub url: String,
    pub link_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestTopic {
    pub title: String,
    pub channel_id: String,
    pub summary: String,
    pub current_status: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub priority: Priority,
    #[serde(default)]
    pub links: Vec<TopicLink>,
    #[serde(rename = "link_to_slack_message", alias = "source_message_link")]
    pub source_message_link: String,
}

impl DigestTopic {
    pub fn key(&self) -> (&str, &str) {
        (self.title.as_str(), self.channel_id.as_str())
    }
}

/// The two bounded topic lists delivered to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub actionables: Vec<DigestTopic>,
    pub to_catch_up_on: Vec<DigestTopic>,
}

impl Digest {
    pub const MAX_ACTIONABLES: usize = 8;
    pub const MAX_TO_CATCH_UP_ON: usize = 15;

    pub fn is_empty(&self) -> bool {
        self.actionables.is_empty() && self.to_catch_up_on.is_empty()
    }
}

/// Order Slack message timestamps (`"1721106882.879439"`) numerically.
pub fn ts_sort_key(ts: &str) -> (u64, u64) {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    (
        secs.trim().parse().unwrap_or(0),
        frac.trim().parse().unwrap_or(0),
    )
}
