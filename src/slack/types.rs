use serde::Deserialize;

use crate::digest::directory::{DirectoryUser, UserGroup};
use crate::digest::model::{RawMessage, SearchHit};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

pub fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.and_then(|m| m.next_cursor)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestResponse {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub profile: SlackProfile,
}

impl From<SlackUser> for DirectoryUser {
    fn from(user: SlackUser) -> Self {
        let display_name = if user.profile.display_name.trim().is_empty() {
            user.profile.real_name
        } else {
            user.profile.display_name
        };
        // Slackbot is a bot in practice but is not flagged as one.
        let is_bot = user.is_bot || user.id == "USLACKBOT";
        Self {
            id: user.id,
            name: user.name,
            display_name,
            is_bot,
            deleted: user.deleted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUserGroup {
    pub id: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub users: Vec<String>,
}

impl From<SlackUserGroup> for UserGroup {
    fn from(group: SlackUserGroup) -> Self {
        Self {
            id: group.id,
            handle: group.handle,
            members: group.users,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserGroupsListResponse {
    #[serde(default)]
    pub usergroups: Vec<SlackUserGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl From<SlackMessage> for RawMessage {
    fn from(msg: SlackMessage) -> Self {
        let is_bot = msg.bot_id.is_some() || msg.subtype.as_deref() == Some("bot_message");
        Self {
            author_id: msg.user.or(msg.bot_id).unwrap_or_default(),
            text: msg.text,
            timestamp: msg.ts,
            is_bot,
            thread_id: msg.thread_ts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationMessagesResponse {
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchMatch {
    pub channel: ChannelRef,
    #[serde(flatten)]
    pub message: SlackMessage,
}

impl From<SearchMatch> for SearchHit {
    fn from(hit: SearchMatch) -> Self {
        Self {
            channel_id: hit.channel.id,
            message: hit.message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchMessages {
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchMessagesResponse {
    pub messages: SearchMessages,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsOpenResponse {
    pub channel: ChannelRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageResponse {
    #[serde(default)]
    pub ts: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{SearchMessagesResponse, SlackMessage};
    use crate::digest::model::{RawMessage, SearchHit};
    use serde_json::json;

    #[test]
    fn bot_messages_are_flagged() {
        let msg: SlackMessage = serde_json::from_value(json!({
            "bot_id": "B1",
            "subtype": "bot_message",
            "text": "deploy finished",
            "ts": "1700000000.000100"
        }))
        .expect("message");
        let raw: RawMessage = msg.into();
        assert!(raw.is_bot);
        assert_eq!(raw.author_id, "B1");
    }

    #[test]
    fn search_matches_carry_their_channel() {
        let resp: SearchMessagesResponse = serde_json::from_value(json!({
            "messages": {
                "matches": [{
                    "channel": {"id": "C9", "name": "ops"},
                    "user": "U1",
                    "username": "alice",
                    "text": "hey <@U2>",
                    "ts": "1700000000.000200",
                    "permalink": "https://example.slack.com/archives/C9/p1700000000000200"
                }],
                "paging": {"count": 100, "total": 1, "page": 1, "pages": 1}
            }
        }))
        .expect("search response");
        let hits: Vec<SearchHit> = resp.messages.matches.into_iter().map(Into::into).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].channel_id, "C9");
        assert_eq!(hits[0].message.author_id, "U1");
        assert!(!hits[0].message.is_bot);
    }
}
