use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use super::directory::{DirectoryUser, UserGroup, WorkspaceDirectory};
use super::model::{RawMessage, SearchHit};
use super::summarize::{SummaryRequest, Summarizer};
use crate::slack::{MessagingPlatform, PlatformError};

pub fn msg(author: &str, text: &str, ts: &str) -> RawMessage {
    RawMessage {
        author_id: author.to_string(),
        text: text.to_string(),
        timestamp: ts.to_string(),
        is_bot: false,
        thread_id: None,
    }
}

pub fn reply(author: &str, text: &str, ts: &str, thread: &str) -> RawMessage {
    RawMessage {
        thread_id: Some(thread.to_string()),
        ..msg(author, text, ts)
    }
}

pub fn bot_msg(bot: &str, text: &str, ts: &str) -> RawMessage {
    RawMessage {
        is_bot: true,
        ..msg(bot, text, ts)
    }
}

pub fn hit(channel: &str, message: RawMessage) -> SearchHit {
    SearchHit {
        channel_id: channel.to_string(),
        message,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub user_id: String,
    pub title: String,
    pub blocks: Vec<Value>,
}

/// In-memory platform. Unknown channels and queries return nothing.
#[derive(Default)]
pub struct FakePlatform {
    self_id: String,
    users: Vec<DirectoryUser>,
    groups: Vec<UserGroup>,
    searches: HashMap<String, Vec<SearchHit>>,
    failing_queries: HashSet<String>,
    channels: HashMap<String, Vec<RawMessage>>,
    failing_channels: HashSet<String>,
    threads: HashMap<(String, String), Vec<RawMessage>>,
    roots: HashMap<(String, String), String>,
    pub queries: RefCell<Vec<String>>,
    pub sent: RefCell<Vec<SentMessage>>,
}

impl FakePlatform {
    pub fn new(self_id: &str) -> Self {
        let mut platform = Self {
            self_id: self_id.to_string(),
            ..Self::default()
        };
        platform.users.push(Self::user(self_id, false));
        platform
    }

    fn user(id: &str, is_bot: bool) -> DirectoryUser {
        DirectoryUser {
            id: id.to_string(),
            name: id.to_lowercase(),
            display_name: id.to_lowercase(),
            is_bot,
            deleted: false,
        }
    }

    pub fn with_users(mut self, ids: &[&str]) -> Self {
        self.users.extend(ids.iter().map(|id| Self::user(id, false)));
        self
    }

    pub fn with_bots(mut self, ids: &[&str]) -> Self {
        self.users.extend(ids.iter().map(|id| Self::user(id, true)));
        self
    }

    pub fn with_group(mut self, id: &str, members: &[&str]) -> Self {
        self.groups.push(UserGroup {
            id: id.to_string(),
            handle: id.to_lowercase(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn with_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }

    pub fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    pub fn with_channel(mut self, channel: &str, messages: Vec<RawMessage>) -> Self {
        self.channels.insert(channel.to_string(), messages);
        self
    }

    pub fn with_failing_channel(mut self, channel: &str) -> Self {
        self.failing_channels.insert(channel.to_string());
        self
    }

    /// Registers the transcript and makes every message in it resolve to
    /// `thread` as its root.
    pub fn with_thread(mut self, channel: &str, thread: &str, messages: Vec<RawMessage>) -> Self {
        for m in &messages {
            self.roots
                .insert((channel.to_string(), m.timestamp.clone()), thread.to_string());
        }
        self.threads
            .insert((channel.to_string(), thread.to_string()), messages);
        self
    }

    pub fn directory(&self) -> WorkspaceDirectory {
        WorkspaceDirectory::from_parts(
            self.self_id.clone(),
            self.users.clone(),
            self.groups.clone(),
        )
    }
}

impl MessagingPlatform for FakePlatform {
    fn self_user_id(&self) -> Result<String, PlatformError> {
        Ok(self.self_id.clone())
    }

    fn list_users(&self) -> Result<Vec<DirectoryUser>, PlatformError> {
        Ok(self.users.clone())
    }

    fn list_user_groups(&self) -> Result<Vec<UserGroup>, PlatformError> {
        Ok(self.groups.clone())
    }

    fn list_recent_channel_messages(
        &self,
        channel_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        if self.failing_channels.contains(channel_id) {
            return Err(PlatformError::api("conversations.history", "channel_not_found"));
        }
        Ok(self.channels.get(channel_id).cloned().unwrap_or_default())
    }

    fn get_thread_root(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<String>, PlatformError> {
        Ok(self
            .roots
            .get(&(channel_id.to_string(), message_ts.to_string()))
            .cloned())
    }

    fn get_thread_messages(
        &self,
        channel_id: &str,
        thread_id: &str,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        Ok(self
            .threads
            .get(&(channel_id.to_string(), thread_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn search_messages(
        &self,
        query: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>, PlatformError> {
        self.queries.borrow_mut().push(query.to_string());
        if self.failing_queries.contains(query) {
            return Err(PlatformError::api("search.messages", "internal_error"));
        }
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    fn send_private_message(
        &self,
        user_id: &str,
        title: &str,
        blocks: &[Value],
    ) -> Result<(), PlatformError> {
        self.sent.borrow_mut().push(SentMessage {
            user_id: user_id.to_string(),
            title: title.to_string(),
            blocks: blocks.to_vec(),
        });
        Ok(())
    }
}

/// Replays canned responses in order and records every document it saw.
#[derive(Default)]
pub struct FakeSummarizer {
    responses: RefCell<VecDeque<String>>,
    pub documents: RefCell<Vec<String>>,
}

impl FakeSummarizer {
    pub fn replying(responses: &[&str]) -> Self {
        Self {
            responses: RefCell::new(responses.iter().map(|r| r.to_string()).collect()),
            documents: RefCell::new(Vec::new()),
        }
    }
}

impl Summarizer for FakeSummarizer {
    fn summarize(&self, request: &SummaryRequest<'_>) -> anyhow::Result<String> {
        self.documents.borrow_mut().push(request.document.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("fake summarizer ran out of responses"))
    }
}
