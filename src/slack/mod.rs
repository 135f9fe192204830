pub mod client;
pub mod paging;
pub mod types;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::digest::directory::{DirectoryUser, UserGroup};
use crate::digest::model::{RawMessage, SearchHit};

pub use client::SlackClient;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("slack {method} rate limited; retry after {}s", .retry_after.as_secs())]
    RateLimited {
        method: String,
        retry_after: Duration,
    },
    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack {method} request failed: {source}")]
    Transport {
        method: String,
        source: reqwest::Error,
    },
    #[error("slack {method} returned an unexpected payload: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },
}

impl PlatformError {
    pub fn api(method: &str, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            error: error.into(),
        }
    }
}

/// Everything a digest run needs from the workspace messaging platform.
///
/// List and search calls follow pagination until exhaustion. Read calls
/// absorb rate limiting internally; only writes may surface `RateLimited`.
pub trait MessagingPlatform {
    /// The user the read token belongs to.
    fn self_user_id(&self) -> Result<String, PlatformError>;

    fn list_users(&self) -> Result<Vec<DirectoryUser>, PlatformError>;

    fn list_user_groups(&self) -> Result<Vec<UserGroup>, PlatformError>;

    /// Messages posted in `channel_id` since `since`, oldest first.
    fn list_recent_channel_messages(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>, PlatformError>;

    /// The thread `message_ts` belongs to, if any.
    fn get_thread_root(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<String>, PlatformError>;

    /// Full thread transcript, root first.
    fn get_thread_messages(
        &self,
        channel_id: &str,
        thread_id: &str,
    ) -> Result<Vec<RawMessage>, PlatformError>;

    fn search_messages(
        &self,
        query: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>, PlatformError>;

    fn send_private_message(
        &self,
        user_id: &str,
        title: &str,
        blocks: &[Value],
    ) -> Result<(), PlatformError>;
}
