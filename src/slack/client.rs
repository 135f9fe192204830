use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::paging::{collect_cursor_pages, collect_numbered_pages};
use super::types::{
    AuthTestResponse, ConversationMessagesResponse, ConversationsOpenResponse,
    PostMessageResponse, SearchMessagesResponse, UserGroupsListResponse, UsersListResponse,
    next_cursor,
};
use super::{MessagingPlatform, PlatformError};
use crate::digest::config::SlackConfig;
use crate::digest::directory::{DirectoryUser, UserGroup};
use crate::digest::model::{RawMessage, SearchHit, ts_sort_key};

const RETRY_ATTEMPT_HEADER: &str = "x-ketchup-retry-attempt";
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
const USERS_PAGE_SIZE: u32 = 200;
const REPLIES_PAGE_SIZE: u32 = 200;

/// Blocking Slack Web API client.
///
/// Reads go out with the user token (search requires it); delivery uses the
/// bot token so the digest arrives from the app.
pub struct SlackClient {
    http: Client,
    api_base: String,
    bot_token: String,
    user_token: String,
    search_page_size: u32,
    history_page_size: u32,
    write_retry_attempts: u32,
}

fn parse_retry_after(headers: &HeaderMap) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

fn oldest_param(since: DateTime<Utc>) -> String {
    format!("{}.{:06}", since.timestamp(), since.timestamp_subsec_micros())
}

/// Slack's `after:` modifier excludes the named day, so search from the day
/// before `since`.
fn search_query(query: &str, since: DateTime<Utc>) -> String {
    let day = since.date_naive();
    let after = day.pred_opt().unwrap_or(day);
    format!("{query} after:{}", after.format("%Y-%m-%d"))
}

fn decode<T: DeserializeOwned>(method: &str, response: Response) -> Result<T, PlatformError> {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PlatformError::RateLimited {
            method: method.to_string(),
            retry_after,
        });
    }
    if !status.is_success() {
        return Err(PlatformError::api(
            method,
            format!("http status {}", status.as_u16()),
        ));
    }

    let body: Value = response.json().map_err(|source| PlatformError::Transport {
        method: method.to_string(),
        source,
    })?;
    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        if error == "ratelimited" {
            return Err(PlatformError::RateLimited {
                method: method.to_string(),
                retry_after,
            });
        }
        return Err(PlatformError::api(method, error));
    }

    serde_json::from_value(body).map_err(|source| PlatformError::Decode {
        method: method.to_string(),
        source,
    })
}

impl SlackClient {
    pub fn new(cfg: &SlackConfig, bot_token: &str, user_token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(concat!("ketchup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create slack api client")?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            user_token: user_token.trim().to_string(),
            search_page_size: cfg.search_page_size,
            history_page_size: cfg.history_page_size,
            write_retry_attempts: cfg.write_retry_attempts.max(1),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn get_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
        attempt: u32,
    ) -> Result<T, PlatformError> {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.user_token)
            .header(RETRY_ATTEMPT_HEADER, attempt.to_string())
            .query(params)
            .send()
            .map_err(|source| PlatformError::Transport {
                method: method.to_string(),
                source,
            })?;
        decode(method, response)
    }

    fn post_once<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        attempt: u32,
    ) -> Result<T, PlatformError> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .header(RETRY_ATTEMPT_HEADER, attempt.to_string())
            .json(body)
            .send()
            .map_err(|source| PlatformError::Transport {
                method: method.to_string(),
                source,
            })?;
        decode(method, response)
    }

    /// Read calls wait out rate limits for as long as Slack asks, forever.
    fn read<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let mut attempt = 0u32;
        loop {
            match self.get_once(method, params, attempt) {
                Err(PlatformError::RateLimited { retry_after, .. }) => {
                    warn!(
                        method,
                        retry_after_secs = retry_after.as_secs(),
                        attempt,
                        "slack rate limited; waiting before retry"
                    );
                    thread::sleep(retry_after);
                    attempt = attempt.saturating_add(1);
                }
                other => return other,
            }
        }
    }

    fn write<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, PlatformError> {
        let mut attempt = 0u32;
        loop {
            match self.post_once(method, body, attempt) {
                Err(PlatformError::RateLimited { retry_after, .. })
                    if attempt + 1 < self.write_retry_attempts =>
                {
                    warn!(
                        method,
                        retry_after_secs = retry_after.as_secs(),
                        attempt,
                        "slack rate limited a write; waiting before retry"
                    );
                    thread::sleep(retry_after);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn replies_page(
        &self,
        channel_id: &str,
        ts: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ConversationMessagesResponse, PlatformError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("ts", ts.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.read("conversations.replies", &params)
    }
}

impl MessagingPlatform for SlackClient {
    fn self_user_id(&self) -> Result<String, PlatformError> {
        let resp: AuthTestResponse = self.read("auth.test", &[])?;
        Ok(resp.user_id)
    }

    fn list_users(&self) -> Result<Vec<DirectoryUser>, PlatformError> {
        collect_cursor_pages(|cursor| {
            let mut params = vec![("limit", USERS_PAGE_SIZE.to_string())];
            if let Some(cursor) = cursor {
                params.push(("cursor", cursor.to_string()));
            }
            let resp: UsersListResponse = self.read("users.list", &params)?;
            let users = resp.members.into_iter().map(Into::into).collect();
            Ok((users, next_cursor(resp.response_metadata)))
        })
    }

    fn list_user_groups(&self) -> Result<Vec<UserGroup>, PlatformError> {
        let resp: UserGroupsListResponse =
            self.read("usergroups.list", &[("include_users", "true".to_string())])?;
        Ok(resp.usergroups.into_iter().map(Into::into).collect())
    }

    fn list_recent_channel_messages(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        let oldest = oldest_param(since);
        let mut messages: Vec<RawMessage> = collect_cursor_pages(|cursor| {
            let mut params = vec![
                ("channel", channel_id.to_string()),
                ("oldest", oldest.clone()),
                ("limit", self.history_page_size.to_string()),
            ];
            if let Some(cursor) = cursor {
                params.push(("cursor", cursor.to_string()));
            }
            let resp: ConversationMessagesResponse =
                self.read("conversations.history", &params)?;
            let page = resp.messages.into_iter().map(Into::into).collect();
            Ok((page, next_cursor(resp.response_metadata)))
        })?;
        messages.sort_by_key(|m| ts_sort_key(&m.timestamp));
        debug!(channel_id, count = messages.len(), "fetched channel window");
        Ok(messages)
    }

    fn get_thread_root(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<String>, PlatformError> {
        let resp = self.replies_page(channel_id, message_ts, 1, None)?;
        Ok(resp.messages.into_iter().next().and_then(|m| m.thread_ts))
    }

    fn get_thread_messages(
        &self,
        channel_id: &str,
        thread_id: &str,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        collect_cursor_pages(|cursor| {
            let resp = self.replies_page(channel_id, thread_id, REPLIES_PAGE_SIZE, cursor)?;
            let page = resp.messages.into_iter().map(Into::into).collect();
            Ok((page, next_cursor(resp.response_metadata)))
        })
    }

    fn search_messages(
        &self,
        query: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>, PlatformError> {
        let query = search_query(query, since);
        collect_numbered_pages(|page| {
            let params = [
                ("query", query.clone()),
                ("sort", "timestamp".to_string()),
                ("sort_dir", "asc".to_string()),
                ("count", self.search_page_size.to_string()),
                ("page", page.to_string()),
            ];
            let resp: SearchMessagesResponse = self.read("search.messages", &params)?;
            let pages = resp.messages.paging.map(|p| p.pages).unwrap_or(1);
            let hits = resp.messages.matches.into_iter().map(Into::into).collect();
            Ok((hits, pages))
        })
    }

    fn send_private_message(
        &self,
        user_id: &str,
        title: &str,
        blocks: &[Value],
    ) -> Result<(), PlatformError> {
        let opened: ConversationsOpenResponse =
            self.write("conversations.open", &json!({ "users": user_id }))?;
        let posted: PostMessageResponse = self.write(
            "chat.postMessage",
            &json!({
                "channel": opened.channel.id,
                "text": title,
                "blocks": blocks,
                "unfurl_links": false,
            }),
        )?;
        debug!(
            user_id,
            channel_id = opened.channel.id.as_str(),
            ts = posted.ts.as_deref().unwrap_or(""),
            "delivered private message"
        );
        Ok(())
    }
}
