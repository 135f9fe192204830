use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use super::directory::WorkspaceDirectory;
use super::ledger::DedupLedger;
use super::model::{ConversationUnit, RawMessage, SearchHit, UnitKind};
use crate::slack::{MessagingPlatform, PlatformError};

/// What to stamp on the units one discovery path produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTarget {
    pub thread_kind: UnitKind,
    pub channel_kind: UnitKind,
    pub attributed_user_id: String,
}

/// Turns candidate messages into conversation units, consulting the run's
/// ledger so each thread and channel is materialized at most once.
pub struct ConversationCollector<'a> {
    platform: &'a dyn MessagingPlatform,
    directory: &'a WorkspaceDirectory,
    since: DateTime<Utc>,
}

fn summarizable(messages: Vec<RawMessage>) -> Vec<RawMessage> {
    messages.into_iter().filter(RawMessage::is_summarizable).collect()
}

impl<'a> ConversationCollector<'a> {
    pub fn new(
        platform: &'a dyn MessagingPlatform,
        directory: &'a WorkspaceDirectory,
        since: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            directory,
            since,
        }
    }

    /// Zero or one unit for a search hit.
    pub fn collect_candidate(
        &self,
        ledger: &mut DedupLedger,
        hit: &SearchHit,
        target: &UnitTarget,
    ) -> Result<Option<ConversationUnit>, PlatformError> {
        let message = &hit.message;
        let Some(author) = self.directory.user(&message.author_id) else {
            debug!(
                channel_id = hit.channel_id.as_str(),
                ts = message.timestamp.as_str(),
                author_id = message.author_id.as_str(),
                "skipping candidate with unresolvable author"
            );
            return Ok(None);
        };
        if author.is_bot || message.is_bot {
            debug!(
                channel_id = hit.channel_id.as_str(),
                ts = message.timestamp.as_str(),
                author_id = author.id.as_str(),
                "skipping bot-authored candidate"
            );
            return Ok(None);
        }

        let root = self
            .platform
            .get_thread_root(&hit.channel_id, &message.timestamp)?;
        match root {
            Some(thread_id) => self.collect_thread(ledger, &hit.channel_id, &thread_id, target),
            None => self.collect_channel(ledger, &hit.channel_id, target.channel_kind, target),
        }
    }

    fn collect_thread(
        &self,
        ledger: &mut DedupLedger,
        channel_id: &str,
        thread_id: &str,
        target: &UnitTarget,
    ) -> Result<Option<ConversationUnit>, PlatformError> {
        if ledger.seen_thread(thread_id) {
            debug!(channel_id, thread_id, "thread already collected");
            return Ok(None);
        }
        let transcript = self.platform.get_thread_messages(channel_id, thread_id)?;
        ledger.mark_thread(thread_id);

        let messages = summarizable(transcript);
        if messages.is_empty() {
            debug!(channel_id, thread_id, "thread has nothing to summarize");
            return Ok(None);
        }
        Ok(Some(ConversationUnit {
            kind: target.thread_kind,
            channel_id: channel_id.to_string(),
            thread_id: Some(thread_id.to_string()),
            attributed_user_id: target.attributed_user_id.clone(),
            messages,
        }))
    }

    /// The channel's recent window with every thread it touches inlined
    /// right after its root. `kind` lets followed-channel listing reuse this.
    pub fn collect_channel(
        &self,
        ledger: &mut DedupLedger,
        channel_id: &str,
        kind: UnitKind,
        target: &UnitTarget,
    ) -> Result<Option<ConversationUnit>, PlatformError> {
        if ledger.seen_channel(channel_id) {
            debug!(channel_id, "channel already collected");
            return Ok(None);
        }

        let window = self
            .platform
            .list_recent_channel_messages(channel_id, self.since)?;
        let mut inlined: HashSet<String> = HashSet::new();
        let mut messages = Vec::with_capacity(window.len());
        for message in window {
            let thread_id = message.thread_id.clone();
            messages.push(message);
            let Some(thread_id) = thread_id else {
                continue;
            };
            if ledger.seen_thread(&thread_id) {
                debug!(channel_id, thread_id = thread_id.as_str(), "thread already collected");
                continue;
            }
            if !inlined.insert(thread_id.clone()) {
                continue;
            }
            let replies = self.platform.get_thread_messages(channel_id, &thread_id)?;
            messages.extend(replies.into_iter().filter(|m| m.timestamp != thread_id));
        }

        for thread_id in &inlined {
            ledger.mark_thread(thread_id);
        }
        ledger.mark_channel(channel_id);

        let messages = summarizable(messages);
        if messages.is_empty() {
            debug!(channel_id, "channel window has nothing to summarize");
            return Ok(None);
        }
        Ok(Some(ConversationUnit {
            kind,
            channel_id: channel_id.to_string(),
            thread_id: None,
            attributed_user_id: target.attributed_user_id.clone(),
            messages,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationCollector, UnitTarget};
    use crate::digest::ledger::DedupLedger;
    use crate::digest::model::{SearchHit, UnitKind};
    use crate::digest::testutil::{FakePlatform, bot_msg, msg, reply};
    use chrono::{TimeZone, Utc};

    fn dm_target() -> UnitTarget {
        UnitTarget {
            thread_kind: UnitKind::DirectMessageThread,
            channel_kind: UnitKind::DirectMessage,
            attributed_user_id: "USELF".to_string(),
        }
    }

    fn hit(channel: &str, message: crate::digest::model::RawMessage) -> SearchHit {
        SearchHit {
            channel_id: channel.to_string(),
            message,
        }
    }

    #[test]
    fn thread_hit_emits_thread_unit_once() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U1"])
            .with_thread(
                "C1",
                "100.1",
                vec![msg("U1", "root", "100.1"), reply("U2", "answer", "100.2", "100.1")],
            );
        let directory = platform.directory();
        let since = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
        let collector = ConversationCollector::new(&platform, &directory, since);
        let mut ledger = DedupLedger::new();

        let first = collector
            .collect_candidate(
                &mut ledger,
                &hit("C1", reply("U1", "hi", "100.2", "100.1")),
                &dm_target(),
            )
            .expect("collect")
            .expect("unit");
        assert_eq!(first.kind, UnitKind::DirectMessageThread);
        assert_eq!(first.thread_id.as_deref(), Some("100.1"));
        assert_eq!(first.messages.len(), 2);

        let again = collector
            .collect_candidate(&mut ledger, &hit("C1", msg("U1", "root", "100.1")), &dm_target())
            .expect("collect");
        assert!(again.is_none());
    }

    #[test]
    fn bot_and_unknown_authors_are_skipped() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U1"])
            .with_bots(&["UBOT"])
            .with_channel("C1", vec![msg("U1", "hello", "100.1")]);
        let directory = platform.directory();
        let since = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
        let collector = ConversationCollector::new(&platform, &directory, since);
        let mut ledger = DedupLedger::new();

        for author in ["UBOT", "UGHOST"] {
            let out = collector
                .collect_candidate(&mut ledger, &hit("C1", msg(author, "x", "100.1")), &dm_target())
                .expect("collect");
            assert!(out.is_none());
        }
        assert_eq!(ledger.channel_count(), 0);
    }

    #[test]
    fn channel_window_inlines_threads_and_drops_noise() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U1", "U2"])
            .with_channel(
                "D1",
                vec![
                    msg("U1", "first", "100.1"),
                    reply("U2", "kicks off a thread", "100.2", "100.2"),
                    bot_msg("B1", "deploy done", "100.3"),
                    msg("U1", "   ", "100.4"),
                    msg("U1", "last", "100.5"),
                ],
            )
            .with_thread(
                "D1",
                "100.2",
                vec![
                    reply("U2", "kicks off a thread", "100.2", "100.2"),
                    reply("U1", "in thread", "100.21", "100.2"),
                ],
            );
        let directory = platform.directory();
        let since = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
        let collector = ConversationCollector::new(&platform, &directory, since);
        let mut ledger = DedupLedger::new();

        let unit = collector
            .collect_candidate(&mut ledger, &hit("D1", msg("U1", "first", "100.1")), &dm_target())
            .expect("collect")
            .expect("unit");
        let texts: Vec<&str> = unit.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["first", "kicks off a thread", "in thread", "last"]
        );
        assert_eq!(unit.kind, UnitKind::DirectMessage);
        assert!(ledger.seen_channel("D1"));
        assert!(ledger.seen_thread("100.2"));
    }

    #[test]
    fn empty_channel_window_is_still_marked() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U1"])
            .with_channel("C1", vec![bot_msg("B1", "only bots", "100.1")]);
        let directory = platform.directory();
        let since = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
        let collector = ConversationCollector::new(&platform, &directory, since);
        let mut ledger = DedupLedger::new();

        let out = collector
            .collect_channel(&mut ledger, "C1", UnitKind::FollowedChannel, &dm_target())
            .expect("collect");
        assert!(out.is_none());
        assert!(ledger.seen_channel("C1"));
    }
}
