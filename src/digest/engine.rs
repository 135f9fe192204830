use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::collector::{ConversationCollector, UnitTarget};
use super::config::EmptyRunPolicy;
use super::directory::WorkspaceDirectory;
use super::document::unit_fragments;
use super::ledger::DedupLedger;
use super::model::{ConversationUnit, Digest, UnitKind};
use super::render::{
    MAX_BLOCKS_PER_MESSAGE, digest_blocks, digest_title, nothing_to_report_blocks,
};
use super::summarize::{SummaryRequest, Summarizer};
use super::summary::{merge, parse_digest};
use super::tokens;
use crate::error::KetchupError;
use crate::slack::{MessagingPlatform, PlatformError};

/// Where a discovery path finds its candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// Every hit of a search query is a candidate.
    Search(String),
    /// The channel's whole recent window is one candidate.
    Channel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPath {
    pub name: String,
    pub source: PathSource,
    pub target: UnitTarget,
}

#[derive(Debug, Clone)]
pub struct RunInput {
    pub since: DateTime<Utc>,
    pub run_date: NaiveDate,
    pub followed_channel_ids: Vec<String>,
    pub followed_user_ids: Vec<String>,
}

fn dedup_ids(ids: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for id in ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// All paths of one run in precedence order: own DMs, own mentions, group
/// mentions, followed channels, followed users. Earlier paths own any
/// conversation later paths could also reach.
pub fn discovery_paths(directory: &WorkspaceDirectory, input: &RunInput) -> Vec<DiscoveryPath> {
    let me = directory.self_user_id().to_string();
    let mut paths = vec![
        DiscoveryPath {
            name: "direct_messages".to_string(),
            source: PathSource::Search("is:dm".to_string()),
            target: UnitTarget {
                thread_kind: UnitKind::DirectMessageThread,
                channel_kind: UnitKind::DirectMessage,
                attributed_user_id: me.clone(),
            },
        },
        DiscoveryPath {
            name: "mentions".to_string(),
            source: PathSource::Search(format!("<@{me}>")),
            target: UnitTarget {
                thread_kind: UnitKind::MentionThread,
                channel_kind: UnitKind::MentionChannel,
                attributed_user_id: me.clone(),
            },
        },
    ];

    for group in directory.my_groups() {
        paths.push(DiscoveryPath {
            name: format!("group:{}", group.id),
            source: PathSource::Search(format!("<@{}>", group.id)),
            target: UnitTarget {
                thread_kind: UnitKind::GroupMention,
                channel_kind: UnitKind::GroupMention,
                attributed_user_id: group.id.clone(),
            },
        });
    }

    for channel_id in dedup_ids(&input.followed_channel_ids) {
        paths.push(DiscoveryPath {
            name: format!("channel:{channel_id}"),
            source: PathSource::Channel(channel_id.to_string()),
            target: UnitTarget {
                thread_kind: UnitKind::FollowedChannel,
                channel_kind: UnitKind::FollowedChannel,
                attributed_user_id: me.clone(),
            },
        });
    }

    for user_id in dedup_ids(&input.followed_user_ids) {
        paths.push(DiscoveryPath {
            name: format!("followed_user:{user_id}"),
            source: PathSource::Search(format!("<@{user_id}>")),
            target: UnitTarget {
                thread_kind: UnitKind::FollowedUserThread,
                channel_kind: UnitKind::FollowedUserChannel,
                attributed_user_id: user_id.to_string(),
            },
        });
    }
    paths
}

#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub units: Vec<ConversationUnit>,
    pub failed_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub token_budget: usize,
    pub empty_run: EmptyRunPolicy,
    /// False prints instead of sending.
    pub deliver: bool,
    pub workspace_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Sent,
    DryRun,
    SkippedEmpty,
    NotifiedEmpty,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::DryRun => "dry_run",
            Self::SkippedEmpty => "skipped_empty",
            Self::NotifiedEmpty => "notified_empty",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub self_user_id: String,
    pub units: usize,
    pub batches: usize,
    pub failed_paths: Vec<String>,
    pub digest: Digest,
    pub title: String,
    pub blocks: Vec<Value>,
    pub messages_sent: usize,
}

pub struct AggregationEngine<'a> {
    platform: &'a dyn MessagingPlatform,
    summarizer: &'a dyn Summarizer,
    options: EngineOptions,
}

impl<'a> AggregationEngine<'a> {
    pub fn new(
        platform: &'a dyn MessagingPlatform,
        summarizer: &'a dyn Summarizer,
        options: EngineOptions,
    ) -> Self {
        Self {
            platform,
            summarizer,
            options,
        }
    }

    fn run_path(
        &self,
        collector: &ConversationCollector<'_>,
        ledger: &mut DedupLedger,
        path: &DiscoveryPath,
        since: DateTime<Utc>,
        units: &mut Vec<ConversationUnit>,
    ) -> Result<usize, PlatformError> {
        let before = units.len();
        match &path.source {
            PathSource::Search(query) => {
                let hits = self.platform.search_messages(query, since)?;
                for hit in &hits {
                    if let Some(unit) = collector.collect_candidate(ledger, hit, &path.target)? {
                        units.push(unit);
                    }
                }
            }
            PathSource::Channel(channel_id) => {
                if let Some(unit) = collector.collect_channel(
                    ledger,
                    channel_id,
                    path.target.channel_kind,
                    &path.target,
                )? {
                    units.push(unit);
                }
            }
        }
        Ok(units.len() - before)
    }

    /// Runs every discovery path in order. A failing path keeps whatever it
    /// collected before the failure and the run moves on.
    pub fn collect(&self, directory: &WorkspaceDirectory, input: &RunInput) -> Collected {
        let collector = ConversationCollector::new(self.platform, directory, input.since);
        let mut ledger = DedupLedger::new();
        let mut collected = Collected::default();

        for path in discovery_paths(directory, input) {
            info!(path = path.name.as_str(), "discovery path started");
            let result = self.run_path(
                &collector,
                &mut ledger,
                &path,
                input.since,
                &mut collected.units,
            );
            match result {
                Ok(added) => info!(path = path.name.as_str(), added, "discovery path finished"),
                Err(err) => {
                    warn!(
                        path = path.name.as_str(),
                        error = %err,
                        "discovery path failed; continuing"
                    );
                    collected.failed_paths.push(path.name.clone());
                }
            }
        }
        info!(
            units = collected.units.len(),
            threads = ledger.thread_count(),
            channels = ledger.channel_count(),
            "collection finished"
        );
        collected
    }

    /// One summarization request per token-budgeted batch of units.
    pub fn summarize(
        &self,
        directory: &WorkspaceDirectory,
        units: &[ConversationUnit],
    ) -> Result<(Digest, usize), KetchupError> {
        let batches = tokens::split(unit_fragments(units), self.options.token_budget);
        let batch_count = batches.len();
        let mut digests = Vec::with_capacity(batch_count);
        for (idx, batch) in batches.into_iter().enumerate() {
            let document = batch.concat();
            info!(
                batch = idx + 1,
                of = batch_count,
                estimated_tokens = tokens::estimate(&document),
                "requesting summary"
            );
            let request = SummaryRequest {
                self_user_id: directory.self_user_id(),
                workspace_url: self.options.workspace_url.as_deref(),
                document: &document,
            };
            let raw = self
                .summarizer
                .summarize(&request)
                .map_err(|err| KetchupError::Summarization(format!("{err:#}")))?;
            match parse_digest(&raw) {
                Ok(digest) => digests.push(digest),
                Err(err) => {
                    error!(
                        batch = idx + 1,
                        error = %err,
                        payload = raw.as_str(),
                        "summary rejected"
                    );
                    return Err(err);
                }
            }
        }
        Ok((merge(digests), batch_count))
    }

    /// The digest goes out as exactly one message, so a failed send leaves
    /// nothing half-delivered.
    fn deliver(&self, user_id: &str, title: &str, blocks: &[Value]) -> Result<usize, KetchupError> {
        if blocks.len() > MAX_BLOCKS_PER_MESSAGE {
            return Err(KetchupError::Delivery(PlatformError::api(
                "chat.postMessage",
                format!("too_many_blocks ({})", blocks.len()),
            )));
        }
        self.platform
            .send_private_message(user_id, title, blocks)
            .map_err(KetchupError::Delivery)?;
        info!(user_id, blocks = blocks.len(), "digest delivered");
        Ok(1)
    }

    pub fn run(&self, input: &RunInput) -> Result<RunOutcome, KetchupError> {
        let directory = WorkspaceDirectory::load(self.platform).map_err(KetchupError::Directory)?;
        self.run_with_directory(&directory, input)
    }

    pub fn run_with_directory(
        &self,
        directory: &WorkspaceDirectory,
        input: &RunInput,
    ) -> Result<RunOutcome, KetchupError> {
        let collected = self.collect(directory, input);
        let self_user_id = directory.self_user_id().to_string();
        let title = digest_title(input.run_date);

        if collected.units.is_empty() {
            let mut outcome = RunOutcome {
                status: RunStatus::SkippedEmpty,
                self_user_id,
                units: 0,
                batches: 0,
                failed_paths: collected.failed_paths,
                digest: Digest::default(),
                title,
                blocks: Vec::new(),
                messages_sent: 0,
            };
            match self.options.empty_run {
                EmptyRunPolicy::Skip => info!("nothing collected; no digest sent"),
                EmptyRunPolicy::Notify => {
                    outcome.blocks = nothing_to_report_blocks(input.run_date);
                    outcome.status = RunStatus::NotifiedEmpty;
                    if self.options.deliver {
                        outcome.messages_sent =
                            self.deliver(&outcome.self_user_id, &outcome.title, &outcome.blocks)?;
                    }
                }
            }
            return Ok(outcome);
        }

        let (digest, batches) = self.summarize(directory, &collected.units)?;
        let blocks = digest_blocks(&digest, directory, input.run_date);
        let (status, messages_sent) = if self.options.deliver {
            (RunStatus::Sent, self.deliver(&self_user_id, &title, &blocks)?)
        } else {
            (RunStatus::DryRun, 0)
        };

        Ok(RunOutcome {
            status,
            self_user_id,
            units: collected.units.len(),
            batches,
            failed_paths: collected.failed_paths,
            digest,
            title,
            blocks,
            messages_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregationEngine, EngineOptions, PathSource, RunInput, RunStatus, discovery_paths};
    use crate::digest::config::EmptyRunPolicy;
    use crate::digest::model::UnitKind;
    use crate::digest::testutil::{FakePlatform, FakeSummarizer, bot_msg, hit, msg, reply};
    use crate::error::KetchupError;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashSet;

    const EMPTY_DIGEST: &str = r#"{"actionables": [], "to_catch_up_on": []}"#;
    const ONE_TOPIC: &str = r#"{
        "actionables": [{
            "title": "Answer U0AAA111",
            "channel_id": "D1",
            "summary": "U0AAA111 asked about the launch",
            "current_status": "unanswered",
            "priority": "High",
            "link_to_slack_message": "https://acme.slack.com/archives/D1/p1001"
        }],
        "to_catch_up_on": []
    }"#;

    fn input(channels: &[&str], users: &[&str]) -> RunInput {
        RunInput {
            since: Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap(),
            run_date: NaiveDate::from_ymd_opt(2024, 7, 16).unwrap(),
            followed_channel_ids: channels.iter().map(|s| s.to_string()).collect(),
            followed_user_ids: users.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn options(empty_run: EmptyRunPolicy) -> EngineOptions {
        EngineOptions {
            token_budget: 3000,
            empty_run,
            deliver: true,
            workspace_url: None,
        }
    }

    #[test]
    fn paths_follow_precedence_order() {
        let platform = FakePlatform::new("USELF")
            .with_group("S1", &["USELF"])
            .with_group("S2", &["UOTHER"]);
        let paths = discovery_paths(&platform.directory(), &input(&["C1", "C1", "C2"], &["U2"]));
        let names: Vec<&str> = paths.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "direct_messages",
                "mentions",
                "group:S1",
                "channel:C1",
                "channel:C2",
                "followed_user:U2"
            ]
        );
        assert_eq!(paths[1].source, PathSource::Search("<@USELF>".into()));
        assert_eq!(paths[5].target.attributed_user_id, "U2");
    }

    #[test]
    fn dm_owns_conversation_also_reachable_by_followed_user() {
        let dm_hit = hit("D1", msg("U2", "can you review?", "1001.0"));
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2"])
            .with_search("is:dm", vec![dm_hit.clone()])
            .with_search("<@U2>", vec![dm_hit])
            .with_channel("D1", vec![msg("U2", "can you review?", "1001.0")]);
        let summarizer = FakeSummarizer::replying(&[ONE_TOPIC]);
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let collected = engine.collect(&platform.directory(), &input(&[], &["U2"]));
        assert_eq!(collected.units.len(), 1);
        assert_eq!(collected.units[0].kind, UnitKind::DirectMessage);
        assert_eq!(collected.units[0].attributed_user_id, "USELF");
        assert!(platform.queries.borrow().contains(&"<@U2>".to_string()));
    }

    #[test]
    fn no_thread_or_channel_is_emitted_twice() {
        let thread = vec![
            msg("U2", "incident <@USELF> <@S1>", "2000.0"),
            reply("U3", "on it", "2000.1", "2000.0"),
        ];
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2", "U3"])
            .with_group("S1", &["USELF"])
            .with_search("<@USELF>", vec![hit("C1", msg("U2", "incident", "2000.0"))])
            .with_search("<@S1>", vec![hit("C1", msg("U2", "incident", "2000.0"))])
            .with_search(
                "<@U3>",
                vec![
                    hit("C1", reply("U3", "on it", "2000.1", "2000.0")),
                    hit("C2", msg("U3", "lunch?", "2100.0")),
                ],
            )
            .with_thread("C1", "2000.0", thread)
            .with_channel(
                "C2",
                vec![msg("U3", "lunch?", "2100.0"), bot_msg("B1", "reminder", "2100.5")],
            );
        let summarizer = FakeSummarizer::replying(&[EMPTY_DIGEST]);
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let collected = engine.collect(&platform.directory(), &input(&["C2"], &["U3"]));
        let kinds: Vec<UnitKind> = collected.units.iter().map(|u| u.kind).collect();
        assert_eq!(kinds, vec![UnitKind::MentionThread, UnitKind::FollowedChannel]);

        let threads: HashSet<_> = collected
            .units
            .iter()
            .filter_map(|u| u.thread_id.clone())
            .collect();
        assert_eq!(threads.len(), collected.units.iter().filter(|u| u.is_thread()).count());
        for unit in &collected.units {
            assert!(unit.messages.iter().all(|m| !m.is_bot && !m.text.trim().is_empty()));
        }
    }

    #[test]
    fn followed_channel_does_not_reinline_a_collected_thread() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2", "U3"])
            .with_search(
                "<@USELF>",
                vec![hit("C1", reply("U3", "rollback done <@USELF>", "2000.1", "2000.0"))],
            )
            .with_thread(
                "C1",
                "2000.0",
                vec![
                    reply("U2", "incident root", "2000.0", "2000.0"),
                    reply("U3", "rollback done <@USELF>", "2000.1", "2000.0"),
                ],
            )
            .with_channel(
                "C1",
                vec![
                    reply("U2", "incident root", "2000.0", "2000.0"),
                    msg("U2", "standup moved", "2050.0"),
                ],
            );
        let summarizer = FakeSummarizer::replying(&[EMPTY_DIGEST]);
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let collected = engine.collect(&platform.directory(), &input(&["C1"], &[]));
        let kinds: Vec<UnitKind> = collected.units.iter().map(|u| u.kind).collect();
        assert_eq!(kinds, vec![UnitKind::MentionThread, UnitKind::FollowedChannel]);

        let channel_texts: Vec<&str> = collected.units[1]
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(channel_texts, vec!["incident root", "standup moved"]);

        let reply_count = collected
            .units
            .iter()
            .flat_map(|u| u.messages.iter())
            .filter(|m| m.timestamp == "2000.1")
            .count();
        assert_eq!(reply_count, 1);
    }

    #[test]
    fn failing_path_is_recorded_and_run_continues() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2"])
            .with_failing_search("is:dm")
            .with_search("<@USELF>", vec![hit("C1", msg("U2", "ping", "1001.0"))])
            .with_channel("C1", vec![msg("U2", "ping", "1001.0")])
            .with_failing_channel("C404");
        let summarizer = FakeSummarizer::replying(&[ONE_TOPIC]);
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let outcome = engine.run(&input(&["C404"], &[])).expect("run");
        assert_eq!(outcome.failed_paths, vec!["direct_messages", "channel:C404"]);
        assert_eq!(outcome.units, 1);
        assert_eq!(outcome.status, RunStatus::Sent);
        let sent = platform.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, "USELF");
        assert_eq!(
            sent[0].title,
            ":newspaper: Your Daily Ketchup Summary for July 16, 2024 :newspaper:"
        );
    }

    #[test]
    fn empty_run_skips_summarizer_and_delivery() {
        let platform = FakePlatform::new("USELF");
        let summarizer = FakeSummarizer::default();
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let outcome = engine.run(&input(&[], &[])).expect("run");
        assert_eq!(outcome.status, RunStatus::SkippedEmpty);
        assert!(summarizer.documents.borrow().is_empty());
        assert!(platform.sent.borrow().is_empty());
    }

    #[test]
    fn empty_run_can_notify_instead() {
        let platform = FakePlatform::new("USELF");
        let summarizer = FakeSummarizer::default();
        let engine =
            AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Notify));

        let outcome = engine.run(&input(&[], &[])).expect("run");
        assert_eq!(outcome.status, RunStatus::NotifiedEmpty);
        assert!(summarizer.documents.borrow().is_empty());
        let sent = platform.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].blocks.iter().any(|b| b.to_string().contains("Nothing to report")));
    }

    #[test]
    fn malformed_summary_sends_nothing() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2"])
            .with_search("is:dm", vec![hit("D1", msg("U2", "hi", "1001.0"))])
            .with_channel("D1", vec![msg("U2", "hi", "1001.0")]);
        let summarizer = FakeSummarizer::replying(&[
            r#"{"actionables": [{"title": "x"}], "to_catch_up_on": []}"#,
        ]);
        let engine = AggregationEngine::new(&platform, &summarizer, options(EmptyRunPolicy::Skip));

        let err = engine.run(&input(&[], &[])).expect_err("malformed");
        assert!(matches!(err, KetchupError::MalformedSummaryOutput { .. }));
        assert!(platform.sent.borrow().is_empty());
    }

    #[test]
    fn oversized_activity_is_summarized_in_batches() {
        let platform = FakePlatform::new("USELF")
            .with_users(&["U2"])
            .with_search(
                "is:dm",
                vec![
                    hit("D1", msg("U2", "first conversation", "1001.0")),
                    hit("D2", msg("U2", "second conversation", "1002.0")),
                ],
            )
            .with_channel("D1", vec![msg("U2", "first conversation", "1001.0")])
            .with_channel("D2", vec![msg("U2", "second conversation", "1002.0")]);
        let summarizer = FakeSummarizer::replying(&[ONE_TOPIC, EMPTY_DIGEST]);
        let mut opts = options(EmptyRunPolicy::Skip);
        opts.token_budget = 40;
        opts.deliver = false;
        let engine = AggregationEngine::new(&platform, &summarizer, opts);

        let outcome = engine.run(&input(&[], &[])).expect("run");
        assert_eq!(outcome.batches, 2);
        assert_eq!(outcome.status, RunStatus::DryRun);
        assert_eq!(outcome.digest.actionables.len(), 1);
        let documents = summarizer.documents.borrow();
        assert!(documents[0].contains("channel_id: D1"));
        assert!(documents[1].contains("channel_id: D2"));
        assert!(platform.sent.borrow().is_empty());
    }
}
