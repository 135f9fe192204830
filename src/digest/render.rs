use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde_json::{Value, json};
use std::sync::LazyLock;

use super::directory::WorkspaceDirectory;
use super::model::{Digest, DigestTopic};

/// Slack rejects messages with more blocks than this. A full digest fits.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;
/// Slack's limit on a section field's text.
pub const MAX_FIELD_CHARS: usize = 2000;

static IDENTITY_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>|\b[UWS][A-Z0-9]{2,}\b").unwrap());

/// Wrap bare user (`U…`/`W…`) and user group (`S…`) ids in mention markup.
/// Only ids the workspace directory knows are rewritten; tokens already in
/// angle brackets are left alone.
pub fn mention_identities(text: &str, directory: &WorkspaceDirectory) -> String {
    IDENTITY_TOKENS
        .replace_all(text, |caps: &Captures<'_>| {
            let token = &caps[0];
            if token.starts_with('<') {
                token.to_string()
            } else if directory.user(token).is_some() {
                format!("<@{token}>")
            } else if directory.group(token).is_some() {
                format!("<!subteam^{token}>")
            } else {
                token.to_string()
            }
        })
        .into_owned()
}

fn cap_field(text: String) -> String {
    if text.chars().count() <= MAX_FIELD_CHARS {
        return text;
    }
    let mut out: String = text.chars().take(MAX_FIELD_CHARS - 1).collect();
    out.push('…');
    out
}

fn field(label: &str, body: &str) -> Value {
    json!({
        "type": "mrkdwn",
        "text": cap_field(format!("*{label}*\n{body}")),
    })
}

fn header(text: &str) -> Value {
    json!({
        "type": "header",
        "text": {"type": "plain_text", "text": text},
    })
}

fn context(text: &str) -> Value {
    json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": text}],
    })
}

fn divider() -> Value {
    json!({"type": "divider"})
}

fn action_items_text(topic: &DigestTopic, directory: &WorkspaceDirectory) -> String {
    if topic.action_items.is_empty() {
        return "None".to_string();
    }
    topic
        .action_items
        .iter()
        .map(|item| format!("• {}", mention_identities(item, directory)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn links_text(topic: &DigestTopic) -> String {
    let mut lines = vec![format!("• <{}|Original message>", topic.source_message_link)];
    lines.extend(
        topic
            .links
            .iter()
            .map(|link| format!("• <{}|{}>", link.url, link.link_summary)),
    );
    lines.join("\n")
}

fn topic_section(idx: usize, topic: &DigestTopic, directory: &WorkspaceDirectory) -> Value {
    json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": cap_field(format!("*{}. {}*", idx + 1, topic.title)),
        },
        "fields": [
            field("Priority", topic.priority.marker()),
            field(
                "Current Status",
                &mention_identities(&topic.current_status, directory),
            ),
            field("Summary", &mention_identities(&topic.summary, directory)),
            field("Action Items", &action_items_text(topic, directory)),
            field("Links", &links_text(topic)),
            field("Source", &format!("<#{}>", topic.channel_id)),
        ],
    })
}

/// Topics separated by dividers, with none after the last one.
fn push_topics(blocks: &mut Vec<Value>, topics: &[DigestTopic], directory: &WorkspaceDirectory) {
    if topics.is_empty() {
        blocks.push(context("Nothing here today."));
        return;
    }
    for (idx, topic) in topics.iter().enumerate() {
        if idx > 0 {
            blocks.push(divider());
        }
        blocks.push(topic_section(idx, topic, directory));
    }
}

fn page_top(run_date: NaiveDate, tagline: &str) -> Vec<Value> {
    vec![
        header(":newspaper:  Your Daily Ketchup Summary :newspaper:"),
        context(&format!("*{}* | {tagline}", run_date.format("%B %d, %Y"))),
        divider(),
    ]
}

/// Notification text of the delivered message.
pub fn digest_title(run_date: NaiveDate) -> String {
    format!(
        ":newspaper: Your Daily Ketchup Summary for {} :newspaper:",
        run_date.format("%B %d, %Y")
    )
}

/// The whole digest as one message. With 8 actionables and 15 catch-up
/// topics this is exactly `MAX_BLOCKS_PER_MESSAGE` blocks.
pub fn digest_blocks(
    digest: &Digest,
    directory: &WorkspaceDirectory,
    run_date: NaiveDate,
) -> Vec<Value> {
    let mut blocks = page_top(run_date, "What happened yesterday");
    blocks.push(header(":dart: Actionables"));
    push_topics(&mut blocks, &digest.actionables, directory);
    blocks.push(divider());
    blocks.push(header(":bee: To catch up on"));
    push_topics(&mut blocks, &digest.to_catch_up_on, directory);
    blocks
}

pub fn nothing_to_report_blocks(run_date: NaiveDate) -> Vec<Value> {
    let mut blocks = page_top(run_date, "Nothing to report");
    blocks.push(context(
        "No direct messages, mentions, or followed activity since your last digest.",
    ));
    blocks
}
