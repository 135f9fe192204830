use super::model::{ConversationUnit, RawMessage, UnitKind};

fn describe(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::DirectMessage => "a direct message",
        UnitKind::DirectMessageThread => "a direct message thread",
        UnitKind::MentionChannel | UnitKind::FollowedUserChannel => "a channel conversation",
        UnitKind::MentionThread | UnitKind::FollowedUserThread => "a channel thread",
        UnitKind::GroupMention => "a group mention",
        UnitKind::FollowedChannel => "a followed channel",
    }
}

fn reason(kind: UnitKind, attributed: &str) -> String {
    match kind {
        UnitKind::DirectMessage | UnitKind::DirectMessageThread => {
            format!("I am in this conversation as '{attributed}'")
        }
        UnitKind::MentionChannel | UnitKind::MentionThread => {
            format!("I am tagged into this as '{attributed}'")
        }
        UnitKind::GroupMention => format!("My user group '{attributed}' is tagged into this"),
        UnitKind::FollowedChannel => "I follow this channel".to_string(),
        UnitKind::FollowedUserChannel | UnitKind::FollowedUserThread => {
            format!("I am following the user '{attributed}'")
        }
    }
}

pub fn header(unit: &ConversationUnit) -> String {
    let mut out = format!(
        "# start of {} kind: {}, channel_id: {}",
        describe(unit.kind),
        unit.kind,
        unit.channel_id
    );
    if let Some(thread_id) = &unit.thread_id {
        out.push_str(&format!(", thread_ts: {thread_id}"));
    }
    out.push_str(&format!(
        ", attributed_to: {}. {}:",
        unit.attributed_user_id,
        reason(unit.kind, &unit.attributed_user_id)
    ));
    out
}

/// `author: text` with line breaks escaped to a literal `\n`.
pub fn message_line(message: &RawMessage) -> String {
    let body = message.text.replace('\r', "").replace('\n', "\\n");
    format!("{}: {}", message.author_id, body)
}

/// One unit as a self-contained fragment, trailing blank line included.
pub fn render_unit(unit: &ConversationUnit) -> String {
    let mut out = header(unit);
    out.push('\n');
    let lines: Vec<String> = unit.messages.iter().map(message_line).collect();
    out.push_str(&lines.join("\n"));
    out.push_str("\n\n");
    out
}

pub fn unit_fragments(units: &[ConversationUnit]) -> Vec<String> {
    units.iter().map(render_unit).collect()
}

pub fn render_document(units: &[ConversationUnit]) -> String {
    unit_fragments(units).concat()
}
