use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::warn;

use super::model::{Digest, DigestTopic};
use crate::error::KetchupError;

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn malformed(reason: impl Into<String>, raw: &str) -> KetchupError {
    KetchupError::MalformedSummaryOutput {
        reason: reason.into(),
        payload: raw.to_string(),
    }
}

fn parse_topics(root: &Value, field: &str, raw: &str) -> Result<Vec<DigestTopic>, KetchupError> {
    let items = root
        .get(field)
        .ok_or_else(|| malformed(format!("missing `{field}` array"), raw))?
        .as_array()
        .ok_or_else(|| malformed(format!("`{field}` is not an array"), raw))?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value::<DigestTopic>(item.clone())
                .map_err(|err| malformed(format!("{field}[{idx}]: {err}"), raw))
        })
        .collect()
}

/// Strict parse of one model reply. Any schema violation rejects the whole
/// reply; nothing partial is salvaged.
pub fn parse_digest(raw: &str) -> Result<Digest, KetchupError> {
    let body = strip_code_fence(raw);
    let root: Value =
        serde_json::from_str(body).map_err(|err| malformed(format!("not json: {err}"), raw))?;
    if !root.is_object() {
        return Err(malformed("top level is not an object", raw));
    }
    Ok(Digest {
        actionables: parse_topics(&root, "actionables", raw)?,
        to_catch_up_on: parse_topics(&root, "to_catch_up_on", raw)?,
    })
}

fn dedupe(digest: Digest) -> Digest {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut keep = |topic: &DigestTopic| {
        let (title, channel) = topic.key();
        seen.insert((title.to_string(), channel.to_string()))
    };

    let before = digest.actionables.len();
    let actionables: Vec<DigestTopic> =
        digest.actionables.into_iter().filter(|t| keep(t)).collect();
    if actionables.len() < before {
        warn!(
            dropped = before - actionables.len(),
            "dropped duplicate actionables"
        );
    }

    let before = digest.to_catch_up_on.len();
    let to_catch_up_on: Vec<DigestTopic> =
        digest.to_catch_up_on.into_iter().filter(|t| keep(t)).collect();
    if to_catch_up_on.len() < before {
        warn!(
            dropped = before - to_catch_up_on.len(),
            "dropped duplicate catch-up topics"
        );
    }
    Digest {
        actionables,
        to_catch_up_on,
    }
}

fn truncate(mut digest: Digest) -> Digest {
    if digest.actionables.len() > Digest::MAX_ACTIONABLES {
        warn!(
            got = digest.actionables.len(),
            max = Digest::MAX_ACTIONABLES,
            "truncating actionables"
        );
        digest.actionables.truncate(Digest::MAX_ACTIONABLES);
    }
    if digest.to_catch_up_on.len() > Digest::MAX_TO_CATCH_UP_ON {
        warn!(
            got = digest.to_catch_up_on.len(),
            max = Digest::MAX_TO_CATCH_UP_ON,
            "truncating catch-up topics"
        );
        digest.to_catch_up_on.truncate(Digest::MAX_TO_CATCH_UP_ON);
    }
    digest
}

/// Enforce list bounds and disjointness on one accepted digest.
pub fn normalize(digest: Digest) -> Digest {
    truncate(dedupe(digest))
}

/// Combine per-batch digests: batch order, then priority (High first).
pub fn merge(digests: Vec<Digest>) -> Digest {
    if digests.len() == 1 {
        return normalize(digests.into_iter().next().unwrap_or_default());
    }
    let mut combined = Digest::default();
    for digest in digests {
        combined.actionables.extend(digest.actionables);
        combined.to_catch_up_on.extend(digest.to_catch_up_on);
    }
    let mut combined = dedupe(combined);
    combined.actionables.sort_by_key(|t| Reverse(t.priority));
    combined.to_catch_up_on.sort_by_key(|t| Reverse(t.priority));
    truncate(combined)
}
