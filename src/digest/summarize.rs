use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::config::SummarizerConfig;
use super::model::Digest;

/// One batch of the serialized activity document plus what the model needs
/// to know about whose digest it is.
#[derive(Debug, Clone)]
pub struct SummaryRequest<'a> {
    pub self_user_id: &'a str,
    pub workspace_url: Option<&'a str>,
    pub document: &'a str,
}

/// Turns an activity document into the raw JSON text of a digest.
pub trait Summarizer {
    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String>;
}

pub struct OpenAiSummarizer {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

const SYSTEM_PROMPT: &[&str] = &[
    "The chat log is a sequence of conversations. Each one starts with a line beginning with `# start of` that names the conversation kind, its channel_id, its thread_ts when it is a thread, and the identity it was collected for.",
    "After that header comes one line per message in the format `Speaker: Message`.",
    "Users are identified by IDs that start with U or W followed by uppercase letters and digits, for example U01L15W16EP.",
    "User groups are identified by IDs that start with S, for example S03FGDTNAAV.",
    "A literal `\\n` inside a message is a line break.",
];

fn build_user_prompt(request: &SummaryRequest<'_>) -> String {
    let link_example = match request.workspace_url {
        Some(url) => format!(
            "{}/archives/<channel_id>/p<ts without the dot>",
            url.trim_end_matches('/')
        ),
        None => {
            "https://<workspace>.slack.com/archives/<channel_id>/p<ts without the dot>".to_string()
        }
    };

    let mut lines = vec![
        format!(
            "I am the user {}. Summarize these conversations into topics so I can catch up on work,",
            request.self_user_id
        ),
        "especially where I still owe someone an answer or a follow-up.".to_string(),
        "Several topics may be discussed in one conversation.".to_string(),
        String::new(),
        "Return a JSON object with exactly two arrays:".to_string(),
        format!(
            "- `actionables`: at most {} topics I need to follow up on.",
            Digest::MAX_ACTIONABLES
        ),
        format!(
            "- `to_catch_up_on`: at most {} topics worth knowing about.",
            Digest::MAX_TO_CATCH_UP_ON
        ),
        String::new(),
        "Each topic has these fields:".to_string(),
        "- `title`: a short title.".to_string(),
        "- `channel_id`: the channel the conversation happened in.".to_string(),
        "- `summary`: background, what was discussed, who said what, and the likely impact."
            .to_string(),
        "- `current_status`: where the discussion stands now.".to_string(),
        "- `action_items`: strings, each saying who will do what.".to_string(),
        "- `priority`: one of `Low`, `Medium`, `High`.".to_string(),
        "- `links`: documents or meetings to follow up on, each with `url` and `link_summary`."
            .to_string(),
        format!(
            "- `link_to_slack_message`: a link to the originating message such as {link_example}."
        ),
        String::new(),
        "No topic may appear in both arrays. Return only the JSON object.".to_string(),
        String::new(),
        "The chat log is as follows:".to_string(),
        String::new(),
    ];
    lines.push(request.document.to_string());
    lines.join("\n")
}

fn extract_chat_content(json: &Value) -> Option<String> {
    json.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(ToOwned::to_owned)
}

impl OpenAiSummarizer {
    pub fn new(cfg: &SummarizerConfig, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("failed to create summarizer client")?;
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!("summarizer api key missing; set OPENAI_API_KEY");
        }
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT.join("\n")},
                {"role": "user", "content": build_user_prompt(request)},
            ],
        });

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .context("summarizer request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("summarizer call failed with status {}", response.status());
        }

        let json: Value = response.json().context("summarizer returned invalid json")?;
        let text = extract_chat_content(&json)
            .context("summarizer response missing message content")?;
        debug!(model = self.model.as_str(), chars = text.len(), "summarizer replied");
        Ok(text)
    }
}
