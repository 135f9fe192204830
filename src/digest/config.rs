use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub api_base: String,
    pub search_page_size: u32,
    pub history_page_size: u32,
    pub write_retry_attempts: u32,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub workspace_url: Option<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: "https://slack.com/api".to_string(),
            search_page_size: 100,
            history_page_size: 200,
            write_retry_attempts: 3,
            request_timeout_secs: 30,
            workspace_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub token_budget: usize,
    pub request_timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            token_budget: 3000,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRunPolicy {
    /// Send nothing when a run collects no conversations.
    Skip,
    /// Send a fixed "nothing to report" digest.
    Notify,
}

impl EmptyRunPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Notify => "notify",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "skip" => Some(Self::Skip),
            "notify" => Some(Self::Notify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    pub empty_run: EmptyRunPolicy,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            empty_run: EmptyRunPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub timezone: String,
    pub run_at_hour: u32,
    pub default_lookback_days: u32,
    pub week_start_lookback_days: u32,
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            run_at_hour: 8,
            default_lookback_days: 1,
            week_start_lookback_days: 3,
            poll_interval_secs: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid schedule timezone `{}`: {err}", self.timezone))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KetchupConfig {
    pub slack: SlackConfig,
    pub summarizer: SummarizerConfig,
    pub digest: DigestConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialKetchupConfig {
    slack: Option<SlackConfig>,
    summarizer: Option<SummarizerConfig>,
    digest: Option<DigestConfig>,
    schedule: Option<ScheduleConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &KetchupConfig) -> Result<()> {
    if cfg.slack.api_base.trim().is_empty() {
        return Err(anyhow!("invalid slack api base: cannot be empty"));
    }
    if cfg.slack.search_page_size == 0 || cfg.slack.history_page_size == 0 {
        return Err(anyhow!("invalid slack page size: must be >= 1"));
    }
    if cfg.slack.write_retry_attempts == 0 {
        return Err(anyhow!("invalid slack write retry attempts: must be >= 1"));
    }
    if cfg.summarizer.token_budget == 0 {
        return Err(anyhow!("invalid summarizer token budget: must be >= 1"));
    }
    let t = cfg.summarizer.temperature;
    if !(0.0..=2.0).contains(&t) {
        return Err(anyhow!("invalid summarizer temperature: require 0 <= t <= 2"));
    }
    if cfg.summarizer.model.trim().is_empty() {
        return Err(anyhow!("invalid summarizer model: cannot be empty"));
    }
    cfg.schedule.tz()?;
    if cfg.schedule.run_at_hour > 23 {
        return Err(anyhow!("invalid schedule run hour: require 0..=23"));
    }
    if cfg.schedule.default_lookback_days == 0 || cfg.schedule.week_start_lookback_days == 0 {
        return Err(anyhow!("invalid schedule lookback: must be >= 1 day"));
    }
    if cfg.schedule.poll_interval_secs == 0 {
        return Err(anyhow!(
            "invalid schedule poll interval: must be >= 1 second"
        ));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("KETCHUP_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".ketchup").join("ketchup.toml"))
}

fn merge_file_config(base: &mut KetchupConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse ketchup config {}: {err}", path.display()))
}

fn merge_toml(base: &mut KetchupConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialKetchupConfig = toml::from_str(raw)?;
    if let Some(slack) = parsed.slack {
        base.slack = slack;
    }
    if let Some(summarizer) = parsed.summarizer {
        base.summarizer = summarizer;
    }
    if let Some(digest) = parsed.digest {
        base.digest = digest;
    }
    if let Some(schedule) = parsed.schedule {
        base.schedule = schedule;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut KetchupConfig) -> Result<()> {
    cfg.slack.api_base = env_or_string("KETCHUP_SLACK_API_BASE", &cfg.slack.api_base);
    cfg.slack.search_page_size =
        env_or_u32("KETCHUP_SLACK_SEARCH_PAGE_SIZE", cfg.slack.search_page_size);
    cfg.slack.history_page_size =
        env_or_u32("KETCHUP_SLACK_HISTORY_PAGE_SIZE", cfg.slack.history_page_size);
    cfg.slack.write_retry_attempts = env_or_u32(
        "KETCHUP_SLACK_WRITE_RETRY_ATTEMPTS",
        cfg.slack.write_retry_attempts,
    );
    cfg.slack.request_timeout_secs =
        env_or_u64("KETCHUP_SLACK_TIMEOUT_SECS", cfg.slack.request_timeout_secs);
    cfg.slack.workspace_url =
        env_optional_string("KETCHUP_SLACK_WORKSPACE_URL", cfg.slack.workspace_url.take());

    cfg.summarizer.base_url =
        env_or_string("KETCHUP_SUMMARIZER_BASE_URL", &cfg.summarizer.base_url);
    cfg.summarizer.model = env_or_string("KETCHUP_SUMMARIZER_MODEL", &cfg.summarizer.model);
    cfg.summarizer.temperature =
        env_or_f64("KETCHUP_SUMMARIZER_TEMPERATURE", cfg.summarizer.temperature);
    cfg.summarizer.token_budget = env_or_u64(
        "KETCHUP_SUMMARIZER_TOKEN_BUDGET",
        cfg.summarizer.token_budget as u64,
    ) as usize;
    cfg.summarizer.request_timeout_secs = env_or_u64(
        "KETCHUP_SUMMARIZER_TIMEOUT_SECS",
        cfg.summarizer.request_timeout_secs,
    );

    let empty_run = env_or_string("KETCHUP_EMPTY_RUN", cfg.digest.empty_run.as_str());
    cfg.digest.empty_run = EmptyRunPolicy::parse(&empty_run)
        .ok_or_else(|| anyhow!("invalid empty run policy `{empty_run}`: use `skip` or `notify`"))?;

    cfg.schedule.timezone = env_or_string("KETCHUP_TIMEZONE", &cfg.schedule.timezone);
    cfg.schedule.run_at_hour = env_or_u32("KETCHUP_RUN_AT_HOUR", cfg.schedule.run_at_hour);
    cfg.schedule.default_lookback_days = env_or_u32(
        "KETCHUP_LOOKBACK_DAYS",
        cfg.schedule.default_lookback_days,
    );
    cfg.schedule.week_start_lookback_days = env_or_u32(
        "KETCHUP_WEEK_START_LOOKBACK_DAYS",
        cfg.schedule.week_start_lookback_days,
    );
    cfg.schedule.poll_interval_secs =
        env_or_u64("KETCHUP_POLL_INTERVAL_SECS", cfg.schedule.poll_interval_secs);
    Ok(())
}

pub fn load_config() -> Result<KetchupConfig> {
    let mut cfg = KetchupConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Summarizer API key. Only read from the environment.
pub fn summarizer_api_key() -> Option<String> {
    ["KETCHUP_OPENAI_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
