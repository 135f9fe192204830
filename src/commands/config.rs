use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::config::{load_config, resolve_config_path, summarizer_api_key};
use crate::digest::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/ketchup_env_allowlist.rs"));

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("config");
    let cfg = load_config()?;
    let paths = resolve_paths()?;

    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (absent, defaults)", path.display())),
        None => report.detail("config_file=unresolved (defaults)"),
    }
    report.detail(format!("ketchup_home={}", paths.ketchup_home.display()));
    report.detail(format!("store_file={}", paths.store_file.display()));
    report.detail(format!("audit_log={}", paths.audit_log.display()));

    report.detail(format!("slack.api_base={}", cfg.slack.api_base));
    report.detail(format!("slack.search_page_size={}", cfg.slack.search_page_size));
    report.detail(format!("slack.history_page_size={}", cfg.slack.history_page_size));
    report.detail(format!(
        "slack.write_retry_attempts={}",
        cfg.slack.write_retry_attempts
    ));
    report.detail(format!(
        "slack.workspace_url={}",
        cfg.slack.workspace_url.as_deref().unwrap_or("-")
    ));
    report.detail(format!("summarizer.base_url={}", cfg.summarizer.base_url));
    report.detail(format!("summarizer.model={}", cfg.summarizer.model));
    report.detail(format!("summarizer.temperature={}", cfg.summarizer.temperature));
    report.detail(format!("summarizer.token_budget={}", cfg.summarizer.token_budget));
    report.detail(format!(
        "summarizer.api_key={}",
        if summarizer_api_key().is_some() { "set" } else { "missing" }
    ));
    report.detail(format!("digest.empty_run={}", cfg.digest.empty_run.as_str()));
    report.detail(format!("schedule.timezone={}", cfg.schedule.timezone));
    report.detail(format!("schedule.run_at_hour={}", cfg.schedule.run_at_hour));
    report.detail(format!(
        "schedule.lookback_days={} (week start {})",
        cfg.schedule.default_lookback_days, cfg.schedule.week_start_lookback_days
    ));
    report.detail(format!(
        "env_keys={}",
        GENERATED_KETCHUP_ENV_ALLOWLIST.join(",")
    ));
    Ok(report)
}
