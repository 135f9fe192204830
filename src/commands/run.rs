use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::config::load_config;
use crate::digest::paths::resolve_paths;
use crate::digest::pipeline::{RunRequest, run_for_identity};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub user_id: String,
    pub team_id: String,
    pub since_days: Option<u32>,
    pub dry_run: bool,
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("run");
    if opts.since_days == Some(0) {
        report.issue("invalid --since-days: must be >= 1");
        return Ok(report);
    }

    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let outcome = run_for_identity(
        &cfg,
        &paths,
        &RunRequest {
            user_id: opts.user_id.clone(),
            team_id: opts.team_id.clone(),
            since_days: opts.since_days,
            dry_run: opts.dry_run,
        },
    )?;

    report.detail(format!("status={}", outcome.status.as_str()));
    report.detail(format!("self_user_id={}", outcome.self_user_id));
    report.detail(format!("units={}", outcome.units));
    report.detail(format!("batches={}", outcome.batches));
    report.detail(format!("actionables={}", outcome.digest.actionables.len()));
    report.detail(format!(
        "to_catch_up_on={}",
        outcome.digest.to_catch_up_on.len()
    ));
    report.detail(format!("messages_sent={}", outcome.messages_sent));
    if !outcome.failed_paths.is_empty() {
        report.detail(format!("failed_paths={}", outcome.failed_paths.join(",")));
    }
    if opts.dry_run && !outcome.blocks.is_empty() {
        report.detail(format!("title={}", outcome.title));
        report.detail(format!(
            "blocks={}",
            serde_json::to_string_pretty(&outcome.blocks)?
        ));
    }
    Ok(report)
}
