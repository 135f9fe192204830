use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::paths::resolve_paths;
use crate::digest::store::{IdentityStore, Installation};
use crate::digest::util::now_epoch_secs;

#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub user_id: String,
    pub team_id: String,
    pub bot_token: String,
    pub user_token: String,
}

fn looks_like(token: &str, prefix: &str) -> bool {
    token.trim().starts_with(prefix)
}

pub fn run(opts: &RegisterOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("register");
    if !looks_like(&opts.bot_token, "xoxb-") {
        report.issue("bot token must start with xoxb-");
    }
    if !looks_like(&opts.user_token, "xoxp-") {
        report.issue("user token must start with xoxp-");
    }
    if !report.ok {
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let mut store = IdentityStore::open(&paths.store_file)?;
    let created = store.upsert_installation(Installation {
        user_id: opts.user_id.trim().to_string(),
        team_id: opts.team_id.trim().to_string(),
        bot_token: opts.bot_token.trim().to_string(),
        user_token: opts.user_token.trim().to_string(),
        installed_at_epoch_secs: now_epoch_secs()?,
    });
    let file = store.save()?;

    report.detail(format!(
        "installation={} user={} team={}",
        if created { "created" } else { "updated" },
        opts.user_id,
        opts.team_id
    ));
    report.detail(format!("store_file={}", file.display()));
    Ok(report)
}
