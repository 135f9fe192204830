use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::config::load_config;
use crate::digest::paths::resolve_paths;
use crate::digest::watcher;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub once: bool,
    pub dry_run: bool,
}

pub fn run(opts: &WatchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");
    let cfg = load_config()?;
    let paths = resolve_paths()?;

    if !opts.once {
        if opts.dry_run {
            report.issue("invalid flags: --dry-run requires --once");
            return Ok(report);
        }
        watcher::run_daemon(&cfg, &paths)?;
        return Ok(report);
    }

    let cycle = watcher::run_cycle(&cfg, &paths, opts.dry_run)?;
    report.detail(format!("identities={}", cycle.identities));
    report.detail(format!("sent={}", cycle.sent));
    report.detail(format!("empty={}", cycle.empty));
    for failure in cycle.failed {
        report.issue(format!("identity run failed: {failure}"));
    }
    Ok(report)
}
