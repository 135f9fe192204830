use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::config::KetchupConfig;
use super::engine::RunStatus;
use super::paths::KetchupPaths;
use super::pipeline::run_all;
use super::schedule::{is_due, local_date};

#[derive(Debug, Clone, Default)]
pub struct WatchCycleOutcome {
    pub identities: usize,
    pub sent: usize,
    pub empty: usize,
    pub failed: Vec<String>,
}

/// Run every registered identity once.
pub fn run_cycle(
    cfg: &KetchupConfig,
    paths: &KetchupPaths,
    dry_run: bool,
) -> Result<WatchCycleOutcome> {
    let runs = run_all(cfg, paths, dry_run)?;
    let mut outcome = WatchCycleOutcome {
        identities: runs.len(),
        ..WatchCycleOutcome::default()
    };
    for run in runs {
        match run.result {
            Ok(done) => match done.status {
                RunStatus::Sent | RunStatus::DryRun => outcome.sent += 1,
                RunStatus::SkippedEmpty | RunStatus::NotifiedEmpty => outcome.empty += 1,
            },
            Err(err) => {
                warn!(
                    user_id = run.user_id.as_str(),
                    team_id = run.team_id.as_str(),
                    "identity run failed"
                );
                outcome
                    .failed
                    .push(format!("{}@{}: {err:#}", run.user_id, run.team_id));
            }
        }
    }
    Ok(outcome)
}

/// Exclusive hold on `logs/watch.lock` for the daemon's lifetime.
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn acquire(paths: &KetchupPaths) -> Result<Self> {
        fs::create_dir_all(&paths.logs_dir)
            .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.watch_lock)
            .with_context(|| format!("failed to open {}", paths.watch_lock.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!(
                "another watch daemon holds {}",
                paths.watch_lock.display()
            )
        })?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        writeln!(file, "{}", env!("BUILD_UUID"))?;
        Ok(Self {
            file,
            path: paths.watch_lock.clone(),
        })
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

pub fn run_daemon(cfg: &KetchupConfig, paths: &KetchupPaths) -> Result<()> {
    let _lock = DaemonLock::acquire(paths)?;
    let tz = cfg.schedule.tz()?;
    let poll = Duration::from_secs(cfg.schedule.poll_interval_secs);
    let mut last_run: Option<NaiveDate> = None;
    info!(
        timezone = cfg.schedule.timezone.as_str(),
        run_at_hour = cfg.schedule.run_at_hour,
        "watch daemon started"
    );

    loop {
        let now = Utc::now();
        if is_due(now, tz, &cfg.schedule, last_run) {
            last_run = Some(local_date(now, tz));
            match run_cycle(cfg, paths, false) {
                Ok(cycle) => info!(
                    identities = cycle.identities,
                    sent = cycle.sent,
                    empty = cycle.empty,
                    failed = cycle.failed.len(),
                    "scheduled cycle finished"
                ),
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(error = message.as_str(), "scheduled cycle failed");
                }
            }
        }
        thread::sleep(poll);
    }
}
