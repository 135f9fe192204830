use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use super::audit::{self, RunAuditEvent};
use super::config::{KetchupConfig, summarizer_api_key};
use super::engine::{AggregationEngine, EngineOptions, RunInput, RunOutcome};
use super::paths::KetchupPaths;
use super::schedule::{local_date, lookback_start};
use super::store::{IdentityStore, Installation};
use super::summarize::OpenAiSummarizer;
use super::util::now_epoch_secs;
use crate::error::KetchupError;
use crate::slack::SlackClient;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub user_id: String,
    pub team_id: String,
    /// Overrides the scheduled lookback.
    pub since_days: Option<u32>,
    pub dry_run: bool,
}

fn audit_outcome(paths: &KetchupPaths, request: &RunRequest, outcome: &RunOutcome) -> Result<()> {
    audit::append_event(
        paths,
        &RunAuditEvent {
            at_epoch_secs: now_epoch_secs()?,
            user_id: request.user_id.clone(),
            team_id: request.team_id.clone(),
            status: outcome.status.as_str().to_string(),
            code: None,
            units: outcome.units,
            batches: outcome.batches,
            actionables: outcome.digest.actionables.len(),
            to_catch_up_on: outcome.digest.to_catch_up_on.len(),
            failed_paths: outcome.failed_paths.clone(),
            message: format!("messages_sent={}", outcome.messages_sent),
        },
    )
}

fn audit_failure(paths: &KetchupPaths, request: &RunRequest, err: &anyhow::Error) -> Result<()> {
    let code = err
        .downcast_ref::<KetchupError>()
        .map(|e| e.code().as_str().to_string());
    audit::append_event(
        paths,
        &RunAuditEvent {
            at_epoch_secs: now_epoch_secs()?,
            user_id: request.user_id.clone(),
            team_id: request.team_id.clone(),
            status: "failed".to_string(),
            code,
            message: format!("{err:#}"),
            ..RunAuditEvent::default()
        },
    )
}

fn run_input(
    cfg: &KetchupConfig,
    request: &RunRequest,
    now: DateTime<Utc>,
    store: &IdentityStore,
) -> Result<RunInput> {
    let tz = cfg.schedule.tz()?;
    let since = match request.since_days {
        Some(days) => now - TimeDelta::days(i64::from(days)),
        None => lookback_start(now, tz, &cfg.schedule),
    };
    let settings = store.get_user_settings(&request.user_id)?;
    Ok(RunInput {
        since,
        run_date: local_date(now, tz),
        followed_channel_ids: settings.followed_channel_ids.clone(),
        followed_user_ids: settings.followed_user_ids.clone(),
    })
}

fn execute(cfg: &KetchupConfig, paths: &KetchupPaths, request: &RunRequest) -> Result<RunOutcome> {
    let store = IdentityStore::open(&paths.store_file)?;
    let installation = store.get_installation(&request.user_id, &request.team_id)?;
    let input = run_input(cfg, request, Utc::now(), &store)?;

    let client = SlackClient::new(&cfg.slack, &installation.bot_token, &installation.user_token)?;
    let api_key = summarizer_api_key().unwrap_or_default();
    let summarizer = OpenAiSummarizer::new(&cfg.summarizer, &api_key)?;
    let engine = AggregationEngine::new(
        &client,
        &summarizer,
        EngineOptions {
            token_budget: cfg.summarizer.token_budget,
            empty_run: cfg.digest.empty_run,
            deliver: !request.dry_run,
            workspace_url: cfg.slack.workspace_url.clone(),
        },
    );

    info!(
        user_id = request.user_id.as_str(),
        team_id = request.team_id.as_str(),
        since = %input.since,
        "digest run started"
    );
    Ok(engine.run(&input)?)
}

/// One digest run for one identity, audited either way.
pub fn run_for_identity(
    cfg: &KetchupConfig,
    paths: &KetchupPaths,
    request: &RunRequest,
) -> Result<RunOutcome> {
    match execute(cfg, paths, request) {
        Ok(outcome) => {
            audit_outcome(paths, request, &outcome)?;
            info!(
                user_id = request.user_id.as_str(),
                status = outcome.status.as_str(),
                units = outcome.units,
                "digest run finished"
            );
            Ok(outcome)
        }
        Err(err) => {
            let message = format!("{err:#}");
            error!(
                user_id = request.user_id.as_str(),
                error = message.as_str(),
                "digest run failed"
            );
            if let Err(audit_err) = audit_failure(paths, request, &err) {
                warn!(error = %audit_err, "failed to record run failure");
            }
            Err(err)
        }
    }
}

pub struct IdentityRun {
    pub user_id: String,
    pub team_id: String,
    pub result: Result<RunOutcome>,
}

/// Runs every registered identity. One identity failing does not stop the rest.
pub fn run_all(
    cfg: &KetchupConfig,
    paths: &KetchupPaths,
    dry_run: bool,
) -> Result<Vec<IdentityRun>> {
    let store = IdentityStore::open(&paths.store_file)
        .with_context(|| format!("failed to load {}", paths.store_file.display()))?;
    let installations: Vec<Installation> = store.list_installations().to_vec();
    info!(identities = installations.len(), "scheduled run started");

    let mut runs = Vec::with_capacity(installations.len());
    for installation in installations {
        let request = RunRequest {
            user_id: installation.user_id.clone(),
            team_id: installation.team_id.clone(),
            since_days: None,
            dry_run,
        };
        runs.push(IdentityRun {
            user_id: installation.user_id,
            team_id: installation.team_id,
            result: run_for_identity(cfg, paths, &request),
        });
    }
    Ok(runs)
}
