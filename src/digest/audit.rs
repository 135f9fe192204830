use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;

use super::paths::KetchupPaths;

/// One line of `logs/audit.log` per identity run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunAuditEvent {
    pub at_epoch_secs: u64,
    pub user_id: String,
    pub team_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub units: usize,
    pub batches: usize,
    pub actionables: usize,
    pub to_catch_up_on: usize,
    pub failed_paths: Vec<String>,
    pub message: String,
}

pub fn append_event(paths: &KetchupPaths, event: &RunAuditEvent) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;

    let line = format!("{}\n", serde_json::to_string(event)?);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.audit_log)
        .with_context(|| format!("failed to open {}", paths.audit_log.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
