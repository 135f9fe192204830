use anyhow::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::digest::config::load_config;
use crate::digest::tokens;

#[derive(Debug, Clone, Default)]
pub struct EstimateOptions {
    pub budget: Option<usize>,
    /// Reads stdin when absent.
    pub file: Option<PathBuf>,
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

pub fn run(opts: &EstimateOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("estimate");
    let budget = match opts.budget {
        Some(budget) => budget,
        None => load_config()?.summarizer.token_budget,
    };
    if budget == 0 {
        report.issue("invalid --budget: must be >= 1");
        return Ok(report);
    }

    let text = read_input(opts.file.as_ref())?;
    let lines: Vec<&str> = text.lines().collect();
    let batches = tokens::split(lines, budget);

    report.detail(format!("tokens={}", tokens::estimate(&text)));
    report.detail(format!("budget={budget}"));
    report.detail(format!("batches={}", batches.len()));
    for (idx, batch) in batches.iter().enumerate() {
        let cost: usize = batch.iter().map(|line| tokens::estimate(line)).sum();
        let marker = if cost > budget { " oversized" } else { "" };
        report.detail(format!(
            "batch[{idx}] lines={} tokens={cost}{marker}",
            batch.len()
        ));
    }
    Ok(report)
}
