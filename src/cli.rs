use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "ketchup", version, about = "Daily Slack catch-up digests")]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build and deliver one digest for an identity.
    Run {
        #[arg(long)]
        user: String,
        #[arg(long)]
        team: String,
        /// Look back this many days instead of the schedule default.
        #[arg(long)]
        since_days: Option<u32>,
        /// Print the rendered blocks instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every registered identity on the daily schedule.
    Watch {
        /// Run every identity now, then exit.
        #[arg(long)]
        once: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Store tokens for an identity.
    Register {
        #[arg(long)]
        user: String,
        #[arg(long)]
        team: String,
        #[arg(long, env = "KETCHUP_BOT_TOKEN", hide_env_values = true)]
        bot_token: String,
        #[arg(long, env = "KETCHUP_USER_TOKEN", hide_env_values = true)]
        user_token: String,
    },
    /// Show or replace followed channels and users.
    Settings {
        #[arg(long)]
        user: String,
        /// Comma separated channel ids; an empty value clears the list.
        #[arg(long)]
        follow_channels: Option<String>,
        /// Comma separated user ids; an empty value clears the list.
        #[arg(long)]
        follow_users: Option<String>,
    },
    /// Estimate token cost of a file (or stdin) and its batch split.
    Estimate {
        #[arg(long)]
        budget: Option<usize>,
        file: Option<PathBuf>,
    },
    /// Print the resolved configuration.
    Config,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let report = match cli.command {
        Command::Run {
            user,
            team,
            since_days,
            dry_run,
        } => commands::run::run(&commands::run::RunOptions {
            user_id: user,
            team_id: team,
            since_days,
            dry_run,
        })?,
        Command::Watch { once, dry_run } => {
            commands::watch::run(&commands::watch::WatchOptions { once, dry_run })?
        }
        Command::Register {
            user,
            team,
            bot_token,
            user_token,
        } => commands::register::run(&commands::register::RegisterOptions {
            user_id: user,
            team_id: team,
            bot_token,
            user_token,
        })?,
        Command::Settings {
            user,
            follow_channels,
            follow_users,
        } => commands::settings::run(&commands::settings::SettingsOptions {
            user_id: user,
            follow_channels,
            follow_users,
        })?,
        Command::Estimate { budget, file } => {
            commands::estimate::run(&commands::estimate::EstimateOptions { budget, file })?
        }
        Command::Config => commands::config::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
