use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::paths::resolve_paths;
use crate::digest::store::{IdentityStore, UserSettings};
use crate::digest::util::split_csv;

#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    pub user_id: String,
    pub follow_channels: Option<String>,
    pub follow_users: Option<String>,
}

pub fn run(opts: &SettingsOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("settings");
    let paths = resolve_paths()?;
    let mut store = IdentityStore::open(&paths.store_file)?;

    if opts.follow_channels.is_some() || opts.follow_users.is_some() {
        let current = store
            .get_user_settings(&opts.user_id)
            .cloned()
            .unwrap_or_default();
        let updated = UserSettings {
            followed_channel_ids: opts
                .follow_channels
                .as_deref()
                .map(split_csv)
                .unwrap_or(current.followed_channel_ids),
            followed_user_ids: opts
                .follow_users
                .as_deref()
                .map(split_csv)
                .unwrap_or(current.followed_user_ids),
        };
        store.set_user_settings(&opts.user_id, updated);
        let file = store.save()?;
        report.detail(format!("store_file={}", file.display()));
    }

    match store.get_user_settings(&opts.user_id) {
        Ok(settings) => {
            report.detail(format!("user={}", opts.user_id));
            report.detail(format!(
                "followed_channels={}",
                settings.followed_channel_ids.join(",")
            ));
            report.detail(format!(
                "followed_users={}",
                settings.followed_user_ids.join(",")
            ));
        }
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}
