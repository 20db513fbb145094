use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::tracker::audit::audit_log_path;
use crate::tracker::config::{load_config, unknown_env_keys};
use crate::tracker::paths::resolve_paths;
use crate::tracker::roster;
use crate::tracker::state::{self, Status};

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("state_file={}", paths.state_file.display()));
    report.detail(format!("members_file={}", paths.members_file.display()));
    report.detail(format!("audit_log={}", audit_log_path(&paths).display()));
    report.detail(format!("config_file={}", paths.config_file.display()));

    match &cfg.site.source_file {
        Some(file) => report.detail(format!("site.source_file={file}")),
        None => report.detail(format!("site.url={}", cfg.site.url)),
    }
    report.detail(format!("site.server={}", cfg.site.server_label));
    report.detail(format!("site.guild={}", cfg.site.guild_name));
    report.detail(format!("schedule.mode={}", cfg.schedule.mode.as_str()));
    report.detail(format!("schedule.timezone={}", cfg.schedule.timezone));
    report.detail(format!(
        "schedule.daily_window={}-{}",
        cfg.schedule.daily_window_start, cfg.schedule.daily_window_end
    ));
    report.detail(format!(
        "discord.webhook={}",
        if cfg.discord.webhook_url.trim().is_empty() {
            "unset"
        } else {
            "set"
        }
    ));

    let members = roster::load_set(&paths.members_file);
    report.detail(format!("roster.size={}", members.len()));

    match state::try_load(&paths.state_file) {
        Ok(presence) => {
            let online = presence
                .last_status
                .values()
                .filter(|s| **s == Status::Online)
                .count();
            report.detail(format!("state.tracked={}", presence.last_seen.len()));
            report.detail(format!("state.online={online}"));
            report.detail(format!(
                "state.last_report_date={}",
                if presence.last_report_date.is_empty() {
                    "never"
                } else {
                    presence.last_report_date.as_str()
                }
            ));
        }
        Err(err) => report.issue(format!("{err}; the next run starts over")),
    }

    for key in unknown_env_keys(env::vars().map(|(k, _)| k)) {
        report.issue(format!("unrecognised environment variable {key}"));
    }

    Ok(report)
}
