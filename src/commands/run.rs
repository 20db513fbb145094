use anyhow::Result;

use crate::commands::CommandReport;
use crate::tracker::config::{RunMode, load_config};
use crate::tracker::cycle::{ReportStatus, run_once};
use crate::tracker::notifier::{DiscordWebhook, Notifier};
use crate::tracker::paths::resolve_paths;
use crate::tracker::schedule::{decide, format_local_minute, to_local};
use crate::tracker::scraper::SiteScraper;
use crate::tracker::util::now_epoch_secs;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Option<RunMode>,
    pub preview: bool,
    pub print: bool,
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("run");
    let paths = resolve_paths()?;
    let mut cfg = load_config(&paths)?;
    if let Some(mode) = opts.mode {
        cfg.schedule.mode = mode;
    }
    cfg.schedule.preview |= opts.preview;

    let tz = cfg.schedule.tz()?;
    let window = cfg.schedule.window()?;
    let now = now_epoch_secs()?;
    let action = decide(
        cfg.schedule.mode,
        cfg.schedule.preview,
        to_local(now, tz).time(),
        &window,
    );
    tracing::debug!(mode = cfg.schedule.mode.as_str(), action = action.label(), "cycle start");

    let scraper = SiteScraper::from_config(&cfg.site);
    let webhook = DiscordWebhook::from_url(&cfg.discord.webhook_url);
    let notifier = webhook.as_ref().map(|w| w as &dyn Notifier);
    let cycle = run_once(&cfg, &paths, action, &scraper, notifier, now)?;

    report.detail(format!("mode={}", cfg.schedule.mode.as_str()));
    report.detail(format!("action={}", cycle.action.label()));
    report.detail(format!("today={}", cycle.today_label));
    report.detail(format!(
        "observed_at={}",
        format_local_minute(cycle.now_epoch_secs, tz)
    ));
    if let Some(reason) = &cycle.scrape_skipped {
        report.detail(format!("scrape=skipped reason={reason}"));
    } else {
        report.detail(format!("online={}", cycle.online.join(",")));
        report.detail(format!("offline_count={}", cycle.offline_count));
        report.detail(format!("roster_size={}", cycle.roster_size));
        if !cycle.added.is_empty() {
            report.detail(format!("added={}", cycle.added.join(",")));
        }
    }
    if let Some(path) = &cycle.state_file {
        report.detail(format!("state_file={path}"));
    }

    report.detail(format!("report={}", cycle.report.label()));
    match &cycle.report {
        ReportStatus::Delivered { parts } => report.detail(format!("report.parts={parts}")),
        ReportStatus::Failed { parts, errors } => {
            report.detail(format!("report.parts={parts}"));
            for err in errors {
                report.detail(format!("report.error={err}"));
            }
        }
        _ => {}
    }

    if opts.print {
        report.output = cycle.report_text;
    }

    Ok(report)
}
