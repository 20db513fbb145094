use crate::tracker::audit;
use crate::tracker::chunk::paginate;
use crate::tracker::config::TrackerConfig;
use crate::tracker::notifier::Notifier;
use crate::tracker::paths::TrackerPaths;
use crate::tracker::reconcile::reconcile;
use crate::tracker::report::{ReportInput, ReportOutcome, build_report, mark_delivered};
use crate::tracker::roster;
use crate::tracker::schedule::{Action, today_label};
use crate::tracker::scraper::Scraper;
use crate::tracker::state;
use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    /// The action was a plain tick.
    NotRequested,
    /// Nothing to report on because the scrape produced no data.
    NoData,
    Duplicate,
    /// Rendered, but no webhook is configured.
    NoWebhook,
    Delivered { parts: usize },
    Failed { parts: usize, errors: Vec<String> },
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::NotRequested => "not-requested",
            ReportStatus::NoData => "no-data",
            ReportStatus::Duplicate => "duplicate",
            ReportStatus::NoWebhook => "no-webhook",
            ReportStatus::Delivered { .. } => "delivered",
            ReportStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub action: Action,
    pub now_epoch_secs: u64,
    pub today_label: String,
    /// Why the scrape produced no data, if it did not.
    pub scrape_skipped: Option<String>,
    pub online: Vec<String>,
    pub added: Vec<String>,
    pub offline_count: usize,
    pub roster_size: usize,
    pub state_file: Option<String>,
    pub report: ReportStatus,
    pub report_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub parts: usize,
    pub errors: Vec<String>,
}

/// Send every part in order. A failed part does not stop the rest.
pub fn deliver(notifier: &dyn Notifier, parts: &[String]) -> DeliveryOutcome {
    let mut outcome = DeliveryOutcome {
        parts: parts.len(),
        errors: Vec::new(),
    };
    for (idx, part) in parts.iter().enumerate() {
        if let Err(err) = notifier.send(part) {
            tracing::warn!(part = idx + 1, total = parts.len(), "{err}");
            outcome.errors.push(format!("part {}/{}: {err}", idx + 1, parts.len()));
        }
    }
    outcome
}

/// One invocation: scrape, reconcile, persist and, for daily or preview
/// actions, render and deliver the report.
pub fn run_once(
    cfg: &TrackerConfig,
    paths: &TrackerPaths,
    action: Action,
    scraper: &dyn Scraper,
    notifier: Option<&dyn Notifier>,
    now_epoch_secs: u64,
) -> Result<CycleOutcome> {
    let tz = cfg.schedule.tz()?;
    let today = today_label(now_epoch_secs, tz);
    let mut outcome = CycleOutcome {
        action,
        now_epoch_secs,
        today_label: today.clone(),
        scrape_skipped: None,
        online: Vec::new(),
        added: Vec::new(),
        offline_count: 0,
        roster_size: 0,
        state_file: None,
        report: ReportStatus::NotRequested,
        report_text: None,
    };

    let snapshot = match scraper.online_members() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(kind = err.kind(), "{err}; nothing to do this cycle");
            audit::append_event(paths, "tick", "skipped", &format!("kind={} {err}", err.kind()))?;
            outcome.scrape_skipped = Some(err.to_string());
            if action != Action::Tick {
                outcome.report = ReportStatus::NoData;
            }
            return Ok(outcome);
        }
    };

    if snapshot.is_empty() {
        tracing::debug!("no guild members online");
    }

    let mut members = roster::load_set(&paths.members_file);
    let mut presence = state::load(&paths.state_file);
    let reconciled = reconcile(&mut members, &mut presence, &snapshot, now_epoch_secs);

    if !reconciled.added.is_empty() {
        roster::save(&paths.members_file, members.iter())?;
        let added = reconciled.added.join(", ");
        tracing::info!("added to members list: {added}");
        audit::append_event(paths, "roster", "ok", &format!("added={added}"))?;
    }
    let state_file = state::save(&paths.state_file, &presence)?;
    audit::append_event(
        paths,
        "tick",
        "ok",
        &format!(
            "online={} offline={} added={}",
            reconciled.online.len(),
            reconciled.offline_count,
            reconciled.added.len()
        ),
    )?;
    tracing::info!(
        online = reconciled.online.len(),
        offline = reconciled.offline_count,
        roster = members.len(),
        "presence updated"
    );

    outcome.online = reconciled.online;
    outcome.added = reconciled.added;
    outcome.offline_count = reconciled.offline_count;
    outcome.roster_size = members.len();
    outcome.state_file = Some(state_file.display().to_string());

    if action == Action::Tick {
        return Ok(outcome);
    }

    let forced = action == Action::Preview;
    let input = ReportInput {
        roster: &members,
        state: &presence,
        snapshot: &snapshot,
        now_epoch_secs,
        today_label: &today,
        tz,
        server_label: &cfg.site.server_label,
        guild_name: &cfg.site.guild_name,
    };
    let report = match build_report(&input, forced) {
        ReportOutcome::Duplicate => {
            tracing::info!(day = %today, "daily report already posted");
            audit::append_event(paths, "report", "skipped", &format!("reason=duplicate day={today}"))?;
            outcome.report = ReportStatus::Duplicate;
            return Ok(outcome);
        }
        ReportOutcome::Rendered(report) => report,
    };
    outcome.report_text = Some(report.text.clone());

    let Some(notifier) = notifier else {
        tracing::warn!("no webhook configured; skip posting");
        audit::append_event(paths, "report", "skipped", "reason=no-webhook")?;
        outcome.report = ReportStatus::NoWebhook;
        return Ok(outcome);
    };

    let parts = paginate(&report.text, cfg.discord.chunk_limit, cfg.discord.part_counters);
    let delivery = deliver(notifier, &parts);
    if delivery.errors.is_empty() {
        if !forced {
            mark_delivered(&mut presence, &today);
            state::save(&paths.state_file, &presence)?;
        }
        audit::append_event(
            paths,
            "report",
            "ok",
            &format!(
                "parts={} preview={} day={today}",
                delivery.parts, report.preview
            ),
        )?;
        outcome.report = ReportStatus::Delivered {
            parts: delivery.parts,
        };
    } else {
        audit::append_event(
            paths,
            "report",
            "degraded",
            &format!(
                "parts={} failed={} day={today}",
                delivery.parts,
                delivery.errors.len()
            ),
        )?;
        outcome.report = ReportStatus::Failed {
            parts: delivery.parts,
            errors: delivery.errors,
        };
    }

    Ok(outcome)
}
