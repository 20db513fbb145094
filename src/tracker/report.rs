use crate::tracker::names::{NameSet, name_key};
use crate::tracker::schedule::format_local_minute;
use crate::tracker::state::PresenceState;
use chrono_tz::Tz;
use std::cmp::Reverse;
use std::collections::HashMap;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Everything the daily summary is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub roster: &'a NameSet,
    pub state: &'a PresenceState,
    pub snapshot: &'a NameSet,
    pub now_epoch_secs: u64,
    pub today_label: &'a str,
    pub tz: Tz,
    pub server_label: &'a str,
    pub guild_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    /// Member names in render order.
    pub order: Vec<String>,
    pub preview: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Today's report already went out; nothing was rendered.
    Duplicate,
    Rendered(Report),
}

#[derive(Debug)]
struct Entry {
    name: String,
    online: bool,
    last_seen: u64,
}

/// Staircase relative age: seconds below 90s, minutes below 90m, hours
/// below 48h, days beyond. Each unit is floored.
pub fn human_delta(seconds: u64) -> String {
    if seconds < 90 {
        format!("{seconds}s ago")
    } else if seconds < 90 * MINUTE {
        format!("{}m ago", seconds / MINUTE)
    } else if seconds < 48 * HOUR {
        format!("{}h ago", seconds / HOUR)
    } else {
        format!("{}d ago", seconds / DAY)
    }
}

fn header(input: &ReportInput<'_>, preview: bool) -> String {
    let marker = if preview { "[Test] " } else { "" };
    format!(
        "**{marker}{} – {} last seen · {}**",
        input.server_label, input.guild_name, input.today_label
    )
}

fn render_line(entry: &Entry, now_epoch_secs: u64, tz: Tz) -> String {
    if entry.online {
        return format!("{} — currently online and grinding", entry.name);
    }
    if entry.last_seen == 0 {
        return format!("{} — no sightings yet", entry.name);
    }
    format!(
        "{} — last seen {} ({})",
        entry.name,
        format_local_minute(entry.last_seen, tz),
        human_delta(now_epoch_secs.saturating_sub(entry.last_seen))
    )
}

fn collect_entries(input: &ReportInput<'_>) -> Vec<Entry> {
    let mut universe = input.roster.clone();
    universe.extend(input.state.names());
    universe.extend(input.snapshot.iter());

    let mut seen_by_key: HashMap<String, u64> = HashMap::new();
    for (name, ts) in &input.state.last_seen {
        let slot = seen_by_key.entry(name_key(name)).or_insert(0);
        *slot = (*slot).max(*ts);
    }

    let mut entries: Vec<Entry> = universe
        .iter()
        .map(|name| Entry {
            name: name.to_string(),
            online: input.snapshot.contains(name),
            last_seen: seen_by_key.get(&name_key(name)).copied().unwrap_or(0),
        })
        .collect();
    entries.sort_by_key(|e| (Reverse(e.online), Reverse(e.last_seen), name_key(&e.name)));
    entries
}

/// Render the daily summary.
///
/// Unless `forced`, a report already delivered for `today_label` yields
/// [`ReportOutcome::Duplicate`]. Rendering never touches the gate; call
/// [`mark_delivered`] once delivery succeeded.
pub fn build_report(input: &ReportInput<'_>, forced: bool) -> ReportOutcome {
    if !forced && input.state.reported_on(input.today_label) {
        return ReportOutcome::Duplicate;
    }

    let entries = collect_entries(input);
    let mut lines = vec![header(input, forced)];
    if entries.is_empty() {
        lines.push("No members tracked yet.".to_string());
    }
    lines.extend(
        entries
            .iter()
            .map(|e| render_line(e, input.now_epoch_secs, input.tz)),
    );

    ReportOutcome::Rendered(Report {
        text: lines.join("\n"),
        order: entries.into_iter().map(|e| e.name).collect(),
        preview: forced,
    })
}

pub fn mark_delivered(state: &mut PresenceState, today_label: &str) {
    state.last_report_date = today_label.to_string();
}
