use crate::tracker::config::{DailyWindow, RunMode};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reconcile only.
    Tick,
    /// Reconcile, then post the daily report unless already posted today.
    Daily,
    /// Reconcile, then post a test report that ignores the daily gate.
    Preview,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::Tick => "tick",
            Action::Daily => "daily",
            Action::Preview => "preview",
        }
    }
}

pub fn decide(mode: RunMode, preview: bool, local_time: NaiveTime, window: &DailyWindow) -> Action {
    if preview {
        return Action::Preview;
    }
    match mode {
        RunMode::Hourly => Action::Tick,
        RunMode::Daily => Action::Daily,
        RunMode::Auto if in_window(local_time, window) => Action::Daily,
        RunMode::Auto => Action::Tick,
    }
}

/// Minute-precision, inclusive on both ends.
pub fn in_window(local_time: NaiveTime, window: &DailyWindow) -> bool {
    let at = (local_time.hour(), local_time.minute());
    let start = (window.start.hour(), window.start.minute());
    let end = (window.end.hour(), window.end.minute());
    start <= at && at <= end
}

pub fn to_local(epoch_secs: u64, tz: Tz) -> DateTime<Tz> {
    let utc = i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();
    utc.with_timezone(&tz)
}

/// Local calendar date used as the daily gate key.
pub fn today_label(now_epoch_secs: u64, tz: Tz) -> String {
    to_local(now_epoch_secs, tz).format("%Y-%m-%d").to_string()
}

pub fn format_local_minute(epoch_secs: u64, tz: Tz) -> String {
    to_local(epoch_secs, tz).format("%Y-%m-%d %H:%M").to_string()
}
