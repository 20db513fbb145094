use crate::error::TrackerError;
use crate::tracker::util::write_atomic;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    #[default]
    Offline,
}

/// Durable presence record: per-name last sighting, last status and the
/// daily report gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceState {
    pub schema_version: u32,
    /// Epoch seconds of the last sighting; `0` means never seen online.
    pub last_seen: BTreeMap<String, u64>,
    pub last_status: BTreeMap<String, Status>,
    /// Local ISO date of the last delivered daily report, empty if never.
    pub last_report_date: String,
    /// Older files carry the gate under this key, sometimes next to the new one.
    #[serde(rename = "last_daily_date", skip_serializing)]
    pub legacy_report_date: String,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_seen: BTreeMap::new(),
            last_status: BTreeMap::new(),
            last_report_date: String::new(),
            legacy_report_date: String::new(),
        }
    }
}

impl PresenceState {
    /// Give every name a `0` / offline entry unless it already has one.
    pub fn ensure_tracked<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.last_seen.entry(name.to_string()).or_insert(0);
            self.last_status
                .entry(name.to_string())
                .or_insert(Status::Offline);
        }
    }

    pub fn mark_online<'a, I>(&mut self, names: I, now_epoch_secs: u64)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.last_seen.insert(name.to_string(), now_epoch_secs);
            self.last_status.insert(name.to_string(), Status::Online);
        }
    }

    /// Flip status only; the last sighting is kept.
    pub fn mark_offline<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.last_status.insert(name.to_string(), Status::Offline);
        }
    }

    #[cfg(test)]
    pub fn last_seen_of(&self, name: &str) -> u64 {
        self.last_seen.get(name).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn status_of(&self, name: &str) -> Status {
        self.last_status.get(name).copied().unwrap_or_default()
    }

    /// Every name known to either map.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.last_seen
            .keys()
            .chain(self.last_status.keys())
            .map(String::as_str)
    }

    pub fn reported_on(&self, day: &str) -> bool {
        !self.last_report_date.is_empty() && self.last_report_date == day
    }

    fn sanitize(&mut self) {
        self.last_seen.retain(|name, _| !name.trim().is_empty());
        self.last_status.retain(|name, _| !name.trim().is_empty());
        let legacy = std::mem::take(&mut self.legacy_report_date);
        if self.last_report_date.is_empty() {
            self.last_report_date = legacy;
        }
        if !self.last_report_date.is_empty()
            && NaiveDate::parse_from_str(&self.last_report_date, "%Y-%m-%d").is_err()
        {
            tracing::warn!(
                value = %self.last_report_date,
                "ignoring malformed last_report_date"
            );
            self.last_report_date.clear();
        }
        if self.schema_version > SCHEMA_VERSION {
            tracing::warn!(
                found = self.schema_version,
                supported = SCHEMA_VERSION,
                "presence state written by a newer version"
            );
        }
    }
}

pub fn try_load(path: &Path) -> Result<PresenceState, TrackerError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PresenceState::default()),
        Err(err) => {
            return Err(TrackerError::StateCorrupt {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    let mut parsed: PresenceState =
        serde_json::from_str(&raw).map_err(|err| TrackerError::StateCorrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    parsed.sanitize();
    Ok(parsed)
}

/// Load presence state, starting over when the file is unusable.
pub fn load(path: &Path) -> PresenceState {
    match try_load(path) {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!(kind = err.kind(), "{err}; starting with empty presence state");
            PresenceState::default()
        }
    }
}

pub fn save(path: &Path, state: &PresenceState) -> Result<PathBuf> {
    let data = serde_json::to_string_pretty(state)?;
    write_atomic(path, &format!("{data}\n"))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_default() {
        let tmp = tempdir().expect("tempdir");
        let state = try_load(&tmp.path().join("state.json")).expect("load");
        assert_eq!(state, PresenceState::default());
    }

    #[test]
    fn corrupt_file_is_reported_then_reset() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(&path, "{\"last_seen\": {\"Alice\": ").expect("write");

        let err = try_load(&path).expect_err("should be corrupt");
        assert!(matches!(err, TrackerError::StateCorrupt { .. }));
        assert_eq!(load(&path), PresenceState::default());
    }

    #[test]
    fn legacy_layout_and_unknown_fields_are_accepted() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(
            &path,
            r#"{"last_seen":{"Alice":1700000000,"":5},"last_status":{"Alice":"online"},"last_daily_date":"2025-03-01","extra":true}"#,
        )
        .expect("write");

        let state = load(&path);
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert_eq!(state.last_seen_of("Alice"), 1_700_000_000);
        assert_eq!(state.status_of("Alice"), Status::Online);
        assert_eq!(state.last_seen.len(), 1);
        assert_eq!(state.last_report_date, "2025-03-01");
    }

    #[test]
    fn both_gate_keys_keep_history_and_prefer_the_new_one() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(
            &path,
            r#"{"last_seen":{"Alice":1700000000},"last_status":{"Alice":"offline"},"last_daily_date":"2024-01-01","last_report_date":"2024-01-02"}"#,
        )
        .expect("write");

        let state = try_load(&path).expect("both keys load");
        assert_eq!(state.last_seen_of("Alice"), 1_700_000_000);
        assert_eq!(state.last_report_date, "2024-01-02");

        save(&path, &state).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(!raw.contains("last_daily_date"));
        assert_eq!(load(&path).last_seen.len(), 1);
    }

    #[test]
    fn malformed_report_date_is_cleared() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(&path, r#"{"last_report_date":"yesterday"}"#).expect("write");

        assert_eq!(load(&path).last_report_date, "");
    }

    #[test]
    fn ensure_tracked_never_overwrites() {
        let mut state = PresenceState::default();
        state.mark_online(["Alice"], 500);
        state.ensure_tracked(["Alice", "Bob"]);

        assert_eq!(state.last_seen_of("Alice"), 500);
        assert_eq!(state.status_of("Alice"), Status::Online);
        assert_eq!(state.last_seen_of("Bob"), 0);
        assert_eq!(state.status_of("Bob"), Status::Offline);
    }

    #[test]
    fn mark_offline_keeps_last_seen() {
        let mut state = PresenceState::default();
        state.mark_online(["Alice"], 900);
        state.mark_offline(["Alice"]);

        assert_eq!(state.last_seen_of("Alice"), 900);
        assert_eq!(state.status_of("Alice"), Status::Offline);
    }

    #[test]
    fn save_writes_readable_json() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state/state.json");
        let mut state = PresenceState::default();
        state.mark_online(["Alice"], 42);
        state.last_report_date = "2025-03-02".to_string();

        save(&path, &state).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"Alice\": \"online\""));
        assert!(raw.ends_with("}\n"));
        assert_eq!(load(&path), state);
    }
}
