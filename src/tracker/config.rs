use crate::tracker::notifier::DISCORD_MAX_CHARS;
use crate::tracker::paths::TrackerPaths;
use anyhow::{Result, anyhow};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));

pub const ENV_PREFIX: &str = "LASTSEEN_";
const MIN_CHUNK_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Daily report inside the daily window, plain tick otherwise.
    #[default]
    Auto,
    /// Tick only.
    Hourly,
    /// Daily report now, still gated to once per day.
    Daily,
}

impl RunMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub url: String,
    /// Read the page from disk instead of fetching `url`.
    pub source_file: Option<String>,
    pub server_label: String,
    pub guild_name: String,
    pub timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://pr-underworld.com/website/".to_string(),
            source_file: None,
            server_label: "Netherworld".to_string(),
            guild_name: "beQuiet".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: RunMode,
    pub timezone: String,
    pub daily_window_start: String,
    pub daily_window_end: String,
    pub preview: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Auto,
            timezone: "Europe/Berlin".to_string(),
            daily_window_start: "23:20".to_string(),
            daily_window_end: "23:59".to_string(),
            preview: false,
        }
    }
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| anyhow!("invalid time `{raw}` (expected HH:MM): {err}"))
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone `{}`: {err}", self.timezone))
    }

    pub fn window(&self) -> Result<DailyWindow> {
        Ok(DailyWindow {
            start: parse_hhmm(&self.daily_window_start)?,
            end: parse_hhmm(&self.daily_window_end)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub chunk_limit: usize,
    pub part_counters: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            chunk_limit: 1900,
            part_counters: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    pub site: SiteConfig,
    pub schedule: ScheduleConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTrackerConfig {
    site: Option<SiteConfig>,
    schedule: Option<ScheduleConfig>,
    discord: Option<DiscordConfig>,
}

fn env_value(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_value_first(vars: &[&str]) -> Option<String> {
    vars.iter().find_map(|var| env_value(var))
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_value(var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    env_value(var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    env_value(var)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "on" => Some(true),
        "0" | "false" | "FALSE" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    env_value(var)
        .and_then(|v| parse_bool(&v))
        .unwrap_or(fallback)
}

fn validate(cfg: &TrackerConfig) -> Result<()> {
    if cfg.site.server_label.trim().is_empty() {
        return Err(anyhow!("invalid server label: cannot be empty"));
    }
    if cfg.site.guild_name.trim().is_empty() {
        return Err(anyhow!("invalid guild name: cannot be empty"));
    }
    if cfg.site.source_file.is_none() && cfg.site.url.trim().is_empty() {
        return Err(anyhow!("invalid site url: set a url or a source file"));
    }
    if cfg.site.timeout_secs == 0 {
        return Err(anyhow!("invalid fetch timeout: must be >= 1 second"));
    }
    cfg.schedule.tz()?;
    let window = cfg.schedule.window()?;
    if window.start > window.end {
        return Err(anyhow!(
            "invalid daily window: start {} is after end {}",
            cfg.schedule.daily_window_start,
            cfg.schedule.daily_window_end
        ));
    }
    if !(MIN_CHUNK_LIMIT..=DISCORD_MAX_CHARS).contains(&cfg.discord.chunk_limit) {
        return Err(anyhow!(
            "invalid chunk limit: require {MIN_CHUNK_LIMIT} <= limit <= {DISCORD_MAX_CHARS}"
        ));
    }
    let webhook = cfg.discord.webhook_url.trim();
    if !webhook.is_empty() && !(webhook.starts_with("https://") || webhook.starts_with("http://"))
    {
        return Err(anyhow!("invalid webhook url: must start with http:// or https://"));
    }
    Ok(())
}

fn merge_toml(base: &mut TrackerConfig, raw: &str, origin: &Path) -> Result<()> {
    let parsed: PartialTrackerConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", origin.display()))?;
    if let Some(site) = parsed.site {
        base.site = site;
    }
    if let Some(schedule) = parsed.schedule {
        base.schedule = schedule;
    }
    if let Some(discord) = parsed.discord {
        base.discord = discord;
    }
    Ok(())
}

fn merge_file_config(base: &mut TrackerConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)?;
    merge_toml(base, &raw, path)
}

fn apply_env(cfg: &mut TrackerConfig) -> Result<()> {
    cfg.site.url = env_or_string("LASTSEEN_URL", &cfg.site.url);
    if let Some(file) = env_value("LASTSEEN_SOURCE_FILE") {
        cfg.site.source_file = Some(file);
    }
    cfg.site.server_label = env_or_string("LASTSEEN_SERVER", &cfg.site.server_label);
    cfg.site.guild_name = env_or_string("LASTSEEN_GUILD", &cfg.site.guild_name);
    cfg.site.timeout_secs = env_or_u64("LASTSEEN_FETCH_TIMEOUT_SECS", cfg.site.timeout_secs);

    if let Some(raw) = env_value_first(&["LASTSEEN_MODE", "MODE"]) {
        cfg.schedule.mode = RunMode::parse(&raw)
            .ok_or_else(|| anyhow!("invalid run mode `{raw}`: use auto, hourly or daily"))?;
    }
    cfg.schedule.timezone = env_or_string("LASTSEEN_TIMEZONE", &cfg.schedule.timezone);
    cfg.schedule.daily_window_start = env_or_string(
        "LASTSEEN_DAILY_WINDOW_START",
        &cfg.schedule.daily_window_start,
    );
    cfg.schedule.daily_window_end =
        env_or_string("LASTSEEN_DAILY_WINDOW_END", &cfg.schedule.daily_window_end);
    cfg.schedule.preview = env_or_bool("LASTSEEN_TEST_POST", cfg.schedule.preview);

    if let Some(url) = env_value_first(&["LASTSEEN_WEBHOOK_URL", "DISCORD_WEBHOOK_URL"]) {
        cfg.discord.webhook_url = url;
    }
    cfg.discord.chunk_limit = env_or_usize("LASTSEEN_CHUNK_LIMIT", cfg.discord.chunk_limit);
    cfg.discord.part_counters = env_or_bool("LASTSEEN_PART_COUNTERS", cfg.discord.part_counters);
    Ok(())
}

/// Defaults, then the TOML file, then the environment.
pub fn load_config(paths: &TrackerPaths) -> Result<TrackerConfig> {
    let mut cfg = TrackerConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// `LASTSEEN_*` variables in `vars` that this binary never reads.
pub fn unknown_env_keys<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = vars
        .into_iter()
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !GENERATED_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    out.sort();
    out
}
