use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TrackerPaths {
    pub home: PathBuf,
    pub state_file: PathBuf,
    pub members_file: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    env_path(var).unwrap_or(fallback)
}

impl TrackerPaths {
    /// Layout rooted at `home` with the default file names.
    pub fn under(home: PathBuf) -> Self {
        Self {
            state_file: home.join("state_last_seen.json"),
            members_file: home.join("members.txt"),
            logs_dir: home.join("logs"),
            config_file: home.join("config.toml"),
            home,
        }
    }
}

pub fn resolve_paths() -> Result<TrackerPaths> {
    let home = match env_path("LASTSEEN_HOME") {
        Some(home) => home,
        None => required_home_dir()?.join(".guild-lastseen"),
    };
    let defaults = TrackerPaths::under(home);

    Ok(TrackerPaths {
        state_file: env_or_default_path("LASTSEEN_STATE_FILE", defaults.state_file),
        members_file: env_or_default_path("LASTSEEN_MEMBERS_FILE", defaults.members_file),
        logs_dir: env_or_default_path("LASTSEEN_LOGS_DIR", defaults.logs_dir),
        config_file: env_or_default_path("LASTSEEN_CONFIG_PATH", defaults.config_file),
        home: defaults.home,
    })
}

#[cfg(test)]
mod tests {
    use super::TrackerPaths;
    use std::path::PathBuf;

    #[test]
    fn default_layout_lives_under_home() {
        let paths = TrackerPaths::under(PathBuf::from("/srv/tracker"));
        assert_eq!(
            paths.state_file,
            PathBuf::from("/srv/tracker/state_last_seen.json")
        );
        assert_eq!(paths.members_file, PathBuf::from("/srv/tracker/members.txt"));
        assert_eq!(paths.logs_dir, PathBuf::from("/srv/tracker/logs"));
        assert_eq!(paths.config_file, PathBuf::from("/srv/tracker/config.toml"));
    }
}
