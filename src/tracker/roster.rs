use crate::tracker::names::{NameSet, name_key};
use crate::tracker::util::write_atomic;
use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read the roster file in file order.
///
/// Lines are trimmed and blank lines dropped. Exact duplicates are removed
/// keeping the first occurrence; case variants are left for the caller.
/// A missing or unreadable file yields an empty roster.
pub fn load(path: &Path) -> Vec<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no roster file yet");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "roster unreadable; starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in raw.lines() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            out.push(name.to_string());
        }
    }
    out
}

/// Load the roster as a case-insensitive set.
pub fn load_set(path: &Path) -> NameSet {
    load(path).into_iter().collect()
}

/// Trim, drop blanks, collapse case variants to the casing that sorts
/// first, and sort case-insensitively.
pub fn normalize<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cleaned: Vec<String> = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    cleaned.sort_by(|a, b| name_key(a).cmp(&name_key(b)).then_with(|| a.cmp(b)));
    cleaned.dedup_by(|later, earlier| name_key(later) == name_key(earlier));
    cleaned
}

pub fn render(names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    format!("{}\n", names.join("\n"))
}

pub fn save<I, S>(path: &Path, names: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized = normalize(names);
    write_atomic(path, &render(&normalized))?;
    Ok(path.to_path_buf())
}

/// Add every observed name missing from `current`.
///
/// Returns the grown roster and the additions, sorted case-insensitively.
/// Never removes a name.
pub fn reconcile_newly_found(current: &NameSet, observed: &NameSet) -> (NameSet, Vec<String>) {
    let added = observed.difference(current);
    let mut updated = current.clone();
    updated.extend(added.iter());
    (updated, added)
}
