use std::collections::BTreeMap;

/// Case-insensitive identity key for a member name.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// A set of member names with case-insensitive identity.
///
/// The first casing inserted for a name is kept as its canonical form.
/// Iteration yields canonical names sorted case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    entries: BTreeMap<String, String>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name`, returning `true` if it was not present yet.
    /// Surrounding whitespace is trimmed; blank names are ignored.
    pub fn insert(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        let key = name_key(trimmed);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, trimmed.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name_key(name.trim()))
    }

    /// Canonical casing stored for `name`, if present.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.entries.get(&name_key(name.trim())).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Names in `self` that are not in `other`, sorted case-insensitively.
    pub fn difference(&self, other: &NameSet) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, _)| !other.entries.contains_key(*key))
            .map(|(_, name)| name.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.values().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NameSet::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}

impl<S: AsRef<str>> Extend<S> for NameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name.as_ref());
        }
    }
}
