use crate::tracker::names::NameSet;
use crate::tracker::roster::reconcile_newly_found;
use crate::tracker::state::PresenceState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Names enrolled into the roster by this pass, sorted case-insensitively.
    pub added: Vec<String>,
    /// Online names in roster casing.
    pub online: Vec<String>,
    pub offline_count: usize,
}

/// Fold one scrape snapshot into the roster and presence state.
///
/// Pure in-memory step; the caller decides what to persist.
pub fn reconcile(
    roster: &mut NameSet,
    state: &mut PresenceState,
    snapshot: &NameSet,
    now_epoch_secs: u64,
) -> ReconcileOutcome {
    let (updated, added) = reconcile_newly_found(roster, snapshot);
    *roster = updated;

    state.ensure_tracked(roster.iter());

    // Snapshot names are mapped onto the roster's canonical casing so both
    // maps keep a single key per member.
    let online: Vec<String> = snapshot
        .iter()
        .map(|name| roster.canonical(name).unwrap_or(name).to_string())
        .collect();
    state.mark_online(online.iter().map(String::as_str), now_epoch_secs);

    let offline = roster.difference(snapshot);
    state.mark_offline(offline.iter().map(String::as_str));

    ReconcileOutcome {
        added,
        online,
        offline_count: offline.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::reconcile;
    use crate::tracker::names::NameSet;
    use crate::tracker::state::{PresenceState, Status};

    fn set(names: &[&str]) -> NameSet {
        names.iter().collect()
    }

    #[test]
    fn first_sighting_then_disappearance() {
        let mut roster = NameSet::new();
        let mut state = PresenceState::default();

        let first = reconcile(&mut roster, &mut state, &set(&["Alice"]), 1_000);
        assert_eq!(first.added, vec!["Alice"]);
        assert_eq!(roster.to_vec(), vec!["Alice"]);
        assert_eq!(state.status_of("Alice"), Status::Online);
        assert_eq!(state.last_seen_of("Alice"), 1_000);

        let second = reconcile(&mut roster, &mut state, &NameSet::new(), 4_600);
        assert!(second.added.is_empty());
        assert_eq!(second.offline_count, 1);
        assert_eq!(state.status_of("Alice"), Status::Offline);
        assert_eq!(state.last_seen_of("Alice"), 1_000);
    }

    #[test]
    fn repeated_snapshot_is_idempotent() {
        let mut roster = set(&["Alice", "Bob"]);
        let mut state = PresenceState::default();
        let snapshot = set(&["bob", "Carl"]);

        reconcile(&mut roster, &mut state, &snapshot, 2_000);
        let (roster_once, state_once) = (roster.clone(), state.clone());
        let again = reconcile(&mut roster, &mut state, &snapshot, 2_000);

        assert!(again.added.is_empty());
        assert_eq!(roster, roster_once);
        assert_eq!(state, state_once);
    }

    #[test]
    fn online_names_use_roster_casing() {
        let mut roster = set(&["Bob"]);
        let mut state = PresenceState::default();

        let outcome = reconcile(&mut roster, &mut state, &set(&["BOB"]), 10);
        assert_eq!(outcome.online, vec!["Bob"]);
        assert!(!state.last_seen.contains_key("BOB"));
        assert_eq!(state.last_seen_of("Bob"), 10);
    }

    #[test]
    fn history_of_removed_members_is_kept() {
        let mut roster = set(&["Alice"]);
        let mut state = PresenceState::default();
        state.mark_online(["Ghost"], 50);

        reconcile(&mut roster, &mut state, &NameSet::new(), 100);
        assert_eq!(state.last_seen_of("Ghost"), 50);
        assert_eq!(state.status_of("Ghost"), Status::Online);
        assert_eq!(state.status_of("Alice"), Status::Offline);
    }

    #[test]
    fn roster_grows_monotonically() {
        let mut roster = NameSet::new();
        let mut state = PresenceState::default();
        let mut previous = roster.clone();
        for (tick, names) in [vec!["A"], vec!["b"], vec![], vec!["a", "C"]]
            .into_iter()
            .enumerate()
        {
            reconcile(&mut roster, &mut state, &names.into_iter().collect(), tick as u64);
            assert!(previous.iter().all(|n| roster.contains(n)));
            previous = roster.clone();
        }
        assert_eq!(roster.to_vec(), vec!["A", "b", "C"]);
    }
}
