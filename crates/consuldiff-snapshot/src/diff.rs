//! Snapshot differ.

use crate::{Encoding, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The difference between two snapshots for one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    /// Key exists only in the current snapshot.
    Added { key: String, value: String },
    /// Key exists in both with different values.
    Modified { key: String, old: String, new: String },
    /// Key exists only in the previous snapshot.
    Deleted { key: String, value: String },
}

impl Change {
    pub fn added(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Added {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn modified(
        key: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self::Modified {
            key: key.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    pub fn deleted(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Deleted {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Change::Added { key, .. } | Change::Modified { key, .. } | Change::Deleted { key, .. } => {
                key
            }
        }
    }

    /// Lower-case change kind, as used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Added { .. } => "added",
            Change::Modified { .. } => "modified",
            Change::Deleted { .. } => "deleted",
        }
    }

    /// The same change seen from the other direction.
    pub fn reversed(&self) -> Self {
        match self {
            Change::Added { key, value } => Change::deleted(key, value),
            Change::Modified { key, old, new } => Change::modified(key, new, old),
            Change::Deleted { key, value } => Change::added(key, value),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Added { key, value } => write!(f, "[+] Added: {key} = {value}"),
            Change::Modified { key, old, new } => {
                write!(f, "[~] Modified: {key}    Old: {old}    New: {new}")
            }
            Change::Deleted { key, value } => write!(f, "[-] Deleted: {key} = {value}"),
        }
    }
}

/// Per-kind counts over a change list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl ChangeSummary {
    pub fn from_changes(changes: &[Change]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change {
                Change::Added { .. } => summary.added += 1,
                Change::Modified { .. } => summary.modified += 1,
                Change::Deleted { .. } => summary.deleted += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.added + self.modified + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Compare two snapshots of the same encoding.
///
/// Added and modified keys come first, in key order of `current`; deleted
/// keys follow, in key order of `previous`. Values compare as exact strings.
pub fn diff<E: Encoding>(previous: &Snapshot<E>, current: &Snapshot<E>) -> Vec<Change> {
    let mut changes = Vec::new();

    for (key, value) in current.iter() {
        match previous.get(key) {
            None => changes.push(Change::added(key, value)),
            Some(old) if old != value => changes.push(Change::modified(key, old, value)),
            Some(_) => {}
        }
    }

    for (key, value) in previous.iter() {
        if !current.contains_key(key) {
            changes.push(Change::deleted(key, value));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Raw;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashSet};

    fn snap(pairs: &[(&str, &str)]) -> Snapshot<Raw> {
        pairs.iter().copied().collect()
    }

    fn as_set(changes: Vec<Change>) -> HashSet<Change> {
        changes.into_iter().collect()
    }

    #[test]
    fn test_steady_state_modify_and_add() {
        let previous = snap(&[("a", "1"), ("b", "2")]);
        let current = snap(&[("a", "1"), ("b", "3"), ("c", "9")]);

        let changes = as_set(diff(&previous, &current));
        let expected = as_set(vec![Change::modified("b", "2", "3"), Change::added("c", "9")]);
        assert_eq!(changes, expected);
    }

    #[test]
    fn test_deletion() {
        let previous = snap(&[("a", "1"), ("b", "2")]);
        let current = snap(&[("a", "1")]);
        assert_eq!(diff(&previous, &current), vec![Change::deleted("b", "2")]);
    }

    #[test]
    fn test_empty_previous_reports_everything_added() {
        let current = snap(&[("a", "1"), ("b", "")]);
        let changes = as_set(diff(&Snapshot::new(), &current));
        assert_eq!(
            changes,
            as_set(vec![Change::added("a", "1"), Change::added("b", "")])
        );
    }

    #[test]
    fn test_empty_current_reports_everything_deleted() {
        let previous = snap(&[("a", "1"), ("b", "2")]);
        let changes = diff(&previous, &Snapshot::new());
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, Change::Deleted { .. })));
    }

    #[test]
    fn test_comparison_is_exact() {
        let previous = snap(&[("k", "Value"), ("s", "x")]);
        let current = snap(&[("k", "value"), ("s", "x ")]);
        assert_eq!(diff(&previous, &current).len(), 2);
    }

    #[test]
    fn test_empty_string_to_absent_is_a_deletion() {
        let previous = snap(&[("k", "")]);
        let current = snap(&[]);
        assert_eq!(diff(&previous, &current), vec![Change::deleted("k", "")]);
    }

    #[test]
    fn test_additions_precede_deletions() {
        let previous = snap(&[("a", "1"), ("z", "1")]);
        let current = snap(&[("m", "1"), ("z", "2")]);
        let changes = diff(&previous, &current);
        let first_delete = changes
            .iter()
            .position(|c| matches!(c, Change::Deleted { .. }))
            .unwrap();
        assert!(changes[..first_delete]
            .iter()
            .all(|c| !matches!(c, Change::Deleted { .. })));
        assert!(changes[first_delete..]
            .iter()
            .all(|c| matches!(c, Change::Deleted { .. })));
    }

    #[test]
    fn test_change_display_lines() {
        assert_eq!(Change::added("k", "v").to_string(), "[+] Added: k = v");
        assert_eq!(
            Change::modified("k", "1", "2").to_string(),
            "[~] Modified: k    Old: 1    New: 2"
        );
        assert_eq!(Change::deleted("k", "v").to_string(), "[-] Deleted: k = v");
    }

    #[test]
    fn test_change_serializes_tagged() {
        let json = serde_json::to_value(Change::modified("k", "1", "2")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"change": "modified", "key": "k", "old": "1", "new": "2"})
        );
    }

    #[test]
    fn test_summary_counts() {
        let changes = vec![
            Change::added("a", "1"),
            Change::added("b", "1"),
            Change::deleted("c", "1"),
        ];
        let summary = ChangeSummary::from_changes(&changes);
        assert_eq!(summary.added, 2);
        assert_eq!(summary.modified, 0);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.total(), 3);
        assert!(ChangeSummary::default().is_empty());
    }

    fn snapshot_strategy() -> impl Strategy<Value = Snapshot<Raw>> {
        proptest::collection::btree_map("[a-e]{1,2}", "[xy]{0,2}", 0..8)
            .prop_map(|values: BTreeMap<String, String>| Snapshot::from_values(values))
    }

    proptest! {
        #[test]
        fn prop_identical_snapshots_have_no_changes(a in snapshot_strategy()) {
            prop_assert!(diff(&a, &a).is_empty());
        }

        #[test]
        fn prop_reverse_diff_mirrors(a in snapshot_strategy(), b in snapshot_strategy()) {
            let forward: HashSet<Change> = diff(&a, &b).iter().map(Change::reversed).collect();
            let backward: HashSet<Change> = diff(&b, &a).into_iter().collect();
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_each_key_changes_at_most_once(a in snapshot_strategy(), b in snapshot_strategy()) {
            let changes = diff(&a, &b);
            let keys: HashSet<&str> = changes.iter().map(Change::key).collect();
            prop_assert_eq!(keys.len(), changes.len());
        }
    }
}
