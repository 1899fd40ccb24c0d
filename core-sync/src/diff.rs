//! Membership diff between the remote album and the local cache.

use bridge_traits::AssetId;
use std::collections::HashSet;

/// Set difference computed once per pass, before any mutation.
///
/// Both lists are sorted so passes process ids in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// In the album, missing from the cache
    pub to_add: Vec<AssetId>,
    /// In the cache, no longer in the album
    pub to_remove: Vec<AssetId>,
}

impl MembershipDiff {
    pub fn compute(remote: &HashSet<AssetId>, local: &HashSet<AssetId>) -> Self {
        let mut to_add: Vec<AssetId> = remote.difference(local).cloned().collect();
        let mut to_remove: Vec<AssetId> = local.difference(remote).cloned().collect();
        to_add.sort();
        to_remove.sort();
        Self { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Membership after applying the diff to `local` with every operation
    /// succeeding.
    pub fn apply(&self, local: &HashSet<AssetId>) -> HashSet<AssetId> {
        let removed: HashSet<&AssetId> = self.to_remove.iter().collect();
        local
            .iter()
            .filter(|id| !removed.contains(id))
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<AssetId> {
        ids.iter().map(|id| AssetId::parse(*id).unwrap()).collect()
    }

    fn list(ids: &[&str]) -> Vec<AssetId> {
        ids.iter().map(|id| AssetId::parse(*id).unwrap()).collect()
    }

    #[test]
    fn test_add_and_remove() {
        let diff = MembershipDiff::compute(&set(&["c", "a", "b"]), &set(&["b", "d"]));
        assert_eq!(diff.to_add, list(&["a", "c"]));
        assert_eq!(diff.to_remove, list(&["d"]));
    }

    #[test]
    fn test_equal_sets_are_empty() {
        let both = set(&["a", "b"]);
        assert!(MembershipDiff::compute(&both, &both).is_empty());
        assert!(MembershipDiff::compute(&set(&[]), &set(&[])).is_empty());
    }

    #[test]
    fn test_empty_remote_removes_everything() {
        let diff = MembershipDiff::compute(&set(&[]), &set(&["a", "b"]));
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, list(&["a", "b"]));
    }

    #[test]
    fn test_apply_reaches_remote_and_lists_are_disjoint() {
        let cases = [
            (set(&["a", "b", "c"]), set(&["b", "d"])),
            (set(&[]), set(&["x"])),
            (set(&["x"]), set(&[])),
            (set(&["p", "q"]), set(&["r", "s"])),
            (set(&["m"]), set(&["m"])),
        ];

        for (remote, local) in cases {
            let diff = MembershipDiff::compute(&remote, &local);
            assert!(diff.to_add.iter().all(|id| !diff.to_remove.contains(id)));
            assert_eq!(diff.apply(&local), remote);
        }
    }
}
