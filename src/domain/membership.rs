//! Membership reconciliation for composite aggregates.
//!
//! Boards, collections, playlists and threads keep an ordered list of member
//! content ids with set semantics: no id appears twice.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::values::ContentId;

/// Why a reorder was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderViolation {
    Duplicate(ContentId),
    Foreign(ContentId),
    Missing(ContentId),
}

impl std::fmt::Display for ReorderViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReorderViolation::Duplicate(id) => write!(f, "{} appears more than once", id),
            ReorderViolation::Foreign(id) => write!(f, "{} is not a member", id),
            ReorderViolation::Missing(id) => write!(f, "{} is missing from the new order", id),
        }
    }
}

/// Ordered, duplicate-free member list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ContentId>", into = "Vec<ContentId>")]
pub struct Membership {
    members: Vec<ContentId>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from ids, keeping the first occurrence of each
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ContentId>,
    {
        let mut seen = HashSet::new();
        let members = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { members }
    }

    pub fn ids(&self) -> &[ContentId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.members.contains(id)
    }

    pub fn position(&self, id: &ContentId) -> Option<usize> {
        self.members.iter().position(|m| m == id)
    }

    /// Append; `false` if already present (nothing changes)
    pub fn insert(&mut self, id: ContentId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Remove; `false` if absent (nothing changes)
    pub fn remove(&mut self, id: &ContentId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Full replace from a snapshot
    pub fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ContentId>,
    {
        *self = Self::from_ids(ids);
    }

    /// Check that `order` is an exact permutation of the current members
    pub fn check_permutation(&self, order: &[ContentId]) -> Result<(), ReorderViolation> {
        let mut seen = HashSet::new();
        for id in order {
            if !seen.insert(id) {
                return Err(ReorderViolation::Duplicate(id.clone()));
            }
            if !self.contains(id) {
                return Err(ReorderViolation::Foreign(id.clone()));
            }
        }
        if let Some(missing) = self.members.iter().find(|m| !seen.contains(m)) {
            return Err(ReorderViolation::Missing(missing.clone()));
        }
        Ok(())
    }

    /// Apply a permutation; nothing changes when it is refused
    pub fn reorder(&mut self, order: Vec<ContentId>) -> Result<(), ReorderViolation> {
        self.check_permutation(&order)?;
        self.members = order;
        Ok(())
    }
}

impl From<Vec<ContentId>> for Membership {
    fn from(value: Vec<ContentId>) -> Self {
        Self::from_ids(value)
    }
}

impl From<Membership> for Vec<ContentId> {
    fn from(value: Membership) -> Self {
        value.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ContentId> {
        raw.iter().map(|s| ContentId::new(*s).unwrap()).collect()
    }

    #[test]
    fn test_from_ids_dedupes_in_order() {
        let membership = Membership::from_ids(ids(&["a", "b", "a", "c"]));
        assert_eq!(membership.ids(), ids(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut membership = Membership::from_ids(ids(&["a"]));
        assert!(!membership.insert(ContentId::new("a").unwrap()));
        assert!(membership.insert(ContentId::new("b").unwrap()));
        assert!(membership.remove(&ContentId::new("a").unwrap()));
        assert!(!membership.remove(&ContentId::new("zzz").unwrap()));
        assert_eq!(membership.ids(), ids(&["b"]).as_slice());
    }

    #[test]
    fn test_reorder_accepts_permutation() {
        let mut membership = Membership::from_ids(ids(&["a", "b", "c"]));
        membership.reorder(ids(&["c", "a", "b"])).unwrap();
        assert_eq!(membership.ids(), ids(&["c", "a", "b"]).as_slice());
    }

    #[test]
    fn test_reorder_rejections_leave_members_untouched() {
        let original = Membership::from_ids(ids(&["a", "b", "c"]));

        let cases = [
            (ids(&["a", "b"]), "missing"),
            (ids(&["a", "b", "c", "d"]), "foreign"),
            (ids(&["a", "a", "b"]), "duplicate"),
            (ids(&["a", "b", "x"]), "foreign"),
        ];

        for (order, label) in cases {
            let mut membership = original.clone();
            let result = membership.reorder(order);
            assert!(result.is_err(), "{} order should be refused", label);
            assert_eq!(membership, original);
        }
    }

    #[test]
    fn test_replace_with_empty() {
        let mut membership = Membership::from_ids(ids(&["a", "b"]));
        membership.replace(Vec::new());
        assert!(membership.is_empty());
    }
}
