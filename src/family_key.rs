//! Canonical identity of a family unit.
//!
//! A family is known only through its parents, so both the person side
//! (FATHER/MOTHER, SPOUSES) and the family side (HUSBAND/WIFE) derive the key
//! with [`family_key`]. Keeping a single derivation is what makes FAMC/FAMS
//! pointers line up with FAM records.

use std::fmt;

use serde::{Serialize, Serializer};

/// Stands in for the missing parent of a single-parent family.
pub const SENTINEL: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyKey {
    first: u32,
    second: u32,
}

impl FamilyKey {
    /// The known parent ids, sentinel excluded.
    #[cfg(test)]
    pub fn parents(&self) -> Vec<u32> {
        [self.first, self.second]
            .into_iter()
            .filter(|&id| id != SENTINEL)
            .collect()
    }

    pub fn pointer(&self) -> String {
        format!("@F{}@", self)
    }
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

impl Serialize for FamilyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Derive the key for the family formed by `ids`.
///
/// Ids equal to the sentinel are ignored. One parent pairs with the sentinel
/// (`5` -> `5-0`), two parents are sorted ascending (`[9, 3]` -> `3-9`).
/// Returns `None` when no parent is known or more than two are given.
pub fn family_key(ids: &[u32]) -> Option<FamilyKey> {
    let known: Vec<u32> = ids.iter().copied().filter(|&id| id != SENTINEL).collect();
    match known[..] {
        [only] => Some(FamilyKey {
            first: only,
            second: SENTINEL,
        }),
        [a, b] => Some(FamilyKey {
            first: a.min(b),
            second: a.max(b),
        }),
        _ => None,
    }
}
