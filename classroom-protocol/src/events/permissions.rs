use serde::{Deserialize, Serialize};

/// The RWX permission bitset a viewer holds over a target project.
///
/// Bits match spec §3 Invariant 5: `R=4, W=2, X=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(pub u8);

impl Permission {
    /// Read bit.
    pub const READ: Permission = Permission(0b100);
    /// Write bit.
    pub const WRITE: Permission = Permission(0b010);
    /// Execute bit.
    pub const EXECUTE: Permission = Permission(0b001);
    /// No bits set.
    pub const NONE: Permission = Permission(0);
    /// All bits set.
    pub const ALL: Permission = Permission(0b111);

    /// Masks to the low three bits, as `modifyPerm` does (`newPerm &= 0b111`).
    pub fn normalized(self) -> Self {
        Permission(self.0 & 0b111)
    }

    /// True iff `self` contains every bit set in `need`.
    pub fn contains(self, need: Permission) -> bool {
        self.0 & need.0 == need.0
    }

    /// Bitwise union.
    pub fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Bits present in `self` but not in `other` (used for `added`/`removed` deltas).
    pub fn difference(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    /// True if no bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Permission {
    type Output = Permission;
    fn bitor(self, rhs: Permission) -> Permission {
        self.union(rhs)
    }
}

impl std::ops::BitAnd for Permission {
    type Output = Permission;
    fn bitand(self, rhs: Permission) -> Permission {
        Permission(self.0 & rhs.0)
    }
}

/// `PROJECT_ACCESSIBLE` response payload.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAccessible {
    /// Participant ids (and their bits) that may access the caller's project.
    pub accessible_to: Vec<ParticipantPermission>,
    /// Participant ids (and their bits) whose projects the caller may access.
    pub accessed_by: Vec<ParticipantPermission>,
}

/// One entry of a [`ProjectAccessible`] list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPermission {
    /// The other participant in the relation.
    pub participant_id: i64,
    /// Display-only bits; see spec Open Question on `PROJECT_ACCESSIBLE` vs `checkPerm` defaults.
    pub permission: Permission,
}

/// One entry of a `PROJECT_PERM` request: grant/revoke bits for one target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPermEntry {
    /// The viewer whose bits are being changed.
    pub target_id: i64,
    /// The new bitset (masked to the low 3 bits before use).
    pub permission: Permission,
}

/// `PROJECT_PERM_CHANGED` fan-out payload, sent to the affected viewer's `PERSONAL_PTC` room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPermChanged {
    /// The viewer whose access changed (recipient-identifying; matches the room target).
    pub user_id: i64,
    /// The project owner who made the change.
    pub target_id: i64,
    /// The viewer's new bitset.
    pub permission: Permission,
    /// Bits gained (`new & !old`).
    pub added: Permission,
    /// Bits lost (`old & !new`).
    pub removed: Permission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_subset_check() {
        assert!(Permission::ALL.contains(Permission::READ));
        assert!(!Permission::READ.contains(Permission::WRITE));
    }

    #[test]
    fn normalized_masks_high_bits() {
        assert_eq!(Permission(0b1111).normalized(), Permission::ALL);
    }

    #[test]
    fn added_removed_are_disjoint() {
        let old = Permission::READ | Permission::WRITE;
        let new = Permission::READ | Permission::EXECUTE;
        let added = new.difference(old);
        let removed = old.difference(new);
        assert_eq!(added, Permission::EXECUTE);
        assert_eq!(removed, Permission::WRITE);
        assert_eq!((added & removed).0, 0);
    }
}
