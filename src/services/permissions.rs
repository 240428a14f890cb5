//! Permission model for shareable subjects.
//!
//! Ownership implies full rights and is never represented by a share row.
//! Everyone else holds at most one share per subject, and tasks inside a list
//! also inherit whatever the caller holds on that list.

use crate::db::Permission;

/// Effective access of a user on a subject. Ordered from weakest to strongest:
/// `None < Shared(View) < Shared(Edit) < Shared(Admin) < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    None,
    Shared(Permission),
    Owner,
}

impl Access {
    /// Combine ownership, a direct share and access inherited from a
    /// containing list. The strongest source wins.
    pub fn resolve(
        owner_id: &str,
        user_id: &str,
        direct: Option<Permission>,
        inherited: Access,
    ) -> Access {
        if owner_id == user_id {
            return Access::Owner;
        }
        let direct = direct.map(Access::Shared).unwrap_or(Access::None);
        direct.max(inherited)
    }

    /// Access a list grants on the tasks it contains. The list owner manages
    /// them like an ADMIN sharer but does not become their owner.
    pub fn inherited_by_task(self) -> Access {
        match self {
            Access::Owner => Access::Shared(Permission::Admin),
            other => other,
        }
    }

    pub fn permits(&self, required: Permission) -> bool {
        match self {
            Access::Owner => true,
            Access::Shared(p) => *p >= required,
            Access::None => false,
        }
    }

    /// Owner or ADMIN may create, change and remove other users' shares.
    pub fn can_manage_shares(&self) -> bool {
        self.permits(Permission::Admin)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Access::Owner)
    }

    /// Whether `actor` may remove the share held by `target_user_id`.
    /// Managers may remove anyone's share; everyone may drop their own.
    pub fn can_remove_share(&self, actor_id: &str, target_user_id: &str) -> bool {
        self.can_manage_shares() || actor_id == target_user_id
    }
}
