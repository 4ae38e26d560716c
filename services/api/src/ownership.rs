//! Ownership scoping for transaction access
//!
//! Transaction repositories only accept work expressed through an
//! [`OwnerScope`], and every implementation conjoins `user_id = scope` into
//! its predicate. A row owned by someone else is therefore indistinguishable
//! from a row that does not exist.

use uuid::Uuid;

use crate::middleware::AuthUser;

/// The user whose rows a repository call may see or change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerScope {
    user_id: Uuid,
}

impl OwnerScope {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// True when `owner` is the scoped user
    pub fn permits(&self, owner: Uuid) -> bool {
        self.user_id == owner
    }
}

impl From<&AuthUser> for OwnerScope {
    fn from(user: &AuthUser) -> Self {
        Self::new(user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_permits_only_its_owner() {
        let owner = Uuid::new_v4();
        let scope = OwnerScope::new(owner);

        assert!(scope.permits(owner));
        assert!(!scope.permits(Uuid::new_v4()));
        assert_eq!(scope.user_id(), owner);
    }
}
