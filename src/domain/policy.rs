//! Role-based authorization policy.
//!
//! Pure decision logic: every check takes the caller's [`Identity`] (and,
//! where relevant, the target's owner id or role) and returns `Ok(())` or a
//! typed [`AccessDenied`] carrying the user-facing message. Handlers and
//! services evaluate the matching check before any mutation; nothing here
//! touches the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of user roles.
///
/// Exactly one `Owner` account is expected to exist; it is seeded by the
/// initial migration and no code path can assign the role afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Parses the stored string form, treating anything unknown as `User`.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "owner" => Self::Owner,
            _ => Self::User,
        }
    }

    /// Admins and the owner may moderate content and ordinary users.
    #[must_use]
    pub const fn is_moderator(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped caller identity, populated once per request from the
/// session and passed explicitly into every handler and service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

/// A policy denial with its user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Log in to access.")]
    NotLoggedIn,

    #[error("No permission.")]
    NoPermission,

    #[error("Owner only.")]
    OwnerOnly,

    #[error("You are not allowed to modify this resource.")]
    NotResourceOwner,

    #[error("You cannot modify this user.")]
    CannotModifyUser,

    #[error("Cannot modify the owner.")]
    CannotModifyOwner,

    #[error("You cannot delete yourself.")]
    CannotDeleteSelf,

    #[error("Cannot delete the owner.")]
    CannotDeleteOwner,

    #[error("Admins can only delete regular users.")]
    AdminsOnlyDeleteUsers,
}

/// Allows admins and the owner.
pub fn require_admin(identity: &Identity) -> Result<(), AccessDenied> {
    if identity.role.is_moderator() {
        Ok(())
    } else {
        Err(AccessDenied::NoPermission)
    }
}

/// Allows only the owner role.
pub fn require_owner_role(identity: &Identity) -> Result<(), AccessDenied> {
    if identity.role == Role::Owner {
        Ok(())
    } else {
        Err(AccessDenied::OwnerOnly)
    }
}

/// Allows admins, the owner, and the user who owns the resource.
///
/// `resource_owner_id` is the `user_id` stored on the post or comment being
/// modified; callers must pass the value read from the same row the mutation
/// will apply to.
pub fn require_owner_or_admin(
    identity: &Identity,
    resource_owner_id: i32,
) -> Result<(), AccessDenied> {
    if identity.role.is_moderator() || identity.user_id == resource_owner_id {
        Ok(())
    } else {
        Err(AccessDenied::NotResourceOwner)
    }
}

/// Promotion to admin. Admins may only promote regular users; nobody may
/// touch the owner. Check order matches the original rule set: the
/// admin-actor restriction is evaluated before the owner-target one, so an
/// admin targeting the owner is told "You cannot modify this user."
pub fn check_promote(actor: &Identity, target_role: Role) -> Result<(), AccessDenied> {
    require_admin(actor)?;

    if actor.role == Role::Admin && target_role != Role::User {
        return Err(AccessDenied::CannotModifyUser);
    }
    if target_role == Role::Owner {
        return Err(AccessDenied::CannotModifyOwner);
    }
    Ok(())
}

/// Demotion back to a regular user. Owner-gated: admins are denied here
/// outright, and the owner itself can never be demoted.
pub fn check_demote(actor: &Identity, target_role: Role) -> Result<(), AccessDenied> {
    require_owner_role(actor)?;

    if target_role == Role::Owner {
        return Err(AccessDenied::CannotModifyOwner);
    }
    Ok(())
}

/// Account deletion. Self-deletion is always refused, admins may only delete
/// regular users, and the owner account is immune.
pub fn check_delete_user(
    actor: &Identity,
    target_id: i32,
    target_role: Role,
) -> Result<(), AccessDenied> {
    require_admin(actor)?;

    if target_id == actor.user_id {
        return Err(AccessDenied::CannotDeleteSelf);
    }
    if actor.role == Role::Admin && target_role != Role::User {
        return Err(AccessDenied::AdminsOnlyDeleteUsers);
    }
    if target_role == Role::Owner {
        return Err(AccessDenied::CannotDeleteOwner);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i32, role: Role) -> Identity {
        Identity {
            user_id: id,
            username: format!("u{id}"),
            role,
        }
    }

    #[test]
    fn require_admin_allows_admin_and_owner() {
        assert!(require_admin(&identity(1, Role::Admin)).is_ok());
        assert!(require_admin(&identity(1, Role::Owner)).is_ok());
        assert_eq!(
            require_admin(&identity(1, Role::User)),
            Err(AccessDenied::NoPermission)
        );
    }

    #[test]
    fn require_owner_role_rejects_admins() {
        assert!(require_owner_role(&identity(1, Role::Owner)).is_ok());
        assert_eq!(
            require_owner_role(&identity(1, Role::Admin)),
            Err(AccessDenied::OwnerOnly)
        );
        assert_eq!(
            require_owner_role(&identity(1, Role::User)),
            Err(AccessDenied::OwnerOnly)
        );
    }

    #[test]
    fn resource_ownership_check() {
        // moderators may edit anything
        assert!(require_owner_or_admin(&identity(1, Role::Admin), 99).is_ok());
        assert!(require_owner_or_admin(&identity(1, Role::Owner), 99).is_ok());
        // regular users only their own resources
        assert!(require_owner_or_admin(&identity(7, Role::User), 7).is_ok());
        assert_eq!(
            require_owner_or_admin(&identity(7, Role::User), 8),
            Err(AccessDenied::NotResourceOwner)
        );
    }

    #[test]
    fn promote_matrix() {
        let admin = identity(1, Role::Admin);
        let owner = identity(2, Role::Owner);
        let user = identity(3, Role::User);

        assert!(check_promote(&admin, Role::User).is_ok());
        assert_eq!(
            check_promote(&admin, Role::Admin),
            Err(AccessDenied::CannotModifyUser)
        );
        assert_eq!(
            check_promote(&admin, Role::Owner),
            Err(AccessDenied::CannotModifyUser)
        );

        assert!(check_promote(&owner, Role::User).is_ok());
        assert!(check_promote(&owner, Role::Admin).is_ok());
        assert_eq!(
            check_promote(&owner, Role::Owner),
            Err(AccessDenied::CannotModifyOwner)
        );

        assert_eq!(
            check_promote(&user, Role::User),
            Err(AccessDenied::NoPermission)
        );
    }

    #[test]
    fn demote_matrix() {
        let admin = identity(1, Role::Admin);
        let owner = identity(2, Role::Owner);

        assert!(check_demote(&owner, Role::User).is_ok());
        assert!(check_demote(&owner, Role::Admin).is_ok());
        assert_eq!(
            check_demote(&owner, Role::Owner),
            Err(AccessDenied::CannotModifyOwner)
        );

        // admins never reach the inner checks
        assert_eq!(check_demote(&admin, Role::User), Err(AccessDenied::OwnerOnly));
        assert_eq!(
            check_demote(&admin, Role::Admin),
            Err(AccessDenied::OwnerOnly)
        );
        assert_eq!(
            check_demote(&identity(3, Role::User), Role::User),
            Err(AccessDenied::OwnerOnly)
        );
    }

    #[test]
    fn delete_user_matrix() {
        let admin = identity(1, Role::Admin);
        let owner = identity(2, Role::Owner);

        assert!(check_delete_user(&admin, 3, Role::User).is_ok());
        assert_eq!(
            check_delete_user(&admin, 4, Role::Admin),
            Err(AccessDenied::AdminsOnlyDeleteUsers)
        );
        assert_eq!(
            check_delete_user(&admin, 2, Role::Owner),
            Err(AccessDenied::AdminsOnlyDeleteUsers)
        );

        assert!(check_delete_user(&owner, 3, Role::User).is_ok());
        assert!(check_delete_user(&owner, 1, Role::Admin).is_ok());

        // nobody deletes themselves, not even the owner
        assert_eq!(
            check_delete_user(&admin, 1, Role::Admin),
            Err(AccessDenied::CannotDeleteSelf)
        );
        assert_eq!(
            check_delete_user(&owner, 2, Role::Owner),
            Err(AccessDenied::CannotDeleteSelf)
        );

        // a hypothetical second owner account is still immune
        assert_eq!(
            check_delete_user(&owner, 9, Role::Owner),
            Err(AccessDenied::CannotDeleteOwner)
        );

        assert_eq!(
            check_delete_user(&identity(3, Role::User), 4, Role::User),
            Err(AccessDenied::NoPermission)
        );
    }

    #[test]
    fn role_round_trips_through_db_form() {
        for role in [Role::User, Role::Admin, Role::Owner] {
            assert_eq!(Role::from_db(role.as_str()), role);
        }
        // unknown strings degrade to the least privileged role
        assert_eq!(Role::from_db("superuser"), Role::User);
        assert_eq!(Role::from_db(""), Role::User);
    }
}
