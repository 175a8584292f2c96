//! Resolved caller identity.
//!
//! Credentials are verified by the access gate in front of the storefront.
//! By the time a request reaches the engine it carries a [`Caller`]: the user
//! it acts for and whether that user is an administrator. The engine trusts
//! this pair completely and only performs capability checks against it.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Error parsing a [`Role`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0}")]
pub struct RoleError(pub String);

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper. May only touch their own cart, wishlist and orders.
    #[default]
    Customer,
    /// Store administrator. Manages the catalog and every order.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "admin" | "administrator" => Ok(Self::Admin),
            other => Err(RoleError(other.to_owned())),
        }
    }
}

/// The identity a request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// Acting user.
    pub user_id: UserId,
    /// Acting user's role.
    pub role: Role,
}

impl Caller {
    /// A customer caller.
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// An administrator caller.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Whether the caller is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Whether the caller may act on a record owned by `owner`.
    #[must_use]
    pub fn may_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Customer ".parse::<Role>().unwrap(), Role::Customer);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_owner_may_access() {
        let caller = Caller::customer(UserId::new(1));
        assert!(caller.may_access(UserId::new(1)));
        assert!(!caller.may_access(UserId::new(2)));
    }

    #[test]
    fn test_admin_may_access_anything() {
        let caller = Caller::admin(UserId::new(1));
        assert!(caller.may_access(UserId::new(99)));
    }
}
