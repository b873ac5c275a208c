//! Role and membership tiers.
//!
//! Roles are a closed set with exhaustive matching at every authorization
//! checkpoint. Moderator and admin are distinct capability sets; an
//! operation declares exactly which roles it accepts, there is no implicit
//! hierarchy. Admin additionally holds the role-management capability.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Any authenticated caller.
    pub const ANY: &'static [Role] = &[Role::User, Role::Moderator, Role::Admin];

    /// Roles allowed to run moderation actions (status transitions,
    /// featured flag, moderation queue).
    pub const MODERATION: &'static [Role] = &[Role::Moderator, Role::Admin];

    /// Roles allowed to manage other users' roles.
    pub const ROLE_MANAGEMENT: &'static [Role] = &[Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Paid membership tier, distinct from set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    None,
    Verified,
}

impl MembershipTier {
    pub fn is_verified(&self) -> bool {
        matches!(self, MembershipTier::Verified)
    }
}

impl Default for MembershipTier {
    fn default() -> Self {
        MembershipTier::None
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipTier::None => f.write_str("none"),
            MembershipTier::Verified => f.write_str("verified"),
        }
    }
}

impl FromStr for MembershipTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(MembershipTier::None),
            "verified" => Ok(MembershipTier::Verified),
            other => Err(format!("Unknown membership tier: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("MODERATOR".parse::<Role>().unwrap(), Role::Moderator);
    }

    #[test]
    fn test_moderation_set_excludes_plain_user() {
        assert!(!Role::MODERATION.contains(&Role::User));
        assert!(Role::MODERATION.contains(&Role::Moderator));
        assert!(Role::MODERATION.contains(&Role::Admin));
    }
}
