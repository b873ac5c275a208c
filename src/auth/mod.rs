//! Authorization: role model, identity resolution and the user directory.

pub mod gate;
pub mod identity;
pub mod role;

pub use gate::{AuthContext, AuthorizationGate, User, UserDirectory};
pub use identity::{
    HttpIdentityProvider, IdentityConfig, IdentityProfile, IdentityProvider,
    StaticIdentityProvider,
};
pub use role::{MembershipTier, Role};
