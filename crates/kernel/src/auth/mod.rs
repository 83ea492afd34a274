//! Caller identity: the identity provider client and per-request context.

mod context;
mod provider;

pub use context::{AuthContext, AuthUser, RequireAuth, derive_auth_context, extract_bearer_token};
pub use provider::{
    HttpIdentityProvider, IdentityError, IdentityProvider, IssuedSession, SessionTokens,
    VerifiedUser,
};
