//! Authentication and identity resolution.
//!
//! Bearer tokens are verified once, in [`middleware::authenticate`], and
//! turned into a typed [`Principal`] request extension. Handlers never look
//! at raw claims. [`IdentityResolver`] then maps a principal to the stable
//! [`crate::domain::UserId`] the relay uses for persistence.

pub mod identity;
pub mod middleware;
pub mod token;

pub use identity::{IdentityResolver, MemoryDirectory};
pub use middleware::authenticate;
pub use token::{Claims, Principal, TokenVerifier};
