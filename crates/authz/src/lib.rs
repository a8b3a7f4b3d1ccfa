//! Authorization hooks and guards.
//!
//! Authentication happens upstream: a fronting proxy forwards the caller's
//! username in a header. [`authenticate`] turns that header into a
//! [`Principal`] carrying the capabilities the [`Policy`] grants, and the
//! extractors in [`guard`] reject requests that lack a caller or a capability.

pub mod guard;
pub mod policy;
pub mod principal;

pub use guard::{
    authenticate, AuthRejection, Authenticated, Authenticator, MaybeAuthenticated, Permission,
    RequiredCapability,
};
pub use policy::{Policy, PolicyError};
pub use principal::Principal;
