//! Object identity and interface membership for the client-side object cache.

pub mod fragments;
pub mod identity;

pub use fragments::PossibleTypes;
pub use identity::{CacheKind, IdentityOverride, IdentityResolver, default_identity};
