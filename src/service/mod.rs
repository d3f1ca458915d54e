//! Service layer
//!
//! Contains business logic separated from HTTP handlers.

mod resolver;

pub use resolver::IdentityResolver;
