//! Provider sign-in and sessions
//!
//! Handles:
//! - Google, Twitter and GitHub handshakes
//! - Profile normalization and identity resolution
//! - Session management
//! - Session extractors

pub mod adapter;
mod middleware;
mod oauth;
pub mod providers;
pub mod session;

pub use adapter::{NormalizedProfile, ProviderProfile, handle_callback};
pub use middleware::{CurrentUser, MaybeUser, SESSION_COOKIE};
pub use oauth::auth_router;
pub use providers::{CallbackParams, HandshakeStart, IdentityProvider, ProviderRegistry};
pub use session::SessionManager;
