//! Data layer module
//!
//! Handles all data persistence:
//! - Identity records
//! - Server-side sessions

mod database;
mod models;

pub use database::Database;
pub(crate) use database::hash_session_token;
pub use models::*;

#[cfg(test)]
pub(crate) mod test_support;
