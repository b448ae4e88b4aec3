//! Core domain library for fedpaste (config, storage, federation, models).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Password hashing and at-rest encryption.
pub mod credentials;
/// Database access layer and stores.
pub mod db;
/// Application error types (storage/domain).
pub mod error;
/// Client for pastes living on peer servers.
pub mod federation;
/// Data models for persistence and the federation wire.
pub mod models;
/// Periodic background jobs.
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, Outcome};
