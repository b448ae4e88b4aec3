//! Configuration loading from environment variables.

use crate::constants::{DEFAULT_FEDERATION_SCHEME, DEFAULT_LIST_LIMIT, DEFAULT_PORT};
use crate::credentials;
use crate::models::log::LogType;
use rand::distributions::{Alphanumeric, DistString};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Log types written for paste events unless `LOG_EVENTS` overrides them.
const DEFAULT_LOG_EVENTS: &str = "create_paste,edit_paste,delete_paste,view_paste";

/// Server-wide admin credential.
///
/// Accepts either a plaintext secret or an argon2 PHC string produced by
/// [`credentials::hash_slow`].
#[derive(Clone)]
pub struct AdminSecret(String);

impl AdminSecret {
    /// Wrap a configured secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Check a candidate password against the configured secret.
    pub fn matches(&self, candidate: &str) -> bool {
        if candidate.is_empty() || self.0.is_empty() {
            return false;
        }
        if credentials::is_slow_hash(&self.0) {
            return credentials::verify_slow(candidate, &self.0);
        }
        candidate == self.0
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(..)")
    }
}

/// Runtime configuration for fedpaste.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub database_url: String,
    pub expiry_path: String,
    pub port: u16,
    pub admin_password: AdminSecret,
    pub server_version: String,
    pub generate_edit_passwords: bool,
    pub log_events: HashSet<LogType>,
    pub purge_bot_sessions: bool,
    pub federation_scheme: String,
    pub list_limit: usize,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

/// Parse a comma separated list of log types, skipping blanks.
pub fn parse_log_events(value: &str) -> HashSet<LogType> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(LogType::parse)
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(expand_tilde)
            .unwrap_or_else(|| {
                let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
                home.join(".cache")
                    .join("fedpaste")
                    .to_string_lossy()
                    .to_string()
            });
        let data_path = PathBuf::from(&data_dir);
        let flag = |key: &str| {
            lookup(key)
                .and_then(|value| parse_env_flag(&value))
                .unwrap_or(false)
        };

        let admin_password = match lookup("ADMIN_PASSWORD").filter(|pw| !pw.is_empty()) {
            Some(secret) => AdminSecret::new(secret),
            None => {
                tracing::warn!(
                    "ADMIN_PASSWORD is not set; using a random admin password for this run"
                );
                AdminSecret::new(Alphanumeric.sample_string(&mut rand::thread_rng(), 32))
            }
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| {
                format!("sqlite://{}", data_path.join("pastes.db").to_string_lossy())
            }),
            expiry_path: lookup("EXPIRY_PATH").map(expand_tilde).unwrap_or_else(|| {
                data_path
                    .join("expiry.txt")
                    .to_string_lossy()
                    .to_string()
            }),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            admin_password,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            generate_edit_passwords: flag("GENERATE_EDIT_PASSWORDS"),
            log_events: parse_log_events(
                lookup("LOG_EVENTS")
                    .as_deref()
                    .unwrap_or(DEFAULT_LOG_EVENTS),
            ),
            purge_bot_sessions: flag("PURGE_BOT_SESSIONS"),
            federation_scheme: lookup("FEDERATION_SCHEME")
                .map(|scheme| scheme.trim().to_ascii_lowercase())
                .filter(|scheme| scheme == "http" || scheme == "https")
                .unwrap_or_else(|| DEFAULT_FEDERATION_SCHEME.to_string()),
            list_limit: lookup("LIST_LIMIT")
                .and_then(|limit| limit.parse().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_LIST_LIMIT),
            data_dir,
        }
    }

    /// Whether paste events of `log_type` are written to the event log.
    pub fn logs_event(&self, log_type: &LogType) -> bool {
        self.log_events.contains(log_type)
    }
}
