//! Shared constants used across fedpaste crates.

use std::time::Duration;

/// Default API port for fedpaste.
pub const DEFAULT_PORT: u16 = 38517;

/// Default upper bound for list scans.
pub const DEFAULT_LIST_LIMIT: usize = 500;

/// Scheme used for peer requests unless `FEDERATION_SCHEME` overrides it.
pub const DEFAULT_FEDERATION_SCHEME: &str = "https";

/// Content length bounds (characters, visible content only).
pub const CONTENT_MIN_LEN: usize = 1;
/// Upper bound for visible paste content.
pub const CONTENT_MAX_LEN: usize = 200_000;
/// Custom URL length bounds, group prefix included.
pub const URL_MIN_LEN: usize = 2;
/// Upper bound for custom URLs.
pub const URL_MAX_LEN: usize = 500;
/// Password length bounds (edit and view passwords).
pub const PASSWORD_MIN_LEN: usize = 5;
/// Upper bound for any password field.
pub const PASSWORD_MAX_LEN: usize = 256;
/// Group name length bounds.
pub const GROUP_MIN_LEN: usize = 2;
/// Upper bound for group names.
pub const GROUP_MAX_LEN: usize = 100;
/// Lower bound for group submit passwords; the upper bound is
/// [`PASSWORD_MAX_LEN`].
pub const GROUP_PASSWORD_MIN_LEN: usize = 2;

/// Length of generated custom URLs.
pub const GENERATED_URL_LEN: usize = 8;
/// Length of generated edit passwords.
pub const GENERATED_PASSWORD_LEN: usize = 12;

/// Placeholder edit password for pastes that can never be edited.
pub const NOT_EDITABLE_SENTINEL: &str = "paste is not editable!";

/// Separator between visible content and the serialized metadata block.
pub const METADATA_DELIMITER: &str = "\n\u{1e}metadata:";
/// Current metadata version written on create/edit.
pub const METADATA_VERSION: u32 = 1;

/// Reserved singleton paste tracking the server version.
pub const VERSION_PASTE_URL: &str = "v";

/// Internal namespaces for comment, report and builder-component pastes.
pub const COMMENTS_GROUP: &str = "comments";
/// Namespace for report pastes.
pub const REPORTS_GROUP: &str = "reports";
/// Namespace for page-builder component pastes.
pub const COMPONENTS_GROUP: &str = "components";

/// Top-level path segments owned by the routing layer; never valid group names.
pub const RESERVED_NAMESPACES: &[&str] = &[
    "api",
    "admin",
    "static",
    "new",
    "edit",
    "delete",
    "raw",
    "search",
    "login",
    "logout",
    "settings",
    "paste",
    "pastes",
    "group",
    "groups",
    "s",
    "v",
    COMMENTS_GROUP,
    REPORTS_GROUP,
    COMPONENTS_GROUP,
];

/// Separator between expiry records in the flat index.
pub const EXPIRY_RECORD_DELIMITER: char = '&';
/// Separator between URL and timestamp inside one expiry record.
pub const EXPIRY_FIELD_DELIMITER: char = '|';

/// Interval between expiry sweeps.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Interval between session prunes.
pub const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Session log rows older than this are pruned.
pub const SESSION_MAX_AGE_DAYS: i64 = 365;

/// Entries kept by the log read cache.
pub const LOG_CACHE_CAPACITY: usize = 128;

/// Suffix marking a session log row as belonging to a bot.
pub const BOT_SESSION_MARKER: &str = ";bot";
