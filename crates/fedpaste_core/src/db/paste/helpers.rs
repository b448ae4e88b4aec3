//! Validation and row-mapping helpers for paste storage.

use crate::constants::{COMMENTS_GROUP, COMPONENTS_GROUP, REPORTS_GROUP, RESERVED_NAMESPACES};
use crate::db::adapter::{Record, SqlValue};
use crate::db::time_util::{from_millis, to_millis};
use crate::error::AppError;
use crate::models::paste::{split_content, EncryptionMaterial, Paste};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Characters allowed in custom URLs and group names.
fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

pub(super) fn validate_identifier(field: &str, value: &str) -> Result<(), AppError> {
    if value.chars().all(is_identifier_char) {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "{} may only contain letters, digits, '_', '-' and '.'",
        field
    )))
}

/// Character-count bounds check.
pub(super) fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if (min..=max).contains(&len) {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "{} must be between {} and {} characters",
        field, min, max
    )))
}

/// Same as [`check_len`] but an empty value always passes.
pub(super) fn check_optional_len(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), AppError> {
    if value.is_empty() {
        return Ok(());
    }
    check_len(field, value, min, max)
}

/// Lowercase alphanumeric token for generated URLs and passwords.
pub(crate) fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

pub(super) fn is_reserved_namespace(group: &str) -> bool {
    RESERVED_NAMESPACES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(group))
}

/// Namespaces the store assigns to comment, report and component pastes.
pub(super) fn is_internal_group(group: &str) -> bool {
    matches!(group, COMMENTS_GROUP | REPORTS_GROUP | COMPONENTS_GROUP)
}

/// `group/url`, unless `url` already carries that prefix or there is no group.
pub(super) fn group_prefixed(group: &str, url: &str) -> String {
    if group.is_empty() || url.starts_with(&format!("{}/", group)) {
        return url.to_string();
    }
    format!("{}/{}", group, url)
}

/// `url` without its `group/` prefix.
pub(super) fn strip_group_prefix<'a>(group: &str, url: &'a str) -> &'a str {
    if group.is_empty() {
        return url;
    }
    url.strip_prefix(group)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(url)
}

pub(super) fn row_to_paste(record: &Record) -> Paste {
    let (content, metadata) = split_content(&record.text("Content"));
    Paste {
        custom_url: record.text("CustomURL"),
        content,
        edit_password: record.text("EditPassword"),
        view_password: record.text("ViewPassword"),
        pub_date: from_millis(record.float("PubDate")),
        edit_date: from_millis(record.float("EditDate")),
        group_name: record.text("GroupName"),
        group_submit_password: record.text("GroupSubmitPassword"),
        metadata,
        ..Paste::default()
    }
}

pub(super) fn row_to_material(record: &Record) -> EncryptionMaterial {
    EncryptionMaterial {
        iv: record.text("ENC_IV"),
        key: record.text("ENC_KEY"),
        auth_code: record.text("ENC_CODE"),
    }
}

/// Bind values for an insert into `pastes`, in [`crate::db::tables::PASTE_COLUMNS`] order.
pub(super) fn insert_params(paste: &Paste, stored_content: String) -> Vec<SqlValue> {
    vec![
        SqlValue::Text(stored_content),
        SqlValue::from(&paste.edit_password),
        SqlValue::from(&paste.custom_url),
        SqlValue::from(&paste.view_password),
        SqlValue::Float(to_millis(paste.pub_date)),
        SqlValue::Float(to_millis(paste.edit_date)),
        SqlValue::from(&paste.group_name),
        SqlValue::from(&paste.group_submit_password),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_allow_only_safe_characters() {
        assert!(validate_identifier("custom URL", "demo_1.two-3").is_ok());
        for bad in ["with space", "slash/inside", "colon:host", "quote'", "percent%"] {
            assert!(validate_identifier("custom URL", bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn length_checks_count_characters() {
        assert!(check_len("content", "\u{e9}\u{e9}", 2, 2).is_ok());
        assert!(check_len("content", "", 1, 5).is_err());
        assert!(check_optional_len("password", "", 5, 256).is_ok());
        let err = check_optional_len("password", "abc", 5, 256).expect_err("too short");
        assert_eq!(err.message(), "password must be between 5 and 256 characters");
    }

    #[test]
    fn random_tokens_are_lowercase_alphanumeric() {
        let token = random_token(32);
        assert_eq!(token.len(), 32);
        assert!(token
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase()));
    }

    #[test]
    fn group_prefix_helpers_are_inverse() {
        assert_eq!(group_prefixed("sprint1", "alpha"), "sprint1/alpha");
        assert_eq!(group_prefixed("sprint1", "sprint1/alpha"), "sprint1/alpha");
        assert_eq!(group_prefixed("", "alpha"), "alpha");
        assert_eq!(strip_group_prefix("sprint1", "sprint1/alpha"), "alpha");
        assert_eq!(strip_group_prefix("sprint1", "sprint10/alpha"), "sprint10/alpha");
        assert!(is_reserved_namespace("API"));
        assert!(!is_reserved_namespace("sprint1"));
    }
}
