//! Model-level unit tests.

use super::log::{LogType, NewLog};
use super::paste::*;
use crate::constants::METADATA_DELIMITER;

#[test]
fn compose_then_split_restores_content_and_metadata() {
    let metadata = Metadata {
        owner: "alice".to_string(),
        locked: Some(true),
        comments: Some(CommentSettings {
            reports_enabled: Some(false),
            ..CommentSettings::default()
        }),
        ..Metadata::default()
    };
    let stored = compose_content("hello\nworld", &metadata).expect("compose");
    assert!(stored.starts_with("hello\nworld"));
    assert!(stored.contains("\"Owner\":\"alice\""));

    let (content, parsed) = split_content(&stored);
    assert_eq!(content, "hello\nworld");
    assert_eq!(parsed, metadata);
    assert!(parsed.is_locked());
    assert!(parsed.comments_enabled());
    assert!(!parsed.reports_enabled());
}

#[test]
fn split_without_block_defaults_metadata() {
    let (content, metadata) = split_content("plain text only");
    assert_eq!(content, "plain text only");
    assert_eq!(metadata.version, 1);
    assert_eq!(metadata.owner, "");
    assert!(!metadata.is_locked());
}

#[test]
fn split_keeps_content_when_block_is_not_metadata() {
    let stored = format!("body{}not json", METADATA_DELIMITER);
    let (content, metadata) = split_content(&stored);
    assert_eq!(content, stored);
    assert_eq!(metadata, Metadata::default());
}

#[test]
fn metadata_parses_minimal_legacy_block() {
    let (_, metadata) = split_content(&format!("x{}{{\"Version\":1}}", METADATA_DELIMITER));
    assert_eq!(metadata.owner, "");
    assert!(metadata.comments.is_none());
}

#[test]
fn split_remote_handles_ports_and_rejects_blanks() {
    assert_eq!(split_remote("demo:peer.example"), Some(("demo", "peer.example")));
    assert_eq!(
        split_remote("grp/demo:127.0.0.1:8080"),
        Some(("grp/demo", "127.0.0.1:8080"))
    );
    assert_eq!(split_remote("demo"), None);
    assert_eq!(split_remote(":host"), None);
    assert_eq!(split_remote("demo:"), None);
}

#[test]
fn paste_kind_follows_metadata() {
    let mut paste = Paste::new("a", "b", "c");
    assert_eq!(paste.kind(), PasteKind::Regular);

    paste.metadata.component = Some(true);
    assert_eq!(paste.kind(), PasteKind::Component);

    paste.metadata.comments = Some(CommentSettings {
        is_comment_on: Some("target".to_string()),
        ..CommentSettings::default()
    });
    assert_eq!(
        paste.kind(),
        PasteKind::Comment {
            target: "target".to_string()
        }
    );

    if let Some(comments) = paste.metadata.comments.as_mut() {
        comments.is_report = Some(true);
    }
    assert_eq!(
        paste.kind(),
        PasteKind::Report {
            target: "target".to_string()
        }
    );
}

#[test]
fn scrub_blanks_credentials() {
    let mut paste = Paste::new("demo", "hello", "hash-a");
    paste.view_password = "hash-b".to_string();
    paste.group_submit_password = "hash-c".to_string();
    paste.host_server = Some("peer".to_string());
    let scrubbed = paste.scrub();
    assert!(scrubbed.edit_password.is_empty());
    assert!(scrubbed.view_password.is_empty());
    assert!(scrubbed.group_submit_password.is_empty());
    assert_eq!(scrubbed.qualified_url(), "demo:peer");
}

#[test]
fn log_type_roundtrips_known_and_unknown_names() {
    for name in [
        "generic",
        "create_paste",
        "edit_paste",
        "delete_paste",
        "view_paste",
        "comment",
        "report",
        "session",
        "webhook",
    ] {
        assert_eq!(LogType::parse(name).as_str(), name);
    }
    assert_eq!(LogType::parse(""), LogType::Generic);
    assert_eq!(
        NewLog::new(LogType::Session, "tok").at(5.0).timestamp,
        Some(5.0)
    );
}
