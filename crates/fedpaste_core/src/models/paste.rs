//! Paste-related data models and the content/metadata wire form.

use crate::constants::{METADATA_DELIMITER, METADATA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment and report settings carried in paste metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommentSettings {
    /// Set on a comment/report paste: the URL of the paste it targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_comment_on: Option<String>,
    /// Set on a paste submitted as a report rather than a comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_report: Option<bool>,
    /// Whether this paste accepts comments.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_enabled: Option<bool>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            is_comment_on: None,
            is_report: None,
            enabled: true,
            reports_enabled: None,
        }
    }
}

/// Versioned metadata appended to stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    pub version: u32,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<CommentSettings>,
    /// Marks a page-builder component paste.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<bool>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            owner: String::new(),
            locked: None,
            comments: None,
            component: None,
        }
    }
}

impl Metadata {
    pub fn is_locked(&self) -> bool {
        self.locked.unwrap_or(false)
    }

    pub fn comments_enabled(&self) -> bool {
        self.comments.as_ref().map(|c| c.enabled).unwrap_or(true)
    }

    pub fn reports_enabled(&self) -> bool {
        self.comments
            .as_ref()
            .and_then(|c| c.reports_enabled)
            .unwrap_or(true)
    }
}

/// Key material for an encrypted paste (the `encryption` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMaterial {
    pub iv: String,
    pub key: String,
    pub auth_code: String,
}

/// A paste row plus its derived, non-persisted fields.
///
/// Password fields hold hashes once stored; on input to
/// [`crate::db::paste::PasteStore::create`] they hold plaintext.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paste {
    pub custom_url: String,
    /// Visible content with the metadata block split off. Hex ciphertext for
    /// encrypted pastes.
    pub content: String,
    pub edit_password: String,
    pub view_password: String,
    pub pub_date: DateTime<Utc>,
    pub edit_date: DateTime<Utc>,
    pub group_name: String,
    pub group_submit_password: String,
    pub metadata: Metadata,
    pub views: u64,
    pub comments: u64,
    pub expire_on: Option<DateTime<Utc>>,
    pub host_server: Option<String>,
    #[serde(skip)]
    pub encryption: Option<EncryptionMaterial>,
}

impl Paste {
    /// A draft paste with `custom_url`, `content` and an edit password.
    pub fn new(
        custom_url: impl Into<String>,
        content: impl Into<String>,
        edit_password: impl Into<String>,
    ) -> Self {
        Self {
            custom_url: custom_url.into(),
            content: content.into(),
            edit_password: edit_password.into(),
            ..Self::default()
        }
    }

    pub fn is_private(&self) -> bool {
        !self.view_password.is_empty()
    }

    /// URL including the `:host` suffix for pastes fetched from a peer.
    pub fn qualified_url(&self) -> String {
        match &self.host_server {
            Some(host) => format!("{}:{}", self.custom_url, host),
            None => self.custom_url.clone(),
        }
    }

    /// Blank every credential field before handing the paste out.
    pub fn scrub(mut self) -> Self {
        self.edit_password.clear();
        self.view_password.clear();
        self.group_submit_password.clear();
        self.encryption = None;
        self
    }

    /// Classify the paste from its metadata.
    pub fn kind(&self) -> PasteKind {
        if let Some(target) = self
            .metadata
            .comments
            .as_ref()
            .and_then(|c| c.is_comment_on.clone())
        {
            let is_report = self
                .metadata
                .comments
                .as_ref()
                .and_then(|c| c.is_report)
                .unwrap_or(false);
            return if is_report {
                PasteKind::Report { target }
            } else {
                PasteKind::Comment { target }
            };
        }
        if self.metadata.component.unwrap_or(false) {
            return PasteKind::Component;
        }
        PasteKind::Regular
    }
}

/// Role a paste plays, derived from its metadata at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteKind {
    Regular,
    Comment { target: String },
    Report { target: String },
    Component,
}

/// Payload of a successful create.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPaste {
    pub paste: Paste,
    /// Plaintext edit password generated for the caller, shown once.
    pub edit_password: Option<String>,
}

/// Edit request: the currently stored identity and the replacement values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasteEdit {
    pub old_url: String,
    pub old_edit_password: String,
    #[serde(default)]
    pub old_content: String,
    pub new_url: String,
    /// Empty keeps the current edit password.
    #[serde(default)]
    pub new_edit_password: String,
    pub new_content: String,
    /// Some(non-empty) re-keys the paste under a new view password.
    #[serde(default)]
    pub new_view_password: Option<String>,
    /// Replacement metadata; the stored metadata is kept when absent.
    #[serde(default)]
    pub new_metadata: Option<Metadata>,
}

/// Per-paste result of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Split a `url:host` reference into its local URL and remote host.
///
/// The host may itself carry a port (`demo:peer.example:8443`).
pub fn split_remote(url: &str) -> Option<(&str, &str)> {
    let (local, host) = url.split_once(':')?;
    if local.is_empty() || host.is_empty() {
        return None;
    }
    Some((local, host))
}

/// Append the serialized metadata block to `content`.
pub fn compose_content(content: &str, metadata: &Metadata) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_string(metadata)?;
    Ok(format!("{}{}{}", content, METADATA_DELIMITER, encoded))
}

/// Split stored content into visible content and metadata.
///
/// Content without a parsable block gets the default metadata and is
/// returned whole.
pub fn split_content(stored: &str) -> (String, Metadata) {
    if let Some((content, encoded)) = stored.rsplit_once(METADATA_DELIMITER) {
        if let Ok(metadata) = serde_json::from_str::<Metadata>(encoded) {
            return (content.to_string(), metadata);
        }
    }
    (stored.to_string(), Metadata::default())
}
