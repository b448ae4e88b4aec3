//! Paste storage operations: validation, group namespacing, encryption at
//! rest, expiry bookkeeping and federation dispatch.

mod helpers;

use crate::config::Config;
use crate::constants::*;
use crate::credentials;
use crate::db::adapter::{like_escape, PersistenceAdapter, QueryMode, QueryOutput, SqlValue};
use crate::db::expiry::ExpiryIndex;
use crate::db::log::LogStore;
use crate::db::tables::PASTE_COLUMNS;
use crate::db::time_util::to_millis;
use crate::error::AppError;
use crate::federation::FederationClient;
use crate::models::log::{LogType, NewLog};
use crate::models::paste::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use self::helpers::{
    check_len, check_optional_len, group_prefixed, insert_params, is_internal_group,
    is_reserved_namespace, row_to_material, row_to_paste, strip_group_prefix,
    validate_identifier,
};

pub(crate) use self::helpers::random_token;

/// Who is asking for a destructive operation.
#[derive(Debug, Clone, Copy)]
enum Authority<'a> {
    /// A caller-supplied password: the admin secret or the paste's edit password.
    Password(&'a str),
    /// Internal jobs acting with the admin credential.
    Admin,
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pastes deleted because they were due.
    pub deleted: Vec<String>,
    /// Due records dropped without a delete (paste missing or protected).
    pub discarded: Vec<String>,
    /// Due records kept for the next sweep after a storage fault.
    pub retained: Vec<String>,
}

/// Accessor for the `pastes` and `encryption` tables.
pub struct PasteStore {
    adapter: Arc<PersistenceAdapter>,
    logs: Arc<LogStore>,
    expiry: Arc<dyn ExpiryIndex>,
    federation: FederationClient,
    config: Arc<Config>,
}

impl PasteStore {
    pub fn new(
        adapter: Arc<PersistenceAdapter>,
        logs: Arc<LogStore>,
        expiry: Arc<dyn ExpiryIndex>,
        federation: FederationClient,
        config: Arc<Config>,
    ) -> Self {
        Self {
            adapter,
            logs,
            expiry,
            federation,
            config,
        }
    }

    async fn load_row(&self, url: &str) -> Result<Option<Paste>, AppError> {
        let statement = format!("SELECT {} FROM pastes WHERE CustomURL = ?", PASTE_COLUMNS);
        Ok(self
            .adapter
            .get_one(&statement, &[url.into()])
            .await?
            .map(|record| row_to_paste(&record)))
    }

    async fn load_encryption(&self, paste: &Paste) -> Result<Option<EncryptionMaterial>, AppError> {
        Ok(self
            .adapter
            .get_one(
                "SELECT ENC_IV, ENC_KEY, ENC_CODE FROM encryption \
                 WHERE ViewPassword = ? AND CustomURL = ?",
                &[
                    SqlValue::from(&paste.view_password),
                    SqlValue::from(&paste.custom_url),
                ],
            )
            .await?
            .map(|record| row_to_material(&record)))
    }

    async fn insert_encryption(
        &self,
        view_password: &str,
        url: &str,
        material: &EncryptionMaterial,
    ) -> Result<(), AppError> {
        self.adapter
            .execute_atomic(
                "INSERT INTO encryption (ViewPassword, CustomURL, ENC_IV, ENC_KEY, ENC_CODE) \
                 VALUES (?, ?, ?, ?, ?)",
                &[
                    view_password.into(),
                    url.into(),
                    SqlValue::from(&material.iv),
                    SqlValue::from(&material.key),
                    SqlValue::from(&material.auth_code),
                ],
            )
            .await
            .map_err(|err| {
                err.conflict_on_unique(|| format!("custom URL '{}' is already taken", url))
            })?;
        Ok(())
    }

    async fn delete_encryption(&self, url: &str) -> Result<u64, AppError> {
        self.adapter
            .run("DELETE FROM encryption WHERE CustomURL = ?", &[url.into()])
            .await
    }

    /// Remove only the row written for `view_password`, leaving any row a
    /// concurrent writer holds for the same URL.
    async fn delete_own_encryption(
        &self,
        view_password: &str,
        url: &str,
    ) -> Result<u64, AppError> {
        self.adapter
            .run(
                "DELETE FROM encryption WHERE ViewPassword = ? AND CustomURL = ?",
                &[view_password.into(), url.into()],
            )
            .await
    }

    async fn count_views(&self, url: &str) -> Result<u64, AppError> {
        self.logs
            .count(
                "Type = ? AND Content LIKE ? ESCAPE '\\'",
                &[
                    LogType::ViewPaste.as_str().into(),
                    format!("{};%", like_escape(url)).into(),
                ],
            )
            .await
    }

    async fn count_comments(&self, url: &str) -> Result<u64, AppError> {
        self.logs
            .count(
                "Type = ? AND Content LIKE ? ESCAPE '\\'",
                &[
                    LogType::Comment.as_str().into(),
                    format!("%;{}", like_escape(url)).into(),
                ],
            )
            .await
    }

    async fn log_event(&self, log_type: LogType, content: String) -> Result<(), AppError> {
        if self.config.logs_event(&log_type) {
            self.logs.create(NewLog::new(log_type, content)).await?;
        }
        Ok(())
    }

    fn authorize(&self, paste: &Paste, authority: Authority<'_>) -> Result<(), AppError> {
        match authority {
            Authority::Admin => Ok(()),
            Authority::Password(password) => {
                if self.config.admin_password.matches(password) {
                    return Ok(());
                }
                if paste.edit_password.is_empty() {
                    return Err(AppError::Unauthorized("paste is not editable".to_string()));
                }
                if credentials::hash(password) == paste.edit_password {
                    return Ok(());
                }
                Err(AppError::Unauthorized("incorrect password".to_string()))
            }
        }
    }

    /// Look up a paste by URL.
    ///
    /// A `url:host` reference is fetched from the peer and comes back with
    /// zero views and `host_server` set. Local pastes are hydrated with their
    /// key material, pending expiry and view/comment counts.
    ///
    /// # Errors
    /// Propagates storage errors; an unreachable peer is
    /// [`AppError::FederationUnreachable`].
    pub async fn get(&self, url: &str) -> Result<Option<Paste>, AppError> {
        if let Some((local, host)) = split_remote(url) {
            return self.federation.fetch(local, host).await;
        }
        let Some(mut paste) = self.load_row(url).await? else {
            return Ok(None);
        };
        if paste.is_private() {
            paste.encryption = self.load_encryption(&paste).await?;
        }
        paste.expire_on = self.expiry.get(&paste.custom_url).await?;
        paste.views = self.count_views(&paste.custom_url).await?;
        paste.comments = self.count_comments(&paste.custom_url).await?;
        Ok(Some(paste))
    }

    /// Whether the paste can ever be edited.
    pub fn is_editable(&self, paste: &Paste) -> bool {
        !paste.edit_password.is_empty()
    }

    /// Plaintext of `paste` for a reader holding `view_password`.
    ///
    /// # Returns
    /// The visible content for public pastes, `None` when the password is
    /// wrong or the key material does not authenticate.
    pub async fn decrypt(
        &self,
        paste: &Paste,
        view_password: &str,
    ) -> Result<Option<String>, AppError> {
        if !paste.is_private() {
            return Ok(Some(paste.content.clone()));
        }
        if credentials::hash(view_password) != paste.view_password {
            return Ok(None);
        }
        let material = match &paste.encryption {
            Some(material) => Some(material.clone()),
            None => self.load_encryption(paste).await?,
        };
        Ok(material.and_then(|material| {
            credentials::decrypt(&paste.content, &material.key, &material.iv, &material.auth_code)
        }))
    }

    /// Create a paste.
    ///
    /// `draft` carries plaintext passwords unless `skip_hash` is set, in which
    /// case they are stored as given (trusted import paths). An empty URL is
    /// replaced by a random one; an empty edit password is generated when
    /// configured, otherwise the paste is stored as not editable.
    ///
    /// The encryption row is written before the paste row and removed again
    /// if the paste insert fails.
    ///
    /// # Errors
    /// Expected rejections come back as [`AppError::Validation`],
    /// [`AppError::Conflict`], [`AppError::NotFound`] (missing comment target)
    /// or [`AppError::Locked`]; storage errors propagate.
    pub async fn create(&self, draft: Paste, skip_hash: bool) -> Result<CreatedPaste, AppError> {
        let mut paste = draft;
        let mut generated_password = None;

        if paste.custom_url.is_empty() {
            paste.custom_url = random_token(GENERATED_URL_LEN);
        }
        if paste.edit_password.is_empty() && !skip_hash {
            if self.config.generate_edit_passwords {
                let password = random_token(GENERATED_PASSWORD_LEN);
                generated_password = Some(password.clone());
                paste.edit_password = password;
            } else {
                paste.edit_password = NOT_EDITABLE_SENTINEL.to_string();
            }
        }

        validate_identifier(
            "custom URL",
            strip_group_prefix(&paste.group_name, &paste.custom_url),
        )?;
        if !paste.group_name.is_empty() {
            validate_identifier("group name", &paste.group_name)?;
        }
        if paste.edit_password == NOT_EDITABLE_SENTINEL {
            paste.edit_password.clear();
        }

        check_len("content", &paste.content, CONTENT_MIN_LEN, CONTENT_MAX_LEN)?;
        check_len("custom URL", &paste.custom_url, URL_MIN_LEN, URL_MAX_LEN)?;
        check_optional_len(
            "edit password",
            &paste.edit_password,
            PASSWORD_MIN_LEN,
            PASSWORD_MAX_LEN,
        )?;
        check_optional_len(
            "view password",
            &paste.view_password,
            PASSWORD_MIN_LEN,
            PASSWORD_MAX_LEN,
        )?;
        check_optional_len("group name", &paste.group_name, GROUP_MIN_LEN, GROUP_MAX_LEN)?;
        check_optional_len(
            "group password",
            &paste.group_submit_password,
            GROUP_PASSWORD_MIN_LEN,
            PASSWORD_MAX_LEN,
        )?;
        // Imported comment, report and component pastes keep their internal
        // namespace, which has no submit password.
        let internal = skip_hash && is_internal_group(&paste.group_name);
        if !internal && paste.group_name.is_empty() != paste.group_submit_password.is_empty() {
            return Err(AppError::Validation(
                "group name and group password must be given together".to_string(),
            ));
        }

        if !skip_hash {
            for field in [
                &mut paste.edit_password,
                &mut paste.view_password,
                &mut paste.group_submit_password,
            ] {
                if !field.is_empty() {
                    *field = credentials::hash(field.as_str());
                }
            }
        }

        if !paste.group_name.is_empty() && !internal {
            if is_reserved_namespace(&paste.group_name) {
                return Err(AppError::Conflict(format!(
                    "group name '{}' is reserved",
                    paste.group_name
                )));
            }
            let existing = self
                .adapter
                .get_one(
                    "SELECT GroupSubmitPassword FROM pastes WHERE GroupName = ? LIMIT 1",
                    &[SqlValue::from(&paste.group_name)],
                )
                .await?;
            if let Some(existing) = existing {
                if existing.text("GroupSubmitPassword") != paste.group_submit_password {
                    return Err(AppError::Conflict(
                        "group password does not match".to_string(),
                    ));
                }
            }
        }
        paste.custom_url = group_prefixed(&paste.group_name, &paste.custom_url);
        check_len("custom URL", &paste.custom_url, URL_MIN_LEN, URL_MAX_LEN)?;

        let kind = if skip_hash {
            PasteKind::Regular
        } else {
            paste.kind()
        };
        match &kind {
            PasteKind::Comment { target } | PasteKind::Report { target } => {
                let is_report = matches!(kind, PasteKind::Report { .. });
                let Some(target_paste) = self.load_row(target).await? else {
                    return Err(AppError::NotFound(format!(
                        "paste '{}' does not exist",
                        target
                    )));
                };
                if target_paste.metadata.is_locked() {
                    return Err(AppError::Locked(format!("paste '{}' is locked", target)));
                }
                let allowed = if is_report {
                    target_paste.metadata.reports_enabled()
                } else {
                    target_paste.metadata.comments_enabled()
                };
                if !allowed {
                    return Err(AppError::Validation(format!(
                        "{} are disabled on '{}'",
                        if is_report { "reports" } else { "comments" },
                        target
                    )));
                }
                let namespace = if is_report {
                    REPORTS_GROUP
                } else {
                    COMMENTS_GROUP
                };
                paste.group_name = namespace.to_string();
                paste.group_submit_password.clear();
                paste.custom_url =
                    format!("{}/{}", namespace, random_token(GENERATED_URL_LEN));
            }
            PasteKind::Component => {
                let bare = paste.custom_url.rsplit('/').next().unwrap_or_default().to_string();
                paste.group_name = COMPONENTS_GROUP.to_string();
                paste.group_submit_password.clear();
                paste.custom_url = format!("{}/{}", COMPONENTS_GROUP, bare);
            }
            PasteKind::Regular => {}
        }

        if self.load_row(&paste.custom_url).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "custom URL '{}' is already taken",
                paste.custom_url
            )));
        }

        let now = Utc::now();
        if skip_hash {
            if paste.pub_date == DateTime::<Utc>::default() {
                paste.pub_date = now;
            }
            if paste.edit_date == DateTime::<Utc>::default() {
                paste.edit_date = paste.pub_date;
            }
        } else {
            paste.pub_date = now;
            paste.edit_date = now;
        }
        paste.metadata.version = METADATA_VERSION;

        let mut visible = paste.content.clone();
        if !paste.view_password.is_empty() {
            let material = match paste.encryption.take() {
                Some(material) if skip_hash => material,
                _ if skip_hash => {
                    return Err(AppError::Validation(
                        "encrypted paste is missing its key material".to_string(),
                    ))
                }
                _ => {
                    let sealed = credentials::encrypt(&paste.content)?;
                    visible = sealed.ciphertext;
                    EncryptionMaterial {
                        iv: sealed.iv,
                        key: sealed.key,
                        auth_code: sealed.auth_code,
                    }
                }
            };
            self.insert_encryption(&paste.view_password, &paste.custom_url, &material)
                .await?;
            paste.encryption = Some(material);
        }

        let stored = compose_content(&visible, &paste.metadata)?;
        let statement = format!(
            "INSERT INTO pastes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            PASTE_COLUMNS
        );
        if let Err(err) = self
            .adapter
            .execute_atomic(&statement, &insert_params(&paste, stored))
            .await
        {
            if paste.encryption.is_some() {
                if let Err(rollback_err) = self
                    .delete_own_encryption(&paste.view_password, &paste.custom_url)
                    .await
                {
                    tracing::error!(
                        "Failed to roll back encryption row for '{}': {}",
                        paste.custom_url,
                        rollback_err
                    );
                } else {
                    tracing::warn!(
                        "Rolled back encryption row for '{}' after failed insert",
                        paste.custom_url
                    );
                }
            }
            let url = paste.custom_url.clone();
            return Err(
                err.conflict_on_unique(|| format!("custom URL '{}' is already taken", url))
            );
        }

        if let Some(expire_on) = paste.expire_on {
            self.expiry.put(&paste.custom_url, expire_on).await?;
        }

        match &kind {
            PasteKind::Comment { target } => {
                self.logs
                    .create(NewLog::new(
                        LogType::Comment,
                        format!("{};{}", paste.custom_url, target),
                    ))
                    .await?;
            }
            PasteKind::Report { target } => {
                self.logs
                    .create(NewLog::new(
                        LogType::Report,
                        format!("{};{}", paste.custom_url, target),
                    ))
                    .await?;
            }
            PasteKind::Component | PasteKind::Regular => {}
        }
        self.log_event(LogType::CreatePaste, paste.custom_url.clone())
            .await?;

        tracing::info!("Created paste '{}'", paste.custom_url);
        paste.content = visible;
        Ok(CreatedPaste {
            paste: paste.scrub(),
            edit_password: generated_password,
        })
    }

    /// Apply an edit.
    ///
    /// `url:host` references are forwarded to the peer. Locally, the old
    /// password must be the paste's edit password or the admin secret, and a
    /// locked paste is only edited with `force`.
    ///
    /// # Returns
    /// The paste's URL after the edit.
    ///
    /// # Errors
    /// Expected rejections come back as [`AppError::Validation`],
    /// [`AppError::NotFound`], [`AppError::Locked`], [`AppError::Unauthorized`]
    /// or [`AppError::Conflict`]; peers add [`AppError::Remote`] and
    /// [`AppError::FederationUnreachable`].
    pub async fn edit(&self, edit: PasteEdit, force: bool) -> Result<String, AppError> {
        if let Some((_, host)) = split_remote(&edit.old_url) {
            return self.federation.edit(host, &edit).await;
        }

        check_len(
            "edit password",
            &edit.old_edit_password,
            PASSWORD_MIN_LEN,
            PASSWORD_MAX_LEN,
        )?;
        check_optional_len(
            "new edit password",
            &edit.new_edit_password,
            PASSWORD_MIN_LEN,
            PASSWORD_MAX_LEN,
        )?;
        check_len("content", &edit.new_content, CONTENT_MIN_LEN, CONTENT_MAX_LEN)?;
        let new_view_password = edit
            .new_view_password
            .as_deref()
            .filter(|password| !password.is_empty());
        if let Some(password) = new_view_password {
            check_len("view password", password, PASSWORD_MIN_LEN, PASSWORD_MAX_LEN)?;
        }

        let Some(current) = self.load_row(&edit.old_url).await? else {
            return Err(AppError::NotFound(format!(
                "paste '{}' does not exist",
                edit.old_url
            )));
        };
        if current.custom_url == VERSION_PASTE_URL {
            return Err(AppError::Unauthorized(
                "the version paste cannot be edited".to_string(),
            ));
        }
        if current.metadata.is_locked() && !force {
            return Err(AppError::Locked(format!(
                "paste '{}' is locked",
                current.custom_url
            )));
        }
        self.authorize(&current, Authority::Password(&edit.old_edit_password))?;

        let mut new_url = current.custom_url.clone();
        let requested = if edit.new_url.is_empty() {
            current.custom_url.as_str()
        } else {
            edit.new_url.as_str()
        };
        if requested != current.custom_url {
            let bare = strip_group_prefix(&current.group_name, requested);
            validate_identifier("custom URL", bare)?;
            new_url = group_prefixed(&current.group_name, bare);
            check_len("custom URL", &new_url, URL_MIN_LEN, URL_MAX_LEN)?;
            if new_url != current.custom_url && self.load_row(&new_url).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "custom URL '{}' is already taken",
                    new_url
                )));
            }
        }
        let renamed = new_url != current.custom_url;

        let edit_password = if edit.new_edit_password.is_empty() {
            current.edit_password.clone()
        } else {
            credentials::hash(&edit.new_edit_password)
        };
        let mut metadata = edit.new_metadata.unwrap_or_else(|| current.metadata.clone());
        metadata.version = METADATA_VERSION;

        // Re-key or re-encrypt before the row update; the previous material
        // is restored if the row update fails.
        let view_password = match new_view_password {
            Some(password) => credentials::hash(password),
            None => current.view_password.clone(),
        };
        let previous_material = if current.is_private() {
            self.load_encryption(&current).await?
        } else {
            None
        };
        let mut visible = edit.new_content.clone();
        if !view_password.is_empty() {
            let sealed = credentials::encrypt(&edit.new_content)?;
            visible = sealed.ciphertext;
            let material = EncryptionMaterial {
                iv: sealed.iv,
                key: sealed.key,
                auth_code: sealed.auth_code,
            };
            let updated = self
                .adapter
                .execute_atomic(
                    "UPDATE encryption SET ViewPassword = ?, CustomURL = ?, ENC_IV = ?, \
                     ENC_KEY = ?, ENC_CODE = ? WHERE CustomURL = ?",
                    &[
                        SqlValue::from(&view_password),
                        SqlValue::from(&new_url),
                        SqlValue::from(&material.iv),
                        SqlValue::from(&material.key),
                        SqlValue::from(&material.auth_code),
                        SqlValue::from(&current.custom_url),
                    ],
                )
                .await?;
            if updated == 0 {
                self.insert_encryption(&view_password, &new_url, &material)
                    .await?;
            }
        }

        let stored = compose_content(&visible, &metadata)?;
        let update = self
            .adapter
            .execute_atomic(
                "UPDATE pastes SET Content = ?, EditPassword = ?, CustomURL = ?, \
                 ViewPassword = ?, EditDate = ? WHERE CustomURL = ?",
                &[
                    SqlValue::Text(stored),
                    SqlValue::from(&edit_password),
                    SqlValue::from(&new_url),
                    SqlValue::from(&view_password),
                    SqlValue::Float(to_millis(Utc::now())),
                    SqlValue::from(&current.custom_url),
                ],
            )
            .await;
        let updated = match update {
            Ok(updated) => updated,
            Err(err) => {
                if !view_password.is_empty() {
                    self.restore_encryption(&current, &new_url, previous_material)
                        .await;
                }
                return Err(err);
            }
        };
        if updated == 0 {
            return Err(AppError::NotFound(format!(
                "paste '{}' does not exist",
                current.custom_url
            )));
        }

        if renamed {
            let stale_views = self
                .logs
                .delete_where(
                    "Type = ? AND Content LIKE ? ESCAPE '\\'",
                    &[
                        LogType::ViewPaste.as_str().into(),
                        format!("{};%", like_escape(&current.custom_url)).into(),
                    ],
                )
                .await?;
            tracing::debug!(
                "Purged {} view log(s) of renamed paste '{}'",
                stale_views,
                current.custom_url
            );
            if let Some(expire_on) = self.expiry.get(&current.custom_url).await? {
                self.expiry
                    .remove(std::slice::from_ref(&current.custom_url))
                    .await?;
                self.expiry.put(&new_url, expire_on).await?;
            }
        }

        self.log_event(LogType::EditPaste, new_url.clone()).await?;
        tracing::info!("Edited paste '{}'", new_url);
        Ok(new_url)
    }

    async fn restore_encryption(
        &self,
        current: &Paste,
        new_url: &str,
        previous: Option<EncryptionMaterial>,
    ) {
        let restored = match previous {
            Some(material) => self
                .adapter
                .execute_atomic(
                    "UPDATE encryption SET ViewPassword = ?, CustomURL = ?, ENC_IV = ?, \
                     ENC_KEY = ?, ENC_CODE = ? WHERE CustomURL = ?",
                    &[
                        SqlValue::from(&current.view_password),
                        SqlValue::from(&current.custom_url),
                        SqlValue::from(&material.iv),
                        SqlValue::from(&material.key),
                        SqlValue::from(&material.auth_code),
                        new_url.into(),
                    ],
                )
                .await
                .map(|_| ()),
            None => self.delete_encryption(new_url).await.map(|_| ()),
        };
        if let Err(err) = restored {
            tracing::error!(
                "Failed to restore encryption row for '{}': {}",
                current.custom_url,
                err
            );
        }
    }

    /// Delete a paste with a caller-supplied password.
    ///
    /// `url:host` references are forwarded to the peer.
    ///
    /// # Errors
    /// Same rejection family as [`PasteStore::edit`]; the version paste is
    /// never deletable.
    pub async fn delete(&self, url: &str, password: &str) -> Result<(), AppError> {
        if let Some((_, host)) = split_remote(url) {
            return self.federation.delete(host, url, password).await;
        }
        self.delete_local(url, Authority::Password(password)).await
    }

    async fn delete_local(&self, url: &str, authority: Authority<'_>) -> Result<(), AppError> {
        let Some(current) = self.load_row(url).await? else {
            return Err(AppError::NotFound(format!("paste '{}' does not exist", url)));
        };
        if current.metadata.is_locked() {
            return Err(AppError::Locked(format!("paste '{}' is locked", url)));
        }
        if current.custom_url == VERSION_PASTE_URL {
            return Err(AppError::Unauthorized(
                "the version paste cannot be deleted".to_string(),
            ));
        }
        self.authorize(&current, authority)?;

        self.delete_encryption(url).await?;
        self.adapter
            .execute_atomic("DELETE FROM pastes WHERE CustomURL = ?", &[url.into()])
            .await?;
        self.expiry.remove(&[url.to_string()]).await?;
        self.log_event(LogType::DeletePaste, url.to_string()).await?;
        tracing::info!("Deleted paste '{}'", url);
        Ok(())
    }

    /// Delete every paste whose expiry is due at `now`.
    ///
    /// Deletes run with the admin credential. Records whose delete is
    /// rejected (paste already gone, locked, or the version paste) are
    /// dropped; records hitting a storage fault stay for the next sweep.
    ///
    /// # Errors
    /// Fails only when the expiry index itself cannot be read or rewritten.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();
        for entry in self.expiry.due(now).await? {
            match self.delete_local(&entry.custom_url, Authority::Admin).await {
                Ok(()) => report.deleted.push(entry.custom_url),
                Err(err) if err.is_fault() => {
                    tracing::error!(
                        "Expiry delete of '{}' failed, retrying next sweep: {}",
                        entry.custom_url,
                        err
                    );
                    report.retained.push(entry.custom_url);
                }
                Err(err) => {
                    tracing::warn!(
                        "Dropping expiry record for '{}': {}",
                        entry.custom_url,
                        err.message()
                    );
                    report.discarded.push(entry.custom_url);
                }
            }
        }
        let finished: Vec<String> = report
            .deleted
            .iter()
            .chain(report.discarded.iter())
            .cloned()
            .collect();
        self.expiry.remove(&finished).await?;
        Ok(report)
    }

    /// Restore exported pastes, replacing any existing paste with the same URL.
    ///
    /// Passwords are stored as given (already hashed). Encrypted pastes must
    /// carry their key material.
    ///
    /// # Errors
    /// Storage faults abort the import; per-paste rejections are reported.
    pub async fn import_all(&self, pastes: Vec<Paste>) -> Result<ImportReport, AppError> {
        let mut report = ImportReport::default();
        for paste in pastes {
            let url = paste.custom_url.clone();
            self.delete_encryption(&url).await?;
            self.adapter
                .execute_atomic("DELETE FROM pastes WHERE CustomURL = ?", &[url.as_str().into()])
                .await?;
            self.expiry.remove(std::slice::from_ref(&url)).await?;
            match self.create(paste, true).await {
                Ok(created) => report.imported.push(created.paste.custom_url),
                Err(err) if err.is_fault() => return Err(err),
                Err(err) => report.failed.push((url, err.message())),
            }
        }
        tracing::info!(
            "Imported {} paste(s), {} rejected",
            report.imported.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Newest pastes first, bounded by the configured list limit.
    pub async fn list_all(&self, include_private: bool) -> Result<Vec<Paste>, AppError> {
        let filter = if include_private {
            ""
        } else {
            "WHERE ViewPassword = ''"
        };
        let statement = format!(
            "SELECT {} FROM pastes {} ORDER BY PubDate DESC LIMIT {}",
            PASTE_COLUMNS, filter, self.config.list_limit
        );
        Ok(self
            .adapter
            .get_all(&statement, &[])
            .await?
            .iter()
            .map(|record| row_to_paste(record).scrub())
            .collect())
    }

    /// Members of `group`, newest first; `group:host` lists a peer's group.
    pub async fn list_by_group(
        &self,
        group: &str,
        include_private: bool,
    ) -> Result<Vec<Paste>, AppError> {
        if let Some((local, host)) = split_remote(group) {
            return self.federation.list_group(host, local).await;
        }
        let filter = if include_private {
            ""
        } else {
            "AND ViewPassword = ''"
        };
        let statement = format!(
            "SELECT {} FROM pastes WHERE GroupName = ? {} ORDER BY PubDate DESC LIMIT {}",
            PASTE_COLUMNS, filter, self.config.list_limit
        );
        Ok(self
            .adapter
            .get_all(&statement, &[group.into()])
            .await?
            .iter()
            .map(|record| row_to_paste(record).scrub())
            .collect())
    }

    /// Run arbitrary SQL for an operator holding the admin secret.
    pub async fn raw_query(
        &self,
        sql: &str,
        mode: QueryMode,
        admin_password: &str,
    ) -> Result<QueryOutput, AppError> {
        if !self.config.admin_password.matches(admin_password) {
            return Err(AppError::Unauthorized(
                "admin password required".to_string(),
            ));
        }
        tracing::warn!("Running raw admin query");
        self.adapter.execute(sql, &[], mode).await
    }

    /// Count one view of `url` by `viewer`; repeat views are ignored.
    ///
    /// # Returns
    /// Whether a new view was recorded.
    pub async fn record_view(&self, url: &str, viewer: &str) -> Result<bool, AppError> {
        if !self.config.logs_event(&LogType::ViewPaste) || split_remote(url).is_some() {
            return Ok(false);
        }
        if self.load_row(url).await?.is_none() {
            return Err(AppError::NotFound(format!("paste '{}' does not exist", url)));
        }
        let content = format!("{};{}", url, viewer);
        let seen = self
            .logs
            .count(
                "Type = ? AND Content = ?",
                &[LogType::ViewPaste.as_str().into(), content.as_str().into()],
            )
            .await?;
        if seen > 0 {
            return Ok(false);
        }
        self.logs
            .create(NewLog::new(LogType::ViewPaste, content))
            .await?;
        Ok(true)
    }

    /// Create or resynchronize the version paste.
    ///
    /// # Returns
    /// Whether the stored version changed.
    pub async fn bootstrap_version(&self, version: &str) -> Result<bool, AppError> {
        match self.load_row(VERSION_PASTE_URL).await? {
            None => {
                // Inserted directly: the URL is shorter than user URLs may be.
                let now = Utc::now();
                let paste = Paste {
                    pub_date: now,
                    edit_date: now,
                    ..Paste::new(VERSION_PASTE_URL, version, "")
                };
                let stored = compose_content(version, &paste.metadata)?;
                let statement = format!(
                    "INSERT INTO pastes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    PASTE_COLUMNS
                );
                self.adapter
                    .execute_atomic(&statement, &insert_params(&paste, stored))
                    .await?;
                tracing::info!("Bootstrapped version paste at {}", version);
                Ok(true)
            }
            Some(current) if current.content != version => {
                let stored = compose_content(version, &current.metadata)?;
                self.adapter
                    .execute_atomic(
                        "UPDATE pastes SET Content = ?, EditDate = ? WHERE CustomURL = ?",
                        &[
                            SqlValue::Text(stored),
                            SqlValue::Float(to_millis(Utc::now())),
                            VERSION_PASTE_URL.into(),
                        ],
                    )
                    .await?;
                tracing::info!(
                    "Version paste resynchronized from {} to {}",
                    current.content,
                    version
                );
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}
