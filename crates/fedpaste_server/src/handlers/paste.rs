//! Paste HTTP handlers for peers: raw fetch plus form-driven edit and delete.
//!
//! Edit and delete always answer with a redirect. Rejections travel in the
//! `err` query parameter of the redirect target so a forwarding peer can
//! surface them unchanged.

use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use fedpaste_core::federation::{
    redirect_with_error, EDIT_DATE_HEADER, GROUP_NAME_HEADER, PUB_DATE_HEADER,
};
use fedpaste_core::models::paste::{split_remote, PasteEdit};
use fedpaste_core::Outcome;
use serde::Deserialize;

/// Form body of `POST /api/edit`.
#[derive(Debug, Deserialize)]
pub struct EditForm {
    #[serde(rename = "OldURL")]
    pub old_url: String,
    #[serde(rename = "OldEditPassword", default)]
    pub old_edit_password: String,
    #[serde(rename = "OldContent", default)]
    pub old_content: String,
    #[serde(rename = "NewURL", default)]
    pub new_url: String,
    #[serde(rename = "NewEditPassword", default)]
    pub new_edit_password: String,
    #[serde(rename = "NewContent", default)]
    pub new_content: String,
}

impl From<EditForm> for PasteEdit {
    fn from(form: EditForm) -> Self {
        PasteEdit {
            old_url: form.old_url,
            old_edit_password: form.old_edit_password,
            old_content: form.old_content,
            new_url: form.new_url,
            new_edit_password: form.new_edit_password,
            new_content: form.new_content,
            ..PasteEdit::default()
        }
    }
}

/// Form body of `POST /api/delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(rename = "CustomURL")]
    pub custom_url: String,
    #[serde(default)]
    pub password: String,
}

fn forwarded_reference(url: &str) -> Result<(), AppError> {
    if split_remote(url).is_some() {
        return Err(AppError::NotFound(format!(
            "paste '{}' does not live on this server",
            url
        )));
    }
    Ok(())
}

fn date_header(millis: i64) -> HeaderValue {
    HeaderValue::from(millis)
}

/// `GET /api/raw/*url`: the visible content of a local public paste.
///
/// # Errors
/// 404 for missing or `url:host` references, 403 for encrypted pastes.
pub async fn raw_paste(
    State(state): State<AppState>,
    Path(url): Path<String>,
) -> Result<Response, HttpError> {
    forwarded_reference(&url)?;
    let paste = state
        .db
        .pastes
        .get(&url)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("paste '{}' does not exist", url)))?;
    if paste.is_private() {
        return Err(AppError::Unauthorized(format!("paste '{}' is private", url)).into());
    }

    let mut response = paste.content.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        HeaderName::from_static(PUB_DATE_HEADER),
        date_header(paste.pub_date.timestamp_millis()),
    );
    headers.insert(
        HeaderName::from_static(EDIT_DATE_HEADER),
        date_header(paste.edit_date.timestamp_millis()),
    );
    if let Ok(group) = HeaderValue::from_str(&paste.group_name) {
        headers.insert(HeaderName::from_static(GROUP_NAME_HEADER), group);
    }
    Ok(response)
}

/// `POST /api/edit`: 303 to the paste's final URL, or back to the old URL
/// with `err` set.
///
/// # Errors
/// Only storage faults; rejections become redirects.
pub async fn edit_paste(
    State(state): State<AppState>,
    Form(form): Form<EditForm>,
) -> Result<Redirect, HttpError> {
    let old_path = format!("/{}", form.old_url);
    let result = match forwarded_reference(&form.old_url) {
        Ok(()) => state.db.pastes.edit(form.into(), false).await,
        Err(err) => Err(err),
    };
    let outcome = Outcome::capture(result, "paste edited")?;
    Ok(match outcome.payload {
        Some(new_url) if outcome.success => Redirect::to(&format!("/{}", new_url)),
        _ => Redirect::to(&redirect_with_error(&old_path, &outcome.message)),
    })
}

/// `POST /api/delete`: 303 to `/`, or back to the paste with `err` set.
///
/// # Errors
/// Only storage faults; rejections become redirects.
pub async fn delete_paste(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, HttpError> {
    let result = match forwarded_reference(&form.custom_url) {
        Ok(()) => {
            state
                .db
                .pastes
                .delete(&form.custom_url, &form.password)
                .await
        }
        Err(err) => Err(err),
    };
    let outcome = Outcome::capture(result, "paste deleted")?;
    if outcome.success {
        tracing::debug!("Peer deleted '{}'", form.custom_url);
        return Ok(Redirect::to("/"));
    }
    Ok(Redirect::to(&redirect_with_error(
        &format!("/{}", form.custom_url),
        &outcome.message,
    )))
}
