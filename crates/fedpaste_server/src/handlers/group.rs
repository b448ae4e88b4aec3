//! Group listing for peers.

use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use fedpaste_core::models::paste::{split_remote, Paste};

/// `GET /api/group/*group`: public members of a local group, scrubbed.
pub async fn list_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<Vec<Paste>>, HttpError> {
    if split_remote(&group).is_some() {
        return Err(AppError::NotFound(format!("group '{}' does not live on this server", group)).into());
    }
    let members = state.db.pastes.list_by_group(&group, false).await?;
    Ok(Json(members))
}
